use crate::error::AppResult;
use crate::graph::{Edge, Graph, Node};
use crate::store::{now_ms, Store};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Store key the serialized draft lives under.
pub const DRAFT_KEY: &str = "pipeline_studio.draft";

/// Cadence embedders should call [`crate::editor::Editor::autosave_tick`] at.
pub const AUTOSAVE_INTERVAL_MS: u64 = 30_000;

/// Drafts older than this are discarded at startup instead of offered for
/// recovery.
pub const DRAFT_TTL_HOURS: u64 = 24;

/// Point-in-time snapshot of unsaved work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    /// Epoch milliseconds at capture time.
    pub timestamp: i64,
    /// Application version that wrote the draft.
    pub version: String,
}

impl Draft {
    pub fn capture(graph: &Graph, version: &str) -> Self {
        Self {
            nodes: graph.nodes().to_vec(),
            edges: graph.edges().to_vec(),
            timestamp: now_ms(),
            version: version.to_string(),
        }
    }

    pub fn age_ms(&self, now: i64) -> i64 {
        now - self.timestamp
    }

    pub fn into_graph(self) -> Graph {
        Graph::from_parts(self.nodes, self.edges)
    }
}

/// Crash recovery for unsaved work. Tracks a clean/dirty flag; the periodic
/// tick only writes when an edit happened since the last write, so an idle
/// editor produces no store traffic.
pub struct DraftManager {
    store: Arc<dyn Store>,
    dirty: bool,
    ttl_ms: i64,
    version: String,
}

impl DraftManager {
    pub fn new(store: Arc<dyn Store>, ttl_hours: u64) -> Self {
        Self {
            store,
            dirty: false,
            ttl_ms: ttl_hours as i64 * 60 * 60 * 1000,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Called on every graph mutation, including undo and redo.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Periodic autosave. Returns whether a snapshot was written. On a store
    /// error the dirty flag is kept so the next tick retries.
    pub fn tick(&mut self, graph: &Graph) -> AppResult<bool> {
        if !self.dirty {
            return Ok(false);
        }
        let draft = Draft::capture(graph, &self.version);
        let json = serde_json::to_string(&draft)?;
        self.store.set(DRAFT_KEY, &json)?;
        self.dirty = false;
        eprintln!(
            "[draft] autosaved snapshot ({} nodes, {} edges)",
            draft.nodes.len(),
            draft.edges.len()
        );
        Ok(true)
    }

    /// Draft eligible for recovery, if one exists. Expired and unreadable
    /// drafts are removed from the store and reported as absent.
    pub fn load_recoverable(&self) -> AppResult<Option<Draft>> {
        let Some(raw) = self.store.get(DRAFT_KEY)? else {
            return Ok(None);
        };
        let draft: Draft = match serde_json::from_str(&raw) {
            Ok(draft) => draft,
            Err(e) => {
                eprintln!("[draft] discarding unreadable draft: {e}");
                self.store.remove(DRAFT_KEY)?;
                return Ok(None);
            }
        };
        let age = draft.age_ms(now_ms());
        if age > self.ttl_ms {
            eprintln!(
                "[draft] discarding expired draft ({}h old, ttl {}h)",
                age / 3_600_000,
                self.ttl_ms / 3_600_000
            );
            self.store.remove(DRAFT_KEY)?;
            return Ok(None);
        }
        Ok(Some(draft))
    }

    /// Drop the stored draft and reset to clean. Runs after a successful
    /// manual save and after the user declines recovery.
    pub fn clear(&mut self) -> AppResult<()> {
        self.store.remove(DRAFT_KEY)?;
        self.dirty = false;
        Ok(())
    }
}
