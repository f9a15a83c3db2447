use crate::api::{ExecutionApi, GraphApi, GraphPayload};
use crate::canvas::geometry::{Point, NODE_HEIGHT, NODE_WIDTH};
use crate::canvas::{render_canvas, CanvasController, CanvasView, Selection};
use crate::draft::{Draft, DraftManager, AUTOSAVE_INTERVAL_MS, DRAFT_TTL_HOURS};
use crate::error::{AppError, AppResult};
use crate::execution::channel::ChannelConfig;
use crate::execution::{
    node_status_overlay, render_execution, ExecutionManager, ExecutionPanelView,
};
use crate::graph::sample::sample_graph;
use crate::graph::{Edge, Graph, NodeKind};
use crate::history::{Command, CommandStack, NodeField};
use crate::notify::{ConfirmRequest, Notifier, ToastKind};
use crate::panels::{render_palette, render_properties, PaletteView, PropertiesView, TemplateRegistry};
use crate::store::{now_ms, Store};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The dashboard edits a single pipeline definition.
const DAG_ID: &str = "main";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_autosave_interval_ms")]
    pub autosave_interval_ms: u64,
    #[serde(default = "default_draft_ttl_hours")]
    pub draft_ttl_hours: u64,
    #[serde(default)]
    pub channel: ChannelConfig,
}

fn default_api_base_url() -> String {
    "http://127.0.0.1:8700".to_string()
}

fn default_autosave_interval_ms() -> u64 {
    AUTOSAVE_INTERVAL_MS
}

fn default_draft_ttl_hours() -> u64 {
    DRAFT_TTL_HOURS
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            autosave_interval_ms: default_autosave_interval_ms(),
            draft_ttl_hours: default_draft_ttl_hours(),
            channel: ChannelConfig::default(),
        }
    }
}

/// Everything a display layer needs to draw one frame.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorView {
    pub canvas: CanvasView,
    pub palette: PaletteView,
    pub properties: PropertiesView,
    pub execution: ExecutionPanelView,
    pub can_undo: bool,
    pub can_redo: bool,
    pub dirty: bool,
    pub recovery_pending: bool,
}

/// Facade owning the graph, its history, the canvas, drafts and execution
/// tracking. Single-threaded by contract: the embedder calls it from one
/// thread, ticks [`Editor::autosave_tick`] on the configured interval and
/// [`Editor::poll_execution`] while a run is live, and re-renders via
/// [`Editor::render`] after each call.
pub struct Editor {
    config: EditorConfig,
    graph: Graph,
    history: CommandStack,
    canvas: CanvasController,
    templates: TemplateRegistry,
    draft: DraftManager,
    execution: ExecutionManager,
    graph_api: Arc<dyn GraphApi>,
    execution_api: Arc<dyn ExecutionApi>,
    notifier: Arc<dyn Notifier>,
    pending_recovery: Option<Draft>,
}

impl Editor {
    pub fn new(
        config: EditorConfig,
        store: Arc<dyn Store>,
        graph_api: Arc<dyn GraphApi>,
        execution_api: Arc<dyn ExecutionApi>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let draft = DraftManager::new(store, config.draft_ttl_hours);
        let execution = ExecutionManager::new(config.channel.clone());
        Self {
            config,
            graph: Graph::new(),
            history: CommandStack::new(),
            canvas: CanvasController::new(),
            templates: TemplateRegistry::new(),
            draft,
            execution,
            graph_api,
            execution_api,
            notifier,
            pending_recovery: None,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn canvas(&self) -> &CanvasController {
        &self.canvas
    }

    pub fn execution(&self) -> &ExecutionManager {
        &self.execution
    }

    pub fn is_dirty(&self) -> bool {
        self.draft.is_dirty()
    }

    pub fn recovery_pending(&self) -> bool {
        self.pending_recovery.is_some()
    }

    /// Load the saved pipeline (sample fallback when the service is down),
    /// then check for a recoverable draft. A found draft is not applied:
    /// it is held until the user answers the recovery prompt through
    /// [`Editor::resolve_draft_recovery`].
    pub async fn init(&mut self) {
        match self.graph_api.fetch_graph().await {
            Ok(payload) => {
                eprintln!("[api] loaded saved pipeline ({} nodes)", payload.nodes.len());
                self.graph = payload.into_graph();
            }
            Err(e) => {
                eprintln!("[api] fetch failed, using sample pipeline: {e}");
                self.notifier.toast(
                    ToastKind::Warning,
                    "Could not load the saved pipeline; showing the sample pipeline",
                );
                self.graph = sample_graph();
            }
        }

        match self.draft.load_recoverable() {
            Ok(Some(draft)) => {
                let age_ms = draft.age_ms(now_ms());
                let age = if age_ms >= 3_600_000 {
                    format!("{}h", age_ms / 3_600_000)
                } else {
                    format!("{}m", (age_ms / 60_000).max(1))
                };
                self.pending_recovery = Some(draft);
                self.notifier.confirm(ConfirmRequest {
                    title: "Recover unsaved changes?".to_string(),
                    message: format!(
                        "An autosaved draft from {age} ago was found. Restore it or discard it?"
                    ),
                });
            }
            Ok(None) => {}
            Err(e) => {
                eprintln!("[draft] recovery check failed: {e}");
                self.notifier
                    .toast(ToastKind::Warning, "Could not check for autosaved drafts");
            }
        }
    }

    /// Answer the recovery prompt. Restoring replaces the graph wholesale
    /// and clears the undo history; the restored content counts as unsaved.
    /// Declining drops the stored draft. Returns `false` when no prompt was
    /// pending.
    pub fn resolve_draft_recovery(&mut self, restore: bool) -> bool {
        let Some(draft) = self.pending_recovery.take() else {
            eprintln!("[editor] no draft recovery pending");
            return false;
        };
        if restore {
            self.graph = draft.into_graph();
            self.history.clear();
            self.canvas.clear_selection();
            self.draft.mark_dirty();
            self.notifier.toast(ToastKind::Success, "Draft restored");
        } else {
            if let Err(e) = self.draft.clear() {
                eprintln!("[draft] discard failed: {e}");
            }
            self.notifier.toast(ToastKind::Info, "Draft discarded");
        }
        true
    }

    fn apply(&mut self, command: Command) {
        if self.history.execute(&mut self.graph, command) {
            self.draft.mark_dirty();
        }
    }

    /// Drop a palette template at a screen position. The node lands centered
    /// under the pointer and becomes the selection.
    pub fn drop_template(&mut self, kind: NodeKind, screen_x: f64, screen_y: f64) -> Option<String> {
        let at = self.canvas.transform().to_graph(Point::new(screen_x, screen_y));
        let node = self
            .templates
            .instantiate(kind, at.x - NODE_WIDTH / 2.0, at.y - NODE_HEIGHT / 2.0)?;
        let id = node.id.clone();
        self.apply(Command::add_node(node));
        self.canvas.select_node(&self.graph, &id);
        Some(id)
    }

    /// Connect two nodes. Self-loops, unknown endpoints and duplicate edges
    /// are suppressed without entering the history.
    pub fn connect(&mut self, from: &str, to: &str, label: Option<String>) -> bool {
        if from == to
            || !self.graph.contains_node(from)
            || !self.graph.contains_node(to)
            || self.graph.contains_edge(from, to)
        {
            eprintln!("[editor] suppressing invalid connect {from} -> {to}");
            return false;
        }
        let edge = Edge { label, ..Edge::new(from, to) };
        self.apply(Command::add_edge(edge));
        true
    }

    /// Delete whatever is selected. Deleting a node cascades to its edges
    /// as a single undoable command.
    pub fn delete_selection(&mut self) -> bool {
        let command = match self.canvas.selection().clone() {
            Selection::None => None,
            Selection::Node { id } => Command::delete_node(&self.graph, &id),
            Selection::Edge { from, to } => Command::delete_edge(&self.graph, &from, &to),
        };
        match command {
            Some(command) => {
                self.apply(command);
                self.canvas.clear_selection();
                true
            }
            None => false,
        }
    }

    /// Edit one node field through the properties panel. Unchanged values
    /// are suppressed.
    pub fn update_node_property(&mut self, id: &str, field: NodeField, value: &str) -> bool {
        match Command::update_node_property(&self.graph, id, field, value) {
            Some(command) => {
                self.apply(command);
                true
            }
            None => false,
        }
    }

    pub fn undo(&mut self) -> bool {
        if self.history.undo(&mut self.graph) {
            self.draft.mark_dirty();
            self.canvas.prune_selection(&self.graph);
            true
        } else {
            self.notifier.toast(ToastKind::Info, "Nothing to undo");
            false
        }
    }

    pub fn redo(&mut self) -> bool {
        if self.history.redo(&mut self.graph) {
            self.draft.mark_dirty();
            self.canvas.prune_selection(&self.graph);
            true
        } else {
            self.notifier.toast(ToastKind::Info, "Nothing to redo");
            false
        }
    }

    pub fn pointer_down(&mut self, x: f64, y: f64) {
        self.canvas.pointer_down(&self.graph, Point::new(x, y));
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) {
        self.canvas.pointer_move(Point::new(x, y));
    }

    /// Release the pointer. A node drag with net movement commits here as a
    /// single move command; the live preview already showed the new spot.
    pub fn pointer_up(&mut self) {
        if let Some(commit) = self.canvas.pointer_up() {
            if let Some(command) = Command::move_node(commit.id, commit.from, commit.to) {
                self.apply(command);
            }
        }
    }

    /// Reported by the display layer when a rendered edge path is clicked.
    pub fn select_edge(&mut self, from: &str, to: &str) -> bool {
        self.canvas.select_edge(&self.graph, from, to)
    }

    pub fn clear_selection(&mut self) {
        self.canvas.clear_selection();
    }

    pub fn zoom_in(&mut self) {
        self.canvas.zoom_in();
    }

    pub fn zoom_out(&mut self) {
        self.canvas.zoom_out();
    }

    pub fn reset_view(&mut self) {
        self.canvas.reset_view();
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.canvas.pan_by(dx, dy);
    }

    /// Autosave heartbeat; embedders call this every
    /// [`EditorConfig::autosave_interval_ms`]. A failed write keeps the
    /// editor usable and retries next tick.
    pub fn autosave_tick(&mut self) {
        if let Err(e) = self.draft.tick(&self.graph) {
            eprintln!("[draft] autosave failed: {e}");
            self.notifier.toast(
                ToastKind::Warning,
                "Autosave failed; changes are only in memory",
            );
        }
    }

    /// Persist the pipeline to the service. Success clears the local draft;
    /// failure keeps it so nothing is lost.
    pub async fn save(&mut self) -> AppResult<()> {
        let payload = GraphPayload::from_graph(&self.graph);
        if let Err(e) = self.graph_api.save_graph(&payload).await {
            eprintln!("[api] save failed: {e}");
            self.notifier.toast(ToastKind::Error, "Saving the pipeline failed");
            return Err(e);
        }
        if let Err(e) = self.draft.clear() {
            eprintln!("[draft] clear after save failed: {e}");
            self.notifier.toast(
                ToastKind::Warning,
                "Saved, but the local draft could not be cleared",
            );
        }
        self.notifier.toast(ToastKind::Success, "Pipeline saved");
        Ok(())
    }

    pub async fn run_pipeline(&mut self) -> AppResult<String> {
        match self
            .execution
            .start(DAG_ID, &self.graph, self.execution_api.as_ref(), self.notifier.as_ref())
            .await
        {
            Ok(id) => Ok(id),
            // Validation failures already surfaced their own toast.
            Err(AppError::Validation(detail)) => Err(AppError::Validation(detail)),
            Err(e) => {
                eprintln!("[exec] start failed: {e}");
                self.notifier
                    .toast(ToastKind::Error, "Could not start the pipeline run");
                Err(e)
            }
        }
    }

    pub async fn pause_run(&mut self) -> AppResult<()> {
        let result = self.execution.pause(self.execution_api.as_ref()).await;
        if let Err(e) = &result {
            eprintln!("[exec] pause failed: {e}");
            self.notifier.toast(ToastKind::Warning, "Pause request failed");
        }
        result
    }

    pub async fn resume_run(&mut self) -> AppResult<()> {
        let result = self.execution.resume(self.execution_api.as_ref()).await;
        if let Err(e) = &result {
            eprintln!("[exec] resume failed: {e}");
            self.notifier.toast(ToastKind::Warning, "Resume request failed");
        }
        result
    }

    pub async fn stop_run(&mut self) -> AppResult<()> {
        self.execution
            .stop(self.execution_api.as_ref(), self.notifier.as_ref())
            .await
    }

    /// Drain channel events into the run state machine and reopen the
    /// channel when a scheduled reconnect's backoff has elapsed. Call this
    /// from the embedder's event loop while a run is live.
    pub fn poll_execution(&mut self) {
        for event in self.execution.drain_events() {
            self.execution.apply_event(event, self.notifier.as_ref());
        }
        if self.execution.reconnect_due() {
            if let Some(run_id) = self.execution.active_run_id().map(str::to_string) {
                match self.execution_api.channel_url(&run_id) {
                    Ok(url) => self.execution.reopen_channel(url),
                    Err(e) => eprintln!("[channel] cannot derive reconnect url: {e}"),
                }
            }
        }
    }

    /// Warning to show before the embedder closes, if work would be lost.
    pub fn before_unload(&self) -> Option<&'static str> {
        self.draft
            .is_dirty()
            .then_some("You have unsaved pipeline changes.")
    }

    /// Project the full editor state for the display layer.
    pub fn render(&self) -> EditorView {
        let overlay = node_status_overlay(&self.execution);
        EditorView {
            canvas: render_canvas(&self.graph, &self.canvas, &overlay),
            palette: render_palette(&self.templates),
            properties: render_properties(&self.graph, self.canvas.selection()),
            execution: render_execution(&self.execution, &self.graph),
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
            dirty: self.draft.is_dirty(),
            recovery_pending: self.pending_recovery.is_some(),
        }
    }
}
