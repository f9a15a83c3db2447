pub mod channel;
pub mod messages;
pub mod retry;

use crate::api::{ExecuteRequest, ExecutionApi};
use crate::error::{AppError, AppResult};
use crate::graph::validation::validate_graph;
use crate::graph::{Graph, NodeStatus};
use crate::notify::{Notifier, ToastKind};
use crate::store::now_ms;
use channel::{open_channel, ChannelConfig, ChannelHandle};
use messages::{ChannelEvent, ChannelMessage, ChannelPayload, LogLevel, RunOutcome};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use tokio::time::Instant;
use url::Url;

/// Run log lines kept before the oldest is evicted.
pub const RUN_LOG_LIMIT: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Idle,
    Running,
    Paused,
    Stopped,
    Completed,
    Failed,
}

impl RunStatus {
    /// Terminal states absorb: no message moves a run out of them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Stopped | RunStatus::Completed | RunStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Paused => "paused",
            RunStatus::Stopped => "stopped",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRunStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Error,
}

impl NodeRunStatus {
    /// Canvas badge equivalent, layered over the stored node status at
    /// render time.
    pub fn as_node_status(&self) -> NodeStatus {
        match self {
            NodeRunStatus::Pending => NodeStatus::Pending,
            NodeRunStatus::Running => NodeStatus::Running,
            NodeRunStatus::Completed => NodeStatus::Success,
            NodeRunStatus::Error => NodeStatus::Error,
        }
    }
}

/// State of one pipeline run as reported over the channel.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRun {
    pub id: String,
    pub status: RunStatus,
    /// 0..=100.
    pub progress: u8,
    pub current_node: Option<String>,
    pub started_at: i64,
    pub node_status: HashMap<String, NodeRunStatus>,
    pub failure_reason: Option<String>,
}

impl ExecutionRun {
    fn new(id: String, graph: &Graph) -> Self {
        let node_status = graph
            .nodes()
            .iter()
            .map(|n| (n.id.clone(), NodeRunStatus::Pending))
            .collect();
        Self {
            id,
            status: RunStatus::Running,
            progress: 0,
            current_node: None,
            started_at: now_ms(),
            node_status,
            failure_reason: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunLogLine {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
}

/// Run-scoped log, bounded at [`RUN_LOG_LIMIT`] lines.
#[derive(Debug, Default)]
pub struct RunLog {
    lines: VecDeque<RunLogLine>,
}

impl RunLog {
    fn push(&mut self, level: LogLevel, node_id: Option<String>, message: String) {
        self.lines.push_back(RunLogLine {
            level,
            message,
            timestamp: now_ms(),
            node_id,
        });
        if self.lines.len() > RUN_LOG_LIMIT {
            self.lines.pop_front();
        }
    }

    fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> impl Iterator<Item = &RunLogLine> + '_ {
        self.lines.iter()
    }
}

/// Owns the active run, its log, and the channel to the executor. All state
/// changes while a run is live come from channel events; the editor drains
/// those through [`ExecutionManager::drain_events`] and feeds them to
/// [`ExecutionManager::apply_event`] on its own thread.
pub struct ExecutionManager {
    config: ChannelConfig,
    run: Option<ExecutionRun>,
    log: RunLog,
    channel: Option<ChannelHandle>,
    reconnect_attempts: u32,
    reconnect_at: Option<Instant>,
}

impl ExecutionManager {
    pub fn new(config: ChannelConfig) -> Self {
        Self {
            config,
            run: None,
            log: RunLog::default(),
            channel: None,
            reconnect_attempts: 0,
            reconnect_at: None,
        }
    }

    pub fn run(&self) -> Option<&ExecutionRun> {
        self.run.as_ref()
    }

    pub fn log(&self) -> &RunLog {
        &self.log
    }

    pub fn status(&self) -> RunStatus {
        self.run.as_ref().map(|r| r.status).unwrap_or(RunStatus::Idle)
    }

    /// Id of the run still in flight, if any.
    pub fn active_run_id(&self) -> Option<&str> {
        self.run
            .as_ref()
            .filter(|r| !r.status.is_terminal())
            .map(|r| r.id.as_str())
    }

    pub fn channel_open(&self) -> bool {
        self.channel.is_some()
    }

    /// Register a new run and reset per-run state. Channel attachment is
    /// separate so event handling stays testable without sockets.
    pub fn begin_run(&mut self, graph: &Graph, execution_id: impl Into<String>) {
        let id = execution_id.into();
        eprintln!("[exec] run {} started ({} nodes)", id, graph.node_count());
        self.log.clear();
        self.reconnect_attempts = 0;
        self.reconnect_at = None;
        self.log.push(LogLevel::Info, None, "Execution started".to_string());
        self.run = Some(ExecutionRun::new(id, graph));
    }

    /// Validate the graph, submit it for execution and open the channel.
    /// Rejection leaves existing state untouched.
    pub async fn start(
        &mut self,
        dag_id: &str,
        graph: &Graph,
        api: &dyn ExecutionApi,
        notifier: &dyn Notifier,
    ) -> AppResult<String> {
        if let Some(run) = &self.run {
            if !run.status.is_terminal() {
                notifier.toast(ToastKind::Warning, "A run is already in progress");
                return Err(AppError::Validation(format!(
                    "Run {} is still active",
                    run.id
                )));
            }
        }

        let report = validate_graph(graph);
        if !report.valid {
            let detail = report.errors.join("; ");
            notifier.toast(ToastKind::Error, &format!("Cannot execute pipeline: {detail}"));
            return Err(AppError::Validation(detail));
        }
        for warning in &report.warnings {
            notifier.toast(ToastKind::Warning, warning);
        }

        let request = ExecuteRequest::from_graph(dag_id, graph);
        let response = api.execute(&request).await?;
        let url = api.channel_url(&response.execution_id)?;

        self.begin_run(graph, response.execution_id.clone());
        self.channel = Some(open_channel(url, &response.execution_id, &self.config));
        Ok(response.execution_id)
    }

    /// Stop is optimistic: the run is marked stopped and the channel closed
    /// before the request reaches the executor, so late events cannot move
    /// the state afterwards.
    pub async fn stop(&mut self, api: &dyn ExecutionApi, notifier: &dyn Notifier) -> AppResult<()> {
        let Some(run) = self.run.as_mut() else {
            return Err(AppError::NotFound("No active run to stop".to_string()));
        };
        if run.status.is_terminal() {
            return Ok(());
        }
        let id = run.id.clone();
        run.status = RunStatus::Stopped;
        run.current_node = None;
        self.log.push(LogLevel::Warning, None, "Run stopped by user".to_string());
        self.close_channel();
        self.reconnect_at = None;
        eprintln!("[exec] run {id} stopped locally, stop request in flight");

        if let Err(e) = api.stop(&id).await {
            // Local state is already terminal; the executor may finish on
            // its own schedule.
            eprintln!("[exec] stop request failed for {id}: {e}");
            notifier.toast(ToastKind::Warning, "Stop request could not reach the executor");
        }
        Ok(())
    }

    /// Request a pause. The status only flips when the channel reports it.
    pub async fn pause(&mut self, api: &dyn ExecutionApi) -> AppResult<()> {
        let Some(run) = self.run.as_ref() else {
            return Err(AppError::NotFound("No active run to pause".to_string()));
        };
        if run.status != RunStatus::Running {
            return Err(AppError::Validation(format!(
                "Cannot pause a {} run",
                run.status
            )));
        }
        api.pause(&run.id).await?;
        self.log.push(LogLevel::Info, None, "Pause requested".to_string());
        Ok(())
    }

    pub async fn resume(&mut self, api: &dyn ExecutionApi) -> AppResult<()> {
        let Some(run) = self.run.as_ref() else {
            return Err(AppError::NotFound("No active run to resume".to_string()));
        };
        if run.status != RunStatus::Paused {
            return Err(AppError::Validation(format!(
                "Cannot resume a {} run",
                run.status
            )));
        }
        api.resume(&run.id).await?;
        self.log.push(LogLevel::Info, None, "Resume requested".to_string());
        Ok(())
    }

    /// Pull everything the channel has queued. Empty when no channel is
    /// attached.
    pub fn drain_events(&mut self) -> Vec<ChannelEvent> {
        let mut out = Vec::new();
        if let Some(ch) = self.channel.as_mut() {
            while let Some(event) = ch.try_recv() {
                out.push(event);
            }
        }
        out
    }

    /// Feed one channel event through the state machine. Events for a run
    /// that is not the active one, or whose run already reached a terminal
    /// state, are dropped: callbacks arrive in any order relative to user
    /// actions and a stale one must not resurrect a finished run.
    pub fn apply_event(&mut self, event: ChannelEvent, notifier: &dyn Notifier) {
        let (active_id, terminal) = match &self.run {
            Some(run) => (run.id.clone(), run.status.is_terminal()),
            None => {
                eprintln!("[exec] dropping event for {}: no run", event.execution_id);
                return;
            }
        };
        if event.execution_id != active_id || terminal {
            eprintln!(
                "[exec] dropping stale event for {} (active {}, {})",
                event.execution_id,
                active_id,
                if terminal { "terminal" } else { "live" }
            );
            return;
        }
        match event.payload {
            ChannelPayload::Message(message) => self.apply_message(message, notifier),
            ChannelPayload::Closed { reason } => self.handle_disconnect(reason, notifier),
        }
    }

    fn apply_message(&mut self, message: ChannelMessage, notifier: &dyn Notifier) {
        if self.reconnect_attempts > 0 {
            eprintln!("[channel] reconnected after {} attempt(s)", self.reconnect_attempts);
            self.log.push(LogLevel::Info, None, "Connection restored".to_string());
            self.reconnect_attempts = 0;
            self.reconnect_at = None;
        }

        let Some(run) = self.run.as_mut() else { return };
        // A terminal transition closes the channel and surfaces a toast
        // once the run borrow ends.
        let mut finished: Option<(ToastKind, &'static str)> = None;

        match message {
            ChannelMessage::Status { status } => {
                if status != run.status {
                    eprintln!("[exec] run {} status {} -> {}", run.id, run.status, status);
                    run.status = status;
                    self.log
                        .push(LogLevel::Info, None, format!("Run status changed to {status}"));
                    match status {
                        RunStatus::Completed => {
                            finished = Some((ToastKind::Success, "Pipeline run completed"))
                        }
                        RunStatus::Failed => {
                            run.failure_reason = Some("Executor reported failure".to_string());
                            finished = Some((ToastKind::Error, "Pipeline run failed"));
                        }
                        RunStatus::Stopped => {
                            finished = Some((ToastKind::Info, "Pipeline run stopped"))
                        }
                        _ => {}
                    }
                }
            }
            ChannelMessage::Progress { progress, current_node } => {
                run.progress = progress.min(100);
                if current_node.is_some() {
                    run.current_node = current_node;
                }
            }
            ChannelMessage::NodeStart { node_id } => {
                run.node_status.insert(node_id.clone(), NodeRunStatus::Running);
                run.current_node = Some(node_id.clone());
                self.log
                    .push(LogLevel::Info, Some(node_id), "Node started".to_string());
            }
            ChannelMessage::NodeComplete { node_id } => {
                run.node_status.insert(node_id.clone(), NodeRunStatus::Completed);
                self.log
                    .push(LogLevel::Info, Some(node_id), "Node completed".to_string());
            }
            ChannelMessage::NodeError { node_id, error } => {
                // A node failure is not a run failure; the executor decides
                // whether the run continues.
                run.node_status.insert(node_id.clone(), NodeRunStatus::Error);
                self.log
                    .push(LogLevel::Error, Some(node_id), format!("Node failed: {error}"));
            }
            ChannelMessage::Log { level, message, node_id } => {
                self.log.push(level, node_id, message);
            }
            ChannelMessage::Complete { status } => match status {
                RunOutcome::Success => {
                    run.status = RunStatus::Completed;
                    run.progress = 100;
                    run.current_node = None;
                    self.log.push(LogLevel::Info, None, "Run completed".to_string());
                    finished = Some((ToastKind::Success, "Pipeline run completed"));
                }
                RunOutcome::Failed => {
                    run.status = RunStatus::Failed;
                    run.failure_reason = Some("Executor reported failure".to_string());
                    run.current_node = None;
                    self.log.push(LogLevel::Error, None, "Run failed".to_string());
                    finished = Some((ToastKind::Error, "Pipeline run failed"));
                }
            },
            ChannelMessage::Heartbeat { .. } => {
                // Traffic only; the transport already reset its idle clock.
            }
        }

        if let Some((kind, message)) = finished {
            self.close_channel();
            self.reconnect_at = None;
            notifier.toast(kind, message);
        }
    }

    /// Unexpected channel drop while the run is live. Schedules a reconnect
    /// with backoff until the policy is exhausted, then fails the run.
    fn handle_disconnect(&mut self, reason: String, notifier: &dyn Notifier) {
        self.channel = None;
        let attempts = self.reconnect_attempts + 1;
        let max = self.config.retry.max_attempts;
        if attempts > max {
            eprintln!("[channel] giving up after {max} reconnect attempts: {reason}");
            if let Some(run) = self.run.as_mut() {
                run.status = RunStatus::Failed;
                run.failure_reason =
                    Some(format!("Connection lost after {max} reconnect attempts: {reason}"));
            }
            self.log
                .push(LogLevel::Error, None, "Connection to executor lost".to_string());
            self.reconnect_at = None;
            notifier.toast(
                ToastKind::Error,
                "Connection to the executor was lost; the run was marked failed",
            );
        } else {
            let delay = self.config.retry.next_delay(attempts - 1);
            self.reconnect_attempts = attempts;
            self.reconnect_at = Some(Instant::now() + delay);
            eprintln!(
                "[channel] connection dropped ({reason}); reconnect attempt {attempts}/{max} in {delay:?}"
            );
            self.log.push(
                LogLevel::Warning,
                None,
                format!("Connection dropped, reconnecting (attempt {attempts} of {max})"),
            );
        }
    }

    /// Whether a scheduled reconnect's backoff has elapsed.
    pub fn reconnect_due(&self) -> bool {
        matches!(self.reconnect_at, Some(at) if Instant::now() >= at)
    }

    /// Open a fresh channel for the active run after a backoff delay.
    pub fn reopen_channel(&mut self, url: Url) {
        let Some(id) = self.active_run_id().map(str::to_string) else {
            self.reconnect_at = None;
            return;
        };
        eprintln!("[channel] reconnecting run {id} (attempt {})", self.reconnect_attempts);
        self.reconnect_at = None;
        self.channel = Some(open_channel(url, &id, &self.config));
    }

    fn close_channel(&mut self) {
        if let Some(mut ch) = self.channel.take() {
            ch.close();
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeBadgeView {
    pub node_id: String,
    pub name: String,
    pub status: NodeRunStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPanelView {
    pub status: RunStatus,
    pub progress: u8,
    pub execution_id: Option<String>,
    pub current_node: Option<String>,
    pub failure_reason: Option<String>,
    pub nodes: Vec<NodeBadgeView>,
    pub log: Vec<RunLogLine>,
    pub can_start: bool,
    pub can_pause: bool,
    pub can_resume: bool,
    pub can_stop: bool,
}

/// Project run state into the execution panel. Badge order follows the
/// graph's node order.
pub fn render_execution(manager: &ExecutionManager, graph: &Graph) -> ExecutionPanelView {
    let run = manager.run();
    let status = manager.status();
    let nodes = graph
        .nodes()
        .iter()
        .map(|node| NodeBadgeView {
            node_id: node.id.clone(),
            name: node.name.clone(),
            status: run
                .and_then(|r| r.node_status.get(&node.id).copied())
                .unwrap_or_default(),
        })
        .collect();
    ExecutionPanelView {
        status,
        progress: run.map(|r| r.progress).unwrap_or(0),
        execution_id: run.map(|r| r.id.clone()),
        current_node: run.and_then(|r| r.current_node.clone()),
        failure_reason: run.and_then(|r| r.failure_reason.clone()),
        nodes,
        log: manager.log().lines().cloned().collect(),
        can_start: status == RunStatus::Idle || status.is_terminal(),
        can_pause: status == RunStatus::Running,
        can_resume: status == RunStatus::Paused,
        can_stop: matches!(status, RunStatus::Running | RunStatus::Paused),
    }
}

/// Per-node canvas badge overlay for the current run, if any.
pub fn node_status_overlay(manager: &ExecutionManager) -> HashMap<String, NodeStatus> {
    match manager.run() {
        Some(run) => run
            .node_status
            .iter()
            .map(|(id, status)| (id.clone(), status.as_node_status()))
            .collect(),
        None => HashMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ExecuteResponse;
    use crate::graph::{Edge, Node, NodeKind, NodeShape};
    use crate::notify::ConfirmRequest;
    use async_trait::async_trait;
    use futures_util::SinkExt;
    use std::sync::Mutex;
    use std::time::Duration;

    fn node(id: &str, kind: NodeKind) -> Node {
        Node {
            id: id.to_string(),
            kind,
            name: id.to_uppercase(),
            shape: NodeShape::Rounded,
            icon: String::new(),
            color: String::new(),
            x: 0.0,
            y: 0.0,
            status: Default::default(),
        }
    }

    fn make_graph() -> Graph {
        let mut g = Graph::new();
        g.push_node(node("a", NodeKind::Start));
        g.push_node(node("b", NodeKind::End));
        g.push_edge(Edge::new("a", "b"));
        g
    }

    #[derive(Default)]
    struct RecordingNotifier {
        toasts: Mutex<Vec<(ToastKind, String)>>,
    }

    impl RecordingNotifier {
        fn toasts(&self) -> Vec<(ToastKind, String)> {
            self.toasts.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn toast(&self, kind: ToastKind, message: &str) {
            self.toasts.lock().unwrap().push((kind, message.to_string()));
        }

        fn confirm(&self, _request: ConfirmRequest) {}
    }

    #[derive(Default)]
    struct FakeExecutionApi {
        executes: Mutex<Vec<ExecuteRequest>>,
        pauses: Mutex<Vec<String>>,
        resumes: Mutex<Vec<String>>,
        stops: Mutex<Vec<String>>,
        fail_stop: bool,
    }

    #[async_trait]
    impl ExecutionApi for FakeExecutionApi {
        async fn execute(&self, request: &ExecuteRequest) -> AppResult<ExecuteResponse> {
            self.executes.lock().unwrap().push(request.clone());
            Ok(ExecuteResponse {
                execution_id: "exec-1".to_string(),
            })
        }

        async fn pause(&self, execution_id: &str) -> AppResult<()> {
            self.pauses.lock().unwrap().push(execution_id.to_string());
            Ok(())
        }

        async fn resume(&self, execution_id: &str) -> AppResult<()> {
            self.resumes.lock().unwrap().push(execution_id.to_string());
            Ok(())
        }

        async fn stop(&self, execution_id: &str) -> AppResult<()> {
            self.stops.lock().unwrap().push(execution_id.to_string());
            if self.fail_stop {
                return Err(AppError::Api("executor unreachable".to_string()));
            }
            Ok(())
        }

        fn channel_url(&self, execution_id: &str) -> AppResult<Url> {
            Ok(Url::parse(&format!("ws://127.0.0.1:9/ws/executions/{execution_id}")).unwrap())
        }
    }

    fn manager() -> ExecutionManager {
        ExecutionManager::new(ChannelConfig::default())
    }

    fn msg(id: &str, message: ChannelMessage) -> ChannelEvent {
        ChannelEvent::message(id, message)
    }

    #[test]
    fn test_run_completes_through_node_events() {
        let notifier = RecordingNotifier::default();
        let mut mgr = manager();
        let graph = make_graph();
        mgr.begin_run(&graph, "exec-1");
        assert_eq!(mgr.status(), RunStatus::Running);

        for event in [
            msg("exec-1", ChannelMessage::NodeStart { node_id: "a".to_string() }),
            msg("exec-1", ChannelMessage::NodeComplete { node_id: "a".to_string() }),
            msg("exec-1", ChannelMessage::NodeStart { node_id: "b".to_string() }),
            msg("exec-1", ChannelMessage::NodeComplete { node_id: "b".to_string() }),
            msg("exec-1", ChannelMessage::Complete { status: RunOutcome::Success }),
        ] {
            mgr.apply_event(event, &notifier);
        }

        let run = mgr.run().unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.progress, 100);
        assert_eq!(run.node_status["a"], NodeRunStatus::Completed);
        assert_eq!(run.node_status["b"], NodeRunStatus::Completed);
        assert!(toast_contains(&notifier, ToastKind::Success, "completed"));
    }

    fn toast_contains(notifier: &RecordingNotifier, kind: ToastKind, needle: &str) -> bool {
        notifier
            .toasts()
            .iter()
            .any(|(k, m)| *k == kind && m.contains(needle))
    }

    #[tokio::test]
    async fn test_stop_is_immediate_and_late_events_are_ignored() {
        let notifier = RecordingNotifier::default();
        let api = FakeExecutionApi::default();
        let mut mgr = manager();
        let graph = make_graph();
        mgr.begin_run(&graph, "exec-2");
        mgr.apply_event(
            msg("exec-2", ChannelMessage::NodeStart { node_id: "a".to_string() }),
            &notifier,
        );

        mgr.stop(&api, &notifier).await.unwrap();
        assert_eq!(mgr.status(), RunStatus::Stopped);
        assert!(!mgr.channel_open());
        assert_eq!(api.stops.lock().unwrap().clone(), vec!["exec-2".to_string()]);

        // Late message for the same run id: terminal state absorbs it.
        mgr.apply_event(
            msg("exec-2", ChannelMessage::NodeComplete { node_id: "a".to_string() }),
            &notifier,
        );
        let run = mgr.run().unwrap();
        assert_eq!(run.status, RunStatus::Stopped);
        assert_eq!(run.node_status["a"], NodeRunStatus::Running, "stale event dropped");
    }

    #[tokio::test]
    async fn test_failed_stop_request_keeps_local_stop() {
        let notifier = RecordingNotifier::default();
        let api = FakeExecutionApi {
            fail_stop: true,
            ..Default::default()
        };
        let mut mgr = manager();
        mgr.begin_run(&make_graph(), "exec-2b");

        mgr.stop(&api, &notifier).await.unwrap();
        assert_eq!(mgr.status(), RunStatus::Stopped);
        assert!(toast_contains(&notifier, ToastKind::Warning, "Stop request"));
    }

    #[test]
    fn test_connection_loss_exhausts_retries_then_fails() {
        let notifier = RecordingNotifier::default();
        let mut config = ChannelConfig::default();
        config.retry.max_attempts = 2;
        config.retry.base_delay_ms = 0;
        let mut mgr = ExecutionManager::new(config);
        mgr.begin_run(&make_graph(), "exec-3");

        mgr.apply_event(ChannelEvent::closed("exec-3", "transport error"), &notifier);
        assert_eq!(mgr.status(), RunStatus::Running);
        assert!(mgr.reconnect_due(), "zero backoff is due immediately");

        mgr.apply_event(ChannelEvent::closed("exec-3", "transport error"), &notifier);
        assert_eq!(mgr.status(), RunStatus::Running);

        // Third drop exceeds max_attempts = 2.
        mgr.apply_event(ChannelEvent::closed("exec-3", "transport error"), &notifier);
        let run = mgr.run().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.failure_reason.as_deref().unwrap().contains("Connection lost"));
        assert!(!mgr.reconnect_due(), "no further reconnect attempts");
        assert!(toast_contains(&notifier, ToastKind::Error, "Connection"));

        // Another drop event after the terminal transition changes nothing.
        mgr.apply_event(ChannelEvent::closed("exec-3", "transport error"), &notifier);
        assert_eq!(mgr.status(), RunStatus::Failed);
    }

    #[test]
    fn test_reconnect_counter_resets_on_traffic() {
        let notifier = RecordingNotifier::default();
        let mut config = ChannelConfig::default();
        config.retry.max_attempts = 1;
        config.retry.base_delay_ms = 0;
        let mut mgr = ExecutionManager::new(config);
        mgr.begin_run(&make_graph(), "exec-3b");

        mgr.apply_event(ChannelEvent::closed("exec-3b", "blip"), &notifier);
        assert_eq!(mgr.status(), RunStatus::Running);

        // Any message after the drop counts as a successful reconnect.
        mgr.apply_event(
            msg("exec-3b", ChannelMessage::Progress { progress: 10, current_node: None }),
            &notifier,
        );
        mgr.apply_event(ChannelEvent::closed("exec-3b", "blip"), &notifier);
        assert_eq!(mgr.status(), RunStatus::Running, "counter restarted after traffic");
    }

    #[tokio::test]
    async fn test_reopened_channel_streams_into_the_run() {
        let notifier = RecordingNotifier::default();
        let mut config = ChannelConfig::default();
        config.retry.base_delay_ms = 0;
        let mut mgr = ExecutionManager::new(config);
        mgr.begin_run(&make_graph(), "exec-12");

        mgr.apply_event(ChannelEvent::closed("exec-12", "blip"), &notifier);
        assert!(mgr.reconnect_due());
        assert!(!mgr.channel_open());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(tokio_tungstenite::tungstenite::Message::Text(
                r#"{"type":"status","status":"paused"}"#.to_string(),
            ))
            .await
            .unwrap();
            ws.close(None).await.unwrap();
        });

        let url = Url::parse(&format!("ws://{addr}/ws/executions/exec-12")).unwrap();
        mgr.reopen_channel(url);
        assert!(mgr.channel_open());
        assert!(!mgr.reconnect_due(), "pending reconnect consumed");

        // Pump until the reopened channel delivers the status frame.
        let mut paused = false;
        for _ in 0..100 {
            for event in mgr.drain_events() {
                mgr.apply_event(event, &notifier);
            }
            if mgr.status() == RunStatus::Paused {
                paused = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(paused, "status from the reopened channel must apply");
        assert!(mgr.log().lines().any(|l| l.message.contains("Connection restored")));

        server.await.unwrap();
    }

    #[test]
    fn test_events_for_other_runs_are_dropped() {
        let notifier = RecordingNotifier::default();
        let mut mgr = manager();
        mgr.begin_run(&make_graph(), "exec-4");

        mgr.apply_event(
            msg("exec-old", ChannelMessage::Complete { status: RunOutcome::Failed }),
            &notifier,
        );
        assert_eq!(mgr.status(), RunStatus::Running);
        assert!(notifier.toasts().is_empty());
    }

    #[tokio::test]
    async fn test_pause_and_resume_are_request_only() {
        let notifier = RecordingNotifier::default();
        let api = FakeExecutionApi::default();
        let mut mgr = manager();
        mgr.begin_run(&make_graph(), "exec-5");

        mgr.pause(&api).await.unwrap();
        assert_eq!(mgr.status(), RunStatus::Running, "status waits for the channel");
        assert_eq!(api.pauses.lock().unwrap().clone(), vec!["exec-5".to_string()]);

        assert!(mgr.resume(&api).await.is_err(), "cannot resume a running run");

        mgr.apply_event(
            msg("exec-5", ChannelMessage::Status { status: RunStatus::Paused }),
            &notifier,
        );
        assert_eq!(mgr.status(), RunStatus::Paused);

        mgr.resume(&api).await.unwrap();
        assert_eq!(mgr.status(), RunStatus::Paused);
        mgr.apply_event(
            msg("exec-5", ChannelMessage::Status { status: RunStatus::Running }),
            &notifier,
        );
        assert_eq!(mgr.status(), RunStatus::Running);
    }

    #[tokio::test]
    async fn test_start_rejects_cyclic_graph() {
        let notifier = RecordingNotifier::default();
        let api = FakeExecutionApi::default();
        let mut mgr = manager();
        let mut graph = make_graph();
        graph.push_edge(Edge::new("b", "a"));

        let err = mgr
            .start("dag", &graph, &api, &notifier)
            .await
            .expect_err("cycle must be rejected");
        assert!(matches!(err, AppError::Validation(_)));
        assert!(mgr.run().is_none(), "no run state on rejection");
        assert!(api.executes.lock().unwrap().is_empty());
        assert!(toast_contains(&notifier, ToastKind::Error, "cycle"));
    }

    #[tokio::test]
    async fn test_start_submits_and_opens_channel() {
        let notifier = RecordingNotifier::default();
        let api = FakeExecutionApi::default();
        let mut mgr = manager();
        let graph = make_graph();

        let id = mgr.start("dag", &graph, &api, &notifier).await.unwrap();
        assert_eq!(id, "exec-1");
        assert_eq!(mgr.status(), RunStatus::Running);
        assert!(mgr.channel_open());

        let sent = api.executes.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].dag_id, "dag");
        assert_eq!(sent[0].nodes, vec!["a".to_string(), "b".to_string()]);

        // A second start while the first run is live is refused.
        assert!(mgr.start("dag", &graph, &api, &notifier).await.is_err());
    }

    #[test]
    fn test_node_error_does_not_end_the_run() {
        let notifier = RecordingNotifier::default();
        let mut mgr = manager();
        mgr.begin_run(&make_graph(), "exec-6");

        mgr.apply_event(
            msg(
                "exec-6",
                ChannelMessage::NodeError {
                    node_id: "a".to_string(),
                    error: "flaky upstream".to_string(),
                },
            ),
            &notifier,
        );
        let run = mgr.run().unwrap();
        assert_eq!(run.status, RunStatus::Running);
        assert_eq!(run.node_status["a"], NodeRunStatus::Error);
        assert!(mgr.log().lines().any(|l| l.message.contains("flaky upstream")));
    }

    #[test]
    fn test_progress_is_clamped() {
        let notifier = RecordingNotifier::default();
        let mut mgr = manager();
        mgr.begin_run(&make_graph(), "exec-7");
        mgr.apply_event(
            msg("exec-7", ChannelMessage::Progress { progress: 250, current_node: None }),
            &notifier,
        );
        assert_eq!(mgr.run().unwrap().progress, 100);
    }

    #[test]
    fn test_run_log_is_bounded() {
        let notifier = RecordingNotifier::default();
        let mut mgr = manager();
        mgr.begin_run(&make_graph(), "exec-8");
        for i in 0..RUN_LOG_LIMIT + 50 {
            mgr.apply_event(
                msg(
                    "exec-8",
                    ChannelMessage::Log {
                        level: LogLevel::Info,
                        message: format!("line {i}"),
                        node_id: None,
                    },
                ),
                &notifier,
            );
        }
        assert_eq!(mgr.log().len(), RUN_LOG_LIMIT);
        let first = mgr.log().lines().next().unwrap();
        assert!(!first.message.contains("line 0"), "oldest lines evicted");
    }

    #[test]
    fn test_render_execution_panel() {
        let notifier = RecordingNotifier::default();
        let mut mgr = manager();
        let graph = make_graph();

        let idle = render_execution(&mgr, &graph);
        assert_eq!(idle.status, RunStatus::Idle);
        assert!(idle.can_start);
        assert!(!idle.can_stop);
        assert_eq!(idle.nodes.len(), 2);
        assert_eq!(idle.nodes[0].status, NodeRunStatus::Pending);

        mgr.begin_run(&graph, "exec-9");
        mgr.apply_event(
            msg("exec-9", ChannelMessage::NodeStart { node_id: "a".to_string() }),
            &notifier,
        );
        let view = render_execution(&mgr, &graph);
        assert_eq!(view.status, RunStatus::Running);
        assert!(!view.can_start);
        assert!(view.can_pause);
        assert!(view.can_stop);
        assert_eq!(view.execution_id.as_deref(), Some("exec-9"));
        assert_eq!(view.current_node.as_deref(), Some("a"));
        assert_eq!(view.nodes[0].status, NodeRunStatus::Running);
        assert!(!view.log.is_empty());

        let overlay = node_status_overlay(&mgr);
        assert_eq!(overlay["a"], NodeStatus::Running);
        assert_eq!(overlay["b"], NodeStatus::Pending);
    }

    #[test]
    fn test_heartbeat_is_accepted_quietly() {
        let notifier = RecordingNotifier::default();
        let mut mgr = manager();
        mgr.begin_run(&make_graph(), "exec-10");
        let before = mgr.log().len();
        mgr.apply_event(
            msg("exec-10", ChannelMessage::Heartbeat { timestamp: Some(now_ms()) }),
            &notifier,
        );
        assert_eq!(mgr.status(), RunStatus::Running);
        assert_eq!(mgr.log().len(), before, "heartbeats do not spam the log");
    }
}
