use super::RunStatus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    Failed,
}

/// Executor-to-editor messages on the run channel. The wire format is one
/// JSON object per text frame, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelMessage {
    Status {
        status: RunStatus,
    },
    Progress {
        progress: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current_node: Option<String>,
    },
    NodeStart {
        node_id: String,
    },
    NodeComplete {
        node_id: String,
    },
    NodeError {
        node_id: String,
        error: String,
    },
    Log {
        #[serde(default)]
        level: LogLevel,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        node_id: Option<String>,
    },
    Complete {
        status: RunOutcome,
    },
    /// Liveness signal; carries no state. Its arrival resets the idle clock.
    Heartbeat {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },
}

/// Editor-to-executor messages. Pings keep intermediaries from cutting an
/// otherwise quiet connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping { timestamp: i64 },
}

/// Envelope the transport emits toward the editor. The transport stamps the
/// execution id its channel is scoped to, so late events from a dead run are
/// identifiable no matter what the payload says.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEvent {
    pub execution_id: String,
    pub payload: ChannelPayload,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelPayload {
    Message(ChannelMessage),
    /// The connection dropped without the editor asking for it.
    Closed { reason: String },
}

impl ChannelEvent {
    pub fn message(execution_id: impl Into<String>, message: ChannelMessage) -> Self {
        Self {
            execution_id: execution_id.into(),
            payload: ChannelPayload::Message(message),
        }
    }

    pub fn closed(execution_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            payload: ChannelPayload::Closed {
                reason: reason.into(),
            },
        }
    }
}
