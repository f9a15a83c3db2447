use super::messages::{ChannelEvent, ChannelMessage, ClientMessage};
use super::retry::RetryPolicy;
use crate::store::now_ms;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, sleep_until, Instant};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelConfig {
    /// How often the editor pings the executor.
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
    /// No traffic at all for this long means the connection is dead, even if
    /// the socket never errored.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_ping_interval_ms() -> u64 {
    30_000
}

fn default_idle_timeout_ms() -> u64 {
    90_000
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            ping_interval_ms: default_ping_interval_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Handle to a live channel task. Events arrive on an unbounded queue and
/// are drained by the editor's poll; dropping the handle closes the socket.
pub struct ChannelHandle {
    execution_id: String,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl ChannelHandle {
    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    pub fn try_recv(&mut self) -> Option<ChannelEvent> {
        self.events.try_recv().ok()
    }

    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }

    /// Ask the task to close the socket. Idempotent.
    pub fn close(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Connect to the executor's channel for one run and stream its messages.
/// The task ends on shutdown, on any transport error, or when nobody is
/// left to receive events.
pub fn open_channel(url: Url, execution_id: &str, config: &ChannelConfig) -> ChannelHandle {
    let (event_tx, events) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(channel_task(
        url,
        execution_id.to_string(),
        config.clone(),
        event_tx,
        shutdown_rx,
    ));
    ChannelHandle {
        execution_id: execution_id.to_string(),
        events,
        shutdown: Some(shutdown_tx),
    }
}

async fn channel_task(
    url: Url,
    execution_id: String,
    config: ChannelConfig,
    events: mpsc::UnboundedSender<ChannelEvent>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let ws = match connect_async(url.as_str()).await {
        Ok((ws, _response)) => ws,
        Err(e) => {
            eprintln!("[channel] connect failed for run {execution_id}: {e}");
            let _ = events.send(ChannelEvent::closed(
                &execution_id,
                format!("connect failed: {e}"),
            ));
            return;
        }
    };
    eprintln!("[channel] connected for run {execution_id}");

    let (mut write, mut read) = ws.split();
    let mut ping = interval(Duration::from_millis(config.ping_interval_ms));
    let idle = Duration::from_millis(config.idle_timeout_ms);
    let mut deadline = Instant::now() + idle;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                let _ = write.send(Message::Close(None)).await;
                eprintln!("[channel] closed by editor for run {execution_id}");
                return;
            }
            _ = ping.tick() => {
                let payload = serde_json::to_string(&ClientMessage::Ping { timestamp: now_ms() })
                    .unwrap_or_else(|_| "{}".to_string());
                if let Err(e) = write.send(Message::Text(payload)).await {
                    let _ = events.send(ChannelEvent::closed(&execution_id, format!("ping failed: {e}")));
                    return;
                }
            }
            _ = sleep_until(deadline) => {
                eprintln!("[channel] idle timeout for run {execution_id}");
                let _ = write.send(Message::Close(None)).await;
                let _ = events.send(ChannelEvent::closed(&execution_id, "idle timeout: no traffic from executor"));
                return;
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        deadline = Instant::now() + idle;
                        match serde_json::from_str::<ChannelMessage>(&text) {
                            Ok(message) => {
                                if events.send(ChannelEvent::message(&execution_id, message)).is_err() {
                                    // Editor went away; nothing left to report to.
                                    return;
                                }
                            }
                            Err(e) => eprintln!("[channel] ignoring unparseable frame: {e}"),
                        }
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_))) => {
                        deadline = Instant::now() + idle;
                    }
                    Some(Ok(Message::Close(_))) => {
                        let _ = events.send(ChannelEvent::closed(&execution_id, "closed by executor"));
                        return;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        let _ = events.send(ChannelEvent::closed(&execution_id, format!("transport error: {e}")));
                        return;
                    }
                    None => {
                        let _ = events.send(ChannelEvent::closed(&execution_id, "stream ended"));
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::messages::ChannelPayload;

    #[test]
    fn test_config_defaults() {
        let config = ChannelConfig::default();
        assert_eq!(config.ping_interval_ms, 30_000);
        assert_eq!(config.idle_timeout_ms, 90_000);
        assert_eq!(config.retry.multiplier, 1.5);

        let parsed: ChannelConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, config);

        let parsed: ChannelConfig =
            serde_json::from_str(r#"{"idleTimeoutMs": 5000}"#).unwrap();
        assert_eq!(parsed.idle_timeout_ms, 5_000);
        assert_eq!(parsed.ping_interval_ms, 30_000);
    }

    #[tokio::test]
    async fn test_failed_connect_emits_closed_event() {
        // Bind and drop a listener to get a port nothing is listening on.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let url = Url::parse(&format!("ws://127.0.0.1:{port}/ws/executions/run-1")).unwrap();
        let mut handle = open_channel(url, "run-1", &ChannelConfig::default());

        let event = handle.recv().await.expect("closed event");
        assert_eq!(event.execution_id, "run-1");
        match event.payload {
            ChannelPayload::Closed { reason } => assert!(reason.contains("connect failed")),
            other => panic!("expected closed event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_streams_messages_then_reports_close() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(Message::Text(
                r#"{"type":"node_start","node_id":"a"}"#.to_string(),
            ))
            .await
            .unwrap();
            ws.send(Message::Text(
                r#"{"type":"complete","status":"success"}"#.to_string(),
            ))
            .await
            .unwrap();
            ws.close(None).await.unwrap();
        });

        let url = Url::parse(&format!("ws://{addr}/ws/executions/run-2")).unwrap();
        let mut handle = open_channel(url, "run-2", &ChannelConfig::default());

        let first = handle.recv().await.expect("first event");
        assert_eq!(
            first.payload,
            ChannelPayload::Message(ChannelMessage::NodeStart { node_id: "a".to_string() })
        );

        let second = handle.recv().await.expect("second event");
        assert!(matches!(
            second.payload,
            ChannelPayload::Message(ChannelMessage::Complete { .. })
        ));

        let third = handle.recv().await.expect("close event");
        assert!(matches!(third.payload, ChannelPayload::Closed { .. }));

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_silent_executor_is_pinged_then_timed_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Accept the socket and count ping frames without ever sending
        // anything back.
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let mut pings = 0usize;
            while let Some(Ok(frame)) = ws.next().await {
                if let Message::Text(text) = frame {
                    if serde_json::from_str::<ClientMessage>(&text).is_ok() {
                        pings += 1;
                    }
                }
            }
            pings
        });

        let config = ChannelConfig {
            ping_interval_ms: 40,
            idle_timeout_ms: 250,
            retry: RetryPolicy::default(),
        };
        let url = Url::parse(&format!("ws://{addr}/ws/executions/run-4")).unwrap();
        let mut handle = open_channel(url, "run-4", &config);

        let event = handle.recv().await.expect("idle close event");
        assert_eq!(event.execution_id, "run-4");
        match event.payload {
            ChannelPayload::Closed { reason } => assert!(reason.contains("idle timeout")),
            other => panic!("expected idle close, got {other:?}"),
        }

        let pings = server.await.unwrap();
        assert!(pings >= 2, "pings must flow on the interval, saw {pings}");
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let url = Url::parse(&format!("ws://127.0.0.1:{port}/")).unwrap();
        let mut handle = open_channel(url, "run-3", &ChannelConfig::default());
        handle.close();
        handle.close();
    }
}
