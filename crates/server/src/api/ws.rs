//! WebSocket support for live job updates.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_LAG_EVENTS, WS_MESSAGES_SENT};
use crate::state::AppState;

/// WebSocket message sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// A running job reported a progress line.
    JobProgress { job_id: String, message: String },
    /// A job finished with a result image.
    JobCompleted {
        job_id: String,
        task_uuid: String,
        result_url: String,
    },
    /// A job failed or was cancelled.
    JobFailed {
        job_id: String,
        /// Error label, e.g. "timeout" or "cancelled".
        kind: String,
        error: String,
    },
}

impl WsMessage {
    fn type_label(&self) -> &'static str {
        match self {
            WsMessage::JobProgress { .. } => "job_progress",
            WsMessage::JobCompleted { .. } => "job_completed",
            WsMessage::JobFailed { .. } => "job_failed",
        }
    }
}

/// Broadcaster for WebSocket messages using tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct WsBroadcaster {
    sender: broadcast::Sender<WsMessage>,
}

impl WsBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn broadcast(&self, msg: WsMessage) {
        // No receivers is fine
        let _ = self.sender.send(msg);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WsMessage> {
        self.sender.subscribe()
    }

    pub fn job_progress(&self, job_id: &str, message: &str) {
        self.broadcast(WsMessage::JobProgress {
            job_id: job_id.to_string(),
            message: message.to_string(),
        });
    }

    pub fn job_completed(&self, job_id: &str, task_uuid: &str, result_url: &str) {
        self.broadcast(WsMessage::JobCompleted {
            job_id: job_id.to_string(),
            task_uuid: task_uuid.to_string(),
            result_url: result_url.to_string(),
        });
    }

    pub fn job_failed(&self, job_id: &str, kind: &str, error: &str) {
        self.broadcast(WsMessage::JobFailed {
            job_id: job_id.to_string(),
            kind: kind.to_string(),
            error: error.to_string(),
        });
    }
}

impl Default for WsBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.ws_broadcaster().subscribe();

    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();
    info!("WebSocket client connected");

    let send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(msg) => {
                    WS_MESSAGES_SENT
                        .with_label_values(&[msg.type_label()])
                        .inc();

                    match serde_json::to_string(&msg) {
                        Ok(json) => {
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                debug!("WebSocket send failed, client disconnected");
                                break;
                            }
                        }
                        Err(e) => {
                            error!("Failed to serialize WsMessage: {}", e);
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("WebSocket client lagged, skipped {} messages", n);
                    WS_LAG_EVENTS.inc();
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Broadcast channel closed");
                    break;
                }
            }
        }
    });

    // Clients only send close and ping frames
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => {
                debug!("WebSocket client requested close");
                break;
            }
            Ok(Message::Text(text)) => {
                debug!("Ignoring text message from client: {}", text.as_str());
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    send_task.abort();
    WS_CONNECTIONS_ACTIVE.dec();
    info!("WebSocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_wire_format() {
        let msg = WsMessage::JobFailed {
            job_id: "j1".to_string(),
            kind: "timeout".to_string(),
            error: "Task processing timed out. Please try again.".to_string(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "job_failed");
        assert_eq!(json["kind"], "timeout");
        assert_eq!(msg.type_label(), "job_failed");
    }

    #[tokio::test]
    async fn test_broadcaster_delivers_to_subscribers() {
        let broadcaster = WsBroadcaster::new(8);
        let mut rx = broadcaster.subscribe();

        broadcaster.job_progress("j1", "Uploading model image...");
        broadcaster.job_completed("j1", "t1", "https://cdn/r.png");

        assert_eq!(
            rx.recv().await.unwrap(),
            WsMessage::JobProgress {
                job_id: "j1".to_string(),
                message: "Uploading model image...".to_string()
            }
        );
        assert!(matches!(
            rx.recv().await.unwrap(),
            WsMessage::JobCompleted { .. }
        ));
    }

    #[test]
    fn test_broadcast_without_subscribers_is_noop() {
        WsBroadcaster::default().job_failed("j1", "cancelled", "Try-on request was cancelled");
    }
}
