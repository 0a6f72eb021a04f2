//! services/api/src/web/ws_handler.rs
//!
//! This is the entry point and control loop for a meditation WebSocket
//! connection. It owns the session state machine and delegates the countdown
//! to a cancellable background task.

use crate::web::{
    meditation_task::countdown_process,
    protocol::{ClientMessage, ServerMessage},
    state::AppState,
};
use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use devotional_core::meditation::MeditationSession;
use devotional_core::ports::{AudioSink, PortError, PortResult};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// The shared sink half of a WebSocket connection.
pub type SharedSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// The session state machine shared between the receive loop and the
/// countdown task.
pub type SharedSession = Arc<Mutex<MeditationSession<WsAudioSink>>>;

/// Serializes a `ServerMessage` and sends it over the shared sink.
pub async fn send_message(sender: &SharedSender, message: &ServerMessage) -> PortResult<()> {
    let json =
        serde_json::to_string(message).map_err(|e| PortError::Unexpected(e.to_string()))?;
    sender
        .lock()
        .await
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| PortError::Network("WebSocket client is gone".to_string()))
}

//=========================================================================================
// WsAudioSink
//=========================================================================================

/// The playback handle for a connected client: playback itself happens on
/// the device, so acquiring and releasing the resource means telling the
/// client which track to loop and when to stop.
pub struct WsAudioSink {
    sender: SharedSender,
}

impl WsAudioSink {
    pub fn new(sender: SharedSender) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl AudioSink for WsAudioSink {
    async fn start_looping(&mut self, track_id: &str) -> PortResult<()> {
        send_message(
            &self.sender,
            &ServerMessage::AudioStarted {
                track_id: track_id.to_string(),
            },
        )
        .await
    }

    async fn release(&mut self) -> PortResult<()> {
        send_message(&self.sender, &ServerMessage::AudioReleased).await
    }
}

//=========================================================================================
// Connection Handling
//=========================================================================================

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn meditate_ws_handler(
    ws: WebSocketUpgrade,
    State(_app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>, // from auth middleware
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, user_id))
}

async fn handle_socket(socket: WebSocket, user_id: Uuid) {
    info!("Meditation session opened for user: {}", user_id);

    // The sender is wrapped in an Arc<Mutex<>> to allow for shared mutable
    // access across tasks.
    let (sender, mut receiver) = socket.split();
    let ws_sender: SharedSender = Arc::new(Mutex::new(sender));

    let session: SharedSession = Arc::new(Mutex::new(MeditationSession::new(WsAudioSink::new(
        ws_sender.clone(),
    ))));

    let mut countdown_token = CancellationToken::new();
    let mut countdown_handle: Option<JoinHandle<()>> = None;

    // --- Main Message Loop ---
    loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => {
                handle_text_message(
                    text.to_string(),
                    &session,
                    &ws_sender,
                    &mut countdown_token,
                    &mut countdown_handle,
                )
                .await;
            }
            Some(Ok(Message::Close(_))) => {
                info!("Client sent close message.");
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(_)) | None => {
                info!("Client disconnected.");
                break;
            }
        }
    }

    // --- Cleanup ---
    // Leaving the view must release playback no matter which state the
    // machine is in.
    countdown_token.cancel();
    if let Some(handle) = countdown_handle {
        handle.abort();
    }
    let mut session = session.lock().await;
    if let Err(e) = session.leave().await {
        // The usual cause is the client being gone already.
        warn!("Could not release audio on disconnect: {}", e);
    }
    info!("Meditation session closed for user: {}", user_id);
}

/// Helper function to handle the logic for different `ClientMessage`
/// variants.
async fn handle_text_message(
    text: String,
    session_lock: &SharedSession,
    ws_sender: &SharedSender,
    countdown_token: &mut CancellationToken,
    countdown_handle: &mut Option<JoinHandle<()>>,
) {
    match serde_json::from_str::<ClientMessage>(&text) {
        Ok(ClientMessage::Start {
            track_id,
            duration_minutes,
        }) => {
            info!(
                "Start message received: track={}, duration={}min",
                track_id, duration_minutes
            );
            // A running countdown belongs to the previous session.
            countdown_token.cancel();

            let started = {
                let mut session = session_lock.lock().await;
                async {
                    session.stop().await?;
                    session.choose_duration(duration_minutes)?;
                    session.start(&track_id).await
                }
                .await
            };

            match started {
                Ok(duration_secs) => {
                    let message = ServerMessage::SessionStarted {
                        track_id: track_id.clone(),
                        duration_secs,
                    };
                    if send_message(ws_sender, &message).await.is_err() {
                        return;
                    }

                    *countdown_token = CancellationToken::new();
                    let task = {
                        let session_lock = session_lock.clone();
                        let ws_sender = ws_sender.clone();
                        let token = countdown_token.clone();
                        tokio::spawn(async move {
                            if let Err(e) =
                                countdown_process(session_lock, ws_sender, token).await
                            {
                                warn!("Countdown process ended early: {:?}", e);
                            }
                        })
                    };
                    *countdown_handle = Some(task);
                }
                Err(e) => {
                    let _ = send_message(
                        ws_sender,
                        &ServerMessage::Error {
                            message: e.to_string(),
                        },
                    )
                    .await;
                }
            }
        }
        Ok(ClientMessage::Stop) => {
            info!("Stop message received.");
            countdown_token.cancel();
            let stopped = {
                let mut session = session_lock.lock().await;
                session.stop().await
            };
            match stopped {
                Ok(()) => {
                    let _ = send_message(ws_sender, &ServerMessage::SessionStopped).await;
                }
                Err(e) => {
                    let _ = send_message(
                        ws_sender,
                        &ServerMessage::Error {
                            message: e.to_string(),
                        },
                    )
                    .await;
                }
            }
        }
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
        }
    }
}
