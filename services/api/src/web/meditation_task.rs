//! services/api/src/web/meditation_task.rs
//!
//! This module contains the asynchronous "worker" function driving the
//! one-second countdown of an active meditation session.

use crate::web::protocol::ServerMessage;
use crate::web::ws_handler::{send_message, SharedSession};
use axum::extract::ws::{Message, WebSocket};
use devotional_core::meditation::Tick;
use devotional_core::ports::{PortError, PortResult};
use futures::stream::SplitSink;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// The countdown loop for one active session.
///
/// Ticks the session once per second and streams the remaining time to the
/// client until the countdown completes, the session is stopped, or the
/// token is cancelled. The session machine itself releases the audio
/// resource when the countdown reaches zero.
pub async fn countdown_process(
    session_lock: SharedSession,
    ws_sender: Arc<Mutex<SplitSink<WebSocket, Message>>>,
    cancellation_token: CancellationToken,
) -> PortResult<()> {
    info!("Countdown started.");
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    // The first tick of a tokio interval fires immediately; consume it so
    // the countdown decrements a full second after the session starts.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                info!("Countdown cancelled.");
                return Ok(());
            }
            _ = interval.tick() => {}
        }

        let outcome = {
            let mut session = session_lock.lock().await;
            session
                .tick()
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?
        };

        match outcome {
            Tick::Running { remaining_secs } => {
                send_message(&ws_sender, &ServerMessage::Tick { remaining_secs }).await?;
            }
            Tick::Completed => {
                info!("Meditation countdown finished.");
                send_message(&ws_sender, &ServerMessage::SessionComplete).await?;
                return Ok(());
            }
            Tick::Inactive => {
                // Stopped from the other side of the lock; nothing to emit.
                return Ok(());
            }
        }
    }
}
