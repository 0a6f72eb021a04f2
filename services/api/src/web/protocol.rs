//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the app client and the API
//! server for the meditation session.

use serde::{Deserialize, Serialize};

//=========================================================================================
// Messages Sent FROM the Client (App) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Starts (or restarts) a session: fixes the countdown duration and
    /// begins looping playback of the chosen track.
    Start {
        track_id: String,
        duration_minutes: u32,
    },

    /// Ends the session early. Playback is released and the countdown stops.
    Stop,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (App)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms the session is running and the countdown is armed.
    SessionStarted { track_id: String, duration_secs: u32 },

    /// Instructs the client to begin looping playback of a track. Always
    /// preceded by `AudioReleased` when another track was playing.
    AudioStarted { track_id: String },

    /// Instructs the client to stop playback and free the audio resource.
    AudioReleased,

    /// One second of countdown has elapsed.
    Tick { remaining_secs: u32 },

    /// The countdown reached zero; the session is over.
    SessionComplete,

    /// The session was stopped before the countdown finished.
    SessionStopped,

    /// Reports a fatal error to the client, which should display an error
    /// message.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_start_message_deserializes() {
        let json = r#"{"type":"start","track_id":"still-waters","duration_minutes":15}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::Start {
                track_id,
                duration_minutes,
            } => {
                assert_eq!(track_id, "still-waters");
                assert_eq!(duration_minutes, 15);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn server_tick_message_uses_snake_case_tag() {
        let json = serde_json::to_string(&ServerMessage::Tick { remaining_secs: 42 }).unwrap();
        assert_eq!(json, r#"{"type":"tick","remaining_secs":42}"#);
    }
}
