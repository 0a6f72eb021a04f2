//! crates/devotional_core/src/meditation.rs
//!
//! The meditation session: duration selection, track selection, and an
//! active countdown over a looping audio track. The session owns the only
//! playback handle; whatever path ends the session releases it.

use crate::ports::{AudioSink, PortError};

/// Durations offered by the selection screen, in minutes. The machine
/// accepts any positive duration.
pub const DURATION_OPTIONS_MINUTES: [u32; 3] = [15, 30, 60];

/// A looping audio track offered by the meditation screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeditationTrack {
    pub id: &'static str,
    pub title: &'static str,
}

/// The built-in track catalog.
pub const TRACKS: [MeditationTrack; 3] = [
    MeditationTrack {
        id: "still-waters",
        title: "Still Waters",
    },
    MeditationTrack {
        id: "evening-psalm",
        title: "Evening Psalm",
    },
    MeditationTrack {
        id: "quiet-dawn",
        title: "Quiet Dawn",
    },
];

pub fn track_by_id(id: &str) -> Option<&'static MeditationTrack> {
    TRACKS.iter().find(|t| t.id == id)
}

//=========================================================================================
// State Machine
//=========================================================================================

/// The observable phase of a session: `Idle → DurationChosen → Active → Idle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    DurationChosen { duration_secs: u32 },
    Active { track_id: String, remaining_secs: u32 },
}

/// The result of one countdown tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    /// Still counting down.
    Running { remaining_secs: u32 },
    /// The countdown reached zero; audio has been released.
    Completed,
    /// No active session; nothing happened.
    Inactive,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("duration must be at least one minute")]
    InvalidDuration,
    #[error("no duration has been chosen yet")]
    NoDurationChosen,
    #[error("cannot change the duration while a session is running")]
    SessionActive,
    #[error("unknown meditation track: {0}")]
    UnknownTrack(String),
    #[error("audio playback failed: {0}")]
    Audio(#[source] PortError),
}

struct ActiveState {
    track_id: String,
    remaining_secs: u32,
}

/// A single user's meditation session over an injected audio sink.
///
/// At most one playback handle is ever active: `start` releases the
/// previous track before acquiring the next, and every terminating path
/// (countdown completion, explicit stop, leaving the view) releases audio.
pub struct MeditationSession<S: AudioSink> {
    sink: S,
    duration_secs: Option<u32>,
    active: Option<ActiveState>,
}

impl<S: AudioSink> MeditationSession<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            duration_secs: None,
            active: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        match (&self.active, self.duration_secs) {
            (Some(active), _) => SessionPhase::Active {
                track_id: active.track_id.clone(),
                remaining_secs: active.remaining_secs,
            },
            (None, Some(duration_secs)) => SessionPhase::DurationChosen { duration_secs },
            (None, None) => SessionPhase::Idle,
        }
    }

    /// Fixes the countdown length. Rejected while a session is running.
    pub fn choose_duration(&mut self, minutes: u32) -> Result<u32, SessionError> {
        if self.active.is_some() {
            return Err(SessionError::SessionActive);
        }
        if minutes == 0 {
            return Err(SessionError::InvalidDuration);
        }
        let secs = minutes * 60;
        self.duration_secs = Some(secs);
        Ok(secs)
    }

    /// Begins looping playback of `track_id` and arms the countdown with the
    /// chosen duration. Starting over an already-active session releases the
    /// previous track first.
    pub async fn start(&mut self, track_id: &str) -> Result<u32, SessionError> {
        let duration_secs = self.duration_secs.ok_or(SessionError::NoDurationChosen)?;
        let track =
            track_by_id(track_id).ok_or_else(|| SessionError::UnknownTrack(track_id.to_string()))?;

        if self.active.take().is_some() {
            self.sink.release().await.map_err(SessionError::Audio)?;
        }
        self.sink
            .start_looping(track.id)
            .await
            .map_err(SessionError::Audio)?;

        self.active = Some(ActiveState {
            track_id: track.id.to_string(),
            remaining_secs: duration_secs,
        });
        Ok(duration_secs)
    }

    /// One second of countdown. Reaching zero releases audio and returns the
    /// machine to `Idle` (the chosen duration is kept for a quick restart).
    pub async fn tick(&mut self) -> Result<Tick, SessionError> {
        let Some(active) = self.active.as_mut() else {
            return Ok(Tick::Inactive);
        };
        active.remaining_secs = active.remaining_secs.saturating_sub(1);
        let remaining_secs = active.remaining_secs;
        if remaining_secs == 0 {
            self.active = None;
            self.sink.release().await.map_err(SessionError::Audio)?;
            return Ok(Tick::Completed);
        }
        Ok(Tick::Running { remaining_secs })
    }

    /// Explicit user stop: releases audio, keeps the chosen duration.
    pub async fn stop(&mut self) -> Result<(), SessionError> {
        if self.active.take().is_some() {
            self.sink.release().await.map_err(SessionError::Audio)?;
        }
        Ok(())
    }

    /// Leaving the session view: release audio whatever the phase and reset
    /// to `Idle`. Release errors are returned but the machine still resets.
    pub async fn leave(&mut self) -> Result<(), SessionError> {
        let was_active = self.active.take().is_some();
        self.duration_secs = None;
        if was_active {
            self.sink.release().await.map_err(SessionError::Audio)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::PortResult;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Records every sink operation so tests can assert ordering and the
    /// one-active-handle invariant.
    #[derive(Clone, Default)]
    struct RecordingSink {
        log: Arc<Mutex<Vec<String>>>,
        playing: Arc<Mutex<Option<String>>>,
    }

    impl RecordingSink {
        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }

        fn playing(&self) -> Option<String> {
            self.playing.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AudioSink for RecordingSink {
        async fn start_looping(&mut self, track_id: &str) -> PortResult<()> {
            self.log.lock().unwrap().push(format!("start:{}", track_id));
            *self.playing.lock().unwrap() = Some(track_id.to_string());
            Ok(())
        }

        async fn release(&mut self) -> PortResult<()> {
            self.log.lock().unwrap().push("release".to_string());
            *self.playing.lock().unwrap() = None;
            Ok(())
        }
    }

    fn session() -> (MeditationSession<RecordingSink>, RecordingSink) {
        let sink = RecordingSink::default();
        (MeditationSession::new(sink.clone()), sink)
    }

    #[tokio::test]
    async fn full_session_walks_idle_chosen_active_idle() {
        let (mut s, sink) = session();
        assert_eq!(s.phase(), SessionPhase::Idle);

        s.choose_duration(15).unwrap();
        assert_eq!(
            s.phase(),
            SessionPhase::DurationChosen { duration_secs: 900 }
        );

        let duration = s.start("still-waters").await.unwrap();
        assert_eq!(duration, 900);
        assert_eq!(sink.playing().as_deref(), Some("still-waters"));

        assert_eq!(
            s.tick().await.unwrap(),
            Tick::Running { remaining_secs: 899 }
        );
    }

    #[tokio::test]
    async fn countdown_reaching_zero_releases_audio() {
        let (mut s, sink) = session();
        s.choose_duration(1).unwrap();
        s.start("quiet-dawn").await.unwrap();

        for _ in 0..59 {
            assert!(matches!(s.tick().await.unwrap(), Tick::Running { .. }));
        }
        assert_eq!(s.tick().await.unwrap(), Tick::Completed);
        assert_eq!(sink.playing(), None);
        // Back to the selection screen with the duration remembered.
        assert_eq!(
            s.phase(),
            SessionPhase::DurationChosen { duration_secs: 60 }
        );
    }

    #[tokio::test]
    async fn starting_a_new_track_releases_the_previous_one_first() {
        let (mut s, sink) = session();
        s.choose_duration(30).unwrap();
        s.start("still-waters").await.unwrap();
        s.start("evening-psalm").await.unwrap();

        assert_eq!(
            sink.log(),
            vec!["start:still-waters", "release", "start:evening-psalm"]
        );
        assert_eq!(sink.playing().as_deref(), Some("evening-psalm"));
    }

    #[tokio::test]
    async fn stop_and_leave_both_release_audio() {
        let (mut s, sink) = session();
        s.choose_duration(15).unwrap();
        s.start("still-waters").await.unwrap();
        s.stop().await.unwrap();
        assert_eq!(sink.playing(), None);

        s.start("still-waters").await.unwrap();
        s.leave().await.unwrap();
        assert_eq!(sink.playing(), None);
        assert_eq!(s.phase(), SessionPhase::Idle);
    }

    #[tokio::test]
    async fn leave_is_safe_from_any_phase() {
        let (mut s, sink) = session();
        s.leave().await.unwrap();
        s.choose_duration(15).unwrap();
        s.leave().await.unwrap();
        assert_eq!(s.phase(), SessionPhase::Idle);
        assert!(sink.log().is_empty());
    }

    #[tokio::test]
    async fn guards_reject_invalid_transitions() {
        let (mut s, _sink) = session();
        assert!(matches!(
            s.start("still-waters").await,
            Err(SessionError::NoDurationChosen)
        ));
        assert!(matches!(
            s.choose_duration(0),
            Err(SessionError::InvalidDuration)
        ));

        s.choose_duration(15).unwrap();
        assert!(matches!(
            s.start("no-such-track").await,
            Err(SessionError::UnknownTrack(_))
        ));

        s.start("still-waters").await.unwrap();
        assert!(matches!(
            s.choose_duration(30),
            Err(SessionError::SessionActive)
        ));
    }
}
