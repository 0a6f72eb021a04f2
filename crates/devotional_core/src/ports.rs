//! crates/devotional_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of specific external implementations like databases
//! or remote APIs.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::{
    ChapterPassage, HistoryEntry, PrayerRequest, Reflection, Suggestion, User, UserCredentials,
    Verse,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g.,
/// database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Remote call failed: {0}")]
    Network(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The record-oriented remote store: verses, per-user history, prayer
/// requests, suggestions, moderators and auth sessions.
#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Auth Methods ---
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
        first_name: Option<&str>,
    ) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Daily Verse Content ---

    /// The verse recorded for (user, day), if a history record exists and
    /// still references a valid verse.
    async fn verse_for_day(&self, user_id: Uuid, day: NaiveDate) -> PortResult<Option<Verse>>;

    /// One pseudo-randomly selected verse from the pool, or `None` when the
    /// pool is empty.
    async fn random_verse(&self) -> PortResult<Option<Verse>>;

    /// Records that `user_id` was shown `verse_id` on `day`. Idempotent per
    /// (user, day): a record that already exists is left untouched.
    async fn record_verse_view(&self, user_id: Uuid, verse_id: i64, day: NaiveDate)
        -> PortResult<()>;

    async fn verse_by_id(&self, verse_id: i64) -> PortResult<Verse>;

    /// Back-fills the generated explanation/prayer pair onto a verse row.
    async fn save_reflection(&self, verse_id: i64, reflection: &Reflection) -> PortResult<()>;

    /// The user's full history feed, newest first.
    async fn verse_history(&self, user_id: Uuid) -> PortResult<Vec<HistoryEntry>>;

    // --- Prayer Requests ---
    async fn create_prayer_request(
        &self,
        user_id: Uuid,
        request_text: &str,
    ) -> PortResult<PrayerRequest>;

    /// Active requests newest-first by creation, answered requests
    /// newest-first by fulfilment.
    async fn prayer_requests_for_user(
        &self,
        user_id: Uuid,
        fulfilled: bool,
    ) -> PortResult<Vec<PrayerRequest>>;

    async fn mark_prayer_fulfilled(&self, id: i64, user_id: Uuid) -> PortResult<PrayerRequest>;

    // --- Suggestions & Moderation ---
    async fn create_suggestion(&self, user_id: Uuid, content: &str) -> PortResult<Suggestion>;

    async fn is_admin(&self, user_id: Uuid) -> PortResult<bool>;

    async fn recent_prayer_requests(&self, limit: i64) -> PortResult<Vec<PrayerRequest>>;

    async fn recent_suggestions(&self, limit: i64) -> PortResult<Vec<Suggestion>>;
}

/// Local persistence: a string key-value store with the shape of a device
/// storage API. The daily resolver keeps its two cache slots here.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get_item(&self, key: &str) -> PortResult<Option<String>>;
    async fn set_item(&self, key: &str, value: &str) -> PortResult<()>;
}

/// Generates the explanation/prayer pair for a verse.
#[async_trait]
pub trait ReflectionService: Send + Sync {
    async fn generate_reflection(&self, verse_text: &str, reference: &str)
        -> PortResult<Reflection>;
}

/// Read-only access to the external scripture passage API, keyed by
/// (translation, book, chapter).
#[async_trait]
pub trait ScriptureService: Send + Sync {
    async fn fetch_chapter(
        &self,
        translation_id: &str,
        book_id: &str,
        chapter: i32,
    ) -> PortResult<ChapterPassage>;
}

/// The looping audio output owned by a meditation session. Implementations
/// must tolerate `release` being called when nothing is playing.
#[async_trait]
pub trait AudioSink: Send {
    /// Begins looping playback of the given track, replacing whatever the
    /// sink considers active.
    async fn start_looping(&mut self, track_id: &str) -> PortResult<()>;

    /// Stops playback and frees the underlying resource.
    async fn release(&mut self) -> PortResult<()>;
}
