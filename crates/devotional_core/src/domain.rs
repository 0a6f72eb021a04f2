//! crates/devotional_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or HTTP framework; the
//! verse types derive serde because a verse snapshot is what the local
//! cache stores as text.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single addressable unit of scripture with its book/chapter/number
/// reference. `explanation` and `prayer_guide` start empty and are
/// back-filled once by the reflection generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verse {
    pub id: i64,
    pub book: String,
    pub chapter: i32,
    pub verse_number: i32,
    pub text: String,
    pub explanation: Option<String>,
    pub prayer_guide: Option<String>,
}

impl Verse {
    /// Human-readable reference, e.g. "John 3:16".
    pub fn reference(&self) -> String {
        format!("{} {}:{}", self.book, self.chapter, self.verse_number)
    }

    /// True once both generated texts are present.
    pub fn is_enriched(&self) -> bool {
        self.explanation.is_some() && self.prayer_guide.is_some()
    }
}

/// One row of the per-user verse history feed: which verse was shown on
/// which calendar day. The remote store keeps at most one per (user, day).
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub viewed_on: NaiveDate,
    pub verse: Verse,
}

/// The pair of generated texts attached to a verse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reflection {
    pub explanation: String,
    pub prayer: String,
}

/// A prayer request logged by a user, optionally marked answered later.
#[derive(Debug, Clone)]
pub struct PrayerRequest {
    pub id: i64,
    pub user_id: Uuid,
    pub request_text: String,
    pub is_fulfilled: bool,
    pub created_at: DateTime<Utc>,
    pub fulfilled_at: Option<DateTime<Utc>>,
}

/// A free-form suggestion submitted through the contact box; surfaces on
/// the moderator dashboard.
#[derive(Debug, Clone)]
pub struct Suggestion {
    pub id: i64,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Represents a user - used throughout the app.
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub first_name: Option<String>,
}

/// Only used internally for login/signup - contains sensitive data.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

/// Represents a login session (auth cookie).
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// One chapter of scripture as returned by the passage service, flattened
/// to plain verse text.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterPassage {
    pub reference: String,
    pub verses: Vec<PassageVerse>,
}

/// A single verse inside a [`ChapterPassage`].
#[derive(Debug, Clone, PartialEq)]
pub struct PassageVerse {
    pub number: i32,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verse() -> Verse {
        Verse {
            id: 42,
            book: "John".to_string(),
            chapter: 3,
            verse_number: 16,
            text: "For God so loved the world...".to_string(),
            explanation: None,
            prayer_guide: None,
        }
    }

    #[test]
    fn reference_formats_book_chapter_and_number() {
        assert_eq!(verse().reference(), "John 3:16");
    }

    #[test]
    fn enrichment_requires_both_generated_texts() {
        let mut v = verse();
        assert!(!v.is_enriched());
        v.explanation = Some("An explanation.".to_string());
        assert!(!v.is_enriched());
        v.prayer_guide = Some("A prayer.".to_string());
        assert!(v.is_enriched());
    }

    #[test]
    fn verse_snapshot_round_trips_through_json() {
        let v = verse();
        let json = serde_json::to_string(&v).unwrap();
        let back: Verse = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}
