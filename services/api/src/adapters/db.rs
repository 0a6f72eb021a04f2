//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete
//! implementation of the `DatabaseService` port from the `core` crate. It
//! handles all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use devotional_core::domain::{
    HistoryEntry, PrayerRequest, Reflection, Suggestion, User, UserCredentials, Verse,
};
use devotional_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct VerseRecord {
    id: i64,
    book: String,
    chapter: i32,
    verse_number: i32,
    text: String,
    explanation: Option<String>,
    prayer_guide: Option<String>,
}

impl VerseRecord {
    fn to_domain(self) -> Verse {
        Verse {
            id: self.id,
            book: self.book,
            chapter: self.chapter,
            verse_number: self.verse_number,
            text: self.text,
            explanation: self.explanation,
            prayer_guide: self.prayer_guide,
        }
    }
}

const VERSE_COLUMNS: &str = "id, book, chapter, verse_number, text, explanation, prayer_guide";

#[derive(FromRow)]
struct HistoryRow {
    viewed_on: NaiveDate,
    id: i64,
    book: String,
    chapter: i32,
    verse_number: i32,
    text: String,
    explanation: Option<String>,
    prayer_guide: Option<String>,
}

impl HistoryRow {
    fn to_domain(self) -> HistoryEntry {
        HistoryEntry {
            viewed_on: self.viewed_on,
            verse: Verse {
                id: self.id,
                book: self.book,
                chapter: self.chapter,
                verse_number: self.verse_number,
                text: self.text,
                explanation: self.explanation,
                prayer_guide: self.prayer_guide,
            },
        }
    }
}

#[derive(FromRow)]
struct PrayerRequestRecord {
    id: i64,
    user_id: Uuid,
    request_text: String,
    is_fulfilled: bool,
    created_at: DateTime<Utc>,
    fulfilled_at: Option<DateTime<Utc>>,
}

impl PrayerRequestRecord {
    fn to_domain(self) -> PrayerRequest {
        PrayerRequest {
            id: self.id,
            user_id: self.user_id,
            request_text: self.request_text,
            is_fulfilled: self.is_fulfilled,
            created_at: self.created_at,
            fulfilled_at: self.fulfilled_at,
        }
    }
}

const PRAYER_COLUMNS: &str = "id, user_id, request_text, is_fulfilled, created_at, fulfilled_at";

#[derive(FromRow)]
struct SuggestionRecord {
    id: i64,
    user_id: Uuid,
    content: String,
    created_at: DateTime<Utc>,
}

impl SuggestionRecord {
    fn to_domain(self) -> Suggestion {
        Suggestion {
            id: self.id,
            user_id: self.user_id,
            content: self.content,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: Option<String>,
    first_name: Option<String>,
}

impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: self.email,
            first_name: self.first_name,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}

impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
        first_name: Option<&str>,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (user_id, email, hashed_password, first_name)
             VALUES ($1, $2, $3, $4)
             RETURNING user_id, email, first_name",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .bind(first_name)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", email)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let user_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        user_id.ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn verse_for_day(&self, user_id: Uuid, day: NaiveDate) -> PortResult<Option<Verse>> {
        let record = sqlx::query_as::<_, VerseRecord>(
            "SELECT v.id, v.book, v.chapter, v.verse_number, v.text, v.explanation, v.prayer_guide
             FROM verse_history h
             JOIN verses v ON v.id = h.verse_id
             WHERE h.user_id = $1 AND h.viewed_on = $2",
        )
        .bind(user_id)
        .bind(day)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(VerseRecord::to_domain))
    }

    async fn random_verse(&self) -> PortResult<Option<Verse>> {
        let record = sqlx::query_as::<_, VerseRecord>(&format!(
            "SELECT {} FROM verses ORDER BY random() LIMIT 1",
            VERSE_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(VerseRecord::to_domain))
    }

    async fn record_verse_view(
        &self,
        user_id: Uuid,
        verse_id: i64,
        day: NaiveDate,
    ) -> PortResult<()> {
        // Insert-or-ignore: a concurrent resolution of the same day must not
        // produce a second record for (user, day).
        sqlx::query(
            "INSERT INTO verse_history (user_id, verse_id, viewed_on)
             VALUES ($1, $2, $3)
             ON CONFLICT (user_id, viewed_on) DO NOTHING",
        )
        .bind(user_id)
        .bind(verse_id)
        .bind(day)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn verse_by_id(&self, verse_id: i64) -> PortResult<Verse> {
        let record = sqlx::query_as::<_, VerseRecord>(&format!(
            "SELECT {} FROM verses WHERE id = $1",
            VERSE_COLUMNS
        ))
        .bind(verse_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Verse {} not found", verse_id))
            }
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn save_reflection(&self, verse_id: i64, reflection: &Reflection) -> PortResult<()> {
        sqlx::query("UPDATE verses SET explanation = $2, prayer_guide = $3 WHERE id = $1")
            .bind(verse_id)
            .bind(&reflection.explanation)
            .bind(&reflection.prayer)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn verse_history(&self, user_id: Uuid) -> PortResult<Vec<HistoryEntry>> {
        let records = sqlx::query_as::<_, HistoryRow>(
            "SELECT h.viewed_on, v.id, v.book, v.chapter, v.verse_number, v.text,
                    v.explanation, v.prayer_guide
             FROM verse_history h
             JOIN verses v ON v.id = h.verse_id
             WHERE h.user_id = $1
             ORDER BY h.viewed_on DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(HistoryRow::to_domain).collect())
    }

    async fn create_prayer_request(
        &self,
        user_id: Uuid,
        request_text: &str,
    ) -> PortResult<PrayerRequest> {
        let record = sqlx::query_as::<_, PrayerRequestRecord>(&format!(
            "INSERT INTO prayer_requests (user_id, request_text)
             VALUES ($1, $2)
             RETURNING {}",
            PRAYER_COLUMNS
        ))
        .bind(user_id)
        .bind(request_text)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn prayer_requests_for_user(
        &self,
        user_id: Uuid,
        fulfilled: bool,
    ) -> PortResult<Vec<PrayerRequest>> {
        // Active requests sort by creation, answered ones by fulfilment.
        let order = if fulfilled {
            "fulfilled_at DESC"
        } else {
            "created_at DESC"
        };
        let records = sqlx::query_as::<_, PrayerRequestRecord>(&format!(
            "SELECT {} FROM prayer_requests
             WHERE user_id = $1 AND is_fulfilled = $2
             ORDER BY {}",
            PRAYER_COLUMNS, order
        ))
        .bind(user_id)
        .bind(fulfilled)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records
            .into_iter()
            .map(PrayerRequestRecord::to_domain)
            .collect())
    }

    async fn mark_prayer_fulfilled(&self, id: i64, user_id: Uuid) -> PortResult<PrayerRequest> {
        let record = sqlx::query_as::<_, PrayerRequestRecord>(&format!(
            "UPDATE prayer_requests
             SET is_fulfilled = TRUE, fulfilled_at = NOW()
             WHERE id = $1 AND user_id = $2
             RETURNING {}",
            PRAYER_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Prayer request {} not found", id))
            }
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn create_suggestion(&self, user_id: Uuid, content: &str) -> PortResult<Suggestion> {
        let record = sqlx::query_as::<_, SuggestionRecord>(
            "INSERT INTO suggestions (user_id, content)
             VALUES ($1, $2)
             RETURNING id, user_id, content, created_at",
        )
        .bind(user_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn is_admin(&self, user_id: Uuid) -> PortResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM app_admins WHERE user_id = $1)")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .map_err(unexpected)?;
        Ok(exists)
    }

    async fn recent_prayer_requests(&self, limit: i64) -> PortResult<Vec<PrayerRequest>> {
        let records = sqlx::query_as::<_, PrayerRequestRecord>(&format!(
            "SELECT {} FROM prayer_requests ORDER BY created_at DESC LIMIT $1",
            PRAYER_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records
            .into_iter()
            .map(PrayerRequestRecord::to_domain)
            .collect())
    }

    async fn recent_suggestions(&self, limit: i64) -> PortResult<Vec<Suggestion>> {
        let records = sqlx::query_as::<_, SuggestionRecord>(
            "SELECT id, user_id, content, created_at FROM suggestions
             ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(SuggestionRecord::to_domain).collect())
    }
}
