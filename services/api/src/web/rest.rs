//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, NaiveDate, Utc};
use devotional_core::domain::{ChapterPassage, PrayerRequest, Suggestion, Verse};
use devotional_core::ports::PortError;
use devotional_core::resolver::{ContentError, DailyVerse};
use devotional_core::{bible, meditation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

/// How many entries the moderator feeds return.
const ADMIN_FEED_LIMIT: i64 = 100;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        daily_verse_handler,
        verse_reflection_handler,
        verse_history_handler,
        list_prayers_handler,
        create_prayer_handler,
        answer_prayer_handler,
        create_suggestion_handler,
        bible_books_handler,
        bible_chapter_handler,
        meditation_tracks_handler,
        admin_prayers_handler,
        admin_suggestions_handler,
    ),
    components(schemas(
        VerseResponse,
        DailyVerseResponse,
        HistoryItemResponse,
        PrayerRequestResponse,
        PrayerListResponse,
        CreatePrayerRequest,
        SuggestionResponse,
        CreateSuggestionRequest,
        ChapterResponse,
        ChapterVerseResponse,
        BibleCatalogResponse,
        BibleBookResponse,
        TranslationResponse,
        MeditationOptionsResponse,
        MeditationTrackResponse,
    )),
    tags(
        (name = "Devotional API", description = "Daily verses, prayers, scripture reading and meditation sessions.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct VerseResponse {
    pub id: i64,
    pub book: String,
    pub chapter: i32,
    pub verse_number: i32,
    pub text: String,
    pub explanation: Option<String>,
    pub prayer_guide: Option<String>,
}

impl From<Verse> for VerseResponse {
    fn from(verse: Verse) -> Self {
        Self {
            id: verse.id,
            book: verse.book,
            chapter: verse.chapter,
            verse_number: verse.verse_number,
            text: verse.text,
            explanation: verse.explanation,
            prayer_guide: verse.prayer_guide,
        }
    }
}

/// The day's verse plus where the resolver found it.
#[derive(Serialize, ToSchema)]
pub struct DailyVerseResponse {
    pub verse: VerseResponse,
    /// "cache", "history" or "fresh".
    pub source: String,
}

#[derive(Serialize, ToSchema)]
pub struct HistoryItemResponse {
    pub viewed_on: NaiveDate,
    pub verse: VerseResponse,
}

#[derive(Serialize, ToSchema)]
pub struct PrayerRequestResponse {
    pub id: i64,
    pub request_text: String,
    pub is_fulfilled: bool,
    pub created_at: DateTime<Utc>,
    pub fulfilled_at: Option<DateTime<Utc>>,
}

impl From<PrayerRequest> for PrayerRequestResponse {
    fn from(prayer: PrayerRequest) -> Self {
        Self {
            id: prayer.id,
            request_text: prayer.request_text,
            is_fulfilled: prayer.is_fulfilled,
            created_at: prayer.created_at,
            fulfilled_at: prayer.fulfilled_at,
        }
    }
}

/// Both prayer lists, the way the prayers screen shows them.
#[derive(Serialize, ToSchema)]
pub struct PrayerListResponse {
    pub active: Vec<PrayerRequestResponse>,
    pub answered: Vec<PrayerRequestResponse>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreatePrayerRequest {
    pub request_text: String,
}

#[derive(Serialize, ToSchema)]
pub struct SuggestionResponse {
    pub id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<Suggestion> for SuggestionResponse {
    fn from(suggestion: Suggestion) -> Self {
        Self {
            id: suggestion.id,
            content: suggestion.content,
            created_at: suggestion.created_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateSuggestionRequest {
    pub content: String,
}

#[derive(Serialize, ToSchema)]
pub struct ChapterVerseResponse {
    pub number: i32,
    pub text: String,
}

#[derive(Serialize, ToSchema)]
pub struct ChapterResponse {
    pub reference: String,
    pub verses: Vec<ChapterVerseResponse>,
}

impl From<ChapterPassage> for ChapterResponse {
    fn from(passage: ChapterPassage) -> Self {
        Self {
            reference: passage.reference,
            verses: passage
                .verses
                .into_iter()
                .map(|v| ChapterVerseResponse {
                    number: v.number,
                    text: v.text,
                })
                .collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct BibleBookResponse {
    pub id: String,
    pub name: String,
    pub chapters: i32,
}

#[derive(Serialize, ToSchema)]
pub struct TranslationResponse {
    pub id: String,
    pub label: String,
}

#[derive(Serialize, ToSchema)]
pub struct BibleCatalogResponse {
    pub translations: Vec<TranslationResponse>,
    pub books: Vec<BibleBookResponse>,
}

#[derive(Serialize, ToSchema)]
pub struct MeditationTrackResponse {
    pub id: String,
    pub title: String,
}

#[derive(Serialize, ToSchema)]
pub struct MeditationOptionsResponse {
    pub tracks: Vec<MeditationTrackResponse>,
    pub duration_options_minutes: Vec<u32>,
}

//=========================================================================================
// Error Mapping
//=========================================================================================

fn port_error_response(context: &str, e: PortError) -> (StatusCode, String) {
    error!("{}: {:?}", context, e);
    match e {
        PortError::NotFound(message) => (StatusCode::NOT_FOUND, message),
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        PortError::Network(_) => (
            StatusCode::BAD_GATEWAY,
            "Upstream service unavailable".to_string(),
        ),
        PortError::Unexpected(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{} failed", context),
        ),
    }
}

fn content_error_response(e: ContentError) -> (StatusCode, String) {
    error!("Daily content resolution failed: {:?}", e);
    match e {
        ContentError::Unavailable => (
            StatusCode::NOT_FOUND,
            "No verse is available today".to_string(),
        ),
        ContentError::Network(_) | ContentError::Enrichment(_) => (
            StatusCode::BAD_GATEWAY,
            "Upstream service unavailable".to_string(),
        ),
    }
}

fn daily_verse_response(resolved: DailyVerse, user_id: Uuid) -> DailyVerseResponse {
    if let Some(cache_error) = &resolved.cache_error {
        // Non-fatal: the verse is served, the next load just repeats the
        // remote lookup.
        warn!(
            "Daily verse cache write failed for user {}: {:?}",
            user_id, cache_error
        );
    }
    DailyVerseResponse {
        source: resolved.source.as_str().to_string(),
        verse: resolved.verse.into(),
    }
}

//=========================================================================================
// Daily Verse Handlers
//=========================================================================================

/// Resolve the verse of the day for the signed-in user.
#[utoipa::path(
    get,
    path = "/verses/daily",
    responses(
        (status = 200, description = "The verse of the day", body = DailyVerseResponse),
        (status = 404, description = "The verse pool is empty"),
        (status = 502, description = "A remote dependency failed")
    )
)]
pub async fn daily_verse_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let today = Utc::now().date_naive();
    let resolved = app_state
        .resolver_for(user_id)
        .resolve_today(user_id, today)
        .await
        .map_err(content_error_response)?;

    Ok(Json(daily_verse_response(resolved, user_id)))
}

/// Generate (or return) the explanation and prayer guide for a verse.
#[utoipa::path(
    post,
    path = "/verses/{id}/reflection",
    params(("id" = i64, Path, description = "The verse to enrich")),
    responses(
        (status = 200, description = "The enriched verse", body = VerseResponse),
        (status = 404, description = "No such verse"),
        (status = 502, description = "The generation service failed")
    )
)]
pub async fn verse_reflection_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(verse_id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let verse = app_state
        .db
        .verse_by_id(verse_id)
        .await
        .map_err(|e| port_error_response("Loading verse", e))?;

    let today = Utc::now().date_naive();
    let enriched = app_state
        .resolver_for(user_id)
        .expand_with_reflection(&verse, today)
        .await
        .map_err(content_error_response)?;

    Ok(Json(VerseResponse::from(enriched)))
}

/// The user's verse history, newest first.
#[utoipa::path(
    get,
    path = "/verses/history",
    responses(
        (status = 200, description = "Verses previously shown to this user", body = [HistoryItemResponse])
    )
)]
pub async fn verse_history_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let entries = app_state
        .db
        .verse_history(user_id)
        .await
        .map_err(|e| port_error_response("Loading verse history", e))?;

    let items: Vec<HistoryItemResponse> = entries
        .into_iter()
        .map(|entry| HistoryItemResponse {
            viewed_on: entry.viewed_on,
            verse: entry.verse.into(),
        })
        .collect();
    Ok(Json(items))
}

//=========================================================================================
// Prayer Request Handlers
//=========================================================================================

/// Both prayer lists for the signed-in user.
#[utoipa::path(
    get,
    path = "/prayers",
    responses(
        (status = 200, description = "Active and answered prayer requests", body = PrayerListResponse)
    )
)]
pub async fn list_prayers_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let active = app_state
        .db
        .prayer_requests_for_user(user_id, false)
        .await
        .map_err(|e| port_error_response("Loading prayer requests", e))?;
    let answered = app_state
        .db
        .prayer_requests_for_user(user_id, true)
        .await
        .map_err(|e| port_error_response("Loading prayer requests", e))?;

    Ok(Json(PrayerListResponse {
        active: active.into_iter().map(Into::into).collect(),
        answered: answered.into_iter().map(Into::into).collect(),
    }))
}

/// Log a new prayer request.
#[utoipa::path(
    post,
    path = "/prayers",
    request_body = CreatePrayerRequest,
    responses(
        (status = 201, description = "Prayer request created", body = PrayerRequestResponse),
        (status = 400, description = "Empty request text")
    )
)]
pub async fn create_prayer_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<CreatePrayerRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let text = req.request_text.trim();
    if text.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "request_text must not be empty".to_string(),
        ));
    }

    let prayer = app_state
        .db
        .create_prayer_request(user_id, text)
        .await
        .map_err(|e| port_error_response("Saving prayer request", e))?;

    Ok((
        StatusCode::CREATED,
        Json(PrayerRequestResponse::from(prayer)),
    ))
}

/// Mark one of the user's prayer requests as answered.
#[utoipa::path(
    post,
    path = "/prayers/{id}/answered",
    params(("id" = i64, Path, description = "The prayer request to update")),
    responses(
        (status = 200, description = "Updated prayer request", body = PrayerRequestResponse),
        (status = 404, description = "No such prayer request for this user")
    )
)]
pub async fn answer_prayer_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let prayer = app_state
        .db
        .mark_prayer_fulfilled(id, user_id)
        .await
        .map_err(|e| port_error_response("Updating prayer request", e))?;

    Ok(Json(PrayerRequestResponse::from(prayer)))
}

//=========================================================================================
// Suggestion Handler
//=========================================================================================

/// Submit a suggestion to the moderators.
#[utoipa::path(
    post,
    path = "/suggestions",
    request_body = CreateSuggestionRequest,
    responses(
        (status = 201, description = "Suggestion recorded", body = SuggestionResponse),
        (status = 400, description = "Empty content")
    )
)]
pub async fn create_suggestion_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<CreateSuggestionRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let content = req.content.trim();
    if content.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "content must not be empty".to_string(),
        ));
    }

    let suggestion = app_state
        .db
        .create_suggestion(user_id, content)
        .await
        .map_err(|e| port_error_response("Saving suggestion", e))?;

    Ok((
        StatusCode::CREATED,
        Json(SuggestionResponse::from(suggestion)),
    ))
}

//=========================================================================================
// Bible Reader Handlers
//=========================================================================================

/// The reader catalog: supported translations and books.
#[utoipa::path(
    get,
    path = "/bible/books",
    responses(
        (status = 200, description = "Translations and books", body = BibleCatalogResponse)
    )
)]
pub async fn bible_books_handler() -> Json<BibleCatalogResponse> {
    Json(BibleCatalogResponse {
        translations: bible::TRANSLATIONS
            .iter()
            .map(|t| TranslationResponse {
                id: t.id.to_string(),
                label: t.label.to_string(),
            })
            .collect(),
        books: bible::BOOKS
            .iter()
            .map(|b| BibleBookResponse {
                id: b.id.to_string(),
                name: b.name.to_string(),
                chapters: b.chapters,
            })
            .collect(),
    })
}

/// One chapter of scripture from the external passage service.
#[utoipa::path(
    get,
    path = "/bible/{translation}/{book}/{chapter}",
    params(
        ("translation" = String, Path, description = "Translation id, e.g. eng_kjv"),
        ("book" = String, Path, description = "Book id, e.g. JHN"),
        ("chapter" = i32, Path, description = "Chapter number"),
    ),
    responses(
        (status = 200, description = "The requested chapter", body = ChapterResponse),
        (status = 404, description = "Unknown translation, book or chapter"),
        (status = 502, description = "The scripture service failed")
    )
)]
pub async fn bible_chapter_handler(
    State(app_state): State<Arc<AppState>>,
    Path((translation, book, chapter)): Path<(String, String, i32)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let translation = bible::translation_by_id(&translation).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            format!("Unknown translation: {}", translation),
        )
    })?;
    let book = bible::book_by_id(&book)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Unknown book: {}", book)))?;
    if !bible::chapter_in_range(book, chapter) {
        return Err((
            StatusCode::NOT_FOUND,
            format!("{} has no chapter {}", book.name, chapter),
        ));
    }

    let passage = app_state
        .scripture_adapter
        .fetch_chapter(translation.id, book.id, chapter)
        .await
        .map_err(|e| port_error_response("Fetching scripture", e))?;

    Ok(Json(ChapterResponse::from(passage)))
}

//=========================================================================================
// Meditation Catalog Handler
//=========================================================================================

/// Tracks and durations offered by the meditation screen.
#[utoipa::path(
    get,
    path = "/meditation/tracks",
    responses(
        (status = 200, description = "Available tracks and durations", body = MeditationOptionsResponse)
    )
)]
pub async fn meditation_tracks_handler() -> Json<MeditationOptionsResponse> {
    Json(MeditationOptionsResponse {
        tracks: meditation::TRACKS
            .iter()
            .map(|t| MeditationTrackResponse {
                id: t.id.to_string(),
                title: t.title.to_string(),
            })
            .collect(),
        duration_options_minutes: meditation::DURATION_OPTIONS_MINUTES.to_vec(),
    })
}

//=========================================================================================
// Moderator Handlers
//=========================================================================================

/// Recent prayer requests across all users (moderators only).
#[utoipa::path(
    get,
    path = "/admin/prayers",
    responses(
        (status = 200, description = "Recent prayer requests", body = [PrayerRequestResponse]),
        (status = 403, description = "Not a moderator")
    )
)]
pub async fn admin_prayers_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let prayers = app_state
        .db
        .recent_prayer_requests(ADMIN_FEED_LIMIT)
        .await
        .map_err(|e| port_error_response("Loading prayer requests", e))?;
    let items: Vec<PrayerRequestResponse> = prayers.into_iter().map(Into::into).collect();
    Ok(Json(items))
}

/// Recent suggestions across all users (moderators only).
#[utoipa::path(
    get,
    path = "/admin/suggestions",
    responses(
        (status = 200, description = "Recent suggestions", body = [SuggestionResponse]),
        (status = 403, description = "Not a moderator")
    )
)]
pub async fn admin_suggestions_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let suggestions = app_state
        .db
        .recent_suggestions(ADMIN_FEED_LIMIT)
        .await
        .map_err(|e| port_error_response("Loading suggestions", e))?;
    let items: Vec<SuggestionResponse> = suggestions.into_iter().map(Into::into).collect();
    Ok(Json(items))
}
