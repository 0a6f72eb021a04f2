//! crates/devotional_core/src/resolver.rs
//!
//! Decides which verse a signed-in user sees today. The resolver reconciles
//! a local single-slot cache with the remote history log and the remote
//! random-pick source so that exactly one verse is selected and persisted
//! per calendar day per user.

use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::cache::{KEY_DAILY_VERSE, KEY_DAILY_VERSE_DATE};
use crate::domain::Verse;
use crate::ports::{CacheStore, DatabaseService, PortError, ReflectionService};

/// Calendar days are cached and compared as `YYYY-MM-DD` strings.
const DATE_FORMAT: &str = "%Y-%m-%d";

//=========================================================================================
// Outcome and Error Types
//=========================================================================================

/// Where the day's verse was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerseSource {
    /// Same-day repeat visit; answered from the local cache with zero
    /// remote calls.
    Cache,
    /// Adopted from an existing remote history record (cache was cold).
    History,
    /// Newly drawn from the random pool and recorded remotely.
    Fresh,
}

impl VerseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerseSource::Cache => "cache",
            VerseSource::History => "history",
            VerseSource::Fresh => "fresh",
        }
    }
}

/// A resolved daily verse. `cache_error` is set when the verse was
/// determined but the local cache write failed; the result is still usable,
/// the next load may just repeat remote lookups.
#[derive(Debug)]
pub struct DailyVerse {
    pub verse: Verse,
    pub source: VerseSource,
    pub cache_error: Option<PortError>,
}

/// Failures the resolver surfaces to its caller.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    /// A remote read or write failed. Transient; the caller may retry the
    /// whole resolution.
    #[error("remote store call failed: {0}")]
    Network(#[source] PortError),

    /// The random-pick source yielded nothing. Terminal for this attempt.
    #[error("no verse available to select")]
    Unavailable,

    /// The generation service failed; the base verse remains usable.
    #[error("reflection generation failed: {0}")]
    Enrichment(#[source] PortError),
}

//=========================================================================================
// DailyContentResolver
//=========================================================================================

/// Produces exactly one verse to display for "today" for the current user,
/// minimizing remote calls, and persists that choice so subsequent loads
/// (same day, same or different device) are stable.
pub struct DailyContentResolver {
    store: Arc<dyn DatabaseService>,
    cache: Arc<dyn CacheStore>,
    reflections: Arc<dyn ReflectionService>,
}

impl DailyContentResolver {
    pub fn new(
        store: Arc<dyn DatabaseService>,
        cache: Arc<dyn CacheStore>,
        reflections: Arc<dyn ReflectionService>,
    ) -> Self {
        Self {
            store,
            cache,
            reflections,
        }
    }

    /// Resolves the verse for (user, today).
    ///
    /// Order matters: the local cache is free and correct for same-day
    /// repeat visits; remote history is consulted before the random pool so
    /// a cache clear or a second device never shows a different verse; and
    /// the remote history write happens before the local cache write, so an
    /// interruption leaves the authoritative record in place and only the
    /// self-healing cache behind.
    pub async fn resolve_today(
        &self,
        user_id: Uuid,
        today: NaiveDate,
    ) -> Result<DailyVerse, ContentError> {
        let day = today.format(DATE_FORMAT).to_string();

        // 1. Local cache.
        if let Some(verse) = self.cached_verse(&day).await {
            return Ok(DailyVerse {
                verse,
                source: VerseSource::Cache,
                cache_error: None,
            });
        }

        // 2. Remote history.
        let recorded = self
            .store
            .verse_for_day(user_id, today)
            .await
            .map_err(ContentError::Network)?;
        if let Some(verse) = recorded {
            let cache_error = self.write_cache(&day, &verse).await.err();
            return Ok(DailyVerse {
                verse,
                source: VerseSource::History,
                cache_error,
            });
        }

        // 3. Fresh random pick, recorded remotely before it is cached.
        let verse = self
            .store
            .random_verse()
            .await
            .map_err(ContentError::Network)?
            .ok_or(ContentError::Unavailable)?;
        self.store
            .record_verse_view(user_id, verse.id, today)
            .await
            .map_err(ContentError::Network)?;
        let cache_error = self.write_cache(&day, &verse).await.err();
        Ok(DailyVerse {
            verse,
            source: VerseSource::Fresh,
            cache_error,
        })
    }

    /// Requests the generated explanation/prayer pair for a verse that lacks
    /// it, back-fills the remote verse row and the same-day cache slot, and
    /// returns the enriched copy. The remote and cache writes are
    /// best-effort: the generated content is returned even when they fail.
    pub async fn expand_with_reflection(
        &self,
        verse: &Verse,
        today: NaiveDate,
    ) -> Result<Verse, ContentError> {
        if verse.is_enriched() {
            return Ok(verse.clone());
        }

        let reflection = self
            .reflections
            .generate_reflection(&verse.text, &verse.reference())
            .await
            .map_err(ContentError::Enrichment)?;

        let mut enriched = verse.clone();
        enriched.explanation = Some(reflection.explanation.clone());
        enriched.prayer_guide = Some(reflection.prayer.clone());

        let _ = self.store.save_reflection(verse.id, &reflection).await;

        let day = today.format(DATE_FORMAT).to_string();
        if let Some(cached) = self.cached_verse(&day).await {
            if cached.id == enriched.id {
                let _ = self.write_cache(&day, &enriched).await;
            }
        }

        Ok(enriched)
    }

    /// The cached verse, but only when the cached day matches and the
    /// snapshot parses. Any local read problem counts as a miss, never an
    /// error.
    async fn cached_verse(&self, day: &str) -> Option<Verse> {
        let stored_day = self.cache.get_item(KEY_DAILY_VERSE_DATE).await.ok()??;
        if stored_day != day {
            return None;
        }
        let snapshot = self.cache.get_item(KEY_DAILY_VERSE).await.ok()??;
        serde_json::from_str(&snapshot).ok()
    }

    /// Writes the snapshot before the day marker: a torn write leaves a
    /// stale day marker at worst, which reads as a miss.
    async fn write_cache(&self, day: &str, verse: &Verse) -> Result<(), PortError> {
        let snapshot =
            serde_json::to_string(verse).map_err(|e| PortError::Unexpected(e.to_string()))?;
        self.cache.set_item(KEY_DAILY_VERSE, &snapshot).await?;
        self.cache.set_item(KEY_DAILY_VERSE_DATE, day).await?;
        Ok(())
    }
}

//=========================================================================================
// Tests
//=========================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::domain::{
        HistoryEntry, PrayerRequest, Reflection, Suggestion, User, UserCredentials,
    };
    use crate::ports::{CacheStore, PortResult};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn verse(id: i64) -> Verse {
        Verse {
            id,
            book: "John".to_string(),
            chapter: 3,
            verse_number: 16,
            text: "For God so loved the world...".to_string(),
            explanation: None,
            prayer_guide: None,
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn user() -> Uuid {
        Uuid::nil()
    }

    /// In-memory stand-in for the remote store. Counts every remote call so
    /// the cache-hit property can be asserted precisely.
    #[derive(Default)]
    struct FakeStore {
        history: Mutex<Vec<(Uuid, i64, NaiveDate)>>,
        verses: Mutex<Vec<Verse>>,
        random_pool: Mutex<Option<Verse>>,
        fail_remote: std::sync::atomic::AtomicBool,
        remote_calls: AtomicUsize,
    }

    impl FakeStore {
        fn with_random(verse: Verse) -> Self {
            let store = Self::default();
            store.verses.lock().unwrap().push(verse.clone());
            *store.random_pool.lock().unwrap() = Some(verse);
            store
        }

        fn with_history(user_id: Uuid, day: NaiveDate, verse: Verse) -> Self {
            let store = Self::default();
            store
                .history
                .lock()
                .unwrap()
                .push((user_id, verse.id, day));
            store.verses.lock().unwrap().push(verse);
            store
        }

        fn remote_calls(&self) -> usize {
            self.remote_calls.load(Ordering::SeqCst)
        }

        fn history_records(&self) -> Vec<(Uuid, i64, NaiveDate)> {
            self.history.lock().unwrap().clone()
        }

        fn tick(&self) -> PortResult<()> {
            self.remote_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_remote.load(Ordering::SeqCst) {
                return Err(PortError::Network("connection reset".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl DatabaseService for FakeStore {
        async fn create_user_with_email(
            &self,
            _email: &str,
            _hashed_password: &str,
            _first_name: Option<&str>,
        ) -> PortResult<User> {
            Err(PortError::Unexpected("not exercised".to_string()))
        }

        async fn get_user_by_email(&self, _email: &str) -> PortResult<UserCredentials> {
            Err(PortError::Unexpected("not exercised".to_string()))
        }

        async fn create_auth_session(
            &self,
            _session_id: &str,
            _user_id: Uuid,
            _expires_at: DateTime<Utc>,
        ) -> PortResult<()> {
            Err(PortError::Unexpected("not exercised".to_string()))
        }

        async fn validate_auth_session(&self, _session_id: &str) -> PortResult<Uuid> {
            Err(PortError::Unexpected("not exercised".to_string()))
        }

        async fn delete_auth_session(&self, _session_id: &str) -> PortResult<()> {
            Err(PortError::Unexpected("not exercised".to_string()))
        }

        async fn verse_for_day(
            &self,
            user_id: Uuid,
            day: NaiveDate,
        ) -> PortResult<Option<Verse>> {
            self.tick()?;
            let history = self.history.lock().unwrap();
            let verses = self.verses.lock().unwrap();
            Ok(history
                .iter()
                .find(|(u, _, d)| *u == user_id && *d == day)
                .and_then(|(_, verse_id, _)| verses.iter().find(|v| v.id == *verse_id))
                .cloned())
        }

        async fn random_verse(&self) -> PortResult<Option<Verse>> {
            self.tick()?;
            Ok(self.random_pool.lock().unwrap().clone())
        }

        async fn record_verse_view(
            &self,
            user_id: Uuid,
            verse_id: i64,
            day: NaiveDate,
        ) -> PortResult<()> {
            self.tick()?;
            let mut history = self.history.lock().unwrap();
            if !history.iter().any(|(u, _, d)| *u == user_id && *d == day) {
                history.push((user_id, verse_id, day));
            }
            Ok(())
        }

        async fn verse_by_id(&self, verse_id: i64) -> PortResult<Verse> {
            self.tick()?;
            self.verses
                .lock()
                .unwrap()
                .iter()
                .find(|v| v.id == verse_id)
                .cloned()
                .ok_or_else(|| PortError::NotFound(format!("Verse {} not found", verse_id)))
        }

        async fn save_reflection(
            &self,
            verse_id: i64,
            reflection: &Reflection,
        ) -> PortResult<()> {
            self.tick()?;
            let mut verses = self.verses.lock().unwrap();
            if let Some(v) = verses.iter_mut().find(|v| v.id == verse_id) {
                v.explanation = Some(reflection.explanation.clone());
                v.prayer_guide = Some(reflection.prayer.clone());
            }
            Ok(())
        }

        async fn verse_history(&self, _user_id: Uuid) -> PortResult<Vec<HistoryEntry>> {
            Err(PortError::Unexpected("not exercised".to_string()))
        }

        async fn create_prayer_request(
            &self,
            _user_id: Uuid,
            _request_text: &str,
        ) -> PortResult<PrayerRequest> {
            Err(PortError::Unexpected("not exercised".to_string()))
        }

        async fn prayer_requests_for_user(
            &self,
            _user_id: Uuid,
            _fulfilled: bool,
        ) -> PortResult<Vec<PrayerRequest>> {
            Err(PortError::Unexpected("not exercised".to_string()))
        }

        async fn mark_prayer_fulfilled(
            &self,
            _id: i64,
            _user_id: Uuid,
        ) -> PortResult<PrayerRequest> {
            Err(PortError::Unexpected("not exercised".to_string()))
        }

        async fn create_suggestion(
            &self,
            _user_id: Uuid,
            _content: &str,
        ) -> PortResult<Suggestion> {
            Err(PortError::Unexpected("not exercised".to_string()))
        }

        async fn is_admin(&self, _user_id: Uuid) -> PortResult<bool> {
            Err(PortError::Unexpected("not exercised".to_string()))
        }

        async fn recent_prayer_requests(&self, _limit: i64) -> PortResult<Vec<PrayerRequest>> {
            Err(PortError::Unexpected("not exercised".to_string()))
        }

        async fn recent_suggestions(&self, _limit: i64) -> PortResult<Vec<Suggestion>> {
            Err(PortError::Unexpected("not exercised".to_string()))
        }
    }

    /// Reflection service that succeeds with a fixed pair.
    struct FixedReflections;

    #[async_trait]
    impl ReflectionService for FixedReflections {
        async fn generate_reflection(
            &self,
            _verse_text: &str,
            _reference: &str,
        ) -> PortResult<Reflection> {
            Ok(Reflection {
                explanation: "A word of comfort.".to_string(),
                prayer: "A short prayer.".to_string(),
            })
        }
    }

    /// Reflection service that always fails.
    struct BrokenReflections;

    #[async_trait]
    impl ReflectionService for BrokenReflections {
        async fn generate_reflection(
            &self,
            _verse_text: &str,
            _reference: &str,
        ) -> PortResult<Reflection> {
            Err(PortError::Network("generation timed out".to_string()))
        }
    }

    /// Cache whose writes always fail; reads succeed.
    struct ReadOnlyCache(MemoryCache);

    #[async_trait]
    impl CacheStore for ReadOnlyCache {
        async fn get_item(&self, key: &str) -> PortResult<Option<String>> {
            self.0.get_item(key).await
        }

        async fn set_item(&self, _key: &str, _value: &str) -> PortResult<()> {
            Err(PortError::Unexpected("disk full".to_string()))
        }
    }

    fn resolver(
        store: Arc<FakeStore>,
        cache: Arc<dyn CacheStore>,
        reflections: Arc<dyn ReflectionService>,
    ) -> DailyContentResolver {
        DailyContentResolver::new(store, cache, reflections)
    }

    #[tokio::test]
    async fn second_resolution_hits_cache_with_zero_remote_calls() {
        let store = Arc::new(FakeStore::with_random(verse(42)));
        let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
        let r = resolver(store.clone(), cache, Arc::new(FixedReflections));

        let first = r.resolve_today(user(), day()).await.unwrap();
        assert_eq!(first.source, VerseSource::Fresh);
        let calls_after_first = store.remote_calls();

        let second = r.resolve_today(user(), day()).await.unwrap();
        assert_eq!(second.source, VerseSource::Cache);
        assert_eq!(second.verse, first.verse);
        assert_eq!(store.remote_calls(), calls_after_first);
    }

    #[tokio::test]
    async fn existing_history_record_wins_over_random_pick() {
        let recorded = verse(7);
        let store = Arc::new(FakeStore::with_history(user(), day(), recorded.clone()));
        *store.random_pool.lock().unwrap() = Some(verse(99));
        let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
        let r = resolver(store.clone(), cache, Arc::new(FixedReflections));

        let resolved = r.resolve_today(user(), day()).await.unwrap();
        assert_eq!(resolved.source, VerseSource::History);
        assert_eq!(resolved.verse, recorded);
        // No second record for the same (user, day).
        assert_eq!(store.history_records().len(), 1);
    }

    #[tokio::test]
    async fn fresh_pick_records_history_and_fills_cache() {
        let store = Arc::new(FakeStore::with_random(verse(42)));
        let cache = Arc::new(MemoryCache::new());
        let r = resolver(
            store.clone(),
            cache.clone(),
            Arc::new(FixedReflections),
        );

        let resolved = r.resolve_today(user(), day()).await.unwrap();
        assert_eq!(resolved.source, VerseSource::Fresh);
        assert_eq!(resolved.verse.id, 42);
        assert!(resolved.cache_error.is_none());

        assert_eq!(store.history_records(), vec![(user(), 42, day())]);
        assert_eq!(
            cache
                .get_item(KEY_DAILY_VERSE_DATE)
                .await
                .unwrap()
                .as_deref(),
            Some("2024-05-01")
        );
        let snapshot = cache.get_item(KEY_DAILY_VERSE).await.unwrap().unwrap();
        let cached: Verse = serde_json::from_str(&snapshot).unwrap();
        assert_eq!(cached.id, 42);
    }

    #[tokio::test]
    async fn empty_random_pool_is_unavailable_and_leaves_no_cache() {
        let store = Arc::new(FakeStore::default());
        let cache = Arc::new(MemoryCache::new());
        let r = resolver(
            store.clone(),
            cache.clone(),
            Arc::new(FixedReflections),
        );

        let err = r.resolve_today(user(), day()).await.unwrap_err();
        assert!(matches!(err, ContentError::Unavailable));
        assert_eq!(cache.get_item(KEY_DAILY_VERSE_DATE).await.unwrap(), None);
        assert_eq!(cache.get_item(KEY_DAILY_VERSE).await.unwrap(), None);
    }

    #[tokio::test]
    async fn remote_failure_surfaces_as_network_error() {
        let store = Arc::new(FakeStore::with_random(verse(42)));
        store.fail_remote.store(true, Ordering::SeqCst);
        let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
        let r = resolver(store, cache, Arc::new(FixedReflections));

        let err = r.resolve_today(user(), day()).await.unwrap_err();
        assert!(matches!(err, ContentError::Network(_)));
    }

    #[tokio::test]
    async fn stale_cache_day_falls_through_to_history() {
        let recorded = verse(7);
        let store = Arc::new(FakeStore::with_history(user(), day(), recorded.clone()));
        let cache = Arc::new(MemoryCache::new());
        // Yesterday's entry is present but must be ignored.
        cache
            .set_item(KEY_DAILY_VERSE, &serde_json::to_string(&verse(1)).unwrap())
            .await
            .unwrap();
        cache
            .set_item(KEY_DAILY_VERSE_DATE, "2024-04-30")
            .await
            .unwrap();
        let r = resolver(store, cache.clone(), Arc::new(FixedReflections));

        let resolved = r.resolve_today(user(), day()).await.unwrap();
        assert_eq!(resolved.source, VerseSource::History);
        assert_eq!(resolved.verse, recorded);
        assert_eq!(
            cache
                .get_item(KEY_DAILY_VERSE_DATE)
                .await
                .unwrap()
                .as_deref(),
            Some("2024-05-01")
        );
    }

    #[tokio::test]
    async fn cache_write_failure_is_reported_but_not_fatal() {
        let store = Arc::new(FakeStore::with_random(verse(42)));
        let cache: Arc<dyn CacheStore> = Arc::new(ReadOnlyCache(MemoryCache::new()));
        let r = resolver(store.clone(), cache, Arc::new(FixedReflections));

        let resolved = r.resolve_today(user(), day()).await.unwrap();
        assert_eq!(resolved.verse.id, 42);
        assert!(resolved.cache_error.is_some());
        // The authoritative record was still written.
        assert_eq!(store.history_records().len(), 1);
    }

    #[tokio::test]
    async fn enrichment_populates_both_fields_and_updates_matching_cache() {
        let store = Arc::new(FakeStore::with_random(verse(42)));
        let cache = Arc::new(MemoryCache::new());
        let r = resolver(
            store.clone(),
            cache.clone(),
            Arc::new(FixedReflections),
        );

        let resolved = r.resolve_today(user(), day()).await.unwrap();
        let enriched = r
            .expand_with_reflection(&resolved.verse, day())
            .await
            .unwrap();

        assert_eq!(enriched.explanation.as_deref(), Some("A word of comfort."));
        assert_eq!(enriched.prayer_guide.as_deref(), Some("A short prayer."));

        // The remote row was back-filled and the same-day cache slot now
        // holds the enriched copy.
        let remote = store.verse_by_id(42).await.unwrap();
        assert!(remote.is_enriched());
        let snapshot = cache.get_item(KEY_DAILY_VERSE).await.unwrap().unwrap();
        let cached: Verse = serde_json::from_str(&snapshot).unwrap();
        assert!(cached.is_enriched());
    }

    #[tokio::test]
    async fn enrichment_failure_leaves_base_verse_untouched() {
        let store = Arc::new(FakeStore::with_random(verse(42)));
        let cache = Arc::new(MemoryCache::new());
        let r = resolver(
            store.clone(),
            cache.clone(),
            Arc::new(BrokenReflections),
        );

        let resolved = r.resolve_today(user(), day()).await.unwrap();
        let err = r
            .expand_with_reflection(&resolved.verse, day())
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::Enrichment(_)));

        let snapshot = cache.get_item(KEY_DAILY_VERSE).await.unwrap().unwrap();
        let cached: Verse = serde_json::from_str(&snapshot).unwrap();
        assert!(!cached.is_enriched());
    }

    #[tokio::test]
    async fn already_enriched_verse_short_circuits_without_remote_calls() {
        let mut v = verse(42);
        v.explanation = Some("Kept.".to_string());
        v.prayer_guide = Some("Kept.".to_string());
        let store = Arc::new(FakeStore::default());
        let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
        let r = resolver(store.clone(), cache, Arc::new(BrokenReflections));

        let enriched = r.expand_with_reflection(&v, day()).await.unwrap();
        assert_eq!(enriched, v);
        assert_eq!(store.remote_calls(), 0);
    }
}
