//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use devotional_core::cache::{MemoryCache, ScopedCache};
use devotional_core::ports::{DatabaseService, ReflectionService, ScriptureService};
use devotional_core::resolver::DailyContentResolver;
use std::sync::Arc;
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all
/// handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub reflection_adapter: Arc<dyn ReflectionService>,
    pub scripture_adapter: Arc<dyn ScriptureService>,
    /// Process-wide daily verse cache. Each user resolves against a scoped
    /// view of it; losing it only costs one extra history lookup.
    pub daily_cache: Arc<MemoryCache>,
}

impl AppState {
    /// A resolver bound to one user's slice of the daily cache. Construction
    /// is cheap, so handlers build one per request.
    pub fn resolver_for(&self, user_id: Uuid) -> DailyContentResolver {
        let cache = ScopedCache::new(self.daily_cache.clone(), user_id.to_string());
        DailyContentResolver::new(
            self.db.clone(),
            Arc::new(cache),
            self.reflection_adapter.clone(),
        )
    }
}
