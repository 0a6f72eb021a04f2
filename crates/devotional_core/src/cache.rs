//! crates/devotional_core/src/cache.rs
//!
//! Implementations of the `CacheStore` port. The daily resolver only ever
//! touches two fixed keys: the cached calendar day and the verse snapshot
//! for that day.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::ports::{CacheStore, PortError, PortResult};

/// Key under which the cached verse snapshot (JSON) is stored.
pub const KEY_DAILY_VERSE: &str = "daily_verse_data";
/// Key under which the calendar day of the snapshot is stored.
pub const KEY_DAILY_VERSE_DATE: &str = "daily_verse_date";

//=========================================================================================
// MemoryCache
//=========================================================================================

/// An in-process `CacheStore`. The cache is ephemeral by design: losing it
/// only costs one extra remote lookup on the next resolution.
#[derive(Default)]
pub struct MemoryCache {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get_item(&self, key: &str) -> PortResult<Option<String>> {
        let items = self
            .items
            .lock()
            .map_err(|_| PortError::Unexpected("cache lock poisoned".to_string()))?;
        Ok(items.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> PortResult<()> {
        let mut items = self
            .items
            .lock()
            .map_err(|_| PortError::Unexpected("cache lock poisoned".to_string()))?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

//=========================================================================================
// ScopedCache
//=========================================================================================

/// A view over a shared `CacheStore` that prefixes every key with a scope
/// string. This is how one process serves many users while each resolver
/// still sees a plain single-slot store under its fixed keys.
pub struct ScopedCache {
    inner: Arc<dyn CacheStore>,
    scope: String,
}

impl ScopedCache {
    pub fn new(inner: Arc<dyn CacheStore>, scope: impl Into<String>) -> Self {
        Self {
            inner,
            scope: scope.into(),
        }
    }

    fn scoped(&self, key: &str) -> String {
        format!("{}::{}", self.scope, key)
    }
}

#[async_trait]
impl CacheStore for ScopedCache {
    async fn get_item(&self, key: &str) -> PortResult<Option<String>> {
        self.inner.get_item(&self.scoped(key)).await
    }

    async fn set_item(&self, key: &str, value: &str) -> PortResult<()> {
        self.inner.set_item(&self.scoped(key), value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_cache_returns_what_was_stored() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get_item(KEY_DAILY_VERSE).await.unwrap(), None);

        cache.set_item(KEY_DAILY_VERSE, "snapshot").await.unwrap();
        assert_eq!(
            cache.get_item(KEY_DAILY_VERSE).await.unwrap().as_deref(),
            Some("snapshot")
        );
    }

    #[tokio::test]
    async fn scoped_caches_do_not_observe_each_other() {
        let shared: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
        let alice = ScopedCache::new(shared.clone(), "alice");
        let bob = ScopedCache::new(shared.clone(), "bob");

        alice.set_item(KEY_DAILY_VERSE_DATE, "2024-05-01").await.unwrap();

        assert_eq!(
            alice.get_item(KEY_DAILY_VERSE_DATE).await.unwrap().as_deref(),
            Some("2024-05-01")
        );
        assert_eq!(bob.get_item(KEY_DAILY_VERSE_DATE).await.unwrap(), None);
    }
}
