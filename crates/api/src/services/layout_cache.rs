//! In-memory cache of published layouts for the public storefront.
//!
//! Keyed by `(store slug, page type)` with a 60 second TTL. Saves through
//! the admin API invalidate the entry immediately; the TTL bounds staleness
//! for writes from other instances.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

use crate::models::LayoutRecord;

const LAYOUT_TTL: Duration = Duration::from_secs(60);

/// Shared, cheaply cloneable layout cache.
#[derive(Clone)]
pub struct LayoutCache {
    cache: Cache<(String, String), Arc<LayoutRecord>>,
}

impl Default for LayoutCache {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutCache {
    #[must_use]
    pub fn new() -> Self {
        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(LAYOUT_TTL)
            .build();
        Self { cache }
    }

    /// Cached layout, if present and fresh.
    pub async fn get(&self, store_slug: &str, page_type: &str) -> Option<Arc<LayoutRecord>> {
        let hit = self
            .cache
            .get(&(store_slug.to_owned(), page_type.to_owned()))
            .await;
        if hit.is_some() {
            debug!(store_slug, page_type, "Layout cache hit");
        }
        hit
    }

    pub async fn insert(&self, store_slug: &str, page_type: &str, layout: Arc<LayoutRecord>) {
        self.cache
            .insert((store_slug.to_owned(), page_type.to_owned()), layout)
            .await;
    }

    /// Drop a page's entry after a save.
    pub async fn invalidate(&self, store_slug: &str, page_type: &str) {
        self.cache
            .invalidate(&(store_slug.to_owned(), page_type.to_owned()))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use shopforge_core::slots::SlotConfiguration;

    use super::*;

    fn layout(version: i32) -> Arc<LayoutRecord> {
        Arc::new(LayoutRecord {
            configuration: SlotConfiguration::empty("home"),
            version,
            updated_at: None,
        })
    }

    #[tokio::test]
    async fn test_insert_get_invalidate() {
        let cache = LayoutCache::new();
        assert!(cache.get("acme", "home").await.is_none());

        cache.insert("acme", "home", layout(3)).await;
        assert_eq!(cache.get("acme", "home").await.map(|l| l.version), Some(3));
        assert!(cache.get("acme", "product").await.is_none());
        assert!(cache.get("other", "home").await.is_none());

        cache.invalidate("acme", "home").await;
        assert!(cache.get("acme", "home").await.is_none());
    }
}
