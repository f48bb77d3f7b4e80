//! Fetched-result caching.

use std::sync::Arc;

use dashmap::DashMap;

use crate::fetch::types::ResourceId;
use crate::observability::metrics;

/// A thread-safe cache of successfully fetched resources.
///
/// Entries are overwritten wholesale on re-fetch and never expire on their
/// own; the only way to drop them is [`ResultCache::clear`].
#[derive(Clone)]
pub struct ResultCache<T> {
    inner: Arc<DashMap<ResourceId, T>>,
}

impl<T: Clone> ResultCache<T> {
    /// Create a new empty cache.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
        }
    }

    /// Look up a cached value.
    pub fn get(&self, id: ResourceId) -> Option<T> {
        self.inner.get(&id).map(|r| r.value().clone())
    }

    /// Store a value, replacing any previous entry for the id.
    pub fn insert(&self, id: ResourceId, value: T) {
        self.inner.insert(id, value);
        metrics::record_cache_size(self.inner.len());
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.inner.clear();
        metrics::record_cache_size(0);
        tracing::info!("Result cache cleared");
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        self.inner.contains_key(&id)
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<T: Clone> Default for ResultCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for ResultCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("entries", &self.inner.len())
            .finish()
    }
}
