//! Optional cache for GET responses with explicit invalidation.

use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;

/// Trait for cache implementations.
pub trait Cache: Send + Sync {
    /// Get a live entry by key.
    fn get(&self, key: &str) -> Option<CacheEntry>;

    /// Store an entry in the cache.
    fn set(&self, key: &str, entry: CacheEntry);

    /// Delete an entry from the cache.
    fn delete(&self, key: &str);

    /// Drop every entry.
    fn clear(&self);
}

/// A cached response body.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The parsed body.
    pub value: Value,
    /// When the entry stops being served.
    pub expires_at: Instant,
}

impl CacheEntry {
    /// An entry that lives for `ttl` from now.
    pub fn new(value: Value, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at <= Instant::now()
    }
}

/// Generate a cache key from request details and an optional variant
/// (per-request headers) that must not share an entry.
pub fn cache_key(method: &str, url: &str, variant: Option<&str>) -> String {
    let mut key = format!("{}:{}", method.to_uppercase(), url);
    if let Some(variant) = variant {
        key.push(':');
        key.push_str(variant);
    }
    key
}

#[derive(Default)]
struct Store {
    entries: HashMap<String, CacheEntry>,
    order: VecDeque<String>,
}

/// In-memory cache with oldest-first eviction.
pub struct MemoryCache {
    store: RwLock<Store>,
    max_entries: usize,
}

impl MemoryCache {
    /// Create a new memory cache with the given maximum entries.
    pub fn new(max_entries: usize) -> Self {
        Self {
            store: RwLock::new(Store {
                entries: HashMap::with_capacity(max_entries),
                order: VecDeque::with_capacity(max_entries),
            }),
            max_entries: max_entries.max(1),
        }
    }

    /// Get the current number of entries, expired ones included.
    pub fn size(&self) -> usize {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        let store = self.store.read().unwrap_or_else(PoisonError::into_inner);
        store
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .cloned()
    }

    fn set(&self, key: &str, entry: CacheEntry) {
        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);

        if !store.entries.contains_key(key) {
            while store.entries.len() >= self.max_entries {
                match store.order.pop_front() {
                    Some(oldest) => {
                        store.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
            store.order.push_back(key.to_string());
        }

        store.entries.insert(key.to_string(), entry);
    }

    fn delete(&self, key: &str) {
        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        store.entries.remove(key);
        store.order.retain(|k| k != key);
    }

    fn clear(&self) {
        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        store.entries.clear();
        store.order.clear();
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(100)
    }
}
