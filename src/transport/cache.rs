use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use tracing::debug;

/// Cached value plus the moment it was stored.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub data: V,
    pub stored_at: Instant,
}

/// Size-bounded TTL cache with first-inserted eviction.
///
/// Expired entries are never returned and are dropped on the lookup that finds them.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use llm_gateway::transport::cache::ResponseCache;
///
/// let mut cache = ResponseCache::new(2, Duration::from_secs(60));
/// cache.insert("a", 1);
/// cache.insert("b", 2);
/// cache.insert("c", 3);
/// assert_eq!(cache.len(), 2);
/// assert!(cache.get("a").is_none());
/// assert_eq!(cache.get("c"), Some(&3));
/// ```
#[derive(Debug)]
pub struct ResponseCache<V> {
    entries: HashMap<String, CacheEntry<V>>,
    order: VecDeque<String>,
    capacity: usize,
    ttl: Duration,
}

impl<V> ResponseCache<V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity,
            ttl,
        }
    }

    pub fn get(&mut self, key: &str) -> Option<&V> {
        self.get_at(key, Instant::now())
    }

    /// Lookup evaluated against `now` instead of the wall clock.
    pub fn get_at(&mut self, key: &str, now: Instant) -> Option<&V> {
        let expired = self
            .entries
            .get(key)
            .map(|entry| now.saturating_duration_since(entry.stored_at) > self.ttl)?;
        if expired {
            debug!(key, "dropping expired cache entry");
            self.remove(key);
            return None;
        }
        self.entries.get(key).map(|entry| &entry.data)
    }

    pub fn insert(&mut self, key: impl Into<String>, data: V) {
        self.insert_at(key, data, Instant::now());
    }

    pub fn insert_at(&mut self, key: impl Into<String>, data: V, now: Instant) {
        if self.capacity == 0 {
            return;
        }
        let key = key.into();
        if self.entries.contains_key(&key) {
            self.order.retain(|existing| existing != &key);
        }
        while self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            debug!(key = %oldest, "evicting oldest cache entry");
            self.entries.remove(&oldest);
        }
        self.order.push_back(key.clone());
        self.entries.insert(
            key,
            CacheEntry {
                data,
                stored_at: now,
            },
        );
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        let entry = self.entries.remove(key)?;
        self.order.retain(|existing| existing != key);
        Some(entry.data)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
