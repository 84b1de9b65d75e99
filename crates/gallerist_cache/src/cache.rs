//! Read cache implementation.

use crate::{Clock, ReadCacheConfig, SystemClock};
use derive_getters::Getters;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Cache entry with value and expiration.
#[derive(Debug, Clone, Getters)]
pub struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    /// Check if this entry is expired at `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= self.ttl
    }

    /// Get remaining time until expiration.
    pub fn time_remaining(&self, now: Instant) -> Option<Duration> {
        self.ttl
            .checked_sub(now.saturating_duration_since(self.created_at))
    }
}

#[derive(Debug)]
struct Entries<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    access_order: Vec<K>,
    generation: u64,
}

impl<K: Eq + Hash + Clone, V> Entries<K, V> {
    fn forget(&mut self, key: &K) {
        if let Some(pos) = self.access_order.iter().position(|k| k == key) {
            self.access_order.remove(pos);
        }
    }

    fn touch(&mut self, key: &K) {
        self.forget(key);
        self.access_order.push(key.clone());
    }
}

/// Process-local cache-aside store for read queries.
///
/// Entries expire after a fixed TTL measured on the injected [`Clock`]; when
/// full, the least recently used entry is evicted. Values are cloned out, so
/// callers never hold the lock.
///
/// Every invalidation bumps a generation counter. A reader that loads a value
/// from the backing store should capture [`ReadCache::generation`] before the
/// load and store the result with [`ReadCache::insert_if_generation`], so a
/// load that raced an invalidation is never cached.
///
/// # Example
///
/// ```
/// use gallerist_cache::{ReadCache, ReadCacheConfig};
///
/// # #[tokio::main]
/// # async fn main() {
/// let cache: ReadCache<&'static str, u32> = ReadCache::new(ReadCacheConfig::default());
///
/// cache.insert("answer", 42).await;
/// assert_eq!(cache.get(&"answer").await, Some(42));
///
/// cache.invalidate(&"answer").await;
/// assert_eq!(cache.get(&"answer").await, None);
/// # }
/// ```
#[derive(Debug)]
pub struct ReadCache<K, V> {
    config: ReadCacheConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<Entries<K, V>>,
}

impl<K, V> ReadCache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send,
    V: Clone + Send,
{
    /// Create a cache driven by the system clock.
    pub fn new(config: ReadCacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a cache driven by `clock`.
    pub fn with_clock(config: ReadCacheConfig, clock: Arc<dyn Clock>) -> Self {
        tracing::debug!(
            default_ttl = config.default_ttl(),
            max_size = config.max_size(),
            enabled = config.enabled(),
            "Creating new ReadCache"
        );
        Self {
            config,
            clock,
            inner: Mutex::new(Entries {
                entries: HashMap::new(),
                access_order: Vec::new(),
                generation: 0,
            }),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &ReadCacheConfig {
        &self.config
    }

    /// Insert with the configured default TTL.
    pub async fn insert(&self, key: K, value: V) {
        self.insert_with_ttl(key, value, self.config.ttl()).await;
    }

    /// Insert with an explicit TTL.
    #[tracing::instrument(skip(self, value))]
    pub async fn insert_with_ttl(&self, key: K, value: V, ttl: Duration) {
        if !self.config.enabled() || *self.config.max_size() == 0 {
            tracing::debug!("Cache disabled, skipping insert");
            return;
        }

        let mut inner = self.inner.lock().await;
        self.store(&mut inner, key, value, ttl);
    }

    /// Current invalidation generation.
    pub async fn generation(&self) -> u64 {
        self.inner.lock().await.generation
    }

    /// Insert with the default TTL unless the cache was invalidated since
    /// `generation` was read. Returns true if the value was stored.
    #[tracing::instrument(skip(self, value))]
    pub async fn insert_if_generation(&self, key: K, value: V, generation: u64) -> bool {
        if !self.config.enabled() || *self.config.max_size() == 0 {
            tracing::debug!("Cache disabled, skipping insert");
            return false;
        }

        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            tracing::debug!(
                current = inner.generation,
                "Cache invalidated during load, discarding value"
            );
            return false;
        }
        self.store(&mut inner, key, value, self.config.ttl());
        true
    }

    fn store(&self, inner: &mut Entries<K, V>, key: K, value: V, ttl: Duration) {
        // Evict if at capacity
        if inner.entries.len() >= *self.config.max_size()
            && !inner.entries.contains_key(&key)
            && let Some(lru) = inner.access_order.first().cloned()
        {
            tracing::debug!(key = ?lru, "Evicting LRU entry");
            inner.entries.remove(&lru);
            inner.access_order.remove(0);
        }

        inner.touch(&key);
        inner.entries.insert(
            key,
            CacheEntry {
                value,
                created_at: self.clock.now(),
                ttl,
            },
        );
        tracing::debug!(cache_size = inner.entries.len(), "Inserted entry into cache");
    }

    /// Get a cached value.
    ///
    /// Returns None if:
    /// - Entry doesn't exist
    /// - Entry is expired
    /// - Cache is disabled
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, key: &K) -> Option<V> {
        if !self.config.enabled() {
            return None;
        }

        let now = self.clock.now();
        let mut inner = self.inner.lock().await;

        let expired = inner.entries.get(key)?.is_expired(now);
        if expired {
            tracing::debug!("Cache entry expired, removing");
            inner.entries.remove(key);
            inner.forget(key);
            return None;
        }

        inner.touch(key);
        let entry = inner.entries.get(key)?;
        tracing::debug!(time_remaining = ?entry.time_remaining(now), "Cache hit");
        Some(entry.value.clone())
    }

    /// Drop one entry. Returns true if it was present.
    #[tracing::instrument(skip(self))]
    pub async fn invalidate(&self, key: &K) -> bool {
        let mut inner = self.inner.lock().await;
        inner.generation = inner.generation.wrapping_add(1);
        inner.forget(key);
        inner.entries.remove(key).is_some()
    }

    /// Remove expired entries from cache.
    pub async fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.inner.lock().await;
        let before = inner.entries.len();

        let Entries {
            entries,
            access_order,
            ..
        } = &mut *inner;
        entries.retain(|_, entry| !entry.is_expired(now));
        access_order.retain(|key| entries.contains_key(key));

        let removed = before - entries.len();
        if removed > 0 {
            tracing::info!(
                removed,
                remaining = entries.len(),
                "Cleaned up expired cache entries"
            );
        }
        removed
    }

    /// Clear all cache entries.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        let count = inner.entries.len();
        inner.entries.clear();
        inner.access_order.clear();
        inner.generation = inner.generation.wrapping_add(1);
        tracing::debug!(cleared = count, "Cleared cache");
    }

    /// Get number of cached entries, expired or not.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    /// Check if cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.entries.is_empty()
    }
}

impl<K, V> Default for ReadCache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send,
    V: Clone + Send,
{
    fn default() -> Self {
        Self::new(ReadCacheConfig::default())
    }
}
