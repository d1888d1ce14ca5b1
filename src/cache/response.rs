//! TTL response cache with batched invalidation.
//!
//! [`ResponseCache`] stores fetched collections (e.g. one page of a list
//! query) under an opaque key derived from the request shape. Entries expire
//! `ttl` after they were stored; expiry is checked lazily on every read and a
//! stale entry is removed by the read that finds it. There is no background
//! sweep.
//!
//! # Batched invalidation
//!
//! Writes do not evict immediately. [`ResponseCache::mark_for_update()`] adds
//! the key to a pending set and, if no pass is scheduled yet, schedules one
//! `batch_delay` later. Every key marked before the pass fires is evicted in
//! that single pass; keys marked afterwards start a new one. A burst of writes
//! therefore costs one eviction pass per window regardless of call volume.
//!
//! Expiry is measured on the tokio clock, so paused-time tests can step over
//! the TTL and the batch window deterministically.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use moka::sync::Cache;
use tokio::time::Instant;
use tracing::debug;

use crate::telemetry;
use crate::timer::ScheduledTask;

/// Configuration for the response cache.
///
/// ```rust
/// # use muninn::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .ttl(Duration::from_secs(60))
///     .batch_delay(Duration::from_millis(50));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached entries. Default: 10,000.
    pub max_entries: u64,
    /// Time-to-live for cached entries. Default: 5 minutes.
    pub ttl: Duration,
    /// Delay between the first `mark_for_update` and the eviction pass.
    /// Default: 100ms.
    pub batch_delay: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(5 * 60),
            batch_delay: Duration::from_millis(100),
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached entries.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the time-to-live for cached entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the invalidation batching window.
    pub fn batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }
}

/// A cached value together with the bookkeeping needed to expire it.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    /// When the entry was stored (tokio clock).
    pub stored_at: Instant,
    /// Total record count reported by the server for this query.
    pub total_count: u64,
}

impl<T> CacheEntry<T> {
    fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) <= ttl
    }
}

/// Keys waiting for the next eviction pass.
#[derive(Default)]
struct Invalidation {
    pending: HashSet<String>,
    timer: Option<ScheduledTask>,
    /// Bumped on every schedule and on `clear()`; a pass only runs if it
    /// still owns the current generation.
    generation: u64,
}

struct Shared<T> {
    entries: Cache<String, CacheEntry<T>>,
    config: CacheConfig,
    invalidation: Mutex<Invalidation>,
    passes: AtomicU64,
}

impl<T> Shared<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn invalidation(&self) -> MutexGuard<'_, Invalidation> {
        self.invalidation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Evict every pending key. Runs under the invalidation lock so marks
    /// cannot interleave with the pass.
    fn run_invalidation_pass(&self, generation: u64) {
        let mut inv = self.invalidation();
        if inv.generation != generation {
            return;
        }
        inv.timer = None;
        let keys = std::mem::take(&mut inv.pending);
        for key in &keys {
            self.entries.invalidate(key.as_str());
        }
        self.passes.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(telemetry::CACHE_INVALIDATION_PASSES_TOTAL).increment(1);
        debug!(keys = keys.len(), "cache invalidation pass");
    }
}

/// In-memory TTL cache for fetched collections.
///
/// Cheap to clone; clones share the same storage and pending-invalidation
/// state. Storage is bounded by `max_entries` (moka LRU).
pub struct ResponseCache<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for ResponseCache<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> ResponseCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an empty cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        let entries = Cache::builder().max_capacity(config.max_entries).build();
        Self {
            shared: Arc::new(Shared {
                entries,
                config,
                invalidation: Mutex::new(Invalidation::default()),
                passes: AtomicU64::new(0),
            }),
        }
    }

    /// The configuration this cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.shared.config
    }

    /// Look up a fresh entry.
    ///
    /// Returns `None` on a miss. An expired entry is removed as a side
    /// effect and reported as a miss.
    pub fn get(&self, key: &str) -> Option<CacheEntry<T>> {
        let Some(entry) = self.shared.entries.get(key) else {
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
            return None;
        };
        if entry.is_fresh(self.shared.config.ttl, Instant::now()) {
            metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
            return Some(entry);
        }
        self.shared.entries.invalidate(key);
        debug!(key, "evicted expired cache entry");
        metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
        None
    }

    /// Insert (or overwrite) an entry with a fresh timestamp.
    pub fn set(&self, key: &str, value: T, total_count: u64) {
        let entry = CacheEntry {
            value,
            stored_at: Instant::now(),
            total_count,
        };
        self.shared.entries.insert(key.to_owned(), entry);
    }

    /// Mark `key` stale. It is evicted by the next batched pass.
    pub fn mark_for_update(&self, key: &str) {
        let mut inv = self.shared.invalidation();
        inv.pending.insert(key.to_owned());
        if inv.timer.is_some() {
            return;
        }
        inv.generation += 1;
        let generation = inv.generation;
        let shared = Arc::clone(&self.shared);
        inv.timer = Some(ScheduledTask::after(
            self.shared.config.batch_delay,
            async move { shared.run_invalidation_pass(generation) },
        ));
        debug!(key, "scheduled cache invalidation pass");
    }

    /// Drop every entry and any pending invalidation.
    pub fn clear(&self) {
        let mut inv = self.shared.invalidation();
        inv.pending.clear();
        inv.generation += 1;
        if let Some(timer) = inv.timer.take() {
            timer.cancel();
        }
        self.shared.entries.invalidate_all();
    }

    /// Whether an entry is stored for `key`, fresh or not. Does not evict.
    pub fn contains_key(&self, key: &str) -> bool {
        self.shared.entries.contains_key(key)
    }

    /// All stored keys starting with `prefix`.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.shared
            .entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| String::clone(&key))
            .collect()
    }

    /// Keys marked for update that have not been evicted yet.
    pub fn pending_keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.shared.invalidation().pending.iter().cloned().collect();
        keys.sort();
        keys
    }

    /// Whether an eviction pass is currently scheduled.
    pub fn has_pending_invalidation(&self) -> bool {
        self.shared.invalidation().timer.is_some()
    }

    /// Number of eviction passes executed so far.
    pub fn invalidation_passes(&self) -> u64 {
        self.shared.passes.load(Ordering::Relaxed)
    }

    /// Number of stored entries (including expired ones not yet read).
    pub fn len(&self) -> u64 {
        self.shared.entries.run_pending_tasks();
        self.shared.entries.entry_count()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
