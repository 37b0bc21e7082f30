//! Bounded, thread-safe LRU cache for name resolution results.
//!
//! Shared by every compilation running in the process. All operations that
//! touch recency or contents go through a single mutex; lookups are cheap
//! compared to the class-path searches they save, so coarse locking is fine.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Smallest capacity a cache may be configured with.
pub const MIN_CAPACITY: usize = 10;

/// Point-in-time statistics, taken under the cache lock.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn utilization(&self) -> f64 {
        self.size as f64 / self.capacity as f64
    }
}

struct Entry<V> {
    value: V,
    tick: u64,
}

struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    /// Recency order: tick -> key. The smallest tick is the least recently used.
    order: BTreeMap<u64, K>,
    next_tick: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<K: Eq + Hash + Clone, V: Clone> Inner<K, V> {
    fn touch(&mut self, key: &K) -> Option<V> {
        let tick = self.next_tick;
        let entry = self.entries.get_mut(key)?;
        self.order.remove(&entry.tick);
        entry.tick = tick;
        self.order.insert(tick, key.clone());
        self.next_tick += 1;
        Some(entry.value.clone())
    }

    fn insert(&mut self, key: K, value: V, capacity: usize) {
        if let Some(old) = self.entries.remove(&key) {
            self.order.remove(&old.tick);
        } else if self.entries.len() >= capacity {
            self.evict_lru();
        }
        let tick = self.next_tick;
        self.next_tick += 1;
        self.order.insert(tick, key.clone());
        self.entries.insert(key, Entry { value, tick });
    }

    fn evict_lru(&mut self) {
        if let Some((_, key)) = self.order.pop_first() {
            self.entries.remove(&key);
            self.evictions += 1;
            tracing::trace!(size = self.entries.len(), "resolution cache evicted least recently used entry");
        }
    }
}

/// Least-recently-used cache with a fixed capacity (at least [`MIN_CAPACITY`]).
pub struct ResolutionCache<K, V> {
    capacity: usize,
    inner: Mutex<Inner<K, V>>,
}

impl<K: Eq + Hash + Clone, V: Clone> ResolutionCache<K, V> {
    /// Create a cache. Capacities below [`MIN_CAPACITY`] are raised to it.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(MIN_CAPACITY),
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: BTreeMap::new(),
                next_tick: 0,
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
        }
    }

    // Every mutation of `Inner` completes before its guard drops, so a
    // poisoned lock still guards consistent state.
    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a key, promoting it to most recently used.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.lock();
        let found = inner.touch(key);
        if found.is_some() {
            inner.hits += 1;
        } else {
            inner.misses += 1;
        }
        found
    }

    /// Insert or replace a value. Evicts the least recently used entry when full.
    pub fn put(&self, key: K, value: V) {
        self.lock().insert(key, value, self.capacity);
    }

    /// Return the cached value, or compute, store and return it.
    ///
    /// `compute` runs outside the lock, so concurrent callers missing on the
    /// same key may each compute; the last store wins.
    pub fn get_or_compute(&self, key: K, compute: impl FnOnce() -> V) -> V {
        if let Some(v) = self.get(&key) {
            return v;
        }
        let value = compute();
        self.put(key, value.clone());
        value
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        let mut inner = self.lock();
        let entry = inner.entries.remove(key)?;
        inner.order.remove(&entry.tick);
        Some(entry.value)
    }

    /// Membership test that leaves recency untouched.
    pub fn contains_key(&self, key: &K) -> bool {
        self.lock().entries.contains_key(key)
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    pub fn size(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn utilization(&self) -> f64 {
        self.stats().utilization()
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            size: inner.entries.len(),
            capacity: self.capacity,
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }

    /// Keys from least to most recently used.
    pub fn keys_by_recency(&self) -> Vec<K> {
        self.lock().order.values().cloned().collect()
    }
}

impl<K, V> std::fmt::Debug for ResolutionCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionCache").field("capacity", &self.capacity).finish_non_exhaustive()
    }
}
