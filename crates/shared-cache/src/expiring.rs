//! Expiring map implementation.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

struct Entry<V> {
    value: Arc<V>,
    inserted_at: Instant,
}

/// Counters exposed for metrics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub inserted: u64,
    pub expired: u64,
    pub evicted: u64,
}

/// A map whose entries self-evict after a fixed TTL.
///
/// Values are handed out as `Arc<V>` so callers can keep using an entry after
/// it has been removed or expired.
pub struct ExpiringCache<K, V> {
    name: &'static str,
    entries: Mutex<HashMap<K, Entry<V>>>,
    ttl: Duration,
    max_entries: usize,
    inserted: AtomicU64,
    expired: AtomicU64,
    evicted: AtomicU64,
}

impl<K, V> ExpiringCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create a cache. `max_entries` of zero is treated as one.
    pub fn new(name: &'static str, ttl: Duration, max_entries: usize) -> Self {
        Self {
            name,
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
            inserted: AtomicU64::new(0),
            expired: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
        }
    }

    /// Configured time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Live value for `key`, if any.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if !self.is_expired(entry, now) => Some(Arc::clone(&entry.value)),
            Some(_) => {
                entries.remove(key);
                self.expired.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => None,
        }
    }

    /// Insert or replace `key`, restarting its TTL.
    pub fn insert(&self, key: K, value: V) -> Arc<V> {
        let now = Instant::now();
        let value = Arc::new(value);
        let mut entries = self.entries.lock();
        if !entries.contains_key(&key) {
            self.make_room(&mut entries, now);
        }
        entries.insert(
            key,
            Entry {
                value: Arc::clone(&value),
                inserted_at: now,
            },
        );
        self.inserted.fetch_add(1, Ordering::Relaxed);
        value
    }

    /// Atomically return the live value for `key` or insert one built by `make`.
    ///
    /// The flag is `true` when this call inserted the value.
    pub fn get_or_insert_with<F>(&self, key: K, make: F) -> (Arc<V>, bool)
    where
        F: FnOnce() -> V,
    {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get(&key) {
            if !self.is_expired(entry, now) {
                return (Arc::clone(&entry.value), false);
            }
            entries.remove(&key);
            self.expired.fetch_add(1, Ordering::Relaxed);
        }
        self.make_room(&mut entries, now);
        let value = Arc::new(make());
        entries.insert(
            key,
            Entry {
                value: Arc::clone(&value),
                inserted_at: now,
            },
        );
        self.inserted.fetch_add(1, Ordering::Relaxed);
        (value, true)
    }

    /// Remove `key`, returning its value even if it had expired.
    pub fn remove(&self, key: &K) -> Option<Arc<V>> {
        self.entries.lock().remove(key).map(|e| e.value)
    }

    /// Remove `key` only if it still maps to `value`.
    pub fn remove_if_same(&self, key: &K, value: &Arc<V>) -> bool {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if Arc::ptr_eq(&entry.value, value) => {
                entries.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let removed = self.purge_locked(&mut entries, now);
        if removed > 0 {
            debug!(cache = self.name, removed, "Purged expired cache entries");
        }
        removed
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            inserted: self.inserted.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
        }
    }

    fn is_expired(&self, entry: &Entry<V>, now: Instant) -> bool {
        now.saturating_duration_since(entry.inserted_at) >= self.ttl
    }

    fn purge_locked(&self, entries: &mut HashMap<K, Entry<V>>, now: Instant) -> usize {
        let before = entries.len();
        entries.retain(|_, e| now.saturating_duration_since(e.inserted_at) < self.ttl);
        let removed = before - entries.len();
        self.expired.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    fn make_room(&self, entries: &mut HashMap<K, Entry<V>>, now: Instant) {
        if entries.len() < self.max_entries {
            return;
        }
        self.purge_locked(entries, now);
        while entries.len() >= self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.inserted_at)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    entries.remove(&k);
                    self.evicted.fetch_add(1, Ordering::Relaxed);
                    debug!(cache = self.name, "Evicted oldest entry at capacity");
                }
                None => break,
            }
        }
    }
}
