//! BoundedCache implementation with best-effort capacity enforcement.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::warn;

/// Concurrent key/value store with an approximate maximum size.
///
/// `len()` always matches the number of live entries. The capacity bound only
/// holds once concurrent inserts settle: racing inserts may overshoot by the
/// number of racers before eviction catches up. Victims are picked in whatever
/// order the map yields them, there is no recency ordering.
pub struct BoundedCache<K, V> {
    /// The cache storage.
    entries: DashMap<K, V>,
    /// Maximum number of entries to keep.
    capacity: AtomicUsize,
    /// Number of live entries.
    size: AtomicUsize,
    /// Entries removed to get back under capacity, possibly shared.
    evictions: Arc<AtomicU64>,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Clone,
{
    /// Create an empty cache holding roughly `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self::with_eviction_counter(capacity, Arc::default())
    }

    /// Create an empty cache that adds its capacity evictions to `evictions`.
    #[must_use]
    pub fn with_eviction_counter(capacity: usize, evictions: Arc<AtomicU64>) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: AtomicUsize::new(capacity),
            size: AtomicUsize::new(0),
            evictions,
        }
    }

    /// Look up a value. Never blocks on I/O and has no side effects.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Insert or overwrite a value.
    ///
    /// Overwriting an existing key never evicts. Inserting a new key that
    /// pushes the size over capacity runs one eviction pass that spares the
    /// key just inserted.
    pub fn add(&self, key: K, value: V) {
        let inserted = match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                occupied.insert(value);
                None
            }
            Entry::Vacant(vacant) => {
                let key = vacant.key().clone();
                // Counted under the shard lock so a racing delete of this key
                // can only decrement after the increment.
                let size = self.size.fetch_add(1, Ordering::SeqCst) + 1;
                vacant.insert(value);
                Some((key, size))
            }
        };

        if let Some((key, size)) = inserted
            && size > self.capacity()
        {
            self.evict(Some(&key));
        }
    }

    /// Overwrite a value only if the key is still present.
    ///
    /// Returns `false` when the key was removed in the meantime; the key is
    /// not re-inserted in that case.
    pub fn replace<Q>(&self, key: &Q, value: V) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.entries.get_mut(key) {
            Some(mut entry) => {
                *entry = value;
                true
            }
            None => false,
        }
    }

    /// Remove a key.
    ///
    /// Returns `true` if this call removed it. Concurrent deletes of the same
    /// key decrement the size once.
    pub fn delete<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if self.entries.remove(key).is_some() {
            self.size.fetch_sub(1, Ordering::SeqCst);
            true
        } else {
            false
        }
    }

    /// Point-in-time snapshot of the keys. May race with concurrent writers.
    pub fn keys(&self) -> Vec<K> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Swap in a new capacity and return the previous one.
    ///
    /// Shrinking below the current size runs one eviction pass.
    pub fn update_capacity(&self, capacity: usize) -> usize {
        let old = self.capacity.swap(capacity, Ordering::SeqCst);
        if self.len() > capacity {
            self.evict(None);
        }
        old
    }

    /// Current capacity.
    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::SeqCst)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of capacity evictions recorded on the eviction counter.
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// One pass over a key snapshot, deleting until back under capacity.
    ///
    /// The snapshot is taken first because removing while iterating would
    /// deadlock on the shard lock.
    fn evict(&self, keep: Option<&K>) {
        for key in self.keys() {
            if self.len() <= self.capacity() {
                break;
            }
            if keep == Some(&key) {
                continue;
            }
            if self.delete(&key) {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                warn!(
                    capacity = self.capacity(),
                    key = ?key,
                    "Exceeded cache capacity, evicted entry"
                );
            }
        }
    }
}

impl<K, V> fmt::Debug for BoundedCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedCache")
            .field("capacity", &self.capacity.load(Ordering::Relaxed))
            .field("size", &self.size.load(Ordering::Relaxed))
            .field("evictions", &self.evictions.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
