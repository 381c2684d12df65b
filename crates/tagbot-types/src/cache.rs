//! Bounded in-memory lookup cache.
//!
//! Least-recently-used eviction with a fixed capacity. Each component that
//! needs a cache owns its own instance; nothing here is global.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

/// Thread-safe LRU cache with a declared capacity.
pub struct BoundedCache<K: Hash + Eq, V> {
    inner: Mutex<LruCache<K, V>>,
    capacity: NonZeroUsize,
}

impl<K: Hash + Eq, V: Clone> BoundedCache<K, V> {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            capacity,
        }
    }

    /// Look up a value, marking it as most recently used.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut cache = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        cache.get(key).cloned()
    }

    /// Insert a value, evicting the least recently used entry when full.
    ///
    /// Returns the displaced entry: either the previous value stored under
    /// `key` or the evicted least recently used entry.
    pub fn insert(&self, key: K, value: V) -> Option<(K, V)> {
        let mut cache = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        cache.push(key, value)
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        let mut cache = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        cache.pop(key)
    }

    pub fn len(&self) -> usize {
        let cache = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }
}

impl<K: Hash + Eq + Clone, V: Clone> BoundedCache<K, V> {
    /// Snapshot of every entry, most recently used first. Does not touch recency.
    pub fn entries(&self) -> Vec<(K, V)> {
        let cache = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        cache.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_and_insert() {
        let cache = BoundedCache::new(4);
        assert!(cache.is_empty());
        cache.insert("a", 1);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache = BoundedCache::new(2);
        cache.insert(1, "one");
        cache.insert(2, "two");

        // touch 1 so 2 becomes the eviction candidate
        assert_eq!(cache.get(&1), Some("one"));

        let evicted = cache.insert(3, "three");
        assert_eq!(evicted, Some((2, "two")));
        assert_eq!(cache.get(&2), None);
        assert_eq!(cache.get(&1), Some("one"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_entries_most_recent_first() {
        let cache = BoundedCache::new(3);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3);
        cache.get(&"a");

        assert_eq!(cache.entries(), vec![("a", 1), ("c", 3), ("b", 2)]);
        // snapshot leaves the order alone
        assert_eq!(cache.entries()[0], ("a", 1));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let cache: BoundedCache<u8, u8> = BoundedCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.insert(1, 1);
        cache.insert(2, 2);
        assert_eq!(cache.len(), 1);
    }
}
