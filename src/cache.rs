//! Bounded TTL + insertion-order LRU cache shared by the resolver, pool
//! registry, and portfolio engine.
//!
//! Backed by `dashmap` for lock-free concurrent reads/writes, with a
//! side `VecDeque` tracking insertion order for eviction — the same
//! shard-friendly shape the teacher uses for its Redis cache wrapper,
//! translated to a pure in-memory structure.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::hash::Hash;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

pub struct BoundedCache<K, V> {
    capacity: usize,
    ttl: Duration,
    map: DashMap<K, Entry<V>>,
    order: Mutex<VecDeque<K>>,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            map: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
        }
    }

    /// Returns the value if present and not expired; expired entries are
    /// removed on read.
    pub fn get(&self, key: &K) -> Option<V> {
        let expired = match self.map.get(key) {
            Some(entry) => entry.inserted_at.elapsed() > self.ttl,
            None => return None,
        };
        if expired {
            self.map.remove(key);
            return None;
        }
        self.map.get(key).map(|e| e.value.clone())
    }

    /// Inserts a value, evicting the oldest insertion if at capacity.
    pub fn insert(&self, key: K, value: V) {
        if !self.map.contains_key(&key) {
            let mut order = self.order.lock();
            if self.map.len() >= self.capacity {
                if let Some(oldest) = order.pop_front() {
                    self.map.remove(&oldest);
                }
            }
            order.push_back(key.clone());
        }
        self.map.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn remove(&self, key: &K) {
        self.map.remove(key);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Sweeps expired entries; called by the scheduler's cache-pruning job.
    pub fn prune(&self) {
        let ttl = self.ttl;
        self.map.retain(|_, entry| entry.inserted_at.elapsed() <= ttl);
        let mut order = self.order.lock();
        order.retain(|k| self.map.contains_key(k));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_insertion_at_capacity() {
        let cache = BoundedCache::new(2, Duration::from_secs(60));
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3);
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.get(&"b"), Some(2));
        assert_eq!(cache.get(&"c"), Some(3));
    }

    #[test]
    fn expired_entry_returns_miss_and_is_removed() {
        let cache = BoundedCache::new(10, Duration::from_millis(1));
        cache.insert("a", 1);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn read_does_not_refresh_insertion_order() {
        let cache = BoundedCache::new(2, Duration::from_secs(60));
        cache.insert("a", 1);
        cache.insert("b", 2);
        let _ = cache.get(&"a");
        cache.insert("c", 3);
        assert_eq!(cache.get(&"a"), None, "LRU is insertion-order, not access-order");
    }
}
