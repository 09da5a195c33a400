//! Replay-protection cache.
//!
//! A bounded map from client identifier to the last accepted sequence
//! number, with least-recently-used eviction. A hash map holds the entries;
//! the LRU order is a singly-linked chain from the most recently used entry
//! towards the least recently used one, linked by key. Finding the tail
//! walks the chain, which is fine for the small capacities this cache is
//! built for (tens to low hundreds of clients).

use std::collections::HashMap;

use parking_lot::Mutex;

struct Entry {
    value: u32,
    next: Option<u64>,
}

struct Inner {
    capacity: usize,
    head: Option<u64>,
    entries: HashMap<u64, Entry>,
}

/// Bounded key-value store for client sequence numbers.
///
/// Both reads and writes promote the touched entry to the front of the LRU
/// order, so all access is serialized behind a single mutex.
pub struct SequenceCache {
    inner: Mutex<Inner>,
}

impl SequenceCache {
    /// Create a new cache holding at most `capacity` entries.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is less than 2.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 2, "cache capacity must be at least 2");
        Self {
            inner: Mutex::new(Inner {
                capacity,
                head: None,
                entries: HashMap::with_capacity(capacity),
            }),
        }
    }

    /// Set the value for the given key and promote it to most recently
    /// used, returning the previous value. For a fresh key the returned
    /// old value is 0. Inserting beyond capacity evicts the least recently
    /// used entry.
    pub fn set(&self, key: u64, value: u32) -> u32 {
        self.inner.lock().set(key, value)
    }

    /// Return the current value for the given key and promote it to most
    /// recently used. Returns 0 if no entry exists.
    pub fn get(&self, key: u64) -> u32 {
        self.inner.lock().get(key)
    }

    /// Number of entries currently cached.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Inner {
    fn set(&mut self, key: u64, value: u32) -> u32 {
        if let Some(entry) = self.entries.get_mut(&key) {
            let old = entry.value;
            entry.value = value;
            self.move_to_front(key);
            return old;
        }

        let head = self.head;
        self.entries.insert(key, Entry { value, next: head });
        self.head = Some(key);

        if self.entries.len() > self.capacity {
            self.remove_last();
        }
        0
    }

    fn get(&mut self, key: u64) -> u32 {
        match self.entries.get(&key) {
            Some(entry) => {
                let value = entry.value;
                self.move_to_front(key);
                value
            }
            None => 0,
        }
    }

    fn move_to_front(&mut self, key: u64) {
        if self.head == Some(key) {
            return;
        }

        let after = match self.entries.get(&key) {
            Some(entry) => entry.next,
            None => return,
        };

        // unlink: find the entry pointing at `key` and bridge over it
        let mut cur = self.head;
        while let Some(k) = cur {
            let next = match self.entries.get(&k) {
                Some(entry) => entry.next,
                None => None,
            };
            if next == Some(key) {
                if let Some(entry) = self.entries.get_mut(&k) {
                    entry.next = after;
                }
                break;
            }
            cur = next;
        }

        let head = self.head;
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.next = head;
        }
        self.head = Some(key);
    }

    fn remove_last(&mut self) {
        // capacity >= 2, so the chain has a head and at least one successor
        let Some(mut prev) = self.head else { return };
        let Some(mut last) = self.entries.get(&prev).and_then(|e| e.next) else {
            return;
        };
        while let Some(next) = self.entries.get(&last).and_then(|e| e.next) {
            prev = last;
            last = next;
        }

        if let Some(entry) = self.entries.get_mut(&prev) {
            entry.next = None;
        }
        self.entries.remove(&last);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_key_returns_zero() {
        let cache = SequenceCache::new(2);
        assert!(cache.is_empty());

        assert_eq!(cache.set(1337, 42), 0);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(1337), 42);
    }

    #[test]
    fn test_overwrite_returns_old_value() {
        let cache = SequenceCache::new(2);

        cache.set(1337, 42);
        assert_eq!(cache.set(1337, 43), 42);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(1337), 43);
    }

    #[test]
    fn test_missing_key_returns_zero() {
        let cache = SequenceCache::new(2);
        cache.set(1, 10);
        assert_eq!(cache.get(2), 0);
    }

    #[test]
    fn test_eviction_drops_least_recently_used() {
        let cache = SequenceCache::new(2);

        cache.set(1, 10);
        cache.set(2, 20);
        cache.set(3, 30);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(1), 0);
        assert_eq!(cache.get(2), 20);
        assert_eq!(cache.get(3), 30);
    }

    #[test]
    fn test_get_promotes_entry() {
        let cache = SequenceCache::new(2);

        cache.set(1337, 43);
        cache.set(1338, 42);

        // touch the older entry, making 1338 the eviction candidate
        assert_eq!(cache.get(1337), 43);
        assert_eq!(cache.set(1337, 42), 43);

        cache.set(1339, 7);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(1338), 0);
        assert_eq!(cache.get(1337), 42);
        assert_eq!(cache.get(1339), 7);
    }

    #[test]
    fn test_recently_used_survives_capacity_minus_one_inserts() {
        let cache = SequenceCache::new(4);
        cache.set(100, 1);
        cache.set(101, 2);
        cache.set(102, 3);
        cache.set(103, 4);

        assert_eq!(cache.get(100), 1);

        // three inserts on other keys must not evict the freshly touched key
        cache.set(104, 5);
        cache.set(105, 6);
        cache.set(106, 7);

        assert_eq!(cache.get(100), 1);
    }

    #[test]
    #[should_panic(expected = "at least 2")]
    fn test_capacity_below_two_rejected() {
        let _ = SequenceCache::new(1);
    }
}
