//! Hash-indexed cache with grace-period decay
//!
//! Keys are spread over a fixed bucket table. Each insert first sweeps the
//! target bucket of entries older than the grace period, then, if the cache
//! is still full, evicts the oldest entry of the next occupied bucket found
//! by a rotating cursor.

use tracing::trace;
use vouch_core::{CacheKey, VouchError, VouchResult};

use crate::CacheEntry;

/// Bucketed cache bounded by entry count and, optionally, entry age
#[derive(Clone, Debug)]
pub struct GraceCache {
    /// Collision lists, oldest entry first
    buckets: Vec<Vec<CacheEntry>>,
    /// Maximum live entries across all buckets
    capacity: usize,
    /// Maximum entry age in ms; `None` disables decay
    grace: Option<u64>,
    /// Live entry count
    len: usize,
    /// Eviction cursor
    cursor: usize,
}

impl GraceCache {
    /// Create a cache. A zero bucket count is raised to one.
    pub fn new(capacity: usize, buckets: usize, grace: Option<u64>) -> Self {
        let buckets = buckets.max(1);
        GraceCache {
            buckets: vec![Vec::new(); buckets],
            capacity,
            grace,
            len: 0,
            cursor: 0,
        }
    }

    /// Check if a key is remembered. Walks a single bucket.
    ///
    /// An entry past its grace period still counts until its bucket is swept
    /// by an insert or by `expire`; the engine expires on every tick, so a
    /// key outlives its grace by at most one tick interval.
    pub fn is_duplicate(&self, key: &CacheKey) -> bool {
        let index = key.bucket(self.buckets.len());
        self.buckets[index].iter().any(|entry| entry.key == *key)
    }

    /// Remember a key. Returns how many entries were expired or evicted
    /// to make room.
    pub fn insert(&mut self, key: CacheKey, now: u64) -> VouchResult<usize> {
        if self.capacity == 0 {
            return Err(VouchError::CapacityExhausted("grace cache has no capacity"));
        }

        let index = key.bucket(self.buckets.len());
        let mut removed = self.sweep_bucket(index, now);

        while self.len >= self.capacity {
            if !self.evict_one() {
                break;
            }
            removed += 1;
        }

        let bucket = &mut self.buckets[index];
        bucket
            .try_reserve(1)
            .map_err(|_| VouchError::CapacityExhausted("grace cache entry allocation"))?;
        bucket.push(CacheEntry::new(key, now));
        self.len += 1;

        Ok(removed)
    }

    /// Drop every entry older than the grace period. Returns the number
    /// of entries removed.
    pub fn expire(&mut self, now: u64) -> usize {
        (0..self.buckets.len())
            .map(|index| self.sweep_bucket(index, now))
            .sum()
    }

    fn sweep_bucket(&mut self, index: usize, now: u64) -> usize {
        let Some(grace) = self.grace else {
            return 0;
        };

        let bucket = &mut self.buckets[index];
        let before = bucket.len();
        bucket.retain(|entry| entry.age(now) <= grace);
        let removed = before - bucket.len();
        self.len -= removed;
        removed
    }

    /// Evict the oldest entry of the first occupied bucket at or after the
    /// cursor. Returns false if the cache is empty.
    fn evict_one(&mut self) -> bool {
        let count = self.buckets.len();
        for step in 0..count {
            let index = (self.cursor + step) % count;
            if !self.buckets[index].is_empty() {
                let evicted = self.buckets[index].remove(0);
                trace!(bucket = index, entry = %evicted, "evicted under capacity pressure");
                self.len -= 1;
                self.cursor = (index + 1) % count;
                return true;
            }
        }
        false
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn grace(&self) -> Option<u64> {
        self.grace
    }

    /// Entries in bucket order
    pub fn iter(&self) -> impl Iterator<Item = &CacheEntry> {
        self.buckets.iter().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vouch_core::{MessageRecord, NodeId};

    fn key(n: u32) -> CacheKey {
        MessageRecord::origin(n, NodeId::new(1), 0).key()
    }

    #[test]
    fn test_grace_sweep_on_insert() {
        // One bucket so every insert sweeps everything
        let mut cache = GraceCache::new(100, 1, Some(5_000));
        cache.insert(key(1), 0).unwrap();
        cache.insert(key(2), 3_000).unwrap();

        // At t=5000 key 1 is exactly at the boundary and survives
        cache.insert(key(3), 5_000).unwrap();
        assert!(cache.is_duplicate(&key(1)));

        // At t=5001 it is swept
        let removed = cache.insert(key(4), 5_001).unwrap();
        assert_eq!(removed, 1);
        assert!(!cache.is_duplicate(&key(1)));
        assert!(cache.is_duplicate(&key(2)));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_sweep_only_touches_target_bucket() {
        let mut cache = GraceCache::new(100, 64, Some(10));
        cache.insert(key(1), 0).unwrap();
        assert_ne!(key(1).bucket(64), key(2).bucket(64));

        cache.insert(key(2), 1_000).unwrap();
        // Key 1 lives in another bucket: still remembered until expire()
        assert!(cache.is_duplicate(&key(1)));

        assert_eq!(cache.expire(1_000), 1);
        assert!(!cache.is_duplicate(&key(1)));
        assert!(cache.is_duplicate(&key(2)));
    }

    #[test]
    fn test_collisions_keep_all_keys() {
        let mut cache = GraceCache::new(8, 1, None);
        for n in 0..8 {
            cache.insert(key(n), 0).unwrap();
        }
        for n in 0..8 {
            assert!(cache.is_duplicate(&key(n)));
        }
    }

    #[test]
    fn test_capacity_rotation() {
        let mut cache = GraceCache::new(2, 4, None);
        cache.insert(key(1), 0).unwrap();
        cache.insert(key(2), 0).unwrap();
        assert_eq!(cache.insert(key(3), 0).unwrap(), 1);
        assert_eq!(cache.len(), 2);

        let live = (1..=3).filter(|n| cache.is_duplicate(&key(*n))).count();
        assert_eq!(live, 2);
        assert!(cache.is_duplicate(&key(3)));
    }

    #[test]
    fn test_no_decay_without_grace() {
        let mut cache = GraceCache::new(4, 2, None);
        cache.insert(key(1), 0).unwrap();
        assert_eq!(cache.expire(u64::MAX), 0);
        assert!(cache.is_duplicate(&key(1)));
    }

    #[test]
    fn test_zero_buckets_raised_to_one() {
        let mut cache = GraceCache::new(4, 0, None);
        assert_eq!(cache.bucket_count(), 1);
        cache.insert(key(9), 0).unwrap();
        assert!(cache.is_duplicate(&key(9)));
    }
}
