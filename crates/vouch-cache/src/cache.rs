//! Policy selection
//!
//! One `DuplicateCache` is owned by each flood engine. The policy is fixed
//! for the life of the cache.

use vouch_core::{CacheKey, VouchResult};

use crate::{CacheEntry, GraceCache, RingCache};

/// Eviction policy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Overwrite slots round-robin; no time decay
    #[default]
    RoundRobin,
    /// Hashed buckets with grace-period sweep and rotating eviction
    Hashed { buckets: usize },
}

/// Duplicate cache configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum live entries (`C`)
    pub capacity: usize,
    /// Eviction policy
    pub policy: CachePolicy,
    /// Entry lifetime in ms for the hashed policy
    pub grace: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            capacity: 16,
            policy: CachePolicy::RoundRobin,
            grace: None,
        }
    }
}

/// Bounded memory of processed record keys
#[derive(Clone, Debug)]
pub enum DuplicateCache {
    RoundRobin(RingCache),
    Hashed(GraceCache),
}

impl DuplicateCache {
    pub fn new(config: &CacheConfig) -> Self {
        match config.policy {
            CachePolicy::RoundRobin => DuplicateCache::RoundRobin(RingCache::new(config.capacity)),
            CachePolicy::Hashed { buckets } => {
                DuplicateCache::Hashed(GraceCache::new(config.capacity, buckets, config.grace))
            }
        }
    }

    /// True iff an entry with exactly this key is live
    pub fn is_duplicate(&self, key: &CacheKey) -> bool {
        match self {
            DuplicateCache::RoundRobin(cache) => cache.is_duplicate(key),
            DuplicateCache::Hashed(cache) => cache.is_duplicate(key),
        }
    }

    /// Remember `key` as seen at `now`, evicting if full.
    /// `CapacityExhausted` means the key was not remembered.
    pub fn insert(&mut self, key: CacheKey, now: u64) -> VouchResult<()> {
        match self {
            DuplicateCache::RoundRobin(cache) => cache.insert(key, now).map(|_| ()),
            DuplicateCache::Hashed(cache) => cache.insert(key, now).map(|_| ()),
        }
    }

    /// Sweep expired entries. No-op for round-robin.
    pub fn expire(&mut self, now: u64) -> usize {
        match self {
            DuplicateCache::RoundRobin(_) => 0,
            DuplicateCache::Hashed(cache) => cache.expire(now),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            DuplicateCache::RoundRobin(cache) => cache.len(),
            DuplicateCache::Hashed(cache) => cache.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        match self {
            DuplicateCache::RoundRobin(cache) => cache.capacity(),
            DuplicateCache::Hashed(cache) => cache.capacity(),
        }
    }

    pub fn entries(&self) -> Box<dyn Iterator<Item = &CacheEntry> + '_> {
        match self {
            DuplicateCache::RoundRobin(cache) => Box::new(cache.iter()),
            DuplicateCache::Hashed(cache) => Box::new(cache.iter()),
        }
    }

    /// Human-readable listing for diagnostics
    pub fn dump(&self) -> Vec<String> {
        if self.is_empty() {
            return vec!["Cache is empty".to_string()];
        }
        self.entries()
            .enumerate()
            .map(|(i, entry)| format!("Entry {}: {}", i, entry))
            .collect()
    }
}
