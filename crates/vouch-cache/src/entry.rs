//! Cache entries

use std::fmt;

use vouch_core::CacheKey;

/// A remembered record key
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: CacheKey,
    /// Local clock time of insertion (ms)
    pub inserted_at: u64,
}

impl CacheEntry {
    pub fn new(key: CacheKey, inserted_at: u64) -> Self {
        CacheEntry { key, inserted_at }
    }

    /// Age at `now`, zero if `now` precedes insertion
    #[inline]
    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.inserted_at)
    }
}

impl fmt::Display for CacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.key, self.inserted_at)
    }
}
