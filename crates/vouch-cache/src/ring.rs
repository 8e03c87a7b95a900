//! Round-robin slot cache
//!
//! Insertion writes the next slot modulo capacity, overwriting whatever was
//! there regardless of age. Lookup is a linear scan over occupied slots.

use vouch_core::{CacheKey, VouchError, VouchResult};

use crate::CacheEntry;

/// Fixed-size slot array with FIFO-by-slot replacement
#[derive(Clone, Debug)]
pub struct RingCache {
    /// Occupied slots; grows up to `capacity`, then is overwritten in place
    slots: Vec<CacheEntry>,
    /// Next slot to write
    next: usize,
    capacity: usize,
}

impl RingCache {
    pub fn new(capacity: usize) -> Self {
        RingCache {
            slots: Vec::new(),
            next: 0,
            capacity,
        }
    }

    /// Check if a key is remembered
    pub fn is_duplicate(&self, key: &CacheKey) -> bool {
        self.slots.iter().any(|entry| entry.key == *key)
    }

    /// Remember a key, overwriting the oldest slot when full.
    /// Returns the overwritten entry, if any.
    pub fn insert(&mut self, key: CacheKey, now: u64) -> VouchResult<Option<CacheEntry>> {
        if self.capacity == 0 {
            return Err(VouchError::CapacityExhausted("ring cache has no slots"));
        }

        let entry = CacheEntry::new(key, now);
        let evicted = if self.slots.len() < self.capacity {
            self.slots
                .try_reserve(1)
                .map_err(|_| VouchError::CapacityExhausted("ring cache slot allocation"))?;
            self.slots.push(entry);
            None
        } else {
            Some(std::mem::replace(&mut self.slots[self.next], entry))
        };

        self.next = (self.next + 1) % self.capacity;
        Ok(evicted)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries in slot order
    pub fn iter(&self) -> impl Iterator<Item = &CacheEntry> {
        self.slots.iter()
    }
}
