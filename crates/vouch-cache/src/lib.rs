//! Vouch Cache - Duplicate suppression for flooded records
//!
//! A fixed-capacity memory of recently processed `CacheKey`s. Two eviction
//! policies are provided:
//! - `RingCache`: slot array overwritten round-robin, linear lookup
//! - `GraceCache`: hashed buckets, entries expire after a grace period,
//!   capacity pressure evicts by rotating through buckets
//!
//! `DuplicateCache` selects one of them from configuration.

pub mod entry;
pub mod ring;
pub mod grace;
pub mod cache;

pub use entry::*;
pub use ring::*;
pub use grace::*;
pub use cache::*;
