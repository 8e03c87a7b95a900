//! Vouch Core - Fundamental types and primitives
//!
//! This crate defines the core types shared by every Vouch component:
//! - Identifiers (NodeId, Peer)
//! - Wire-level message records and their deduplication keys
//! - The error taxonomy

pub mod id;
pub mod record;
pub mod error;

pub use id::*;
pub use record::*;
pub use error::*;
