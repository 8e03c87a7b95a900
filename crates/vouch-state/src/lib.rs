//! Vouch State - Attestation aggregation
//!
//! Every origin message a node sees or sends is registered under
//! `(origin_node, message_num)`. The origin node accumulates attestations
//! from the nodes that relayed it. Records are append-only.

pub mod store;

pub use store::*;
