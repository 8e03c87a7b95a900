//! Vouch Wire Protocol - Text record encoding
//!
//! Record format:
//! `<message_num>|<origin_node>|<attest_node>[|<broadcast_time>]`
//!
//! Parsing is lenient: anything that does not parse is dropped by the
//! caller, never treated as fatal.

pub mod record;

pub use record::*;
