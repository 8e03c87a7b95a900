//! Vouch Transport Layer - UDP neighbor broadcast
//!
//! This crate provides:
//! - The `Broadcast` primitive the flood engine's host uses to reach neighbors
//! - A UDP implementation over a configured neighbor set
//! - A background receive loop feeding a channel

pub mod udp;

pub use udp::*;
