//! Vouch Runtime - Flood engine and node orchestration
//!
//! - `engine`: the per-node protocol state machine (`FloodEngine`)
//! - `node`: single-owner event loop, receiver forwarding and jittered ticker
//! - `config`: JSON node configuration
//! - `telemetry`: tracing subscriber setup

pub mod config;
pub mod engine;
pub mod node;
pub mod telemetry;

pub use config::*;
pub use engine::*;
pub use node::*;
pub use telemetry::*;
