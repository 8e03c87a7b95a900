//! Vouch Time - Clocks and tick scheduling
//!
//! The flood engine reads time only through the `Clock` trait:
//! - `SystemClock`: Unix-epoch milliseconds, shared across nodes
//! - `ManualClock`: shared, explicitly advanced clock for simulation
//!
//! `TickSchedule` produces the jittered delays between origin messages.

pub mod clock;
pub mod schedule;

pub use clock::*;
pub use schedule::*;
