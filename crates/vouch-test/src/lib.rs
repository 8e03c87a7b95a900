//! Vouch Test Harness - Mesh simulation for the flood protocol
//!
//! This crate provides:
//! - Lossy, duplicating, reordering links (`chaos`)
//! - A deterministic multi-node mesh of real flood engines (`mesh`)
//! - End-to-end flood scenarios (`scenarios`)

pub mod chaos;
pub mod mesh;
pub mod scenarios;

pub use chaos::*;
pub use mesh::*;
pub use scenarios::*;
