//! Error types for the Vouch protocol
//!
//! No error in the flood subsystem is fatal. Parse failures, stale records
//! and unknown attestation targets are drops; capacity exhaustion means a
//! record is not remembered.

use thiserror::Error;

use crate::NodeId;

/// Core Vouch errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VouchError {
    // Wire errors
    #[error("Malformed record: {0}")]
    Malformed(String),

    #[error("Record too large: {len} bytes, limit {max}")]
    RecordTooLarge { len: usize, max: usize },

    // Cache and store errors
    #[error("Capacity exhausted: {0}")]
    CapacityExhausted(&'static str),

    #[error("Stale record: age {age} exceeds grace {grace}")]
    StaleRecord { age: u64, grace: u64 },

    #[error("Unknown attestation target: message {message_num} from {origin}")]
    UnknownAttestationTarget { origin: NodeId, message_num: u32 },

    #[error("Message counter exhausted")]
    CounterExhausted,

    // Host errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Transport error: {0}")]
    TransportError(String),
}

impl VouchError {
    /// True for the parse-error family
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            VouchError::Malformed(_) | VouchError::RecordTooLarge { .. }
        )
    }
}

/// Result type for Vouch operations
pub type VouchResult<T> = Result<T, VouchError>;
