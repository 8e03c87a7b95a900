//! Message records and deduplication keys
//!
//! A `MessageRecord` is the wire-level unit of gossip. It is ephemeral: it
//! exists for the duration of processing one inbound or outbound event.
//! A `CacheKey` is what the duplicate cache remembers about it.

use std::fmt;

use bytes::Bytes;

use crate::NodeId;

/// Wire-level gossip record
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct MessageRecord {
    /// Per-origin message counter
    pub message_num: u32,
    /// Node that authored the origin message
    pub origin_node: NodeId,
    /// Attesting node, `NodeId::ZERO` for an origin message
    pub attest_node: NodeId,
    /// Broadcast time in the sender's clock units, if carried
    pub broadcast_time: Option<u64>,
}

impl MessageRecord {
    /// A fresh origin message
    pub fn origin(message_num: u32, origin_node: NodeId, broadcast_time: u64) -> Self {
        MessageRecord {
            message_num,
            origin_node,
            attest_node: NodeId::ZERO,
            broadcast_time: Some(broadcast_time),
        }
    }

    /// An attestation of `origin_node`'s message authored by `attestor`
    pub fn attestation(
        message_num: u32,
        origin_node: NodeId,
        attestor: NodeId,
        broadcast_time: u64,
    ) -> Self {
        MessageRecord {
            message_num,
            origin_node,
            attest_node: attestor,
            broadcast_time: Some(broadcast_time),
        }
    }

    #[inline]
    pub fn is_attestation(&self) -> bool {
        !self.attest_node.is_zero()
    }

    /// Field-based deduplication key
    #[inline]
    pub fn key(&self) -> CacheKey {
        CacheKey::Record {
            message_num: self.message_num,
            origin_node: self.origin_node,
            attest_node: self.attest_node,
        }
    }
}

impl fmt::Display for MessageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}",
            self.message_num, self.origin_node, self.attest_node
        )?;
        if let Some(t) = self.broadcast_time {
            write!(f, "|{}", t)?;
        }
        Ok(())
    }
}

/// Identity of a previously processed record
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum CacheKey {
    /// `(message_num, origin_node, attest_node)` tuple
    Record {
        message_num: u32,
        origin_node: NodeId,
        attest_node: NodeId,
    },
    /// Raw payload bytes (content-hash variant)
    Payload(Bytes),
}

impl CacheKey {
    /// Bucket index in a table of `table_size` buckets.
    ///
    /// Record keys use `((message_num * 31) + origin) * 31 + attest`,
    /// payload keys a 31-polynomial over the bytes. Both wrap at 32 bits.
    pub fn bucket(&self, table_size: usize) -> usize {
        debug_assert!(table_size > 0);
        let hash = match self {
            CacheKey::Record {
                message_num,
                origin_node,
                attest_node,
            } => message_num
                .wrapping_mul(31)
                .wrapping_add(origin_node.0 as u32)
                .wrapping_mul(31)
                .wrapping_add(attest_node.0 as u32),
            CacheKey::Payload(bytes) => bytes
                .iter()
                .fold(0u32, |h, b| h.wrapping_mul(31).wrapping_add(*b as u32)),
        };
        hash as usize % table_size
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Record {
                message_num,
                origin_node,
                attest_node,
            } => write!(f, "{}|{}|{}", message_num, origin_node, attest_node),
            CacheKey::Payload(bytes) => write!(f, "'{}'", String::from_utf8_lossy(bytes)),
        }
    }
}

/// Which key the flood engine derives for deduplication
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum KeyMode {
    /// Key by `(message_num, origin_node, attest_node)`
    #[default]
    Fields,
    /// Key by the exact bytes seen on the wire
    Payload,
}

impl KeyMode {
    /// Derive the key for a record whose wire form is `raw`
    pub fn key(self, record: &MessageRecord, raw: &[u8]) -> CacheKey {
        match self {
            KeyMode::Fields => record.key(),
            KeyMode::Payload => CacheKey::Payload(Bytes::copy_from_slice(raw)),
        }
    }
}
