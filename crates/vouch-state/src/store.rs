//! Attestation store
//!
//! Per-message record of which nodes have vouched for an origin message.
//! Message numbers are only unique per origin, so records are looked up by
//! `(origin_node, message_num)`.

use std::collections::{HashSet, VecDeque};

use tracing::debug;
use vouch_core::{NodeId, VouchError, VouchResult};

/// An origin message and the attestations received for it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttestedMessage {
    pub message_num: u32,
    pub origin_node: NodeId,
    /// Number of attestations appended, repeats included
    pub attestation_count: u32,
    /// Attestors in arrival order
    pub attestors: Vec<NodeId>,
}

impl AttestedMessage {
    pub fn new(message_num: u32, origin_node: NodeId) -> Self {
        AttestedMessage {
            message_num,
            origin_node,
            attestation_count: 0,
            attestors: Vec::new(),
        }
    }

    /// Number of different nodes among the attestors
    pub fn distinct_attestors(&self) -> usize {
        self.attestors.iter().collect::<HashSet<_>>().len()
    }

    /// True once `quorum` different nodes have attested
    pub fn is_corroborated(&self, quorum: usize) -> bool {
        self.distinct_attestors() >= quorum
    }
}

/// Append-only store of attested messages, in creation order
#[derive(Debug, Default)]
pub struct AttestationStore {
    messages: VecDeque<AttestedMessage>,
    /// Optional retention bound; oldest records are dropped beyond it
    limit: Option<usize>,
}

impl AttestationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the number of retained messages
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Find the first record for an origin's message number
    pub fn find(&self, origin: NodeId, message_num: u32) -> Option<&AttestedMessage> {
        self.messages
            .iter()
            .find(|m| m.origin_node == origin && m.message_num == message_num)
    }

    /// Register a message with no attestations.
    ///
    /// Does not check for an existing record: calling twice for the same
    /// message creates two records. Guard with `find`.
    pub fn create(&mut self, origin: NodeId, message_num: u32) -> VouchResult<()> {
        if let Some(limit) = self.limit {
            if limit == 0 {
                return Err(VouchError::CapacityExhausted("attestation store limit is zero"));
            }
            while self.messages.len() >= limit {
                if let Some(dropped) = self.messages.pop_front() {
                    debug!(
                        origin = %dropped.origin_node,
                        message_num = dropped.message_num,
                        attestations = dropped.attestation_count,
                        "dropping oldest attested message"
                    );
                }
            }
        }

        self.messages
            .try_reserve(1)
            .map_err(|_| VouchError::CapacityExhausted("attestation store allocation"))?;
        self.messages
            .push_back(AttestedMessage::new(message_num, origin));
        Ok(())
    }

    /// Append an attestation to a message. Repeated attestors are counted
    /// again. Returns the new attestation count.
    pub fn add_attestation(
        &mut self,
        origin: NodeId,
        message_num: u32,
        attestor: NodeId,
    ) -> VouchResult<u32> {
        let message = self
            .messages
            .iter_mut()
            .find(|m| m.origin_node == origin && m.message_num == message_num)
            .ok_or(VouchError::UnknownAttestationTarget {
                origin,
                message_num,
            })?;

        message
            .attestors
            .try_reserve(1)
            .map_err(|_| VouchError::CapacityExhausted("attestor allocation"))?;
        message.attestors.push(attestor);
        message.attestation_count = message.attestation_count.saturating_add(1);
        Ok(message.attestation_count)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttestedMessage> {
        self.messages.iter()
    }

    /// Human-readable listing for diagnostics
    pub fn dump(&self) -> Vec<String> {
        if self.messages.is_empty() {
            return vec!["Message store is empty".to_string()];
        }

        let mut lines = Vec::new();
        for message in &self.messages {
            lines.push(format!(
                "Message={}, Origin={}, Attestations={}",
                message.message_num, message.origin_node, message.attestation_count
            ));
            for (i, attestor) in message.attestors.iter().enumerate() {
                lines.push(format!("  Attestation {}: attest_node={}", i, attestor));
            }
        }
        lines
    }
}
