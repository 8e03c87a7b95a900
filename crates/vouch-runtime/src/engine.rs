//! Flood engine - the per-node protocol state machine
//!
//! Every novel record is relayed to all neighbors. An origin message seen for
//! the first time is registered in the attestation store, relayed and then
//! vouched for with an attestation record authored by this node. Attestations flood back through the mesh until they
//! reach the origin node, which absorbs and counts them.
//!
//! The engine does no I/O: `on_receive` and `on_tick` return the datagrams to
//! broadcast, and time is read through a `Clock`.

use bytes::Bytes;
use tracing::{debug, info, trace, warn};

use vouch_cache::{CacheConfig, DuplicateCache};
use vouch_core::{CacheKey, KeyMode, MessageRecord, NodeId, Peer, VouchError, VouchResult};
use vouch_state::AttestationStore;
use vouch_time::Clock;

/// Origin messages between two statistics summaries
pub const STATS_LOG_EVERY: u64 = 10;

/// Flood engine configuration
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Duplicate cache sizing and policy
    pub cache: CacheConfig,
    /// Maximum accepted record age in ms; `None` disables the staleness check
    pub grace_period: Option<u64>,
    /// How deduplication keys are derived
    pub key_mode: KeyMode,
    /// Retention bound on the attestation store
    pub store_limit: Option<usize>,
    /// Distinct attestors at which an own message counts as corroborated
    pub quorum: Option<usize>,
}

/// Engine counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Datagrams handed to `on_receive`
    pub rx: u64,
    /// Origin messages created
    pub tx: u64,
    /// Ticks that produced nothing to send
    pub missed_tx: u64,
    /// Records rebroadcast unchanged
    pub relayed: u64,
    /// Attestations authored by this node
    pub attestations_sent: u64,
    /// Attestations absorbed for own messages
    pub attestations_received: u64,
    /// Own messages that reached the configured quorum
    pub corroborated: u64,
    pub duplicates: u64,
    pub stale: u64,
    pub malformed: u64,
    pub unknown_targets: u64,
    /// Keys that could not be remembered
    pub cache_skips: u64,
}

/// Per-node flood and attestation state machine
pub struct FloodEngine<K: Clock> {
    node_id: NodeId,
    config: EngineConfig,
    clock: K,
    cache: DuplicateCache,
    store: AttestationStore,
    /// Next origin message number; exceeds `u32::MAX` once exhausted
    next_message: u64,
    stats: EngineStats,
}

impl<K: Clock> FloodEngine<K> {
    /// Create an engine. Node id 0 is reserved to mean "no attestor".
    pub fn new(node_id: NodeId, config: EngineConfig, clock: K) -> VouchResult<Self> {
        if node_id.is_zero() {
            return Err(VouchError::InvalidConfig(
                "node id 0 is reserved for origin messages".to_string(),
            ));
        }

        let mut cache_config = config.cache.clone();
        if cache_config.grace.is_none() {
            cache_config.grace = config.grace_period;
        }

        Ok(FloodEngine {
            node_id,
            cache: DuplicateCache::new(&cache_config),
            store: AttestationStore::new().with_limit(config.store_limit),
            config,
            clock,
            next_message: 0,
            stats: EngineStats::default(),
        })
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Process one inbound datagram. Returns the datagrams to broadcast, in
    /// order; empty when the record is dropped or absorbed.
    pub fn on_receive(&mut self, datagram: Bytes, sender: Peer) -> Vec<Bytes> {
        self.stats.rx += 1;

        let record = match vouch_wire::parse(&datagram) {
            Ok(record) => record,
            Err(e) => {
                self.stats.malformed += 1;
                debug!(%sender, "dropping malformed record: {}", e);
                return Vec::new();
            }
        };

        let key = self.config.key_mode.key(&record, &datagram);
        if self.cache.is_duplicate(&key) {
            self.stats.duplicates += 1;
            debug!(%sender, %record, "dropping duplicate record");
            return Vec::new();
        }

        let now = self.clock.now();
        if let Err(e) = self.check_fresh(&record, now) {
            self.stats.stale += 1;
            debug!(%sender, %record, "dropping stale record: {}", e);
            return Vec::new();
        }

        self.remember(key, now);

        match (record.is_attestation(), record.origin_node == self.node_id) {
            (true, false) => {
                self.stats.relayed += 1;
                debug!(%sender, %record, "relaying attestation");
                vec![datagram]
            }
            (true, true) => {
                self.absorb(&record, sender);
                Vec::new()
            }
            (false, true) => {
                // Own message echoed back after its key left the cache
                self.stats.duplicates += 1;
                debug!(%sender, %record, "dropping echo of own message");
                Vec::new()
            }
            (false, false) => {
                self.register(record.origin_node, record.message_num);
                self.stats.relayed += 1;
                debug!(%sender, %record, "relaying message");

                let attestation = MessageRecord::attestation(
                    record.message_num,
                    record.origin_node,
                    self.node_id,
                    now,
                );
                let encoded = vouch_wire::encode(&attestation);
                self.remember(self.config.key_mode.key(&attestation, &encoded), now);
                self.stats.attestations_sent += 1;
                debug!(%attestation, "attesting");

                vec![datagram, encoded]
            }
        }
    }

    /// Create the next origin message. The returned datagram is already
    /// remembered and registered for attestation.
    pub fn on_tick(&mut self) -> VouchResult<Bytes> {
        let message_num = match u32::try_from(self.next_message) {
            Ok(n) => n,
            Err(_) => {
                self.stats.missed_tx += 1;
                warn!(node = %self.node_id, "message counter exhausted");
                return Err(VouchError::CounterExhausted);
            }
        };

        let now = self.clock.now();
        let expired = self.cache.expire(now);
        if expired > 0 {
            trace!(expired, "expired cache entries");
        }

        if self.stats.tx % STATS_LOG_EVERY == 0 {
            info!(
                "Tx/Rx/MissedTx: {}/{}/{}",
                self.stats.tx, self.stats.rx, self.stats.missed_tx
            );
        }

        let record = MessageRecord::origin(message_num, self.node_id, now);
        let datagram = vouch_wire::encode(&record);
        self.remember(self.config.key_mode.key(&record, &datagram), now);

        self.register(self.node_id, message_num);

        self.next_message += 1;
        self.stats.tx += 1;
        info!(message_num, "Tx: {}", record);

        Ok(datagram)
    }

    /// Count a tick whose message could not be sent
    pub fn record_missed_tx(&mut self) {
        self.stats.missed_tx += 1;
    }

    fn check_fresh(&self, record: &MessageRecord, now: u64) -> VouchResult<()> {
        if let (Some(grace), Some(sent)) = (self.config.grace_period, record.broadcast_time) {
            let age = now.saturating_sub(sent);
            if age > grace {
                return Err(VouchError::StaleRecord { age, grace });
            }
        }
        Ok(())
    }

    fn remember(&mut self, key: CacheKey, now: u64) {
        if let Err(e) = self.cache.insert(key, now) {
            self.stats.cache_skips += 1;
            warn!("duplicate cache skipped a key: {}", e);
        }
    }

    /// Track an origin message unless it is already known
    fn register(&mut self, origin: NodeId, message_num: u32) {
        if self.store.find(origin, message_num).is_some() {
            return;
        }
        if let Err(e) = self.store.create(origin, message_num) {
            warn!(%origin, message_num, "not tracking attestations: {}", e);
        }
    }

    fn absorb(&mut self, record: &MessageRecord, sender: Peer) {
        let count = match self
            .store
            .add_attestation(record.origin_node, record.message_num, record.attest_node)
        {
            Ok(count) => count,
            Err(e) => {
                self.stats.unknown_targets += 1;
                debug!(%sender, %record, "dropping attestation: {}", e);
                return;
            }
        };

        self.stats.attestations_received += 1;
        info!(
            message_num = record.message_num,
            attestor = %record.attest_node,
            count,
            "Attestation received"
        );

        let Some(quorum) = self.config.quorum else {
            return;
        };
        let Some(message) = self.store.find(record.origin_node, record.message_num) else {
            return;
        };
        let first_from_attestor = message
            .attestors
            .iter()
            .filter(|a| **a == record.attest_node)
            .count()
            == 1;
        if first_from_attestor && message.distinct_attestors() == quorum {
            self.stats.corroborated += 1;
            info!(
                message_num = record.message_num,
                quorum, "message corroborated"
            );
        }
    }

    /// Cache contents, for diagnostics
    pub fn dump_cache(&self) -> Vec<String> {
        self.cache.dump()
    }

    /// Attestation store contents, for diagnostics
    pub fn dump_store(&self) -> Vec<String> {
        self.store.dump()
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn cache(&self) -> &DuplicateCache {
        &self.cache
    }

    pub fn store(&self) -> &AttestationStore {
        &self.store
    }

    pub fn clock(&self) -> &K {
        &self.clock
    }
}
