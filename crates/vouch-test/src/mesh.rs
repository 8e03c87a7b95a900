//! Multi-node flood simulation
//!
//! Every node runs a real `FloodEngine` against one shared `ManualClock`.
//! Broadcasts fan out over per-neighbor `ChaosLink`s, and delivered datagrams
//! are fed back into the receiving engine, whose output is broadcast in turn.
//! Iteration order is fixed, so a given seed always replays the same run.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use bytes::Bytes;
use tracing::trace;

use vouch_core::{MessageRecord, NodeId, Peer, VouchError, VouchResult};
use vouch_runtime::{EngineConfig, FloodEngine};
use vouch_time::ManualClock;

use crate::chaos::{ChaosConfig, ChaosLink, ChaosStats};

/// A simulated node
pub struct MeshNode {
    pub engine: FloodEngine<ManualClock>,
    neighbors: BTreeSet<NodeId>,
    /// Origin messages this node has relayed, as `(origin, message_num)`
    seen: BTreeSet<(NodeId, u32)>,
    /// Datagrams this node has broadcast
    transmissions: u64,
}

impl MeshNode {
    pub fn neighbors(&self) -> impl Iterator<Item = &NodeId> {
        self.neighbors.iter()
    }

    pub fn has_seen(&self, origin: NodeId, message_num: u32) -> bool {
        self.seen.contains(&(origin, message_num))
    }

    pub fn transmissions(&self) -> u64 {
        self.transmissions
    }
}

/// Mesh of flood engines connected by lossy links
pub struct MeshSimulator {
    nodes: BTreeMap<NodeId, MeshNode>,
    links: BTreeMap<(NodeId, NodeId), ChaosLink>,
    chaos: ChaosConfig,
    engine_config: EngineConfig,
    clock: ManualClock,
    seed: u64,
}

impl MeshSimulator {
    pub fn new(chaos: ChaosConfig, engine_config: EngineConfig, seed: u64) -> Self {
        MeshSimulator {
            nodes: BTreeMap::new(),
            links: BTreeMap::new(),
            chaos,
            engine_config,
            clock: ManualClock::new(),
            seed,
        }
    }

    /// Nodes `1..=n` in a chain
    pub fn line(
        n: u16,
        chaos: ChaosConfig,
        engine_config: EngineConfig,
        seed: u64,
    ) -> VouchResult<Self> {
        let mut sim = Self::new(chaos, engine_config, seed);
        for id in 1..=n {
            sim.add_node(NodeId::new(id))?;
        }
        for id in 1..n {
            sim.connect(NodeId::new(id), NodeId::new(id + 1))?;
        }
        Ok(sim)
    }

    /// `width * height` nodes, numbered row by row from 1, each linked to
    /// its horizontal and vertical neighbors
    pub fn grid(
        width: u16,
        height: u16,
        chaos: ChaosConfig,
        engine_config: EngineConfig,
        seed: u64,
    ) -> VouchResult<Self> {
        let mut sim = Self::new(chaos, engine_config, seed);
        let id = |x: u16, y: u16| NodeId::new(y * width + x + 1);
        for y in 0..height {
            for x in 0..width {
                sim.add_node(id(x, y))?;
            }
        }
        for y in 0..height {
            for x in 0..width {
                if x + 1 < width {
                    sim.connect(id(x, y), id(x + 1, y))?;
                }
                if y + 1 < height {
                    sim.connect(id(x, y), id(x, y + 1))?;
                }
            }
        }
        Ok(sim)
    }

    pub fn add_node(&mut self, id: NodeId) -> VouchResult<()> {
        let engine = FloodEngine::new(id, self.engine_config.clone(), self.clock.clone())?;
        self.nodes.insert(
            id,
            MeshNode {
                engine,
                neighbors: BTreeSet::new(),
                seen: BTreeSet::new(),
                transmissions: 0,
            },
        );
        Ok(())
    }

    /// Link two nodes in both directions
    pub fn connect(&mut self, a: NodeId, b: NodeId) -> VouchResult<()> {
        if a == b || !self.nodes.contains_key(&a) || !self.nodes.contains_key(&b) {
            return Err(VouchError::InvalidConfig(format!(
                "cannot link {} and {}",
                a, b
            )));
        }

        for (from, to) in [(a, b), (b, a)] {
            if let Some(node) = self.nodes.get_mut(&from) {
                node.neighbors.insert(to);
            }
            let seed = self.seed.wrapping_add(self.links.len() as u64);
            self.links
                .entry((from, to))
                .or_insert_with(|| ChaosLink::new(self.chaos.clone(), seed));
        }
        Ok(())
    }

    /// Have a node originate its next message
    pub fn originate(&mut self, id: NodeId) -> VouchResult<MessageRecord> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| VouchError::InvalidConfig(format!("no node {}", id)))?;
        let datagram = node.engine.on_tick()?;
        let record = vouch_wire::parse(&datagram)?;
        node.seen.insert((record.origin_node, record.message_num));

        self.broadcast(id, datagram);
        Ok(record)
    }

    fn broadcast(&mut self, from: NodeId, datagram: Bytes) {
        let Some(node) = self.nodes.get_mut(&from) else {
            return;
        };
        node.transmissions += 1;
        for to in &node.neighbors {
            if let Some(link) = self.links.get_mut(&(from, *to)) {
                link.send(datagram.clone());
            }
        }
    }

    /// Advance time by `dt`, deliver what is due and broadcast whatever the
    /// receivers emit. Returns the number of datagrams delivered.
    pub fn step(&mut self, dt: Duration) -> usize {
        self.clock.advance(dt);

        let mut arrivals = Vec::new();
        for ((from, to), link) in self.links.iter_mut() {
            for datagram in link.tick(dt) {
                arrivals.push((*from, *to, datagram));
            }
        }

        let delivered = arrivals.len();
        for (from, to, datagram) in arrivals {
            let Some(node) = self.nodes.get_mut(&to) else {
                continue;
            };
            let outbound = node.engine.on_receive(datagram, Peer::Node(from));
            for out in &outbound {
                if let Ok(record) = vouch_wire::parse(out) {
                    if !record.is_attestation() {
                        node.seen.insert((record.origin_node, record.message_num));
                    }
                }
            }
            trace!(%from, %to, outbound = outbound.len(), "delivered");
            for out in outbound {
                self.broadcast(to, out);
            }
        }
        delivered
    }

    /// Step until nothing is in flight or `max_steps` is reached.
    /// Returns the number of steps taken.
    pub fn run_until_quiet(&mut self, dt: Duration, max_steps: usize) -> usize {
        for steps in 0..max_steps {
            if self.in_flight() == 0 {
                return steps;
            }
            self.step(dt);
        }
        max_steps
    }

    pub fn in_flight(&self) -> usize {
        self.links.values().map(|link| link.in_flight()).sum()
    }

    pub fn node(&self, id: NodeId) -> Option<&MeshNode> {
        self.nodes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &MeshNode> {
        self.nodes.values()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    /// Nodes that have relayed `origin`'s message `message_num`, plus the origin
    pub fn coverage(&self, origin: NodeId, message_num: u32) -> usize {
        self.nodes
            .values()
            .filter(|node| node.has_seen(origin, message_num))
            .count()
    }

    /// Total broadcasts across all nodes
    pub fn transmissions(&self) -> u64 {
        self.nodes.values().map(|node| node.transmissions).sum()
    }

    /// Link counters summed over every link
    pub fn link_stats(&self) -> ChaosStats {
        self.links
            .values()
            .fold(ChaosStats::default(), |mut total, link| {
                let stats = link.stats();
                total.sent += stats.sent;
                total.delivered += stats.delivered;
                total.lost += stats.lost;
                total.reordered += stats.reordered;
                total.duplicated += stats.duplicated;
                total.total_latency_ms += stats.total_latency_ms;
                total.max_latency_ms = total.max_latency_ms.max(stats.max_latency_ms);
                total
            })
    }

    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEP: Duration = Duration::from_millis(5);

    #[test]
    fn test_line_topology() {
        let sim =
            MeshSimulator::line(4, ChaosConfig::perfect(), EngineConfig::default(), 1).unwrap();
        let neighbors = |id: u16| -> Vec<u16> {
            sim.node(NodeId::new(id))
                .unwrap()
                .neighbors()
                .map(|n| n.0)
                .collect()
        };
        assert_eq!(neighbors(1), vec![2]);
        assert_eq!(neighbors(2), vec![1, 3]);
        assert_eq!(neighbors(4), vec![3]);
    }

    #[test]
    fn test_grid_topology() {
        let sim =
            MeshSimulator::grid(3, 3, ChaosConfig::perfect(), EngineConfig::default(), 1).unwrap();
        assert_eq!(sim.node_ids().len(), 9);
        // Centre node
        assert_eq!(sim.node(NodeId::new(5)).unwrap().neighbors().count(), 4);
        // Corner node
        assert_eq!(sim.node(NodeId::new(1)).unwrap().neighbors().count(), 2);
    }

    #[test]
    fn test_connect_rejects_unknown_nodes() {
        let mut sim = MeshSimulator::new(ChaosConfig::perfect(), EngineConfig::default(), 1);
        sim.add_node(NodeId::new(1)).unwrap();
        assert!(sim.connect(NodeId::new(1), NodeId::new(2)).is_err());
        assert!(sim.connect(NodeId::new(1), NodeId::new(1)).is_err());
    }

    #[test]
    fn test_single_hop_exchange() {
        let mut sim =
            MeshSimulator::line(2, ChaosConfig::perfect(), EngineConfig::default(), 1).unwrap();
        let record = sim.originate(NodeId::new(1)).unwrap();
        sim.run_until_quiet(STEP, 100);

        // Node 2 relays the message and attests; node 1 absorbs the attestation
        let origin = sim.node(NodeId::new(1)).unwrap();
        let message = origin
            .engine
            .store()
            .find(record.origin_node, record.message_num)
            .unwrap();
        assert_eq!(message.attestors, vec![NodeId::new(2)]);
        assert!(sim.node(NodeId::new(2)).unwrap().has_seen(NodeId::new(1), 0));
        assert_eq!(sim.transmissions(), 3);
    }
}
