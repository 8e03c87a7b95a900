//! End-to-end flood scenarios over the mesh simulator

use std::time::Duration;

use vouch_core::{NodeId, VouchResult};

use crate::mesh::MeshSimulator;

/// Simulation step
pub const STEP: Duration = Duration::from_millis(5);

/// Upper bound on steps for one flood to settle
pub const MAX_STEPS: usize = 10_000;

/// Outcome of flooding one origin message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FloodReport {
    pub origin: NodeId,
    pub message_num: u32,
    /// Nodes that relayed the message, origin included
    pub coverage: usize,
    /// Attestations absorbed by the origin
    pub attestations: u32,
    pub distinct_attestors: usize,
    /// Broadcasts caused by this flood
    pub transmissions: u64,
    pub steps: usize,
}

/// Originate one message at `origin` and run until the mesh is quiet
pub fn flood_once(sim: &mut MeshSimulator, origin: NodeId) -> VouchResult<FloodReport> {
    let before = sim.transmissions();
    let record = sim.originate(origin)?;
    let steps = sim.run_until_quiet(STEP, MAX_STEPS);
    let transmissions = sim.transmissions() - before;
    Ok(report(sim, origin, record.message_num, transmissions, steps))
}

/// Summarize a message after the fact
pub fn report(
    sim: &MeshSimulator,
    origin: NodeId,
    message_num: u32,
    transmissions: u64,
    steps: usize,
) -> FloodReport {
    let (attestations, distinct_attestors) = sim
        .node(origin)
        .and_then(|node| node.engine.store().find(origin, message_num))
        .map(|m| (m.attestation_count, m.distinct_attestors()))
        .unwrap_or((0, 0));

    FloodReport {
        origin,
        message_num,
        coverage: sim.coverage(origin, message_num),
        attestations,
        distinct_attestors,
        transmissions,
        steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vouch_cache::{CacheConfig, CachePolicy};
    use vouch_runtime::EngineConfig;

    use crate::chaos::ChaosConfig;

    fn roomy(policy: CachePolicy) -> EngineConfig {
        EngineConfig {
            cache: CacheConfig {
                capacity: 512,
                policy,
                grace: None,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_line_flood_is_exact() {
        let mut sim =
            MeshSimulator::line(5, ChaosConfig::perfect(), EngineConfig::default(), 1).unwrap();
        let report = flood_once(&mut sim, NodeId::new(1)).unwrap();

        assert_eq!(report.coverage, 5);
        assert_eq!(report.attestations, 4);
        assert_eq!(report.distinct_attestors, 4);
        // 1 origin send, 4 relays, 4 attestations, each relayed by 3 nodes
        assert_eq!(report.transmissions, 21);

        let mut attestors = sim
            .node(NodeId::new(1))
            .unwrap()
            .engine
            .store()
            .find(NodeId::new(1), 0)
            .unwrap()
            .attestors
            .clone();
        attestors.sort();
        let expected: Vec<NodeId> = (2..=5).map(NodeId::new).collect();
        assert_eq!(attestors, expected);
    }

    #[test]
    fn test_grid_flood_reaches_everyone() {
        let config = roomy(CachePolicy::RoundRobin);
        let mut sim = MeshSimulator::grid(4, 4, ChaosConfig::perfect(), config, 1).unwrap();
        let report = flood_once(&mut sim, NodeId::new(1)).unwrap();

        assert_eq!(report.coverage, 16);
        assert_eq!(report.attestations, 15);
        // Every node sends each of the 16 distinct records at most once,
        // and the origin never relays attestations of its own message
        assert_eq!(report.transmissions, 1 + 15 * 16);
    }

    #[test]
    fn test_concurrent_originators() {
        let config = roomy(CachePolicy::Hashed { buckets: 32 });
        let mut sim = MeshSimulator::grid(3, 3, ChaosConfig::perfect(), config, 2).unwrap();
        let ids = sim.node_ids();
        for id in &ids {
            sim.originate(*id).unwrap();
        }
        sim.run_until_quiet(STEP, MAX_STEPS);

        for id in &ids {
            let report = report(&sim, *id, 0, 0, 0);
            assert_eq!(report.coverage, 9, "message from {}", id);
            assert_eq!(report.attestations, 8, "message from {}", id);
        }
    }

    #[test]
    fn test_lossy_mesh_never_double_counts() {
        let config = roomy(CachePolicy::RoundRobin);
        let mut sim = MeshSimulator::grid(4, 4, ChaosConfig::lossy(), config, 7).unwrap();
        let n = sim.node_ids().len();

        let mut total_coverage = 0;
        for round in 0..10u16 {
            let origin = NodeId::new(round % 16 + 1);
            let report = flood_once(&mut sim, origin).unwrap();

            // Link duplicates never become repeated attestations
            assert_eq!(report.attestations as usize, report.distinct_attestors);
            assert!(report.attestations as usize <= n - 1);
            assert!(report.transmissions <= (n * n) as u64);
            total_coverage += report.coverage;
        }

        assert!(total_coverage >= 10 * n / 2);
        assert!(sim.link_stats().duplicated > 0);
    }

    #[test]
    fn test_hostile_mesh_stays_bounded() {
        let config = roomy(CachePolicy::RoundRobin);
        let mut sim = MeshSimulator::grid(3, 3, ChaosConfig::hostile(), config, 99).unwrap();
        let n = sim.node_ids().len();

        for round in 0..5u16 {
            let report = flood_once(&mut sim, NodeId::new(round + 1)).unwrap();
            assert!(report.steps < MAX_STEPS);
            assert!(report.transmissions <= (n * n) as u64);
            assert_eq!(report.attestations as usize, report.distinct_attestors);
        }

        let duplicates: u64 = sim.nodes().map(|node| node.engine.stats().duplicates).sum();
        assert!(duplicates > 0);
    }

    #[test]
    fn test_stale_records_stop_the_flood() {
        // Every hop takes 5ms; records older than 2ms are dropped
        let config = EngineConfig {
            grace_period: Some(2),
            ..Default::default()
        };
        let mut sim = MeshSimulator::line(3, ChaosConfig::perfect(), config, 1).unwrap();
        let report = flood_once(&mut sim, NodeId::new(1)).unwrap();

        assert_eq!(report.coverage, 1);
        assert_eq!(report.attestations, 0);
        assert_eq!(sim.node(NodeId::new(2)).unwrap().engine.stats().stale, 1);
    }

    #[test]
    fn test_grace_allows_timely_records() {
        let config = EngineConfig {
            grace_period: Some(1_000),
            ..Default::default()
        };
        let mut sim = MeshSimulator::line(4, ChaosConfig::perfect(), config, 1).unwrap();
        let report = flood_once(&mut sim, NodeId::new(1)).unwrap();

        assert_eq!(report.coverage, 4);
        assert_eq!(report.attestations, 3);
    }
}
