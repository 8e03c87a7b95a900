//! Lossy link model
//!
//! One `ChaosLink` per directed neighbor pair. Datagrams handed to a link
//! are delayed, dropped (randomly or in bursts), duplicated or reordered,
//! the way a shared radio medium misbehaves.

use std::time::Duration;

use bytes::Bytes;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Extra per-datagram delay
#[derive(Clone, Debug, PartialEq)]
pub enum JitterDistribution {
    /// No extra delay
    None,
    Uniform { min_ms: u32, max_ms: u32 },
    /// Heavy tail, capped at one second
    Pareto { scale_ms: f64, shape: f64 },
}

impl JitterDistribution {
    pub fn sample(&self, rng: &mut StdRng) -> Duration {
        match self {
            JitterDistribution::None => Duration::ZERO,
            JitterDistribution::Uniform { min_ms, max_ms } => {
                if max_ms <= min_ms {
                    return Duration::from_millis(*min_ms as u64);
                }
                let dist = Uniform::new(*min_ms, *max_ms);
                Duration::from_millis(dist.sample(rng) as u64)
            }
            JitterDistribution::Pareto { scale_ms, shape } => {
                let u: f64 = rng.gen_range(f64::EPSILON..1.0);
                let value = scale_ms / u.powf(1.0 / shape);
                Duration::from_millis(value.min(1000.0) as u64)
            }
        }
    }
}

/// Link conditions
#[derive(Clone, Debug, PartialEq)]
pub struct ChaosConfig {
    pub base_latency: Duration,
    pub jitter: JitterDistribution,
    /// Independent loss probability (0.0 - 1.0)
    pub loss_rate: f64,
    /// Probability that a datagram starts a loss burst
    pub burst_loss_prob: f64,
    /// Burst length range, inclusive
    pub burst_length: (u32, u32),
    /// Probability a datagram overtakes some of those queued before it
    pub reorder_prob: f64,
    /// Maximum number of queued datagrams overtaken
    pub reorder_depth: u32,
    pub duplicate_prob: f64,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self::lossy()
    }
}

impl ChaosConfig {
    /// Fixed latency, nothing lost, duplicated or reordered
    pub fn perfect() -> Self {
        ChaosConfig {
            base_latency: Duration::from_millis(5),
            jitter: JitterDistribution::None,
            loss_rate: 0.0,
            burst_loss_prob: 0.0,
            burst_length: (0, 0),
            reorder_prob: 0.0,
            reorder_depth: 0,
            duplicate_prob: 0.0,
        }
    }

    /// A typical low-power radio neighborhood
    pub fn lossy() -> Self {
        ChaosConfig {
            base_latency: Duration::from_millis(10),
            jitter: JitterDistribution::Uniform {
                min_ms: 0,
                max_ms: 40,
            },
            loss_rate: 0.05,
            burst_loss_prob: 0.02,
            burst_length: (2, 4),
            reorder_prob: 0.1,
            reorder_depth: 3,
            duplicate_prob: 0.05,
        }
    }

    /// Heavy loss, long bursts, frequent duplicates
    pub fn hostile() -> Self {
        ChaosConfig {
            base_latency: Duration::from_millis(30),
            jitter: JitterDistribution::Pareto {
                scale_ms: 20.0,
                shape: 1.5,
            },
            loss_rate: 0.2,
            burst_loss_prob: 0.05,
            burst_length: (3, 8),
            reorder_prob: 0.25,
            reorder_depth: 6,
            duplicate_prob: 0.15,
        }
    }
}

/// Datagram queued on a link
#[derive(Clone, Debug)]
struct InFlight {
    data: Bytes,
    deliver_at: Duration,
    sent_at: Duration,
}

/// Per-link counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChaosStats {
    pub sent: u64,
    pub delivered: u64,
    pub lost: u64,
    pub reordered: u64,
    pub duplicated: u64,
    pub total_latency_ms: u64,
    pub max_latency_ms: u64,
}

impl ChaosStats {
    pub fn loss_rate(&self) -> f64 {
        if self.sent == 0 {
            0.0
        } else {
            self.lost as f64 / self.sent as f64
        }
    }

    pub fn avg_latency_ms(&self) -> f64 {
        if self.delivered == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.delivered as f64
        }
    }
}

/// A directed lossy link
pub struct ChaosLink {
    config: ChaosConfig,
    rng: StdRng,
    queue: Vec<InFlight>,
    now: Duration,
    burst_remaining: u32,
    stats: ChaosStats,
}

impl ChaosLink {
    /// Seeded so simulations are reproducible
    pub fn new(config: ChaosConfig, seed: u64) -> Self {
        ChaosLink {
            config,
            rng: StdRng::seed_from_u64(seed),
            queue: Vec::new(),
            now: Duration::ZERO,
            burst_remaining: 0,
            stats: ChaosStats::default(),
        }
    }

    /// Hand a datagram to the link
    pub fn send(&mut self, data: Bytes) {
        self.stats.sent += 1;

        if self.should_drop() {
            self.stats.lost += 1;
            return;
        }

        let jitter = self.config.jitter.sample(&mut self.rng);
        let deliver_at = self.now + self.config.base_latency + jitter;
        let item = InFlight {
            data: data.clone(),
            deliver_at,
            sent_at: self.now,
        };

        if !self.queue.is_empty() && self.rng.gen::<f64>() < self.config.reorder_prob {
            let depth = (self.config.reorder_depth as usize).min(self.queue.len());
            let overtaken = self.rng.gen_range(0..=depth);
            self.queue.insert(self.queue.len() - overtaken, item);
            self.stats.reordered += 1;
        } else {
            self.queue.push(item);
        }

        if self.rng.gen::<f64>() < self.config.duplicate_prob {
            let extra = self.config.jitter.sample(&mut self.rng);
            self.queue.push(InFlight {
                data,
                deliver_at: deliver_at + extra,
                sent_at: self.now,
            });
            self.stats.duplicated += 1;
        }
    }

    fn should_drop(&mut self) -> bool {
        if self.burst_remaining > 0 {
            self.burst_remaining -= 1;
            return true;
        }

        let burst_prob = self.config.burst_loss_prob;
        if burst_prob > 0.0 && self.rng.gen::<f64>() < burst_prob {
            let (min, max) = self.config.burst_length;
            // This datagram is the first of the burst
            self.burst_remaining = self.rng.gen_range(min..=max.max(min)).saturating_sub(1);
            return true;
        }

        self.config.loss_rate > 0.0 && self.rng.gen::<f64>() < self.config.loss_rate
    }

    /// Advance time and take every datagram now due, in queue order
    pub fn tick(&mut self, dt: Duration) -> Vec<Bytes> {
        self.now += dt;

        let now = self.now;
        let mut delivered = Vec::new();
        let mut pending = Vec::with_capacity(self.queue.len());
        for item in self.queue.drain(..) {
            if item.deliver_at <= now {
                let latency = (item.deliver_at - item.sent_at).as_millis() as u64;
                self.stats.delivered += 1;
                self.stats.total_latency_ms += latency;
                self.stats.max_latency_ms = self.stats.max_latency_ms.max(latency);
                delivered.push(item.data);
            } else {
                pending.push(item);
            }
        }
        self.queue = pending;

        delivered
    }

    /// Datagrams still queued
    pub fn in_flight(&self) -> usize {
        self.queue.len()
    }

    pub fn stats(&self) -> &ChaosStats {
        &self.stats
    }

    pub fn now(&self) -> Duration {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn drain(link: &mut ChaosLink) -> Vec<Bytes> {
        let mut out = Vec::new();
        for _ in 0..500 {
            out.extend(link.tick(Duration::from_millis(10)));
        }
        out
    }

    #[test]
    fn test_perfect_link_preserves_order() {
        let mut link = ChaosLink::new(ChaosConfig::perfect(), 1);
        for i in 0..50u8 {
            link.send(Bytes::from(vec![i]));
        }
        assert!(link.tick(Duration::from_millis(4)).is_empty());

        let out = drain(&mut link);
        let expected: Vec<Bytes> = (0..50u8).map(|i| Bytes::from(vec![i])).collect();
        assert_eq!(out, expected);
        assert_eq!(link.stats().lost, 0);
        assert_eq!(link.in_flight(), 0);
    }

    #[test]
    fn test_hostile_link_misbehaves() {
        let mut link = ChaosLink::new(ChaosConfig::hostile(), 12345);
        for i in 0..1000u32 {
            link.send(Bytes::from(i.to_be_bytes().to_vec()));
        }
        let out = drain(&mut link);

        let stats = link.stats();
        assert!(stats.loss_rate() > 0.1);
        assert!(stats.duplicated > 0);
        assert!(stats.reordered > 0);
        assert_eq!(out.len() as u64, stats.delivered);
        assert_eq!(stats.delivered, stats.sent - stats.lost + stats.duplicated);
    }

    #[test]
    fn test_burst_loss() {
        let config = ChaosConfig {
            burst_loss_prob: 1.0,
            burst_length: (3, 3),
            ..ChaosConfig::perfect()
        };
        let mut link = ChaosLink::new(config, 7);
        for _ in 0..9 {
            link.send(Bytes::from_static(b"x"));
        }
        assert_eq!(link.stats().lost, 9);
    }

    #[test]
    fn test_pareto_heavy_tail() {
        let mut rng = StdRng::seed_from_u64(42);
        let pareto = JitterDistribution::Pareto {
            scale_ms: 20.0,
            shape: 1.5,
        };
        let samples: Vec<u128> = (0..1000)
            .map(|_| pareto.sample(&mut rng).as_millis())
            .collect();

        let avg = samples.iter().sum::<u128>() / 1000;
        let max = samples.iter().copied().max().unwrap();
        assert!(samples.iter().all(|s| *s >= 20 && *s <= 1000));
        assert!(max > avg * 2);
    }

    proptest! {
        #[test]
        fn prop_link_conserves_datagrams(seed in any::<u64>(), count in 0u32..200) {
            let mut link = ChaosLink::new(ChaosConfig::hostile(), seed);
            for i in 0..count {
                link.send(Bytes::from(i.to_be_bytes().to_vec()));
            }
            let out = drain(&mut link);

            let stats = link.stats();
            prop_assert_eq!(link.in_flight(), 0);
            prop_assert_eq!(out.len() as u64, stats.delivered);
            prop_assert_eq!(stats.delivered + stats.lost, stats.sent + stats.duplicated);
        }
    }
}
