//! Jittered tick scheduling
//!
//! Nodes broadcast origin messages on a fixed interval with a randomized
//! offset so that neighbors do not transmit in lockstep.

use std::time::Duration;

use rand::Rng;

/// Periodic wake-up schedule with jitter
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickSchedule {
    /// Nominal interval between ticks
    pub interval: Duration,
    /// Total jitter span, centred on `interval`
    pub jitter: Duration,
    /// Quiet period before the first tick (network formation)
    pub startup_delay: Duration,
}

impl Default for TickSchedule {
    fn default() -> Self {
        TickSchedule {
            interval: Duration::from_secs(10),
            jitter: Duration::from_secs(2),
            startup_delay: Duration::from_secs(10),
        }
    }
}

impl TickSchedule {
    pub fn new(interval: Duration, jitter: Duration) -> Self {
        TickSchedule {
            interval,
            jitter,
            startup_delay: Duration::ZERO,
        }
    }

    pub fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    /// Delay before the first tick: the startup delay plus a uniformly
    /// random phase within one interval.
    pub fn first_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        self.startup_delay
            .saturating_add(random_below(rng, self.interval))
    }

    /// Delay until the next tick: `interval - jitter/2 + U[0, jitter)`
    pub fn next_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        self.min_delay()
            .saturating_add(random_below(rng, self.jitter))
    }

    /// Smallest delay `next_delay` can return
    pub fn min_delay(&self) -> Duration {
        self.interval.saturating_sub(self.jitter / 2)
    }

    /// Largest delay `next_delay` can return
    pub fn max_delay(&self) -> Duration {
        self.min_delay().saturating_add(self.jitter)
    }
}

fn random_below<R: Rng + ?Sized>(rng: &mut R, bound: Duration) -> Duration {
    let millis = u64::try_from(bound.as_millis()).unwrap_or(u64::MAX);
    if millis == 0 {
        Duration::ZERO
    } else {
        Duration::from_millis(rng.gen_range(0..millis))
    }
}
