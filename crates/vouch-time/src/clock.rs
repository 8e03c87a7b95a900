//! Clock implementations
//!
//! All clocks report milliseconds. Grace periods and embedded broadcast
//! times use the same unit.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Monotonic millisecond clock
pub trait Clock {
    /// Current time in milliseconds
    fn now(&self) -> u64;
}

/// Milliseconds since the Unix epoch, clamped so it never goes backwards.
///
/// Broadcast times carried in records are compared against the receiver's
/// clock, so nodes that check staleness need a shared epoch.
#[derive(Clone, Debug, Default)]
pub struct SystemClock {
    last: Arc<AtomicU64>,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        let previous = self.last.fetch_max(wall, Ordering::SeqCst);
        previous.max(wall)
    }
}

/// Manually advanced clock. Clones share the same time source, so a test
/// or simulator can hold one handle and drive every engine built with another.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    millis: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start at a given time
    pub fn starting_at(millis: u64) -> Self {
        ManualClock {
            millis: Arc::new(AtomicU64::new(millis)),
        }
    }

    /// Advance by a duration
    pub fn advance(&self, dt: Duration) {
        let dt = u64::try_from(dt.as_millis()).unwrap_or(u64::MAX);
        self.millis.fetch_add(dt, Ordering::SeqCst);
    }

    /// Set to an absolute time. Only moves forward.
    pub fn set(&self, millis: u64) {
        self.millis.fetch_max(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> u64 {
        (**self).now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_epoch_based() {
        let clock = SystemClock::new();
        let t1 = clock.now();
        // Later than 2020-01-01
        assert!(t1 > 1_577_836_800_000);
        assert!(clock.now() >= t1);
    }

    #[test]
    fn test_manual_clock_shared() {
        let clock = ManualClock::new();
        let handle = clock.clone();

        handle.advance(Duration::from_millis(250));
        assert_eq!(clock.now(), 250);

        clock.advance(Duration::from_secs(1));
        assert_eq!(handle.now(), 1250);
    }

    #[test]
    fn test_manual_clock_never_rewinds() {
        let clock = ManualClock::starting_at(5_000);
        clock.set(1_000);
        assert_eq!(clock.now(), 5_000);
        clock.set(6_000);
        assert_eq!(clock.now(), 6_000);
    }
}
