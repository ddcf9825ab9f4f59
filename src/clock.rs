use crate::types::Micros;
use core::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Shared handle to a time source.
///
/// Clocks are never part of the modeled concurrency, so this is always a
/// `std` `Arc` regardless of build configuration.
pub type SharedClock = std::sync::Arc<dyn Clock>;

/// Monotonic microsecond-resolution time source.
///
/// The graph stamps two events with it: the moment a resource becomes
/// available and the moment a node's payload begins. Inject a [`ManualClock`]
/// in tests to make both deterministic.
pub trait Clock: Send + Sync + 'static {
    /// Current timestamp in microseconds.
    fn now(&self) -> Micros;
}

/// Wall-clock-backed [`Clock`] counting microseconds since its construction.
#[derive(Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Micros {
        u64::try_from(self.origin.elapsed().as_micros()).unwrap_or(Micros::MAX)
    }
}

/// Test clock that only advances when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: Micros) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    /// Jumps to an absolute timestamp.
    pub fn set(&self, now: Micros) {
        self.now.store(now, Ordering::Relaxed);
    }

    /// Advances the clock and returns the new timestamp.
    pub fn advance(&self, by: Micros) -> Micros {
        self.now.fetch_add(by, Ordering::Relaxed) + by
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Micros {
        self.now.load(Ordering::Relaxed)
    }
}
