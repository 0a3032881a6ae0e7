//! Monotonic time source used by backoff delays, TTL bookkeeping, and the
//! rate-limiter token bucket (spec.md §6, `Clock` contract).
//!
//! Production code uses [`SystemClock`]; tests can substitute a
//! [`Clock`] implementation that advances deterministically.

use std::time::{Duration, Instant};

/// A source of monotonic instants.
///
/// Kept as a trait (rather than calling `Instant::now()` directly) so that
/// cache freshness, token-bucket refill, and backoff-sleep tests can run
/// without real wall-clock delays.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;

    /// Blocks the calling thread for `duration`. Exists on the trait so a
    /// fake clock can make "sleeps" instantaneous in tests.
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// The real, OS-backed clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
