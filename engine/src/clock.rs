//! Monotonic time sources for the tick loop.

use std::time::{Duration, Instant};

/// Time source the engine paces itself against.
///
/// Implementations must be monotonic: `now_ns` never goes backwards. Wall
/// clocks subject to NTP adjustment are not acceptable here.
pub trait Clock: Send + Sync {
    /// Nanoseconds elapsed since an arbitrary fixed origin.
    fn now_ns(&self) -> u64;

    /// Blocks the calling thread for roughly `ns` nanoseconds. The engine
    /// only relies on this for the coarse part of a wait; precision comes
    /// from the busy-wait tail in the loop itself.
    fn sleep_ns(&self, ns: u64) {
        std::thread::sleep(Duration::from_nanos(ns));
    }
}

/// [`Clock`] backed by [`Instant`].
#[derive(Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
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
    fn now_ns(&self) -> u64 {
        // u64 nanoseconds cover ~584 years from process start.
        self.origin.elapsed().as_nanos() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_clock_never_goes_backwards() {
        let clock = MonotonicClock::new();
        let mut previous = clock.now_ns();
        for _ in 0..1_000 {
            let now = clock.now_ns();
            assert!(now >= previous);
            previous = now;
        }
    }
}
