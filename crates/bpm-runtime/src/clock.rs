//! Time source used by the shutdown loop.
//!
//! Production code injects [`SystemClock`]. Tests inject [`ManualClock`],
//! whose `sleep` advances time instantly and records the requested delay.

use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Abstraction over time for deterministic shutdown tests.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns a monotonic instant.
    fn now(&self) -> Instant;

    /// Blocks the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Wall-clock time and real sleeps.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Clock that only moves when slept on.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    /// Creates a clock frozen at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Every delay passed to [`Clock::sleep`], in call order.
    #[must_use]
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Total simulated time slept.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now
            .lock()
            .map_or_else(|poisoned| *poisoned.into_inner(), |now| *now)
    }

    fn sleep(&self, duration: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += duration;
        }
        if let Ok(mut sleeps) = self.sleeps.lock() {
            sleeps.push(duration);
        }
    }
}
