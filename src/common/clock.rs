//! Monotonic microsecond time source.
//!
//! The 32-bit counter wraps roughly every 71 minutes; elapsed time must be
//! computed with [`elapsed_us`], never by comparing raw values.

use std::time::Instant;

/// Monotonic microsecond counter consumed by the safety models
pub trait Clock {
    fn now_us(&self) -> u32;
}

/// Elapsed microseconds between two counter readings, wrap-safe.
pub fn elapsed_us(now: u32, last: u32) -> u32 {
    now.wrapping_sub(last)
}

/// Production clock backed by `std::time::Instant`
#[derive(Debug)]
pub struct StdClock {
    start: Instant,
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn now_us(&self) -> u32 {
        self.start.elapsed().as_micros() as u32
    }
}

/// Manually advanced clock for deterministic tests
#[derive(Debug, Default)]
pub struct ManualClock {
    now: std::cell::Cell<u32>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, now_us: u32) {
        self.now.set(now_us);
    }

    pub fn advance(&self, delta_us: u32) {
        self.now.set(self.now.get().wrapping_add(delta_us));
    }
}

impl Clock for ManualClock {
    fn now_us(&self) -> u32 {
        self.now.get()
    }
}

impl Clock for &ManualClock {
    fn now_us(&self) -> u32 {
        self.now.get()
    }
}
