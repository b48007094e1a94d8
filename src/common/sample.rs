//! Rolling min/max window over a driver-applied signal.

/// Number of samples retained
const SAMPLE_DEPTH: usize = 6;

/// Min/max tracker over the last few driver-torque samples.
///
/// The TX gatekeeper widens its rate-limit envelope by the window extrema,
/// so a driver actively countering the command is given more room.
#[derive(Debug, Clone, Default)]
pub struct SampleWindow {
    values: [i32; SAMPLE_DEPTH],
    min: i32,
    max: i32,
}

impl SampleWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a new sample, evicting the oldest, and recompute the extrema.
    pub fn push(&mut self, sample: i32) {
        for i in (1..SAMPLE_DEPTH).rev() {
            self.values[i] = self.values[i - 1];
        }
        self.values[0] = sample;

        self.min = i32::MAX;
        self.max = i32::MIN;
        for &value in &self.values {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
    }

    pub fn min(&self) -> i32 {
        self.min
    }

    pub fn max(&self) -> i32 {
        self.max
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
