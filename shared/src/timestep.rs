//! Fixed-step accumulator shared by the server simulation and the client
//! prediction loop.

use std::time::Duration;

/// Converts variable real-time deltas into a whole number of constant steps.
///
/// Time is carried in integer nanoseconds, so feeding one long delta or the
/// same total split across several calls yields the same step count.
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    step: Duration,
    accumulator: Duration,
    max_steps_per_advance: Option<u32>,
    total_steps: u64,
    dropped_last_advance: u64,
}

impl FixedTimestep {
    pub fn new(step: Duration) -> Self {
        Self {
            step: step.max(Duration::from_nanos(1)),
            accumulator: Duration::ZERO,
            max_steps_per_advance: None,
            total_steps: 0,
            dropped_last_advance: 0,
        }
    }

    pub fn from_rate(hz: u32) -> Self {
        Self::new(Duration::from_nanos(1_000_000_000 / u64::from(hz.max(1))))
    }

    /// Caps how many steps a single `advance` may produce. Whole steps beyond
    /// the cap are discarded; the sub-step remainder is kept.
    pub fn with_max_steps(mut self, max_steps: Option<u32>) -> Self {
        self.max_steps_per_advance = max_steps;
        self
    }

    /// Adds `delta` to the accumulator and returns how many steps are due.
    pub fn advance(&mut self, delta: Duration) -> u32 {
        self.accumulator += delta;
        self.dropped_last_advance = 0;

        let mut steps = 0u32;
        while self.accumulator >= self.step {
            if let Some(max) = self.max_steps_per_advance {
                if steps >= max {
                    let pending = self.accumulator.as_nanos();
                    let step = self.step.as_nanos();
                    self.dropped_last_advance = (pending / step) as u64;
                    self.accumulator = Duration::from_nanos((pending % step) as u64);
                    break;
                }
            }
            self.accumulator -= self.step;
            steps += 1;
        }

        self.total_steps += u64::from(steps);
        steps
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    pub fn accumulator(&self) -> Duration {
        self.accumulator
    }

    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    /// Whole steps the most recent `advance` discarded because of the cap.
    pub fn dropped_last_advance(&self) -> u64 {
        self.dropped_last_advance
    }

    pub fn reset(&mut self) {
        self.accumulator = Duration::ZERO;
    }
}
