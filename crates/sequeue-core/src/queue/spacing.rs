//! Spacing policy: decides the delay between two drain cycles.

use std::time::Duration;

use crate::config::{IntervalMode, QueueConfig};

/// Inter-cycle spacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spacing {
    pub interval: Duration,
    pub mode: IntervalMode,
}

impl Spacing {
    pub fn new(interval: Duration, mode: IntervalMode) -> Self {
        Self { interval, mode }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(config.interval(), config.interval_mode)
    }

    /// Delay before the next cycle, given how long the current one took.
    ///
    /// `elapsed` is measured from the start of the cycle until every item
    /// handler has completed.
    ///
    /// With interval=1000ms:
    /// - Compensated, handler took 500ms: wait 500ms
    /// - Compensated, handler took 1500ms: wait 0
    /// - Fixed: always wait 1000ms
    pub fn next_delay(&self, elapsed: Duration) -> Duration {
        match self.mode {
            IntervalMode::Compensated => self.interval.saturating_sub(elapsed),
            IntervalMode::Fixed => self.interval,
        }
    }
}

impl Default for Spacing {
    fn default() -> Self {
        Self::new(Duration::ZERO, IntervalMode::Compensated)
    }
}
