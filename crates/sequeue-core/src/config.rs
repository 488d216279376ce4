//! Queue configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::QueueError;

/// How the configured interval is applied between two cycles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalMode {
    /// Minimum spacing measured from the start of one cycle to the start of
    /// the next. Time spent in the handlers counts towards the interval.
    #[default]
    Compensated,

    /// Flat delay after every item, regardless of handler latency.
    Fixed,
}

/// What the drain loop does when an item handler returns an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the chain and report the error. Remaining items stay buffered.
    #[default]
    Abort,

    /// Log the failure and keep draining.
    Continue,
}

/// Configuration for a [`SequentialQueue`](crate::queue::SequentialQueue).
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use sequeue_core::config::{IntervalMode, QueueConfig};
///
/// let config = QueueConfig::from_json_str(r#"{ "interval_ms": 250 }"#).unwrap();
/// assert_eq!(config.interval().as_millis(), 250);
/// assert_eq!(config.interval_mode, IntervalMode::Compensated);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Name used in log fields and error messages.
    pub name: String,

    /// Minimum spacing between cycles, in milliseconds.
    pub interval_ms: u64,

    pub interval_mode: IntervalMode,

    pub on_failure: FailurePolicy,

    /// Close the queue right after the first time it drains.
    pub close_when_drained: bool,
}

impl QueueConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, QueueError> {
        serde_json::from_str(json).map_err(|e| QueueError::Config(e.to_string()))
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }
}
