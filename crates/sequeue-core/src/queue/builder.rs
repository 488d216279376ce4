//! QueueBuilder - fluent construction of a `SequentialQueue`.

use std::time::Duration;

use super::SequentialQueue;
use crate::config::{FailurePolicy, IntervalMode, QueueConfig};

/// Builds a [`SequentialQueue`] from initial items and config fields.
///
/// ```
/// use std::time::Duration;
/// use sequeue_core::queue::SequentialQueue;
///
/// let queue = SequentialQueue::builder()
///     .name("uploads")
///     .interval(Duration::from_millis(250))
///     .items(["a.txt", "b.txt"])
///     .build();
/// assert_eq!(queue.count(), 2);
/// assert_eq!(queue.name(), "uploads");
/// ```
pub struct QueueBuilder<T> {
    config: QueueConfig,
    items: Vec<T>,
}

impl<T> QueueBuilder<T>
where
    T: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            config: QueueConfig::default(),
            items: Vec::new(),
        }
    }

    /// Replace every config field at once.
    pub fn config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.config = self.config.with_interval(interval);
        self
    }

    pub fn interval_mode(mut self, mode: IntervalMode) -> Self {
        self.config.interval_mode = mode;
        self
    }

    pub fn on_failure(mut self, policy: FailurePolicy) -> Self {
        self.config.on_failure = policy;
        self
    }

    pub fn close_when_drained(mut self, close: bool) -> Self {
        self.config.close_when_drained = close;
        self
    }

    /// Append initial items. May be called more than once.
    pub fn items<I>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        self.items.extend(items);
        self
    }

    pub fn build(self) -> SequentialQueue<T> {
        SequentialQueue::new(self.items, self.config)
    }
}

impl<T> Default for QueueBuilder<T>
where
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
