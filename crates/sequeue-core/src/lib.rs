//! sequeue-core
//!
//! A minimal sequential task queue. Items are appended to an in-memory FIFO
//! and drained one at a time by async subscribers, with an optional minimum
//! spacing between cycles and a `done` notification whenever the buffer
//! empties.
//!
//! # Modules
//! - **queue**: `SequentialQueue`, its drain state machine and spacing policy
//! - **subscribers**: `item` / `done` subscription registry
//! - **config**: `QueueConfig` (serde), interval mode and failure policy
//! - **error**: `QueueError`, `HandlerError`
//! - **observability**: `QueueStats` snapshot
//!
//! Logging goes through `tracing`; installing a subscriber is up to the
//! application.

pub mod config;
pub mod error;
pub mod observability;
pub mod queue;
pub mod subscribers;

pub use config::{FailurePolicy, IntervalMode, QueueConfig};
pub use error::{HandlerError, QueueError};
pub use observability::QueueStats;
pub use queue::{QueueBuilder, QueueState, SequentialQueue};
pub use subscribers::{ItemHandler, SubscriptionId};
