//! Drain state machine for the queue.

use serde::{Deserialize, Serialize};

/// Queue state.
///
/// State transitions:
/// - Idle -> Draining (enqueue into an idle queue, or an explicit dequeue)
/// - Draining -> Idle (buffer empty, or a handler failed under `Abort`)
/// - Idle | Draining -> Closed (close)
///
/// At most one drain chain exists while `Draining`; entering that state is the
/// only way to start one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    /// No drain chain is running.
    Idle,

    /// A drain chain owns the buffer.
    Draining,

    /// Terminal. The buffer has been discarded.
    Closed,
}

impl QueueState {
    pub fn is_terminal(self) -> bool {
        matches!(self, QueueState::Closed)
    }

    /// Can a new drain chain start from this state?
    pub fn can_start_drain(self) -> bool {
        matches!(self, QueueState::Idle)
    }
}
