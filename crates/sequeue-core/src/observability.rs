use serde::{Deserialize, Serialize};

use crate::queue::QueueState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub name: String,
    pub state: QueueState,
    /// Items buffered and not yet handed to a handler.
    pub pending: usize,
    pub processed: u64,
    pub failed: u64,
    /// Number of times a drain chain reached an empty buffer.
    pub drains: u64,
}
