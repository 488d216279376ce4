//! Queue module: drain state, spacing arithmetic, and the sequential queue.

mod builder;
mod sequential;
mod spacing;
mod state;

pub use builder::QueueBuilder;
pub use sequential::SequentialQueue;
pub use spacing::Spacing;
pub use state::QueueState;
