use thiserror::Error;

/// Error returned by an item handler.
///
/// Handlers only need to report *that* they failed and why; the queue decides
/// what happens next according to its [`FailurePolicy`](crate::config::FailurePolicy).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue `{name}` is closed")]
    Closed { name: String },

    #[error("no tokio runtime available to drain the queue")]
    NoRuntime,

    #[error("item handler failed in queue `{name}`: {source}")]
    Handler {
        name: String,
        #[source]
        source: HandlerError,
    },

    #[error("invalid queue config: {0}")]
    Config(String),
}
