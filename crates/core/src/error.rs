// Error types for the instance core

use thiserror::Error;

/// Startup configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is absent or empty
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),
}

/// Errors raised while delivering a status message
#[derive(Debug, Error)]
pub enum PublishError {
    /// The messaging client could not be created
    #[error("could not create messaging client: {0}")]
    Connect(String),

    /// No access token could be obtained for the channel
    #[error("could not obtain credentials: {0}")]
    Credentials(String),

    /// The status message could not be serialized
    #[error("failed to serialize status message: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The request never reached the channel or the response was unreadable
    #[error("transport error: {0}")]
    Transport(String),

    /// The channel answered with a non-success status
    #[error("channel rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl PublishError {
    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        PublishError::Transport(msg.into())
    }
}

impl From<reqwest::Error> for PublishError {
    fn from(err: reqwest::Error) -> Self {
        PublishError::Transport(err.to_string())
    }
}

/// Errors that stop the coordinator loop
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// Status publication failed; the instance must not keep running unobserved
    #[error("failed to publish status: {0}")]
    Publish(#[from] PublishError),

    /// Every sender was dropped before a termination event arrived
    #[error("coordinator inbox closed")]
    InboxClosed,
}
