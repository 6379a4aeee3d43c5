// Status publishing
//
// StatusPublisher turns a state snapshot into the JSON wire message and hands
// the bytes to a MessageSink. Sinks are black boxes: deliver or fail.

use async_trait::async_trait;
use tracing::info;

use crate::error::PublishError;
use crate::state::{InstanceState, StatusMessage};

// ============================================================================
// MessageSink - External delivery channel
// ============================================================================

/// Trait for the external channel that receives serialized status messages
///
/// Implementations:
/// - `PubSubSink` publishes to a Google Pub/Sub topic
/// - `InMemorySink` records payloads for tests
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Deliver one serialized message
    async fn deliver(&self, payload: Vec<u8>) -> Result<(), PublishError>;
}

// ============================================================================
// StatusPublisher
// ============================================================================

/// Serializes instance state and delivers it through a sink
pub struct StatusPublisher<S> {
    sink: S,
}

impl<S: MessageSink> StatusPublisher<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    /// Derive, serialize and deliver a status message for `state`
    ///
    /// Errors are returned to the caller untouched; there is no retry.
    pub async fn publish(&self, state: &InstanceState) -> Result<StatusMessage, PublishError> {
        let message = state.to_message();
        let payload = serde_json::to_vec(&message)?;

        info!(
            payload = %String::from_utf8_lossy(&payload),
            status = %message.instance_status,
            "Publish"
        );

        self.sink.deliver(payload).await?;
        Ok(message)
    }
}
