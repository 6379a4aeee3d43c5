// In-memory implementations for tests and local runs
//
// InMemorySink records every delivered payload and can be told to start
// failing, which is how the fatal publish path gets exercised without a
// real messaging service.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::PublishError;
use crate::publisher::MessageSink;

#[derive(Debug, Default)]
struct SinkInner {
    payloads: Vec<Vec<u8>>,
    failure: Option<String>,
}

/// In-memory message sink
#[derive(Debug, Default, Clone)]
pub struct InMemorySink {
    inner: Arc<Mutex<SinkInner>>,
    delivered: Arc<Notify>,
}

impl InMemorySink {
    /// Create a new empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following delivery fail with a transport error
    pub fn fail_with(&self, reason: impl Into<String>) {
        self.inner.lock().failure = Some(reason.into());
    }

    /// Raw payloads in delivery order
    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.inner.lock().payloads.clone()
    }

    /// Payloads parsed back into JSON values
    pub fn messages(&self) -> Vec<serde_json::Value> {
        self.inner
            .lock()
            .payloads
            .iter()
            .filter_map(|p| serde_json::from_slice(p).ok())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until at least `count` payloads have been delivered
    pub async fn wait_for(&self, count: usize) {
        loop {
            let notified = self.delivered.notified();
            if self.len() >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl MessageSink for InMemorySink {
    async fn deliver(&self, payload: Vec<u8>) -> Result<(), PublishError> {
        {
            let mut inner = self.inner.lock();
            if let Some(reason) = &inner.failure {
                return Err(PublishError::transport(reason.clone()));
            }
            inner.payloads.push(payload);
        }
        self.delivered.notify_waiters();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_payloads_in_order() {
        let sink = InMemorySink::new();
        sink.deliver(br#"{"n":1}"#.to_vec()).await.unwrap();
        sink.deliver(br#"{"n":2}"#.to_vec()).await.unwrap();

        let messages = sink.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["n"], 1);
        assert_eq!(messages[1]["n"], 2);
    }

    #[tokio::test]
    async fn test_wait_for_returns_once_delivered() {
        let sink = InMemorySink::new();
        let writer = sink.clone();
        tokio::spawn(async move {
            writer.deliver(b"{}".to_vec()).await.unwrap();
        });

        sink.wait_for(1).await;
        assert_eq!(sink.len(), 1);
    }
}
