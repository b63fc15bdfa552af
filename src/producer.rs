//! This module provides a JSON message producer that shares the pipeline's transport.

use std::sync::Arc;

use serde::Serialize;

use crate::{
    error::ProducerError,
    transport::{MessageSender, QueueResolver},
};

/// Sends JSON-encoded messages to queues by name.
///
/// The queue name is resolved on every send, so one producer can write to any
/// number of queues.
#[derive(Debug)]
pub struct Producer<S> {
    sender: Arc<S>,
}

impl<S> Clone for Producer<S> {
    fn clone(&self) -> Self {
        Self {
            sender: Arc::clone(&self.sender),
        }
    }
}

impl<S> Producer<S>
where
    S: QueueResolver + MessageSender + Send + Sync,
{
    pub fn new(sender: Arc<S>) -> Self {
        Self { sender }
    }

    /// Serialize `message` as JSON and send it to `queue_name`
    #[tracing::instrument(skip(self, message))]
    pub async fn send<M>(&self, queue_name: &str, message: &M) -> Result<(), ProducerError>
    where
        M: Serialize + Sync,
    {
        let queue = self
            .sender
            .resolve_queue(queue_name)
            .await
            .map_err(|source| ProducerError::QueueResolution {
                queue: queue_name.to_string(),
                source,
            })?;

        let body = serde_json::to_string(message)?;

        self.sender
            .send_message(&queue, body)
            .await
            .map_err(ProducerError::Send)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde::Serialize;

    use super::*;
    use crate::{QueueHandle, TransportError};

    #[derive(Default)]
    struct FakeSender {
        sent: Mutex<Vec<(QueueHandle, String)>>,
    }

    impl QueueResolver for FakeSender {
        async fn resolve_queue(&self, queue_name: &str) -> Result<QueueHandle, TransportError> {
            if queue_name == "missing" {
                return Err(TransportError::Service {
                    operation: "get_queue_url",
                    message: "queue does not exist".to_string(),
                });
            }
            Ok(QueueHandle::new(queue_name, format!("mem://{queue_name}")))
        }
    }

    impl MessageSender for FakeSender {
        async fn send_message(
            &self,
            queue: &QueueHandle,
            body: String,
        ) -> Result<(), TransportError> {
            self.sent.lock().unwrap().push((queue.clone(), body));
            Ok(())
        }
    }

    #[derive(Serialize)]
    struct OrderPlaced {
        order_id: u32,
        sku: &'static str,
    }

    #[tokio::test]
    async fn send_encodes_json_to_resolved_queue() {
        let sender = Arc::new(FakeSender::default());
        let producer = Producer::new(Arc::clone(&sender));

        producer
            .send("orders", &OrderPlaced { order_id: 7, sku: "abc" })
            .await
            .unwrap();

        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0.address(), "mem://orders");
        assert_eq!(sent[0].1, r#"{"order_id":7,"sku":"abc"}"#);
    }

    #[tokio::test]
    async fn unknown_queue_is_reported() {
        let sender = Arc::new(FakeSender::default());
        let producer = Producer::new(Arc::clone(&sender));

        let err = producer.send("missing", &1).await.unwrap_err();

        assert!(matches!(
            err,
            ProducerError::QueueResolution { ref queue, .. } if queue == "missing"
        ));
        assert!(sender.sent.lock().unwrap().is_empty());
    }
}
