//! This module provides the trait implemented by application message handlers.

use std::sync::Arc;

use crate::{error::BoxError, message::Message};

/// A trait for consumers that define how to handle individual messages.
///
/// Returning `Ok(())` marks the message as handled and it will be deleted from
/// the queue. Returning an error leaves it on the queue, where it becomes
/// visible again once its visibility timeout elapses. The pipeline does not
/// log consumer errors above debug level; log inside the consumer if the
/// failure matters.
///
/// Consumers are shared between all consumer workers and may be called
/// concurrently.
///
/// # Examples
///
/// ```rust
/// use castor::{BoxError, Consumer, Message};
///
/// struct RejectEmpty;
///
/// impl Consumer for RejectEmpty {
///     async fn consume(&self, message: &Message) -> Result<(), BoxError> {
///         if message.body.is_empty() {
///             return Err("empty body".into());
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Consumer {
    /// Process a single message
    fn consume(&self, message: &Message) -> impl Future<Output = Result<(), BoxError>> + Send;
}

impl<C> Consumer for Arc<C>
where
    C: Consumer + Send + Sync,
{
    fn consume(&self, message: &Message) -> impl Future<Output = Result<(), BoxError>> + Send {
        (**self).consume(message)
    }
}

/// Consumer that logs every message body and reports success.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingConsumer;

impl Consumer for LoggingConsumer {
    async fn consume(&self, message: &Message) -> Result<(), BoxError> {
        tracing::info!(message_id = %message.id, body = %message.body, "success");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn logging_consumer_always_succeeds() {
        let message = Message::new("m-1", "rh-1", "hello");

        assert!(LoggingConsumer.consume(&message).await.is_ok());
    }

    #[tokio::test]
    async fn shared_consumer_delegates() {
        struct Fails;
        impl Consumer for Fails {
            async fn consume(&self, _: &Message) -> Result<(), BoxError> {
                Err("nope".into())
            }
        }

        let shared = Arc::new(Fails);
        let err = shared
            .consume(&Message::new("m-1", "rh-1", ""))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "nope");
    }
}
