//! This module defines the errors raised by transports, pipeline construction
//! and the producer.

use std::fmt::{self, Write};

use thiserror::Error;

/// Error type returned by [`Consumer`](crate::Consumer) implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors reported by a queue transport.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The call was abandoned because the pipeline is shutting down
    #[error("operation was cancelled")]
    Cancelled,
    #[error("{operation} failed: {message}")]
    Service {
        operation: &'static str,
        message: String,
    },
    /// Some entries of a batched delete were rejected by the backend
    #[error("{} of the batch entries were not deleted: {failed:?}", .failed.len())]
    PartialBatchFailure { failed: Vec<String> },
    #[error("backend returned an invalid message: {0}")]
    InvalidMessage(String),
}

impl TransportError {
    /// Build a [`TransportError::Service`] carrying the full source chain of `err`.
    pub fn service(operation: &'static str, err: &dyn std::error::Error) -> Self {
        let mut message = String::new();
        // Writing into a String cannot fail.
        let _ = write_err(&mut message, err);
        TransportError::Service { operation, message }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransportError::Cancelled)
    }
}

fn write_err(s: &mut String, err: &dyn std::error::Error) -> fmt::Result {
    write!(s, "{err}")?;
    if let Some(source) = err.source() {
        write!(s, ": ")?;
        write_err(s, source)?;
    }

    Ok(())
}

/// Fatal errors raised while constructing a pipeline. No worker has been
/// started when one of these is returned.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("consumer is not implemented or was not supplied")]
    MissingConsumer,
    #[error("queue not found: {queue}")]
    QueueResolution {
        queue: String,
        #[source]
        source: TransportError,
    },
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}

/// Errors raised while sending a message with the [`Producer`](crate::Producer).
#[derive(Error, Debug)]
pub enum ProducerError {
    #[error("failed to encode message as json")]
    Encode(#[from] serde_json::Error),
    #[error("queue not found: {queue}")]
    QueueResolution {
        queue: String,
        #[source]
        source: TransportError,
    },
    #[error("failed to send message")]
    Send(#[source] TransportError),
}
