//! This module provides the traits the pipeline uses to talk to a queue backend.
//!
//! Implement these traits to integrate a queue system (SQS, an in-memory fake,
//! etc.) with the pipeline. Implementations are shared between all workers, so
//! they must be safe to call concurrently; connection management, auth and
//! retries of individual network calls are the implementation's business.

use std::sync::Arc;

use crate::{
    error::TransportError,
    message::{DeletionEntry, ReceiveBatch},
};

/// Resolved address of a queue, created once before the pipeline starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueHandle {
    name: String,
    address: String,
}

impl QueueHandle {
    /// Wrap an already resolved address
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }

    /// Human readable queue name the handle was resolved from
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backend address (for SQS, the queue URL)
    pub fn address(&self) -> &str {
        &self.address
    }
}

/// Template for every receive call issued by the receiver workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveRequest {
    pub queue: QueueHandle,
    /// Upper bound on the number of messages returned by one call
    pub max_messages: i32,
    /// How long received messages stay hidden from other receivers
    pub visibility_timeout_seconds: i32,
    /// Long-poll wait for at least one message
    pub wait_time_seconds: i32,
}

/// Receive and acknowledge operations consumed by the pipeline.
pub trait QueueTransport {
    /// Fetch up to `request.max_messages` messages.
    ///
    /// An empty batch with no error means the poll timed out. Implementations
    /// should return [`TransportError::Cancelled`] when the call was abandoned
    /// because of shutdown.
    fn receive_batch(
        &self,
        request: &ReceiveRequest,
    ) -> impl Future<Output = Result<ReceiveBatch, TransportError>> + Send;

    /// Acknowledge a single delivery
    fn delete_message(
        &self,
        queue: &QueueHandle,
        receipt_handle: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Acknowledge a set of deliveries in one call.
    ///
    /// A partial failure must be reported as an error.
    fn delete_batch(
        &self,
        queue: &QueueHandle,
        entries: &[DeletionEntry],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Maps a queue name to its address.
pub trait QueueResolver {
    fn resolve_queue(
        &self,
        queue_name: &str,
    ) -> impl Future<Output = Result<QueueHandle, TransportError>> + Send;
}

/// Sends one raw message body to a queue.
pub trait MessageSender {
    fn send_message(
        &self,
        queue: &QueueHandle,
        body: String,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

impl<T> QueueTransport for Arc<T>
where
    T: QueueTransport + Send + Sync,
{
    fn receive_batch(
        &self,
        request: &ReceiveRequest,
    ) -> impl Future<Output = Result<ReceiveBatch, TransportError>> + Send {
        (**self).receive_batch(request)
    }

    fn delete_message(
        &self,
        queue: &QueueHandle,
        receipt_handle: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).delete_message(queue, receipt_handle)
    }

    fn delete_batch(
        &self,
        queue: &QueueHandle,
        entries: &[DeletionEntry],
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).delete_batch(queue, entries)
    }
}

impl<T> QueueResolver for Arc<T>
where
    T: QueueResolver + Send + Sync,
{
    fn resolve_queue(
        &self,
        queue_name: &str,
    ) -> impl Future<Output = Result<QueueHandle, TransportError>> + Send {
        (**self).resolve_queue(queue_name)
    }
}

impl<T> MessageSender for Arc<T>
where
    T: MessageSender + Send + Sync,
{
    fn send_message(
        &self,
        queue: &QueueHandle,
        body: String,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).send_message(queue, body)
    }
}
