//! This module contains the three worker loops that make up the pipeline.
//!
//! Receivers push batches onto the receive channel, consumers drain it and push
//! the handled subset of each batch onto the deletion channel, and a single
//! deletion worker drains that. Consumers and the deletion worker never look
//! at the cancellation token; they stop once their input channel is closed and
//! empty.

use std::{any::Any, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    Consumer, QueueTransport,
    message::{DeletionBatch, DeletionEntry, ReceiveBatch},
    transport::{QueueHandle, ReceiveRequest},
};

/// Counters kept by one receiver worker
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReceiverStats {
    pub batches: u64,
    pub messages: u64,
    pub errors: u64,
}

/// Counters kept by one consumer worker
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ConsumerStats {
    pub handled: u64,
    pub failed: u64,
    pub deletion_batches: u64,
}

/// Counters kept by the deletion worker
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DeletionStats {
    pub batches_deleted: u64,
    pub batches_failed: u64,
    pub entries_deleted: u64,
}

/// Poll the transport until `cancel` fires, forwarding non-empty batches.
#[tracing::instrument(skip(transport, request, batches, cancel, error_backoff))]
pub(crate) async fn receive_loop<T>(
    worker_id: usize,
    transport: Arc<T>,
    request: Arc<ReceiveRequest>,
    batches: async_channel::Sender<ReceiveBatch>,
    cancel: CancellationToken,
    error_backoff: Option<Duration>,
) -> ReceiverStats
where
    T: QueueTransport + Send + Sync + 'static,
{
    tracing::debug!(worker_id, "receiver started");
    let mut stats = ReceiverStats::default();

    loop {
        if cancel.is_cancelled() {
            break;
        }

        // Dropping an in-flight receive on cancellation is safe: nothing has
        // been handed to us yet, so the messages stay on the queue.
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = transport.receive_batch(&request) => result,
        };

        match result {
            Ok(batch) if batch.is_empty() => continue,
            Ok(batch) => {
                let message_count = batch.len();
                tracing::debug!(worker_id, message_count, "received messages batch");

                // Blocks while the receive channel is full.
                if batches.send(batch).await.is_err() {
                    tracing::error!(worker_id, "receive channel closed, dropping batch");
                    break;
                }
                stats.batches += 1;
                stats.messages += message_count as u64;
            }
            Err(e) if e.is_cancelled() => {
                tracing::debug!(worker_id, error = %e, "receive cancelled");
                break;
            }
            Err(e) => {
                stats.errors += 1;
                tracing::error!(worker_id, error = %e, "error receiving messages");

                if let Some(delay) = error_backoff {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    tracing::debug!(worker_id, "receiver stopped");
    stats
}

/// Run the consumer over every message of every batch until the receive
/// channel is closed and drained.
#[tracing::instrument(skip(consumer, batches, deletions))]
pub(crate) async fn consume_loop<C>(
    worker_id: usize,
    consumer: Arc<C>,
    batches: async_channel::Receiver<ReceiveBatch>,
    deletions: mpsc::Sender<DeletionBatch>,
) -> ConsumerStats
where
    C: Consumer + Send + Sync + 'static,
{
    tracing::debug!(worker_id, "consumer started");
    let mut stats = ConsumerStats::default();

    while let Ok(batch) = batches.recv().await {
        let mut entries = DeletionBatch::with_capacity(batch.len());

        for message in &batch {
            // A panicking handler fails the message, not the worker.
            match AssertUnwindSafe(consumer.consume(message))
                .catch_unwind()
                .await
            {
                Ok(Ok(())) => {
                    stats.handled += 1;
                    entries.push(DeletionEntry::from(message));
                }
                Ok(Err(e)) => {
                    stats.failed += 1;
                    tracing::debug!(
                        worker_id,
                        message_id = %message.id,
                        error = %e,
                        "message not handled, leaving it on the queue"
                    );
                }
                Err(panic) => {
                    stats.failed += 1;
                    tracing::error!(
                        worker_id,
                        message_id = %message.id,
                        panic = panic_message(panic.as_ref()),
                        "consumer panicked, leaving message on the queue"
                    );
                }
            }
        }

        if entries.is_empty() {
            continue;
        }

        // Blocks while the deletion channel is full.
        if deletions.send(entries).await.is_err() {
            tracing::error!(
                worker_id,
                "deletion channel closed, handled messages will be redelivered"
            );
            continue;
        }
        stats.deletion_batches += 1;
    }

    tracing::debug!(worker_id, "consumer stopped");
    stats
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}

/// Issue one batched delete per deletion batch until the deletion channel is
/// closed and drained. Failed deletes are logged and not retried.
#[tracing::instrument(skip_all, fields(queue = %queue.name()))]
pub(crate) async fn delete_loop<T>(
    transport: Arc<T>,
    queue: QueueHandle,
    mut deletions: mpsc::Receiver<DeletionBatch>,
) -> DeletionStats
where
    T: QueueTransport + Send + Sync + 'static,
{
    tracing::debug!("deletion worker started");
    let mut stats = DeletionStats::default();

    while let Some(batch) = deletions.recv().await {
        match transport.delete_batch(&queue, &batch).await {
            Ok(()) => {
                tracing::trace!(entry_count = batch.len(), "batch deleted");
                stats.batches_deleted += 1;
                stats.entries_deleted += batch.len() as u64;
            }
            Err(e) => {
                stats.batches_failed += 1;
                tracing::error!(error = %e, batch = ?batch, "batch was not deleted");
            }
        }
    }

    tracing::debug!("deletion worker stopped");
    stats
}
