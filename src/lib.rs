//! # Castor
//!
//! A concurrent consumer pipeline for poll-based message queues. Castor pulls
//! batches from a queue, fans them out to your message handler, and deletes only
//! the messages that were handled successfully, batching deletions to keep round
//! trips down.
//!
//! ## Features
//!
//! - **Generic Design**: Works with any queue system by implementing the [`QueueTransport`] and [`QueueResolver`] traits
//! - **Paired Workers**: `concurrent_workers` receiver loops feed the same number of consumer loops over a bounded channel
//! - **Batched Acknowledgement**: A single deletion worker issues one batched delete per handled receive batch
//! - **Backpressure**: Bounded channels block receivers when consumers fall behind, and consumers when deletions fall behind
//! - **Graceful Shutdown**: Cancellation stops polling, then every batch already received is handled and acknowledged before [`Pipeline::run`] returns
//! - **Fail Fast**: A missing consumer or an unknown queue is a [`PipelineError`] before any worker starts
//! - **Structured Logging**: `tracing` events with worker ids and error details
//! - **SQS Support**: [`sqs::SqsTransport`] behind the default `sqs` feature
//!
//! ## Quick Start
//!
//! ```rust
//! use castor::{
//!     BoxError, Consumer, DeletionEntry, Message, Pipeline, PipelineConfig, QueueHandle,
//!     QueueResolver, QueueTransport, ReceiveBatch, ReceiveRequest, TransportError,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! // 1. Implement the transport traits for your queue system
//! struct MyQueue;
//!
//! impl QueueResolver for MyQueue {
//!     async fn resolve_queue(&self, name: &str) -> Result<QueueHandle, TransportError> {
//!         Ok(QueueHandle::new(name, format!("mem://{name}")))
//!     }
//! }
//!
//! impl QueueTransport for MyQueue {
//!     async fn receive_batch(&self, _: &ReceiveRequest) -> Result<ReceiveBatch, TransportError> {
//!         // Long-poll your queue here
//!         tokio::time::sleep(std::time::Duration::from_millis(10)).await;
//!         Ok(vec![])
//!     }
//!
//!     async fn delete_message(&self, _: &QueueHandle, _: &str) -> Result<(), TransportError> {
//!         Ok(())
//!     }
//!
//!     async fn delete_batch(&self, _: &QueueHandle, _: &[DeletionEntry]) -> Result<(), TransportError> {
//!         Ok(())
//!     }
//! }
//!
//! // 2. Implement Consumer for your business logic
//! struct MyConsumer;
//!
//! impl Consumer for MyConsumer {
//!     async fn consume(&self, message: &Message) -> Result<(), BoxError> {
//!         println!("Processing: {}", message.body);
//!         Ok(())
//!     }
//! }
//!
//! // 3. Build the pipeline and run it until cancelled
//! # #[tokio::main]
//! # async fn main() -> Result<(), castor::PipelineError> {
//! let config = PipelineConfig::for_queue("orders")
//!     .with_concurrent_workers(3)
//!     .with_channel_buffer(2)
//!     .with_max_messages_per_poll(10)
//!     .with_wait_time_seconds(20);
//!
//! let pipeline = Pipeline::builder(MyQueue, config)
//!     .consumer(MyConsumer)
//!     .build()
//!     .await?;
//!
//! let cancel = CancellationToken::new();
//! cancel.cancel(); // normally done from a signal handler
//!
//! let report = pipeline.run(cancel).await;
//! assert_eq!(report.messages_handled, 0);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! receiver 0..N ──▶ receive channel ──▶ consumer 0..N ──▶ deletion channel ──▶ deletion worker ──▶ delete_batch
//! ```
//!
//! Both channels hold `concurrent_workers * channel_buffer` batches (at least
//! one). Receivers are the only workers that watch the cancellation token.
//! Shutdown runs in order:
//! 1. Receivers observe cancellation and stop
//! 2. The receive channel is closed
//! 3. Consumers drain it and stop
//! 4. The deletion channel is closed
//! 5. The deletion worker drains it and stops
//!
//! Errors after startup never stop the pipeline. Failed receives are logged and
//! retried, consumer failures leave the message on the queue for redelivery,
//! and failed batch deletes are logged with the batch contents and not retried.
//!
//! ## Examples
//!
//! See `demos/sqs_consumer.rs` for a complete SQS consumer.

pub mod config;
pub mod consumer;
pub mod error;
pub mod message;
pub mod pipeline;
pub mod producer;
#[cfg(feature = "sqs")]
pub mod sqs;
pub mod telemetry;
pub mod transport;
mod workers;

pub use config::{EnvMsDuration, PipelineConfig};
pub use consumer::{Consumer, LoggingConsumer};
pub use error::{BoxError, PipelineError, ProducerError, TransportError};
pub use message::{DeletionBatch, DeletionEntry, Message, ReceiveBatch};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineReport};
pub use producer::Producer;
pub use transport::{MessageSender, QueueHandle, QueueResolver, QueueTransport, ReceiveRequest};
