//! This module contains the pipeline orchestrator

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    Consumer, PipelineConfig, QueueResolver, QueueTransport,
    error::PipelineError,
    message::{DeletionBatch, ReceiveBatch},
    transport::{QueueHandle, ReceiveRequest},
    workers::{self, ConsumerStats, DeletionStats, ReceiverStats},
};

/// Summary of one [`Pipeline::run`].
///
/// Failures counted here were logged when they happened; none of them are
/// returned as errors.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineReport {
    /// Non-empty batches pushed onto the receive channel
    pub batches_received: u64,
    pub messages_received: u64,
    /// Receive calls that failed for a reason other than cancellation
    pub receive_errors: u64,
    /// Messages the consumer reported as handled
    pub messages_handled: u64,
    /// Messages the consumer rejected; these are left on the queue
    pub messages_failed: u64,
    /// Deletion batches pushed onto the deletion channel
    pub deletion_batches: u64,
    pub batches_deleted: u64,
    pub batches_not_deleted: u64,
    pub messages_deleted: u64,
}

impl PipelineReport {
    fn add_receiver(&mut self, stats: ReceiverStats) {
        self.batches_received += stats.batches;
        self.messages_received += stats.messages;
        self.receive_errors += stats.errors;
    }

    fn add_consumer(&mut self, stats: ConsumerStats) {
        self.messages_handled += stats.handled;
        self.messages_failed += stats.failed;
        self.deletion_batches += stats.deletion_batches;
    }

    fn add_deletion(&mut self, stats: DeletionStats) {
        self.batches_deleted += stats.batches_deleted;
        self.batches_not_deleted += stats.batches_failed;
        self.messages_deleted += stats.entries_deleted;
    }
}

/// Builder for [`Pipeline`]. Nothing touches the queue until [`build`](Self::build).
pub struct PipelineBuilder<T, C> {
    transport: Arc<T>,
    consumer: Option<Arc<C>>,
    config: PipelineConfig,
}

impl<T, C> PipelineBuilder<T, C> {
    /// Set the consumer that handles each message
    pub fn consumer(mut self, consumer: C) -> Self {
        self.consumer = Some(Arc::new(consumer));
        self
    }

    /// Set a consumer that is also used elsewhere
    pub fn shared_consumer(mut self, consumer: Arc<C>) -> Self {
        self.consumer = Some(consumer);
        self
    }

    /// Set or clear the consumer
    pub fn set_consumer(mut self, consumer: Option<C>) -> Self {
        self.consumer = consumer.map(Arc::new);
        self
    }

    /// Resolve the queue with the transport itself and build the pipeline.
    ///
    /// # Errors
    ///
    /// * [`PipelineError::MissingConsumer`] if no consumer was set
    /// * [`PipelineError::InvalidConfig`] if the configuration is unusable
    /// * [`PipelineError::QueueResolution`] if the queue name does not resolve
    pub async fn build(self) -> Result<Pipeline<T, C>, PipelineError>
    where
        T: QueueResolver,
    {
        let transport = Arc::clone(&self.transport);
        self.build_with(transport.as_ref()).await
    }

    /// Build the pipeline, resolving the queue name with a separate resolver.
    pub async fn build_with<R>(self, resolver: &R) -> Result<Pipeline<T, C>, PipelineError>
    where
        R: QueueResolver,
    {
        let consumer = self.consumer.ok_or(PipelineError::MissingConsumer)?;
        self.config.validate()?;

        let queue = resolver
            .resolve_queue(&self.config.queue_name)
            .await
            .map_err(|source| PipelineError::QueueResolution {
                queue: self.config.queue_name.clone(),
                source,
            })?;

        tracing::info!(
            queue = %queue.name(),
            address = %queue.address(),
            "resolved queue"
        );

        let request = Arc::new(self.config.receive_request(queue.clone()));

        Ok(Pipeline {
            transport: self.transport,
            consumer,
            config: self.config,
            queue,
            request,
        })
    }
}

/// Concurrent receive, process and acknowledge pipeline.
///
/// `concurrent_workers` receiver workers poll the queue and push batches onto
/// a bounded receive channel. The same number of consumer workers drain it,
/// call the [`Consumer`] for each message in order, and push the ids of the
/// handled messages onto a bounded deletion channel. A single deletion worker
/// turns each of those into one batched delete.
///
/// # Type Parameters
///
/// * `T` - The queue transport, shared by every worker
/// * `C` - The consumer, shared by every consumer worker
pub struct Pipeline<T, C> {
    transport: Arc<T>,
    consumer: Arc<C>,
    config: PipelineConfig,
    queue: QueueHandle,
    request: Arc<ReceiveRequest>,
}

impl<T, C> std::fmt::Debug for Pipeline<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl<T, C> Pipeline<T, C> {
    /// Start building a pipeline over `transport`
    pub fn builder(transport: T, config: PipelineConfig) -> PipelineBuilder<T, C> {
        Self::builder_shared(Arc::new(transport), config)
    }

    /// Start building a pipeline over a transport that is also used elsewhere,
    /// for example by a [`Producer`](crate::Producer)
    pub fn builder_shared(transport: Arc<T>, config: PipelineConfig) -> PipelineBuilder<T, C> {
        PipelineBuilder {
            transport,
            consumer: None,
            config,
        }
    }

    /// The queue this pipeline reads from
    pub fn queue(&self) -> &QueueHandle {
        &self.queue
    }

    /// Configuration the pipeline was built with
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

impl<T, C> Pipeline<T, C>
where
    T: QueueTransport + QueueResolver + Send + Sync + 'static,
    C: Consumer + Send + Sync + 'static,
{
    /// Build a pipeline and run it until `cancel` fires and everything has drained.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # async fn example<T>(transport: T) -> Result<(), castor::PipelineError>
    /// # where T: castor::QueueTransport + castor::QueueResolver + Send + Sync + 'static {
    /// use castor::{LoggingConsumer, Pipeline, PipelineConfig};
    /// use tokio_util::sync::CancellationToken;
    ///
    /// let cancel = CancellationToken::new();
    /// let config = PipelineConfig::for_queue("orders").with_concurrent_workers(4);
    ///
    /// let report = Pipeline::start(transport, Some(LoggingConsumer), config, cancel).await?;
    /// println!("handled {} messages", report.messages_handled);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn start(
        transport: T,
        consumer: Option<C>,
        config: PipelineConfig,
        cancel: CancellationToken,
    ) -> Result<PipelineReport, PipelineError> {
        let pipeline = Self::builder(transport, config)
            .set_consumer(consumer)
            .build()
            .await?;

        Ok(pipeline.run(cancel).await)
    }
}

impl<T, C> Pipeline<T, C>
where
    T: QueueTransport + Send + Sync + 'static,
    C: Consumer + Send + Sync + 'static,
{
    /// Run the workers until `cancel` fires.
    ///
    /// Returns once every batch received before cancellation has been handled
    /// and, where applicable, submitted for deletion. Shutdown happens in
    /// order: receivers stop, the receive channel closes, consumers drain it
    /// and stop, the deletion channel closes, and the deletion worker drains it.
    pub async fn run(&self, cancel: CancellationToken) -> PipelineReport {
        let worker_count = self.config.worker_count();
        let capacity = self.config.channel_capacity();

        let (batch_tx, batch_rx) = async_channel::bounded::<ReceiveBatch>(capacity);
        let (delete_tx, delete_rx) = mpsc::channel::<DeletionBatch>(capacity);

        tracing::info!(
            queue = %self.queue.name(),
            worker_count,
            capacity,
            "starting pipeline"
        );

        let deleter = tokio::spawn(workers::delete_loop(
            Arc::clone(&self.transport),
            self.queue.clone(),
            delete_rx,
        ));

        let mut receivers = Vec::with_capacity(worker_count);
        let mut consumers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            receivers.push(tokio::spawn(workers::receive_loop(
                worker_id,
                Arc::clone(&self.transport),
                Arc::clone(&self.request),
                batch_tx.clone(),
                cancel.clone(),
                self.config.error_backoff(),
            )));
            consumers.push(tokio::spawn(workers::consume_loop(
                worker_id,
                Arc::clone(&self.consumer),
                batch_rx.clone(),
                delete_tx.clone(),
            )));
        }
        drop(batch_rx);

        let mut report = PipelineReport::default();

        for result in join_all(receivers).await {
            match result {
                Ok(stats) => report.add_receiver(stats),
                Err(e) => tracing::error!(error = %e, "receiver worker crashed"),
            }
        }
        // Last sender: closes the receive channel.
        drop(batch_tx);
        tracing::debug!("receivers stopped, draining consumers");

        for result in join_all(consumers).await {
            match result {
                Ok(stats) => report.add_consumer(stats),
                Err(e) => tracing::error!(error = %e, "consumer worker crashed"),
            }
        }
        // Last sender: closes the deletion channel.
        drop(delete_tx);
        tracing::debug!("consumers stopped, draining deletions");

        match deleter.await {
            Ok(stats) => report.add_deletion(stats),
            Err(e) => tracing::error!(error = %e, "deletion worker crashed"),
        }

        tracing::info!(
            messages_handled = report.messages_handled,
            messages_failed = report.messages_failed,
            batches_not_deleted = report.batches_not_deleted,
            "pipeline stopped"
        );

        report
    }
}
