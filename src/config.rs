//! This module contains the configuration for the pipeline

use std::{str::FromStr, time::Duration};

use envconfig::Envconfig;

use crate::{error::PipelineError, transport::QueueHandle, transport::ReceiveRequest};

/// Configuration for the pipeline
///
/// Read-only once the pipeline has been built. Can be loaded from `CASTOR_*`
/// environment variables with [`Envconfig::init_from_env`] or built in code
/// from [`Default`] and the builder setters.
#[derive(Envconfig, Clone, Debug)]
pub struct PipelineConfig {
    /// Number of receiver/consumer worker pairs
    ///
    /// Zero is treated as one.
    /// Default: 1
    #[envconfig(from = "CASTOR_CONCURRENT_WORKERS", default = "1")]
    pub concurrent_workers: usize,
    /// Per-worker channel capacity multiplier
    ///
    /// Both channels hold `concurrent_workers * channel_buffer` batches, with a
    /// minimum of one.
    /// Default: 0
    #[envconfig(from = "CASTOR_CHANNEL_BUFFER", default = "0")]
    pub channel_buffer: usize,
    /// Maximum messages returned by one receive call
    /// Default: 1
    #[envconfig(from = "CASTOR_MAX_MESSAGES_PER_POLL", default = "1")]
    pub max_messages_per_poll: i32,
    /// Default: 60
    #[envconfig(from = "CASTOR_VISIBILITY_TIMEOUT_SECONDS", default = "60")]
    pub visibility_timeout_seconds: i32,
    /// Long-poll wait for each receive call
    ///
    /// With zero, an empty queue is polled again as soon as each receive
    /// returns. Set it (SQS allows up to 20) for anything but short-lived
    /// consumers.
    /// Default: 0
    #[envconfig(from = "CASTOR_WAIT_TIME_SECONDS", default = "0")]
    pub wait_time_seconds: i32,
    #[envconfig(from = "CASTOR_QUEUE_NAME")]
    pub queue_name: String,
    /// Delay after a failed receive, applied only when `wait_time_seconds` is
    /// zero. A zero delay disables it.
    /// Default: 1000 ms
    #[envconfig(from = "CASTOR_RECEIVE_ERROR_BACKOFF_MS", default = "1000")]
    pub receive_error_backoff: EnvMsDuration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrent_workers: 1,
            channel_buffer: 0,
            max_messages_per_poll: 1,
            visibility_timeout_seconds: 60,
            wait_time_seconds: 0,
            queue_name: String::new(),
            receive_error_backoff: EnvMsDuration(Duration::from_secs(1)),
        }
    }
}

impl PipelineConfig {
    /// Create a default configuration for the named queue
    pub fn for_queue(queue_name: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
            ..Default::default()
        }
    }

    /// Set the number of receiver/consumer pairs (builder pattern)
    pub fn with_concurrent_workers(mut self, count: usize) -> Self {
        self.concurrent_workers = count;
        self
    }

    /// Set the channel buffer multiplier (builder pattern)
    pub fn with_channel_buffer(mut self, buffer: usize) -> Self {
        self.channel_buffer = buffer;
        self
    }

    /// Set the maximum messages per receive call (builder pattern)
    pub fn with_max_messages_per_poll(mut self, max: i32) -> Self {
        self.max_messages_per_poll = max;
        self
    }

    /// Set the visibility timeout (builder pattern)
    pub fn with_visibility_timeout_seconds(mut self, seconds: i32) -> Self {
        self.visibility_timeout_seconds = seconds;
        self
    }

    /// Set the long-poll wait (builder pattern)
    pub fn with_wait_time_seconds(mut self, seconds: i32) -> Self {
        self.wait_time_seconds = seconds;
        self
    }

    /// Set the delay after failed receives (builder pattern)
    pub fn with_receive_error_backoff(mut self, delay: Duration) -> Self {
        self.receive_error_backoff = EnvMsDuration(delay);
        self
    }

    /// Number of receiver/consumer pairs to spawn
    pub fn worker_count(&self) -> usize {
        self.concurrent_workers.max(1)
    }

    /// Capacity of the receive and deletion channels
    pub fn channel_capacity(&self) -> usize {
        self.worker_count()
            .saturating_mul(self.channel_buffer)
            .max(1)
    }

    /// Delay to apply after a failed receive, if any
    pub fn error_backoff(&self) -> Option<Duration> {
        let delay = self.receive_error_backoff.0;
        (self.wait_time_seconds == 0 && !delay.is_zero()).then_some(delay)
    }

    pub(crate) fn validate(&self) -> Result<(), PipelineError> {
        if self.queue_name.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "queue name must not be empty".to_string(),
            ));
        }
        if self.max_messages_per_poll < 1 {
            return Err(PipelineError::InvalidConfig(format!(
                "max messages per poll must be at least 1, got {}",
                self.max_messages_per_poll
            )));
        }
        if self.wait_time_seconds < 0 || self.visibility_timeout_seconds < 0 {
            return Err(PipelineError::InvalidConfig(
                "timeouts must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn receive_request(&self, queue: QueueHandle) -> ReceiveRequest {
        ReceiveRequest {
            queue,
            max_messages: self.max_messages_per_poll,
            visibility_timeout_seconds: self.visibility_timeout_seconds,
            wait_time_seconds: self.wait_time_seconds,
        }
    }
}

/// Duration parsed from a number of milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvMsDuration(pub Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvMsDurationError;

impl std::fmt::Display for ParseEnvMsDurationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "expected a duration in milliseconds")
    }
}

impl std::error::Error for ParseEnvMsDurationError {}

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<u64>().map_err(|_| ParseEnvMsDurationError)?;

        Ok(EnvMsDuration(Duration::from_millis(ms)))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn zero_workers_means_one() {
        let config = PipelineConfig::for_queue("jobs").with_concurrent_workers(0);

        assert_eq!(config.worker_count(), 1);
    }

    #[test]
    fn channel_capacity_is_workers_times_buffer() {
        let config = PipelineConfig::for_queue("jobs")
            .with_concurrent_workers(3)
            .with_channel_buffer(4);

        assert_eq!(config.channel_capacity(), 12);
    }

    #[test]
    fn zero_buffer_still_yields_a_usable_channel() {
        let config = PipelineConfig::for_queue("jobs").with_concurrent_workers(5);

        assert_eq!(config.channel_capacity(), 1);
    }

    #[test]
    fn backoff_only_without_long_poll() {
        let short = PipelineConfig::for_queue("jobs");
        assert_eq!(short.error_backoff(), Some(Duration::from_secs(1)));

        let long_poll = PipelineConfig::for_queue("jobs").with_wait_time_seconds(20);
        assert_eq!(long_poll.error_backoff(), None);

        let disabled = PipelineConfig::for_queue("jobs").with_receive_error_backoff(Duration::ZERO);
        assert_eq!(disabled.error_backoff(), None);
    }

    #[test]
    fn validation_rejects_empty_queue_and_zero_batch() {
        assert!(matches!(
            PipelineConfig::default().validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
        assert!(matches!(
            PipelineConfig::for_queue("jobs")
                .with_max_messages_per_poll(0)
                .validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
        assert!(PipelineConfig::for_queue("jobs").validate().is_ok());
    }

    #[test]
    fn loads_from_env_map_with_defaults() {
        let env = HashMap::from([
            ("CASTOR_QUEUE_NAME".to_string(), "orders".to_string()),
            ("CASTOR_CONCURRENT_WORKERS".to_string(), "4".to_string()),
            ("CASTOR_RECEIVE_ERROR_BACKOFF_MS".to_string(), "250".to_string()),
        ]);

        let config = PipelineConfig::init_from_hashmap(&env).unwrap();

        assert_eq!(config.queue_name, "orders");
        assert_eq!(config.concurrent_workers, 4);
        assert_eq!(config.channel_buffer, 0);
        assert_eq!(config.visibility_timeout_seconds, 60);
        assert_eq!(config.receive_error_backoff.0, Duration::from_millis(250));
    }

    #[test]
    fn queue_name_is_required_in_env() {
        assert!(PipelineConfig::init_from_hashmap(&HashMap::new()).is_err());
    }

    #[test]
    fn receive_request_uses_config_values() {
        let config = PipelineConfig::for_queue("jobs")
            .with_max_messages_per_poll(10)
            .with_wait_time_seconds(20)
            .with_visibility_timeout_seconds(30);
        let queue = QueueHandle::new("jobs", "https://example.com/jobs");

        let request = config.receive_request(queue.clone());

        assert_eq!(request.queue, queue);
        assert_eq!(request.max_messages, 10);
        assert_eq!(request.wait_time_seconds, 20);
        assert_eq!(request.visibility_timeout_seconds, 30);
    }
}
