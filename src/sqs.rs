//! AWS SQS implementation of the transport traits.

use std::collections::HashMap;

use aws_config::{BehaviorVersion, Region};
use aws_sdk_sqs::types::DeleteMessageBatchRequestEntry;
use envconfig::Envconfig;

use crate::{
    error::TransportError,
    message::{DeletionEntry, Message, ReceiveBatch},
    transport::{MessageSender, QueueHandle, QueueResolver, QueueTransport, ReceiveRequest},
};

/// How to reach SQS.
///
/// With the `dev` profile (or no profile) requests go to `host`, which is
/// how local emulators are reached. Any other profile uses the regular AWS
/// endpoint for `region`.
#[derive(Envconfig, Clone, Debug)]
pub struct SqsClientConfig {
    #[envconfig(from = "CASTOR_SQS_PROFILE", default = "")]
    pub profile: String,
    #[envconfig(from = "CASTOR_SQS_HOST", default = "http://localhost:4566")]
    pub host: String,
    #[envconfig(from = "CASTOR_SQS_REGION", default = "us-east-1")]
    pub region: String,
}

impl SqsClientConfig {
    pub fn uses_custom_endpoint(&self) -> bool {
        (self.profile.is_empty() || self.profile == "dev") && !self.host.is_empty()
    }
}

/// Build an SQS client from the default AWS credential chain.
pub async fn connect(config: &SqsClientConfig) -> aws_sdk_sqs::Client {
    let mut loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));

    if config.uses_custom_endpoint() {
        tracing::debug!(host = %config.host, "using custom sqs endpoint");
        loader = loader.endpoint_url(&config.host);
    }

    aws_sdk_sqs::Client::new(&loader.load().await)
}

/// SQS transport, resolver and sender backed by one [`aws_sdk_sqs::Client`].
///
/// The client is cheap to clone and safe to share between workers.
#[derive(Clone, Debug)]
pub struct SqsTransport {
    inner: aws_sdk_sqs::Client,
}

impl SqsTransport {
    pub fn new(client: aws_sdk_sqs::Client) -> Self {
        Self { inner: client }
    }

    pub async fn from_config(config: &SqsClientConfig) -> Self {
        Self::new(connect(config).await)
    }
}

impl QueueResolver for SqsTransport {
    async fn resolve_queue(&self, queue_name: &str) -> Result<QueueHandle, TransportError> {
        let output = self
            .inner
            .get_queue_url()
            .queue_name(queue_name)
            .send()
            .await
            .map_err(|e| TransportError::service("get_queue_url", &e))?;

        let address = output.queue_url().ok_or_else(|| TransportError::Service {
            operation: "get_queue_url",
            message: "response did not include a queue url".to_string(),
        })?;

        Ok(QueueHandle::new(queue_name, address))
    }
}

impl QueueTransport for SqsTransport {
    async fn receive_batch(
        &self,
        request: &ReceiveRequest,
    ) -> Result<ReceiveBatch, TransportError> {
        let output = self
            .inner
            .receive_message()
            .queue_url(request.queue.address())
            .max_number_of_messages(request.max_messages)
            .visibility_timeout(request.visibility_timeout_seconds)
            .wait_time_seconds(request.wait_time_seconds)
            .message_attribute_names("All")
            .send()
            .await
            .map_err(|e| TransportError::service("receive_message", &e))?;

        Ok(output
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|message| match convert_message(message) {
                Ok(message) => Some(message),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping message");
                    None
                }
            })
            .collect())
    }

    async fn delete_message(
        &self,
        queue: &QueueHandle,
        receipt_handle: &str,
    ) -> Result<(), TransportError> {
        if receipt_handle.is_empty() {
            return Err(TransportError::InvalidMessage(
                "receipt handle is empty".to_string(),
            ));
        }

        self.inner
            .delete_message()
            .queue_url(queue.address())
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| TransportError::service("delete_message", &e))?;

        Ok(())
    }

    async fn delete_batch(
        &self,
        queue: &QueueHandle,
        entries: &[DeletionEntry],
    ) -> Result<(), TransportError> {
        let entries = entries
            .iter()
            .map(|entry| {
                DeleteMessageBatchRequestEntry::builder()
                    .id(&entry.id)
                    .receipt_handle(&entry.receipt_handle)
                    .build()
                    .map_err(|e| TransportError::InvalidMessage(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let output = self
            .inner
            .delete_message_batch()
            .queue_url(queue.address())
            .set_entries(Some(entries))
            .send()
            .await
            .map_err(|e| TransportError::service("delete_message_batch", &e))?;

        let failed = output.failed();
        if !failed.is_empty() {
            return Err(TransportError::PartialBatchFailure {
                failed: failed.iter().map(|entry| entry.id().to_string()).collect(),
            });
        }

        Ok(())
    }
}

impl MessageSender for SqsTransport {
    async fn send_message(&self, queue: &QueueHandle, body: String) -> Result<(), TransportError> {
        self.inner
            .send_message()
            .queue_url(queue.address())
            .message_body(body)
            .send()
            .await
            .map_err(|e| TransportError::service("send_message", &e))?;

        Ok(())
    }
}

fn convert_message(message: aws_sdk_sqs::types::Message) -> Result<Message, TransportError> {
    let id = message
        .message_id
        .ok_or_else(|| TransportError::InvalidMessage("message id is missing".to_string()))?;
    let receipt_handle = message.receipt_handle.ok_or_else(|| {
        TransportError::InvalidMessage(format!("message {id} has no receipt handle"))
    })?;

    let attributes: HashMap<String, String> = message
        .message_attributes
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(key, value)| value.string_value.map(|value| (key, value)))
        .collect();

    Ok(Message {
        id,
        receipt_handle,
        body: message.body.unwrap_or_default(),
        attributes,
    })
}
