//! This module contains the values that flow through the pipeline.

use std::collections::HashMap;

/// A single delivery received from the queue.
///
/// The `receipt_handle` identifies this delivery only. Queue backends reissue
/// handles on redelivery, so a handle from one receive must never be used to
/// acknowledge a later delivery of the same logical message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Opaque unique message id assigned by the backend
    pub id: String,
    /// Token required to delete this specific delivery
    pub receipt_handle: String,
    /// Raw payload
    pub body: String,
    /// String-valued message attributes, empty when none were sent
    pub attributes: HashMap<String, String>,
}

impl Message {
    /// Create a message without attributes
    pub fn new(
        id: impl Into<String>,
        receipt_handle: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            receipt_handle: receipt_handle.into(),
            body: body.into(),
            attributes: HashMap::new(),
        }
    }

    /// Attach an attribute (builder pattern)
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Look up a single attribute
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// The messages returned by one receive call, in the order the backend returned them.
pub type ReceiveBatch = Vec<Message>;

/// Identifies one delivery to acknowledge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionEntry {
    pub id: String,
    pub receipt_handle: String,
}

impl From<&Message> for DeletionEntry {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id.clone(),
            receipt_handle: message.receipt_handle.clone(),
        }
    }
}

/// Entries acknowledged together in one batched delete.
///
/// A batch never spans more than one receive batch, so its size is bounded by
/// the receive call's `max_messages_per_poll`.
pub type DeletionBatch = Vec<DeletionEntry>;
