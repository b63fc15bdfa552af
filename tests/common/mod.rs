#![allow(dead_code)]

use std::{
    collections::{HashSet, VecDeque},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use castor::{
    BoxError, Consumer, DeletionBatch, DeletionEntry, Message, QueueHandle, QueueResolver,
    QueueTransport, ReceiveBatch, ReceiveRequest, TransportError,
};

/// In-memory transport that replays a script of receive results, then
/// behaves like an empty queue whose long poll lasts `idle_poll`.
pub struct MockTransport {
    script: Mutex<VecDeque<Result<ReceiveBatch, TransportError>>>,
    idle_poll: Duration,
    failing_deletes: AtomicUsize,
    resolve_error: bool,
    pub receive_calls: AtomicUsize,
    pub deletes: Mutex<Vec<DeletionBatch>>,
    pub single_deletes: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new(script: Vec<Result<ReceiveBatch, TransportError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            idle_poll: Duration::from_millis(5),
            failing_deletes: AtomicUsize::new(0),
            resolve_error: false,
            receive_calls: AtomicUsize::new(0),
            deletes: Mutex::new(Vec::new()),
            single_deletes: Mutex::new(Vec::new()),
        }
    }

    pub fn with_batches(batches: Vec<ReceiveBatch>) -> Self {
        Self::new(batches.into_iter().map(Ok).collect())
    }

    /// Make empty polls last this long
    pub fn idle_poll(mut self, duration: Duration) -> Self {
        self.idle_poll = duration;
        self
    }

    /// Fail the first `count` batch deletes
    pub fn failing_deletes(self, count: usize) -> Self {
        self.failing_deletes.store(count, Ordering::SeqCst);
        self
    }

    pub fn unresolvable(mut self) -> Self {
        self.resolve_error = true;
        self
    }

    pub fn remaining_script(&self) -> usize {
        self.script.lock().unwrap().len()
    }

    pub fn delete_batches(&self) -> Vec<DeletionBatch> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn deleted_ids(&self) -> Vec<String> {
        self.delete_batches()
            .into_iter()
            .flatten()
            .map(|entry| entry.id)
            .collect()
    }
}

impl QueueResolver for MockTransport {
    async fn resolve_queue(&self, queue_name: &str) -> Result<QueueHandle, TransportError> {
        if self.resolve_error {
            return Err(TransportError::Service {
                operation: "get_queue_url",
                message: "AWS.SimpleQueueService.NonExistentQueue".to_string(),
            });
        }
        Ok(QueueHandle::new(queue_name, format!("mem://{queue_name}")))
    }
}

impl QueueTransport for MockTransport {
    async fn receive_batch(&self, _: &ReceiveRequest) -> Result<ReceiveBatch, TransportError> {
        self.receive_calls.fetch_add(1, Ordering::SeqCst);

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => {
                tokio::time::sleep(self.idle_poll).await;
                Ok(Vec::new())
            }
        }
    }

    async fn delete_message(
        &self,
        _: &QueueHandle,
        receipt_handle: &str,
    ) -> Result<(), TransportError> {
        self.single_deletes
            .lock()
            .unwrap()
            .push(receipt_handle.to_string());
        Ok(())
    }

    async fn delete_batch(
        &self,
        _: &QueueHandle,
        entries: &[DeletionEntry],
    ) -> Result<(), TransportError> {
        self.deletes.lock().unwrap().push(entries.to_vec());

        let fail = self
            .failing_deletes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(TransportError::Service {
                operation: "delete_message_batch",
                message: "throttled".to_string(),
            });
        }
        Ok(())
    }
}

/// Consumer that records every message it sees, rejects a fixed set of ids
/// and panics on another.
#[derive(Default)]
pub struct RecordingConsumer {
    reject: HashSet<String>,
    panic_on: HashSet<String>,
    delay: Duration,
    pub seen: Mutex<Vec<String>>,
}

impl RecordingConsumer {
    pub fn rejecting(ids: &[&str]) -> Self {
        Self {
            reject: ids.iter().map(|id| id.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn panicking(ids: &[&str]) -> Self {
        Self {
            panic_on: ids.iter().map(|id| id.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    pub fn seen_count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

impl Consumer for RecordingConsumer {
    async fn consume(&self, message: &Message) -> Result<(), BoxError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.seen.lock().unwrap().push(message.id.clone());

        if self.panic_on.contains(&message.id) {
            panic!("consumer blew up on {}", message.id);
        }
        if self.reject.contains(&message.id) {
            return Err(format!("rejected {}", message.id).into());
        }
        Ok(())
    }
}

/// Build a batch of messages with ids `m-{n}` for each `n` in `ids`
pub fn batch(ids: impl IntoIterator<Item = usize>) -> ReceiveBatch {
    ids.into_iter()
        .map(|n| Message::new(format!("m-{n}"), format!("rh-{n}"), format!("body {n}")))
        .collect()
}

/// Poll `condition` until it holds, failing the test after five seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;

    assert!(waited.is_ok(), "condition not reached within five seconds");
}
