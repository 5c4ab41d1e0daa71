//! In-memory at-least-once queue.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::error::{Dependency, DependencyError};
use crate::ports::{MessageQueue, OutboundMessage, QueueMessage};
use crate::types::{AckHandle, QueueName};

use super::{lock, take_failure};

/// Named FIFO queues with receive/delete semantics.
///
/// A received message moves to an in-flight set until it is deleted. Messages
/// never deleted can be put back with
/// [`redeliver_unacked`](Self::redeliver_unacked), which models a visibility
/// timeout expiring.
#[derive(Clone, Default)]
pub struct MemoryQueue {
    inner: Arc<QueueInner>,
}

#[derive(Default)]
struct QueueInner {
    state: Mutex<QueueState>,
    fail_send: Mutex<u32>,
    fail_delete: Mutex<u32>,
}

#[derive(Default)]
struct QueueState {
    next_ack: u64,
    ready: HashMap<QueueName, VecDeque<QueueMessage>>,
    in_flight: HashMap<QueueName, BTreeMap<AckHandle, QueueMessage>>,
    sent: HashMap<QueueName, Vec<OutboundMessage>>,
}

impl QueueState {
    fn enqueue(&mut self, queue: &QueueName, body: String, origin: Option<String>) {
        self.next_ack += 1;
        let message = QueueMessage {
            body,
            ack: AckHandle::new(format!("{queue}#{}", self.next_ack)),
            origin,
        };
        self.ready.entry(queue.clone()).or_default().push_back(message);
    }
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a raw message with an arbitrary (possibly invalid) origin.
    pub fn push_raw(&self, queue: &QueueName, body: impl Into<String>, origin: Option<&str>) {
        lock(&self.inner.state).enqueue(queue, body.into(), origin.map(str::to_string));
    }

    /// Moves every in-flight message back to the front of its queue.
    pub fn redeliver_unacked(&self) {
        let mut state = lock(&self.inner.state);
        let in_flight = std::mem::take(&mut state.in_flight);
        for (queue, messages) in in_flight {
            let ready = state.ready.entry(queue).or_default();
            for message in messages.into_values().rev() {
                ready.push_front(message);
            }
        }
    }

    pub fn fail_send_next(&self, n: u32) {
        *lock(&self.inner.fail_send) = n;
    }

    pub fn fail_delete_next(&self, n: u32) {
        *lock(&self.inner.fail_delete) = n;
    }

    /// Messages waiting to be received.
    pub fn len(&self, queue: &QueueName) -> usize {
        lock(&self.inner.state)
            .ready
            .get(queue)
            .map_or(0, VecDeque::len)
    }

    /// Messages received but not yet deleted.
    pub fn in_flight(&self, queue: &QueueName) -> usize {
        lock(&self.inner.state)
            .in_flight
            .get(queue)
            .map_or(0, BTreeMap::len)
    }

    /// Everything ever sent to `queue` through [`MessageQueue::send`].
    pub fn sent(&self, queue: &QueueName) -> Vec<OutboundMessage> {
        lock(&self.inner.state)
            .sent
            .get(queue)
            .cloned()
            .unwrap_or_default()
    }
}

impl MessageQueue for MemoryQueue {
    async fn receive(
        &self,
        queue: &QueueName,
        max: usize,
    ) -> Result<Vec<QueueMessage>, DependencyError> {
        let mut state = lock(&self.inner.state);
        let mut batch = Vec::new();
        while batch.len() < max {
            let Some(message) = state.ready.get_mut(queue).and_then(VecDeque::pop_front) else {
                break;
            };
            state
                .in_flight
                .entry(queue.clone())
                .or_default()
                .insert(message.ack.clone(), message.clone());
            batch.push(message);
        }
        Ok(batch)
    }

    async fn send(&self, queue: &QueueName, message: OutboundMessage) -> Result<(), DependencyError> {
        if take_failure(&self.inner.fail_send) {
            return Err(DependencyError::retryable(
                Dependency::Queue,
                format!("injected send failure on {queue}"),
            ));
        }
        let mut state = lock(&self.inner.state);
        state
            .sent
            .entry(queue.clone())
            .or_default()
            .push(message.clone());
        state.enqueue(queue, message.body, Some(message.origin.as_str().to_string()));
        Ok(())
    }

    async fn delete(&self, queue: &QueueName, ack: &AckHandle) -> Result<(), DependencyError> {
        if take_failure(&self.inner.fail_delete) {
            return Err(DependencyError::retryable(
                Dependency::Queue,
                format!("injected delete failure on {queue}"),
            ));
        }
        // Deleting an unknown handle is a no-op, as with real queues
        if let Some(in_flight) = lock(&self.inner.state).in_flight.get_mut(queue) {
            in_flight.remove(ack);
        }
        Ok(())
    }
}
