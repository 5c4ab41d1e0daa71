//! At-least-once message queue with dead-letter redrive.

use std::future::Future;

use crate::error::DependencyError;
use crate::types::{AckHandle, OriginTag, QueueName};

/// A message as received, before its origin tag has been resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub body: String,
    pub ack: AckHandle,

    /// Raw origin attribute. Resolved into an [`OriginTag`] by the governor.
    pub origin: Option<String>,
}

/// A message to enqueue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub body: String,
    pub origin: OriginTag,
}

pub trait MessageQueue: Send + Sync {
    /// Receives up to `max` messages from `queue`. An empty batch means the
    /// queue is drained.
    fn receive(
        &self,
        queue: &QueueName,
        max: usize,
    ) -> impl Future<Output = Result<Vec<QueueMessage>, DependencyError>> + Send;

    fn send(
        &self,
        queue: &QueueName,
        message: OutboundMessage,
    ) -> impl Future<Output = Result<(), DependencyError>> + Send;

    fn delete(
        &self,
        queue: &QueueName,
        ack: &AckHandle,
    ) -> impl Future<Output = Result<(), DependencyError>> + Send;
}
