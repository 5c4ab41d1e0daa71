//! Retry / redelivery governor.
//!
//! Signals that failed transiently are parked on the error queue (and, after
//! the queue's own redrive policy gives up, the dead-letter queue). The
//! governor polls both, bumps the retry count carried in each payload, and
//! hands the signal back to its handler until the retry budget runs out.
//!
//! # Per-Message Flow
//!
//! ```text
//! body ── not JSON ───────────────────────► delete  (ParsingFailed)
//!   │
//! origin attribute ── missing / unknown ──► delete  (NotClassified)
//!   │
//! payload ── wrong shape for origin ──────► delete  (RetryCountIncrementFailed)
//!   │
//! retry_count + 1 ── > upper ─────────────► delete  (RetryUpperLimitCrossed)
//!   │              └ > lower ── warn ──┐
//!   ▼                                  ▼
//! dispatch ── refused ────────────────────► keep    (queue redelivers it)
//!   │
//!   ▼
//! delete
//! ```
//!
//! The source message is deleted only after dispatch, so a crash in between
//! produces one duplicate dispatch, never a lost signal.
//!
//! Each poll receives at most one batch per queue. A signal that fails again
//! is forwarded back to the error queue and waits for the next tick, so the
//! poll interval paces the retry budget.

mod limits;
mod redrive;

use std::sync::Arc;

use futures::future::join_all;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::Config;
use crate::determinator::Signal;
use crate::metrics::Metric;
use crate::ports::{MessageQueue, MetricsSink, QueueMessage};
use crate::types::{OriginTag, QueueName};

pub use limits::{RetryLimits, RetryVerdict};
pub use redrive::{RedriveError, RedriveTarget, serve_redrives};

/// Why a message was removed without being redelivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    Unparseable,
    Unclassified,
    MalformedPayload,
    RetriesExhausted,
}

impl DiscardReason {
    fn metric(&self) -> Metric {
        match self {
            DiscardReason::Unparseable => Metric::ParsingFailed,
            DiscardReason::Unclassified => Metric::NotClassified,
            DiscardReason::MalformedPayload => Metric::RetryCountIncrementFailed,
            DiscardReason::RetriesExhausted => Metric::RetryUpperLimitCrossed,
        }
    }
}

/// What happened to one queued message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Redelivered { retry_count: u64 },
    Discarded(DiscardReason),
    /// Dispatch was refused; the message stays on the queue.
    Kept,
}

/// Tally of one poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub redelivered: usize,
    pub discarded: usize,
    pub kept: usize,
}

impl PollSummary {
    fn record(&mut self, disposition: Disposition) {
        match disposition {
            Disposition::Redelivered { .. } => self.redelivered += 1,
            Disposition::Discarded(_) => self.discarded += 1,
            Disposition::Kept => self.kept += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.redelivered + self.discarded + self.kept
    }
}

pub struct Governor<Q, M, T> {
    queue: Q,
    metrics: M,
    target: T,
    config: Arc<Config>,
}

impl<Q: MessageQueue, M: MetricsSink, T: RedriveTarget> Governor<Q, M, T> {
    pub fn new(queue: Q, metrics: M, target: T, config: Arc<Config>) -> Self {
        Governor {
            queue,
            metrics,
            target,
            config,
        }
    }

    /// Polls every redrive queue on the configured interval until shutdown.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.config.poll_interval.as_secs(),
            "Redrive governor started"
        );
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received, stopping governor");
                    break;
                }

                _ = ticker.tick() => {
                    let summary = self.poll_once().await;
                    if summary.total() > 0 {
                        info!(
                            redelivered = summary.redelivered,
                            discarded = summary.discarded,
                            kept = summary.kept,
                            "Redrive poll complete"
                        );
                    }
                }
            }
        }
    }

    /// Receives and processes one batch from each redrive queue.
    #[instrument(skip(self))]
    pub async fn poll_once(&self) -> PollSummary {
        let mut summary = PollSummary::default();
        for queue in self.config.redrive_queues() {
            let batch = match self.queue.receive(queue, self.config.poll_batch_size).await {
                Ok(batch) => batch,
                Err(e) => {
                    error!(queue = %queue, error = %e, "Failed to receive from redrive queue");
                    continue;
                }
            };
            for disposition in self.process_batch(queue, batch).await {
                summary.record(disposition);
            }
        }
        summary
    }

    /// Processes one received batch. Messages are independent and run in
    /// parallel; dispositions come back in batch order.
    #[instrument(skip(self, messages), fields(queue = %queue, count = messages.len()))]
    pub async fn process_batch(&self, queue: &QueueName, messages: Vec<QueueMessage>) -> Vec<Disposition> {
        join_all(messages.iter().map(|m| self.process_message(queue, m))).await
    }

    async fn process_message(&self, queue: &QueueName, message: &QueueMessage) -> Disposition {
        let signal = match self.classify(message) {
            Ok(signal) => signal,
            Err(reason) => return self.discard(queue, message, reason).await,
        };

        let verdict = self.config.retry_limits.evaluate(signal.retry_count());
        let retry_count = verdict.retry_count();
        if !verdict.should_redeliver() {
            error!(
                origin = %signal.origin(),
                retry_count,
                "Retry budget exhausted, dropping signal"
            );
            return self.discard(queue, message, DiscardReason::RetriesExhausted).await;
        }
        if let Some(metric) = verdict.metric() {
            warn!(origin = %signal.origin(), retry_count, "Signal still failing after many retries");
            self.metrics.incr(metric);
        }

        let origin = signal.origin();
        if let Err(e) = self.target.dispatch(signal.with_retry_count(retry_count)) {
            error!(origin = %origin, ack = %message.ack, error = %e, "Redelivery refused, leaving message on queue");
            return Disposition::Kept;
        }
        debug!(origin = %origin, retry_count, "Redelivered signal");

        self.delete(queue, message).await;
        Disposition::Redelivered { retry_count }
    }

    fn classify(&self, message: &QueueMessage) -> Result<Signal, DiscardReason> {
        let payload: serde_json::Value = serde_json::from_str(&message.body).map_err(|e| {
            error!(ack = %message.ack, error = %e, "Queued message is not JSON");
            DiscardReason::Unparseable
        })?;

        let origin: OriginTag = message
            .origin
            .as_deref()
            .ok_or_else(|| {
                warn!(ack = %message.ack, "Queued message has no origin");
                DiscardReason::Unclassified
            })?
            .parse()
            .map_err(|e| {
                warn!(ack = %message.ack, error = %e, "Queued message has unknown origin");
                DiscardReason::Unclassified
            })?;

        Signal::from_payload(origin, payload).map_err(|e| {
            error!(ack = %message.ack, origin = %origin, error = %e, "Payload does not match its origin");
            DiscardReason::MalformedPayload
        })
    }

    async fn discard(&self, queue: &QueueName, message: &QueueMessage, reason: DiscardReason) -> Disposition {
        self.metrics.incr(reason.metric());
        self.delete(queue, message).await;
        Disposition::Discarded(reason)
    }

    async fn delete(&self, queue: &QueueName, message: &QueueMessage) {
        if let Err(e) = self.queue.delete(queue, &message.ack).await {
            error!(queue = %queue, ack = %message.ack, error = %e, "Failed to delete queued message");
            self.metrics.incr(Metric::QueueDeleteFailed);
        }
    }
}
