//! Workflow determinator.
//!
//! For every inbound signal about a URL, decides whether to start a review
//! workflow, resume a suspended one, escalate (appeal), or do nothing, and
//! keeps the StatusRecord consistent with that decision.
//!
//! # Decision Precedence
//!
//! ```text
//! vendor item not reported ───────────────────────────────► NO-OP
//! no StatusRecord ──── monitoring ────────────────────────► NO-OP (no entry)
//!                 └─── submission ─ create IN_REVIEW ─────► START
//! record inactive ────────────────────────────────────────► NO-OP
//! monitoring ── under review / run RUNNING ───────────────► NO-OP
//!            └─ COMPLIANT ──► COMPLIANT_TO_IN_REVIEW (CAS) ► START
//! other scan ── ReviewRecord with token ──────────────────► RESUME
//! verdict ──── case unmatched, record concluded ──────────► ESCALATE
//! deboard ──── active record ── vendor, soft delete ──────► DEBOARDED
//! ```
//!
//! # Concurrency
//!
//! Handlers hold no in-process state. Every state change is a conditional
//! write; losing one surfaces as [`ReconcileError::StaleSignal`] and settles
//! as a no-op. A START that fails after a speculative transition reverts the
//! transition before the signal is forwarded to the error queue.

mod callback;
mod deboard;
mod monitoring;
mod resume;
pub mod signal;
mod submission;
mod verdict;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::config::Config;
use crate::dedupe::DedupEngine;
use crate::error::{ReconcileError, Result, StaleReason};
use crate::metrics::Metric;
use crate::notify::NotificationEmitter;
use crate::ports::{
    Collaborators, KeyedStore, MessageQueue, MetricsSink, OutboundMessage, ScanSpec,
    WorkflowOrchestrator,
};
use crate::types::{
    CaseId, ClientReferenceGroupId, InvestigationHandle, InvestigationStatus, InvestigationType,
    QueueName, StatusRecord,
};

pub use signal::{DeboardRequest, Signal, SubmissionRequest, VendorScanBatch, VerdictRequest};

/// Why a signal was deliberately not acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoOpReason {
    /// The vendor found the URL itself; we never submitted it.
    UnreportedUrl,
    NoStatusRecord,
    Inactive,
    StatusUnknown,
    UnderReview,
    WorkflowRunning,
    NoInvestigationHandle,
    NoReviewRecord,
    NoResumeToken,
    /// A submission for a URL that already has a live record.
    AlreadyKnown,
    /// An appeal for a URL that is not in a concluded state.
    NotAppealable,
    WorkflowNotAvailable,
    ConditionalWriteLost,
    ResumeTokenInvalid,
}

impl From<StaleReason> for NoOpReason {
    fn from(reason: StaleReason) -> Self {
        match reason {
            StaleReason::ConditionalWriteLost => NoOpReason::ConditionalWriteLost,
            StaleReason::ResumeTokenInvalid => NoOpReason::ResumeTokenInvalid,
        }
    }
}

/// What the determinator did with one URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Start { handle: InvestigationHandle },
    Resume,
    /// An appeal reopened a concluded review.
    Escalate { handle: InvestigationHandle },
    /// The URL was soft-deleted.
    Deboarded,
    NoOp { reason: NoOpReason },
    /// A transient failure; the signal went to the error queue.
    Forwarded { error: String },
    /// A permanent failure; the signal was dropped.
    Rejected { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub url: String,
    #[serde(flatten)]
    pub decision: Decision,
}

impl Outcome {
    pub fn new(url: impl Into<String>, decision: Decision) -> Self {
        Outcome {
            url: url.into(),
            decision,
        }
    }

    pub fn no_op(url: impl Into<String>, reason: NoOpReason) -> Self {
        Outcome::new(url, Decision::NoOp { reason })
    }

    pub fn is_forwarded(&self) -> bool {
        matches!(self.decision, Decision::Forwarded { .. })
    }

    /// True for START, RESUME, and ESCALATE.
    pub fn is_action(&self) -> bool {
        matches!(
            self.decision,
            Decision::Start { .. } | Decision::Resume | Decision::Escalate { .. }
        )
    }
}

/// Input handed to a newly started review workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowInput {
    pub client_reference_group_id: ClientReferenceGroupId,

    #[serde(rename = "reviewURL")]
    pub review_url: String,

    pub investigation_type: InvestigationType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_custom_information: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_spec: Option<ScanSpec>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_id: Option<CaseId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_info: Option<String>,
}

impl WorkflowInput {
    pub fn new(record: &StatusRecord, investigation_type: InvestigationType) -> Self {
        WorkflowInput {
            client_reference_group_id: record.client_reference_group_id.clone(),
            review_url: record.url.clone(),
            investigation_type,
            client_custom_information: record.client_info.clone(),
            url_type: record.url_type.clone(),
            source: record.url_source.clone(),
            scan_spec: None,
            case_id: None,
            review_info: None,
        }
    }
}

pub struct Determinator<P: Collaborators> {
    ports: P,
    config: Arc<Config>,
    dedup: DedupEngine<P::Statuses>,
    emitter: NotificationEmitter<P::Notifier, P::Metrics>,
}

impl<P: Collaborators> Determinator<P> {
    pub fn new(ports: P, config: Arc<Config>) -> Self {
        let dedup = DedupEngine::new(ports.statuses().clone());
        let emitter = NotificationEmitter::new(
            ports.notifier().clone(),
            ports.metrics().clone(),
            config.notification_topic.clone(),
        );
        Determinator {
            ports,
            config,
            dedup,
            emitter,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Decides and acts on one signal.
    ///
    /// Returns one outcome per URL the signal concerns. Transient failures
    /// are forwarded to the error queue and reported as
    /// [`Decision::Forwarded`] rather than returned as errors.
    ///
    /// # Errors
    ///
    /// `ReconcileError::Validation` if the signal itself is malformed.
    #[instrument(skip(self, signal), fields(origin = %signal.origin(), retry_count = signal.retry_count()))]
    pub async fn handle(&self, signal: Signal) -> Result<Vec<Outcome>> {
        match signal {
            Signal::Submission(request) => self.submission(request).await,
            Signal::VendorCallback(batch) => Ok(self.vendor_callback(batch).await),
            Signal::Verdict(request) => self.verdict(request).await.map(|o| vec![o]),
            Signal::Deboard(request) => self.deboard(request).await.map(|o| vec![o]),
        }
    }

    /// Parks a signal that failed validation on the validation error queue,
    /// where it waits for an operator instead of being redelivered.
    pub async fn park_invalid(&self, signal: &Signal, error: &ReconcileError) {
        warn!(origin = %signal.origin(), error = %error, "Parking invalid signal");
        self.incr(Metric::ValidationErrorParked);
        self.send_to(&self.config.validation_error_queue, signal).await;
    }

    fn incr(&self, metric: Metric) {
        self.ports.metrics().incr(metric);
    }

    /// Starts the review workflow.
    ///
    /// Returns `None` when no workflow definition is configured.
    async fn start_workflow(&self, input: &WorkflowInput) -> Result<Option<InvestigationHandle>> {
        let Some(definition) = &self.config.workflow_definition else {
            warn!(url = %input.review_url, "Review workflow not configured, not starting");
            self.incr(Metric::WorkflowNotAvailable);
            return Ok(None);
        };

        let payload = serde_json::to_value(input).map_err(|e| {
            ReconcileError::validation(format!("unserializable workflow input: {e}"))
        })?;

        match self.ports.orchestrator().start(definition, payload).await {
            Ok(handle) => {
                info!(
                    handle = %handle,
                    client = %input.client_reference_group_id,
                    url = %input.review_url,
                    investigation_type = ?input.investigation_type,
                    "[STARTED_NEW_WORKFLOW] Started review workflow"
                );
                Ok(Some(handle))
            }
            Err(e) => {
                error!(url = %input.review_url, error = %e, "Failed to start review workflow");
                self.incr(Metric::StartWorkflowError);
                Err(e.into())
            }
        }
    }

    /// Conditionally moves a record to a new state.
    ///
    /// # Errors
    ///
    /// `StaleSignal` if the stored status is no longer `expected`.
    async fn transition(&self, record: StatusRecord, expected: InvestigationStatus) -> Result<()> {
        let url = record.url.clone();
        if self.ports.statuses().put_if_matches(record, expected).await? {
            Ok(())
        } else {
            info!(url = %url, expected = %expected, "Record already moved by another writer");
            Err(ReconcileError::StaleSignal(StaleReason::ConditionalWriteLost))
        }
    }

    /// Undoes a speculative transition. Failures are logged; the caller is
    /// already on an error path.
    async fn revert(&self, prior: StatusRecord, current: InvestigationStatus) {
        let url = prior.url.clone();
        let restored = prior.investigation_status;
        match self.ports.statuses().put_if_matches(prior, current).await {
            Ok(true) => info!(url = %url, status = %restored, "Reverted status"),
            Ok(false) => warn!(url = %url, "Record moved before revert, leaving it"),
            Err(e) => error!(url = %url, error = %e, "Failed to revert status"),
        }
    }

    /// Records the handle of a newly started run on the record.
    async fn persist_handle(&self, record: &StatusRecord, handle: &InvestigationHandle) {
        let updated = StatusRecord {
            case_creation_time: Some(chrono::Utc::now()),
            ..record.clone().with_handle(handle.clone())
        };
        match self
            .ports
            .statuses()
            .put_if_matches(updated, record.investigation_status)
            .await
        {
            Ok(true) => {}
            Ok(false) => warn!(url = %record.url, handle = %handle, "Record moved before handle was saved"),
            Err(e) => error!(url = %record.url, handle = %handle, error = %e, "Failed to save handle"),
        }
    }

    /// Sends a signal to the error queue for bounded redelivery.
    async fn forward(&self, signal: Signal) {
        self.send_to(&self.config.error_queue, &signal).await;
    }

    async fn send_to(&self, queue: &QueueName, signal: &Signal) {
        let origin = signal.origin();
        let body = match signal.to_body() {
            Ok(body) => body,
            Err(e) => {
                error!(origin = %origin, error = %e, "Unserializable signal, dropping");
                self.incr(Metric::QueueSendFailed);
                return;
            }
        };
        let message = OutboundMessage { body, origin };
        match self.ports.queue().send(queue, message).await {
            Ok(()) => info!(origin = %origin, queue = %queue, "Sent signal to queue"),
            Err(e) => {
                error!(origin = %origin, queue = %queue, error = %e, "Failed to send signal to queue");
                self.incr(Metric::QueueSendFailed);
            }
        }
    }

    /// Turns a pathway result into an outcome. Does not forward.
    fn settle(&self, url: &str, result: Result<Outcome>) -> Outcome {
        match result {
            Ok(outcome) => outcome,
            Err(ReconcileError::StaleSignal(reason)) => Outcome::no_op(url, reason.into()),
            Err(e) if e.is_retriable() => {
                warn!(url = %url, error = %e, "Transient failure, deferring");
                Outcome::new(url, Decision::Forwarded { error: e.to_string() })
            }
            Err(e) => {
                error!(url = %url, error = %e, "Dropping signal");
                Outcome::new(url, Decision::Rejected { error: e.to_string() })
            }
        }
    }
}
