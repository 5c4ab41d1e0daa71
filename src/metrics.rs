//! Counter names emitted by the engine.
//!
//! Every pathway decision that operators alarm on increments one of these.
//! Names are stable CamelCase strings so dashboards survive refactors.

use std::fmt;

use crate::types::InvestigationStatus;

/// A counter the engine can increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    // ─── Determinator ───
    /// No StatusRecord exists for the callback's normalized URL.
    NoStatusRecord,
    /// No ReviewRecord exists for (handle, sub-investigation type).
    NoReviewRecord,
    /// ReviewRecord found but it carries no resume token.
    NoResumeToken,
    /// Resume rejected because the token was consumed or expired.
    DuplicateResume,
    /// Verdict resume rejected because the token was consumed or expired.
    InvalidResumeToken,
    /// StatusRecord has no investigation handle to resume against.
    InvestigationHandleMissing,
    /// StatusRecord carries an `Unknown` status on the monitoring path.
    InvestigationStatusMissing,
    /// Monitoring signal ignored because a review is already in flight.
    MonitoringUnderReview(InvestigationStatus),
    /// Live status query against the orchestrator failed.
    WorkflowStatusError,
    /// No review workflow definition is configured.
    WorkflowNotAvailable,
    /// Starting a workflow failed; the transition was reverted.
    StartWorkflowError,
    /// Resuming a workflow failed with a dependency error.
    ResumeWorkflowError,
    SubmissionSucceeded,
    SubmissionFailed,
    VerdictSucceeded,
    VerdictFailed,
    DeboardSucceeded,
    /// Deboard requested for a URL with no StatusRecord.
    DeboardRecordNotFound,
    DeboardFailed,

    // ─── Governor ───
    /// Queue message body was not valid JSON.
    ParsingFailed,
    /// Queue message origin tag did not resolve to a handler.
    NotClassified,
    /// Payload did not deserialize into the origin's request type.
    RetryCountIncrementFailed,
    /// Message crossed the warning threshold but is still redelivered.
    RetryLowerLimitCrossed,
    /// Message exhausted its redelivery budget and was discarded.
    RetryUpperLimitCrossed,
    QueueSendFailed,
    QueueDeleteFailed,
    /// Redelivered signal failed validation and was parked for an operator.
    ValidationErrorParked,

    // ─── Notifier ───
    NotificationFailed,
}

impl Metric {
    /// Stable metric name.
    pub fn name(&self) -> String {
        let s = match self {
            Metric::NoStatusRecord => "VendorResponseNoEntryInStatusStore",
            Metric::NoReviewRecord => "VendorResponseNoEntryInReviewStore",
            Metric::NoResumeToken => "VendorResponseNoTaskToken",
            Metric::DuplicateResume => "VendorResponseResumeDuplicateRequest",
            Metric::InvalidResumeToken => "ManualResponseInvalidTaskToken",
            Metric::InvestigationHandleMissing => "VendorResponseInvestigationIdNull",
            Metric::InvestigationStatusMissing => "VendorResponseInvestigationStatusNull",
            Metric::MonitoringUnderReview(status) => {
                return format!("VendorResponseAutoMonitoringUrl{}", status.as_str());
            }
            Metric::WorkflowStatusError => "VendorResponseGetWorkflowStatusError",
            Metric::WorkflowNotAvailable => "UrlReviewWorkflowNotAvailable",
            Metric::StartWorkflowError => "InitiateUrlReviewWorkflowError",
            Metric::ResumeWorkflowError => "ResumeUrlReviewWorkflowError",
            Metric::SubmissionSucceeded => "ExecuteUrlReviewWorkflowSuccess",
            Metric::SubmissionFailed => "ExecuteUrlReviewWorkflowFailure",
            Metric::VerdictSucceeded => "ExecuteManualResponseWorkflowSuccess",
            Metric::VerdictFailed => "ExecuteManualResponseWorkflowFailure",
            Metric::DeboardSucceeded => "DeleteUrlSuccess",
            Metric::DeboardRecordNotFound => "DeleteUrlFailureEntryNotFound",
            Metric::DeboardFailed => "DeleteUrlFailure",
            Metric::ParsingFailed => "QueueEventParsingFailed",
            Metric::NotClassified => "QueueMessageNotClassified",
            Metric::RetryCountIncrementFailed => "QueueMessageRetryCountIncrementFailed",
            Metric::RetryLowerLimitCrossed => "QueueMessageRetryLowerLimitCrossed",
            Metric::RetryUpperLimitCrossed => "QueueMessageRetryUpperLimitCrossed",
            Metric::QueueSendFailed => "QueueMessageSendFailed",
            Metric::QueueDeleteFailed => "QueueMessageDeleteFailed",
            Metric::ValidationErrorParked => "QueueMessageValidationErrorParked",
            Metric::NotificationFailed => "UrlStatusNotificationFailed",
        };
        s.to_string()
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
