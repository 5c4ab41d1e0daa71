//! Outbound status-change notifications.
//!
//! Subscribers learn about a URL's review state from these events. Publication
//! is best effort: a failure is logged and metered but never changes the
//! outcome of the pathway that triggered it, because the persisted
//! StatusRecord (not the event) is the source of truth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ReconcileError, Result};
use crate::metrics::Metric;
use crate::ports::{MetricsSink, Notifier};
use crate::types::{ClientReferenceGroupId, InvestigationStatus, StatusRecord};

/// Which aspect of a URL changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateStatusType {
    ReviewStatus,
    ActiveStatus,
}

/// One outbound event, addressed to a single literal URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusNotification {
    pub client_reference_group_id: ClientReferenceGroupId,
    pub url: String,
    pub update_status_type: UpdateStatusType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_status: Option<InvestigationStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub url_review_time: DateTime<Utc>,
}

/// Builds review-status events for a record, one per literal URL the record
/// answers for.
///
/// # Errors
///
/// Returns `ReconcileError::Validation` for an `Unknown` status; subscribers
/// are never told a URL's state is unknown.
pub fn review_status_events(
    record: &StatusRecord,
    status: InvestigationStatus,
    at: DateTime<Utc>,
) -> Result<Vec<StatusNotification>> {
    if status == InvestigationStatus::Unknown {
        return Err(ReconcileError::validation(format!(
            "refusing to publish Unknown status for {}",
            record.url
        )));
    }

    Ok(record
        .notification_urls()
        .into_iter()
        .map(|url| StatusNotification {
            client_reference_group_id: record.client_reference_group_id.clone(),
            url,
            update_status_type: UpdateStatusType::ReviewStatus,
            review_status: Some(status),
            is_active: None,
            url_review_time: at,
        })
        .collect())
}

/// Builds an active-status event for one literal URL.
pub fn active_status_event(
    client: &ClientReferenceGroupId,
    url: &str,
    is_active: bool,
    at: DateTime<Utc>,
) -> StatusNotification {
    StatusNotification {
        client_reference_group_id: client.clone(),
        url: url.to_string(),
        update_status_type: UpdateStatusType::ActiveStatus,
        review_status: None,
        is_active: Some(is_active),
        url_review_time: at,
    }
}

/// Publishes notifications to one topic without ever failing the caller.
#[derive(Debug, Clone)]
pub struct NotificationEmitter<N, M> {
    notifier: N,
    metrics: M,
    topic: String,
}

impl<N: Notifier, M: MetricsSink> NotificationEmitter<N, M> {
    pub fn new(notifier: N, metrics: M, topic: impl Into<String>) -> Self {
        NotificationEmitter {
            notifier,
            metrics,
            topic: topic.into(),
        }
    }

    /// Publishes each event; failures are logged and metered.
    ///
    /// Returns the number of events published successfully.
    pub async fn emit(&self, events: &[StatusNotification]) -> usize {
        let mut published = 0;
        for event in events {
            match self.notifier.publish(&self.topic, event).await {
                Ok(()) => {
                    debug!(
                        topic = %self.topic,
                        client = %event.client_reference_group_id,
                        url = %event.url,
                        status = ?event.review_status,
                        "Published status notification"
                    );
                    published += 1;
                }
                Err(e) => {
                    warn!(
                        topic = %self.topic,
                        client = %event.client_reference_group_id,
                        url = %event.url,
                        error = %e,
                        "Failed to publish status notification"
                    );
                    self.metrics.incr(Metric::NotificationFailed);
                }
            }
        }
        published
    }

    /// Publishes the record's status under every URL it answers for.
    ///
    /// Only terminal verdicts and `In_Review` are meaningful to subscribers;
    /// an `Unknown` status is dropped with a warning.
    pub async fn review_status(
        &self,
        record: &StatusRecord,
        status: InvestigationStatus,
        at: DateTime<Utc>,
    ) -> usize {
        match review_status_events(record, status, at) {
            Ok(events) => self.emit(&events).await,
            Err(e) => {
                warn!(url = %record.url, error = %e, "Skipping status notification");
                0
            }
        }
    }
}
