//! Submission pathway: a merchant asks for URLs to be reviewed.

use std::collections::BTreeSet;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, info, instrument};

use super::{Decision, Determinator, NoOpReason, Outcome, Signal, SubmissionRequest, WorkflowInput};
use crate::canon::{canonicalize, lowercase_literal};
use crate::error::{ReconcileError, Result, StaleReason};
use crate::metrics::Metric;
use crate::notify::active_status_event;
use crate::ports::{Collaborators, KeyedStore};
use crate::types::{InvestigationStatus, InvestigationType, StatusKey, StatusRecord};

impl<P: Collaborators> Determinator<P> {
    /// Handles every URL of a submission in parallel, then forwards the URLs
    /// that failed transiently as one redrive message.
    #[instrument(skip(self, request), fields(client = %request.client_reference_group_id))]
    pub(super) async fn submission(&self, request: SubmissionRequest) -> Result<Vec<Outcome>> {
        if request.client_reference_group_id.as_str().trim().is_empty() {
            return Err(ReconcileError::validation("submission without client id"));
        }
        if request.urls().next().is_none() {
            return Err(ReconcileError::validation("submission without urls"));
        }

        let req = &request;
        let pending = req.urls().map(|(url_type, url)| async move {
            let result = self.submit_url(req, url_type, url).await;
            let outcome = self.settle(url, result);
            if outcome.is_action() || matches!(outcome.decision, Decision::NoOp { .. }) {
                self.incr(Metric::SubmissionSucceeded);
            } else {
                self.incr(Metric::SubmissionFailed);
            }
            (url_type, outcome)
        });
        let settled = join_all(pending).await;

        let failed: Vec<(String, String)> = settled
            .iter()
            .filter(|(_, o)| o.is_forwarded())
            .map(|(url_type, o)| (url_type.to_string(), o.url.clone()))
            .collect();
        if !failed.is_empty() {
            self.forward(Signal::Submission(request.retaining(&failed)))
                .await;
        }

        Ok(settled.into_iter().map(|(_, o)| o).collect())
    }

    async fn submit_url(
        &self,
        request: &SubmissionRequest,
        url_type: &str,
        raw_url: &str,
    ) -> Result<Outcome> {
        let client = &request.client_reference_group_id;
        let literal = lowercase_literal(raw_url);
        let now = Utc::now();

        if let Some(existing) = self
            .ports
            .statuses()
            .get(&StatusKey::new(client.clone(), literal.clone()))
            .await?
            && is_live(&existing)
        {
            return Ok(self.already_known(raw_url, &existing).await);
        }

        let canonical = canonicalize(&literal);
        let fresh = StatusRecord {
            client_info: request.client_custom_information.clone(),
            url_source: request.source.clone(),
            url_type: Some(url_type.to_string()),
            ..StatusRecord::submitted(client.clone(), &literal, &canonical, now)
        };

        let record = if self.config.dedupe_variant_urls {
            if self.ports.statuses().put_if_absent(fresh.clone()).await? {
                fresh
            } else {
                let joined = self.join_existing(&fresh, &literal).await?;
                if is_live(&joined) {
                    return Ok(self.already_known(raw_url, &joined).await);
                }
                self.reactivate(joined).await?
            }
        } else {
            // Without dedup every literal spelling is its own record
            let literal_record = StatusRecord {
                url: literal.clone(),
                variant_urls: None,
                ..fresh
            };
            if self.ports.statuses().put_if_absent(literal_record.clone()).await? {
                literal_record
            } else {
                let Some(existing) = self.ports.statuses().get(&literal_record.key()).await? else {
                    return Err(ReconcileError::StaleSignal(StaleReason::ConditionalWriteLost));
                };
                if is_live(&existing) {
                    return Ok(self.already_known(raw_url, &existing).await);
                }
                self.reactivate(existing).await?
            }
        };

        self.start_submitted(raw_url, record).await
    }

    /// Adds `literal` to the variant set of the canonical record that already
    /// exists. The append is atomic, so concurrent spellings all land.
    async fn join_existing(&self, fresh: &StatusRecord, literal: &str) -> Result<StatusRecord> {
        let added = BTreeSet::from([literal.to_string()]);
        let Some(joined) = self
            .ports
            .statuses()
            .append_variants(&fresh.key(), &added)
            .await?
        else {
            return Err(ReconcileError::StaleSignal(StaleReason::ConditionalWriteLost));
        };
        debug!(url = %joined.url, variant = %literal, "Added variant to canonical record");
        Ok(joined)
    }

    /// Moves a dormant (`Unknown` or deboarded) record back into review.
    ///
    /// # Errors
    ///
    /// `StaleSignal` if another writer moved the record first.
    async fn reactivate(&self, dormant: StatusRecord) -> Result<StatusRecord> {
        let was_inactive = !dormant.is_active;
        let prior = dormant.investigation_status;
        let reactivated = StatusRecord {
            investigation_status: InvestigationStatus::InReview,
            is_active: true,
            case_creation_time: Some(Utc::now()),
            case_completion_time: None,
            deletion_time: None,
            ..dormant
        };
        self.transition(reactivated.clone(), prior).await?;
        info!(url = %reactivated.url, was_inactive, "Reactivated record for new submission");

        if was_inactive {
            let events: Vec<_> = reactivated
                .notification_urls()
                .iter()
                .map(|u| active_status_event(&reactivated.client_reference_group_id, u, true, Utc::now()))
                .collect();
            self.emitter.emit(&events).await;
        }
        Ok(reactivated)
    }

    /// Reports the current verdict of a URL that is already on file.
    async fn already_known(&self, raw_url: &str, existing: &StatusRecord) -> Outcome {
        debug!(url = %existing.url, status = %existing.investigation_status, "URL already on file");
        if existing.investigation_status.is_completed() {
            self.emitter
                .review_status(existing, existing.investigation_status, Utc::now())
                .await;
        }
        Outcome::no_op(raw_url, NoOpReason::AlreadyKnown)
    }

    /// Starts the new-investigation workflow for an IN_REVIEW record,
    /// marking the record `Unknown` if the start fails.
    async fn start_submitted(&self, raw_url: &str, record: StatusRecord) -> Result<Outcome> {
        let input = WorkflowInput::new(&record, InvestigationType::NewInvestigation);
        let unknown = record.clone().with_status(InvestigationStatus::Unknown);

        match self.start_workflow(&input).await {
            Ok(Some(handle)) => {
                self.persist_handle(&record, &handle).await;
                self.emitter
                    .review_status(&record, InvestigationStatus::InReview, Utc::now())
                    .await;
                Ok(Outcome::new(raw_url, Decision::Start { handle }))
            }
            Ok(None) => {
                self.revert(unknown, InvestigationStatus::InReview).await;
                Ok(Outcome::no_op(raw_url, NoOpReason::WorkflowNotAvailable))
            }
            Err(e) => {
                self.revert(unknown, InvestigationStatus::InReview).await;
                Err(e)
            }
        }
    }
}

/// A record with a settled or in-flight review that a new submission leaves
/// alone.
fn is_live(record: &StatusRecord) -> bool {
    record.is_active && record.investigation_status != InvestigationStatus::Unknown
}
