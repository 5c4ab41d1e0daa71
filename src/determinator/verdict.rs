//! Reviewer verdicts and merchant appeals.

use chrono::Utc;
use tracing::{error, info, instrument, warn};

use super::{Decision, Determinator, NoOpReason, Outcome, Signal, VerdictRequest, WorkflowInput};
use crate::canon::{canonicalize, lowercase_literal};
use crate::error::{ReconcileError, Result};
use crate::metrics::Metric;
use crate::ports::{Collaborators, KeyedStore, WorkflowOrchestrator};
use crate::types::{
    CaseId, InvestigationHandle, InvestigationStatus, InvestigationType, ReviewIndex, StatusKey,
    StatusRecord,
};

fn is_appealable_candidate(record: &StatusRecord) -> bool {
    record.is_active && record.investigation_status != InvestigationStatus::Unknown
}

impl<P: Collaborators> Determinator<P> {
    #[instrument(skip(self, request), fields(client = %request.client_reference_group_id, url = %request.url))]
    pub(super) async fn verdict(&self, request: VerdictRequest) -> Result<Outcome> {
        let Some(case_id) = request.case_id else {
            self.incr(Metric::VerdictFailed);
            return Err(ReconcileError::validation("verdict without case id"));
        };

        let result = self.verdict_for_case(&request, case_id).await;
        let outcome = self.settle(&request.url, result);

        if outcome.is_action() {
            self.incr(Metric::VerdictSucceeded);
        } else {
            self.incr(Metric::VerdictFailed);
        }
        if outcome.is_forwarded() {
            self.forward(Signal::Verdict(request)).await;
        }
        Ok(outcome)
    }

    async fn verdict_for_case(&self, request: &VerdictRequest, case_id: CaseId) -> Result<Outcome> {
        let latest = self
            .ports
            .reviews()
            .query(&ReviewIndex::SubInvestigationId(case_id))
            .await?
            .into_iter()
            .max_by_key(|r| r.review_start_time);

        if let Some(latest) = latest {
            if self.run_failed(&latest.investigation_handle).await {
                info!(
                    case = %case_id,
                    handle = %latest.investigation_handle,
                    "Workflow for case ended without a verdict, starting a new one"
                );
                let input = WorkflowInput {
                    client_reference_group_id: request.client_reference_group_id.clone(),
                    review_url: request.url.clone(),
                    investigation_type: InvestigationType::Appeal,
                    client_custom_information: None,
                    url_type: None,
                    source: None,
                    scan_spec: None,
                    case_id: Some(case_id),
                    review_info: request.review_info.clone(),
                };
                return Ok(match self.start_workflow(&input).await? {
                    Some(handle) => Outcome::new(&request.url, Decision::Start { handle }),
                    None => Outcome::no_op(&request.url, NoOpReason::WorkflowNotAvailable),
                });
            }

            if let Some(token) = &latest.resume_token {
                info!(case = %case_id, token = %token, "Resuming workflow with reviewer verdict");
                let payload = serde_json::to_value(request)
                    .map_err(|e| ReconcileError::validation(format!("unserializable verdict: {e}")))?;
                return self
                    .resume_with(&request.url, token, payload, Metric::InvalidResumeToken)
                    .await;
            }
        }

        info!(case = %case_id, "No suspended step for case, treating as appeal");
        self.appeal(request, case_id).await
    }

    /// True if the run behind `handle` ended in FAILED, ABORTED, or
    /// TIMED_OUT. An unreachable orchestrator counts as not failed.
    async fn run_failed(&self, handle: &InvestigationHandle) -> bool {
        match self.ports.orchestrator().status(handle).await {
            Ok(status) => status.is_terminal_failure(),
            Err(e) => {
                warn!(handle = %handle, error = %e, "Could not query run status");
                self.incr(Metric::WorkflowStatusError);
                false
            }
        }
    }

    /// Reopens a concluded review for an appeal and starts its workflow.
    async fn appeal(&self, request: &VerdictRequest, case_id: CaseId) -> Result<Outcome> {
        let Some(record) = self.appealable_record(request).await? else {
            warn!("[APPEAL_REJECTED] No active StatusRecord for appealed URL");
            return Ok(Outcome::no_op(&request.url, NoOpReason::NotAppealable));
        };

        let status = record.investigation_status;
        let Some(reopened) = status.reopened() else {
            error!(
                url = %record.url,
                status = %status,
                "[APPEAL_REJECTED] Only concluded reviews can be appealed"
            );
            return Ok(Outcome::no_op(&request.url, NoOpReason::NotAppealable));
        };

        let claimed = StatusRecord {
            case_creation_time: Some(Utc::now()),
            ..record.clone().with_status(reopened)
        };
        self.transition(claimed.clone(), status).await?;

        let input = WorkflowInput {
            case_id: Some(case_id),
            review_info: request.review_info.clone(),
            ..WorkflowInput::new(&claimed, InvestigationType::Appeal)
        };
        match self.start_workflow(&input).await {
            Ok(Some(handle)) => {
                self.persist_handle(&claimed, &handle).await;
                Ok(Outcome::new(&request.url, Decision::Escalate { handle }))
            }
            Ok(None) => {
                self.revert(record, reopened).await;
                Ok(Outcome::no_op(&request.url, NoOpReason::WorkflowNotAvailable))
            }
            Err(e) => {
                self.revert(record, reopened).await;
                Err(e)
            }
        }
    }

    /// Finds the record an appeal applies to: the literal URL's own record,
    /// else (with variant dedup on) the canonical record.
    async fn appealable_record(&self, request: &VerdictRequest) -> Result<Option<StatusRecord>> {
        let client = &request.client_reference_group_id;
        let literal = lowercase_literal(&request.url);

        let record = self
            .ports
            .statuses()
            .get(&StatusKey::new(client.clone(), literal.clone()))
            .await?;
        if record.as_ref().is_some_and(is_appealable_candidate) {
            return Ok(record);
        }
        if !self.config.dedupe_variant_urls {
            return Ok(None);
        }

        let canonical = canonicalize(&literal);
        info!(url = %canonical, "Literal URL has no usable record, trying canonical URL");
        let record = self
            .ports
            .statuses()
            .get(&StatusKey::new(client.clone(), canonical))
            .await?;
        Ok(record.filter(is_appealable_candidate))
    }
}
