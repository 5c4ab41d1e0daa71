//! Resuming a suspended workflow step.

use tracing::{error, info};

use super::{Decision, Determinator, NoOpReason, Outcome};
use crate::error::{ReconcileError, Result, StaleReason};
use crate::metrics::Metric;
use crate::ports::{Collaborators, KeyedStore, ScanSpec, WorkflowOrchestrator};
use crate::types::{ResumeToken, ReviewKey, StatusRecord};

impl<P: Collaborators> Determinator<P> {
    /// Feeds a non-monitoring scan result to the workflow step waiting for it.
    pub(super) async fn resume_scan(&self, record: StatusRecord, scan: &ScanSpec) -> Result<Outcome> {
        let url = record.url;
        let Some(handle) = record.investigation_handle else {
            info!(url = %url, "No investigation handle on record");
            self.incr(Metric::InvestigationHandleMissing);
            return Ok(Outcome::no_op(url, NoOpReason::NoInvestigationHandle));
        };

        let key = ReviewKey::new(handle.clone(), scan.scan_type);
        let Some(review) = self.ports.reviews().get(&key).await? else {
            info!(url = %url, handle = %handle, scan_type = scan.scan_type.as_str(), "No ReviewRecord for scan");
            self.incr(Metric::NoReviewRecord);
            return Ok(Outcome::no_op(url, NoOpReason::NoReviewRecord));
        };

        let Some(token) = review.resume_token else {
            info!(url = %url, handle = %handle, "ReviewRecord has no resume token");
            self.incr(Metric::NoResumeToken);
            return Ok(Outcome::no_op(url, NoOpReason::NoResumeToken));
        };

        let payload = serde_json::to_value(scan)
            .map_err(|e| ReconcileError::validation(format!("unserializable scan: {e}")))?;
        self.resume_with(&url, &token, payload, Metric::DuplicateResume)
            .await
    }

    /// Resumes with `token`. A token the orchestrator no longer accepts is a
    /// stale signal, metered as `stale_metric`.
    pub(super) async fn resume_with(
        &self,
        url: &str,
        token: &ResumeToken,
        payload: serde_json::Value,
        stale_metric: Metric,
    ) -> Result<Outcome> {
        match self.ports.orchestrator().resume(token, payload).await {
            Ok(true) => {
                info!(url = %url, token = %token, "[RESUME_WORKFLOW] Resumed review workflow");
                Ok(Outcome::new(url, Decision::Resume))
            }
            Ok(false) => {
                info!(url = %url, token = %token, "Resume token no longer valid, duplicate signal");
                self.incr(stale_metric);
                Err(ReconcileError::StaleSignal(StaleReason::ResumeTokenInvalid))
            }
            Err(e) => {
                error!(url = %url, token = %token, error = %e, "Failed to resume review workflow");
                self.incr(Metric::ResumeWorkflowError);
                Err(e.into())
            }
        }
    }
}
