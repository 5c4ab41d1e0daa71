//! Periodic monitoring scans of already-reviewed URLs.

use tracing::{info, warn};

use super::{Decision, Determinator, NoOpReason, Outcome, WorkflowInput};
use crate::error::Result;
use crate::metrics::Metric;
use crate::ports::{Collaborators, ScanSpec, WorkflowOrchestrator};
use crate::types::{InvestigationStatus, InvestigationType, StatusRecord, WorkflowRunStatus};

impl<P: Collaborators> Determinator<P> {
    /// Reopens a concluded review and starts a periodic investigation.
    ///
    /// The COMPLIANT → COMPLIANT_TO_IN_REVIEW move is the claim: of several
    /// concurrent monitoring results for one URL, only the one whose
    /// conditional write lands starts a workflow.
    pub(super) async fn monitoring_scan(&self, record: StatusRecord, scan: &ScanSpec) -> Result<Outcome> {
        let url = record.url.clone();
        let status = record.investigation_status;

        if status == InvestigationStatus::Unknown {
            warn!(url = %url, "Record has no investigation status");
            self.incr(Metric::InvestigationStatusMissing);
            return Ok(Outcome::no_op(url, NoOpReason::StatusUnknown));
        }

        if let Some(handle) = &record.investigation_handle {
            match self.ports.orchestrator().status(handle).await {
                Ok(WorkflowRunStatus::Running) => {
                    info!(url = %url, handle = %handle, "Previous run still RUNNING, URL under review");
                    return Ok(Outcome::no_op(url, NoOpReason::WorkflowRunning));
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(url = %url, handle = %handle, error = %e, "Could not query run status");
                    self.incr(Metric::WorkflowStatusError);
                }
            }
        }

        if status.is_under_review() {
            info!(url = %url, status = %status, "Monitoring result for URL already in review");
            self.incr(Metric::MonitoringUnderReview(status));
            return Ok(Outcome::no_op(url, NoOpReason::UnderReview));
        }

        let Some(reopened) = status.reopened() else {
            return Ok(Outcome::no_op(url, NoOpReason::StatusUnknown));
        };
        let claimed = record.clone().with_status(reopened);
        self.transition(claimed.clone(), status).await?;

        let input = WorkflowInput {
            scan_spec: Some(scan.clone()),
            ..WorkflowInput::new(&record, InvestigationType::PeriodicInvestigation)
        };
        match self.start_workflow(&input).await {
            Ok(Some(handle)) => {
                self.persist_handle(&claimed, &handle).await;
                Ok(Outcome::new(url, Decision::Start { handle }))
            }
            Ok(None) => {
                self.revert(record, reopened).await;
                Ok(Outcome::no_op(url, NoOpReason::WorkflowNotAvailable))
            }
            Err(e) => {
                self.revert(record, reopened).await;
                Err(e)
            }
        }
    }
}
