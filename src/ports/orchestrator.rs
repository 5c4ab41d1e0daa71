//! The external long-running review workflow.

use std::future::Future;

use crate::error::DependencyError;
use crate::types::{InvestigationHandle, ResumeToken, WorkflowDefinition, WorkflowRunStatus};

/// Starts, resumes, and inspects review workflow runs.
///
/// A resume token is single use and expires when the suspended step times
/// out. `resume` returns `Ok(false)` for a token that is no longer valid;
/// consumed and expired tokens are indistinguishable.
pub trait WorkflowOrchestrator: Send + Sync {
    fn start(
        &self,
        definition: &WorkflowDefinition,
        payload: serde_json::Value,
    ) -> impl Future<Output = Result<InvestigationHandle, DependencyError>> + Send;

    fn resume(
        &self,
        token: &ResumeToken,
        payload: serde_json::Value,
    ) -> impl Future<Output = Result<bool, DependencyError>> + Send;

    fn status(
        &self,
        handle: &InvestigationHandle,
    ) -> impl Future<Output = Result<WorkflowRunStatus, DependencyError>> + Send;
}
