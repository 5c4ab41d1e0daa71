//! In-memory workflow orchestrator.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::error::{Dependency, DependencyError};
use crate::ports::WorkflowOrchestrator;
use crate::types::{InvestigationHandle, ResumeToken, WorkflowDefinition, WorkflowRunStatus};

use super::{lock, take_failure};

/// A workflow run started through the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct StartedRun {
    pub definition: WorkflowDefinition,
    pub handle: InvestigationHandle,
    pub payload: serde_json::Value,
}

/// Orchestrator double that tracks runs and single-use resume tokens.
///
/// Started runs report `RUNNING` until [`set_status`](Self::set_status) says
/// otherwise. Tokens must be issued with [`issue_token`](Self::issue_token)
/// before they can be resumed, and each one resumes at most once.
#[derive(Clone, Default)]
pub struct MemoryOrchestrator {
    inner: Arc<OrchestratorInner>,
}

#[derive(Default)]
struct OrchestratorInner {
    started: Mutex<Vec<StartedRun>>,
    resumed: Mutex<Vec<(ResumeToken, serde_json::Value)>>,
    live_tokens: Mutex<HashSet<ResumeToken>>,
    statuses: Mutex<HashMap<InvestigationHandle, WorkflowRunStatus>>,
    fail_start: Mutex<u32>,
    fail_resume: Mutex<u32>,
    fail_status: Mutex<u32>,
}

impl MemoryOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a token as resumable.
    pub fn issue_token(&self, token: ResumeToken) {
        lock(&self.inner.live_tokens).insert(token);
    }

    /// Sets the reported status of a run, creating it if unknown.
    pub fn set_status(&self, handle: &InvestigationHandle, status: WorkflowRunStatus) {
        lock(&self.inner.statuses).insert(handle.clone(), status);
    }

    pub fn fail_start_next(&self, n: u32) {
        *lock(&self.inner.fail_start) = n;
    }

    pub fn fail_resume_next(&self, n: u32) {
        *lock(&self.inner.fail_resume) = n;
    }

    pub fn fail_status_next(&self, n: u32) {
        *lock(&self.inner.fail_status) = n;
    }

    pub fn started(&self) -> Vec<StartedRun> {
        lock(&self.inner.started).clone()
    }

    pub fn resumed(&self) -> Vec<(ResumeToken, serde_json::Value)> {
        lock(&self.inner.resumed).clone()
    }
}

impl WorkflowOrchestrator for MemoryOrchestrator {
    async fn start(
        &self,
        definition: &WorkflowDefinition,
        payload: serde_json::Value,
    ) -> Result<InvestigationHandle, DependencyError> {
        if take_failure(&self.inner.fail_start) {
            return Err(DependencyError::retryable(
                Dependency::Orchestrator,
                "injected start failure",
            ));
        }
        let mut started = lock(&self.inner.started);
        let handle = InvestigationHandle::new(format!("{}:run-{}", definition, started.len() + 1));
        started.push(StartedRun {
            definition: definition.clone(),
            handle: handle.clone(),
            payload,
        });
        lock(&self.inner.statuses).insert(handle.clone(), WorkflowRunStatus::Running);
        Ok(handle)
    }

    async fn resume(
        &self,
        token: &ResumeToken,
        payload: serde_json::Value,
    ) -> Result<bool, DependencyError> {
        if take_failure(&self.inner.fail_resume) {
            return Err(DependencyError::retryable(
                Dependency::Orchestrator,
                "injected resume failure",
            ));
        }
        if !lock(&self.inner.live_tokens).remove(token) {
            return Ok(false);
        }
        lock(&self.inner.resumed).push((token.clone(), payload));
        Ok(true)
    }

    async fn status(
        &self,
        handle: &InvestigationHandle,
    ) -> Result<WorkflowRunStatus, DependencyError> {
        if take_failure(&self.inner.fail_status) {
            return Err(DependencyError::retryable(
                Dependency::Orchestrator,
                "injected status failure",
            ));
        }
        lock(&self.inner.statuses).get(handle).copied().ok_or_else(|| {
            DependencyError::non_retryable(
                Dependency::Orchestrator,
                format!("execution does not exist: {handle}"),
            )
        })
    }
}
