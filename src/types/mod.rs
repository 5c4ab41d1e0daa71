//! Core domain types for the reconciliation engine.
//!
//! Identifiers, status enums, and the two persisted record kinds. Everything
//! here is plain data; behavior lives in the engine modules.

pub mod ids;
pub mod origin;
pub mod record;
pub mod status;

pub use ids::{
    AckHandle, CaseId, ClientReferenceGroupId, InvestigationHandle, QueueName, ResumeToken, ScanId,
    WorkflowDefinition,
};
pub use origin::OriginTag;
pub use record::{ReviewIndex, ReviewKey, ReviewRecord, StatusIndex, StatusKey, StatusRecord};
pub use status::{
    InvestigationStatus, InvestigationType, SubInvestigationStatus, SubInvestigationType,
    VendorId, WorkflowRunStatus,
};
