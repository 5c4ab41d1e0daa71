//! Status and classification enums shared by both record kinds.
//!
//! Wire strings match what upstream producers and downstream subscribers
//! already exchange, so every enum here serializes through an explicit
//! string table rather than serde's default variant naming.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Review state of a StatusRecord.
///
/// Parsing is case-insensitive and total: anything unrecognized becomes
/// `Unknown`, which the engine treats as "needs a fresh review".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum InvestigationStatus {
    InReview,
    Compliant,
    NonCompliant,
    CompliantToInReview,
    NonCompliantToInReview,
    Unknown,
}

impl InvestigationStatus {
    pub const ALL: [InvestigationStatus; 6] = [
        InvestigationStatus::InReview,
        InvestigationStatus::Compliant,
        InvestigationStatus::NonCompliant,
        InvestigationStatus::CompliantToInReview,
        InvestigationStatus::NonCompliantToInReview,
        InvestigationStatus::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InvestigationStatus::InReview => "In_Review",
            InvestigationStatus::Compliant => "Compliant",
            InvestigationStatus::NonCompliant => "Non_Compliant",
            InvestigationStatus::CompliantToInReview => "Compliant_To_In_Review",
            InvestigationStatus::NonCompliantToInReview => "Non_Compliant_To_In_Review",
            InvestigationStatus::Unknown => "Unknown",
        }
    }

    /// Case-insensitive lookup; unrecognized values map to `Unknown`.
    pub fn parse(s: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .unwrap_or(InvestigationStatus::Unknown)
    }

    /// A review has concluded with a verdict.
    pub fn is_completed(&self) -> bool {
        matches!(
            self,
            InvestigationStatus::Compliant | InvestigationStatus::NonCompliant
        )
    }

    /// A review cycle is in flight, either the first one or a re-review.
    pub fn is_under_review(&self) -> bool {
        matches!(
            self,
            InvestigationStatus::InReview
                | InvestigationStatus::CompliantToInReview
                | InvestigationStatus::NonCompliantToInReview
        )
    }

    /// The re-review status a completed verdict moves to when a new cycle
    /// opens (periodic rescan or appeal). `None` for every other status.
    pub fn reopened(&self) -> Option<InvestigationStatus> {
        match self {
            InvestigationStatus::Compliant => Some(InvestigationStatus::CompliantToInReview),
            InvestigationStatus::NonCompliant => Some(InvestigationStatus::NonCompliantToInReview),
            _ => None,
        }
    }
}

impl fmt::Display for InvestigationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for InvestigationStatus {
    fn from(s: String) -> Self {
        InvestigationStatus::parse(&s)
    }
}

impl From<InvestigationStatus> for &'static str {
    fn from(status: InvestigationStatus) -> Self {
        status.as_str()
    }
}

/// Outcome of one sub-investigation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum SubInvestigationStatus {
    InReview,
    Compliant,
    NonCompliant,
    Unknown,
}

impl SubInvestigationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubInvestigationStatus::InReview => "In_Review",
            SubInvestigationStatus::Compliant => "Compliant",
            SubInvestigationStatus::NonCompliant => "Non_Compliant",
            SubInvestigationStatus::Unknown => "Unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        [
            SubInvestigationStatus::InReview,
            SubInvestigationStatus::Compliant,
            SubInvestigationStatus::NonCompliant,
        ]
        .into_iter()
        .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
        .unwrap_or(SubInvestigationStatus::Unknown)
    }
}

impl fmt::Display for SubInvestigationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for SubInvestigationStatus {
    fn from(s: String) -> Self {
        SubInvestigationStatus::parse(&s)
    }
}

impl From<SubInvestigationStatus> for &'static str {
    fn from(status: SubInvestigationStatus) -> Self {
        status.as_str()
    }
}

/// One discrete review pathway within an investigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SubInvestigationType {
    #[serde(rename = "Upfront-Validation")]
    UpfrontValidation,
    #[serde(rename = "Manual")]
    Manual,
    #[serde(rename = "Auto-LightWeight")]
    AutoLightWeight,
    #[serde(rename = "Auto-HeavyWeight")]
    AutoHeavyWeight,
    #[serde(rename = "Auto-Monitoring")]
    AutoMonitoring,
    #[serde(rename = "Operational")]
    Operational,
    #[serde(rename = "Appeal")]
    Appeal,
}

impl SubInvestigationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubInvestigationType::UpfrontValidation => "Upfront-Validation",
            SubInvestigationType::Manual => "Manual",
            SubInvestigationType::AutoLightWeight => "Auto-LightWeight",
            SubInvestigationType::AutoHeavyWeight => "Auto-HeavyWeight",
            SubInvestigationType::AutoMonitoring => "Auto-Monitoring",
            SubInvestigationType::Operational => "Operational",
            SubInvestigationType::Appeal => "Appeal",
        }
    }

    /// Periodic re-review of an already reviewed URL.
    pub fn is_monitoring(&self) -> bool {
        matches!(self, SubInvestigationType::AutoMonitoring)
    }
}

impl fmt::Display for SubInvestigationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a sub-investigation type string is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sub-investigation type: {0}")]
pub struct UnknownSubInvestigationType(pub String);

impl FromStr for SubInvestigationType {
    type Err = UnknownSubInvestigationType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            SubInvestigationType::UpfrontValidation,
            SubInvestigationType::Manual,
            SubInvestigationType::AutoLightWeight,
            SubInvestigationType::AutoHeavyWeight,
            SubInvestigationType::AutoMonitoring,
            SubInvestigationType::Operational,
            SubInvestigationType::Appeal,
        ]
        .into_iter()
        .find(|t| t.as_str().eq_ignore_ascii_case(s))
        .ok_or_else(|| UnknownSubInvestigationType(s.to_string()))
    }
}

/// Why a workflow run was started. Carried in the start payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvestigationType {
    #[serde(rename = "New_Investigation")]
    NewInvestigation,
    #[serde(rename = "Periodic_Investigation")]
    PeriodicInvestigation,
    #[serde(rename = "Appeal")]
    Appeal,
}

/// Execution state of a workflow run as reported by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowRunStatus {
    Running,
    Succeeded,
    Failed,
    Aborted,
    TimedOut,
}

impl WorkflowRunStatus {
    /// The run ended without producing a verdict and will never resume.
    pub fn is_terminal_failure(&self) -> bool {
        matches!(
            self,
            WorkflowRunStatus::Failed | WorkflowRunStatus::Aborted | WorkflowRunStatus::TimedOut
        )
    }
}

impl fmt::Display for WorkflowRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkflowRunStatus::Running => "RUNNING",
            WorkflowRunStatus::Succeeded => "SUCCEEDED",
            WorkflowRunStatus::Failed => "FAILED",
            WorkflowRunStatus::Aborted => "ABORTED",
            WorkflowRunStatus::TimedOut => "TIMED_OUT",
        };
        f.write_str(s)
    }
}

/// Scanning vendor that produced a callback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VendorId {
    #[default]
    EverCompliant,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // ─── Unit Tests ───────────────────────────────────────────────────────────

    #[test]
    fn investigation_status_wire_strings() {
        assert_eq!(
            serde_json::to_string(&InvestigationStatus::NonCompliantToInReview).unwrap(),
            "\"Non_Compliant_To_In_Review\""
        );
        let parsed: InvestigationStatus = serde_json::from_str("\"in_review\"").unwrap();
        assert_eq!(parsed, InvestigationStatus::InReview);
    }

    #[test]
    fn unrecognized_status_is_unknown() {
        assert_eq!(
            InvestigationStatus::parse("Pending_Vendor"),
            InvestigationStatus::Unknown
        );
        let parsed: InvestigationStatus = serde_json::from_str("\"\"").unwrap();
        assert_eq!(parsed, InvestigationStatus::Unknown);
    }

    #[test]
    fn reopened_only_from_completed() {
        assert_eq!(
            InvestigationStatus::Compliant.reopened(),
            Some(InvestigationStatus::CompliantToInReview)
        );
        assert_eq!(
            InvestigationStatus::NonCompliant.reopened(),
            Some(InvestigationStatus::NonCompliantToInReview)
        );
        for status in InvestigationStatus::ALL {
            if !status.is_completed() {
                assert_eq!(status.reopened(), None, "{status} should not reopen");
            }
        }
    }

    #[test]
    fn under_review_and_completed_are_disjoint() {
        for status in InvestigationStatus::ALL {
            assert!(!(status.is_completed() && status.is_under_review()));
        }
    }

    #[test]
    fn sub_investigation_type_roundtrip() {
        let json = serde_json::to_string(&SubInvestigationType::AutoMonitoring).unwrap();
        assert_eq!(json, "\"Auto-Monitoring\"");
        assert_eq!(
            "auto-heavyweight".parse::<SubInvestigationType>().unwrap(),
            SubInvestigationType::AutoHeavyWeight
        );
        assert!("Auto-Medium".parse::<SubInvestigationType>().is_err());
    }

    #[test]
    fn terminal_failures() {
        assert!(WorkflowRunStatus::TimedOut.is_terminal_failure());
        assert!(WorkflowRunStatus::Aborted.is_terminal_failure());
        assert!(!WorkflowRunStatus::Running.is_terminal_failure());
        assert!(!WorkflowRunStatus::Succeeded.is_terminal_failure());
    }

    #[test]
    fn run_status_wire_format() {
        let parsed: WorkflowRunStatus = serde_json::from_str("\"TIMED_OUT\"").unwrap();
        assert_eq!(parsed, WorkflowRunStatus::TimedOut);
    }

    // ─── Property Tests ───────────────────────────────────────────────────────

    proptest! {
        #[test]
        fn status_parse_ignores_case(idx in 0usize..6, upper in any::<bool>()) {
            let status = InvestigationStatus::ALL[idx];
            let s = if upper {
                status.as_str().to_uppercase()
            } else {
                status.as_str().to_lowercase()
            };
            prop_assert_eq!(InvestigationStatus::parse(&s), status);
        }

        #[test]
        fn status_parse_is_total(s in ".*") {
            // Never panics, always yields some status
            let _ = InvestigationStatus::parse(&s);
        }
    }
}
