//! Newtype wrappers for domain identifiers.
//!
//! These types prevent accidental mixing of identifiers that are all strings on
//! the wire (e.g., passing a resume token where an investigation handle is
//! expected) and make signatures self-documenting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declares a transparent string identifier with the usual constructors.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                $name(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }
    };
}

string_id!(
    /// The merchant-side grouping key every StatusRecord is scoped to.
    ClientReferenceGroupId
);

string_id!(
    /// Opaque reference to one run of the external review workflow.
    InvestigationHandle
);

string_id!(
    /// Identifier of a vendor scan.
    ScanId
);

string_id!(
    /// Receipt used to delete a message from the queue it was received from.
    AckHandle
);

string_id!(
    /// Destination queue name or URL.
    QueueName
);

string_id!(
    /// Identifier of the review workflow definition that new runs are started from.
    WorkflowDefinition
);

/// Single-use handle that continues a suspended workflow step.
///
/// Tokens are long and effectively bearer credentials, so `Display` only shows
/// a prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResumeToken(pub String);

impl ResumeToken {
    pub fn new(s: impl Into<String>) -> Self {
        ResumeToken(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the first eight characters for log output.
    pub fn short(&self) -> &str {
        // get() rather than slicing so a multi-byte token cannot panic
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Display for ResumeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}…", self.short())
    }
}

/// A human-review case number. Also the sub-investigation id that ReviewRecords
/// are indexed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(pub u64);

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "case-{}", self.0)
    }
}

impl From<u64> for CaseId {
    fn from(n: u64) -> Self {
        CaseId(n)
    }
}
