//! Typed origin tags for redelivered messages.
//!
//! Every message on the error and dead-letter queues names the pathway that
//! produced it. The tag is resolved once, when the message is received; an
//! unrecognized tag never reaches a handler.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The pathway a queued signal belongs to, and therefore the handler it is
/// redelivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginTag {
    /// A merchant URL submission.
    UrlReview,
    /// A human reviewer verdict or appeal.
    ManualResponse,
    /// A vendor scan callback.
    VendorResponse,
    /// A merchant removing a URL from review.
    UrlDeboard,
}

impl OriginTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            OriginTag::UrlReview => "url_review",
            OriginTag::ManualResponse => "manual_response",
            OriginTag::VendorResponse => "vendor_response",
            OriginTag::UrlDeboard => "url_deboard",
        }
    }
}

impl fmt::Display for OriginTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an origin tag does not name a known pathway.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unclassified message origin: {0:?}")]
pub struct UnknownOrigin(pub String);

impl FromStr for OriginTag {
    type Err = UnknownOrigin;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "url_review" => Ok(OriginTag::UrlReview),
            "manual_response" => Ok(OriginTag::ManualResponse),
            "vendor_response" => Ok(OriginTag::VendorResponse),
            "url_deboard" => Ok(OriginTag::UrlDeboard),
            other => Err(UnknownOrigin(other.to_string())),
        }
    }
}
