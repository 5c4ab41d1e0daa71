//! Inbound signals and their redrive payloads.
//!
//! Each pathway has one payload type. The same type is accepted on the
//! direct path and carried on the error queue, tagged with its
//! [`OriginTag`], so a redelivered message is just the original payload with
//! a bumped `retry_count`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ports::ScanSpec;
use crate::types::{CaseId, ClientReferenceGroupId, InvestigationStatus, OriginTag};

/// A merchant asking for URLs to be reviewed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    pub client_reference_group_id: ClientReferenceGroupId,

    /// URLs to review, grouped by URL type (storefront, social, ...).
    #[serde(rename = "reviewURLsMetaData")]
    pub review_urls: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub client_custom_information: Option<String>,

    #[serde(default)]
    pub source: Option<String>,

    #[serde(default)]
    pub retry_count: u64,
}

impl SubmissionRequest {
    /// Every (url type, url) pair in submission order.
    pub fn urls(&self) -> impl Iterator<Item = (&str, &str)> {
        self.review_urls
            .iter()
            .flat_map(|(url_type, urls)| urls.iter().map(move |u| (url_type.as_str(), u.as_str())))
    }

    /// A copy narrowed to the given URLs. URL types left empty are dropped.
    pub fn retaining(&self, keep: &[(String, String)]) -> SubmissionRequest {
        let review_urls = self
            .review_urls
            .iter()
            .filter_map(|(url_type, urls)| {
                let kept: Vec<String> = urls
                    .iter()
                    .filter(|u| keep.iter().any(|(t, k)| t == url_type && k == *u))
                    .cloned()
                    .collect();
                (!kept.is_empty()).then(|| (url_type.clone(), kept))
            })
            .collect();
        SubmissionRequest {
            review_urls,
            ..self.clone()
        }
    }
}

/// A human reviewer's verdict on a case, or a merchant appeal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerdictRequest {
    pub client_reference_group_id: ClientReferenceGroupId,
    pub url: String,

    #[serde(default)]
    pub investigation_status: Option<InvestigationStatus>,

    #[serde(default)]
    pub review_info: Option<String>,

    /// Required. Optional on the wire so a missing id is reported as a
    /// validation failure rather than a parse failure.
    #[serde(default)]
    pub case_id: Option<CaseId>,

    #[serde(default)]
    pub retry_count: u64,
}

/// A merchant removing one URL from review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeboardRequest {
    pub client_reference_group_id: ClientReferenceGroupId,
    pub url: String,

    #[serde(default)]
    pub retry_count: u64,
}

/// A vendor callback carrying one or more scans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorScanBatch {
    pub scan_spec_list: Vec<ScanSpec>,

    #[serde(default)]
    pub retry_count: u64,
}

impl VendorScanBatch {
    pub fn single(scan: ScanSpec, retry_count: u64) -> Self {
        VendorScanBatch {
            scan_spec_list: vec![scan],
            retry_count,
        }
    }
}

/// Any signal the determinator accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Signal {
    Submission(SubmissionRequest),
    VendorCallback(VendorScanBatch),
    Verdict(VerdictRequest),
    Deboard(DeboardRequest),
}

impl Signal {
    pub fn origin(&self) -> OriginTag {
        match self {
            Signal::Submission(_) => OriginTag::UrlReview,
            Signal::VendorCallback(_) => OriginTag::VendorResponse,
            Signal::Verdict(_) => OriginTag::ManualResponse,
            Signal::Deboard(_) => OriginTag::UrlDeboard,
        }
    }

    pub fn retry_count(&self) -> u64 {
        match self {
            Signal::Submission(r) => r.retry_count,
            Signal::VendorCallback(b) => b.retry_count,
            Signal::Verdict(v) => v.retry_count,
            Signal::Deboard(d) => d.retry_count,
        }
    }

    pub fn with_retry_count(mut self, retry_count: u64) -> Self {
        match &mut self {
            Signal::Submission(r) => r.retry_count = retry_count,
            Signal::VendorCallback(b) => b.retry_count = retry_count,
            Signal::Verdict(v) => v.retry_count = retry_count,
            Signal::Deboard(d) => d.retry_count = retry_count,
        }
        self
    }

    /// Decodes a queued payload whose origin has already been resolved.
    pub fn from_payload(origin: OriginTag, payload: serde_json::Value) -> serde_json::Result<Signal> {
        Ok(match origin {
            OriginTag::UrlReview => Signal::Submission(serde_json::from_value(payload)?),
            OriginTag::VendorResponse => Signal::VendorCallback(serde_json::from_value(payload)?),
            OriginTag::ManualResponse => Signal::Verdict(serde_json::from_value(payload)?),
            OriginTag::UrlDeboard => Signal::Deboard(serde_json::from_value(payload)?),
        })
    }

    /// The queue body for this signal: its payload alone, untagged.
    pub fn to_body(&self) -> serde_json::Result<String> {
        match self {
            Signal::Submission(r) => serde_json::to_string(r),
            Signal::VendorCallback(b) => serde_json::to_string(b),
            Signal::Verdict(v) => serde_json::to_string(v),
            Signal::Deboard(d) => serde_json::to_string(d),
        }
    }
}

impl From<SubmissionRequest> for Signal {
    fn from(r: SubmissionRequest) -> Self {
        Signal::Submission(r)
    }
}

impl From<VendorScanBatch> for Signal {
    fn from(b: VendorScanBatch) -> Self {
        Signal::VendorCallback(b)
    }
}

impl From<VerdictRequest> for Signal {
    fn from(v: VerdictRequest) -> Self {
        Signal::Verdict(v)
    }
}

impl From<DeboardRequest> for Signal {
    fn from(d: DeboardRequest) -> Self {
        Signal::Deboard(d)
    }
}
