//! The two persisted record kinds and their keys.
//!
//! A [`StatusRecord`] is the merchant-facing state of one URL. A
//! [`ReviewRecord`] is one sub-investigation step of one workflow run, kept as
//! an audit trail. They correlate through the investigation handle:
//!
//! ```text
//! StatusRecord (client, url) ──investigation_handle──┐
//!                                                    ├─► ReviewRecord (handle, Upfront-Validation)
//!                                                    ├─► ReviewRecord (handle, Auto-LightWeight)
//!                                                    └─► ReviewRecord (handle, Manual)
//! ```

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ports::store::Record;

use super::ids::{CaseId, ClientReferenceGroupId, InvestigationHandle, ResumeToken};
use super::status::{InvestigationStatus, SubInvestigationStatus, SubInvestigationType};

fn active_by_default() -> bool {
    true
}

/// Primary key of a [`StatusRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StatusKey {
    pub client_reference_group_id: ClientReferenceGroupId,
    pub url: String,
}

impl StatusKey {
    pub fn new(client: ClientReferenceGroupId, url: impl Into<String>) -> Self {
        StatusKey {
            client_reference_group_id: client,
            url: url.into(),
        }
    }
}

/// Secondary lookups over StatusRecords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusIndex {
    /// Every record (canonical and legacy variants) that collapses to one
    /// normalized URL for a client.
    NormalizedUrl {
        client_reference_group_id: ClientReferenceGroupId,
        normalized_url: String,
    },
}

/// Merchant-facing review state of one URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    pub client_reference_group_id: ClientReferenceGroupId,

    /// Literal URL this record is keyed by. Equal to `normalized_url` for a
    /// canonical ("standard") record.
    pub url: String,

    pub normalized_url: String,

    pub investigation_status: InvestigationStatus,

    /// Active or most recent workflow run.
    #[serde(default)]
    pub investigation_handle: Option<InvestigationHandle>,

    /// Literal URLs collapsed under this record. `None` means the set was
    /// never written, which the dedup engine distinguishes from empty.
    #[serde(default)]
    pub variant_urls: Option<BTreeSet<String>>,

    /// Soft-delete flag. Deboarded URLs are never reviewed.
    #[serde(default = "active_by_default")]
    pub is_active: bool,

    #[serde(default)]
    pub sub_investigation_type: Option<SubInvestigationType>,

    /// Opaque reviewer payload.
    #[serde(default)]
    pub review_info: Option<String>,

    /// Opaque merchant payload supplied at submission.
    #[serde(default)]
    pub client_info: Option<String>,

    #[serde(default)]
    pub url_source: Option<String>,

    #[serde(default)]
    pub url_type: Option<String>,

    #[serde(default)]
    pub case_creation_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub case_completion_time: Option<DateTime<Utc>>,

    /// When the URL was deboarded. Set together with `is_active = false`.
    #[serde(default)]
    pub deletion_time: Option<DateTime<Utc>>,
}

impl StatusRecord {
    /// A fresh canonical record for a first submission, already in review.
    pub fn submitted(
        client: ClientReferenceGroupId,
        literal_url: &str,
        normalized_url: &str,
        now: DateTime<Utc>,
    ) -> Self {
        StatusRecord {
            client_reference_group_id: client,
            url: normalized_url.to_string(),
            normalized_url: normalized_url.to_string(),
            investigation_status: InvestigationStatus::InReview,
            investigation_handle: None,
            variant_urls: Some(BTreeSet::from([literal_url.to_string()])),
            is_active: true,
            sub_investigation_type: None,
            review_info: None,
            client_info: None,
            url_source: None,
            url_type: None,
            case_creation_time: Some(now),
            case_completion_time: None,
            deletion_time: None,
        }
    }

    pub fn key(&self) -> StatusKey {
        StatusKey::new(self.client_reference_group_id.clone(), self.url.clone())
    }

    /// True for the record keyed by the normalized URL itself.
    pub fn is_standard(&self) -> bool {
        self.url == self.normalized_url
    }

    /// The URLs a status change of this record is visible under.
    ///
    /// Merged records answer for each of their variants; others answer for
    /// their own literal URL.
    pub fn notification_urls(&self) -> Vec<String> {
        match &self.variant_urls {
            Some(variants) if !variants.is_empty() => variants.iter().cloned().collect(),
            _ => vec![self.url.clone()],
        }
    }

    pub fn with_status(mut self, status: InvestigationStatus) -> Self {
        self.investigation_status = status;
        self
    }

    pub fn with_handle(mut self, handle: InvestigationHandle) -> Self {
        self.investigation_handle = Some(handle);
        self
    }
}

impl Record for StatusRecord {
    type Key = StatusKey;
    type Status = InvestigationStatus;
    type Index = StatusIndex;

    fn key(&self) -> StatusKey {
        StatusRecord::key(self)
    }

    fn status(&self) -> InvestigationStatus {
        self.investigation_status
    }

    fn matches(&self, index: &StatusIndex) -> bool {
        match index {
            StatusIndex::NormalizedUrl {
                client_reference_group_id,
                normalized_url,
            } => {
                &self.client_reference_group_id == client_reference_group_id
                    && &self.normalized_url == normalized_url
            }
        }
    }

    fn append_variants(&mut self, urls: &BTreeSet<String>) {
        self.variant_urls
            .get_or_insert_with(BTreeSet::new)
            .extend(urls.iter().cloned());
    }

    fn absorb_stored(&mut self, stored: &Self) {
        if let Some(stored_variants) = &stored.variant_urls {
            self.append_variants(stored_variants);
        }
    }
}

/// Primary key of a [`ReviewRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReviewKey {
    pub investigation_handle: InvestigationHandle,
    pub sub_investigation_type: SubInvestigationType,
}

impl ReviewKey {
    pub fn new(handle: InvestigationHandle, sub_investigation_type: SubInvestigationType) -> Self {
        ReviewKey {
            investigation_handle: handle,
            sub_investigation_type,
        }
    }
}

/// Secondary lookups over ReviewRecords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewIndex {
    /// Human-review case the step was opened for.
    SubInvestigationId(CaseId),

    /// All steps ever run for one URL.
    ClientUrl {
        client_reference_group_id: ClientReferenceGroupId,
        url: String,
    },
}

/// One sub-investigation step of one workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    pub investigation_handle: InvestigationHandle,
    pub sub_investigation_type: SubInvestigationType,
    pub sub_investigation_status: SubInvestigationStatus,

    /// Present while the workflow step is suspended waiting for this
    /// sub-investigation's result. Single use; may expire.
    #[serde(default)]
    pub resume_token: Option<ResumeToken>,

    #[serde(default)]
    pub sub_investigation_id: Option<CaseId>,

    pub client_reference_group_id: ClientReferenceGroupId,
    pub url: String,

    pub review_start_time: DateTime<Utc>,

    #[serde(default)]
    pub review_end_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub review_info: Option<String>,
}

impl ReviewRecord {
    pub fn key(&self) -> ReviewKey {
        ReviewKey::new(self.investigation_handle.clone(), self.sub_investigation_type)
    }
}

impl Record for ReviewRecord {
    type Key = ReviewKey;
    type Status = SubInvestigationStatus;
    type Index = ReviewIndex;

    fn key(&self) -> ReviewKey {
        ReviewRecord::key(self)
    }

    fn status(&self) -> SubInvestigationStatus {
        self.sub_investigation_status
    }

    fn matches(&self, index: &ReviewIndex) -> bool {
        match index {
            ReviewIndex::SubInvestigationId(case_id) => self.sub_investigation_id == Some(*case_id),
            ReviewIndex::ClientUrl {
                client_reference_group_id,
                url,
            } => &self.client_reference_group_id == client_reference_group_id && &self.url == url,
        }
    }
}
