//! Pure merge planning over one family of variant records.
//!
//! Nothing here touches the store. [`plan`] looks at every StatusRecord that
//! shares a normalized URL and decides whether the completed variants can
//! be folded into the canonical record, and what that record becomes.

use std::collections::BTreeSet;

use crate::types::{InvestigationStatus, StatusKey, StatusRecord};

/// Records sharing one normalized URL, split by role.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    /// The record keyed by the normalized URL itself.
    pub standard: Option<StatusRecord>,

    /// Non-canonical records whose review concluded.
    pub completed: Vec<StatusRecord>,

    /// Everything else. Never merged, passed through untouched.
    pub in_flight: Vec<StatusRecord>,
}

impl Partition {
    pub fn of(records: &[StatusRecord]) -> Self {
        let mut partition = Partition::default();
        for record in records {
            if record.is_standard() {
                partition.standard = Some(record.clone());
            } else if record.investigation_status.is_completed() {
                partition.completed.push(record.clone());
            } else {
                partition.in_flight.push(record.clone());
            }
        }
        partition
    }
}

/// Why a family was left as it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepReason {
    NothingCompleted,

    /// The canonical record predates variant tracking and its run is still
    /// in progress under the old workflow state.
    StandardUnderReviewWithoutVariants,

    ActiveStatusMismatch,

    /// Completed variants disagree on their verdict and there is no
    /// in-review canonical record to absorb them.
    CompletedStatusMismatch,

    /// The canonical record's status or active flag cannot absorb the
    /// completed verdict.
    StandardIncompatible,
}

/// The write needed to collapse a family.
#[derive(Debug, Clone, PartialEq)]
pub struct MergePlan {
    /// The canonical record to write.
    pub merged: StatusRecord,

    /// Status the canonical record must still have for the write to land.
    /// `None` means it must not exist yet.
    pub expected: Option<InvestigationStatus>,

    /// Completed variant records to delete once `merged` is written.
    pub absorbed: Vec<StatusKey>,

    pub in_flight: Vec<StatusRecord>,
}

impl MergePlan {
    /// The family as it looks after the merge.
    pub fn resulting_records(&self) -> Vec<StatusRecord> {
        std::iter::once(self.merged.clone())
            .chain(self.in_flight.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DedupPlan {
    Keep(KeepReason),
    Merge(MergePlan),
}

/// True if a completed variant with `variant` status can be folded into a
/// canonical record with `standard` status.
///
/// An in-review canonical record takes any verdict. A concluded (or
/// reopened) canonical record only takes variants that reached the same
/// verdict.
pub fn can_merge_into_standard(variant: InvestigationStatus, standard: InvestigationStatus) -> bool {
    use InvestigationStatus::*;

    match standard {
        InReview => true,
        Compliant | CompliantToInReview => variant == Compliant,
        NonCompliant | NonCompliantToInReview => variant == NonCompliant,
        Unknown => false,
    }
}

/// Decides what to do with one family of records.
pub fn plan(records: &[StatusRecord]) -> DedupPlan {
    let Partition {
        standard,
        completed,
        in_flight,
    } = Partition::of(records);

    let Some(first) = completed.first() else {
        return DedupPlan::Keep(KeepReason::NothingCompleted);
    };

    if let Some(std) = &standard
        && std.variant_urls.is_none()
        && std.investigation_status.is_under_review()
    {
        return DedupPlan::Keep(KeepReason::StandardUnderReviewWithoutVariants);
    }

    if completed.iter().any(|r| r.is_active != first.is_active) {
        return DedupPlan::Keep(KeepReason::ActiveStatusMismatch);
    }

    let same_verdict = completed
        .iter()
        .all(|r| r.investigation_status == first.investigation_status);

    if same_verdict {
        if let Some(std) = &standard
            && (!can_merge_into_standard(first.investigation_status, std.investigation_status)
                || std.is_active != first.is_active)
        {
            return DedupPlan::Keep(KeepReason::StandardIncompatible);
        }
    } else {
        match &standard {
            Some(std) if std.investigation_status == InvestigationStatus::InReview => {}
            _ => return DedupPlan::Keep(KeepReason::CompletedStatusMismatch),
        }
    }

    let fallback = first.clone();
    DedupPlan::Merge(merge(standard, fallback, &completed, in_flight))
}

/// Builds the merged canonical record from `standard`, or from `fallback`
/// (the first completed variant) when there is no canonical record yet.
fn merge(
    standard: Option<StatusRecord>,
    fallback: StatusRecord,
    completed: &[StatusRecord],
    in_flight: Vec<StatusRecord>,
) -> MergePlan {
    let mut variants: BTreeSet<String> = completed.iter().map(|r| r.url.clone()).collect();
    let absorbed = completed.iter().map(StatusRecord::key).collect();
    let expected = standard.as_ref().map(|s| s.investigation_status);

    let mut merged = match standard {
        Some(std) => {
            match &std.variant_urls {
                // The canonical record was itself once a plain submission
                None => {
                    variants.insert(std.url.clone());
                }
                Some(existing) => variants.extend(existing.iter().cloned()),
            }
            std
        }
        None => fallback,
    };

    merged.url = merged.normalized_url.clone();
    merged.variant_urls = Some(variants);

    MergePlan {
        merged,
        expected,
        absorbed,
        in_flight,
    }
}
