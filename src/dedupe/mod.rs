//! Variant deduplication.
//!
//! Merchants historically onboarded the same site under several literal
//! spellings, each with its own StatusRecord. Before a monitoring scan acts
//! on a normalized URL, the completed variant records are collapsed into one
//! canonical record so the URL is reviewed once.
//!
//! # Merge Protocol
//!
//! 1. Plan the merge from the loaded records ([`variants::plan`]).
//! 2. Write the canonical record conditionally: `put_if_matches` against the
//!    status it was planned from, or `put_if_absent` if it did not exist.
//! 3. Delete the absorbed variant records.
//!
//! A lost conditional write means the family changed under us; nothing has
//! been written, and the family is returned unmerged. Variants appended to
//! the canonical record between the load and the write survive it, because
//! the store folds the stored variant set into every overwrite. A failed delete after
//! a successful write leaves stale variants that the next callback absorbs
//! again (step 2 is idempotent for an unchanged family).

pub mod variants;

use tracing::{debug, info, instrument};

use crate::error::Result;
use crate::ports::KeyedStore;
use crate::types::StatusRecord;

pub use variants::{DedupPlan, KeepReason, MergePlan, Partition, can_merge_into_standard, plan};

pub struct DedupEngine<S> {
    store: S,
}

impl<S: KeyedStore<StatusRecord>> DedupEngine<S> {
    pub fn new(store: S) -> Self {
        DedupEngine { store }
    }

    /// Collapses the completed variants in `records` and returns the family
    /// as it should be processed.
    ///
    /// `records` must all share one client and normalized URL.
    ///
    /// # Errors
    ///
    /// Store failures during the write or the deletes.
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub async fn collapse(&self, records: Vec<StatusRecord>) -> Result<Vec<StatusRecord>> {
        let merge = match plan(&records) {
            DedupPlan::Keep(reason) => {
                if reason == KeepReason::CompletedStatusMismatch {
                    info!("[DIFFERENT_INVESTIGATION_STATUS] Completed variants disagree, not merging");
                } else {
                    debug!(?reason, "Variant records left as they are");
                }
                return Ok(records);
            }
            DedupPlan::Merge(merge) => merge,
        };

        let written = match merge.expected {
            Some(expected) => {
                self.store
                    .put_if_matches(merge.merged.clone(), expected)
                    .await?
            }
            None => self.store.put_if_absent(merge.merged.clone()).await?,
        };
        if !written {
            info!(
                url = %merge.merged.url,
                "Canonical record changed concurrently, not merging"
            );
            return Ok(records);
        }

        for key in &merge.absorbed {
            self.store.delete(key).await?;
        }

        info!(
            client = %merge.merged.client_reference_group_id,
            url = %merge.merged.url,
            absorbed = merge.absorbed.len(),
            "[VARIANT_URLS_MERGED] Collapsed completed variant records"
        );
        Ok(merge.resulting_records())
    }
}
