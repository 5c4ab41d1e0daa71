//! Vendor callback pathway.
//!
//! A callback may carry several scans with several URLs each. Every URL is
//! an independent unit of work, narrowed to a single-item scan so that a
//! failure redelivers only that URL.

use futures::future::join_all;
use tracing::{info, instrument};

use super::{Determinator, NoOpReason, Outcome, Signal, VendorScanBatch};
use crate::error::Result;
use crate::metrics::Metric;
use crate::ports::{Collaborators, KeyedStore, ScanSpec};
use crate::types::StatusIndex;

impl<P: Collaborators> Determinator<P> {
    pub(super) async fn vendor_callback(&self, batch: VendorScanBatch) -> Vec<Outcome> {
        let retry_count = batch.retry_count;
        let items: Vec<ScanSpec> = batch
            .scan_spec_list
            .iter()
            .flat_map(|scan| {
                scan.scan_items
                    .iter()
                    .map(move |(item_id, item)| scan.single(item_id, item))
            })
            .collect();

        join_all(items.into_iter().map(|scan| self.scan_item(scan, retry_count)))
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    /// Handles one single-item scan. Forwards it once if any record it
    /// touches failed transiently.
    #[instrument(
        skip(self, scan),
        fields(scan_id = %scan.scan_id, scan_type = scan.scan_type.as_str(), client = %scan.client_id)
    )]
    async fn scan_item(&self, scan: ScanSpec, retry_count: u64) -> Vec<Outcome> {
        let Some(item) = scan.scan_items.values().next() else {
            return Vec::new();
        };
        let url = item.url.clone();
        info!(url = %url, "[WORKFLOW_DETERMINATOR_REQUEST] Deciding on vendor result");

        if !item.reported_url {
            info!(
                url = %url,
                "[UN_REPORTED_URL] Vendor reported a URL we never submitted, ignoring"
            );
            return vec![Outcome::no_op(url, NoOpReason::UnreportedUrl)];
        }

        let outcomes = match self.scan_item_records(&scan, &url).await {
            Ok(outcomes) => outcomes,
            Err(e) => vec![self.settle(&url, Err(e))],
        };

        if outcomes.iter().any(Outcome::is_forwarded) {
            self.forward(Signal::VendorCallback(VendorScanBatch::single(scan, retry_count)))
                .await;
        }
        outcomes
    }

    async fn scan_item_records(&self, scan: &ScanSpec, normalized_url: &str) -> Result<Vec<Outcome>> {
        let index = StatusIndex::NormalizedUrl {
            client_reference_group_id: scan.client_id.clone(),
            normalized_url: normalized_url.to_string(),
        };
        let mut records = self.ports.statuses().query(&index).await?;

        if records.is_empty() {
            info!(url = %normalized_url, "No StatusRecord for vendor result");
            self.incr(Metric::NoStatusRecord);
            return Ok(vec![Outcome::no_op(normalized_url, NoOpReason::NoStatusRecord)]);
        }

        let monitoring = scan.scan_type.is_monitoring();
        if monitoring && self.config.dedupe_variant_urls {
            records = self.dedup.collapse(records).await?;
        }

        let mut outcomes = Vec::with_capacity(records.len());
        for record in records {
            let url = record.url.clone();
            let result = if !record.is_active {
                info!(url = %url, "URL is inactive, ignoring vendor result");
                Ok(Outcome::no_op(&url, NoOpReason::Inactive))
            } else if monitoring {
                self.monitoring_scan(record, scan).await
            } else {
                self.resume_scan(record, scan).await
            };
            outcomes.push(self.settle(&url, result));
        }
        Ok(outcomes)
    }
}
