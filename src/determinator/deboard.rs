//! Deboarding: a merchant removes a URL from review.
//!
//! Records are never deleted. A deboarded record keeps its last verdict with
//! `is_active = false` and a deletion time, and every other pathway treats it
//! as inactive until a new submission reactivates it.

use chrono::Utc;
use tracing::{debug, info, instrument};

use super::{DeboardRequest, Decision, Determinator, NoOpReason, Outcome, Signal};
use crate::canon::{canonicalize, lowercase_literal};
use crate::error::{ReconcileError, Result};
use crate::metrics::Metric;
use crate::notify::active_status_event;
use crate::ports::{Collaborators, KeyedStore, VendorDeboardRequest, VendorScanClient};
use crate::types::{StatusKey, StatusRecord, SubInvestigationType};

impl<P: Collaborators> Determinator<P> {
    #[instrument(skip(self, request), fields(client = %request.client_reference_group_id, url = %request.url))]
    pub(super) async fn deboard(&self, request: DeboardRequest) -> Result<Outcome> {
        if request.client_reference_group_id.as_str().trim().is_empty() {
            return Err(ReconcileError::validation("deboard without client id"));
        }
        if request.url.trim().is_empty() {
            return Err(ReconcileError::validation("deboard without url"));
        }

        let result = self.deboard_url(&request).await;
        let outcome = self.settle(&request.url, result);

        match outcome.decision {
            Decision::Deboarded => self.incr(Metric::DeboardSucceeded),
            Decision::Forwarded { .. } | Decision::Rejected { .. } => self.incr(Metric::DeboardFailed),
            _ => {}
        }
        if outcome.is_forwarded() {
            self.forward(Signal::Deboard(request)).await;
        }
        Ok(outcome)
    }

    async fn deboard_url(&self, request: &DeboardRequest) -> Result<Outcome> {
        let Some(record) = self.deboard_target(request).await? else {
            info!("No record to deboard");
            self.incr(Metric::DeboardRecordNotFound);
            return Ok(Outcome::no_op(&request.url, NoOpReason::NoStatusRecord));
        };
        if !record.is_active {
            debug!(url = %record.url, "URL already deboarded");
            return Ok(Outcome::no_op(&request.url, NoOpReason::Inactive));
        }

        // Upfront validation never reached the vendor
        if record.sub_investigation_type != Some(SubInvestigationType::UpfrontValidation) {
            let vendor = self.ports.vendor_client();
            let vendor_request = VendorDeboardRequest {
                client_reference_group_id: record.client_reference_group_id.clone(),
                review_url: request.url.clone(),
                sub_investigation_type: SubInvestigationType::AutoHeavyWeight,
            };
            vendor.deboard(&vendor_request).await?;
            info!(vendor = ?vendor.vendor(), "Deboarded URL at vendor");
        }

        let now = Utc::now();
        let deboarded = StatusRecord {
            is_active: false,
            deletion_time: Some(now),
            ..record.clone()
        };
        self.transition(deboarded.clone(), record.investigation_status)
            .await?;
        info!(
            url = %deboarded.url,
            status = %deboarded.investigation_status,
            "[URL_DEBOARDED] Deactivated record"
        );

        let events: Vec<_> = deboarded
            .notification_urls()
            .iter()
            .map(|u| active_status_event(&deboarded.client_reference_group_id, u, false, now))
            .collect();
        self.emitter.emit(&events).await;

        Ok(Outcome::new(&request.url, Decision::Deboarded))
    }

    /// The literal record, or with dedup on the canonical record that lists
    /// the literal among its variants.
    async fn deboard_target(&self, request: &DeboardRequest) -> Result<Option<StatusRecord>> {
        let client = &request.client_reference_group_id;
        let literal = lowercase_literal(&request.url);
        let statuses = self.ports.statuses();

        if let Some(record) = statuses.get(&StatusKey::new(client.clone(), literal.clone())).await? {
            return Ok(Some(record));
        }
        if !self.config.dedupe_variant_urls {
            return Ok(None);
        }

        let canonical = statuses
            .get(&StatusKey::new(client.clone(), canonicalize(&literal)))
            .await?;
        Ok(canonical.filter(|r| {
            r.variant_urls
                .as_ref()
                .is_some_and(|variants| variants.contains(&literal))
        }))
    }
}
