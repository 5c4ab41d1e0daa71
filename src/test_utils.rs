//! Shared test utilities and arbitrary generators for property-based testing.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use proptest::prelude::*;

use crate::canon::canonicalize;
use crate::types::{ClientReferenceGroupId, InvestigationHandle, InvestigationStatus, StatusRecord};

pub const CLIENT: &str = "client-1";

pub fn client() -> ClientReferenceGroupId {
    ClientReferenceGroupId::new(CLIENT)
}

pub fn fixed_time() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(1_700_000_000_000).unwrap_or_default()
}

/// A record keyed by `url` under its canonical form, with no variant set.
pub fn status_record(url: &str, status: InvestigationStatus) -> StatusRecord {
    let normalized = canonicalize(url);
    StatusRecord {
        url: url.to_string(),
        variant_urls: None,
        investigation_status: status,
        ..StatusRecord::submitted(client(), url, &normalized, fixed_time())
    }
}

/// A canonical record with a handle, as left behind by a completed review.
pub fn standard_record(normalized: &str, status: InvestigationStatus, handle: &str) -> StatusRecord {
    StatusRecord {
        investigation_status: status,
        investigation_handle: Some(InvestigationHandle::new(handle)),
        variant_urls: Some(BTreeSet::from([normalized.to_string()])),
        ..StatusRecord::submitted(client(), normalized, normalized, fixed_time())
    }
}

pub fn arb_investigation_status() -> impl Strategy<Value = InvestigationStatus> {
    prop::sample::select(InvestigationStatus::ALL.to_vec())
}

pub fn arb_completed_status() -> impl Strategy<Value = InvestigationStatus> {
    prop_oneof![
        Just(InvestigationStatus::Compliant),
        Just(InvestigationStatus::NonCompliant)
    ]
}

/// Distinct literal spellings of `http://host.com`, none of them canonical.
pub fn arb_variant_urls(host: &'static str) -> impl Strategy<Value = Vec<String>> {
    let spellings = vec![
        format!("https://{host}"),
        format!("https://www.{host}"),
        format!("http://www.{host}"),
        format!("http://www.{host}/"),
        format!("https://{host}/"),
        format!("https://www.{host}/"),
        format!("http://{host}/"),
    ];
    prop::sample::subsequence(spellings, 1..=7)
}

/// A set of records that all canonicalize to `http://{host}`, optionally
/// including the canonical record itself.
pub fn arb_variant_family(
    host: &'static str,
) -> impl Strategy<Value = Vec<StatusRecord>> {
    (
        arb_variant_urls(host),
        prop::collection::vec((arb_investigation_status(), any::<bool>()), 7),
        prop::option::of((arb_investigation_status(), any::<bool>(), any::<bool>())),
    )
        .prop_map(move |(urls, attrs, standard)| {
            let mut records: Vec<StatusRecord> = urls
                .iter()
                .zip(attrs)
                .map(|(url, (status, active))| StatusRecord {
                    is_active: active,
                    ..status_record(url, status)
                })
                .collect();
            if let Some((status, active, has_variants)) = standard {
                let normalized = format!("http://{host}");
                let mut record = status_record(&normalized, status);
                record.is_active = active;
                if has_variants {
                    record.variant_urls = Some(BTreeSet::from([normalized]));
                }
                records.push(record);
            }
            records
        })
}
