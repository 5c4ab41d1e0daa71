//! Vendor scanning service: outbound scan and deboard requests, and the shape
//! of the callbacks it sends back.

use std::collections::BTreeMap;
use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DependencyError;
use crate::types::{ClientReferenceGroupId, ScanId, SubInvestigationStatus, SubInvestigationType, VendorId};

fn reported_by_default() -> bool {
    true
}

/// One URL inside a vendor scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlSpec {
    /// The vendor reports URLs in normalized form.
    pub url: String,

    /// False for URLs the vendor discovered on its own that were never
    /// submitted (onboarded) by us. Absent means reported.
    #[serde(default = "reported_by_default")]
    pub reported_url: bool,

    #[serde(default)]
    pub verdict: Option<SubInvestigationStatus>,

    /// Vendor risk details, passed through to the workflow untouched.
    #[serde(default)]
    pub risk: Option<serde_json::Value>,
}

/// A vendor scan callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSpec {
    pub scan_id: ScanId,

    /// The sub-investigation this scan answers.
    pub scan_type: SubInvestigationType,

    pub client_id: ClientReferenceGroupId,

    #[serde(default)]
    pub vendor_id: VendorId,

    #[serde(default)]
    pub created_date: Option<DateTime<Utc>>,

    /// Per-URL results keyed by the vendor's scan item id.
    pub scan_items: BTreeMap<String, UrlSpec>,
}

impl ScanSpec {
    /// A copy of this scan narrowed to one item. Redelivery and workflow
    /// payloads always carry exactly one URL.
    pub fn single(&self, item_id: &str, item: &UrlSpec) -> ScanSpec {
        ScanSpec {
            scan_items: BTreeMap::from([(item_id.to_string(), item.clone())]),
            ..self.clone()
        }
    }
}

/// Request to scan one URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorScanRequest {
    pub client_id: ClientReferenceGroupId,
    pub url: String,
    pub scan_type: SubInvestigationType,
}

/// Request to stop monitoring one URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorDeboardRequest {
    pub client_reference_group_id: ClientReferenceGroupId,

    #[serde(rename = "reviewURL")]
    pub review_url: String,

    pub sub_investigation_type: SubInvestigationType,
}

/// Outbound side of the vendor integration.
pub trait VendorScanClient: Send + Sync {
    fn vendor(&self) -> VendorId;

    /// Asks the vendor to scan a URL. The result arrives later as a
    /// [`ScanSpec`] callback.
    fn initiate(
        &self,
        request: &VendorScanRequest,
    ) -> impl Future<Output = Result<ScanId, DependencyError>> + Send;

    /// Stops the vendor's scans of a URL. Deboarding a URL the vendor does
    /// not know is not an error.
    fn deboard(
        &self,
        request: &VendorDeboardRequest,
    ) -> impl Future<Output = Result<(), DependencyError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_deserializes_with_defaults() {
        let json = serde_json::json!({
            "scanId": "scan-1",
            "scanType": "Auto-Monitoring",
            "clientId": "c1",
            "scanItems": {
                "item-1": { "url": "http://example.com" },
                "item-2": { "url": "http://other.com", "reportedUrl": false }
            }
        });
        let spec: ScanSpec = serde_json::from_value(json).unwrap();
        assert_eq!(spec.vendor_id, VendorId::EverCompliant);
        assert!(spec.scan_items["item-1"].reported_url);
        assert!(!spec.scan_items["item-2"].reported_url);
    }

    #[test]
    fn deboard_request_wire_format() {
        let request = VendorDeboardRequest {
            client_reference_group_id: ClientReferenceGroupId::new("c1"),
            review_url: "https://a.com".to_string(),
            sub_investigation_type: SubInvestigationType::AutoHeavyWeight,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["reviewURL"], "https://a.com");
        assert_eq!(json["subInvestigationType"], "Auto-HeavyWeight");
    }

    #[test]
    fn single_keeps_only_one_item() {
        let item = UrlSpec {
            url: "http://a.com".to_string(),
            reported_url: true,
            verdict: None,
            risk: None,
        };
        let spec = ScanSpec {
            scan_id: ScanId::new("s"),
            scan_type: SubInvestigationType::AutoLightWeight,
            client_id: ClientReferenceGroupId::new("c1"),
            vendor_id: VendorId::default(),
            created_date: None,
            scan_items: BTreeMap::from([
                ("1".to_string(), item.clone()),
                ("2".to_string(), item.clone()),
            ]),
        };
        let narrowed = spec.single("2", &item);
        assert_eq!(narrowed.scan_items.len(), 1);
        assert!(narrowed.scan_items.contains_key("2"));
        assert_eq!(narrowed.scan_id, spec.scan_id);
    }
}
