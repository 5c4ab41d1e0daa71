//! Recording vendor client.

use std::sync::{Arc, Mutex};

use crate::error::{Dependency, DependencyError};
use crate::ports::{VendorDeboardRequest, VendorScanClient, VendorScanRequest};
use crate::types::{ScanId, VendorId};

use super::{lock, take_failure};

/// Accepts every request, handing back sequential scan ids.
#[derive(Debug, Clone, Default)]
pub struct MemoryVendor {
    requests: Arc<Mutex<Vec<VendorScanRequest>>>,
    deboards: Arc<Mutex<Vec<VendorDeboardRequest>>>,
    fail_next: Arc<Mutex<u32>>,
    reject_next: Arc<Mutex<u32>>,
}

impl MemoryVendor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` calls fail with a retryable error.
    pub fn fail_next(&self, n: u32) {
        *lock(&self.fail_next) = n;
    }

    /// Makes the next `n` calls fail with a non-retryable error.
    pub fn reject_next(&self, n: u32) {
        *lock(&self.reject_next) = n;
    }

    pub fn requests(&self) -> Vec<VendorScanRequest> {
        lock(&self.requests).clone()
    }

    pub fn deboards(&self) -> Vec<VendorDeboardRequest> {
        lock(&self.deboards).clone()
    }

    fn check_fault(&self, op: &str) -> Result<(), DependencyError> {
        if take_failure(&self.reject_next) {
            return Err(DependencyError::non_retryable(
                Dependency::Vendor,
                format!("injected {op} rejection"),
            ));
        }
        if take_failure(&self.fail_next) {
            return Err(DependencyError::retryable(
                Dependency::Vendor,
                format!("injected {op} failure"),
            ));
        }
        Ok(())
    }
}

impl VendorScanClient for MemoryVendor {
    fn vendor(&self) -> VendorId {
        VendorId::EverCompliant
    }

    async fn initiate(&self, request: &VendorScanRequest) -> Result<ScanId, DependencyError> {
        self.check_fault("scan")?;
        let mut requests = lock(&self.requests);
        requests.push(request.clone());
        Ok(ScanId::new(format!("scan-{}", requests.len())))
    }

    async fn deboard(&self, request: &VendorDeboardRequest) -> Result<(), DependencyError> {
        self.check_fault("deboard")?;
        lock(&self.deboards).push(request.clone());
        Ok(())
    }
}
