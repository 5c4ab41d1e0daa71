//! In-memory collaborators.
//!
//! Every port in [`crate::ports`] has a process-local implementation here. They
//! back the test suite and the local binary. Each one is a cheap `Clone`
//! handle over shared state, so the same instance can be handed to several
//! engine components and inspected afterwards.
//!
//! All of them support fault injection (`fail_next`) so the retry and revert
//! pathways can be driven deterministically.

use std::sync::{Mutex, MutexGuard};

use crate::ports::Collaborators;
use crate::types::{ReviewRecord, StatusRecord};

pub mod metrics;
pub mod notifier;
pub mod orchestrator;
pub mod queue;
pub mod store;
pub mod vendor;

pub use metrics::MetricsRecorder;
pub use notifier::MemoryNotifier;
pub use orchestrator::{MemoryOrchestrator, StartedRun};
pub use queue::MemoryQueue;
pub use store::MemoryStore;
pub use vendor::MemoryVendor;

/// Every collaborator, in memory.
#[derive(Clone, Default)]
pub struct MemoryCollaborators {
    pub statuses: MemoryStore<StatusRecord>,
    pub reviews: MemoryStore<ReviewRecord>,
    pub orchestrator: MemoryOrchestrator,
    pub queue: MemoryQueue,
    pub notifier: MemoryNotifier,
    pub metrics: MetricsRecorder,
    pub vendor: MemoryVendor,
}

impl MemoryCollaborators {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Collaborators for MemoryCollaborators {
    type Statuses = MemoryStore<StatusRecord>;
    type Reviews = MemoryStore<ReviewRecord>;
    type Orchestrator = MemoryOrchestrator;
    type Queue = MemoryQueue;
    type Notifier = MemoryNotifier;
    type Metrics = MetricsRecorder;
    type Vendor = MemoryVendor;

    fn statuses(&self) -> &Self::Statuses {
        &self.statuses
    }

    fn reviews(&self) -> &Self::Reviews {
        &self.reviews
    }

    fn orchestrator(&self) -> &Self::Orchestrator {
        &self.orchestrator
    }

    fn queue(&self) -> &Self::Queue {
        &self.queue
    }

    fn notifier(&self) -> &Self::Notifier {
        &self.notifier
    }

    fn metrics(&self) -> &Self::Metrics {
        &self.metrics
    }

    fn vendor_client(&self) -> &Self::Vendor {
        &self.vendor
    }
}

/// Locks a mutex, recovering the data if a previous holder panicked.
///
/// None of the critical sections here can leave state half-updated, so a
/// poisoned lock is still safe to use.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Decrements an injected-failure counter, returning true if this call should
/// fail.
fn take_failure(remaining: &Mutex<u32>) -> bool {
    let mut remaining = lock(remaining);
    if *remaining > 0 {
        *remaining -= 1;
        true
    } else {
        false
    }
}
