//! Interfaces to external collaborators.
//!
//! The engine never talks to a concrete store, orchestrator, or queue. Every
//! collaborator is a trait here, implemented by production adapters outside
//! this crate and by the in-memory doubles in [`crate::memory`].
//!
//! The trait-based design enables:
//! - In-memory collaborators for tests and local runs
//! - Fault-injecting doubles for the error pathways
//! - Constructor injection at a single composition root

pub mod metrics;
pub mod notifier;
pub mod orchestrator;
pub mod queue;
pub mod store;
pub mod vendor;

pub use metrics::MetricsSink;
pub use notifier::Notifier;
pub use orchestrator::WorkflowOrchestrator;
pub use queue::{MessageQueue, OutboundMessage, QueueMessage};
pub use store::{KeyedStore, Record};
pub use vendor::{ScanSpec, UrlSpec, VendorDeboardRequest, VendorScanClient, VendorScanRequest};

use crate::types::{ReviewRecord, StatusRecord};

/// The full set of collaborators the engine runs against, assembled once at
/// the composition root.
///
/// Every handle is `Clone` so components can each hold their own copy of a
/// shared client.
pub trait Collaborators: Send + Sync + 'static {
    type Statuses: KeyedStore<StatusRecord> + Clone + 'static;
    type Reviews: KeyedStore<ReviewRecord> + Clone + 'static;
    type Orchestrator: WorkflowOrchestrator + Clone + 'static;
    type Queue: MessageQueue + Clone + 'static;
    type Notifier: Notifier + Clone + 'static;
    type Metrics: MetricsSink + Clone + 'static;
    type Vendor: VendorScanClient + Clone + 'static;

    fn statuses(&self) -> &Self::Statuses;
    fn reviews(&self) -> &Self::Reviews;
    fn orchestrator(&self) -> &Self::Orchestrator;
    fn queue(&self) -> &Self::Queue;
    fn notifier(&self) -> &Self::Notifier;
    fn metrics(&self) -> &Self::Metrics;
    fn vendor_client(&self) -> &Self::Vendor;
}
