//! URL review reconciler - keeps compliance-review state consistent for
//! submitted URLs under concurrent, at-least-once signal delivery.
//!
//! This library provides the reconciliation engine (determinator, variant
//! dedup, redrive governor), the collaborator interfaces it runs against,
//! and in-memory implementations of them.

pub mod canon;
pub mod config;
pub mod dedupe;
pub mod determinator;
pub mod error;
pub mod governor;
pub mod memory;
pub mod metrics;
pub mod notify;
pub mod ports;
pub mod server;
pub mod types;

#[cfg(test)]
pub mod test_utils;
