//! Pub/sub notifier for outbound status changes.

use std::future::Future;

use crate::error::DependencyError;
use crate::notify::StatusNotification;

/// Best-effort publisher. Callers log and meter failures and carry on.
pub trait Notifier: Send + Sync {
    fn publish(
        &self,
        topic: &str,
        event: &StatusNotification,
    ) -> impl Future<Output = Result<(), DependencyError>> + Send;
}
