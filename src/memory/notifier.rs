//! Recording notifier.

use std::sync::{Arc, Mutex};

use crate::error::{Dependency, DependencyError};
use crate::notify::StatusNotification;
use crate::ports::Notifier;

use super::{lock, take_failure};

/// Keeps every published event in order, with the topic it went to.
#[derive(Debug, Clone, Default)]
pub struct MemoryNotifier {
    published: Arc<Mutex<Vec<(String, StatusNotification)>>>,
    fail_next: Arc<Mutex<u32>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` publishes fail.
    pub fn fail_next(&self, n: u32) {
        *lock(&self.fail_next) = n;
    }

    /// Every event, whatever its topic.
    pub fn published(&self) -> Vec<StatusNotification> {
        lock(&self.published)
            .iter()
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub fn published_on(&self, topic: &str) -> Vec<StatusNotification> {
        lock(&self.published)
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, event)| event.clone())
            .collect()
    }
}

impl Notifier for MemoryNotifier {
    async fn publish(&self, topic: &str, event: &StatusNotification) -> Result<(), DependencyError> {
        if take_failure(&self.fail_next) {
            return Err(DependencyError::retryable(
                Dependency::Notifier,
                "injected publish failure",
            ));
        }
        lock(&self.published).push((topic.to_string(), event.clone()));
        Ok(())
    }
}
