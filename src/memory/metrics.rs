//! Counting metrics sink.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::trace;

use crate::metrics::Metric;
use crate::ports::MetricsSink;

use super::lock;

/// Counts every metric it receives. Used by tests to assert on emitted
/// metrics and by the local binary in place of a metrics backend.
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorder {
    counts: Arc<Mutex<HashMap<Metric, u64>>>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, metric: Metric) -> u64 {
        lock(&self.counts).get(&metric).copied().unwrap_or(0)
    }

    /// Sum over all metrics.
    pub fn total(&self) -> u64 {
        lock(&self.counts).values().sum()
    }
}

impl MetricsSink for MetricsRecorder {
    fn incr(&self, metric: Metric) {
        trace!(metric = %metric, "incr");
        *lock(&self.counts).entry(metric).or_insert(0) += 1;
    }
}
