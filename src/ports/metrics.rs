//! Counter sink.

use crate::metrics::Metric;

/// Receives metric increments. Infallible from the caller's view; sinks that
/// can fail must swallow and log.
pub trait MetricsSink: Send + Sync {
    fn incr(&self, metric: Metric);
}
