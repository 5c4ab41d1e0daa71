//! Retry bounds for redelivered messages.
//!
//! Each poll of the redrive queues is at least fifteen minutes apart, so the
//! lower limit is roughly six hours of retrying and the upper limit roughly
//! two days. They are policy constants rather than something derived from
//! the poll interval.

use serde::{Deserialize, Serialize};

use crate::metrics::Metric;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryLimits {
    /// Past this many attempts a message is still redelivered, with a warning.
    pub lower: u64,
    /// Past this many attempts a message is dropped.
    pub upper: u64,
}

impl RetryLimits {
    pub const FIXED: RetryLimits = RetryLimits {
        lower: 24,
        upper: 192,
    };

    /// Decides the fate of a message that has been retried `retry_count`
    /// times so far. The comparison is made on the incremented count.
    pub fn evaluate(&self, retry_count: u64) -> RetryVerdict {
        let next = retry_count.saturating_add(1);
        if next > self.upper {
            RetryVerdict::Discard { retry_count: next }
        } else if next > self.lower {
            RetryVerdict::RedeliverWithWarning { retry_count: next }
        } else {
            RetryVerdict::Redeliver { retry_count: next }
        }
    }
}

impl Default for RetryLimits {
    fn default() -> Self {
        Self::FIXED
    }
}

/// What to do with one redelivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryVerdict {
    Redeliver { retry_count: u64 },
    RedeliverWithWarning { retry_count: u64 },
    Discard { retry_count: u64 },
}

impl RetryVerdict {
    /// The incremented count to store in the redelivered payload.
    pub fn retry_count(&self) -> u64 {
        match *self {
            RetryVerdict::Redeliver { retry_count }
            | RetryVerdict::RedeliverWithWarning { retry_count }
            | RetryVerdict::Discard { retry_count } => retry_count,
        }
    }

    pub fn should_redeliver(&self) -> bool {
        !matches!(self, RetryVerdict::Discard { .. })
    }

    pub fn metric(&self) -> Option<Metric> {
        match self {
            RetryVerdict::Redeliver { .. } => None,
            RetryVerdict::RedeliverWithWarning { .. } => Some(Metric::RetryLowerLimitCrossed),
            RetryVerdict::Discard { .. } => Some(Metric::RetryUpperLimitCrossed),
        }
    }
}
