//! Error taxonomy.
//!
//! Collaborator failures arrive as [`DependencyError`], categorized the moment
//! they are raised so that callers can decide on redelivery without inspecting
//! messages:
//!
//! - **Retryable** failures are transient (throttling, timeouts, 5xx). The
//!   signal is forwarded to the error queue and redelivered, bounded by the
//!   redrive governor.
//! - **NonRetryable** failures will never succeed (missing resource, rejected
//!   payload). They are logged and surfaced, never redelivered.
//!
//! The engine itself reports outcomes through [`ReconcileError`], whose
//! variants mirror how a signal is disposed of.

use std::fmt;
use thiserror::Error;

/// Boxed source error carried by [`DependencyError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The kind of collaborator failure, categorized for redelivery decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyErrorKind {
    /// Transient failure; safe to redeliver.
    Retryable,

    /// The request can never succeed as issued.
    NonRetryable,
}

impl DependencyErrorKind {
    pub fn is_retriable(&self) -> bool {
        matches!(self, DependencyErrorKind::Retryable)
    }
}

/// Which collaborator failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    Store,
    Orchestrator,
    Queue,
    Notifier,
    Vendor,
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Dependency::Store => "store",
            Dependency::Orchestrator => "orchestrator",
            Dependency::Queue => "queue",
            Dependency::Notifier => "notifier",
            Dependency::Vendor => "vendor",
        };
        f.write_str(s)
    }
}

/// A collaborator failure with categorization for redelivery decisions.
#[derive(Debug, Error)]
pub struct DependencyError {
    pub kind: DependencyErrorKind,

    pub dependency: Dependency,

    /// A human-readable description of the error.
    pub message: String,

    /// The client library error, if available.
    #[source]
    pub source: Option<BoxError>,
}

impl fmt::Display for DependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            DependencyErrorKind::Retryable => "retryable",
            DependencyErrorKind::NonRetryable => "non-retryable",
        };
        write!(f, "{} {} error: {}", self.dependency, kind, self.message)
    }
}

impl DependencyError {
    /// Creates a retryable error without an underlying source.
    pub fn retryable(dependency: Dependency, message: impl Into<String>) -> Self {
        Self {
            kind: DependencyErrorKind::Retryable,
            dependency,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a non-retryable error without an underlying source.
    pub fn non_retryable(dependency: Dependency, message: impl Into<String>) -> Self {
        Self {
            kind: DependencyErrorKind::NonRetryable,
            dependency,
            message: message.into(),
            source: None,
        }
    }

    /// Attaches the client library error that caused this failure.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn is_retriable(&self) -> bool {
        self.kind.is_retriable()
    }
}

/// Why a signal was judged stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// A conditional write found the record already moved by another writer.
    ConditionalWriteLost,

    /// The resume token was already consumed or has expired. The orchestrator
    /// does not tell the two apart.
    ResumeTokenInvalid,
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::ConditionalWriteLost => write!(f, "conditional write lost"),
            StaleReason::ResumeTokenInvalid => write!(f, "resume token no longer valid"),
        }
    }
}

/// How the engine disposes of a signal it could not act on.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Malformed or missing input. Never retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// Transient collaborator failure. Redelivered through the error queue.
    #[error(transparent)]
    RetryableDependency(DependencyError),

    /// Collaborator rejected the request permanently. Logged, not redelivered.
    #[error(transparent)]
    NonRetryableDependency(DependencyError),

    /// Another writer won, or the resume token is spent. Treated as success.
    #[error("stale signal: {0}")]
    StaleSignal(StaleReason),
}

impl ReconcileError {
    pub fn validation(message: impl Into<String>) -> Self {
        ReconcileError::Validation(message.into())
    }

    /// Returns true if the signal should be forwarded for redelivery.
    pub fn is_retriable(&self) -> bool {
        matches!(self, ReconcileError::RetryableDependency(_))
    }

    /// Returns true if the error is really a successful duplicate suppression.
    pub fn is_stale(&self) -> bool {
        matches!(self, ReconcileError::StaleSignal(_))
    }
}

impl From<DependencyError> for ReconcileError {
    fn from(e: DependencyError) -> Self {
        match e.kind {
            DependencyErrorKind::Retryable => ReconcileError::RetryableDependency(e),
            DependencyErrorKind::NonRetryable => ReconcileError::NonRetryableDependency(e),
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;
