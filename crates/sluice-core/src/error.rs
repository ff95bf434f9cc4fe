//! Error types for Sluice

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for Sluice operations
pub type SluiceResult<T> = Result<T, SluiceError>;

/// Main error type for Sluice
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum SluiceError {
    /// The owning queue (or gate) was disposed before the work could be admitted
    #[error("queue disposed")]
    Disposed,

    /// A concurrency limit of zero was requested
    #[error("invalid concurrency limit {limit}: must be at least 1")]
    InvalidLimit { limit: usize },

    /// A single unit of work failed
    #[error("work failed: {0}")]
    Work(#[source] WorkFailure),

    /// One or more units of a batch failed
    #[error("{0}")]
    Aggregate(#[source] AggregateFailure),

    /// The awaited work did not finish in time
    #[error("timed out after {after:?}")]
    Timeout { after: Duration },

    /// The awaited work was cancelled through its token
    #[error("operation was cancelled")]
    Cancelled,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SluiceError {
    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a new timeout error
    pub const fn timeout(after: Duration) -> Self {
        Self::Timeout { after }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Disposed => "disposed",
            Self::InvalidLimit { .. } => "invalid_limit",
            Self::Work(_) => "work_failed",
            Self::Aggregate(_) => "aggregate_failed",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled => "cancelled",
            Self::Config(_) => "config",
        }
    }

    /// The underlying work failure, if this error carries one.
    ///
    /// For aggregates this is the primary (first settled) failure.
    pub fn work_failure(&self) -> Option<&WorkFailure> {
        match self {
            Self::Work(failure) => Some(failure),
            Self::Aggregate(aggregate) => Some(aggregate.primary()),
            _ => None,
        }
    }
}

impl From<WorkFailure> for SluiceError {
    fn from(failure: WorkFailure) -> Self {
        Self::Work(failure)
    }
}

impl From<AggregateFailure> for SluiceError {
    fn from(failure: AggregateFailure) -> Self {
        Self::Aggregate(failure)
    }
}

/// Failure of one unit of work.
///
/// The same failure is handed to the caller's handle and to every
/// unhandled-error observer, so it is shared rather than copied.
#[derive(Clone)]
pub struct WorkFailure {
    cause: Arc<anyhow::Error>,
}

impl WorkFailure {
    /// Wrap any error produced by a caller-supplied action
    pub fn new(error: impl Into<anyhow::Error>) -> Self {
        Self {
            cause: Arc::new(error.into()),
        }
    }

    /// Failure raised by a panicking action
    pub fn panic(message: impl Into<String>) -> Self {
        Self::new(PanicError {
            message: message.into(),
        })
    }

    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        Self::panic(message)
    }

    /// The original error
    pub fn cause(&self) -> &anyhow::Error {
        &self.cause
    }

    /// Downcast the original error to a concrete type
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.cause.downcast_ref::<E>()
    }

    /// Whether the action panicked instead of returning an error
    pub fn is_panic(&self) -> bool {
        self.cause.is::<PanicError>()
    }

    /// Whether both values carry the very same failure
    pub fn ptr_eq(&self, other: &WorkFailure) -> bool {
        Arc::ptr_eq(&self.cause, &other.cause)
    }
}

impl fmt::Debug for WorkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WorkFailure").field(&self.cause).finish()
    }
}

impl fmt::Display for WorkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cause)
    }
}

impl std::error::Error for WorkFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.source()
    }
}

/// Payload of a caught panic
#[derive(Error, Debug)]
#[error("action panicked: {message}")]
pub struct PanicError {
    pub message: String,
}

/// Failure of a batch (`times` / `map`).
///
/// Every failed slot is preserved in the order it settled. The first one is the
/// primary cause.
#[derive(Debug, Clone)]
pub struct AggregateFailure {
    failures: Vec<(usize, WorkFailure)>,
}

impl AggregateFailure {
    /// Build an aggregate; `failures` must not be empty
    pub(crate) fn new(failures: Vec<(usize, WorkFailure)>) -> Self {
        debug_assert!(!failures.is_empty(), "aggregate without failures");
        Self { failures }
    }

    /// The first failure to settle
    pub fn primary(&self) -> &WorkFailure {
        &self.failures[0].1
    }

    /// Index of the slot that produced the primary failure
    pub fn primary_index(&self) -> usize {
        self.failures[0].0
    }

    /// All failures with their slot index, in settle order
    pub fn failures(&self) -> &[(usize, WorkFailure)] {
        &self.failures
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for AggregateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of the batch units failed; first at index {}: {}",
            self.failures.len(),
            self.primary_index(),
            self.primary()
        )
    }
}

impl std::error::Error for AggregateFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.primary())
    }
}
