use thiserror::Error;

/// Errors raised by the storage ports.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<String> for DomainError {
    fn from(s: String) -> Self {
        DomainError::Database(s)
    }
}

impl From<&str> for DomainError {
    fn from(s: &str) -> Self {
        DomainError::InvalidInput(s.to_string())
    }
}

/// Error taxonomy of the review pipeline.
///
/// - `Transient`: network / rate-limit failures, retried with backoff.
/// - `Validation`: a malformed or ineligible candidate, skipped and counted.
/// - `Fatal`: storage failure or unrecoverable state, aborts the run.
/// - `LockBusy`: a run is already in flight, silently ignored by callers.
/// - `Timeout`: a run exceeded its maximum wall-clock duration.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReviewError {
    #[error("Transient external error: {0}")]
    Transient(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Fatal pipeline error: {0}")]
    Fatal(String),

    #[error("A review run is already in progress")]
    LockBusy,

    #[error("Review run timed out after {0}s")]
    Timeout(u64),
}

impl ReviewError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ReviewError::Transient(_))
    }
}

impl From<DomainError> for ReviewError {
    fn from(e: DomainError) -> Self {
        ReviewError::Fatal(e.to_string())
    }
}
