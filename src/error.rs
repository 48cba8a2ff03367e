//! Typed failures returned by the segment engine.
//!
//! Validation problems ([`SegmentError::InvalidArgument`]) are detected before any
//! storage is touched. Storage failures inside a transaction are rolled back; when
//! the rollback itself fails, [`SegmentError::Rollback`] carries both causes.

use thiserror::Error;

/// Convenience alias used throughout the engine.
pub type Result<T, E = SegmentError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SegmentError {
    /// Empty or malformed slug, fraction outside `[1, 100]`, malformed date text.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Unknown segment slug or unknown user id.
    #[error("not found: {0}")]
    NotFound(String),

    /// Transaction begin, statement execution, or commit failure.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// A transaction failed and rolling it back failed as well.
    #[error("transaction error: {source}, rollback error: {rollback}")]
    Rollback {
        source: Box<SegmentError>,
        rollback: rusqlite::Error,
    },

    /// Report file could not be created or written.
    #[error("report i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The blocking task running a storage call panicked or was aborted.
    #[error("storage task failed: {0}")]
    Task(String),
}

impl SegmentError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// `true` for failures raised by the backing store, including failed rollbacks.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Rollback { .. })
    }

    /// `true` when the caller's context stopped the operation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rollback_error_reports_both_causes() {
        let err = SegmentError::Rollback {
            source: Box::new(SegmentError::Storage(rusqlite::Error::QueryReturnedNoRows)),
            rollback: rusqlite::Error::InvalidQuery,
        };
        let text = err.to_string();
        assert!(text.starts_with("transaction error: storage error:"));
        assert!(text.contains("rollback error:"));
        assert!(err.is_storage());
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn classification_helpers() {
        assert!(SegmentError::invalid("x").is_invalid_argument());
        assert!(SegmentError::not_found("x").is_not_found());
        assert!(SegmentError::Cancelled.is_cancelled());
        assert!(SegmentError::DeadlineExceeded.is_cancelled());
        assert!(!SegmentError::invalid("x").is_storage());
    }
}
