use crate::domain::benchmark::SeriesKey;
use thiserror::Error;

/// Errors raised by the history store when a run cannot be appended.
///
/// A failed append never leaves partial state behind.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unit mismatch for {key}: series uses '{expected}', run reported '{actual}'")]
    UnitMismatch {
        key: SeriesKey,
        expected: String,
        actual: String,
    },

    #[error("Duplicate commit {commit_id} for {key}")]
    DuplicateCommit { key: SeriesKey, commit_id: String },

    #[error("Invalid run: {reason}")]
    InvalidRun { reason: String },

    #[error("Storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}

/// First offending field of a rejected run payload.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Validation failed at {field}: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Errors surfaced to the CI caller when ingesting a run.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Malformed payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IngestError {
    /// Short label used for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            IngestError::Decode(_) => "decode",
            IngestError::Validation(_) => "validation",
            IngestError::Store(StoreError::UnitMismatch { .. }) => "unit_mismatch",
            IngestError::Store(StoreError::DuplicateCommit { .. }) => "duplicate_commit",
            IngestError::Store(StoreError::InvalidRun { .. }) => "invalid_run",
            IngestError::Store(StoreError::Storage(_)) => "storage",
        }
    }
}

/// A bulk import that stopped at its first failing run.
#[derive(Debug, Error)]
#[error("Import stopped at {suite}[{index}] after {applied} runs: {source}")]
pub struct ImportError {
    /// Runs appended before the failure; they stay in history.
    pub applied: usize,
    pub suite: String,
    pub index: usize,
    #[source]
    pub source: IngestError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_mismatch_formatting() {
        let error = StoreError::UnitMismatch {
            key: SeriesKey::new("Benchmark", "Locations (min)/Flow"),
            expected: "ns/iter".to_string(),
            actual: "ms".to_string(),
        };

        let msg = error.to_string();
        assert!(msg.contains("Benchmark::Locations (min)/Flow"));
        assert!(msg.contains("ns/iter"));
        assert!(msg.contains("ms"));
    }

    #[test]
    fn test_validation_error_names_field() {
        let error = ValidationError::new("benches[3].range", "expected '± <number>'");
        assert_eq!(
            error.to_string(),
            "Validation failed at benches[3].range: expected '± <number>'"
        );
        assert_eq!(IngestError::from(error).reason(), "validation");
    }
}
