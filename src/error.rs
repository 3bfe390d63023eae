// src/error.rs
//! Error taxonomy shared by the stores, the reputation aggregator and the stage runner.

use thiserror::Error;

/// Failures reported by the blob / record store collaborators.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object '{key}' not found in bucket '{bucket}'")]
    NotFound { bucket: String, key: String },
    /// A conditional write was rejected because its guard did not hold.
    #[error("conditional check failed")]
    ConditionFailed,
    /// Concurrent writers raced on the same item.
    #[error("write conflict on '{0}'")]
    Conflict(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// The update cannot be applied to the stored item (e.g. adding to a string).
    #[error("invalid update: {0}")]
    InvalidUpdate(String),
    /// The bucket/key pair does not name a location inside the store.
    #[error("invalid object location '{0}'")]
    InvalidKey(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Per-record failures of a stage invocation.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("source object '{key}' missing from bucket '{bucket}'")]
    BlobNotFound { bucket: String, key: String },
    #[error("record store conflict persisted after {attempts} attempts: {detail}")]
    RecordStoreConflict { attempts: u32, detail: String },
    #[error("malformed review: {0}")]
    MalformedReview(String),
    #[error("store temporarily unavailable: {0}")]
    TransientStoreUnavailable(String),
    #[error("stored record rejected the update: {0}")]
    InvalidRecord(String),
    #[error("object key cannot be stored: {0}")]
    InvalidObjectKey(String),
    #[error("invocation budget elapsed")]
    Timeout,
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration that parsed but cannot be used.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("REVIEW_ANALYZER_CONFIG points to non-existent path '{0}'")]
    MissingPath(String),
    #[error("unsupported config format '{0}' (expected toml or json)")]
    UnsupportedFormat(String),
    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl AnalyzerError {
    /// Stable label used in metrics and batch reports.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalyzerError::BlobNotFound { .. } => "blob_not_found",
            AnalyzerError::RecordStoreConflict { .. } => "record_store_conflict",
            AnalyzerError::MalformedReview(_) => "malformed_review",
            AnalyzerError::TransientStoreUnavailable(_) => "transient_store_unavailable",
            AnalyzerError::InvalidRecord(_) => "invalid_record",
            AnalyzerError::InvalidObjectKey(_) => "invalid_object_key",
            AnalyzerError::Timeout => "timeout",
            AnalyzerError::Serialization(_) => "serialization",
        }
    }

    /// Whether redelivering the triggering event may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AnalyzerError::RecordStoreConflict { .. }
                | AnalyzerError::TransientStoreUnavailable(_)
                | AnalyzerError::Timeout
        )
    }
}

impl From<StoreError> for AnalyzerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { bucket, key } => AnalyzerError::BlobNotFound { bucket, key },
            StoreError::Conflict(detail) => AnalyzerError::RecordStoreConflict {
                attempts: 1,
                detail,
            },
            // A rejected guard that escaped the aggregator means the store changed under us.
            StoreError::ConditionFailed => AnalyzerError::RecordStoreConflict {
                attempts: 1,
                detail: "unexpected conditional check failure".into(),
            },
            StoreError::Unavailable(m) => AnalyzerError::TransientStoreUnavailable(m),
            StoreError::InvalidUpdate(m) => AnalyzerError::InvalidRecord(m),
            StoreError::InvalidKey(m) => AnalyzerError::InvalidObjectKey(m),
            StoreError::Io(e) => AnalyzerError::TransientStoreUnavailable(e.to_string()),
        }
    }
}
