//! Error types for LessonForge Core
//!
//! This module defines the error taxonomy shared by every stage of the
//! generate -> validate -> repair -> compile pipeline.
//! We use `thiserror` for ergonomic error definitions with automatic Display/Error implementations.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::admission::AdmissionRejection;
use crate::lesson::LessonStatus;
use crate::validator::Violation;

/// Result type alias for LessonForge operations
pub type Result<T> = std::result::Result<T, ForgeError>;

/// Main error type for LessonForge operations
#[derive(Error, Debug)]
pub enum ForgeError {
    /// The outline was refused before any generation cost was incurred
    #[error("Admission rejected: {0}")]
    AdmissionRejected(#[from] AdmissionRejection),

    /// The client exhausted its request window
    #[error("Quota exceeded, retry after {retry_after_secs}s")]
    QuotaExceeded { retry_after_secs: u64 },

    /// Source still failed static validation after the repair budget was spent
    #[error("Validation rejected: {}", summarize_violations(.0))]
    ValidationRejected(Vec<Violation>),

    /// Translation produced unsafe or empty output, or the input was out of bounds
    #[error("Compilation failed: {0}")]
    CompilationFailed(String),

    /// The wall-clock budget for a request ran out
    #[error("Timed out after {0}s")]
    TimeoutExceeded(u64),

    /// The generation call itself failed
    #[error("Generation transport failure: {0}")]
    TransportFailure(String),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The same outline is still generating or was generated recently
    #[error("Duplicate request: lesson {0} already covers this outline")]
    DuplicateRequest(Uuid),

    /// Lesson record lookup failed
    #[error("Lesson not found: {0}")]
    LessonNotFound(Uuid),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        source: Box<ForgeError>,
    },
}

/// Errors related to lesson persistence
#[derive(Error, Debug, Clone)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid lesson state transition from {from} to {to}")]
    InvalidTransition { from: LessonStatus, to: LessonStatus },

    #[error("Corrupt lesson row {id}: {reason}")]
    CorruptRecord { id: String, reason: String },
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        StorageError::Database(e.to_string())
    }
}

impl From<rusqlite::Error> for ForgeError {
    fn from(e: rusqlite::Error) -> Self {
        ForgeError::Storage(e.into())
    }
}

/// Terminal failure classification surfaced to callers and persisted records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    AdmissionRejected,
    QuotaExceeded,
    ValidationRejected,
    CompilationFailed,
    TimeoutExceeded,
    TransportFailure,
    DuplicateRequest,
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::AdmissionRejected => "admission_rejected",
            FailureKind::QuotaExceeded => "quota_exceeded",
            FailureKind::ValidationRejected => "validation_rejected",
            FailureKind::CompilationFailed => "compilation_failed",
            FailureKind::TimeoutExceeded => "timeout_exceeded",
            FailureKind::TransportFailure => "transport_failure",
            FailureKind::DuplicateRequest => "duplicate_request",
            FailureKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ForgeError {
    /// Add context to an error
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Classify the error into the pipeline failure taxonomy
    pub fn kind(&self) -> FailureKind {
        match self {
            ForgeError::AdmissionRejected(_) => FailureKind::AdmissionRejected,
            ForgeError::QuotaExceeded { .. } => FailureKind::QuotaExceeded,
            ForgeError::ValidationRejected(_) => FailureKind::ValidationRejected,
            ForgeError::CompilationFailed(_) => FailureKind::CompilationFailed,
            ForgeError::TimeoutExceeded(_) => FailureKind::TimeoutExceeded,
            ForgeError::TransportFailure(_) => FailureKind::TransportFailure,
            ForgeError::DuplicateRequest(_) => FailureKind::DuplicateRequest,
            ForgeError::WithContext { source, .. } => source.kind(),
            _ => FailureKind::Internal,
        }
    }
}

fn summarize_violations(violations: &[Violation]) -> String {
    match violations {
        [] => "no violations recorded".to_string(),
        [only] => only.message.clone(),
        [first, rest @ ..] => format!("{} (+{} more)", first.message, rest.len()),
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to a Result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add lazy context to a Result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<ForgeError>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().context(f()))
    }
}
