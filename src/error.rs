//! Error taxonomy for the memory engine and the structured [`Outcome`] that
//! callers receive at an operation boundary.

use serde::Serialize;
use thiserror::Error;

/// Errors returned by record, journal, and query operations.
#[derive(Error, Debug)]
pub enum MemoryError {
    /// The requested entity or journal entry does not exist.
    #[error("{what} not found: {key}")]
    NotFound { what: &'static str, key: String },

    /// The request was well-formed but cannot be applied (e.g. no update fields).
    #[error("{0}")]
    Validation(String),

    /// Underlying SQLite failure: I/O, lock timeout, unclassified constraint violation.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Artifacts or tags could not be encoded/decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem failure while preparing a database location.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Validation,
    Storage,
}

impl MemoryError {
    pub fn not_found(what: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            key: key.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Storage(_) | Self::Serialization(_) | Self::Io(_) => ErrorKind::Storage,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

pub type Result<T> = std::result::Result<T, MemoryError>;

/// Structured success/failure mapping handed back across the tool boundary.
///
/// Serializes as `{"success": true, "data": ...}` or
/// `{"success": false, "error": "...", "kind": "not_found"}`.
#[derive(Debug, Serialize)]
pub struct Outcome<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl<T> From<Result<T>> for Outcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self {
                success: true,
                data: Some(data),
                error: None,
                kind: None,
            },
            Err(e) => Self {
                success: false,
                data: None,
                error: Some(e.to_string()),
                kind: Some(e.kind()),
            },
        }
    }
}

impl<T: Serialize> Outcome<T> {
    /// Render as a JSON string. Falls back to a hand-built failure object if
    /// the payload itself cannot be serialized.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            serde_json::json!({
                "success": false,
                "error": format!("serialization failed: {e}"),
                "kind": ErrorKind::Storage,
            })
            .to_string()
        })
    }
}
