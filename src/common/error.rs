//! Error types for the parity harness
//!
//! Only setup problems (bad configuration, unreadable reports, invalid
//! identifiers) are raised as errors. Per-unit failures such as a renderer
//! crash or a blank frame are recorded as data on the result instead, so one
//! bad case never aborts a batch.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the parity harness
#[derive(Error, Debug)]
pub enum Error {
    // === Catalog / Identity Errors ===
    #[error("Invalid {kind} '{value}': only ASCII letters, digits, '-', '_' and '.' are allowed")]
    InvalidIdentifier { kind: &'static str, value: String },

    #[error("Case '{0}' is defined more than once in the catalog")]
    DuplicateCase(String),

    #[error("Invalid viewport '{0}'. Expected WIDTHxHEIGHT, e.g. 1280x800")]
    InvalidViewport(String),

    #[error("Invalid shard {index}/{count}: shard count must be >= 1 and index < count")]
    InvalidShard { index: usize, count: usize },

    // === Tool Errors ===
    #[error("{tool} tool is unavailable: {reason}")]
    ToolUnavailable { tool: String, reason: String },

    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    #[error("Capture timed out after {0:?}")]
    CaptureTimeout(Duration),

    #[error("Compare failed: {0}")]
    CompareFailed(String),

    #[error("Compare timed out after {0:?}")]
    CompareTimeout(Duration),

    // === Report Errors ===
    #[error("Could not find report '{0}'. Pass a report path or a run id under the results root")]
    ReportNotFound(String),

    #[error("No data to aggregate: {0}")]
    NothingToAggregate(String),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Invalid case catalog: {0}")]
    CatalogParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an invalid identifier error
    pub fn invalid_identifier(kind: &'static str, value: &str) -> Self {
        Self::InvalidIdentifier {
            kind,
            value: value.to_string(),
        }
    }

    /// Create a tool unavailable error
    pub fn tool_unavailable(tool: &str, reason: &str) -> Self {
        Self::ToolUnavailable {
            tool: tool.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a file read error from a path and io error
    pub fn file_read(path: &std::path::Path, error: io::Error) -> Self {
        Self::FileRead {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }

    /// Whether this error came from an expired tool timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::CaptureTimeout(_) | Error::CompareTimeout(_))
    }
}
