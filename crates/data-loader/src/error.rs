//! Error types for the data-loader crate.
//!
//! Ingestion never aborts on a single bad record: the loader and the
//! preprocessor collect these errors as rejection causes and keep going.
//! Only I/O failures on the data files themselves are fatal.

use crate::types::{ItemId, UserId};
use thiserror::Error;

/// Errors that can occur while loading, validating or preprocessing records
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataLoadError {
    /// File could not be found or opened
    #[error("Failed to open file: {path}")]
    FileNotFound { path: String },

    /// I/O error occurred while reading file
    #[error("I/O error: {0}")]
    IoError(String),

    /// Line in a data file couldn't be parsed
    #[error("Parse error at line {line} in {file}: {reason}")]
    ParseError {
        file: String,
        line: usize,
        reason: String,
    },

    /// A data field had an invalid value
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// Expected number of fields in a line doesn't match actual
    #[error("Expected at least {expected} fields but found {found} in line {line}")]
    FieldCountMismatch {
        expected: usize,
        found: usize,
        line: usize,
    },

    /// Rating references an item that is not in the catalog
    #[error("Rating by user {user_id} references unknown item {item_id}")]
    UnknownItem { user_id: UserId, item_id: ItemId },

    /// Item has neither overview text nor genres, so it cannot be vectorized
    #[error("Item {item_id} has no overview and no genres")]
    NotVectorizable { item_id: ItemId },

    /// Record failed a validation rule
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

impl From<std::io::Error> for DataLoadError {
    fn from(err: std::io::Error) -> Self {
        DataLoadError::IoError(err.to_string())
    }
}

impl DataLoadError {
    /// True for causes that only exclude the record from content vectorization.
    pub fn is_content_only(&self) -> bool {
        matches!(self, DataLoadError::NotVectorizable { .. })
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, DataLoadError>;
