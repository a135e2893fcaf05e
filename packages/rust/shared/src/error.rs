//! Error types for Leadsense.
//!
//! Library crates use [`LeadsenseError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Leadsense operations.
#[derive(Debug, thiserror::Error)]
pub enum LeadsenseError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while fetching a page or calling an API.
    #[error("network error: {0}")]
    Network(String),

    /// A request exceeded its deadline.
    #[error("timeout: {0}")]
    Timeout(String),

    /// JSON or HTML parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Structured extraction (completion API or reply handling) error.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// Web search API error.
    #[error("search error: {0}")]
    Search(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (missing profile, empty name, bad enum value, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A record does not exist or was soft-deleted.
    #[error("not found: {0}")]
    NotFound(String),

    /// A record with the same identity already exists.
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LeadsenseError>;

impl LeadsenseError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(what: impl Into<String>) -> Self {
        Self::Conflict(what.into())
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = LeadsenseError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = LeadsenseError::not_found("lead 42");
        assert_eq!(err.to_string(), "not found: lead 42");

        let err = LeadsenseError::validation("company_name must not be empty");
        assert!(err.to_string().contains("company_name"));
    }
}
