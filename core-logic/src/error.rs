//! # Core Error Types
//!
//! Centralized error definitions for the core-logic crate.
//! All errors implement `std::error::Error` and `std::fmt::Display`.

use thiserror::Error;

/// Durable store errors.
///
/// `Corrupt` signals a value that exists but no longer decodes. It is kept
/// separate from backend failures because a corrupt watermark or record is
/// an invariant violation, not a retriable condition.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage backend failure: {msg}")]
    Backend { msg: String },

    #[error("corrupt value under key '{key}': {msg}")]
    Corrupt { key: String, msg: String },
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend { msg: e.to_string() }
    }
}

/// Configuration-related errors
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("failed to load config from '{path}': {reason}")]
    LoadFailed { path: String, reason: String },

    #[error("missing required configuration field: '{field}'")]
    MissingField { field: String },

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("file not found: {path}")]
    FileNotFound { path: String },

    #[error("I/O error reading {path}: {msg}")]
    IoError { path: String, msg: String },
}
