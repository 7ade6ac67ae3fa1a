//! Error types for tver-dl
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (Config, Database, ExternalTool, etc.)
//! - A `Result` alias used throughout the crate
//!
//! Errors raised while processing a single series are contained at the
//! pipeline boundary and reported by series name; they never abort sibling
//! series. Only configuration errors are fatal at startup.

use thiserror::Error;

/// Result type alias for tver-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tver-dl
///
/// This is the primary error type used throughout the library. Each variant
/// includes contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "history.database_url")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// External tool execution failed (yt-dlp spawn or exec error)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Episode extraction exceeded its time bound
    #[error("extraction timed out after {timeout_secs}s for {url}")]
    ExtractionTimeout {
        /// The series URL being extracted when the timeout fired
        url: String,
        /// The configured timeout in seconds
        timeout_secs: u64,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error (TVer platform API)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Construct a configuration error for a specific config key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to the history database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to create or migrate the history schema
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}
