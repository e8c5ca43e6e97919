//! Common error types for lexd

use thiserror::Error;

/// Common result type for lexd operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the lexd backend
#[derive(Error, Debug)]
pub enum Error {
    /// Relational store error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Canonical document store unreachable or rejected a query
    #[error("Canonical store error: {0}")]
    Store(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested range or element not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input: missing/duplicate id, circular parent reference,
    /// invalid migration request, or in-use deletion without a migration
    #[error("Validation error: {0}")]
    Validation(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
