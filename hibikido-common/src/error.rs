//! Common error types for Hibikidō

use thiserror::Error;

/// Common result type for Hibikidō operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the server and the library crates
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate unique path or id on insert
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Foreign-key target missing on insert
    #[error("Dangling reference: {0}")]
    DanglingReference(String),

    /// Document rejected by schema validation
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}
