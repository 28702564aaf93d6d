//! Error types for hibikido-server
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation. Store errors bubble up from hibikido-common unchanged.

use thiserror::Error;

/// Main error type for the server
#[derive(Error, Debug)]
pub enum Error {
    /// Document store and schema errors
    #[error("{0}")]
    Store(#[from] hibikido_common::Error),

    /// Embedding provider failures (unknown model, degenerate input)
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// Vector index corruption or dimension mismatch
    #[error("Index error: {0}")]
    Index(String),

    /// Index file persistence
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed incoming message or argument blob
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// OSC socket errors
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Convenience Result type using the server Error
pub type Result<T> = std::result::Result<T, Error>;
