//! # Hibikidō Common Library
//!
//! Shared code for the Hibikidō sound invocation server:
//! - Database models and queries (recordings, segments, effects, presets)
//! - Event types (ServerEvent enum) and the EventBus
//! - Configuration loading
//! - Error types

pub mod config;
pub mod db;
pub mod error;
pub mod events;

pub use error::{Error, Result};
