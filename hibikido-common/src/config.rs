//! Configuration loading
//!
//! The server reads a single JSON document tree. Every section and field
//! carries a default so a partial (or absent) file still yields a complete
//! configuration.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration tree
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub database: DatabaseConfig,
    pub embedding: EmbeddingConfig,
    pub osc: OscConfig,
    pub search: SearchConfig,
    pub orchestrator: OrchestratorConfig,
}

/// Document store connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub uri: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            uri: "sqlite:hibikido.db".to_string(),
        }
    }
}

/// Embedding provider and vector index persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmbeddingConfig {
    pub model_name: String,
    pub index_file: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_name: "feature-hash".to_string(),
            index_file: "hibikido.index".to_string(),
        }
    }
}

/// OSC transport endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OscConfig {
    pub listen_ip: String,
    pub listen_port: u16,
    pub send_ip: String,
    pub send_port: u16,
}

impl Default for OscConfig {
    fn default() -> Self {
        Self {
            listen_ip: "127.0.0.1".to_string(),
            listen_port: 9000,
            send_ip: "127.0.0.1".to_string(),
            send_port: 9001,
        }
    }
}

/// Search parameters for `/invoke`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    pub top_k: usize,
    pub min_score: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            min_score: 0.3,
        }
    }
}

/// Chōwasha orchestrator tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrchestratorConfig {
    /// Maximum allowed logarithmic frequency overlap, in (0, 1]
    pub overlap_threshold: f64,
    /// Seconds between orchestrator ticks
    pub tick_interval: f64,
    /// Admissions attempted per tick
    pub max_admits_per_tick: usize,
    /// Fallbacks for sounds missing frequency/duration metadata
    pub default_duration: f64,
    pub default_freq_low: f64,
    pub default_freq_high: f64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            overlap_threshold: 0.2,
            tick_interval: 0.1,
            max_admits_per_tick: 5,
            default_duration: 1.0,
            default_freq_low: 200.0,
            default_freq_high: 2000.0,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("cannot parse {}: {}", path.display(), e)))
    }

    /// Load from an optional path, falling back to defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.osc.listen_port, 9000);
        assert_eq!(config.osc.send_port, 9001);
        assert_eq!(config.search.top_k, 10);
        assert!((config.search.min_score - 0.3).abs() < f32::EPSILON);
        assert!((config.orchestrator.overlap_threshold - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.orchestrator.max_admits_per_tick, 5);
    }

    #[test]
    fn partial_file_fills_missing_sections() {
        let config: Config =
            serde_json::from_str(r#"{"search": {"top_k": 3}}"#).unwrap();
        assert_eq!(config.search.top_k, 3);
        // Untouched sections keep their defaults
        assert!((config.search.min_score - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.osc.listen_port, 9000);
        assert_eq!(config.embedding.model_name, "feature-hash");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: std::result::Result<Config, _> =
            serde_json::from_str(r#"{"search": {"topk": 3}}"#);
        assert!(result.is_err());
    }
}
