//! Database models
//!
//! Documents mirror the hierarchical schema: recordings own segments (via
//! path), effects own presets (via path), segmentations describe the batch
//! that produced a set of segments. `vector_row` is the document's position
//! in the vector index; `None` means the document is not yet searchable.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable source audio file
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Recording {
    pub id: String,
    pub path: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// A named method/run that produced a batch of segments
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Segmentation {
    pub id: String,
    pub method: String,
    /// Open-form parameter map, stored as JSON text
    pub parameters: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// A timestamped slice of a recording
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Segment {
    pub id: String,
    pub source_path: String,
    pub segmentation_id: String,
    /// Normalized start within the recording, in [0, 1)
    #[sqlx(rename = "start_norm")]
    pub start: f64,
    /// Normalized end within the recording, in (start, 1]
    #[sqlx(rename = "end_norm")]
    pub end: f64,
    pub description: String,
    pub embedding_text: String,
    pub vector_row: Option<i64>,
    /// Static frequency band metadata in Hz
    pub freq_low: Option<f64>,
    pub freq_high: Option<f64>,
    /// Playback duration in seconds
    pub duration: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Audio processing tool
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Effect {
    pub id: String,
    pub path: String,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// A named configuration of an effect
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Preset {
    pub id: String,
    pub effect_path: String,
    /// Ordered (name, value) pairs, stored as a JSON array
    pub parameters: String,
    pub description: String,
    pub embedding_text: String,
    pub vector_row: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Session log root; invocations append to it
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Performance {
    pub id: String,
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Fields for a new segment insert
#[derive(Debug, Clone)]
pub struct NewSegment {
    pub source_path: String,
    pub segmentation_id: String,
    pub start: f64,
    pub end: f64,
    pub description: String,
    pub embedding_text: String,
    pub vector_row: Option<i64>,
    pub freq_low: Option<f64>,
    pub freq_high: Option<f64>,
    pub duration: Option<f64>,
}

/// Fields for a new preset insert
#[derive(Debug, Clone)]
pub struct NewPreset {
    pub effect_path: String,
    /// JSON array of ordered (name, value) pairs
    pub parameters: String,
    pub description: String,
    pub embedding_text: String,
    pub vector_row: Option<i64>,
}

/// Schema validation for client-supplied segment fields
///
/// Pure checks, shared by the store insert and the ingest path so a bad
/// request can be rejected before anything durable happens.
pub fn validate_segment_fields(
    start: f64,
    end: f64,
    freq_low: Option<f64>,
    freq_high: Option<f64>,
    duration: Option<f64>,
) -> Result<()> {
    if !(0.0..1.0).contains(&start) || end <= start || end > 1.0 {
        return Err(Error::InvalidDocument(format!(
            "segment bounds out of range: start={} end={}",
            start, end
        )));
    }
    match (freq_low, freq_high) {
        (Some(low), Some(high)) if low >= high => {
            return Err(Error::InvalidDocument(format!(
                "frequency bounds inverted: {} >= {}",
                low, high
            )));
        }
        (Some(_), None) | (None, Some(_)) => {
            return Err(Error::InvalidDocument(
                "frequency bounds must be given together".into(),
            ));
        }
        _ => {}
    }
    if let Some(duration) = duration {
        if duration <= 0.0 {
            return Err(Error::InvalidDocument(format!(
                "duration must be positive: {}",
                duration
            )));
        }
    }
    Ok(())
}

/// Per-collection document counts
#[derive(Debug, Clone, Copy, Default)]
pub struct DbStats {
    pub recordings: i64,
    pub segments: i64,
    pub effects: i64,
    pub presets: i64,
    /// Documents currently holding a vector-index row
    pub embeddings: i64,
}
