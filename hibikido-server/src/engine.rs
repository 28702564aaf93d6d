//! Retrieval engine
//!
//! Binds the embedding provider, the vector index, the text composer and the
//! document store. Ingest composes the hierarchical embedding text, embeds
//! it, appends to the index and persists the document with its row; search
//! resolves index hits back to documents through the row namespace.
//!
//! The index sits behind a single writer lock: ingest and rebuild serialize
//! against each other and against searches. Vector-append precedes document
//! persist, so a failure in between orphans a row; orphans resolve to no
//! document at search time and are cleaned by [`rebuild_index`].
//!
//! [`rebuild_index`]: RetrievalEngine::rebuild_index

use crate::embedding::Embedder;
use crate::index::VectorIndex;
use crate::text;
use crate::Result;
use hibikido_common::db::{
    validate_segment_fields, Database, Effect, NewPreset, NewSegment, Preset, Recording, Segment,
};
use hibikido_common::db::init::DEFAULT_SEGMENTATION_ID;
use hibikido_common::Error as StoreError;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// One resolved search hit
#[derive(Debug, Clone)]
pub struct Hit {
    /// Collection tag: "segments" or "presets"
    pub collection: &'static str,
    pub row: usize,
    pub score: f32,
    pub document: HitDocument,
}

#[derive(Debug, Clone)]
pub enum HitDocument {
    Segment(Segment),
    Preset(Preset),
}

/// Ingest fields for a segment (`/add_segment`)
#[derive(Debug, Clone)]
pub struct SegmentIngest {
    pub source_path: String,
    pub segmentation_id: String,
    pub start: f64,
    pub end: f64,
    pub description: String,
    pub freq_low: Option<f64>,
    pub freq_high: Option<f64>,
    pub duration: Option<f64>,
}

/// Ingest fields for a preset (`/add_preset`)
#[derive(Debug, Clone)]
pub struct PresetIngest {
    pub effect_path: String,
    /// JSON array of ordered (name, value) pairs
    pub parameters: String,
    pub description: String,
}

/// Outcome counts of an index rebuild
#[derive(Debug, Clone, Copy, Default)]
pub struct RebuildStats {
    pub segments: usize,
    pub presets: usize,
    pub errors: usize,
}

pub struct RetrievalEngine {
    db: Database,
    embedder: Box<dyn Embedder>,
    index: RwLock<VectorIndex>,
    index_file: PathBuf,
}

impl RetrievalEngine {
    pub fn new(
        db: Database,
        embedder: Box<dyn Embedder>,
        index: VectorIndex,
        index_file: PathBuf,
    ) -> Self {
        Self {
            db,
            embedder,
            index: RwLock::new(index),
            index_file,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Number of embeddings currently in the index
    pub async fn embeddings(&self) -> usize {
        self.index.read().await.len()
    }

    /// Persist the in-memory index (also done after every ingest)
    pub async fn save_index(&self) -> Result<()> {
        self.index.read().await.save(&self.index_file)
    }

    /// Upsert a recording; the first insert auto-creates a full-length segment
    ///
    /// Re-adding an existing path refreshes the description and leaves the
    /// index untouched.
    pub async fn ingest_recording(
        &self,
        path: &str,
        description: &str,
    ) -> Result<(Recording, Option<Segment>)> {
        let (recording, created) = self.db.add_recording(path, description).await?;
        if !created {
            return Ok((recording, None));
        }

        let segment = self
            .ingest_segment(SegmentIngest {
                source_path: path.to_string(),
                segmentation_id: DEFAULT_SEGMENTATION_ID.to_string(),
                start: 0.0,
                end: 1.0,
                description: description.to_string(),
                freq_low: None,
                freq_high: None,
                duration: None,
            })
            .await?;
        Ok((recording, Some(segment)))
    }

    /// Upsert an effect; the first insert auto-creates a default preset
    pub async fn ingest_effect(
        &self,
        path: &str,
        name: &str,
        description: &str,
    ) -> Result<(Effect, Option<Preset>)> {
        let (effect, created) = self.db.add_effect(path, name, description).await?;
        if !created {
            return Ok((effect, None));
        }

        let preset = self
            .ingest_preset(PresetIngest {
                effect_path: path.to_string(),
                parameters: "[]".to_string(),
                description: description.to_string(),
            })
            .await?;
        Ok((effect, Some(preset)))
    }

    /// Validate, compose, embed, index and persist a segment
    ///
    /// Field validation runs before the embed/append sequence: a rejected
    /// request must not grow the index.
    pub async fn ingest_segment(&self, fields: SegmentIngest) -> Result<Segment> {
        validate_segment_fields(
            fields.start,
            fields.end,
            fields.freq_low,
            fields.freq_high,
            fields.duration,
        )?;

        let recording = self
            .db
            .recording_by_path(&fields.source_path)
            .await?
            .ok_or_else(|| {
                StoreError::DanglingReference(format!(
                    "unknown source recording: {}",
                    fields.source_path
                ))
            })?;
        let segmentation = self
            .db
            .segmentation_by_id(&fields.segmentation_id)
            .await?
            .ok_or_else(|| {
                StoreError::DanglingReference(format!(
                    "unknown segmentation: {}",
                    fields.segmentation_id
                ))
            })?;

        let embedding_text = text::segment_text(
            &fields.description,
            &segmentation.description,
            &recording.description,
        );
        let vector = self.embedder.embed(&embedding_text)?;

        let mut index = self.index.write().await;
        let row = index.add(&vector)?;
        index.save(&self.index_file)?;

        let segment = self
            .db
            .add_segment(NewSegment {
                source_path: fields.source_path,
                segmentation_id: fields.segmentation_id,
                start: fields.start,
                end: fields.end,
                description: fields.description,
                embedding_text,
                vector_row: Some(row as i64),
                freq_low: fields.freq_low,
                freq_high: fields.freq_high,
                duration: fields.duration,
            })
            .await?;

        debug!("Ingested segment {} at row {}", segment.id, row);
        Ok(segment)
    }

    /// Validate, compose, embed, index and persist a preset
    pub async fn ingest_preset(&self, fields: PresetIngest) -> Result<Preset> {
        let effect = self
            .db
            .effect_by_path(&fields.effect_path)
            .await?
            .ok_or_else(|| {
                StoreError::DanglingReference(format!("unknown effect: {}", fields.effect_path))
            })?;

        let embedding_text = text::preset_text(&fields.description, &effect.description);
        let vector = self.embedder.embed(&embedding_text)?;

        let mut index = self.index.write().await;
        let row = index.add(&vector)?;
        index.save(&self.index_file)?;

        let preset = self
            .db
            .add_preset(NewPreset {
                effect_path: fields.effect_path,
                parameters: fields.parameters,
                description: fields.description,
                embedding_text,
                vector_row: Some(row as i64),
            })
            .await?;

        debug!("Ingested preset {} at row {}", preset.id, row);
        Ok(preset)
    }

    /// Semantic search: enhance, embed, top-k, resolve rows to documents
    ///
    /// Hits below `min_score` are dropped; the index's descending-score order
    /// is preserved. `k = 0` yields no hits.
    pub async fn search(&self, query: &str, k: usize, min_score: f32) -> Result<Vec<Hit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let enhanced = text::enhance_query(query);
        if enhanced.is_empty() {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed(&enhanced)?;

        let index = self.index.read().await;
        let scored = index.search(&vector, k)?;

        let mut hits = Vec::with_capacity(scored.len());
        for (row, score) in scored {
            if score < min_score {
                continue;
            }
            if let Some(segment) = self.db.segment_by_row(row as i64).await? {
                hits.push(Hit {
                    collection: "segments",
                    row,
                    score,
                    document: HitDocument::Segment(segment),
                });
            } else if let Some(preset) = self.db.preset_by_row(row as i64).await? {
                hits.push(Hit {
                    collection: "presets",
                    row,
                    score,
                    document: HitDocument::Preset(preset),
                });
            } else {
                // Orphaned row from an interrupted ingest; rebuild cleans it
                debug!("Row {} resolves to no document", row);
            }
        }

        debug!("Search '{}' returned {} hits", query, hits.len());
        Ok(hits)
    }

    /// Re-embed everything and reassign rows in stable iteration order
    ///
    /// Atomic per document: a document that fails to re-embed is recorded in
    /// the returned stats and left without a row; all others keep their new
    /// assignment. Running a rebuild twice yields identical assignments.
    pub async fn rebuild_index(&self) -> Result<RebuildStats> {
        info!("Rebuilding vector index");
        let mut index = self.index.write().await;

        let segments = self.db.all_segments().await?;
        let presets = self.db.all_presets().await?;
        self.db.clear_vector_rows().await?;

        let mut fresh = VectorIndex::new(self.embedder.dim());
        let mut stats = RebuildStats::default();

        for segment in segments {
            match self.reembed_segment(&mut fresh, &segment).await {
                Ok(()) => stats.segments += 1,
                Err(e) => {
                    warn!("Failed to re-embed segment {}: {}", segment.id, e);
                    stats.errors += 1;
                }
            }
        }

        for preset in presets {
            match self.reembed_preset(&mut fresh, &preset).await {
                Ok(()) => stats.presets += 1,
                Err(e) => {
                    warn!("Failed to re-embed preset {}: {}", preset.id, e);
                    stats.errors += 1;
                }
            }
        }

        fresh.save(&self.index_file)?;
        *index = fresh;

        info!(
            "Index rebuilt: {} segments, {} presets, {} errors",
            stats.segments, stats.presets, stats.errors
        );
        Ok(stats)
    }

    async fn reembed_segment(&self, index: &mut VectorIndex, segment: &Segment) -> Result<()> {
        let recording = self.db.recording_by_path(&segment.source_path).await?;
        let segmentation = self.db.segmentation_by_id(&segment.segmentation_id).await?;

        let embedding_text = text::segment_text(
            &segment.description,
            segmentation.as_ref().map(|s| s.description.as_str()).unwrap_or(""),
            recording.as_ref().map(|r| r.description.as_str()).unwrap_or(""),
        );
        let vector = self.embedder.embed(&embedding_text)?;
        let row = index.add(&vector)?;
        self.db
            .update_segment_embedding(&segment.id, row as i64, &embedding_text)
            .await?;
        Ok(())
    }

    async fn reembed_preset(&self, index: &mut VectorIndex, preset: &Preset) -> Result<()> {
        let effect = self.db.effect_by_path(&preset.effect_path).await?;

        let embedding_text = text::preset_text(
            &preset.description,
            effect.as_ref().map(|e| e.description.as_str()).unwrap_or(""),
        );
        let vector = self.embedder.embed(&embedding_text)?;
        let row = index.add(&vector)?;
        self.db
            .update_preset_embedding(&preset.id, row as i64, &embedding_text)
            .await?;
        Ok(())
    }
}
