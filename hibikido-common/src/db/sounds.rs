//! Recordings, segmentations and segments

use super::{Database, NewSegment, Recording, Segment, Segmentation};
use crate::{Error, Result};
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

impl Database {
    /// Upsert a recording keyed by path
    ///
    /// Returns the stored document and whether it was newly created.
    /// Re-adding an existing path only refreshes the description.
    pub async fn add_recording(&self, path: &str, description: &str) -> Result<(Recording, bool)> {
        if path.is_empty() {
            return Err(Error::InvalidDocument("recording path is empty".into()));
        }

        if let Some(existing) = self.recording_by_path(path).await? {
            sqlx::query("UPDATE recordings SET description = ? WHERE path = ?")
                .bind(description)
                .bind(path)
                .execute(self.pool())
                .await?;
            debug!("Updated recording: {}", path);
            return Ok((
                Recording {
                    description: description.to_string(),
                    ..existing
                },
                false,
            ));
        }

        let recording = Recording {
            id: Uuid::new_v4().to_string(),
            path: path.to_string(),
            description: description.to_string(),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO recordings (id, path, description, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&recording.id)
        .bind(&recording.path)
        .bind(&recording.description)
        .bind(recording.created_at)
        .execute(self.pool())
        .await?;

        info!("Added recording: {}", path);
        Ok((recording, true))
    }

    pub async fn recording_by_path(&self, path: &str) -> Result<Option<Recording>> {
        let recording = sqlx::query_as::<_, Recording>(
            "SELECT id, path, description, created_at FROM recordings WHERE path = ?",
        )
        .bind(path)
        .fetch_optional(self.pool())
        .await?;
        Ok(recording)
    }

    /// Insert a segmentation; duplicate ids are conflicts
    pub async fn add_segmentation(
        &self,
        id: &str,
        method: &str,
        parameters: &str,
        description: &str,
    ) -> Result<Segmentation> {
        if self.segmentation_by_id(id).await?.is_some() {
            return Err(Error::Conflict(format!("segmentation '{}' already exists", id)));
        }

        let segmentation = Segmentation {
            id: id.to_string(),
            method: method.to_string(),
            parameters: parameters.to_string(),
            description: description.to_string(),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO segmentations (id, method, parameters, description, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&segmentation.id)
        .bind(&segmentation.method)
        .bind(&segmentation.parameters)
        .bind(&segmentation.description)
        .bind(segmentation.created_at)
        .execute(self.pool())
        .await?;

        info!("Added segmentation: {} ({})", id, method);
        Ok(segmentation)
    }

    pub async fn segmentation_by_id(&self, id: &str) -> Result<Option<Segmentation>> {
        let segmentation = sqlx::query_as::<_, Segmentation>(
            "SELECT id, method, parameters, description, created_at FROM segmentations WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(segmentation)
    }

    /// Insert a segment after schema validation and foreign-key checks
    pub async fn add_segment(&self, fields: NewSegment) -> Result<Segment> {
        validate_segment(&fields)?;

        if self.recording_by_path(&fields.source_path).await?.is_none() {
            return Err(Error::DanglingReference(format!(
                "unknown source recording: {}",
                fields.source_path
            )));
        }
        if self.segmentation_by_id(&fields.segmentation_id).await?.is_none() {
            return Err(Error::DanglingReference(format!(
                "unknown segmentation: {}",
                fields.segmentation_id
            )));
        }

        let segment = Segment {
            id: Uuid::new_v4().to_string(),
            source_path: fields.source_path,
            segmentation_id: fields.segmentation_id,
            start: fields.start,
            end: fields.end,
            description: fields.description,
            embedding_text: fields.embedding_text,
            vector_row: fields.vector_row,
            freq_low: fields.freq_low,
            freq_high: fields.freq_high,
            duration: fields.duration,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO segments (
                id, source_path, segmentation_id, start_norm, end_norm,
                description, embedding_text, vector_row, freq_low, freq_high,
                duration, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&segment.id)
        .bind(&segment.source_path)
        .bind(&segment.segmentation_id)
        .bind(segment.start)
        .bind(segment.end)
        .bind(&segment.description)
        .bind(&segment.embedding_text)
        .bind(segment.vector_row)
        .bind(segment.freq_low)
        .bind(segment.freq_high)
        .bind(segment.duration)
        .bind(segment.created_at)
        .execute(self.pool())
        .await?;

        info!("Added segment: {} - {}", segment.id, segment.description);
        Ok(segment)
    }

    pub async fn segment_by_id(&self, id: &str) -> Result<Option<Segment>> {
        let segment =
            sqlx::query_as::<_, Segment>("SELECT * FROM segments WHERE id = ?")
                .bind(id)
                .fetch_optional(self.pool())
                .await?;
        Ok(segment)
    }

    /// Reverse lookup from a vector-index row to its segment
    pub async fn segment_by_row(&self, row: i64) -> Result<Option<Segment>> {
        let segment =
            sqlx::query_as::<_, Segment>("SELECT * FROM segments WHERE vector_row = ?")
                .bind(row)
                .fetch_optional(self.pool())
                .await?;
        Ok(segment)
    }

    /// All segments in a stable order (used by index rebuild)
    pub async fn all_segments(&self) -> Result<Vec<Segment>> {
        let segments =
            sqlx::query_as::<_, Segment>("SELECT * FROM segments ORDER BY created_at, id")
                .fetch_all(self.pool())
                .await?;
        Ok(segments)
    }

    /// Assign a new vector row and embedding text to a segment
    pub async fn update_segment_embedding(
        &self,
        id: &str,
        vector_row: i64,
        embedding_text: &str,
    ) -> Result<()> {
        let updated =
            sqlx::query("UPDATE segments SET vector_row = ?, embedding_text = ? WHERE id = ?")
                .bind(vector_row)
                .bind(embedding_text)
                .bind(id)
                .execute(self.pool())
                .await?
                .rows_affected();

        if updated == 0 {
            return Err(Error::NotFound(format!("segment {}", id)));
        }
        Ok(())
    }

    /// Detach every document from the vector index (start of a rebuild)
    pub async fn clear_vector_rows(&self) -> Result<()> {
        sqlx::query("UPDATE segments SET vector_row = NULL")
            .execute(self.pool())
            .await?;
        sqlx::query("UPDATE presets SET vector_row = NULL")
            .execute(self.pool())
            .await?;
        Ok(())
    }
}

fn validate_segment(fields: &NewSegment) -> Result<()> {
    super::validate_segment_fields(
        fields.start,
        fields.end,
        fields.freq_low,
        fields.freq_high,
        fields.duration,
    )
}

#[cfg(test)]
mod tests {
    use super::super::test_db;
    use super::*;
    use crate::db::init::DEFAULT_SEGMENTATION_ID;

    fn new_segment(source_path: &str) -> NewSegment {
        NewSegment {
            source_path: source_path.to_string(),
            segmentation_id: DEFAULT_SEGMENTATION_ID.to_string(),
            start: 0.0,
            end: 1.0,
            description: "forest wind".to_string(),
            embedding_text: "forest wind".to_string(),
            vector_row: Some(0),
            freq_low: None,
            freq_high: None,
            duration: None,
        }
    }

    #[tokio::test]
    async fn recording_upsert_updates_in_place() {
        let db = test_db().await;

        let (first, created) = db.add_recording("sounds/a.wav", "forest wind").await.unwrap();
        assert!(created);

        let (second, created) = db.add_recording("sounds/a.wav", "wind in trees").await.unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);
        assert_eq!(second.description, "wind in trees");

        let stats = db.stats().await.unwrap();
        assert_eq!(stats.recordings, 1);
    }

    #[tokio::test]
    async fn segment_requires_known_recording() {
        let db = test_db().await;

        let err = db.add_segment(new_segment("missing.wav")).await.unwrap_err();
        assert!(matches!(err, Error::DanglingReference(_)));
    }

    #[tokio::test]
    async fn segment_requires_known_segmentation() {
        let db = test_db().await;
        db.add_recording("sounds/a.wav", "forest wind").await.unwrap();

        let mut fields = new_segment("sounds/a.wav");
        fields.segmentation_id = "nonexistent".to_string();
        let err = db.add_segment(fields).await.unwrap_err();
        assert!(matches!(err, Error::DanglingReference(_)));
    }

    #[tokio::test]
    async fn segment_bounds_are_validated() {
        let db = test_db().await;
        db.add_recording("sounds/a.wav", "forest wind").await.unwrap();

        let mut fields = new_segment("sounds/a.wav");
        fields.start = 0.7;
        fields.end = 0.3;
        let err = db.add_segment(fields).await.unwrap_err();
        assert!(matches!(err, Error::InvalidDocument(_)));

        let mut fields = new_segment("sounds/a.wav");
        fields.freq_low = Some(2000.0);
        fields.freq_high = Some(500.0);
        let err = db.add_segment(fields).await.unwrap_err();
        assert!(matches!(err, Error::InvalidDocument(_)));
    }

    #[tokio::test]
    async fn segment_round_trips_by_row() {
        let db = test_db().await;
        db.add_recording("sounds/a.wav", "forest wind").await.unwrap();

        let mut fields = new_segment("sounds/a.wav");
        fields.vector_row = Some(7);
        fields.freq_low = Some(500.0);
        fields.freq_high = Some(1000.0);
        fields.duration = Some(2.0);
        let inserted = db.add_segment(fields).await.unwrap();

        let found = db.segment_by_row(7).await.unwrap().unwrap();
        assert_eq!(found.id, inserted.id);
        assert_eq!(found.freq_low, Some(500.0));
        assert_eq!(found.duration, Some(2.0));

        assert!(db.segment_by_row(8).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_segmentation_is_a_conflict() {
        let db = test_db().await;
        db.add_segmentation("manual", "manual", "{}", "hand cut").await.unwrap();

        let err = db
            .add_segmentation("manual", "manual", "{}", "hand cut again")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }
}
