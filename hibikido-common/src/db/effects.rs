//! Effects and presets

use super::{Database, Effect, NewPreset, Preset};
use crate::{Error, Result};
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

impl Database {
    /// Upsert an effect keyed by path
    ///
    /// Returns the stored document and whether it was newly created.
    pub async fn add_effect(
        &self,
        path: &str,
        name: &str,
        description: &str,
    ) -> Result<(Effect, bool)> {
        if path.is_empty() {
            return Err(Error::InvalidDocument("effect path is empty".into()));
        }

        if let Some(existing) = self.effect_by_path(path).await? {
            sqlx::query("UPDATE effects SET name = ?, description = ? WHERE path = ?")
                .bind(name)
                .bind(description)
                .bind(path)
                .execute(self.pool())
                .await?;
            debug!("Updated effect: {}", path);
            return Ok((
                Effect {
                    name: name.to_string(),
                    description: description.to_string(),
                    ..existing
                },
                false,
            ));
        }

        let effect = Effect {
            id: Uuid::new_v4().to_string(),
            path: path.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO effects (id, path, name, description, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&effect.id)
        .bind(&effect.path)
        .bind(&effect.name)
        .bind(&effect.description)
        .bind(effect.created_at)
        .execute(self.pool())
        .await?;

        info!("Added effect: {} - {}", path, name);
        Ok((effect, true))
    }

    pub async fn effect_by_path(&self, path: &str) -> Result<Option<Effect>> {
        let effect = sqlx::query_as::<_, Effect>(
            "SELECT id, path, name, description, created_at FROM effects WHERE path = ?",
        )
        .bind(path)
        .fetch_optional(self.pool())
        .await?;
        Ok(effect)
    }

    /// Insert a preset after the effect foreign-key check
    pub async fn add_preset(&self, fields: NewPreset) -> Result<Preset> {
        if self.effect_by_path(&fields.effect_path).await?.is_none() {
            return Err(Error::DanglingReference(format!(
                "unknown effect: {}",
                fields.effect_path
            )));
        }

        let preset = Preset {
            id: Uuid::new_v4().to_string(),
            effect_path: fields.effect_path,
            parameters: fields.parameters,
            description: fields.description,
            embedding_text: fields.embedding_text,
            vector_row: fields.vector_row,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO presets (
                id, effect_path, parameters, description, embedding_text,
                vector_row, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&preset.id)
        .bind(&preset.effect_path)
        .bind(&preset.parameters)
        .bind(&preset.description)
        .bind(&preset.embedding_text)
        .bind(preset.vector_row)
        .bind(preset.created_at)
        .execute(self.pool())
        .await?;

        info!("Added preset: {} - {}", preset.id, preset.description);
        Ok(preset)
    }

    pub async fn preset_by_id(&self, id: &str) -> Result<Option<Preset>> {
        let preset = sqlx::query_as::<_, Preset>("SELECT * FROM presets WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(preset)
    }

    /// Reverse lookup from a vector-index row to its preset
    pub async fn preset_by_row(&self, row: i64) -> Result<Option<Preset>> {
        let preset = sqlx::query_as::<_, Preset>("SELECT * FROM presets WHERE vector_row = ?")
            .bind(row)
            .fetch_optional(self.pool())
            .await?;
        Ok(preset)
    }

    /// All presets in a stable order (used by index rebuild)
    pub async fn all_presets(&self) -> Result<Vec<Preset>> {
        let presets =
            sqlx::query_as::<_, Preset>("SELECT * FROM presets ORDER BY created_at, id")
                .fetch_all(self.pool())
                .await?;
        Ok(presets)
    }

    /// Assign a new vector row and embedding text to a preset
    pub async fn update_preset_embedding(
        &self,
        id: &str,
        vector_row: i64,
        embedding_text: &str,
    ) -> Result<()> {
        let updated =
            sqlx::query("UPDATE presets SET vector_row = ?, embedding_text = ? WHERE id = ?")
                .bind(vector_row)
                .bind(embedding_text)
                .bind(id)
                .execute(self.pool())
                .await?
                .rows_affected();

        if updated == 0 {
            return Err(Error::NotFound(format!("preset {}", id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_db;
    use super::*;

    #[tokio::test]
    async fn effect_upsert_updates_in_place() {
        let db = test_db().await;

        let (first, created) = db
            .add_effect("effects/reverb.dll", "Reverb", "cavernous tail")
            .await
            .unwrap();
        assert!(created);

        let (second, created) = db
            .add_effect("effects/reverb.dll", "Reverb II", "short tail")
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);
        assert_eq!(second.name, "Reverb II");
    }

    #[tokio::test]
    async fn preset_requires_known_effect() {
        let db = test_db().await;

        let err = db
            .add_preset(NewPreset {
                effect_path: "effects/missing.dll".to_string(),
                parameters: "[]".to_string(),
                description: "long shimmer".to_string(),
                embedding_text: "long shimmer".to_string(),
                vector_row: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DanglingReference(_)));
    }

    #[tokio::test]
    async fn preset_round_trips_by_row() {
        let db = test_db().await;
        db.add_effect("effects/reverb.dll", "Reverb", "cavernous tail")
            .await
            .unwrap();

        let inserted = db
            .add_preset(NewPreset {
                effect_path: "effects/reverb.dll".to_string(),
                parameters: r#"[["decay",0.8],["mix",0.5]]"#.to_string(),
                description: "long shimmer".to_string(),
                embedding_text: "long shimmer".to_string(),
                vector_row: Some(3),
            })
            .await
            .unwrap();

        let found = db.preset_by_row(3).await.unwrap().unwrap();
        assert_eq!(found.id, inserted.id);
        assert_eq!(found.parameters, r#"[["decay",0.8],["mix",0.5]]"#);
    }
}
