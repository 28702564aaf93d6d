//! Performance sessions and the invocation log
//!
//! Append-only: a session is opened at server startup and every `/invoke`
//! adds one row. Nothing in the serving path reads this back.

use super::{Database, Performance};
use crate::Result;
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

impl Database {
    /// Open a new performance session
    pub async fn add_performance(&self, date: DateTime<Utc>) -> Result<Performance> {
        let performance = Performance {
            id: Uuid::new_v4().to_string(),
            date,
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO performances (id, date, created_at) VALUES (?, ?, ?)")
            .bind(&performance.id)
            .bind(performance.date)
            .bind(performance.created_at)
            .execute(self.pool())
            .await?;

        debug!("Opened performance session {}", performance.id);
        Ok(performance)
    }

    /// Append one invocation to a session
    pub async fn add_invocation(
        &self,
        performance_id: &str,
        text: &str,
        time_offset: f64,
        segment_id: Option<&str>,
        effect_id: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO invocations (performance_id, text, time_offset, segment_id, effect_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(performance_id)
        .bind(text)
        .bind(time_offset)
        .bind(segment_id)
        .bind(effect_id)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;
        Ok(())
    }
}
