//! Database models and queries

pub mod init;
pub mod models;

mod effects;
mod performances;
mod sounds;

pub use models::*;

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

/// Handle to the document store
///
/// Wraps a `SqlitePool`; cloning is cheap and shares the pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to the store, creating the file and schema if needed
    pub async fn connect(uri: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(uri)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        init::create_schema(&pool).await?;
        init::seed_defaults(&pool).await?;

        info!("Document store connected: {}", uri);
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Per-collection counts plus the number of row-bearing documents
    pub async fn stats(&self) -> Result<DbStats> {
        let recordings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM recordings")
            .fetch_one(&self.pool)
            .await?;
        let segments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM segments")
            .fetch_one(&self.pool)
            .await?;
        let effects: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM effects")
            .fetch_one(&self.pool)
            .await?;
        let presets: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM presets")
            .fetch_one(&self.pool)
            .await?;
        let embeddings: i64 = sqlx::query_scalar(
            r#"
            SELECT (SELECT COUNT(*) FROM segments WHERE vector_row IS NOT NULL)
                 + (SELECT COUNT(*) FROM presets WHERE vector_row IS NOT NULL)
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(DbStats {
            recordings,
            segments,
            effects,
            presets,
            embeddings,
        })
    }

    /// Close the pool; pending acquires fail afterwards
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Document store closed");
    }
}

#[cfg(test)]
pub(crate) async fn test_db() -> Database {
    Database::connect("sqlite::memory:").await.unwrap()
}
