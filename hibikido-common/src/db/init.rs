//! Schema creation and default-row seeding

use crate::Result;
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Segmentation id assigned to auto-created full-length segments
pub const DEFAULT_SEGMENTATION_ID: &str = "auto_full";

/// Create all tables and indexes if they do not exist
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recordings (
            id TEXT PRIMARY KEY,
            path TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS segmentations (
            id TEXT PRIMARY KEY,
            method TEXT NOT NULL,
            parameters TEXT NOT NULL,
            description TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS segments (
            id TEXT PRIMARY KEY,
            source_path TEXT NOT NULL REFERENCES recordings(path),
            segmentation_id TEXT NOT NULL REFERENCES segmentations(id),
            start_norm REAL NOT NULL,
            end_norm REAL NOT NULL,
            description TEXT NOT NULL,
            embedding_text TEXT NOT NULL,
            vector_row INTEGER UNIQUE,
            freq_low REAL,
            freq_high REAL,
            duration REAL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS effects (
            id TEXT PRIMARY KEY,
            path TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS presets (
            id TEXT PRIMARY KEY,
            effect_path TEXT NOT NULL REFERENCES effects(path),
            parameters TEXT NOT NULL,
            description TEXT NOT NULL,
            embedding_text TEXT NOT NULL,
            vector_row INTEGER UNIQUE,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS performances (
            id TEXT PRIMARY KEY,
            date TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS invocations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            performance_id TEXT NOT NULL REFERENCES performances(id),
            text TEXT NOT NULL,
            time_offset REAL NOT NULL,
            segment_id TEXT,
            effect_id TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_segments_source ON segments(source_path)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_presets_effect ON presets(effect_path)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_invocations_performance ON invocations(performance_id)",
    )
    .execute(pool)
    .await?;

    debug!("Schema ready");
    Ok(())
}

/// Seed rows the server relies on being present
///
/// Recording auto-segments reference a well-known segmentation id, so it has
/// to exist before the first `/add_recording` arrives. Its description stays
/// empty: an auto segment must embed the recording's own words only.
pub async fn seed_defaults(pool: &SqlitePool) -> Result<()> {
    let inserted = sqlx::query(
        r#"
        INSERT OR IGNORE INTO segmentations (id, method, parameters, description, created_at)
        VALUES (?, 'auto_full_recording', '{}', '', ?)
        "#,
    )
    .bind(DEFAULT_SEGMENTATION_ID)
    .bind(chrono::Utc::now())
    .execute(pool)
    .await?
    .rows_affected();

    if inserted > 0 {
        info!("Seeded default segmentation '{}'", DEFAULT_SEGMENTATION_ID);
    }
    Ok(())
}
