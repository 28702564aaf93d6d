//! Hibikidō Server entry point
//!
//! Startup order: document store, embedding provider, vector index,
//! retrieval engine, then the OSC transport. A failure in any of these logs
//! and exits non-zero; a clean `/stop` exits zero.

use clap::Parser;
use hibikido_common::config::Config;
use hibikido_common::db::Database;
use hibikido_server::embedding;
use hibikido_server::engine::RetrievalEngine;
use hibikido_server::index::VectorIndex;
use hibikido_server::server;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Hibikidō - semantic sound invocation server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Logging level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "hibikido_server={0},hibikido_common={0}",
                    args.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Hibikidō Server starting...");

    let config = Config::load_or_default(args.config.as_deref())?;

    info!("Connecting document store...");
    let db = Database::connect(&config.database.uri).await?;

    info!("Loading embedding provider '{}'...", config.embedding.model_name);
    let embedder = embedding::create(&config.embedding.model_name)?;

    let index_file = PathBuf::from(&config.embedding.index_file);
    let index = VectorIndex::load_or_create(&index_file, embedder.dim())?;

    let engine = Arc::new(RetrievalEngine::new(db.clone(), embedder, index, index_file));

    server::start(config, db, engine).await?;

    Ok(())
}
