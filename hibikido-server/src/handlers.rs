//! Incoming message handlers
//!
//! Each handler validates its arguments, delegates to the retrieval engine
//! or the orchestrator, and publishes the outcome on the event bus. A failed
//! command publishes one `/error` and the message is discarded; nothing is
//! retried here.

use crate::engine::{HitDocument, PresetIngest, SegmentIngest};
use crate::osc::{
    self, EffectArgs, PresetArgs, RecordingArgs, SegmentArgs, ADDR_ADD_EFFECT, ADDR_ADD_PRESET,
    ADDR_ADD_RECORDING, ADDR_ADD_SEGMENT, ADDR_INVOKE, ADDR_REBUILD_INDEX, ADDR_SEARCH,
    ADDR_STATS, ADDR_STOP,
};
use crate::server::AppState;
use crate::{Error, Result};
use hibikido_common::events::{Manifestation, ServerEvent, StatsSnapshot};
use rosc::OscMessage;
use tracing::{info, warn};

/// Route one message to its handler, turning failures into `/error` events
pub async fn dispatch(state: &AppState, message: OscMessage) {
    let addr = message.addr.clone();
    let result = match addr.as_str() {
        // Legacy clients still send /search; same semantics
        ADDR_INVOKE | ADDR_SEARCH => handle_invoke(state, &message).await,
        ADDR_ADD_RECORDING => handle_add_recording(state, &message).await,
        ADDR_ADD_EFFECT => handle_add_effect(state, &message).await,
        ADDR_ADD_SEGMENT => handle_add_segment(state, &message).await,
        ADDR_ADD_PRESET => handle_add_preset(state, &message).await,
        ADDR_REBUILD_INDEX => handle_rebuild_index(state).await,
        ADDR_STATS => handle_stats(state).await,
        ADDR_STOP => handle_stop(state),
        other => Err(Error::InvalidRequest(format!("unknown address: {}", other))),
    };

    if let Err(e) = result {
        warn!("{} failed: {}", addr, e);
        state.events.publish(ServerEvent::Error {
            message: format!("{} failed: {}", addr, e),
        });
    }
}

/// `/invoke text` — search, enqueue every segment hit, acknowledge
async fn handle_invoke(state: &AppState, message: &OscMessage) -> Result<()> {
    let text = osc::string_arg(message, 0, "incantation text")?;
    if text.trim().is_empty() {
        return Err(Error::InvalidRequest("invoke requires incantation text".into()));
    }
    info!("Invocation: '{}'", text);

    let hits = state
        .engine
        .search(&text, state.config.search.top_k, state.config.search.min_score)
        .await?;

    let mut queued: i32 = 0;
    let mut top_segment: Option<String> = None;
    {
        let mut orchestrator = state.orchestrator.lock();
        for hit in &hits {
            // Presets are searchable but not yet orchestrated; the default
            // invocation path drops them before enqueue.
            let HitDocument::Segment(segment) = &hit.document else {
                continue;
            };
            let payload = Manifestation {
                index: queued,
                collection: hit.collection.to_string(),
                score: hit.score,
                path: segment.source_path.clone(),
                description: segment.description.clone(),
                start: segment.start,
                end: segment.end,
                parameters: "[]".to_string(),
            };
            orchestrator.enqueue(
                payload,
                segment.id.clone(),
                segment.freq_low,
                segment.freq_high,
                segment.duration,
            );
            if top_segment.is_none() {
                top_segment = Some(segment.id.clone());
            }
            queued += 1;
        }
    }

    // The session log is a sink; a write failure must not fail the invoke
    let offset = state.started_at.elapsed().as_secs_f64();
    if let Err(e) = state
        .engine
        .db()
        .add_invocation(&state.performance_id, &text, offset, top_segment.as_deref(), None)
        .await
    {
        warn!("Failed to log invocation: {}", e);
    }

    state.events.publish(ServerEvent::Confirm {
        message: format!("queued {} resonances", queued),
    });
    Ok(())
}

async fn handle_add_recording(state: &AppState, message: &OscMessage) -> Result<()> {
    let path = osc::string_arg(message, 0, "recording path")?;
    let args: RecordingArgs = osc::json_arg(message, 1)?;
    if args.description.trim().is_empty() {
        return Err(Error::InvalidRequest("add_recording requires a description".into()));
    }

    let (recording, segment) = state.engine.ingest_recording(&path, &args.description).await?;
    let confirmation = match segment {
        Some(_) => format!("added recording: {}", recording.path),
        None => format!("updated recording: {}", recording.path),
    };
    state.events.publish(ServerEvent::Confirm {
        message: confirmation,
    });
    Ok(())
}

async fn handle_add_effect(state: &AppState, message: &OscMessage) -> Result<()> {
    let path = osc::string_arg(message, 0, "effect path")?;
    let args: EffectArgs = osc::json_arg(message, 1)?;
    if args.description.trim().is_empty() {
        return Err(Error::InvalidRequest("add_effect requires a description".into()));
    }
    let name = args.name.unwrap_or_else(|| path.clone());

    let (effect, preset) = state.engine.ingest_effect(&path, &name, &args.description).await?;
    let confirmation = match preset {
        Some(_) => format!("added effect: {}", effect.path),
        None => format!("updated effect: {}", effect.path),
    };
    state.events.publish(ServerEvent::Confirm {
        message: confirmation,
    });
    Ok(())
}

async fn handle_add_segment(state: &AppState, message: &OscMessage) -> Result<()> {
    let description = osc::string_arg(message, 0, "segment description")?;
    let args: SegmentArgs = osc::json_arg(message, 1)?;

    let segment = state
        .engine
        .ingest_segment(SegmentIngest {
            source_path: args.source_path,
            segmentation_id: args.segmentation_id,
            start: args.start,
            end: args.end,
            description,
            freq_low: args.freq_low,
            freq_high: args.freq_high,
            duration: args.duration,
        })
        .await?;

    state.events.publish(ServerEvent::Confirm {
        message: format!("added segment: {}", segment.id),
    });
    Ok(())
}

async fn handle_add_preset(state: &AppState, message: &OscMessage) -> Result<()> {
    let description = osc::string_arg(message, 0, "preset description")?;
    let args: PresetArgs = osc::json_arg(message, 1)?;
    let parameters = serde_json::to_string(&args.parameters)
        .map_err(|e| Error::InvalidRequest(format!("unencodable parameters: {}", e)))?;

    let preset = state
        .engine
        .ingest_preset(PresetIngest {
            effect_path: args.effect_path,
            parameters,
            description,
        })
        .await?;

    state.events.publish(ServerEvent::Confirm {
        message: format!("added preset: {}", preset.id),
    });
    Ok(())
}

async fn handle_rebuild_index(state: &AppState) -> Result<()> {
    let stats = state.engine.rebuild_index().await?;
    let mut message = format!(
        "index rebuilt: {} segments, {} presets",
        stats.segments, stats.presets
    );
    if stats.errors > 0 {
        message.push_str(&format!(" ({} errors)", stats.errors));
    }
    state.events.publish(ServerEvent::Confirm { message });
    Ok(())
}

async fn handle_stats(state: &AppState) -> Result<()> {
    let db_stats = state.engine.db().stats().await?;
    let (active_niches, queued) = state.orchestrator.lock().stats();

    // Embeddings counts row-bearing documents, not raw index rows, so an
    // orphaned row never inflates the report.
    state.events.publish(ServerEvent::Stats {
        stats: StatsSnapshot {
            recordings: db_stats.recordings,
            segments: db_stats.segments,
            effects: db_stats.effects,
            presets: db_stats.presets,
            embeddings: db_stats.embeddings,
            active_niches: active_niches as i64,
            queued: queued as i64,
        },
    });
    Ok(())
}

fn handle_stop(state: &AppState) -> Result<()> {
    info!("Received stop command");
    state.events.publish(ServerEvent::Confirm {
        message: "stopping".to_string(),
    });
    state.shutdown.cancel();
    Ok(())
}
