//! Event types and the EventBus
//!
//! Handlers and the orchestrator tick publish `ServerEvent`s on a broadcast
//! channel; the OSC sender task subscribes and turns each event into one
//! outgoing datagram. Publishing is lossy by design: with no subscriber the
//! event is dropped, never an error.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// One admitted candidate, delivered to the client as `/manifest`
///
/// Field order matches the 8-field wire payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifestation {
    /// Sequence index within the originating invocation
    pub index: i32,
    /// Collection tag: "segments" or "presets"
    pub collection: String,
    /// Cosine similarity of the hit
    pub score: f32,
    /// File path of the recording (or effect)
    pub path: String,
    pub description: String,
    /// Normalized start within the recording
    pub start: f64,
    /// Normalized end within the recording
    pub end: f64,
    /// Parameter list as a JSON string; "[]" for segments
    pub parameters: String,
}

/// Counts reported by `/stats_result`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub recordings: i64,
    pub segments: i64,
    pub effects: i64,
    pub presets: i64,
    pub embeddings: i64,
    pub active_niches: i64,
    pub queued: i64,
}

/// Hibikidō server events
///
/// Broadcast via EventBus; each variant maps to one outgoing OSC address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Startup announcement, sent once the transport is up
    Ready,

    /// An admitted candidate manifests
    Manifest { payload: Manifestation },

    /// Command acknowledged
    Confirm { message: String },

    /// Command failed; the offending message was discarded
    Error { message: String },

    /// Response to `/stats`
    Stats { stats: StatsSnapshot },
}

/// EventBus fans server events out to any number of subscribers
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ServerEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event, ignoring if no subscriber is connected
    pub fn publish(&self, event: ServerEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
