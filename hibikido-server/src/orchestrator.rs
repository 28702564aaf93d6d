//! Chōwasha — the time-frequency niche orchestrator
//!
//! Every search hit enters a FIFO queue; a queued candidate is admitted as an
//! active niche only when its frequency band does not overlap any active
//! niche beyond the configured logarithmic threshold. Admitted niches expire
//! by wall-clock time, freeing space for queued candidates.
//!
//! The queue is strictly head-blocking: a conflicting head candidate is never
//! skipped past younger candidates, so admission order equals enqueue order
//! and wide-band sounds cannot be starved by narrow-band ones. A candidate
//! that cannot currently be admitted is not an error; it waits until a niche
//! frees or shutdown drops it.

use hibikido_common::config::OrchestratorConfig;
use hibikido_common::events::Manifestation;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// A queued candidate with everything needed for admission
#[derive(Debug, Clone)]
pub struct QueuedManifestation {
    pub payload: Manifestation,
    pub sound_id: String,
    pub freq_low: f64,
    pub freq_high: f64,
    pub duration: f64,
    pub enqueued_at: Instant,
}

/// An occupied time-frequency rectangle
#[derive(Debug, Clone)]
struct Niche {
    end: Instant,
    freq_low: f64,
    freq_high: f64,
}

pub struct Chowasha {
    config: OrchestratorConfig,
    queue: VecDeque<QueuedManifestation>,
    /// At most one active niche per sound id
    niches: HashMap<String, Niche>,
}

impl Chowasha {
    pub fn new(config: OrchestratorConfig) -> Self {
        info!(
            "Chōwasha initialized: {:.0}% overlap threshold, {:.0}ms tick",
            config.overlap_threshold * 100.0,
            config.tick_interval * 1000.0
        );
        Self {
            config,
            queue: VecDeque::new(),
            niches: HashMap::new(),
        }
    }

    /// Append a candidate to the queue; never rejects
    ///
    /// Missing frequency or duration fields are filled from the configured
    /// defaults.
    pub fn enqueue(
        &mut self,
        payload: Manifestation,
        sound_id: String,
        freq_low: Option<f64>,
        freq_high: Option<f64>,
        duration: Option<f64>,
    ) {
        let freq_low = freq_low.unwrap_or(self.config.default_freq_low);
        let freq_high = freq_high.unwrap_or(self.config.default_freq_high);
        let duration = duration
            .filter(|d| *d > 0.0)
            .unwrap_or(self.config.default_duration);

        debug!(
            "Queued manifestation: {} [{:.0}-{:.0}Hz]",
            sound_id, freq_low, freq_high
        );
        self.queue.push_back(QueuedManifestation {
            payload,
            sound_id,
            freq_low,
            freq_high,
            duration,
            enqueued_at: Instant::now(),
        });
    }

    /// Periodic update: drop expired niches, then admit from the queue head
    ///
    /// Returns the payloads admitted this tick, in admission order.
    pub fn tick(&mut self) -> Vec<Manifestation> {
        self.tick_at(Instant::now())
    }

    /// Same as [`tick`](Self::tick) with an explicit clock reading
    pub fn tick_at(&mut self, now: Instant) -> Vec<Manifestation> {
        let before = self.niches.len();
        self.niches.retain(|_, niche| now < niche.end);
        if self.niches.len() < before {
            debug!("Expired {} niches", before - self.niches.len());
        }

        let mut admitted = Vec::new();
        while admitted.len() < self.config.max_admits_per_tick {
            let Some(head) = self.queue.front() else { break };

            if self.niches.contains_key(&head.sound_id) {
                // Sound already active: the duplicate is discarded, and the
                // discard does not consume an admission slot.
                let dropped = self.queue.pop_front();
                if let Some(dropped) = dropped {
                    debug!("Discarded duplicate of active sound {}", dropped.sound_id);
                }
                continue;
            }

            if self.conflicts(head.freq_low, head.freq_high) {
                // Head-blocking FIFO: the head waits, nothing passes it.
                break;
            }

            let Some(item) = self.queue.pop_front() else { break };
            self.niches.insert(
                item.sound_id.clone(),
                Niche {
                    end: now + Duration::from_secs_f64(item.duration),
                    freq_low: item.freq_low,
                    freq_high: item.freq_high,
                },
            );
            debug!(
                "Manifested: {} [{:.0}-{:.0}Hz] (queued for {:.1}s)",
                item.sound_id,
                item.freq_low,
                item.freq_high,
                now.saturating_duration_since(item.enqueued_at).as_secs_f64()
            );
            admitted.push(item.payload);
        }

        admitted
    }

    fn conflicts(&self, freq_low: f64, freq_high: f64) -> bool {
        self.niches.values().any(|niche| {
            log_overlap((freq_low, freq_high), (niche.freq_low, niche.freq_high))
                > self.config.overlap_threshold
        })
    }

    /// (active niche count, queue length)
    pub fn stats(&self) -> (usize, usize) {
        (self.niches.len(), self.queue.len())
    }
}

/// Intersection-over-union of two frequency bands on log2-scaled bounds
///
/// Frequencies are clamped to >= 1 Hz before taking log2. A degenerate union
/// (both bands zero-width at the same frequency) counts as no overlap.
fn log_overlap(a: (f64, f64), b: (f64, f64)) -> f64 {
    let a_lo = a.0.max(1.0).log2();
    let a_hi = a.1.max(1.0).log2();
    let b_lo = b.0.max(1.0).log2();
    let b_hi = b.1.max(1.0).log2();

    let inter = (a_hi.min(b_hi) - a_lo.max(b_lo)).max(0.0);
    let union = a_hi.max(b_hi) - a_lo.min(b_lo);
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}
