//! Hierarchical embedding-text composer
//!
//! Builds the text a document is embedded under from its description and the
//! descriptions of its ancestors, most-specific first, each under a word
//! budget. The output is a deterministic function of its inputs: lowercase,
//! punctuation stripped, stop words dropped, duplicates removed in order,
//! hard-capped at [`MAX_EMBEDDING_TOKENS`]. No lemmatizer is wired; tokens
//! pass through unchanged.

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Hard cap on composed embedding text length, in tokens
pub const MAX_EMBEDDING_TOKENS: usize = 20;

/// Per-source budgets for segments: description, segmentation, recording
pub const SEGMENT_BUDGETS: [usize; 3] = [10, 5, 5];

/// Per-source budgets for presets: description, effect
pub const PRESET_BUDGETS: [usize; 2] = [10, 5];

/// Function words plus audio-adjacent noise words that carry no meaning
/// in a sonic description.
static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for",
        "of", "with", "by", "is", "are", "was", "were", "be", "been", "being",
        "have", "has", "had", "do", "does", "did", "will", "would", "could",
        "should", "may", "might", "this", "that", "these", "those",
        // audio noise words
        "sound", "audio", "recording", "sample", "track", "file", "piece",
    ]
    .into_iter()
    .collect()
});

/// Lowercase, strip punctuation to whitespace, collapse whitespace
pub fn clean(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = true;
    for c in text.chars() {
        if c.is_alphanumeric() {
            for lower in c.to_lowercase() {
                out.push(lower);
            }
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    out.trim_end().to_string()
}

/// Meaningful tokens of a text, optionally capped
pub fn keywords(text: &str, budget: Option<usize>) -> Vec<String> {
    let cleaned = clean(text);
    let mut tokens: Vec<String> = cleaned
        .split_whitespace()
        .filter(|w| w.chars().count() >= 2 && !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect();
    if let Some(limit) = budget {
        tokens.truncate(limit);
    }
    tokens
}

/// Combine (source text, word budget) pairs in priority order
///
/// Duplicate tokens are dropped while preserving first-seen order, and the
/// result is truncated to the global cap.
pub fn compose(sources: &[(&str, usize)]) -> String {
    let mut seen = HashSet::new();
    let mut combined = Vec::new();

    for (text, budget) in sources {
        if combined.len() >= MAX_EMBEDDING_TOKENS {
            break;
        }
        for token in keywords(text, Some(*budget)) {
            if combined.len() >= MAX_EMBEDDING_TOKENS {
                break;
            }
            if seen.insert(token.clone()) {
                combined.push(token);
            }
        }
    }

    combined.join(" ")
}

/// Embedding text for a segment: segment > segmentation > recording
pub fn segment_text(
    segment_description: &str,
    segmentation_description: &str,
    recording_description: &str,
) -> String {
    compose(&[
        (segment_description, SEGMENT_BUDGETS[0]),
        (segmentation_description, SEGMENT_BUDGETS[1]),
        (recording_description, SEGMENT_BUDGETS[2]),
    ])
}

/// Embedding text for a preset: preset > effect
pub fn preset_text(preset_description: &str, effect_description: &str) -> String {
    compose(&[
        (preset_description, PRESET_BUDGETS[0]),
        (effect_description, PRESET_BUDGETS[1]),
    ])
}

/// Query-side cleaning: same pipeline, no budget
pub fn enhance_query(query: &str) -> String {
    keywords(query, None).join(" ")
}
