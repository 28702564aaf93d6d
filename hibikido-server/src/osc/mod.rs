//! OSC surface: address table and incoming-argument decoding
//!
//! Incoming messages carry positional arguments; commands that take metadata
//! carry it as one JSON string argument, decoded field-by-field into a typed
//! record. Unknown fields are rejected loudly.

pub mod client;

use crate::{Error, Result};
use rosc::{OscMessage, OscPacket, OscType};
use serde::Deserialize;

// Incoming addresses
pub const ADDR_INVOKE: &str = "/invoke";
pub const ADDR_SEARCH: &str = "/search";
pub const ADDR_ADD_RECORDING: &str = "/add_recording";
pub const ADDR_ADD_EFFECT: &str = "/add_effect";
pub const ADDR_ADD_SEGMENT: &str = "/add_segment";
pub const ADDR_ADD_PRESET: &str = "/add_preset";
pub const ADDR_REBUILD_INDEX: &str = "/rebuild_index";
pub const ADDR_STATS: &str = "/stats";
pub const ADDR_STOP: &str = "/stop";

// Outgoing addresses
pub const ADDR_MANIFEST: &str = "/manifest";
pub const ADDR_CONFIRM: &str = "/confirm";
pub const ADDR_ERROR: &str = "/error";
pub const ADDR_STATS_RESULT: &str = "/stats_result";

/// Metadata blob for `/add_recording`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecordingArgs {
    pub description: String,
}

/// Metadata blob for `/add_effect`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EffectArgs {
    pub name: Option<String>,
    pub description: String,
}

/// Metadata blob for `/add_segment`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SegmentArgs {
    pub source_path: String,
    pub start: f64,
    pub end: f64,
    pub segmentation_id: String,
    #[serde(default)]
    pub freq_low: Option<f64>,
    #[serde(default)]
    pub freq_high: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
}

/// Metadata blob for `/add_preset`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PresetArgs {
    pub effect_path: String,
    /// Ordered (name, value) pairs
    #[serde(default)]
    pub parameters: Vec<(String, serde_json::Value)>,
}

/// Flatten a decoded packet into its messages (bundles recurse)
pub fn flatten_packet(packet: OscPacket, out: &mut Vec<OscMessage>) {
    match packet {
        OscPacket::Message(message) => out.push(message),
        OscPacket::Bundle(bundle) => {
            for inner in bundle.content {
                flatten_packet(inner, out);
            }
        }
    }
}

/// Positional string argument, accepting anything string-convertible
pub fn string_arg(message: &OscMessage, position: usize, what: &str) -> Result<String> {
    match message.args.get(position) {
        Some(OscType::String(s)) => Ok(s.clone()),
        Some(other) => Err(Error::InvalidRequest(format!(
            "{} expects a string for {}, got {:?}",
            message.addr, what, other
        ))),
        None => Err(Error::InvalidRequest(format!(
            "{} requires {}",
            message.addr, what
        ))),
    }
}

/// Decode a JSON metadata argument into its typed record
///
/// A missing argument decodes as `{}` so commands with all-optional metadata
/// can omit it.
pub fn json_arg<T>(message: &OscMessage, position: usize) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let raw = match message.args.get(position) {
        Some(OscType::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(OscType::String(_)) | None => "{}".to_string(),
        Some(other) => {
            return Err(Error::InvalidRequest(format!(
                "{} expects a JSON string argument, got {:?}",
                message.addr, other
            )))
        }
    };
    serde_json::from_str(&raw)
        .map_err(|e| Error::InvalidRequest(format!("invalid metadata JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(addr: &str, args: Vec<OscType>) -> OscMessage {
        OscMessage {
            addr: addr.to_string(),
            args,
        }
    }

    #[test]
    fn string_arg_rejects_wrong_types() {
        let msg = message(ADDR_INVOKE, vec![OscType::Int(3)]);
        assert!(string_arg(&msg, 0, "incantation text").is_err());

        let msg = message(ADDR_INVOKE, vec![OscType::String("forest wind".into())]);
        assert_eq!(string_arg(&msg, 0, "incantation text").unwrap(), "forest wind");
    }

    #[test]
    fn segment_args_decode_with_optional_fields() {
        let msg = message(
            ADDR_ADD_SEGMENT,
            vec![
                OscType::String("bell strike".into()),
                OscType::String(
                    r#"{"source_path":"sounds/a.wav","start":0.1,"end":0.4,
                        "segmentation_id":"manual","freq_low":500,"freq_high":1000}"#
                        .into(),
                ),
            ],
        );
        let args: SegmentArgs = json_arg(&msg, 1).unwrap();
        assert_eq!(args.source_path, "sounds/a.wav");
        assert_eq!(args.freq_low, Some(500.0));
        assert_eq!(args.duration, None);
    }

    #[test]
    fn unknown_metadata_fields_are_rejected() {
        let msg = message(
            ADDR_ADD_SEGMENT,
            vec![
                OscType::String("bell strike".into()),
                OscType::String(
                    r#"{"source_path":"a.wav","start":0.0,"end":1.0,
                        "segmentation_id":"manual","frequency":500}"#
                        .into(),
                ),
            ],
        );
        let result: Result<SegmentArgs> = json_arg(&msg, 1);
        assert!(result.is_err());
    }

    #[test]
    fn missing_metadata_defaults_to_empty() {
        let msg = message(ADDR_ADD_RECORDING, vec![OscType::String("a.wav".into())]);
        let args: RecordingArgs = json_arg(&msg, 1).unwrap();
        assert_eq!(args.description, "");
    }

    #[test]
    fn preset_parameters_keep_their_order() {
        let msg = message(
            ADDR_ADD_PRESET,
            vec![
                OscType::String("long shimmer".into()),
                OscType::String(
                    r#"{"effect_path":"effects/reverb.dll",
                        "parameters":[["decay",0.8],["mix",0.5]]}"#
                        .into(),
                ),
            ],
        );
        let args: PresetArgs = json_arg(&msg, 1).unwrap();
        assert_eq!(args.parameters[0].0, "decay");
        assert_eq!(args.parameters[1].0, "mix");
    }
}
