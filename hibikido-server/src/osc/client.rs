//! Outgoing OSC sender
//!
//! Encodes server events into OSC datagrams and writes them to the client
//! endpoint. One event maps to exactly one outgoing message.

use crate::{Error, Result};
use hibikido_common::events::{Manifestation, ServerEvent, StatsSnapshot};
use rosc::{encoder, OscMessage, OscPacket, OscType};
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::info;

pub struct OscClient {
    socket: UdpSocket,
    target: SocketAddr,
}

impl OscClient {
    pub async fn new(send_ip: &str, send_port: u16) -> Result<Self> {
        let target: SocketAddr = format!("{}:{}", send_ip, send_port)
            .parse()
            .map_err(|e| Error::Transport(format!("invalid send address: {}", e)))?;
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        info!("OSC client sending to {}", target);
        Ok(Self { socket, target })
    }

    pub async fn send(&self, event: &ServerEvent) -> Result<()> {
        let message = encode_event(event);
        let bytes = encoder::encode(&OscPacket::Message(message))
            .map_err(|e| Error::Transport(format!("OSC encode failed: {}", e)))?;
        self.socket.send_to(&bytes, self.target).await?;
        Ok(())
    }
}

fn encode_event(event: &ServerEvent) -> OscMessage {
    match event {
        ServerEvent::Ready => OscMessage {
            addr: super::ADDR_CONFIRM.to_string(),
            args: vec![OscType::String("hibikido_server_ready".to_string())],
        },
        ServerEvent::Manifest { payload } => manifest_message(payload),
        ServerEvent::Confirm { message } => OscMessage {
            addr: super::ADDR_CONFIRM.to_string(),
            args: vec![OscType::String(message.clone())],
        },
        ServerEvent::Error { message } => OscMessage {
            addr: super::ADDR_ERROR.to_string(),
            args: vec![OscType::String(message.clone())],
        },
        ServerEvent::Stats { stats } => stats_message(stats),
    }
}

/// The 8-field `/manifest` payload
fn manifest_message(payload: &Manifestation) -> OscMessage {
    OscMessage {
        addr: super::ADDR_MANIFEST.to_string(),
        args: vec![
            OscType::Int(payload.index),
            OscType::String(payload.collection.clone()),
            OscType::Float(payload.score),
            OscType::String(payload.path.clone()),
            OscType::String(payload.description.clone()),
            OscType::Float(payload.start as f32),
            OscType::Float(payload.end as f32),
            OscType::String(payload.parameters.clone()),
        ],
    }
}

/// The 7-integer `/stats_result` payload
fn stats_message(stats: &StatsSnapshot) -> OscMessage {
    OscMessage {
        addr: super::ADDR_STATS_RESULT.to_string(),
        args: vec![
            OscType::Int(stats.recordings as i32),
            OscType::Int(stats.segments as i32),
            OscType::Int(stats.effects as i32),
            OscType::Int(stats.presets as i32),
            OscType::Int(stats.embeddings as i32),
            OscType::Int(stats.active_niches as i32),
            OscType::Int(stats.queued as i32),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_carries_eight_fields_in_order() {
        let message = manifest_message(&Manifestation {
            index: 0,
            collection: "segments".to_string(),
            score: 0.93,
            path: "sounds/a.wav".to_string(),
            description: "forest wind".to_string(),
            start: 0.0,
            end: 1.0,
            parameters: "[]".to_string(),
        });

        assert_eq!(message.addr, "/manifest");
        assert_eq!(message.args.len(), 8);
        assert_eq!(message.args[0], OscType::Int(0));
        assert_eq!(message.args[1], OscType::String("segments".to_string()));
        assert_eq!(message.args[7], OscType::String("[]".to_string()));
    }

    #[test]
    fn stats_carries_seven_integers() {
        let message = stats_message(&StatsSnapshot {
            recordings: 1,
            segments: 2,
            effects: 3,
            presets: 4,
            embeddings: 6,
            active_niches: 0,
            queued: 5,
        });

        assert_eq!(message.addr, "/stats_result");
        assert_eq!(message.args.len(), 7);
        assert_eq!(message.args[4], OscType::Int(6));
    }

    #[test]
    fn events_round_trip_through_the_encoder() {
        let event = ServerEvent::Error {
            message: "invoke requires incantation text".to_string(),
        };
        let encoded =
            encoder::encode(&OscPacket::Message(encode_event(&event))).unwrap();
        let (_, packet) = rosc::decoder::decode_udp(&encoded).unwrap();
        match packet {
            OscPacket::Message(message) => {
                assert_eq!(message.addr, "/error");
                assert_eq!(
                    message.args[0],
                    OscType::String("invoke requires incantation text".to_string())
                );
            }
            other => panic!("unexpected packet: {:?}", other),
        }
    }
}
