//! Server core: transport loops, periodic tick, lifecycle
//!
//! One control task receives and serves invocations; one periodic worker
//! drives the orchestrator tick; one sender task turns published events into
//! outgoing datagrams. State is initialized in dependency order (store →
//! index → engine → orchestrator → transport) and torn down in reverse on
//! `/stop`.

use crate::engine::RetrievalEngine;
use crate::handlers;
use crate::orchestrator::Chowasha;
use crate::osc::client::OscClient;
use crate::osc::flatten_packet;
use hibikido_common::config::Config;
use hibikido_common::db::Database;
use hibikido_common::events::{EventBus, ServerEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Maximum UDP payload we accept
const RECV_BUFFER_SIZE: usize = 65_507;

/// Process-wide state shared by handlers and background tasks
pub struct AppState {
    pub config: Config,
    pub engine: Arc<RetrievalEngine>,
    pub orchestrator: Arc<Mutex<Chowasha>>,
    pub events: EventBus,
    /// Session opened at startup; `/invoke` appends to it
    pub performance_id: String,
    pub started_at: Instant,
    pub shutdown: CancellationToken,
}

/// Run the server until `/stop`
pub async fn start(config: Config, db: Database, engine: Arc<RetrievalEngine>) -> anyhow::Result<()> {
    let events = EventBus::new(100);
    let orchestrator = Arc::new(Mutex::new(Chowasha::new(config.orchestrator.clone())));
    let shutdown = CancellationToken::new();

    let listen_addr = format!("{}:{}", config.osc.listen_ip, config.osc.listen_port);
    let socket = UdpSocket::bind(&listen_addr).await?;
    let client = OscClient::new(&config.osc.send_ip, config.osc.send_port).await?;
    info!("OSC server listening on {}", listen_addr);

    let sender = spawn_sender(client, &events, &shutdown);
    let ticker = spawn_ticker(&config, orchestrator.clone(), &events, &shutdown);

    let performance = db.add_performance(chrono::Utc::now()).await?;
    info!("Performance session {} opened", performance.id);

    let state = Arc::new(AppState {
        config,
        engine,
        orchestrator,
        events: events.clone(),
        performance_id: performance.id,
        started_at: Instant::now(),
        shutdown: shutdown.clone(),
    });

    events.publish(ServerEvent::Ready);
    info!("Server ready - waiting for OSC messages");

    let mut buf = vec![0u8; RECV_BUFFER_SIZE];
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            received = socket.recv_from(&mut buf) => {
                let (len, peer) = match received {
                    Ok(received) => received,
                    Err(e) => {
                        warn!("UDP receive failed: {}", e);
                        continue;
                    }
                };
                match rosc::decoder::decode_udp(&buf[..len]) {
                    Ok((_, packet)) => {
                        let mut messages = Vec::new();
                        flatten_packet(packet, &mut messages);
                        for message in messages {
                            handlers::dispatch(&state, message).await;
                        }
                    }
                    Err(e) => warn!("Undecodable packet from {}: {}", peer, e),
                }
            }
        }
    }

    info!("Shutting down");
    let _ = ticker.await;
    let _ = sender.await;
    state.engine.save_index().await?;
    db.close().await;
    info!("Shutdown complete");
    Ok(())
}

/// Sender task: published events become outgoing datagrams
fn spawn_sender(
    client: OscClient,
    events: &EventBus,
    shutdown: &CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let mut rx = events.subscribe();
    let shutdown = shutdown.clone();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    // Flush whatever was published before the cancel
                    while let Ok(event) = rx.try_recv() {
                        if let Err(e) = client.send(&event).await {
                            warn!("Failed to send OSC event: {}", e);
                        }
                    }
                    break;
                }
                result = rx.recv() => match result {
                    Ok(event) => {
                        if let Err(e) = client.send(&event).await {
                            warn!("Failed to send OSC event: {}", e);
                        }
                    }
                    Err(RecvError::Lagged(count)) => {
                        warn!("Event sender lagged, dropped {} events", count)
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    })
}

/// Periodic worker: drop expired niches, admit from the queue, emit manifests
fn spawn_ticker(
    config: &Config,
    orchestrator: Arc<Mutex<Chowasha>>,
    events: &EventBus,
    shutdown: &CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let tick_interval = Duration::from_secs_f64(config.orchestrator.tick_interval.max(0.01));
    let events = events.clone();
    let shutdown = shutdown.clone();

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick_interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let admitted = orchestrator.lock().tick();
                    for payload in admitted {
                        events.publish(ServerEvent::Manifest { payload });
                    }
                }
            }
        }
    })
}
