pub mod protocol;

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, RwLock};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::simulation::TickResult;
use crate::world::World;
use protocol::{HealthStatus, TickDiff, WorldSnapshot};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Tick durations kept for the health endpoint's rate estimate.
const RATE_WINDOW: usize = 100;

/// Shared server state accessible from all connection handlers and the simulation loop.
pub struct ServerState {
    /// Current world snapshot message (JSON string, ready to send).
    pub snapshot_json: RwLock<String>,
    /// Broadcast channel for tick diffs.
    pub tick_sender: broadcast::Sender<String>,
    pub health: RwLock<HealthData>,
}

#[derive(Debug, Default)]
pub struct HealthData {
    pub tick: u64,
    pub live_cells: u32,
    pub lineage_diversity: f32,
    pub last_snapshot_tick: u64,
    pub recent_tick_durations_ms: VecDeque<f32>,
}

impl HealthData {
    pub fn tick_rate(&self) -> f32 {
        if self.recent_tick_durations_ms.is_empty() {
            return 0.0;
        }
        let avg_ms = self.recent_tick_durations_ms.iter().sum::<f32>()
            / self.recent_tick_durations_ms.len() as f32;
        if avg_ms <= 0.0 {
            return 0.0;
        }
        1000.0 / avg_ms
    }

    pub fn status(&self) -> HealthStatus {
        HealthStatus {
            tick: self.tick,
            tick_rate: self.tick_rate(),
            live_cells: self.live_cells,
            lineage_diversity: self.lineage_diversity,
            snapshot_age_ticks: self.tick.saturating_sub(self.last_snapshot_tick),
        }
    }
}

impl ServerState {
    pub fn new(initial_snapshot_json: String) -> Self {
        let (tx, _) = broadcast::channel(64);
        ServerState {
            snapshot_json: RwLock::new(initial_snapshot_json),
            tick_sender: tx,
            health: RwLock::new(HealthData::default()),
        }
    }

    /// Publish a finished tick: broadcast its diff, optionally replace the
    /// connect snapshot, and update health.
    pub async fn on_tick(
        &self,
        new_snapshot_json: Option<String>,
        diff_json: String,
        result: &TickResult,
        last_snapshot_tick: u64,
    ) {
        if let Some(json) = new_snapshot_json {
            *self.snapshot_json.write().await = json;
        }

        // No receivers is fine.
        let _ = self.tick_sender.send(diff_json);

        let stats = &result.statistics;
        let mut health = self.health.write().await;
        health.tick = stats.tick;
        health.live_cells = stats.live_cells;
        health.lineage_diversity = stats.lineage_diversity;
        health.last_snapshot_tick = last_snapshot_tick;
        health.recent_tick_durations_ms.push_back(stats.tick_duration_ms);
        if health.recent_tick_durations_ms.len() > RATE_WINDOW {
            health.recent_tick_durations_ms.pop_front();
        }
    }
}

/// Build the JSON diff message for a finished tick.
pub fn build_diff_json(result: &TickResult) -> String {
    let diff = TickDiff::new(&result.statistics, result.events.clone());
    serde_json::to_string(&diff).unwrap_or_else(|_| "{}".to_string())
}

/// Build the JSON snapshot message for a world.
pub fn build_snapshot_json(world: &World) -> String {
    serde_json::to_string(&WorldSnapshot::from_world(world)).unwrap_or_else(|_| "{}".to_string())
}

/// Accept connections forever, routing each to the WebSocket feed or the
/// health endpoint.
pub async fn start_server(state: Arc<ServerState>, addr: SocketAddr) -> Result<(), BoxError> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Server listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer, state).await {
                error!(%peer, error = %e, "Connection error");
            }
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    state: Arc<ServerState>,
) -> Result<(), BoxError> {
    // Peek so the WebSocket handshake still sees the full request.
    let mut buf = [0u8; 512];
    let n = stream.peek(&mut buf).await?;
    let request = String::from_utf8_lossy(&buf[..n]).to_lowercase();

    if request.contains("upgrade: websocket") {
        handle_websocket(stream, peer, state).await
    } else if request.starts_with("get /health") {
        handle_health_request(stream, state).await
    } else {
        handle_not_found(stream).await
    }
}

/// Send the current snapshot, then stream diffs until either side closes.
async fn handle_websocket(
    stream: TcpStream,
    peer: SocketAddr,
    state: Arc<ServerState>,
) -> Result<(), BoxError> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let connection = Uuid::new_v4();
    info!(%peer, %connection, "WebSocket connected");

    let (mut write, mut read) = futures_util::StreamExt::split(ws_stream);

    // Subscribe before reading the snapshot so no diff falls in between.
    let mut rx = state.tick_sender.subscribe();
    let snapshot = state.snapshot_json.read().await.clone();
    futures_util::SinkExt::send(&mut write, Message::Text(snapshot.into())).await?;

    loop {
        tokio::select! {
            diff = rx.recv() => {
                match diff {
                    Ok(json) => {
                        if futures_util::SinkExt::send(&mut write, Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(%connection, lagged = n, "Client lagged behind on diffs");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = futures_util::StreamExt::next(&mut read) => {
                match msg {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
        }
    }

    info!(%peer, %connection, "WebSocket disconnected");
    Ok(())
}

async fn write_response(
    mut stream: TcpStream,
    status: &str,
    body: &str,
) -> Result<(), BoxError> {
    // Drain the request before answering.
    let mut buf = vec![0u8; 4096];
    let _ = stream.read(&mut buf).await?;

    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len(),
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

async fn handle_health_request(stream: TcpStream, state: Arc<ServerState>) -> Result<(), BoxError> {
    let body = serde_json::to_string(&state.health.read().await.status())?;
    write_response(stream, "200 OK", &body).await
}

async fn handle_not_found(stream: TcpStream) -> Result<(), BoxError> {
    debug!("Unrouted HTTP request");
    write_response(stream, "404 Not Found", r#"{"error":"not found"}"#).await
}
