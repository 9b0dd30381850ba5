//! Subscriber-facing HTTP server using axum.
//!
//! Exposes `/ws` (subscriber WebSocket upgrade) and `/metrics` (Prometheus
//! text format). Everything else about the engine is reachable only through
//! the hub it wraps.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::stream::StreamExt;
use futures_util::SinkExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::hub::BroadcastHub;

/// Subscriber server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum concurrent subscriber connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_port() -> u16 {
    5002
}

fn default_max_connections() -> usize {
    64
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            max_connections: default_max_connections(),
        }
    }
}

/// Connection limiter to prevent too many concurrent WebSocket connections.
pub struct ConnectionLimiter {
    current: AtomicUsize,
    max: usize,
}

impl ConnectionLimiter {
    pub fn new(max: usize) -> Self {
        Self {
            current: AtomicUsize::new(0),
            max,
        }
    }

    pub fn try_acquire(&self) -> Option<ConnectionGuard<'_>> {
        loop {
            let current = self.current.load(Ordering::Acquire);
            if current >= self.max {
                return None;
            }
            if self
                .current
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(ConnectionGuard { limiter: self });
            }
        }
    }

    pub fn current_count(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }
}

pub struct ConnectionGuard<'a> {
    limiter: &'a ConnectionLimiter,
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        self.limiter.current.fetch_sub(1, Ordering::Release);
    }
}

/// Shared application state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    hub: Arc<BroadcastHub>,
    connection_limiter: Arc<ConnectionLimiter>,
}

impl AppState {
    pub fn new(hub: Arc<BroadcastHub>, config: &ServerConfig) -> Self {
        Self {
            hub,
            connection_limiter: Arc::new(ConnectionLimiter::new(config.max_connections)),
        }
    }
}

/// Create the axum router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/metrics", get(metrics_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Prometheus metrics in text format.
async fn metrics_handler() -> String {
    tickflow_telemetry::render_metrics()
}

/// WebSocket upgrade handler.
async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    // Reject over-limit connections before upgrading
    let guard = match state.connection_limiter.try_acquire() {
        Some(guard) => guard,
        None => {
            warn!(
                current = state.connection_limiter.current_count(),
                "Subscriber connection limit reached"
            );
            return (StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response();
        }
    };

    // The guard cannot travel into the upgrade closure; release here and
    // re-acquire inside the connection handler.
    drop(guard);

    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Handle one subscriber connection for its lifetime.
async fn handle_ws_connection(socket: WebSocket, state: AppState) {
    let _guard = match state.connection_limiter.try_acquire() {
        Some(guard) => guard,
        None => {
            warn!("Connection limit reached during upgrade");
            return;
        }
    };

    let id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    // Registration pushes the latest persisted summary, if any
    state.hub.register(id, tx);

    // Incoming side: only close frames and errors are interesting
    let mut incoming_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) => {
                    debug!("Client sent close frame");
                    break;
                }
                Err(e) => {
                    debug!(error = %e, "WebSocket receive error");
                    break;
                }
                _ => {}
            }
        }
    });

    // Outgoing side: drain hub frames into the socket
    loop {
        tokio::select! {
            frame = rx.recv() => {
                match frame {
                    Some(payload) => {
                        if sender.send(Message::Text(payload.into())).await.is_err() {
                            debug!(subscriber = %id, "Failed to send frame, client disconnected");
                            break;
                        }
                    }
                    None => {
                        debug!(subscriber = %id, "Hub dropped the subscriber channel");
                        break;
                    }
                }
            }
            _ = &mut incoming_task => {
                debug!(subscriber = %id, "Incoming task completed, closing connection");
                break;
            }
        }
    }

    state.hub.unregister(id);
    info!(
        subscriber = %id,
        connections = state.connection_limiter.current_count().saturating_sub(1),
        "Subscriber connection closed"
    );
}

/// Run the subscriber server until the token is cancelled.
pub async fn run_server(
    hub: Arc<BroadcastHub>,
    config: ServerConfig,
    shutdown: CancellationToken,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let state = AppState::new(hub, &config);
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(port = config.port, "Starting subscriber server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_server_config() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 5002);
        assert_eq!(config.max_connections, 64);
    }

    #[test]
    fn test_connection_limiter() {
        let limiter = ConnectionLimiter::new(2);
        let g1 = limiter.try_acquire().unwrap();
        let _g2 = limiter.try_acquire().unwrap();
        assert!(limiter.try_acquire().is_none());

        drop(g1);
        assert!(limiter.try_acquire().is_some());
    }
}
