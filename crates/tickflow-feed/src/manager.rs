//! Feed transport manager.
//!
//! Owns exactly one active ingestion transport at a time. Starts on the live
//! WebSocket feed; on handshake failure, connect timeout, or any error/close
//! of an established connection it fails over to the polling fallback and
//! stays there, rotating endpoints on failure. There is no transition back
//! from polling to the live feed.
//!
//! Transport events are a closed message set delivered over a channel into a
//! single consumer task, which is the only writer on the ingestion side of
//! the tick buffer.

use crate::buffer::SharedTickBuffer;
use crate::error::FeedResult;
use crate::parser::TickParser;
use crate::poll::{PollClient, PollEndpoint};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::time::Duration;
use tickflow_telemetry::Metrics;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async_tls_with_config, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Feed configuration.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Live push-transport WebSocket URL.
    pub ws_url: String,
    /// Instrument symbol attached to polled ticks.
    pub symbol: String,
    /// Push-transport connect timeout.
    pub connect_timeout: Duration,
    /// Fixed interval between poll requests in fallback mode.
    pub poll_interval: Duration,
    /// Ordered polling endpoint list.
    pub poll_endpoints: Vec<PollEndpoint>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            ws_url: String::new(),
            symbol: "BTCUSD".to_string(),
            connect_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(30),
            poll_endpoints: Vec::new(),
        }
    }
}

/// Transport state. Exactly one is active at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    /// Push-transport handshake in progress.
    Connecting,
    /// Live push transport established.
    Live,
    /// Polling fallback, currently targeting `endpoint`.
    Polling { endpoint: usize },
}

fn state_label(state: FeedState) -> &'static str {
    match state {
        FeedState::Connecting => "connecting",
        FeedState::Live => "live",
        FeedState::Polling { .. } => "polling",
    }
}

/// Events emitted by the push transport task.
#[derive(Debug)]
pub enum TransportEvent {
    /// Handshake completed.
    Connected,
    /// One text payload received.
    Payload(String),
    /// Server closed the connection or the stream ended.
    Closed,
    /// Connect or mid-stream failure.
    Error(String),
}

/// Feed transport manager.
pub struct FeedManager {
    config: FeedConfig,
    buffer: SharedTickBuffer,
    parser: TickParser,
    poll: PollClient,
    state: RwLock<FeedState>,
    shutdown: CancellationToken,
}

impl FeedManager {
    /// Create a new feed manager.
    pub fn new(
        config: FeedConfig,
        buffer: SharedTickBuffer,
        shutdown: CancellationToken,
    ) -> FeedResult<Self> {
        let poll = PollClient::new(config.poll_endpoints.clone(), config.symbol.clone())?;
        Ok(Self {
            config,
            buffer,
            parser: TickParser::new(),
            poll,
            state: RwLock::new(FeedState::Connecting),
            shutdown,
        })
    }

    /// Get current transport state.
    pub fn state(&self) -> FeedState {
        *self.state.read()
    }

    fn set_state(&self, state: FeedState) {
        *self.state.write() = state;
        Metrics::feed_state_set(state_label(state));
    }

    /// Run the ingestion path until shutdown.
    ///
    /// Tries the push transport once; after it fails or closes, polls
    /// forever. Only returns on cancellation.
    pub async fn run(&self) -> FeedResult<()> {
        self.set_state(FeedState::Connecting);
        info!(url = %self.config.ws_url, "Connecting to live feed");

        let (event_tx, mut event_rx) = mpsc::channel(256);
        tokio::spawn(run_push_transport(
            self.config.ws_url.clone(),
            self.config.connect_timeout,
            event_tx,
            self.shutdown.clone(),
        ));

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    info!("Shutdown requested, stopping feed manager");
                    return Ok(());
                }
                event = event_rx.recv() => match event {
                    Some(TransportEvent::Connected) => {
                        info!("Live feed connected");
                        self.set_state(FeedState::Live);
                    }
                    Some(TransportEvent::Payload(text)) => {
                        self.ingest_push_payload(&text);
                    }
                    Some(TransportEvent::Closed) => {
                        warn!("Live feed closed, failing over to polling");
                        break;
                    }
                    Some(TransportEvent::Error(reason)) => {
                        warn!(%reason, "Live feed error, failing over to polling");
                        break;
                    }
                    None => {
                        warn!("Live feed task ended, failing over to polling");
                        break;
                    }
                },
            }
        }

        self.run_poll_loop().await
    }

    fn ingest_push_payload(&self, text: &str) {
        match self.parser.parse_push_payload(text) {
            Ok(Some(tick)) => {
                Metrics::tick_ingested(&tick.source_id);
                self.buffer.lock().append(tick);
            }
            Ok(None) => {
                debug!("Ignoring non-trade message");
            }
            Err(e) => {
                warn!(error = %e, "Dropping malformed payload");
                Metrics::payload_dropped("malformed_push");
            }
        }
    }

    /// Poll loop. Never self-terminates; rotates endpoints on failure.
    async fn run_poll_loop(&self) -> FeedResult<()> {
        let mut endpoint_idx = 0usize;
        self.set_state(FeedState::Polling {
            endpoint: endpoint_idx,
        });
        info!(
            interval_ms = self.config.poll_interval.as_millis() as u64,
            endpoints = self.poll.endpoint_count(),
            "Starting polling fallback feed"
        );

        let mut interval = tokio::time::interval(self.config.poll_interval);
        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    info!("Shutdown requested, stopping poll loop");
                    return Ok(());
                }
                _ = interval.tick() => {}
            }

            match self.poll.fetch(endpoint_idx).await {
                Ok(tick) => {
                    debug!(source = %tick.source_id, price = tick.price, "Poll tick received");
                    Metrics::tick_ingested(&tick.source_id);
                    self.buffer.lock().append(tick);
                }
                Err(e) => {
                    warn!(
                        endpoint = self.poll.endpoint_name(endpoint_idx),
                        error = %e,
                        "Poll failed, rotating to next endpoint"
                    );
                    Metrics::payload_dropped("poll_failure");
                    Metrics::poll_rotated();
                    endpoint_idx = (endpoint_idx + 1) % self.poll.endpoint_count();
                    self.set_state(FeedState::Polling {
                        endpoint: endpoint_idx,
                    });
                }
            }
        }
    }
}

/// Push transport task: connect with timeout, then pump frames into the
/// event channel until close, error, or cancellation.
async fn run_push_transport(
    url: String,
    connect_timeout: Duration,
    tx: mpsc::Sender<TransportEvent>,
    cancel: CancellationToken,
) {
    let connect = connect_async_tls_with_config(&url, None, true, None);
    let ws_stream = match tokio::time::timeout(connect_timeout, connect).await {
        Err(_) => {
            let _ = tx
                .send(TransportEvent::Error(format!(
                    "connect timeout after {}s",
                    connect_timeout.as_secs()
                )))
                .await;
            return;
        }
        Ok(Err(e)) => {
            let _ = tx.send(TransportEvent::Error(e.to_string())).await;
            return;
        }
        Ok(Ok((ws_stream, _response))) => ws_stream,
    };

    if tx.send(TransportEvent::Connected).await.is_err() {
        return;
    }

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                // Graceful close; best effort
                if let Err(e) = write.send(Message::Close(None)).await {
                    debug!(?e, "Failed to send Close frame during shutdown");
                }
                return;
            }
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if tx.send(TransportEvent::Payload(text)).await.is_err() {
                        return;
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = write.send(Message::Pong(data)).await {
                        let _ = tx.send(TransportEvent::Error(e.to_string())).await;
                        return;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (u16::from(f.code), f.reason.to_string()))
                        .unwrap_or((1000, "Normal close".to_string()));
                    warn!(code, %reason, "Live feed closed by server");
                    let _ = tx.send(TransportEvent::Closed).await;
                    return;
                }
                Some(Err(e)) => {
                    let _ = tx.send(TransportEvent::Error(e.to_string())).await;
                    return;
                }
                None => {
                    let _ = tx.send(TransportEvent::Closed).await;
                    return;
                }
                _ => {}
            }
        }
    }
}
