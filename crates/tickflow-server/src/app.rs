//! Main application orchestration.
//!
//! Coordinates the engine's components:
//! - Feed ingestion (live WebSocket with polling failover)
//! - Window aggregation
//! - Summary persistence
//! - Subscriber fan-out

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use std::sync::Arc;
use tickflow_agg::Aggregator;
use tickflow_feed::{FeedManager, TickBuffer};
use tickflow_hub::{run_server, BroadcastHub};
use tickflow_store::{JsonLinesStore, SummaryStore};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Main application.
pub struct Application {
    config: AppConfig,
    store: Arc<dyn SummaryStore>,
    hub: Arc<BroadcastHub>,
    shutdown: CancellationToken,
}

impl Application {
    /// Create a new application with the JSON Lines store.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let store: Arc<dyn SummaryStore> = Arc::new(JsonLinesStore::open(
            &config.store.data_dir,
            config.store.cache_size,
        )?);
        let hub = Arc::new(BroadcastHub::new(store.clone()));

        Ok(Self {
            config,
            store,
            hub,
            shutdown: CancellationToken::new(),
        })
    }

    /// Token that stops every component when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run the engine until ctrl-c or cancellation.
    pub async fn run(self) -> AppResult<()> {
        let buffer = TickBuffer::shared(self.config.feed.buffer_capacity);

        let feed = FeedManager::new(
            self.config.feed_config(),
            buffer.clone(),
            self.shutdown.clone(),
        )?;
        let aggregator = Aggregator::new(
            self.config.aggregation.clone(),
            buffer,
            self.store.clone(),
            self.hub.clone(),
            self.shutdown.clone(),
        );

        info!(
            symbol = %self.config.symbol,
            window_secs = self.config.aggregation.window_secs,
            port = self.config.server.port,
            "Starting tickflow engine"
        );

        let feed_task = tokio::spawn(async move { feed.run().await });
        let agg_task = tokio::spawn(async move { aggregator.run().await });
        let mut server_task = tokio::spawn(run_server(
            self.hub.clone(),
            self.config.server.clone(),
            self.shutdown.clone(),
        ));

        // The feed and aggregator only exit on cancellation; the server can
        // also exit early (e.g., failure to bind the port).
        let mut server_result = None;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
            }
            () = self.shutdown.cancelled() => {
                info!("Shutdown requested");
            }
            result = &mut server_task => {
                warn!("Subscriber server exited");
                server_result = Some(result);
            }
        }

        // Stop everything; in-flight aggregation work is discarded
        self.shutdown.cancel();
        match feed_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Feed manager exited with error"),
            Err(e) => error!(error = %e, "Feed task failed"),
        }
        if let Err(e) = agg_task.await {
            error!(error = %e, "Aggregator task failed");
        }

        let server_result = match server_result {
            Some(result) => result,
            None => server_task.await,
        };
        match server_result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(AppError::Server(e.to_string())),
            Err(e) => return Err(AppError::Server(e.to_string())),
        }

        info!("tickflow engine stopped");
        Ok(())
    }
}
