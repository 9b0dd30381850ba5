//! Failover integration tests: push-transport failure must hand ingestion
//! over to the polling fallback without manual intervention.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tickflow_core::Tick;
use tickflow_feed::{FeedConfig, FeedManager, FeedState, PollEndpoint, TickBuffer};
use tokio_util::sync::CancellationToken;

async fn quote() -> Json<serde_json::Value> {
    Json(serde_json::json!({"bitcoin": {"usd": 100.5, "usd_24h_vol": 42.0}}))
}

async fn broken() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "upstream down")
}

async fn spawn_quote_server() -> SocketAddr {
    let app = Router::new()
        .route("/price", get(quote))
        .route("/broken", get(broken));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Wait until the buffer contains a tick from `source`, up to ~2 seconds.
async fn wait_for_tick(
    buffer: &tickflow_feed::SharedTickBuffer,
    source: &str,
) -> Option<Tick> {
    for _ in 0..200 {
        let cutoff = chrono::Utc::now() - chrono::Duration::seconds(3600);
        let snapshot = buffer.lock().snapshot_since(cutoff);
        if let Some(tick) = snapshot.into_iter().find(|t| t.source_id == source) {
            return Some(tick);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    None
}

#[tokio::test]
async fn test_failover_to_polling_after_push_connect_failure() {
    let addr = spawn_quote_server().await;
    let buffer = TickBuffer::shared(100);
    let shutdown = CancellationToken::new();

    let config = FeedConfig {
        // Nothing listens here; the handshake fails immediately
        ws_url: "ws://127.0.0.1:9".to_string(),
        symbol: "BTCUSD".to_string(),
        connect_timeout: Duration::from_secs(1),
        poll_interval: Duration::from_millis(50),
        poll_endpoints: vec![PollEndpoint {
            name: "LocalQuote".to_string(),
            url: format!("http://{}/price", addr),
            price_pointer: "/bitcoin/usd".to_string(),
            volume_pointer: Some("/bitcoin/usd_24h_vol".to_string()),
        }],
    };

    let manager = Arc::new(FeedManager::new(config, buffer.clone(), shutdown.clone()).unwrap());
    let runner = Arc::clone(&manager);
    let handle = tokio::spawn(async move { runner.run().await });

    let tick = wait_for_tick(&buffer, "LocalQuote")
        .await
        .expect("polling fallback should have produced a tick");
    assert_eq!(tick.symbol, "BTCUSD");
    assert_eq!(tick.price, 100.5);
    assert_eq!(tick.volume, 42.0);
    assert!(matches!(manager.state(), FeedState::Polling { .. }));

    shutdown.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_poll_rotation_on_endpoint_failure() {
    let addr = spawn_quote_server().await;
    let buffer = TickBuffer::shared(100);
    let shutdown = CancellationToken::new();

    let config = FeedConfig {
        ws_url: "ws://127.0.0.1:9".to_string(),
        symbol: "BTCUSD".to_string(),
        connect_timeout: Duration::from_secs(1),
        poll_interval: Duration::from_millis(50),
        poll_endpoints: vec![
            PollEndpoint {
                name: "Broken".to_string(),
                url: format!("http://{}/broken", addr),
                price_pointer: "/bitcoin/usd".to_string(),
                volume_pointer: None,
            },
            PollEndpoint {
                name: "Backup".to_string(),
                url: format!("http://{}/price", addr),
                price_pointer: "/bitcoin/usd".to_string(),
                volume_pointer: Some("/bitcoin/usd_24h_vol".to_string()),
            },
        ],
    };

    let manager = Arc::new(FeedManager::new(config, buffer.clone(), shutdown.clone()).unwrap());
    let runner = Arc::clone(&manager);
    let handle = tokio::spawn(async move { runner.run().await });

    // The first endpoint fails, rotation lands on the second
    let tick = wait_for_tick(&buffer, "Backup")
        .await
        .expect("rotation should reach the working endpoint");
    assert_eq!(tick.price, 100.5);
    assert_eq!(manager.state(), FeedState::Polling { endpoint: 1 });

    shutdown.cancel();
    handle.await.unwrap().unwrap();
}
