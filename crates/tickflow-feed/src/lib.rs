//! Venue feed ingestion.
//!
//! Provides the ingestion half of the engine:
//! - `TickBuffer`: bounded rolling store of raw ticks
//! - `TickParser`: normalizes venue payloads into validated ticks
//! - `PollClient`: rotating REST fallback with per-endpoint parse rules
//! - `FeedManager`: owns the active transport, failing over from the live
//!   WebSocket feed to polling and never back

pub mod buffer;
pub mod error;
pub mod manager;
pub mod parser;
pub mod poll;

pub use buffer::{SharedTickBuffer, TickBuffer};
pub use error::{FeedError, FeedResult};
pub use manager::{FeedConfig, FeedManager, FeedState, TransportEvent};
pub use parser::{IngestStats, TickParser, LIVE_SOURCE_ID};
pub use poll::{PollClient, PollEndpoint};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
