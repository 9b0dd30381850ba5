//! Subscriber broadcast hub.
//!
//! Maintains the live subscriber set, pushes the most recent persisted
//! summary to each new connection, and fans every new summary out to all
//! current connections. Delivery is at-least-once best-effort with no
//! subscriber acknowledgment; a failing connection is dropped and never
//! invoked again.

pub mod hub;
pub mod server;
pub mod types;

pub use hub::{BroadcastHub, SubscriberId};
pub use server::{run_server, AppState, ConnectionLimiter, ServerConfig};
pub use types::ClientFrame;
