//! tickflow service library.
//!
//! Wires the engine together: feed ingestion, window aggregation, summary
//! persistence, and subscriber fan-out, all under one shutdown token.

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
