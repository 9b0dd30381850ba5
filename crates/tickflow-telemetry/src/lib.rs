//! Telemetry: structured logging and Prometheus metrics.

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::{render_metrics, Metrics};
