//! Telemetry error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Logging init error: {0}")]
    LoggingInit(String),

    #[error("Metrics encoding error: {0}")]
    MetricsEncoding(String),
}

pub type TelemetryResult<T> = Result<T, TelemetryError>;
