//! Core domain types for the tickflow aggregation engine.
//!
//! This crate provides the fundamental types shared across the system:
//! - `Tick`: one raw observed trade from the venue
//! - `SummaryRecord`: one aggregation-window result, in its wire shape
//! - `CoreError`: validation errors for ticks that must never enter the buffer

pub mod error;
pub mod summary;
pub mod tick;

pub use error::{CoreError, Result};
pub use summary::SummaryRecord;
pub use tick::Tick;
