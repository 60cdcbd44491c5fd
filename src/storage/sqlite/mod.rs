//! Shared `SQLite` infrastructure for storage backends.
//!
//! - [`connection`]: lock acquisition with poison recovery, pragma configuration
//! - [`metrics`]: per-operation counters and latency histograms

mod connection;
mod metrics;

pub use connection::{BUSY_TIMEOUT_MS, acquire_lock, configure_connection};
pub use metrics::record_operation_metrics;
