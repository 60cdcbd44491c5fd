//! Observability: structured logging and metrics.
//!
//! Logging goes through `tracing`; [`init`] installs a `tracing-subscriber`
//! registry once per process. Counters are emitted with the `metrics` facade
//! and are no-ops until the host installs a recorder.

mod logging;

pub use logging::{LogFormat, LoggingConfig};

use crate::{Error, Result};
use std::sync::OnceLock;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static OBSERVABILITY_INIT: OnceLock<()> = OnceLock::new();

/// Initializes logging for the process.
///
/// Log lines go to stderr so stdout stays free for pipeline output.
///
/// # Errors
///
/// Returns an error if logging has already been initialized.
pub fn init(config: LoggingConfig) -> Result<()> {
    if OBSERVABILITY_INIT.get().is_some() {
        return Err(init_error("observability already initialized"));
    }

    match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .with(config.filter)
            .try_init()
            .map_err(init_error)?,
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .with(config.filter)
            .try_init()
            .map_err(init_error)?,
    }

    OBSERVABILITY_INIT
        .set(())
        .map_err(|()| init_error("failed to mark observability initialized"))
}

#[allow(clippy::needless_pass_by_value)]
fn init_error(cause: impl ToString) -> Error {
    Error::InvalidInput(format!("observability_init: {}", cause.to_string()))
}
