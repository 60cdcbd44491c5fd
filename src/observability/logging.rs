//! Structured logging configuration.

use crate::config::LoggingSettings;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "chatlevels=info";
const VERBOSE_FILTER: &str = "chatlevels=debug";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parses a format name. Unknown names fall back to pretty.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Logging configuration.
#[derive(Debug)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Level filter.
    pub filter: EnvFilter,
}

impl LoggingConfig {
    /// Builds logging configuration from config settings.
    ///
    /// Precedence for the filter: `RUST_LOG`, then `--verbose`, then the
    /// config file, then the built-in default.
    #[must_use]
    pub fn from_settings(settings: Option<&LoggingSettings>, verbose: bool) -> Self {
        let format = settings
            .and_then(|s| s.format.as_deref())
            .map(LogFormat::parse)
            .unwrap_or_default();

        let directive = if verbose {
            VERBOSE_FILTER.to_string()
        } else {
            settings
                .and_then(|s| s.filter.clone())
                .unwrap_or_else(|| DEFAULT_FILTER.to_string())
        };

        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&directive))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        Self { format, filter }
    }
}
