//! Structured logging configuration.

use crate::config::LoggingSettings;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Logging configuration.
#[derive(Debug)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Event filter.
    pub filter: EnvFilter,
}

impl LoggingConfig {
    /// Default filter when nothing is configured.
    pub const DEFAULT_FILTER: &'static str = "signin=info";

    /// Builds logging config from settings.
    ///
    /// `verbose` wins over any configured filter. An unknown format falls
    /// back to pretty and an invalid filter to [`Self::DEFAULT_FILTER`].
    #[must_use]
    pub fn from_settings(settings: Option<&LoggingSettings>, verbose: bool) -> Self {
        let format = settings
            .and_then(|s| s.format.as_deref())
            .and_then(|f| f.parse().ok())
            .unwrap_or_default();

        let directive = if verbose {
            "debug"
        } else {
            settings
                .and_then(|s| s.filter.as_deref())
                .unwrap_or(Self::DEFAULT_FILTER)
        };
        let filter = EnvFilter::try_new(directive)
            .unwrap_or_else(|_| EnvFilter::new(Self::DEFAULT_FILTER));

        Self { format, filter }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::from_settings(None, false)
    }
}
