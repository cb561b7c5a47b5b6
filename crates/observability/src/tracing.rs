//! Tracing/logging initialization.

use std::str::FromStr;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub const LOG_FORMAT_VAR: &str = "GATEHOUSE_LOG_FORMAT";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Human-readable multi-line output for local development.
    Pretty,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown log format '{0}' (expected 'json' or 'pretty')")]
pub struct LogFormatError(String);

impl FromStr for LogFormat {
    type Err = LogFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(LogFormatError(other.to_owned())),
        }
    }
}

impl LogFormat {
    /// Read `GATEHOUSE_LOG_FORMAT`; unset or unrecognized values mean JSON.
    pub fn from_env() -> Self {
        std::env::var(LOG_FORMAT_VAR)
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default()
    }
}

/// Initialize tracing/logging for the process.
///
/// Filtering comes from `RUST_LOG` (default `info`). Safe to call multiple
/// times (subsequent calls are no-ops).
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false);

    let _ = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
}
