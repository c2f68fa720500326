use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::env::{env_or, BATCH_SINK_LOG_ENV};
use crate::error::InitError;

/// Logging setup for binaries that embed the sinks.
///
/// **Fields**
/// - `filter`: `tracing` filter directive, e.g. `"info"` or
///   `"batch_write_sink=debug"`.
/// - `ansi`: colorize console output.
/// - `with_target`: print the event target next to each line.
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub filter: String,
    pub ansi: bool,
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            ansi: true,
            with_target: false,
        }
    }
}

impl LoggingConfig {
    /// Defaults with the filter taken from `BATCH_SINK_LOG` when set.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            filter: env_or(BATCH_SINK_LOG_ENV, &default.filter),
            ..default
        }
    }
}

/// Install a global `tracing` subscriber printing flush diagnostics to the
/// console.
///
/// **Returns**
/// - `Ok(())` once the subscriber is installed.
/// - `Err(InitError::Filter)` if `config.filter` does not parse.
/// - `Err(InitError::AlreadyInstalled)` if the process already has one.
pub fn init_logging(config: LoggingConfig) -> Result<(), InitError> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| InitError::Filter(e.to_string()))?;
    let fmt_layer = fmt::layer()
        .with_ansi(config.ansi)
        .with_target(config.with_target);

    Registry::default()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|_| InitError::AlreadyInstalled)
}

/// Initialize logging with [`LoggingConfig::from_env`].
///
/// This is the recommended entrypoint for typical services.
pub fn init_logging_default() -> Result<(), InitError> {
    init_logging(LoggingConfig::from_env())
}
