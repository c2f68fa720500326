/// Environment variable names used by [`crate::config`] for convenient
/// configuration of sinks from services.
///
/// These are purely helpers; the sink types themselves never read the
/// environment.

/// Instance name used in diagnostics.
pub const BATCH_SINK_INSTANCE_NAME_ENV: &str = "BATCH_SINK_INSTANCE_NAME";

/// Maximum number of buffered records before an automatic flush.
pub const BATCH_SINK_BATCH_SIZE_ENV: &str = "BATCH_SINK_BATCH_SIZE";

/// Line separator for file sinks. Escapes `\n` and `\r` are understood.
pub const BATCH_SINK_NEW_LINE_CHARACTER_ENV: &str = "BATCH_SINK_NEW_LINE_CHARACTER";

/// `tracing` filter directive used by [`crate::init::init_logging`].
pub const BATCH_SINK_LOG_ENV: &str = "BATCH_SINK_LOG";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read an environment variable if it is set and non-empty.
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Expand the escapes people type into env files (`\n`, `\r`, `\t`).
pub fn unescape(value: &str) -> String {
    value
        .replace("\\r", "\r")
        .replace("\\n", "\n")
        .replace("\\t", "\t")
}
