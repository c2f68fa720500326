use std::error::Error;
use std::path::PathBuf;

/// Boxed error returned by backing-store handles.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Error type shared by every sink.
///
/// File sinks surface these to the caller; database sinks log them and
/// keep the batch buffered (see [`crate::buffer::FlushOutcome`]).
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("invalid sink configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to probe {}: {source}", path.display())]
    Probe {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error appending data to file {}: {source}", path.display())]
    Append {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv serialization failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("driver error: {0}")]
    Driver(#[source] BoxError),

    #[error("first record of the batch has no fields")]
    EmptyRecord,

    #[error("record {row} has columns {found:?}, expected {expected:?}")]
    ColumnMismatch {
        row: usize,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl SinkError {
    /// Wrap an arbitrary backend failure.
    pub fn driver(err: impl Into<BoxError>) -> Self {
        SinkError::Driver(err.into())
    }
}

/// Error returned when installing the global `tracing` subscriber.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("invalid log filter directive: {0}")]
    Filter(String),

    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled,
}
