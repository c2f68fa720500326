pub mod buffer;
pub mod config;
pub mod document;
pub mod env;
pub mod error;
pub mod file;
pub mod init;
pub mod memory;
pub mod record;
pub mod relational;
pub mod sink;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "mongodb")]
pub mod mongo;

pub use buffer::{BatchBuffer, BatchFlush, FlushOutcome, SessionClock};
pub use config::{FileSinkConfig, SinkConfig};
pub use document::DocumentSink;
pub use error::SinkError;
pub use file::FileSink;
pub use record::{BufferedItem, Record, WriteDirective, WriteOperation};
pub use relational::RelationalSink;
pub use sink::{flush_all, BatchSink, DocumentCollection, QueryClient};
