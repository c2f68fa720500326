use async_trait::async_trait;
use serde_json::Value;

use crate::buffer::FlushOutcome;
use crate::error::BoxError;
use crate::record::WriteOperation;

/// Common surface of every batching sink.
///
/// Writing is sink-specific (file sinks take a destination, document sinks
/// take a directive), but draining is not: a shutdown hook can hold a list of
/// `&mut dyn BatchSink` and flush them all with [`flush_all`].
#[async_trait]
pub trait BatchSink: Send {
    /// Name used in diagnostics.
    fn instance_name(&self) -> &str;

    /// Number of items waiting for the next flush.
    fn pending(&self) -> usize;

    /// Write every pending item to the backing store.
    ///
    /// **Returns**
    /// - `FlushOutcome::Flushed(n)` once `n` items were written and the buffer
    ///   was emptied. `n == 0` means nothing was written.
    /// - `FlushOutcome::FailedRetained(err)` if the store rejected the batch.
    ///   The buffer is left intact and will be resubmitted by the next flush.
    async fn flush(&mut self) -> FlushOutcome;
}

/// Bulk-write-capable document collection handle.
///
/// The handle owns the connection; sinks only borrow it to submit one bulk
/// operation per flush.
#[async_trait]
pub trait DocumentCollection: Send + Sync {
    /// Identity of the collection, e.g. `db.collection`.
    fn namespace(&self) -> String;

    /// Submit every operation in a single round trip.
    ///
    /// **Returns**
    /// - `Ok(())` if the store accepted the whole bulk.
    /// - `Err(..)` on any driver failure. The sink treats the whole bulk as
    ///   failed and keeps it buffered.
    async fn bulk_write(&self, operations: &[WriteOperation]) -> Result<(), BoxError>;
}

/// Query-executing relational client handle.
#[async_trait]
pub trait QueryClient: Send + Sync {
    /// Execute one parameterized statement.
    ///
    /// `params` is flat and positional: `$1` is `params[0]`.
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<(), BoxError>;
}

#[async_trait]
impl<C: DocumentCollection + ?Sized> DocumentCollection for std::sync::Arc<C> {
    fn namespace(&self) -> String {
        (**self).namespace()
    }

    async fn bulk_write(&self, operations: &[WriteOperation]) -> Result<(), BoxError> {
        (**self).bulk_write(operations).await
    }
}

#[async_trait]
impl<C: QueryClient + ?Sized> QueryClient for std::sync::Arc<C> {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<(), BoxError> {
        (**self).execute(sql, params).await
    }
}

/// Flush each sink in order, returning one outcome per sink.
///
/// Intended for shutdown hooks. A failing sink does not stop the others.
pub async fn flush_all(sinks: &mut [&mut dyn BatchSink]) -> Vec<FlushOutcome> {
    let mut outcomes = Vec::with_capacity(sinks.len());
    for sink in sinks.iter_mut() {
        outcomes.push(sink.flush().await);
    }
    outcomes
}
