use async_trait::async_trait;

use crate::buffer::{BatchBuffer, BatchFlush, FlushOutcome};
use crate::config::SinkConfig;
use crate::error::SinkError;
use crate::record::{BufferedItem, Record, WriteDirective, WriteOperation};
use crate::sink::{BatchSink, DocumentCollection};

/// Batching sink that submits one bulk write per flush to a document
/// collection.
///
/// The collection is bound at construction and never changes; use one sink
/// per collection. Failures are logged and swallowed: `write` never fails and
/// the batch stays buffered for the next attempt, which resubmits it whole.
pub struct DocumentSink<C> {
    buffer: BatchBuffer<BufferedItem>,
    target: BulkTarget<C>,
}

impl<C: DocumentCollection> DocumentSink<C> {
    pub fn new(config: SinkConfig, collection: C) -> Result<Self, SinkError> {
        config.validate()?;
        Ok(DocumentSink {
            buffer: BatchBuffer::new(config.instance_name, config.batch_size),
            target: BulkTarget { collection },
        })
    }

    pub fn collection(&self) -> &C {
        &self.target.collection
    }

    pub fn pending_items(&self) -> &[BufferedItem] {
        self.buffer.items()
    }

    /// Drop the buffered batch without writing it and hand it back.
    pub fn take_pending(&mut self) -> Vec<BufferedItem> {
        self.buffer.take()
    }

    /// Buffer one record with its directive.
    pub async fn write(&mut self, record: Record, directive: WriteDirective) {
        self.write_each([(record, directive)]).await
    }

    /// Buffer a sequence of records sharing one directive.
    pub async fn write_all<I>(&mut self, records: I, directive: WriteDirective)
    where
        I: IntoIterator<Item = Record>,
    {
        self.make_room().await;
        self.buffer.append(
            records
                .into_iter()
                .map(|record| BufferedItem::new(record, directive.clone())),
        );
    }

    /// Buffer records that each carry their own directive, e.g. a filter on
    /// the record's own key.
    pub async fn write_each<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = (Record, WriteDirective)>,
    {
        self.make_room().await;
        self.buffer.append(
            items
                .into_iter()
                .map(|(record, directive)| BufferedItem::new(record, directive)),
        );
    }

    async fn make_room(&mut self) {
        let outcome = self.buffer.make_room(&self.target).await;
        outcome.log_failure(self.buffer.instance_name());
    }
}

#[async_trait]
impl<C: DocumentCollection> BatchSink for DocumentSink<C> {
    fn instance_name(&self) -> &str {
        self.buffer.instance_name()
    }

    fn pending(&self) -> usize {
        self.buffer.len()
    }

    async fn flush(&mut self) -> FlushOutcome {
        let outcome = self.buffer.flush(&self.target).await;
        outcome.log_failure(self.buffer.instance_name());
        outcome
    }
}

struct BulkTarget<C> {
    collection: C,
}

#[async_trait]
impl<C: DocumentCollection> BatchFlush<BufferedItem> for BulkTarget<C> {
    fn destination(&self) -> Option<String> {
        Some(self.collection.namespace())
    }

    async fn flush_batch(&self, items: &[BufferedItem]) -> Result<(), SinkError> {
        let operations: Vec<WriteOperation> = items.iter().map(BufferedItem::to_operation).collect();
        self.collection
            .bulk_write(&operations)
            .await
            .map_err(SinkError::Driver)
    }
}
