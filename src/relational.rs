use async_trait::async_trait;
use serde_json::Value;

use crate::buffer::{BatchBuffer, BatchFlush, FlushOutcome};
use crate::config::SinkConfig;
use crate::error::SinkError;
use crate::record::Record;
use crate::sink::{BatchSink, QueryClient};

/// PostgreSQL refuses statements binding more than this many parameters.
pub const DEFAULT_MAX_PARAMETERS: usize = 65_535;

/// Batching sink that inserts records into one relational table.
///
/// Each flush issues `INSERT ... ON CONFLICT DO NOTHING` statements, one per
/// chunk of at most `batch_size` rows, sequentially. Columns come from the
/// first buffered record and every other record must carry the same fields.
///
/// Failures are logged and swallowed like [`crate::document::DocumentSink`]:
/// the whole batch stays buffered, including chunks that were already
/// inserted, and conflicting rows are dropped when they are resubmitted.
///
/// The table name is interpolated as-is; callers must pass a trusted
/// identifier.
pub struct RelationalSink<C> {
    buffer: BatchBuffer<Record>,
    target: InsertTarget<C>,
}

impl<C: QueryClient> RelationalSink<C> {
    pub fn new(config: SinkConfig, client: C, table: impl Into<String>) -> Result<Self, SinkError> {
        config.validate()?;
        let target = InsertTarget {
            client,
            table: table.into(),
            max_rows: config.batch_size,
            max_parameters: DEFAULT_MAX_PARAMETERS,
        };
        Ok(RelationalSink {
            buffer: BatchBuffer::new(config.instance_name, config.batch_size),
            target,
        })
    }

    /// Cap the number of values bound by one statement.
    pub fn with_max_parameters(mut self, max_parameters: usize) -> Self {
        self.target.max_parameters = max_parameters.max(1);
        self
    }

    pub fn table(&self) -> &str {
        &self.target.table
    }

    pub fn client(&self) -> &C {
        &self.target.client
    }

    pub fn pending_records(&self) -> &[Record] {
        self.buffer.items()
    }

    /// Drop the buffered batch without writing it and hand it back.
    pub fn take_pending(&mut self) -> Vec<Record> {
        self.buffer.take()
    }

    pub async fn write(&mut self, record: Record) {
        self.write_all([record]).await
    }

    pub async fn write_all<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = Record>,
    {
        let outcome = self.buffer.make_room(&self.target).await;
        outcome.log_failure(self.buffer.instance_name());
        self.buffer.append(records);
    }
}

#[async_trait]
impl<C: QueryClient> BatchSink for RelationalSink<C> {
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

struct InsertTarget<C> {
    client: C,
    table: String,
    max_rows: usize,
    max_parameters: usize,
}

impl<C> InsertTarget<C> {
    fn rows_per_statement(&self, columns: usize) -> usize {
        let by_parameters = (self.max_parameters / columns.max(1)).max(1);
        self.max_rows.min(by_parameters)
    }
}

#[async_trait]
impl<C: QueryClient> BatchFlush<Record> for InsertTarget<C> {
    fn destination(&self) -> Option<String> {
        Some(self.table.clone())
    }

    async fn flush_batch(&self, items: &[Record]) -> Result<(), SinkError> {
        let columns = column_list(items)?;
        let rows_per_statement = self.rows_per_statement(columns.len());

        for chunk in items.chunks(rows_per_statement) {
            let sql = insert_statement(&self.table, &columns, chunk.len());
            let params: Vec<Value> = chunk
                .iter()
                .flat_map(|record| {
                    columns
                        .iter()
                        .map(move |column| record.get(column).cloned().unwrap_or(Value::Null))
                })
                .collect();
            self.client
                .execute(&sql, &params)
                .await
                .map_err(SinkError::Driver)?;
        }
        Ok(())
    }
}

/// Field names of the first record, after checking every record has
/// exactly those fields.
pub fn column_list(records: &[Record]) -> Result<Vec<String>, SinkError> {
    let Some(first) = records.first() else {
        return Ok(Vec::new());
    };
    let columns: Vec<String> = first.keys().cloned().collect();
    if columns.is_empty() {
        return Err(SinkError::EmptyRecord);
    }

    for (row, record) in records.iter().enumerate().skip(1) {
        let same_shape =
            record.len() == columns.len() && columns.iter().all(|c| record.contains_key(c));
        if !same_shape {
            return Err(SinkError::ColumnMismatch {
                row,
                expected: columns,
                found: record.keys().cloned().collect(),
            });
        }
    }
    Ok(columns)
}

/// `INSERT INTO t (a,b) VALUES ($1,$2),($3,$4) ON CONFLICT DO NOTHING`
pub fn insert_statement(table: &str, columns: &[String], rows: usize) -> String {
    let width = columns.len();
    let values: Vec<String> = (0..rows)
        .map(|row| {
            let placeholders: Vec<String> =
                (1..=width).map(|i| format!("${}", row * width + i)).collect();
            format!("({})", placeholders.join(","))
        })
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES {} ON CONFLICT DO NOTHING",
        table,
        columns.join(","),
        values.join(",")
    )
}
