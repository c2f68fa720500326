use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::buffer::{BatchBuffer, BatchFlush, FlushOutcome};
use crate::config::{line_terminator, FileSinkConfig};
use crate::error::SinkError;
use crate::record::Record;
use crate::sink::BatchSink;

/// Batching sink that appends records to CSV files.
///
/// A single instance can stream to a sequence of files: whenever `write`
/// targets a different path than the previous call, the previous file's
/// batch is flushed before the new record is accepted, so one buffer never
/// mixes two destinations.
///
/// File failures are caller-visible: `write` returns the error of a failed
/// pre-flush and [`BatchSink::flush`] returns `FailedRetained`.
#[derive(Debug)]
pub struct FileSink {
    buffer: BatchBuffer<Record>,
    target: CsvFileTarget,
}

impl FileSink {
    /// Create a sink with no destination yet. Flushing before the first
    /// `write` does nothing.
    ///
    /// **Returns**
    /// - `Err(SinkError::InvalidConfig)` if the batch size is zero or the
    ///   line separator is neither `"\r\n"` nor a single ASCII character.
    pub fn new(config: FileSinkConfig) -> Result<Self, SinkError> {
        config.validate()?;
        let terminator = line_terminator(&config.new_line_character)?;
        Ok(FileSink {
            buffer: BatchBuffer::new(config.sink.instance_name, config.sink.batch_size),
            target: CsvFileTarget {
                path: None,
                new_line: config.new_line_character,
                terminator,
            },
        })
    }

    /// Create a sink already routed to `path`.
    pub fn with_path(config: FileSinkConfig, path: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let mut sink = Self::new(config)?;
        sink.target.path = Some(path.into());
        Ok(sink)
    }

    /// The remembered destination.
    pub fn path(&self) -> Option<&Path> {
        self.target.path.as_deref()
    }

    pub fn pending_records(&self) -> &[Record] {
        self.buffer.items()
    }

    /// Drop the buffered batch without writing it and hand it back.
    pub fn take_pending(&mut self) -> Vec<Record> {
        self.buffer.take()
    }

    /// Buffer one record for `workdir/filename`.
    pub async fn write(
        &mut self,
        workdir: impl AsRef<Path>,
        filename: impl AsRef<Path>,
        record: Record,
    ) -> Result<(), SinkError> {
        self.write_all(workdir, filename, [record]).await
    }

    /// Buffer a sequence of records for `workdir/filename`, in order.
    ///
    /// Flushes the previous file's batch first when the path changes, then
    /// flushes again if the buffer already holds a full batch. If either
    /// flush fails the error is returned, nothing is appended and the
    /// remembered path is unchanged.
    pub async fn write_all<I>(
        &mut self,
        workdir: impl AsRef<Path>,
        filename: impl AsRef<Path>,
        records: I,
    ) -> Result<(), SinkError>
    where
        I: IntoIterator<Item = Record>,
    {
        let path = workdir.as_ref().join(filename);

        if self.target.path.as_deref() != Some(path.as_path()) {
            self.buffer.flush(&self.target).await.into_result()?;
        }
        self.buffer.make_room(&self.target).await.into_result()?;

        self.target.path = Some(path);
        self.buffer.append(records);
        Ok(())
    }
}

#[async_trait]
impl BatchSink for FileSink {
    fn instance_name(&self) -> &str {
        self.buffer.instance_name()
    }

    fn pending(&self) -> usize {
        self.buffer.len()
    }

    async fn flush(&mut self) -> FlushOutcome {
        self.buffer.flush(&self.target).await
    }
}

#[derive(Debug)]
struct CsvFileTarget {
    path: Option<PathBuf>,
    new_line: String,
    terminator: csv::Terminator,
}

#[async_trait]
impl BatchFlush<Record> for CsvFileTarget {
    fn destination(&self) -> Option<String> {
        self.path.as_ref().map(|p| p.display().to_string())
    }

    async fn flush_batch(&self, items: &[Record]) -> Result<(), SinkError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };

        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|source| SinkError::Probe {
                path: path.to_path_buf(),
                source,
            })?;

        let mut text = render_csv(items, !exists, self.terminator, &self.new_line)?;
        if text.is_empty() {
            return Ok(());
        }
        // Existing files never end with a separator; start the batch on a
        // fresh line.
        if exists {
            text.insert_str(0, &self.new_line);
        }

        append(path, text.as_bytes()).await
    }
}

async fn append(path: &Path, bytes: &[u8]) -> Result<(), SinkError> {
    let append_error = |source: std::io::Error| SinkError::Append {
        path: path.to_path_buf(),
        source,
    };

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(append_error)?;
    file.write_all(bytes).await.map_err(append_error)?;
    file.flush().await.map_err(append_error)
}

/// Serialize records as CSV with the first record's fields as columns.
///
/// Rows whose cells are all blank are skipped. The output has no trailing
/// separator. A first record without fields yields `SinkError::EmptyRecord`.
pub fn render_csv(
    records: &[Record],
    header: bool,
    terminator: csv::Terminator,
    separator: &str,
) -> Result<String, SinkError> {
    let Some(first) = records.first() else {
        return Ok(String::new());
    };
    let columns: Vec<&str> = first.keys().map(String::as_str).collect();
    if columns.is_empty() {
        return Err(SinkError::EmptyRecord);
    }

    let mut writer = csv::WriterBuilder::new()
        .terminator(terminator)
        .from_writer(Vec::new());

    if header {
        writer.write_record(&columns)?;
    }
    for record in records {
        let row: Vec<String> = columns.iter().map(|c| render_cell(record.get(*c))).collect();
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        writer.write_record(&row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| SinkError::Serialization(e.to_string()))?;
    let mut text = String::from_utf8(bytes).map_err(|e| SinkError::Serialization(e.to_string()))?;
    if text.ends_with(separator) {
        text.truncate(text.len() - separator.len());
    }
    Ok(text)
}

fn render_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(nested) => nested.to_string(),
    }
}
