use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{error, info};

use crate::error::SinkError;

/// Tracks how long the current accumulation window has been open.
///
/// Reset whenever the buffer goes from empty to non-empty.
#[derive(Debug, Clone)]
pub struct SessionClock {
    started: Instant,
    started_at: DateTime<Utc>,
}

impl SessionClock {
    pub fn start() -> Self {
        SessionClock {
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    pub fn reset(&mut self) {
        self.started = Instant::now();
        self.started_at = Utc::now();
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Wall-clock time at which the current window opened.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::start()
    }
}

/// Result of a flush attempt, returned by every sink.
///
/// `Flushed(0)` means no I/O took place (empty buffer or no destination).
/// `FailedRetained` means the backing store rejected the batch and every
/// item is still buffered for the next attempt.
#[must_use]
#[derive(Debug)]
pub enum FlushOutcome {
    Flushed(usize),
    FailedRetained(SinkError),
}

impl FlushOutcome {
    pub fn is_flushed(&self) -> bool {
        matches!(self, FlushOutcome::Flushed(_))
    }

    /// Number of items written, if the flush succeeded.
    pub fn flushed(&self) -> Option<usize> {
        match self {
            FlushOutcome::Flushed(count) => Some(*count),
            FlushOutcome::FailedRetained(_) => None,
        }
    }

    pub fn error(&self) -> Option<&SinkError> {
        match self {
            FlushOutcome::Flushed(_) => None,
            FlushOutcome::FailedRetained(err) => Some(err),
        }
    }

    /// Turn the outcome into a `Result` for callers that propagate failures.
    pub fn into_result(self) -> Result<usize, SinkError> {
        match self {
            FlushOutcome::Flushed(count) => Ok(count),
            FlushOutcome::FailedRetained(err) => Err(err),
        }
    }

    /// Emit the failure diagnostic used by the database sinks.
    pub(crate) fn log_failure(&self, instance: &str) {
        if let FlushOutcome::FailedRetained(err) = self {
            error!(instance = %instance, error = %err, "error @ flush()");
        }
    }
}

/// Sink-specific half of a flush: turns a batch into one native write.
///
/// Implementations must not keep partial state on failure; the buffer is
/// resubmitted unchanged on the next attempt.
#[async_trait]
pub trait BatchFlush<T: Send + Sync>: Send + Sync {
    /// Identity of the current destination, used in diagnostics.
    ///
    /// `None` means no destination has been routed yet and flushing is a
    /// no-op.
    fn destination(&self) -> Option<String>;

    /// Write `items` to the destination as one logical operation.
    async fn flush_batch(&self, items: &[T]) -> Result<(), SinkError>;
}

/// Ordered pending items plus the session state shared by all sinks.
#[derive(Debug)]
pub struct BatchBuffer<T> {
    instance_name: String,
    max_batch_size: usize,
    items: Vec<T>,
    clock: SessionClock,
}

impl<T: Send + Sync> BatchBuffer<T> {
    /// Create an empty buffer. A zero batch size is raised to one.
    pub fn new(instance_name: impl Into<String>, max_batch_size: usize) -> Self {
        BatchBuffer {
            instance_name: instance_name.into(),
            max_batch_size: max_batch_size.max(1),
            items: Vec::new(),
            clock: SessionClock::start(),
        }
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.max_batch_size
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }

    /// Append items in order, opening a new session window if the buffer
    /// was empty.
    pub fn append<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = T>,
    {
        if self.items.is_empty() {
            self.clock.reset();
        }
        self.items.extend(items);
    }

    /// Remove every pending item without writing it.
    pub fn take(&mut self) -> Vec<T> {
        std::mem::take(&mut self.items)
    }

    /// Flush first if the buffer already holds a full batch.
    pub async fn make_room<F>(&mut self, target: &F) -> FlushOutcome
    where
        F: BatchFlush<T> + ?Sized,
    {
        if self.is_full() {
            self.flush(target).await
        } else {
            FlushOutcome::Flushed(0)
        }
    }

    /// Write every pending item through `target`.
    ///
    /// The buffer is cleared only when `target` succeeds; on failure it is
    /// left exactly as it was.
    pub async fn flush<F>(&mut self, target: &F) -> FlushOutcome
    where
        F: BatchFlush<T> + ?Sized,
    {
        if self.items.is_empty() {
            return FlushOutcome::Flushed(0);
        }
        let Some(destination) = target.destination() else {
            return FlushOutcome::Flushed(0);
        };

        let session = self.clock.elapsed();
        let flush_started = Instant::now();

        match target.flush_batch(&self.items).await {
            Ok(()) => {
                let count = self.items.len();
                self.items.clear();
                info!(
                    instance = %self.instance_name,
                    length = count,
                    destination = %destination,
                    session_started = %self.clock.started_at().to_rfc3339(),
                    session = ?session,
                    flush = ?flush_started.elapsed(),
                    "flush"
                );
                FlushOutcome::Flushed(count)
            }
            Err(err) => FlushOutcome::FailedRetained(err),
        }
    }
}
