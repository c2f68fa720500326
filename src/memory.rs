//! In-memory backing handles.
//!
//! Useful for unit tests, demos and for measuring the overhead of the
//! batching layer without any external I/O. Both handles record every
//! accepted call and can be told to fail specific calls.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::BoxError;
use crate::record::{Record, WriteOperation};
use crate::sink::{DocumentCollection, QueryClient};

#[derive(Debug, Default)]
struct FailurePlan {
    calls: AtomicUsize,
    failing: Mutex<HashSet<usize>>,
}

impl FailurePlan {
    fn fail_next(&self, n: usize) {
        let next = self.calls.load(Ordering::SeqCst);
        lock(&self.failing).extend(next..next + n);
    }

    fn fail_call(&self, index: usize) {
        lock(&self.failing).insert(index);
    }

    /// Count a call and report whether it should fail.
    fn begin(&self) -> Result<(), BoxError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        if lock(&self.failing).remove(&index) {
            return Err(format!("injected failure on call {index}").into());
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Document collection kept in a `Vec`.
///
/// Accepted bulks are recorded verbatim and applied to the stored documents
/// with the usual filter semantics: a filter matches a document whose fields
/// equal every filter field. Only the `$set` update operator is interpreted.
#[derive(Debug, Default)]
pub struct MemoryCollection {
    namespace: String,
    bulks: Mutex<Vec<Vec<WriteOperation>>>,
    documents: Mutex<Vec<Record>>,
    failures: FailurePlan,
}

impl MemoryCollection {
    pub fn new(namespace: impl Into<String>) -> Self {
        MemoryCollection {
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    /// Every accepted bulk, in submission order.
    pub fn bulks(&self) -> Vec<Vec<WriteOperation>> {
        lock(&self.bulks).clone()
    }

    pub fn documents(&self) -> Vec<Record> {
        lock(&self.documents).clone()
    }

    /// Number of `bulk_write` calls, failed ones included.
    pub fn calls(&self) -> usize {
        self.failures.calls.load(Ordering::SeqCst)
    }

    /// Make the next `n` calls fail.
    pub fn fail_next(&self, n: usize) {
        self.failures.fail_next(n)
    }

    /// Make the call with this zero-based index fail.
    pub fn fail_call(&self, index: usize) {
        self.failures.fail_call(index)
    }
}

#[async_trait]
impl DocumentCollection for MemoryCollection {
    fn namespace(&self) -> String {
        self.namespace.clone()
    }

    async fn bulk_write(&self, operations: &[WriteOperation]) -> Result<(), BoxError> {
        self.failures.begin()?;

        let mut documents = lock(&self.documents);
        for operation in operations {
            apply(&mut documents, operation);
        }
        lock(&self.bulks).push(operations.to_vec());
        Ok(())
    }
}

fn matches(document: &Record, filter: &Record) -> bool {
    filter.iter().all(|(k, v)| document.get(k) == Some(v))
}

fn apply(documents: &mut Vec<Record>, operation: &WriteOperation) {
    let position = documents.iter().position(|d| matches(d, operation.filter()));
    match (operation, position) {
        (WriteOperation::ReplaceOne { replacement, .. }, Some(i)) => {
            documents[i] = replacement.clone();
        }
        (WriteOperation::ReplaceOne { filter, replacement, upsert: true }, None) => {
            let mut document = filter.clone();
            document.extend(replacement.clone());
            documents.push(document);
        }
        (WriteOperation::UpdateOne { update, .. }, Some(i)) => {
            set_fields(&mut documents[i], update);
        }
        (WriteOperation::UpdateOne { filter, update, upsert: true }, None) => {
            let mut document = filter.clone();
            set_fields(&mut document, update);
            documents.push(document);
        }
        (_, None) => {}
    }
}

fn set_fields(document: &mut Record, update: &Record) {
    if let Some(Value::Object(fields)) = update.get("$set") {
        document.extend(fields.clone());
    }
}

/// One statement accepted by [`MemoryQueryClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Relational client that records statements instead of executing them.
#[derive(Debug, Default)]
pub struct MemoryQueryClient {
    statements: Mutex<Vec<Statement>>,
    failures: FailurePlan,
}

impl MemoryQueryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every accepted statement, in execution order.
    pub fn statements(&self) -> Vec<Statement> {
        lock(&self.statements).clone()
    }

    /// Number of `execute` calls, failed ones included.
    pub fn calls(&self) -> usize {
        self.failures.calls.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self, n: usize) {
        self.failures.fail_next(n)
    }

    pub fn fail_call(&self, index: usize) {
        self.failures.fail_call(index)
    }
}

#[async_trait]
impl QueryClient for MemoryQueryClient {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<(), BoxError> {
        self.failures.begin()?;
        lock(&self.statements).push(Statement {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        Ok(())
    }
}
