use serde::Serialize;
use serde_json::{Map, Value};

/// A producer-supplied structured value. Field order is preserved.
pub type Record = Map<String, Value>;

/// How a document sink applies one buffered record.
///
/// Captured per item at `write` time, so records buffered by different
/// calls may carry different directives within the same batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteDirective {
    /// Replace the whole document matching `filter`.
    Replace { filter: Record, upsert: bool },
    /// Merge fields into the document matching `filter`. Always upserts.
    Update { filter: Record },
}

impl WriteDirective {
    /// Replace without upsert: an unmatched filter writes nothing.
    pub fn replace(filter: Record) -> Self {
        WriteDirective::Replace { filter, upsert: false }
    }

    pub fn update(filter: Record) -> Self {
        WriteDirective::Update { filter }
    }

    /// Toggle upsert on a `Replace` directive. `Update` ignores it.
    pub fn with_upsert(self, upsert: bool) -> Self {
        match self {
            WriteDirective::Replace { filter, .. } => WriteDirective::Replace { filter, upsert },
            update @ WriteDirective::Update { .. } => update,
        }
    }

    pub fn filter(&self) -> &Record {
        match self {
            WriteDirective::Replace { filter, .. } | WriteDirective::Update { filter } => filter,
        }
    }

    /// Translate a record into the bulk operation this directive describes.
    pub fn to_operation(&self, record: &Record) -> WriteOperation {
        match self {
            WriteDirective::Replace { filter, upsert } => WriteOperation::ReplaceOne {
                filter: filter.clone(),
                replacement: record.clone(),
                upsert: *upsert,
            },
            WriteDirective::Update { filter } => WriteOperation::UpdateOne {
                filter: filter.clone(),
                update: merge_update(record),
                upsert: true,
            },
        }
    }
}

/// A record buffered together with its directive.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferedItem {
    pub record: Record,
    pub directive: WriteDirective,
}

impl BufferedItem {
    pub fn new(record: Record, directive: WriteDirective) -> Self {
        BufferedItem { record, directive }
    }

    pub fn to_operation(&self) -> WriteOperation {
        self.directive.to_operation(&self.record)
    }
}

/// One entry of a document bulk write.
///
/// Serializes as `{"replaceOne": {...}}` or `{"updateOne": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WriteOperation {
    ReplaceOne {
        filter: Record,
        replacement: Record,
        upsert: bool,
    },
    UpdateOne {
        filter: Record,
        update: Record,
        upsert: bool,
    },
}

impl WriteOperation {
    pub fn filter(&self) -> &Record {
        match self {
            WriteOperation::ReplaceOne { filter, .. } | WriteOperation::UpdateOne { filter, .. } => {
                filter
            }
        }
    }

    pub fn upsert(&self) -> bool {
        match self {
            WriteOperation::ReplaceOne { upsert, .. } | WriteOperation::UpdateOne { upsert, .. } => {
                *upsert
            }
        }
    }
}

// Operator documents (`$set`, `$inc`, ...) pass through; plain field maps
// become a `$set`.
fn merge_update(record: &Record) -> Record {
    if !record.is_empty() && record.keys().all(|k| k.starts_with('$')) {
        return record.clone();
    }
    let mut update = Record::new();
    update.insert("$set".to_string(), Value::Object(record.clone()));
    update
}
