use async_trait::async_trait;
use batch_write_sink::error::BoxError;
use batch_write_sink::init::init_logging_default;
use batch_write_sink::{BatchSink, DocumentCollection, DocumentSink, Record, SinkConfig, WriteDirective, WriteOperation};
use serde_json::{json, Value};

/// Example of integrating a completely custom backend by implementing
/// the `DocumentCollection` trait directly. Imagine this talks to some
/// proprietary store for which this crate does not provide an adapter.
struct MyCustomStore;

#[async_trait]
impl DocumentCollection for MyCustomStore {
    fn namespace(&self) -> String {
        "my-custom-store.events".to_string()
    }

    async fn bulk_write(&self, operations: &[WriteOperation]) -> Result<(), BoxError> {
        // Here you would call your own client library for the target store.
        // For the sake of example we just print the bulk.
        println!("[my-custom-store] {}", serde_json::to_string(operations)?);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging_default()?;

    let mut sink = DocumentSink::new(SinkConfig::new("custom").with_batch_size(2), MyCustomStore)?;

    for i in 0..5 {
        let filter = object(json!({"_id": i}));
        sink.write(object(json!({"_id": i, "seen": true})), WriteDirective::replace(filter).with_upsert(true))
            .await;
    }
    sink.flush().await.into_result()?;
    Ok(())
}

fn object(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}
