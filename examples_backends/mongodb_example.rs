use batch_write_sink::init::init_logging_default;
use batch_write_sink::mongo::MongoCollection;
use batch_write_sink::{BatchSink, DocumentSink, Record, SinkConfig, WriteDirective};
use serde_json::{json, Value};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_logging_default()?;

    // Client-level bulk writes need MongoDB 8.0 or newer.
    let uri = std::env::var("BATCH_SINK_MONGODB_URI")
        .unwrap_or_else(|_| "mongodb://127.0.0.1:27017".to_string());

    let collection = MongoCollection::connect(&uri, "transit", "vehicles").await?;
    let mut sink = DocumentSink::new(SinkConfig::new("vehicles").with_batch_size(500), collection)?;

    for i in 0..2_000u32 {
        let filter = object(json!({"_id": i % 200}));
        sink.write(object(json!({"last_seq": i})), WriteDirective::update(filter))
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
