use std::sync::Arc;
use std::time::Instant;

use batch_write_sink::init::{init_logging, LoggingConfig};
use batch_write_sink::memory::{MemoryCollection, MemoryQueryClient};
use batch_write_sink::{
    flush_all, BatchSink, DocumentSink, Record, RelationalSink, SinkConfig, WriteDirective,
};
use serde_json::{json, Value};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(LoggingConfig {
        filter: "warn".to_string(),
        ..LoggingConfig::default()
    })?;

    let collection = Arc::new(MemoryCollection::new("load.vehicles"));
    let client = Arc::new(MemoryQueryClient::new());

    let mut documents = DocumentSink::new(SinkConfig::new("vehicles"), collection.clone())?;
    let mut rows = RelationalSink::new(SinkConfig::new("positions"), client.clone(), "positions")?;

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        let record = position(i);
        let filter = key(i % 1_000);
        documents.write(record.clone(), WriteDirective::update(filter)).await;
        rows.write(record).await;
    }

    let outcomes = flush_all(&mut [&mut documents as &mut dyn BatchSink, &mut rows]).await;
    for outcome in outcomes {
        outcome.into_result()?;
    }

    let elapsed = start.elapsed();
    println!(
        "memory sinks: {} records, {} bulks, {} statements in {:?} (~{:.0} rec/s)",
        n,
        collection.bulks().len(),
        client.statements().len(),
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );
    Ok(())
}

fn key(vehicle: u64) -> Record {
    match json!({"vehicle_id": vehicle}) {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

fn position(i: u64) -> Record {
    match json!({"vehicle_id": i % 1_000, "seq": i, "lat": 38.7 + (i % 100) as f64 / 1e4}) {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}
