use std::time::Instant;

use batch_write_sink::init::init_logging_default;
use batch_write_sink::{BatchSink, FileSink, FileSinkConfig, Record};
use serde_json::{json, Value};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging_default()?;

    let workdir = std::env::temp_dir().join("batch-write-sink-load");
    tokio::fs::create_dir_all(&workdir).await?;

    let config = FileSinkConfig::new("file-load").with_batch_size(5_000);
    let mut sink = FileSink::new(config)?;

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        // Rotate across a handful of files to exercise destination switches.
        let filename = format!("trips_{}.csv", i / 25_000);
        sink.write(&workdir, filename, trip(i)).await?;
    }
    sink.flush().await.into_result()?;

    let elapsed = start.elapsed();
    println!(
        "file sink: wrote {} records to {} in {:?} (~{:.0} rec/s)",
        n,
        workdir.display(),
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );
    Ok(())
}

fn trip(i: u64) -> Record {
    match json!({"trip_id": i, "route": format!("{}", 700 + i % 40), "delayed": i % 3 == 0}) {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}
