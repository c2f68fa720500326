mod common;

use std::sync::Arc;

use batch_write_sink::memory::{MemoryCollection, MemoryQueryClient};
use batch_write_sink::{
    flush_all, BatchSink, DocumentSink, FileSink, FileSinkConfig, Record, RelationalSink,
    SinkConfig, SinkError, WriteDirective,
};
use common::{capture, rec};
use serde_json::json;
use tempfile::TempDir;

fn vehicle(i: usize) -> Record {
    rec(json!({"vehicle_id": format!("V{i}"), "line": "701", "seq": i}))
}

fn document_sink(batch_size: usize) -> (DocumentSink<Arc<MemoryCollection>>, Arc<MemoryCollection>) {
    let collection = Arc::new(MemoryCollection::new("transit.vehicles"));
    let config = SinkConfig::new("vehicles").with_batch_size(batch_size);
    (DocumentSink::new(config, collection.clone()).unwrap(), collection)
}

fn relational_sink(batch_size: usize) -> (RelationalSink<Arc<MemoryQueryClient>>, Arc<MemoryQueryClient>) {
    let client = Arc::new(MemoryQueryClient::new());
    let config = SinkConfig::new("positions").with_batch_size(batch_size);
    (RelationalSink::new(config, client.clone(), "positions").unwrap(), client)
}

#[tokio::test]
async fn bulk_carries_per_item_upsert_defaults() {
    let (mut sink, collection) = document_sink(3000);

    sink.write(vehicle(1), WriteDirective::update(rec(json!({"vehicle_id": "V1"}))))
        .await;
    sink.write(vehicle(2), WriteDirective::replace(rec(json!({"vehicle_id": "V2"}))))
        .await;
    assert!(sink.flush().await.is_flushed());

    let bulks = collection.bulks();
    assert_eq!(bulks.len(), 1);
    let submitted = serde_json::to_value(&bulks[0]).unwrap();
    assert_eq!(submitted[0]["updateOne"]["upsert"], json!(true));
    assert_eq!(submitted[0]["updateOne"]["update"]["$set"]["seq"], json!(1));
    assert_eq!(submitted[1]["replaceOne"]["upsert"], json!(false));
    assert_eq!(submitted[1]["replaceOne"]["replacement"]["seq"], json!(2));

    // The unmatched replace without upsert wrote nothing.
    let documents = collection.documents();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0]["vehicle_id"], json!("V1"));
}

#[tokio::test]
async fn document_writes_below_threshold_wait_for_flush() {
    let (mut sink, collection) = document_sink(10);
    let directive = WriteDirective::update(rec(json!({"line": "701"})));

    sink.write_all((0..10).map(vehicle), directive).await;
    assert!(collection.bulks().is_empty());

    assert_eq!(sink.flush().await.flushed(), Some(10));
    assert_eq!(sink.pending(), 0);
    assert_eq!(collection.bulks()[0].len(), 10);
}

#[tokio::test]
async fn bulk_failure_is_logged_and_retained() {
    let (logs, _guard) = capture();
    let (mut sink, collection) = document_sink(3000);
    sink.write_each((0..4).map(|i| {
        let filter = rec(json!({"vehicle_id": format!("V{i}")}));
        (vehicle(i), WriteDirective::replace(filter).with_upsert(true))
    }))
    .await;

    collection.fail_next(1);
    let outcome = sink.flush().await;
    assert!(matches!(outcome.error(), Some(SinkError::Driver(_))));
    assert_eq!(sink.pending(), 4);

    let errors = logs.with_message("error @ flush()");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].level, tracing::Level::ERROR);
    assert_eq!(errors[0].fields["instance"], "vehicles");
    assert!(errors[0].fields["error"].contains("injected failure"));

    assert_eq!(sink.flush().await.flushed(), Some(4));
    assert_eq!(collection.documents().len(), 4);
}

#[tokio::test]
async fn failed_automatic_flush_does_not_fail_the_write() {
    let (logs, _guard) = capture();
    let (mut sink, client) = relational_sink(2);

    sink.write_all((0..2).map(vehicle)).await;
    client.fail_next(1);
    sink.write(vehicle(2)).await;

    assert_eq!(sink.pending(), 3);
    assert_eq!(logs.with_message("error @ flush()").len(), 1);

    assert_eq!(sink.flush().await.flushed(), Some(3));
    assert_eq!(client.statements().len(), 2);
}

#[tokio::test]
async fn seven_thousand_rows_take_three_statements() {
    let (mut sink, client) = relational_sink(3000);

    sink.write_all((0..7000).map(vehicle)).await;
    assert_eq!(sink.flush().await.flushed(), Some(7000));

    let statements = client.statements();
    let rows: Vec<usize> = statements.iter().map(|s| s.params.len() / 3).collect();
    assert_eq!(rows, vec![3000, 3000, 1000]);
    assert!(statements
        .iter()
        .all(|s| s.sql.starts_with("INSERT INTO positions (vehicle_id,line,seq) VALUES ($1,$2,$3),")
            && s.sql.ends_with(" ON CONFLICT DO NOTHING")));
    assert_eq!(statements[2].params[0], json!("V6000"));
}

#[tokio::test]
async fn automatic_flush_count_is_at_least_total_over_batch() {
    let (logs, _guard) = capture();
    let (mut sink, client) = relational_sink(4);

    for i in 0..18 {
        sink.write(vehicle(i)).await;
    }

    assert!(logs.with_message("flush").len() >= 18 / 4);
    assert_eq!(client.statements().len(), 18 / 4);
    assert_eq!(sink.pending(), 18 % 4);
}

#[tokio::test]
async fn shutdown_drains_every_sink() {
    let dir = TempDir::new().unwrap();
    let (mut documents, collection) = document_sink(3000);
    let (mut rows, client) = relational_sink(3000);
    let mut file = FileSink::new(FileSinkConfig::new("vehicles-file")).unwrap();

    documents
        .write(vehicle(1), WriteDirective::update(rec(json!({"vehicle_id": "V1"}))))
        .await;
    rows.write(vehicle(1)).await;
    file.write(dir.path(), "vehicles.csv", vehicle(1)).await.unwrap();

    client.fail_next(1);
    let outcomes = flush_all(&mut [&mut documents as &mut dyn BatchSink, &mut rows, &mut file]).await;

    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0].flushed(), Some(1));
    assert!(!outcomes[1].is_flushed());
    assert_eq!(outcomes[2].flushed(), Some(1));

    assert_eq!(collection.bulks().len(), 1);
    assert_eq!(rows.pending(), 1);
    assert!(dir.path().join("vehicles.csv").exists());
}

#[tokio::test]
async fn database_flushes_report_instance_and_destination() {
    let (logs, _guard) = capture();
    let (mut documents, _collection) = document_sink(3000);
    let (mut rows, _client) = relational_sink(3000);

    documents
        .write_all((0..2).map(vehicle), WriteDirective::update(rec(json!({"line": "701"}))))
        .await;
    rows.write_all((0..5).map(vehicle)).await;
    assert!(documents.flush().await.is_flushed());
    assert!(rows.flush().await.is_flushed());

    let flushes = logs.with_message("flush");
    assert_eq!(flushes.len(), 2);
    assert!(flushes.iter().all(|e| e.level == tracing::Level::INFO));

    assert_eq!(flushes[0].fields["instance"], "vehicles");
    assert_eq!(flushes[0].fields["length"], "2");
    assert_eq!(flushes[0].fields["destination"], "transit.vehicles");

    assert_eq!(flushes[1].fields["instance"], "positions");
    assert_eq!(flushes[1].fields["length"], "5");
    assert_eq!(flushes[1].fields["destination"], "positions");
}
