use async_trait::async_trait;
use bson::{doc, Document};
use mongodb::options::{ReplaceOneModel, UpdateOneModel, WriteModel};
use mongodb::{Client, Namespace};
use tracing::info;

use crate::error::BoxError;
use crate::record::{Record, WriteOperation};
use crate::sink::DocumentCollection;

/// [`DocumentCollection`] backed by the MongoDB driver.
///
/// Each flush becomes one client-level bulk write (MongoDB 8.0+) whose
/// models all target the bound namespace.
#[derive(Clone)]
pub struct MongoCollection {
    client: Client,
    namespace: Namespace,
}

impl MongoCollection {
    /// Bind to `database.collection` on an existing client.
    pub fn new(client: Client, database: &str, collection: &str) -> Self {
        let namespace = client
            .database(database)
            .collection::<Document>(collection)
            .namespace();
        MongoCollection { client, namespace }
    }

    /// Connect, ping, and bind to `database.collection`.
    pub async fn connect(uri: &str, database: &str, collection: &str) -> Result<Self, BoxError> {
        info!(uri = %uri, "connecting to MongoDB");
        let client = Client::with_uri_str(uri).await?;
        client.database(database).run_command(doc! { "ping": 1 }).await?;
        Ok(Self::new(client, database, collection))
    }

    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl DocumentCollection for MongoCollection {
    fn namespace(&self) -> String {
        format!("{}.{}", self.namespace.db, self.namespace.coll)
    }

    async fn bulk_write(&self, operations: &[WriteOperation]) -> Result<(), BoxError> {
        let models = operations
            .iter()
            .map(|op| to_model(&self.namespace, op))
            .collect::<Result<Vec<WriteModel>, BoxError>>()?;
        self.client.bulk_write(models).await?;
        Ok(())
    }
}

fn to_model(namespace: &Namespace, operation: &WriteOperation) -> Result<WriteModel, BoxError> {
    let model = match operation {
        WriteOperation::ReplaceOne {
            filter,
            replacement,
            upsert,
        } => WriteModel::ReplaceOne(
            ReplaceOneModel::builder()
                .namespace(namespace.clone())
                .filter(to_document(filter)?)
                .replacement(to_document(replacement)?)
                .upsert(*upsert)
                .build(),
        ),
        WriteOperation::UpdateOne {
            filter,
            update,
            upsert,
        } => WriteModel::UpdateOne(
            UpdateOneModel::builder()
                .namespace(namespace.clone())
                .filter(to_document(filter)?)
                .update(to_document(update)?)
                .upsert(*upsert)
                .build(),
        ),
    };
    Ok(model)
}

fn to_document(record: &Record) -> Result<Document, BoxError> {
    Ok(bson::to_document(record)?)
}
