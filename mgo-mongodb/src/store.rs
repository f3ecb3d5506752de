use std::time::Duration;

use async_trait::async_trait;
use bson::{Document, doc};
use futures::TryStreamExt;
use mongodb::{Client, Collection as MongoCollection, options::ClientOptions};
use tracing::{debug, info};

use mgo_core::{
    backend::{BackendBuilder, ConnectionBackend},
    error::{AccessorError, AccessorResult},
    index::IndexDescriptor,
    options::FindOptions,
    outcome::{DeleteOutcome, InsertManyOutcome, InsertOneOutcome, UpdateOutcome},
};

use crate::options::{
    delete_outcome, find_one_options, find_options, index_model, insert_many_outcome, update_outcome,
};

/// Deadline applied to the initial handshake and to teardown unless overridden.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(20);


/// Connection backend over the official MongoDB driver.
///
/// Holds the driver client and the name of the bound database. The client is
/// never handed out; collection handles are derived per call.
#[derive(Debug)]
pub struct MongoDbBackend {
    client: Client,
    database: String,
    disconnect_timeout: Duration,
}

impl MongoDbBackend {
    pub fn builder(uri: &str, database: &str) -> MongoDbBackendBuilder {
        MongoDbBackendBuilder::new(uri, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }

    async fn disconnect(self) -> AccessorResult<()> {
        let MongoDbBackend { client, database, disconnect_timeout } = self;

        tokio::time::timeout(disconnect_timeout, client.shutdown())
            .await
            .map_err(|_| {
                AccessorError::Connection(format!("teardown did not complete within {disconnect_timeout:?}"))
            })?;

        debug!(database = %database, "mongodb client shut down");

        Ok(())
    }
}

#[async_trait]
impl ConnectionBackend for MongoDbBackend {
    fn database_name(&self) -> &str {
        &self.database
    }

    async fn ping(&self) -> AccessorResult<()> {
        self.client
            .database(&self.database)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| AccessorError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn find_one(&self, collection: &str, filter: Document, options: FindOptions) -> AccessorResult<Option<Document>> {
        self.get_collection(collection)
            .find_one(filter)
            .with_options(find_one_options(options))
            .await
            .map_err(|e| AccessorError::Backend(e.to_string()))
    }

    async fn find(&self, collection: &str, filter: Document, options: FindOptions) -> AccessorResult<Vec<Document>> {
        // The cursor is dropped on every return path below, which kills it server-side.
        let cursor = self.get_collection(collection)
            .find(filter)
            .with_options(find_options(options))
            .await
            .map_err(|e| AccessorError::Backend(e.to_string()))?;

        cursor
            .try_collect::<Vec<Document>>()
            .await
            .map_err(|e| AccessorError::Backend(e.to_string()))
    }

    async fn count_documents(&self, collection: &str, filter: Document) -> AccessorResult<u64> {
        self.get_collection(collection)
            .count_documents(filter)
            .await
            .map_err(|e| AccessorError::Backend(e.to_string()))
    }

    async fn insert_one(&self, collection: &str, document: Document) -> AccessorResult<InsertOneOutcome> {
        let result = self.get_collection(collection)
            .insert_one(document)
            .await
            .map_err(|e| AccessorError::write(collection, e.to_string()))?;

        Ok(InsertOneOutcome { inserted_id: result.inserted_id })
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> AccessorResult<InsertManyOutcome> {
        self.get_collection(collection)
            .insert_many(documents)
            .await
            .map(insert_many_outcome)
            .map_err(|e| AccessorError::write(collection, e.to_string()))
    }

    async fn update_one(&self, collection: &str, filter: Document, update: Document, upsert: bool) -> AccessorResult<UpdateOutcome> {
        self.get_collection(collection)
            .update_one(filter, update)
            .upsert(upsert)
            .await
            .map(update_outcome)
            .map_err(|e| AccessorError::write(collection, e.to_string()))
    }

    async fn update_many(&self, collection: &str, filter: Document, update: Document, upsert: bool) -> AccessorResult<UpdateOutcome> {
        self.get_collection(collection)
            .update_many(filter, update)
            .upsert(upsert)
            .await
            .map(update_outcome)
            .map_err(|e| AccessorError::write(collection, e.to_string()))
    }

    async fn replace_one(&self, collection: &str, filter: Document, replacement: Document, upsert: bool) -> AccessorResult<UpdateOutcome> {
        self.get_collection(collection)
            .replace_one(filter, replacement)
            .upsert(upsert)
            .await
            .map(update_outcome)
            .map_err(|e| AccessorError::write(collection, e.to_string()))
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> AccessorResult<DeleteOutcome> {
        self.get_collection(collection)
            .delete_one(filter)
            .await
            .map(delete_outcome)
            .map_err(|e| AccessorError::write(collection, e.to_string()))
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> AccessorResult<DeleteOutcome> {
        self.get_collection(collection)
            .delete_many(filter)
            .await
            .map(delete_outcome)
            .map_err(|e| AccessorError::write(collection, e.to_string()))
    }

    async fn create_index(&self, index: &IndexDescriptor) -> AccessorResult<String> {
        let result = self.get_collection(&index.collection)
            .create_index(index_model(index))
            .await
            .map_err(|e| AccessorError::index(
                &index.collection,
                &index.field,
                format!("collection.create_index {}: {}", index.collection, e),
            ))?;

        Ok(result.index_name)
    }

    async fn drop_indexes(&self, collection: &str) -> AccessorResult<()> {
        self.get_collection(collection)
            .drop_indexes()
            .await
            .map_err(|e| AccessorError::index(collection, "*", e.to_string()))
    }

    async fn list_index_names(&self, collection: &str) -> AccessorResult<Vec<String>> {
        self.get_collection(collection)
            .list_index_names()
            .await
            .map_err(|e| AccessorError::Backend(e.to_string()))
    }

    async fn list_collection_names(&self) -> AccessorResult<Vec<String>> {
        self.client
            .database(&self.database)
            .list_collection_names()
            .await
            .map_err(|e| AccessorError::Backend(e.to_string()))
    }

    async fn drop_collection(&self, collection: &str) -> AccessorResult<()> {
        self.get_collection(collection)
            .drop()
            .await
            .map_err(|e| AccessorError::Backend(e.to_string()))
    }

    async fn shutdown(self) -> AccessorResult<()> {
        self.disconnect().await
    }
}

/// Connection settings for [`MongoDbBackend`].
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
/// use mgo_mongodb::MongoDbBackend;
/// use mgo::backend::BackendBuilder;
///
/// let backend = MongoDbBackend::builder("mongodb://localhost:27017", "app")
///     .connect_timeout(Duration::from_secs(5))
///     .app_name("inventory")
///     .build()
///     .await?;
/// ```
pub struct MongoDbBackendBuilder {
    uri: String,
    database: String,
    connect_timeout: Duration,
    disconnect_timeout: Duration,
    app_name: Option<String>,
}

impl MongoDbBackendBuilder {
    pub fn new(uri: &str, database: &str) -> Self {
        Self {
            uri: uri.to_string(),
            database: database.to_string(),
            connect_timeout: DEFAULT_CONNECTION_TIMEOUT,
            disconnect_timeout: DEFAULT_CONNECTION_TIMEOUT,
            app_name: None,
        }
    }

    /// Deadline for parsing the URI, selecting a server and answering a `ping`.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Deadline for closing the client's connections.
    pub fn disconnect_timeout(mut self, timeout: Duration) -> Self {
        self.disconnect_timeout = timeout;
        self
    }

    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }
}

#[async_trait]
impl BackendBuilder for MongoDbBackendBuilder {
    type Backend = MongoDbBackend;

    /// Parses the URI, creates the client and waits for a `ping` to succeed
    /// within the connect deadline.
    async fn build(self) -> AccessorResult<Self::Backend> {
        let MongoDbBackendBuilder { uri, database, connect_timeout, disconnect_timeout, app_name } = self;

        let handshake = async move {
            let mut options = ClientOptions::parse(&uri)
                .await
                .map_err(|e| AccessorError::Connection(e.to_string()))?;

            if app_name.is_some() {
                options.app_name = app_name;
            }
            options.server_selection_timeout.get_or_insert(connect_timeout);

            let backend = MongoDbBackend {
                client: Client::with_options(options)
                    .map_err(|e| AccessorError::Connection(e.to_string()))?,
                database,
                disconnect_timeout,
            };

            backend.ping().await?;

            Ok::<_, AccessorError>(backend)
        };

        let backend = tokio::time::timeout(connect_timeout, handshake)
            .await
            .map_err(|_| {
                AccessorError::Connection(format!("handshake did not complete within {connect_timeout:?}"))
            })??;

        info!(database = %backend.database, "connected to mongodb");

        Ok(backend)
    }
}
