//! The collection accessor.
//!
//! [`Accessor`] pairs a [`ConnectionBackend`] with the defaults callers expect
//! and exposes a fixed set of verbs against named collections of the bound
//! database. Payloads are serialized with serde, filters and update documents are
//! passed through untouched.
//!
//! # Example
//!
//! ```ignore
//! use mgo::prelude::*;
//! use bson::doc;
//!
//! let accessor = Accessor::new(MemoryBackend::builder("app").build().await?);
//!
//! accessor.insert_one("items", &doc! { "_id": 1, "name": "a" }).await?;
//! let item: bson::Document = accessor
//!     .find_one("items", doc! { "_id": 1 }, FindOptions::default())
//!     .await?;
//! ```

use std::{collections::HashSet, future::Future, time::Duration};

use bson::Document;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, info, warn};

use crate::{
    backend::ConnectionBackend,
    bulk::WriteModel,
    error::{AccessorError, AccessorResult},
    index::IndexDescriptor,
    options::FindOptions,
    outcome::{BulkWriteOutcome, DeleteOutcome, InsertManyOutcome, InsertOneOutcome, UpdateOutcome},
};

/// Settings applied by the accessor to every verb.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessorConfig {
    /// Deadline for each individual verb. `None` waits for the datastore indefinitely.
    ///
    /// Connection setup and teardown deadlines belong to the backend builder.
    pub operation_timeout: Option<Duration>,
}

/// A handle bound to one database exposing CRUD, bulk-write and index verbs.
///
/// The handle holds no locks and no state beyond its backend, so it can be
/// shared freely (by reference or behind an `Arc`) for the process lifetime.
#[derive(Debug)]
pub struct Accessor<B: ConnectionBackend> {
    backend: B,
    config: AccessorConfig,
}

impl<B: ConnectionBackend> Accessor<B> {
    /// Creates an accessor with no per-operation deadline.
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, AccessorConfig::default())
    }

    pub fn with_config(backend: B, config: AccessorConfig) -> Self {
        Self { backend, config }
    }

    /// The database this accessor is bound to.
    pub fn database_name(&self) -> &str {
        self.backend.database_name()
    }

    pub fn config(&self) -> &AccessorConfig {
        &self.config
    }

    /// Checks that the datastore answers.
    pub async fn ping(&self) -> AccessorResult<()> {
        self.bounded("ping", self.backend.ping()).await
    }

    /// Decodes the first document matching `filter` into `T`.
    ///
    /// # Errors
    ///
    /// [`AccessorError::NotFound`] if nothing matches, [`AccessorError::Decode`]
    /// if the stored document does not fit `T`.
    pub async fn find_one<T>(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> AccessorResult<T>
    where
        T: DeserializeOwned,
    {
        let document = self
            .bounded("find_one", self.backend.find_one(collection, filter, options))
            .await?
            .ok_or_else(|| AccessorError::NotFound { collection: collection.to_string() })?;

        decode(document)
    }

    /// Decodes every document matching `filter` into a `Vec<T>`.
    ///
    /// A filter matching nothing yields an empty vector.
    pub async fn find_many<T>(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> AccessorResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        self.bounded("find_many", self.backend.find(collection, filter, options))
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    pub async fn count_documents(&self, collection: &str, filter: Document) -> AccessorResult<u64> {
        self.bounded("count_documents", self.backend.count_documents(collection, filter))
            .await
    }

    /// Inserts a single document.
    ///
    /// # Errors
    ///
    /// [`AccessorError::Write`] on constraint violations (e.g. a duplicate value
    /// under a unique index) or connectivity loss.
    pub async fn insert_one<T>(&self, collection: &str, document: &T) -> AccessorResult<InsertOneOutcome>
    where
        T: Serialize + ?Sized,
    {
        let document = encode(document)?;

        self.bounded("insert_one", self.backend.insert_one(collection, document))
            .await
    }

    /// Inserts `documents` as an ordered batch.
    ///
    /// The first failing document aborts the remainder and its error is returned.
    /// An empty slice is a no-op.
    pub async fn insert_many<T>(&self, collection: &str, documents: &[T]) -> AccessorResult<InsertManyOutcome>
    where
        T: Serialize,
    {
        if documents.is_empty() {
            return Ok(InsertManyOutcome::default());
        }

        let documents = documents
            .iter()
            .map(encode)
            .collect::<AccessorResult<Vec<_>>>()?;

        self.bounded("insert_many", self.backend.insert_many(collection, documents))
            .await
    }

    /// Applies `update` to the first document matching `filter`.
    ///
    /// Matching nothing is not an error: the outcome reports `matched == 0`.
    pub async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> AccessorResult<UpdateOutcome> {
        self.bounded("update_one", self.backend.update_one(collection, filter, update, false))
            .await
    }

    /// Applies `update` to every document matching `filter`.
    pub async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> AccessorResult<UpdateOutcome> {
        self.bounded("update_many", self.backend.update_many(collection, filter, update, false))
            .await
    }

    /// Replaces the document matching `filter`, or inserts `replacement` if none does.
    pub async fn upsert<T>(
        &self,
        collection: &str,
        filter: Document,
        replacement: &T,
    ) -> AccessorResult<UpdateOutcome>
    where
        T: Serialize + ?Sized,
    {
        let replacement = encode(replacement)?;

        self.bounded("upsert", self.backend.replace_one(collection, filter, replacement, true))
            .await
    }

    /// Deletes the first document matching `filter`. Matching nothing succeeds.
    pub async fn delete_one(&self, collection: &str, filter: Document) -> AccessorResult<DeleteOutcome> {
        self.bounded("delete_one", self.backend.delete_one(collection, filter))
            .await
    }

    /// Deletes every document matching `filter`.
    ///
    /// An empty filter matches, and therefore deletes, every document in the collection.
    pub async fn delete_many(&self, collection: &str, filter: Document) -> AccessorResult<DeleteOutcome> {
        self.bounded("delete_many", self.backend.delete_many(collection, filter))
            .await
    }

    /// Clears the collection, then inserts `document` as its only content.
    ///
    /// This is two independent writes, not a transaction. If the insert fails
    /// after the delete succeeded, the collection is left empty and the insert
    /// error is returned.
    pub async fn replace_collection<T>(&self, collection: &str, document: &T) -> AccessorResult<()>
    where
        T: Serialize + ?Sized,
    {
        let document = encode(document)?;

        self.delete_many(collection, Document::new()).await?;

        if let Err(err) = self
            .bounded("insert_one", self.backend.insert_one(collection, document))
            .await
        {
            warn!(collection, error = %err, "collection cleared but replacement insert failed");
            return Err(err);
        }

        Ok(())
    }

    /// Clears the collection, then inserts `documents`.
    ///
    /// An empty slice leaves the collection untouched; it does not clear it.
    /// Like [`replace_collection`](Self::replace_collection) this is not atomic:
    /// a failing insert leaves the collection empty or partially filled.
    pub async fn replace_collection_all<T>(&self, collection: &str, documents: &[T]) -> AccessorResult<()>
    where
        T: Serialize,
    {
        if documents.is_empty() {
            return Ok(());
        }

        let documents = documents
            .iter()
            .map(encode)
            .collect::<AccessorResult<Vec<_>>>()?;

        self.delete_many(collection, Document::new()).await?;

        if let Err(err) = self
            .bounded("insert_many", self.backend.insert_many(collection, documents))
            .await
        {
            warn!(collection, error = %err, "collection cleared but replacement insert failed");
            return Err(err);
        }

        Ok(())
    }

    /// Submits a batch of heterogeneous writes.
    ///
    /// With `stop_on_first_failure` the batch is ordered: models run strictly in
    /// sequence and the first failure leaves every later model unapplied. Without
    /// it the batch is unordered and every model that can succeed is applied.
    ///
    /// # Errors
    ///
    /// [`AccessorError::BulkWrite`] with the partial outcome and each failed
    /// model's position.
    pub async fn bulk_write(
        &self,
        collection: &str,
        models: Vec<WriteModel>,
        stop_on_first_failure: bool,
    ) -> AccessorResult<BulkWriteOutcome> {
        if models.is_empty() {
            return Ok(BulkWriteOutcome::default());
        }

        self.bounded(
            "bulk_write",
            self.backend.bulk_write(collection, models, stop_on_first_failure),
        )
        .await
    }

    /// Creates a single-field ascending index and returns its name.
    ///
    /// Creating an index identical to an existing one succeeds; the same field
    /// with different options fails.
    pub async fn create_index(&self, index: &IndexDescriptor) -> AccessorResult<String> {
        let name = self
            .bounded("create_index", self.backend.create_index(index))
            .await
            .map_err(|err| match err {
                AccessorError::Index { .. } => err,
                other => AccessorError::index(&index.collection, &index.field, other.to_string()),
            })?;

        info!(
            collection = %index.collection,
            field = %index.field,
            unique = index.unique,
            sparse = index.sparse,
            "index created"
        );

        Ok(name)
    }

    /// Creates each index in turn, stopping at the first failure.
    pub async fn create_indices(&self, indices: &[IndexDescriptor]) -> AccessorResult<Vec<String>> {
        let mut names = Vec::with_capacity(indices.len());

        for index in indices {
            names.push(self.create_index(index).await?);
        }

        Ok(names)
    }

    /// Drops every index on the collection except the mandatory `_id` index.
    pub async fn drop_indexes(&self, collection: &str) -> AccessorResult<()> {
        self.bounded("drop_indexes", self.backend.drop_indexes(collection))
            .await
            .map_err(|err| match err {
                AccessorError::Index { .. } => err,
                other => AccessorError::index(collection, "*", other.to_string()),
            })
    }

    pub async fn list_index_names(&self, collection: &str) -> AccessorResult<Vec<String>> {
        self.bounded("list_index_names", self.backend.list_index_names(collection))
            .await
    }

    /// Names of the collections currently present in the bound database.
    pub async fn list_collection_names(&self) -> AccessorResult<HashSet<String>> {
        Ok(
            self.bounded("list_collection_names", self.backend.list_collection_names())
                .await?
                .into_iter()
                .collect()
        )
    }

    pub async fn drop_collection(&self, collection: &str) -> AccessorResult<()> {
        self.bounded("drop_collection", self.backend.drop_collection(collection))
            .await
    }

    /// Releases the connection. Consuming the handle makes a second call impossible.
    pub async fn close(self) -> AccessorResult<()> {
        let database = self.backend.database_name().to_string();

        self.backend.shutdown().await?;
        debug!(database = %database, "connection closed");

        Ok(())
    }

    async fn bounded<T, F>(&self, operation: &'static str, future: F) -> AccessorResult<T>
    where
        F: Future<Output = AccessorResult<T>>,
    {
        match self.config.operation_timeout {
            Some(timeout) => tokio::time::timeout(timeout, future)
                .await
                .map_err(|_| AccessorError::DeadlineExceeded { operation, timeout })?,
            None => future.await,
        }
    }
}

fn encode<T>(value: &T) -> AccessorResult<Document>
where
    T: Serialize + ?Sized,
{
    bson::serialize_to_document(value).map_err(|err| AccessorError::Encode(err.to_string()))
}

fn decode<T>(document: Document) -> AccessorResult<T>
where
    T: DeserializeOwned,
{
    bson::deserialize_from_document(document).map_err(|err| AccessorError::Decode(err.to_string()))
}
