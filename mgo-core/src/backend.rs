//! Connection backend abstraction.
//!
//! A [`ConnectionBackend`] is the opaque connection capability an
//! [`Accessor`](crate::accessor::Accessor) delegates to. It is bound to one
//! database and speaks in raw BSON documents; typing, defaults and the compound
//! verbs live in the accessor.
//!
//! # Traits
//!
//! - [`ConnectionBackend`]: the request/response surface against a datastore
//! - [`BackendBuilder`]: factory trait that establishes a backend
//!
//! Implementations must be `Send + Sync`: one backend is shared by every caller
//! for the lifetime of the process, and any pooling or mutual exclusion is the
//! backend's own business.

use async_trait::async_trait;
use bson::Document;
use std::fmt::Debug;

use crate::{
    bulk::{self, WriteModel},
    error::AccessorResult,
    index::IndexDescriptor,
    options::FindOptions,
    outcome::{BulkWriteOutcome, DeleteOutcome, InsertManyOutcome, InsertOneOutcome, UpdateOutcome},
};

/// Abstract interface over a live connection to a document datastore, bound to
/// a single database.
///
/// No method retries or reconnects. Collection references are derived per call
/// from the collection name and never cached.
#[async_trait]
pub trait ConnectionBackend: Send + Sync + Debug {
    /// The database every collection name is resolved against.
    fn database_name(&self) -> &str;

    /// Round-trips a no-op command to check the connection.
    async fn ping(&self) -> AccessorResult<()>;

    /// Returns the first document matching `filter`, if any.
    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> AccessorResult<Option<Document>>;

    /// Returns every document matching `filter`.
    ///
    /// Implementations that read through a server-side cursor must release it
    /// before returning, whether the read succeeded or not.
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> AccessorResult<Vec<Document>>;

    async fn count_documents(&self, collection: &str, filter: Document) -> AccessorResult<u64>;

    async fn insert_one(
        &self,
        collection: &str,
        document: Document,
    ) -> AccessorResult<InsertOneOutcome>;

    /// Inserts `documents` as an ordered batch: the first failure aborts the rest.
    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> AccessorResult<InsertManyOutcome>;

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> AccessorResult<UpdateOutcome>;

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> AccessorResult<UpdateOutcome>;

    async fn replace_one(
        &self,
        collection: &str,
        filter: Document,
        replacement: Document,
        upsert: bool,
    ) -> AccessorResult<UpdateOutcome>;

    async fn delete_one(&self, collection: &str, filter: Document) -> AccessorResult<DeleteOutcome>;

    /// Deletes every match. An empty filter matches every document.
    async fn delete_many(&self, collection: &str, filter: Document) -> AccessorResult<DeleteOutcome>;

    /// Applies a batch of writes. `ordered` selects stop-at-first-failure semantics.
    ///
    /// The default applies the models one by one through the single-document verbs.
    async fn bulk_write(
        &self,
        collection: &str,
        models: Vec<WriteModel>,
        ordered: bool,
    ) -> AccessorResult<BulkWriteOutcome> {
        bulk::apply_sequentially(self, collection, models, ordered).await
    }

    /// Creates the index and returns its name. Re-creating an identical index succeeds.
    async fn create_index(&self, index: &IndexDescriptor) -> AccessorResult<String>;

    /// Drops every index on the collection except the primary `_id` index.
    async fn drop_indexes(&self, collection: &str) -> AccessorResult<()>;

    async fn list_index_names(&self, collection: &str) -> AccessorResult<Vec<String>>;

    async fn list_collection_names(&self) -> AccessorResult<Vec<String>>;

    /// Drops the collection with its documents and indexes. A missing collection is not an error.
    async fn drop_collection(&self, collection: &str) -> AccessorResult<()>;

    /// Releases the connection.
    async fn shutdown(self) -> AccessorResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> ConnectionBackend for &B
where
    B: ConnectionBackend,
{
    fn database_name(&self) -> &str {
        (*self).database_name()
    }

    async fn ping(&self) -> AccessorResult<()> {
        (*self).ping().await
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> AccessorResult<Option<Document>> {
        (*self)
            .find_one(collection, filter, options)
            .await
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> AccessorResult<Vec<Document>> {
        (*self)
            .find(collection, filter, options)
            .await
    }

    async fn count_documents(&self, collection: &str, filter: Document) -> AccessorResult<u64> {
        (*self)
            .count_documents(collection, filter)
            .await
    }

    async fn insert_one(
        &self,
        collection: &str,
        document: Document,
    ) -> AccessorResult<InsertOneOutcome> {
        (*self)
            .insert_one(collection, document)
            .await
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> AccessorResult<InsertManyOutcome> {
        (*self)
            .insert_many(collection, documents)
            .await
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> AccessorResult<UpdateOutcome> {
        (*self)
            .update_one(collection, filter, update, upsert)
            .await
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> AccessorResult<UpdateOutcome> {
        (*self)
            .update_many(collection, filter, update, upsert)
            .await
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: Document,
        replacement: Document,
        upsert: bool,
    ) -> AccessorResult<UpdateOutcome> {
        (*self)
            .replace_one(collection, filter, replacement, upsert)
            .await
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> AccessorResult<DeleteOutcome> {
        (*self).delete_one(collection, filter).await
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> AccessorResult<DeleteOutcome> {
        (*self).delete_many(collection, filter).await
    }

    async fn bulk_write(
        &self,
        collection: &str,
        models: Vec<WriteModel>,
        ordered: bool,
    ) -> AccessorResult<BulkWriteOutcome> {
        (*self)
            .bulk_write(collection, models, ordered)
            .await
    }

    async fn create_index(&self, index: &IndexDescriptor) -> AccessorResult<String> {
        (*self).create_index(index).await
    }

    async fn drop_indexes(&self, collection: &str) -> AccessorResult<()> {
        (*self).drop_indexes(collection).await
    }

    async fn list_index_names(&self, collection: &str) -> AccessorResult<Vec<String>> {
        (*self).list_index_names(collection).await
    }

    async fn list_collection_names(&self) -> AccessorResult<Vec<String>> {
        (*self).list_collection_names().await
    }

    async fn drop_collection(&self, collection: &str) -> AccessorResult<()> {
        (*self).drop_collection(collection).await
    }
}

/// Factory trait for establishing backends.
///
/// Builders carry connection settings and perform the initial handshake in
/// [`build`](BackendBuilder::build).
#[async_trait]
pub trait BackendBuilder {
    type Backend: ConnectionBackend;

    async fn build(self) -> AccessorResult<Self::Backend>;
}
