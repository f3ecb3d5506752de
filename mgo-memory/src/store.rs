//! In-memory backend implementation.
//!
//! Documents are kept per collection in insertion order behind an async-aware
//! read-write lock. Filter, update and index semantics follow the datastore's
//! closely enough to exercise accessor code without a server.

use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bson::{Bson, Document};
use mea::rwlock::RwLock;

use mgo_core::{
    backend::{BackendBuilder, ConnectionBackend},
    error::{AccessorError, AccessorResult},
    index::IndexDescriptor,
    options::{FindOptions, SortDirection},
    outcome::{DeleteOutcome, InsertManyOutcome, InsertOneOutcome, UpdateOutcome},
};

use crate::{
    collection::CollectionState,
    matcher::{NULL, compare_values, lookup, truthy},
    update::{apply_replacement, apply_update, seed_from_filter, validate_replacement},
};

type StoreMap = HashMap<String, CollectionState>;


/// Thread-safe in-memory connection backend bound to one database name.
///
/// `MemoryBackend` is cloneable and uses an `Arc`-wrapped internal state, so
/// clones share the same collections. Queries scan every document of a
/// collection; indexes only enforce uniqueness.
///
/// # Example
///
/// ```ignore
/// use mgo_memory::MemoryBackend;
/// use mgo::backend::ConnectionBackend;
/// use bson::doc;
///
/// let backend = MemoryBackend::new("app");
/// backend.insert_one("users", doc! { "name": "Alice" }).await?;
/// assert_eq!(backend.count_documents("users", doc! {}).await?, 1);
/// ```
#[derive(Clone, Debug)]
pub struct MemoryBackend {
    database: String,
    /// collection name -> documents and indexes
    store: Arc<RwLock<StoreMap>>,
}

impl MemoryBackend {
    /// Creates an empty backend for `database`.
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    pub fn builder(database: &str) -> MemoryBackendBuilder {
        MemoryBackendBuilder::new(database)
    }

    fn namespace(&self, collection: &str) -> String {
        format!("{}.{}", self.database, collection)
    }

    async fn update(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        upsert: bool,
        multi: bool,
    ) -> AccessorResult<UpdateOutcome> {
        let namespace = self.namespace(collection);
        let mut store = self.store.write().await;

        let positions = match store.get(collection) {
            Some(state) => state
                .matching(&filter, !multi)
                .map_err(|err| as_write(collection, err))?,
            None => vec![],
        };

        let mut outcome = UpdateOutcome {
            matched: positions.len() as u64,
            ..Default::default()
        };

        if let Some(state) = store.get_mut(collection) {
            for position in positions {
                let mut updated = state.get(position).clone();
                apply_update(&mut updated, &update, false)
                    .map_err(|message| AccessorError::write(collection, message))?;

                if &updated != state.get(position) {
                    state
                        .replace_at(&namespace, position, updated)
                        .map_err(|message| AccessorError::write(collection, message))?;
                    outcome.modified += 1;
                }
            }
        }

        if outcome.matched == 0 && upsert {
            let mut seeded = seed_from_filter(&filter)
                .map_err(|message| AccessorError::write(collection, message))?;
            apply_update(&mut seeded, &update, true)
                .map_err(|message| AccessorError::write(collection, message))?;

            let id = store
                .entry(collection.to_string())
                .or_default()
                .insert(&namespace, seeded)
                .map_err(|message| AccessorError::write(collection, message))?;

            outcome.upserted_id = Some(id);
        } else if outcome.matched == 0 {
            // Operator syntax is still validated when nothing matches.
            apply_update(&mut Document::new(), &update, false)
                .map_err(|message| AccessorError::write(collection, message))?;
        }

        Ok(outcome)
    }

    async fn delete(&self, collection: &str, filter: Document, multi: bool) -> AccessorResult<DeleteOutcome> {
        let mut store = self.store.write().await;

        let Some(state) = store.get_mut(collection) else {
            return Ok(DeleteOutcome::default());
        };

        let positions = state
            .matching(&filter, !multi)
            .map_err(|err| as_write(collection, err))?;

        Ok(DeleteOutcome { deleted: state.remove(&positions) })
    }

    async fn select(&self, collection: &str, filter: &Document, options: &FindOptions) -> AccessorResult<Vec<Document>> {
        let store = self.store.read().await;

        let Some(state) = store.get(collection) else {
            return Ok(vec![]);
        };

        let mut selected = state
            .matching(filter, false)?
            .into_iter()
            .map(|position| state.get(position))
            .collect::<Vec<_>>();

        if !options.sort.is_empty() {
            selected.sort_by(|a, b| {
                for key in &options.sort {
                    let ordering = compare_values(
                        lookup(a, &key.field).unwrap_or(&NULL),
                        lookup(b, &key.field).unwrap_or(&NULL),
                    );
                    let ordering = match key.direction {
                        SortDirection::Asc => ordering,
                        SortDirection::Desc => ordering.reverse(),
                    };

                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        let limit = match options.limit {
            Some(0) | None => usize::MAX,
            Some(limit) => limit as usize,
        };

        selected
            .into_iter()
            .skip(options.skip.unwrap_or(0) as usize)
            .take(limit)
            .map(|document| match &options.projection {
                Some(projection) => project(document, projection),
                None => Ok(document.clone()),
            })
            .collect()
    }
}

#[async_trait]
impl ConnectionBackend for MemoryBackend {
    fn database_name(&self) -> &str {
        &self.database
    }

    async fn ping(&self) -> AccessorResult<()> {
        Ok(())
    }

    async fn find_one(&self, collection: &str, filter: Document, options: FindOptions) -> AccessorResult<Option<Document>> {
        let options = FindOptions { limit: Some(1), ..options };

        Ok(
            self.select(collection, &filter, &options)
                .await?
                .into_iter()
                .next()
        )
    }

    async fn find(&self, collection: &str, filter: Document, options: FindOptions) -> AccessorResult<Vec<Document>> {
        self.select(collection, &filter, &options).await
    }

    async fn count_documents(&self, collection: &str, filter: Document) -> AccessorResult<u64> {
        let store = self.store.read().await;

        match store.get(collection) {
            Some(state) => Ok(state.matching(&filter, false)?.len() as u64),
            None => Ok(0),
        }
    }

    async fn insert_one(&self, collection: &str, document: Document) -> AccessorResult<InsertOneOutcome> {
        let namespace = self.namespace(collection);
        let mut store = self.store.write().await;

        let inserted_id = store
            .entry(collection.to_string())
            .or_default()
            .insert(&namespace, document)
            .map_err(|message| AccessorError::write(collection, message))?;

        Ok(InsertOneOutcome { inserted_id })
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> AccessorResult<InsertManyOutcome> {
        let namespace = self.namespace(collection);
        let mut store = self.store.write().await;
        let state = store.entry(collection.to_string()).or_default();

        let mut inserted_ids = Vec::with_capacity(documents.len());

        for (position, document) in documents.into_iter().enumerate() {
            let id = state
                .insert(&namespace, document)
                .map_err(|message| AccessorError::write(collection, format!("document #{position}: {message}")))?;

            inserted_ids.push(id);
        }

        Ok(InsertManyOutcome { inserted_ids })
    }

    async fn update_one(&self, collection: &str, filter: Document, update: Document, upsert: bool) -> AccessorResult<UpdateOutcome> {
        self.update(collection, filter, update, upsert, false).await
    }

    async fn update_many(&self, collection: &str, filter: Document, update: Document, upsert: bool) -> AccessorResult<UpdateOutcome> {
        self.update(collection, filter, update, upsert, true).await
    }

    async fn replace_one(&self, collection: &str, filter: Document, replacement: Document, upsert: bool) -> AccessorResult<UpdateOutcome> {
        validate_replacement(&replacement).map_err(|message| AccessorError::write(collection, message))?;

        let namespace = self.namespace(collection);
        let mut store = self.store.write().await;

        let position = match store.get(collection) {
            Some(state) => state
                .matching(&filter, true)
                .map_err(|err| as_write(collection, err))?
                .into_iter()
                .next(),
            None => None,
        };

        if let Some(position) = position {
            let mut outcome = UpdateOutcome { matched: 1, ..Default::default() };

            if let Some(state) = store.get_mut(collection) {
                let replaced = apply_replacement(state.get(position), &replacement)
                    .map_err(|message| AccessorError::write(collection, message))?;

                if &replaced != state.get(position) {
                    state
                        .replace_at(&namespace, position, replaced)
                        .map_err(|message| AccessorError::write(collection, message))?;
                    outcome.modified = 1;
                }
            }

            return Ok(outcome);
        }

        if !upsert {
            return Ok(UpdateOutcome::default());
        }

        let mut inserted = Document::new();
        if !replacement.contains_key("_id") {
            let seed = seed_from_filter(&filter).map_err(|message| AccessorError::write(collection, message))?;
            if let Some(id) = seed.get("_id") {
                inserted.insert("_id", id.clone());
            }
        }
        for (key, value) in replacement {
            inserted.insert(key, value);
        }

        let id = store
            .entry(collection.to_string())
            .or_default()
            .insert(&namespace, inserted)
            .map_err(|message| AccessorError::write(collection, message))?;

        Ok(UpdateOutcome {
            matched: 0,
            modified: 0,
            upserted_id: Some(id),
        })
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> AccessorResult<DeleteOutcome> {
        self.delete(collection, filter, false).await
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> AccessorResult<DeleteOutcome> {
        self.delete(collection, filter, true).await
    }

    async fn create_index(&self, index: &IndexDescriptor) -> AccessorResult<String> {
        let namespace = self.namespace(&index.collection);

        self.store
            .write()
            .await
            .entry(index.collection.clone())
            .or_default()
            .create_index(&namespace, index)
    }

    async fn drop_indexes(&self, collection: &str) -> AccessorResult<()> {
        match self.store.write().await.get_mut(collection) {
            Some(state) => {
                state.drop_indexes();
                Ok(())
            },
            None => Err(AccessorError::index(collection, "*", format!("ns not found: {}", self.namespace(collection)))),
        }
    }

    async fn list_index_names(&self, collection: &str) -> AccessorResult<Vec<String>> {
        match self.store.read().await.get(collection) {
            Some(state) => Ok(state.index_names()),
            None => Err(AccessorError::Backend(format!("ns does not exist: {}", self.namespace(collection)))),
        }
    }

    async fn list_collection_names(&self) -> AccessorResult<Vec<String>> {
        Ok(
            self.store
                .read()
                .await
                .keys()
                .cloned()
                .collect()
        )
    }

    async fn drop_collection(&self, collection: &str) -> AccessorResult<()> {
        self.store.write().await.remove(collection);

        Ok(())
    }
}

fn as_write(collection: &str, err: AccessorError) -> AccessorError {
    match err {
        AccessorError::Backend(message) => AccessorError::write(collection, message),
        other => other,
    }
}

/// Applies an inclusion or exclusion projection to the top-level fields of a document.
fn project(document: &Document, projection: &Document) -> AccessorResult<Document> {
    let keep_id = projection.get("_id").map(truthy).unwrap_or(true);
    let fields = projection
        .iter()
        .filter(|(key, _)| key.as_str() != "_id")
        .map(|(key, flag)| (key.as_str(), truthy(flag)))
        .collect::<Vec<_>>();

    let including = match fields.first() {
        None => false,
        Some((_, first)) => {
            if fields.iter().any(|(_, flag)| flag != first) {
                return Err(AccessorError::Backend(
                    "cannot mix inclusion and exclusion in a projection".to_string(),
                ));
            }
            *first
        },
    };

    Ok(
        document
            .iter()
            .filter(|(key, _)| {
                if key.as_str() == "_id" {
                    return keep_id;
                }

                let listed = fields.iter().any(|(field, _)| *field == key.as_str());
                if including { listed } else { !listed }
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect::<Document>()
    )
}


/// Builder for constructing [`MemoryBackend`] instances.
///
/// # Example
///
/// ```ignore
/// use mgo_memory::MemoryBackend;
/// use mgo::backend::BackendBuilder;
///
/// let backend = MemoryBackend::builder("app").build().await?;
/// ```
pub struct MemoryBackendBuilder {
    database: String,
}

impl MemoryBackendBuilder {
    pub fn new(database: &str) -> Self {
        Self { database: database.to_string() }
    }
}

#[async_trait]
impl BackendBuilder for MemoryBackendBuilder {
    type Backend = MemoryBackend;

    /// Always succeeds with a fresh, empty backend.
    async fn build(self) -> AccessorResult<Self::Backend> {
        Ok(MemoryBackend::new(self.database))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    async fn seeded() -> MemoryBackend {
        let backend = MemoryBackend::new("test");

        backend
            .insert_many(
                "items",
                vec![
                    doc! { "_id": 1, "name": "c", "rank": 2 },
                    doc! { "_id": 2, "name": "a", "rank": 1 },
                    doc! { "_id": 3, "name": "b", "rank": 2 },
                ],
            )
            .await
            .unwrap();

        backend
    }

    #[tokio::test]
    async fn sorts_skips_limits_and_projects() {
        let backend = seeded().await;

        let options = FindOptions::builder()
            .sort("rank", SortDirection::Desc)
            .sort("name", SortDirection::Asc)
            .skip(1)
            .limit(2)
            .projection(doc! { "name": 1, "_id": 0 })
            .build();

        let found = backend.find("items", doc! {}, options).await.unwrap();

        assert_eq!(found, vec![doc! { "name": "c" }, doc! { "name": "a" }]);
    }

    #[tokio::test]
    async fn find_one_honours_sort() {
        let backend = seeded().await;

        let options = FindOptions::builder().sort("name", SortDirection::Asc).build();
        let found = backend.find_one("items", doc! {}, options).await.unwrap();

        assert_eq!(found, Some(doc! { "_id": 2, "name": "a", "rank": 1 }));
    }

    #[tokio::test]
    async fn exclusion_projection_and_mixed_projection() {
        let backend = seeded().await;

        let options = FindOptions::builder().projection(doc! { "rank": 0 }).build();
        let found = backend.find("items", doc! { "_id": 1 }, options).await.unwrap();
        assert_eq!(found, vec![doc! { "_id": 1, "name": "c" }]);

        let options = FindOptions::builder().projection(doc! { "rank": 0, "name": 1 }).build();
        assert!(backend.find("items", doc! {}, options).await.is_err());
    }

    #[tokio::test]
    async fn update_counts_matched_and_modified() {
        let backend = seeded().await;

        let outcome = backend
            .update_many("items", doc! { "rank": 2 }, doc! { "$set": { "name": "b" } }, false)
            .await
            .unwrap();

        assert_eq!(outcome, UpdateOutcome { matched: 2, modified: 1, upserted_id: None });
    }

    #[tokio::test]
    async fn update_upsert_seeds_from_filter() {
        let backend = seeded().await;

        let outcome = backend
            .update_one("items", doc! { "_id": 9 }, doc! { "$set": { "name": "z" }, "$setOnInsert": { "rank": 0 } }, true)
            .await
            .unwrap();

        assert_eq!(outcome.upserted_id, Some(Bson::Int32(9)));
        assert_eq!(
            backend.find_one("items", doc! { "_id": 9 }, FindOptions::default()).await.unwrap(),
            Some(doc! { "_id": 9, "name": "z", "rank": 0 }),
        );
    }

    #[tokio::test]
    async fn invalid_update_is_a_write_error_even_without_matches() {
        let backend = seeded().await;

        let err = backend
            .update_one("items", doc! { "_id": 42 }, doc! { "name": "plain" }, false)
            .await
            .unwrap_err();

        assert!(err.is_write());
    }

    #[tokio::test]
    async fn overflowing_increment_is_a_write_error() {
        let backend = MemoryBackend::new("test");
        backend.insert_one("counters", doc! { "_id": 1, "n": i64::MAX }).await.unwrap();

        let err = backend
            .update_one("counters", doc! { "_id": 1 }, doc! { "$inc": { "n": 1_i64 } }, false)
            .await
            .unwrap_err();

        assert!(err.is_write());
        assert_eq!(
            backend.find_one("counters", doc! {}, FindOptions::default()).await.unwrap(),
            Some(doc! { "_id": 1, "n": i64::MAX }),
        );
    }

    #[tokio::test]
    async fn replace_upsert_takes_id_from_filter() {
        let backend = seeded().await;

        let outcome = backend
            .replace_one("items", doc! { "_id": 5 }, doc! { "name": "e" }, true)
            .await
            .unwrap();

        assert_eq!(outcome.upserted_id, Some(Bson::Int32(5)));
        assert_eq!(backend.count_documents("items", doc! {}).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn ordered_insert_many_stops_at_duplicate() {
        let backend = seeded().await;

        let err = backend
            .insert_many("items", vec![doc! { "_id": 4 }, doc! { "_id": 1 }, doc! { "_id": 5 }])
            .await
            .unwrap_err();

        assert!(err.is_write());
        assert_eq!(backend.count_documents("items", doc! { "_id": 5 }).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn index_listing_and_missing_namespaces() {
        let backend = seeded().await;

        assert_eq!(backend.list_index_names("items").await.unwrap(), vec!["_id_".to_string()]);
        assert!(backend.list_index_names("nothing").await.is_err());
        assert!(matches!(
            backend.drop_indexes("nothing").await,
            Err(AccessorError::Index { .. }),
        ));

        backend.drop_collection("items").await.unwrap();
        backend.drop_collection("items").await.unwrap();
        assert!(backend.list_collection_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clones_share_state() {
        let backend = seeded().await;
        let clone = backend.clone();

        clone.delete_one("items", doc! { "_id": 1 }).await.unwrap();

        assert_eq!(backend.count_documents("items", doc! {}).await.unwrap(), 2);
    }
}
