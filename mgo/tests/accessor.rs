use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bson::{Bson, Document, doc};
use rstest::rstest;
use serde::{Deserialize, Serialize};

use mgo::{memory::MemoryBackend, prelude::*};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Item {
    #[serde(rename = "_id")]
    id: i32,
    name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Priced {
    #[serde(rename = "_id")]
    id: i32,
    price: f64,
}

fn item(id: i32, name: &str) -> Item {
    Item { id, name: name.to_string() }
}

async fn accessor() -> Accessor<MemoryBackend> {
    Accessor::new(MemoryBackend::builder("app").build().await.unwrap())
}

async fn all(accessor: &Accessor<MemoryBackend>, collection: &str) -> Vec<Item> {
    accessor
        .find_many(
            collection,
            doc! {},
            FindOptions::builder().sort("_id", SortDirection::Asc).build(),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn insert_find_delete_lifecycle() {
    let accessor = accessor().await;

    accessor.insert_one("items", &item(1, "a")).await.unwrap();

    let found: Item = accessor
        .find_one("items", doc! { "_id": 1 }, FindOptions::default())
        .await
        .unwrap();
    assert_eq!(found, item(1, "a"));

    let raw: Document = accessor
        .find_one("items", doc! { "_id": 1 }, FindOptions::default())
        .await
        .unwrap();
    assert_eq!(raw, doc! { "_id": 1, "name": "a" });

    let outcome = accessor.delete_one("items", doc! { "_id": 1 }).await.unwrap();
    assert_eq!(outcome.deleted, 1);

    let err = accessor
        .find_one::<Item>("items", doc! { "_id": 1 }, FindOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AccessorError::NotFound { ref collection } if collection == "items"));
}

#[tokio::test]
async fn decode_mismatch_is_reported() {
    let accessor = accessor().await;
    accessor.insert_one("items", &item(1, "a")).await.unwrap();

    let err = accessor
        .find_one::<Priced>("items", doc! { "_id": 1 }, FindOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AccessorError::Decode(_)));

    let err = accessor
        .find_many::<Priced>("items", doc! {}, FindOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AccessorError::Decode(_)));
}

#[rstest]
#[case(doc! {})]
#[case(doc! { "name": "b" })]
#[case(doc! { "_id": { "$gte": 2 } })]
#[case(doc! { "name": { "$in": ["a", "c"] } })]
#[case(doc! { "missing": "nothing" })]
#[tokio::test]
async fn delete_many_then_find_many_is_empty(#[case] filter: Document) {
    let accessor = accessor().await;
    accessor
        .insert_many("items", &[item(1, "a"), item(2, "b"), item(3, "c")])
        .await
        .unwrap();

    accessor.delete_many("items", filter.clone()).await.unwrap();

    let remaining: Vec<Item> = accessor
        .find_many("items", filter, FindOptions::default())
        .await
        .unwrap();
    assert!(remaining.is_empty());
}

#[tokio::test]
async fn delete_with_no_match_succeeds() {
    let accessor = accessor().await;

    assert_eq!(accessor.delete_one("items", doc! { "_id": 1 }).await.unwrap().deleted, 0);
    assert_eq!(accessor.delete_many("items", doc! { "_id": 1 }).await.unwrap().deleted, 0);
}

#[tokio::test]
async fn replace_collection_leaves_exactly_one_document() {
    let accessor = accessor().await;
    accessor
        .insert_many("items", &[item(1, "a"), item(2, "b")])
        .await
        .unwrap();

    accessor.replace_collection("items", &item(9, "z")).await.unwrap();

    assert_eq!(all(&accessor, "items").await, vec![item(9, "z")]);
    assert!(accessor.list_collection_names().await.unwrap().contains("items"));

    // Any prior state, including a collection that never existed.
    accessor.replace_collection("fresh", &item(1, "a")).await.unwrap();
    assert_eq!(all(&accessor, "fresh").await, vec![item(1, "a")]);
}

#[tokio::test]
async fn replace_collection_all_swaps_contents() {
    let accessor = accessor().await;
    accessor.insert_one("items", &item(1, "a")).await.unwrap();

    accessor
        .replace_collection_all("items", &[item(1, "x"), item(2, "y")])
        .await
        .unwrap();

    assert_eq!(all(&accessor, "items").await, vec![item(1, "x"), item(2, "y")]);
}

#[tokio::test]
async fn replace_collection_all_with_empty_input_is_a_noop() {
    let accessor = accessor().await;
    accessor
        .insert_many("items", &[item(1, "a"), item(2, "b")])
        .await
        .unwrap();

    accessor.replace_collection_all::<Item>("items", &[]).await.unwrap();

    assert_eq!(all(&accessor, "items").await, vec![item(1, "a"), item(2, "b")]);
}

#[tokio::test]
async fn failed_replacement_keeps_only_the_inserted_prefix() {
    let accessor = accessor().await;
    accessor.insert_one("items", &item(1, "a")).await.unwrap();
    accessor
        .create_index(&IndexDescriptor::new("items", "name").unique(true))
        .await
        .unwrap();

    let err = accessor
        .replace_collection_all("items", &[item(2, "dup"), item(3, "dup")])
        .await
        .unwrap_err();
    assert!(err.is_write());

    // Delete ran, the second insert failed: only the prefix survives.
    assert_eq!(all(&accessor, "items").await, vec![item(2, "dup")]);
}

/// Wraps a memory backend and rejects every single-document insert.
#[derive(Debug)]
struct RejectingInserts(MemoryBackend);

#[async_trait]
impl ConnectionBackend for RejectingInserts {
    fn database_name(&self) -> &str {
        self.0.database_name()
    }

    async fn ping(&self) -> AccessorResult<()> {
        self.0.ping().await
    }

    async fn find_one(&self, collection: &str, filter: Document, options: FindOptions) -> AccessorResult<Option<Document>> {
        self.0.find_one(collection, filter, options).await
    }

    async fn find(&self, collection: &str, filter: Document, options: FindOptions) -> AccessorResult<Vec<Document>> {
        self.0.find(collection, filter, options).await
    }

    async fn count_documents(&self, collection: &str, filter: Document) -> AccessorResult<u64> {
        self.0.count_documents(collection, filter).await
    }

    async fn insert_one(&self, collection: &str, _: Document) -> AccessorResult<InsertOneOutcome> {
        Err(AccessorError::write(collection, "connection reset"))
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> AccessorResult<InsertManyOutcome> {
        self.0.insert_many(collection, documents).await
    }

    async fn update_one(&self, collection: &str, filter: Document, update: Document, upsert: bool) -> AccessorResult<UpdateOutcome> {
        self.0.update_one(collection, filter, update, upsert).await
    }

    async fn update_many(&self, collection: &str, filter: Document, update: Document, upsert: bool) -> AccessorResult<UpdateOutcome> {
        self.0.update_many(collection, filter, update, upsert).await
    }

    async fn replace_one(&self, collection: &str, filter: Document, replacement: Document, upsert: bool) -> AccessorResult<UpdateOutcome> {
        self.0.replace_one(collection, filter, replacement, upsert).await
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> AccessorResult<DeleteOutcome> {
        self.0.delete_one(collection, filter).await
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> AccessorResult<DeleteOutcome> {
        self.0.delete_many(collection, filter).await
    }

    async fn create_index(&self, index: &IndexDescriptor) -> AccessorResult<String> {
        self.0.create_index(index).await
    }

    async fn drop_indexes(&self, collection: &str) -> AccessorResult<()> {
        self.0.drop_indexes(collection).await
    }

    async fn list_index_names(&self, collection: &str) -> AccessorResult<Vec<String>> {
        self.0.list_index_names(collection).await
    }

    async fn list_collection_names(&self) -> AccessorResult<Vec<String>> {
        self.0.list_collection_names().await
    }

    async fn drop_collection(&self, collection: &str) -> AccessorResult<()> {
        self.0.drop_collection(collection).await
    }
}

#[tokio::test]
async fn failed_single_replacement_leaves_collection_empty() {
    let backend = MemoryBackend::new("app");
    Accessor::new(&backend)
        .insert_many("items", &[item(1, "a"), item(2, "b")])
        .await
        .unwrap();

    let accessor = Accessor::new(RejectingInserts(backend.clone()));
    let err = accessor.replace_collection("items", &item(3, "c")).await.unwrap_err();

    assert!(matches!(err, AccessorError::Write { ref message, .. } if message == "connection reset"));
    assert!(all(&Accessor::new(backend), "items").await.is_empty());
}

#[tokio::test]
async fn update_without_match_reports_zero_counts() {
    let accessor = accessor().await;
    accessor.insert_one("items", &item(1, "a")).await.unwrap();

    let outcome = accessor
        .update_many("items", doc! { "name": "nobody" }, doc! { "$set": { "name": "b" } })
        .await
        .unwrap();

    assert_eq!(outcome, UpdateOutcome { matched: 0, modified: 0, upserted_id: None });
    assert!(outcome.is_noop());

    let outcome = accessor
        .update_one("empty", doc! {}, doc! { "$set": { "name": "b" } })
        .await
        .unwrap();
    assert!(outcome.is_noop());
}

#[tokio::test]
async fn update_distinguishes_matched_from_modified() {
    let accessor = accessor().await;
    accessor
        .insert_many("items", &[item(1, "a"), item(2, "b"), item(3, "b")])
        .await
        .unwrap();

    let outcome = accessor
        .update_many("items", doc! {}, doc! { "$set": { "name": "b" } })
        .await
        .unwrap();
    assert_eq!((outcome.matched, outcome.modified), (3, 1));

    let outcome = accessor
        .update_one("items", doc! { "_id": 1 }, doc! { "$set": { "name": "c" } })
        .await
        .unwrap();
    assert_eq!((outcome.matched, outcome.modified), (1, 1));
}

#[tokio::test]
async fn upsert_inserts_then_replaces() {
    let accessor = accessor().await;

    let inserted = accessor
        .upsert("items", doc! { "_id": 1 }, &item(1, "a"))
        .await
        .unwrap();
    assert_eq!(inserted.upserted_id, Some(Bson::Int32(1)));
    assert_eq!(inserted.matched, 0);

    let replaced = accessor
        .upsert("items", doc! { "_id": 1 }, &item(1, "b"))
        .await
        .unwrap();
    assert_eq!((replaced.matched, replaced.modified, replaced.upserted_id), (1, 1, None));

    assert_eq!(all(&accessor, "items").await, vec![item(1, "b")]);
}

#[tokio::test]
async fn duplicate_keys_are_write_errors() {
    let accessor = accessor().await;
    accessor.insert_one("items", &item(1, "a")).await.unwrap();

    let err = accessor.insert_one("items", &item(1, "b")).await.unwrap_err();
    match err {
        AccessorError::Write { collection, message } => {
            assert_eq!(collection, "items");
            assert!(message.contains("E11000"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn index_creation_is_idempotent_and_detects_conflicts() {
    let accessor = accessor().await;
    let unique = IndexDescriptor::new("users", "email").unique(true);

    assert_eq!(accessor.create_index(&unique).await.unwrap(), "email_1");
    assert_eq!(accessor.create_index(&unique).await.unwrap(), "email_1");

    let err = accessor
        .create_index(&unique.clone().unique(false))
        .await
        .unwrap_err();
    match err {
        AccessorError::Index { collection, field, .. } => {
            assert_eq!(collection, "users");
            assert_eq!(field, "email");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn create_indices_and_drop_indexes() {
    let accessor = accessor().await;

    let names = accessor
        .create_indices(&[
            IndexDescriptor::new("users", "email").unique(true),
            IndexDescriptor::new("users", "referrer").sparse(true),
            IndexDescriptor::new("orders", "user_id"),
        ])
        .await
        .unwrap();
    assert_eq!(names, vec!["email_1", "referrer_1", "user_id_1"]);

    accessor.drop_indexes("users").await.unwrap();
    assert_eq!(accessor.list_index_names("users").await.unwrap(), vec!["_id_".to_string()]);
    assert_eq!(accessor.list_index_names("orders").await.unwrap().len(), 2);
}

#[tokio::test]
async fn sparse_unique_index_allows_missing_fields() {
    let accessor = accessor().await;
    accessor
        .create_index(&IndexDescriptor::new("users", "email").unique(true).sparse(true))
        .await
        .unwrap();

    accessor.insert_one("users", &doc! { "_id": 1 }).await.unwrap();
    accessor.insert_one("users", &doc! { "_id": 2 }).await.unwrap();
    accessor.insert_one("users", &doc! { "_id": 3, "email": "a@x" }).await.unwrap();

    let err = accessor
        .insert_one("users", &doc! { "_id": 4, "email": "a@x" })
        .await
        .unwrap_err();
    assert!(err.is_write());
}

fn mixed_batch() -> Vec<WriteModel> {
    vec![
        WriteModel::insert_one(doc! { "_id": 1, "name": "a" }),
        WriteModel::insert_one(doc! { "_id": 1, "name": "dup" }),
        WriteModel::insert_one(doc! { "_id": 2, "name": "b" }),
        WriteModel::update_one(doc! { "_id": 1 }, doc! { "$set": { "name": "c" } }),
        WriteModel::delete_many(doc! { "name": "nothing" }),
    ]
}

#[tokio::test]
async fn ordered_bulk_write_stops_at_first_failure() {
    let accessor = accessor().await;

    let err = accessor.bulk_write("items", mixed_batch(), true).await.unwrap_err();

    match err {
        AccessorError::BulkWrite(failure) => {
            assert_eq!(failure.failures.len(), 1);
            assert_eq!(failure.failures[0].0, 1);
            assert_eq!(failure.outcome.inserted, 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(all(&accessor, "items").await, vec![item(1, "a")]);
}

#[tokio::test]
async fn unordered_bulk_write_applies_everything_else() {
    let accessor = accessor().await;

    let err = accessor.bulk_write("items", mixed_batch(), false).await.unwrap_err();

    match err {
        AccessorError::BulkWrite(failure) => {
            assert_eq!(failure.failures.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![1]);
            assert_eq!(failure.outcome.inserted, 2);
            assert_eq!(failure.outcome.matched, 1);
            assert_eq!(failure.outcome.modified, 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(all(&accessor, "items").await, vec![item(1, "c"), item(2, "b")]);
}

#[tokio::test]
async fn successful_bulk_write_reports_counts() {
    let accessor = accessor().await;

    let outcome = accessor
        .bulk_write(
            "items",
            vec![
                WriteModel::insert_one(doc! { "_id": 1, "name": "a" }),
                WriteModel::insert_one(doc! { "_id": 2, "name": "a" }),
                WriteModel::update_many(doc! { "name": "a" }, doc! { "$set": { "name": "b" } }),
                WriteModel::replace_one(doc! { "_id": 3 }, doc! { "name": "c" }, true),
                WriteModel::delete_one(doc! { "_id": 2 }),
            ],
            true,
        )
        .await
        .unwrap();

    assert_eq!(
        outcome,
        BulkWriteOutcome { inserted: 2, matched: 2, modified: 2, deleted: 1, upserted: 1 },
    );
    assert_eq!(all(&accessor, "items").await, vec![item(1, "b"), item(3, "c")]);
}

#[tokio::test]
async fn lists_collections_as_a_set() {
    let accessor = accessor().await;
    accessor.insert_one("a", &item(1, "a")).await.unwrap();
    accessor.insert_one("b", &item(1, "a")).await.unwrap();
    accessor.create_index(&IndexDescriptor::new("c", "name")).await.unwrap();

    let names = accessor.list_collection_names().await.unwrap();
    assert_eq!(names.len(), 3);
    assert!(["a", "b", "c"].iter().all(|name| names.contains(*name)));

    accessor.drop_collection("b").await.unwrap();
    assert!(!accessor.list_collection_names().await.unwrap().contains("b"));
}

#[tokio::test]
async fn find_options_shape_results() {
    let accessor = accessor().await;
    accessor
        .insert_many("items", &[item(1, "c"), item(2, "a"), item(3, "b"), item(4, "d")])
        .await
        .unwrap();

    let names: Vec<Document> = accessor
        .find_many(
            "items",
            doc! { "_id": { "$lt": 4 } },
            FindOptions::builder()
                .sort("name", SortDirection::Desc)
                .skip(1)
                .limit(5)
                .projection(doc! { "_id": 0 })
                .build(),
        )
        .await
        .unwrap();

    assert_eq!(names, vec![doc! { "name": "b" }, doc! { "name": "a" }]);
    assert_eq!(accessor.count_documents("items", doc! { "name": { "$gt": "b" } }).await.unwrap(), 2);
}

#[tokio::test]
async fn accessor_is_shareable_across_tasks() {
    let accessor = Arc::new(accessor().await);

    let handles = (0..8)
        .map(|id| {
            let accessor = Arc::clone(&accessor);
            tokio::spawn(async move { accessor.insert_one("items", &item(id, "t")).await })
        })
        .collect::<Vec<_>>();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(accessor.count_documents("items", doc! {}).await.unwrap(), 8);
}

#[tokio::test]
async fn borrowed_backend_and_configured_deadline() {
    let backend = MemoryBackend::new("app");
    let accessor = Accessor::with_config(
        &backend,
        AccessorConfig { operation_timeout: Some(Duration::from_secs(5)) },
    );

    accessor.ping().await.unwrap();
    accessor.insert_one("items", &item(1, "a")).await.unwrap();
    assert_eq!(accessor.database_name(), "app");
    accessor.close().await.unwrap();

    // The backend outlives the borrowing accessor.
    let again = Accessor::new(backend);
    assert_eq!(all(&again, "items").await, vec![item(1, "a")]);
}
