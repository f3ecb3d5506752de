//! Heterogeneous batches of writes.
//!
//! A bulk write submits a list of [`WriteModel`]s against one collection. In
//! ordered mode the batch is applied strictly in sequence and stops at the first
//! failing model; in unordered mode every model is attempted and failures are
//! collected.

use bson::Document;

use crate::{
    backend::ConnectionBackend,
    error::{AccessorError, AccessorResult, BulkWriteFailure},
    outcome::BulkWriteOutcome,
};

/// A single write inside a bulk batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteModel {
    InsertOne {
        document: Document,
    },
    UpdateOne {
        filter: Document,
        update: Document,
        upsert: bool,
    },
    UpdateMany {
        filter: Document,
        update: Document,
        upsert: bool,
    },
    ReplaceOne {
        filter: Document,
        replacement: Document,
        upsert: bool,
    },
    DeleteOne {
        filter: Document,
    },
    DeleteMany {
        filter: Document,
    },
}

impl WriteModel {
    pub fn insert_one(document: Document) -> Self {
        WriteModel::InsertOne { document }
    }

    pub fn update_one(filter: Document, update: Document) -> Self {
        WriteModel::UpdateOne { filter, update, upsert: false }
    }

    pub fn update_many(filter: Document, update: Document) -> Self {
        WriteModel::UpdateMany { filter, update, upsert: false }
    }

    pub fn replace_one(filter: Document, replacement: Document, upsert: bool) -> Self {
        WriteModel::ReplaceOne { filter, replacement, upsert }
    }

    pub fn delete_one(filter: Document) -> Self {
        WriteModel::DeleteOne { filter }
    }

    pub fn delete_many(filter: Document) -> Self {
        WriteModel::DeleteMany { filter }
    }
}

/// Applies `models` one at a time through the backend's single-document verbs.
///
/// `ordered` stops at the first failure, leaving the remaining models unapplied.
/// Otherwise every model is attempted. Any failure turns the whole call into
/// [`AccessorError::BulkWrite`] carrying the partial outcome.
pub async fn apply_sequentially<B>(
    backend: &B,
    collection: &str,
    models: Vec<WriteModel>,
    ordered: bool,
) -> AccessorResult<BulkWriteOutcome>
where
    B: ConnectionBackend + ?Sized,
{
    let mut outcome = BulkWriteOutcome::default();
    let mut failures = Vec::new();

    for (position, model) in models.into_iter().enumerate() {
        let applied = match model {
            WriteModel::InsertOne { document } => backend
                .insert_one(collection, document)
                .await
                .map(|_| outcome.inserted += 1),
            WriteModel::UpdateOne { filter, update, upsert } => backend
                .update_one(collection, filter, update, upsert)
                .await
                .map(|result| outcome.absorb_update(&result)),
            WriteModel::UpdateMany { filter, update, upsert } => backend
                .update_many(collection, filter, update, upsert)
                .await
                .map(|result| outcome.absorb_update(&result)),
            WriteModel::ReplaceOne { filter, replacement, upsert } => backend
                .replace_one(collection, filter, replacement, upsert)
                .await
                .map(|result| outcome.absorb_update(&result)),
            WriteModel::DeleteOne { filter } => backend
                .delete_one(collection, filter)
                .await
                .map(|result| outcome.absorb_delete(&result)),
            WriteModel::DeleteMany { filter } => backend
                .delete_many(collection, filter)
                .await
                .map(|result| outcome.absorb_delete(&result)),
        };

        if let Err(err) = applied {
            failures.push((position, failure_message(err)));

            if ordered {
                break;
            }
        }
    }

    if failures.is_empty() {
        Ok(outcome)
    } else {
        Err(AccessorError::BulkWrite(BulkWriteFailure {
            collection: collection.to_string(),
            outcome,
            failures,
        }))
    }
}

fn failure_message(err: AccessorError) -> String {
    match err {
        AccessorError::Write { message, .. } => message,
        other => other.to_string(),
    }
}
