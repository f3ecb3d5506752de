//! Translation of accessor types into driver option and model types.

use mongodb::{
    IndexModel,
    options::{FindOneOptions, FindOptions as DriverFindOptions, IndexOptions},
    results::{DeleteResult, InsertManyResult, UpdateResult},
};
use bson::doc;

use mgo_core::{
    index::IndexDescriptor,
    options::FindOptions,
    outcome::{DeleteOutcome, InsertManyOutcome, UpdateOutcome},
};


pub(crate) fn find_options(options: FindOptions) -> DriverFindOptions {
    let mut translated = DriverFindOptions::default();

    translated.sort = options.sort_document();
    translated.limit = options.limit.map(|limit| i64::try_from(limit).unwrap_or(i64::MAX));
    translated.skip = options.skip;
    translated.projection = options.projection;

    translated
}

/// `find_one` has no limit of its own; sort, skip and projection carry over.
pub(crate) fn find_one_options(options: FindOptions) -> FindOneOptions {
    let mut translated = FindOneOptions::default();

    translated.sort = options.sort_document();
    translated.skip = options.skip;
    translated.projection = options.projection;

    translated
}

/// A single-field ascending index with the descriptor's uniqueness and sparseness.
pub(crate) fn index_model(index: &IndexDescriptor) -> IndexModel {
    IndexModel::builder()
        .keys(doc! { index.field.as_str(): 1 })
        .options(
            IndexOptions::builder()
                .unique(index.unique)
                .sparse(index.sparse)
                .build()
        )
        .build()
}

pub(crate) fn update_outcome(result: UpdateResult) -> UpdateOutcome {
    UpdateOutcome {
        matched: result.matched_count,
        modified: result.modified_count,
        upserted_id: result.upserted_id,
    }
}

pub(crate) fn delete_outcome(result: DeleteResult) -> DeleteOutcome {
    DeleteOutcome { deleted: result.deleted_count }
}

/// The driver reports inserted ids keyed by batch position; the outcome lists them in order.
pub(crate) fn insert_many_outcome(result: InsertManyResult) -> InsertManyOutcome {
    let mut ids = result.inserted_ids.into_iter().collect::<Vec<_>>();
    ids.sort_by_key(|(position, _)| *position);

    InsertManyOutcome {
        inserted_ids: ids.into_iter().map(|(_, id)| id).collect(),
    }
}
