//! Result objects returned by write operations.

use bson::Bson;

/// Outcome of a single-document insert.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertOneOutcome {
    /// The `_id` of the stored document, generated by the datastore if the payload had none.
    pub inserted_id: Bson,
}

/// Outcome of a multi-document insert, ids in submission order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertManyOutcome {
    pub inserted_ids: Vec<Bson>,
}

/// Outcome of an update, replace or upsert.
///
/// A filter matching nothing is reported as `matched == 0` rather than as an error.
/// `modified` may be lower than `matched` when the update left a document unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
    /// Set when an upsert inserted a new document.
    pub upserted_id: Option<Bson>,
}

impl UpdateOutcome {
    /// True when the filter matched nothing and no document was upserted.
    pub fn is_noop(&self) -> bool {
        self.matched == 0 && self.upserted_id.is_none()
    }
}

/// Outcome of a delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub deleted: u64,
}

/// Aggregated counts of a bulk write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkWriteOutcome {
    pub inserted: u64,
    pub matched: u64,
    pub modified: u64,
    pub deleted: u64,
    pub upserted: u64,
}

impl BulkWriteOutcome {
    pub(crate) fn absorb_update(&mut self, outcome: &UpdateOutcome) {
        self.matched += outcome.matched;
        self.modified += outcome.modified;

        if outcome.upserted_id.is_some() {
            self.upserted += 1;
        }
    }

    pub(crate) fn absorb_delete(&mut self, outcome: &DeleteOutcome) {
        self.deleted += outcome.deleted;
    }
}
