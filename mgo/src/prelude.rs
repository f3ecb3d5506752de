//! Convenient re-exports of commonly used types from mgo.
//!
//! ```ignore
//! use mgo::prelude::*;
//! ```

pub use mgo_core::{
    accessor::{Accessor, AccessorConfig},
    backend::{BackendBuilder, ConnectionBackend},
    bulk::WriteModel,
    error::{AccessorError, AccessorResult, BulkWriteFailure},
    index::IndexDescriptor,
    options::{FindOptions, FindOptionsBuilder, Sort, SortDirection},
    outcome::{BulkWriteOutcome, DeleteOutcome, InsertManyOutcome, InsertOneOutcome, UpdateOutcome},
};
