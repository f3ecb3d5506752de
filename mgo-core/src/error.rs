//! Error types and result types for collection accessor operations.
//!
//! Every verb on the [`Accessor`](crate::accessor::Accessor) returns an
//! [`AccessorResult<T>`]. The error classes follow the datastore's failure modes:
//! connection setup/teardown, writes, zero-match single reads, decoding, and
//! index management.

use std::time::Duration;

use thiserror::Error;

use crate::outcome::BulkWriteOutcome;

/// Represents all possible errors that can occur when talking to the datastore
/// through an accessor.
#[derive(Error, Debug)]
pub enum AccessorError {
    /// The connection could not be established or torn down, either because the
    /// URI is malformed or because the handshake/teardown did not finish in time.
    #[error("Connection error: {0}")]
    Connection(String),
    /// An insert, update, replace or delete was rejected by the datastore.
    /// Constraint violations such as duplicate keys on a unique index land here.
    #[error("Write error in collection {collection}: {message}")]
    Write {
        collection: String,
        message: String,
    },
    /// One or more models of a bulk write failed.
    #[error("{0}")]
    BulkWrite(BulkWriteFailure),
    /// A single-document read matched nothing.
    #[error("No document matched the filter in collection {collection}")]
    NotFound {
        collection: String,
    },
    /// A stored document could not be decoded into the requested type.
    #[error("Decode error: {0}")]
    Decode(String),
    /// A caller payload could not be encoded as a document.
    #[error("Encode error: {0}")]
    Encode(String),
    /// Index creation or removal failed.
    #[error("Index error on {collection}.{field}: {message}")]
    Index {
        collection: String,
        field: String,
        message: String,
    },
    /// The configured per-operation deadline elapsed before the datastore answered.
    #[error("Operation {operation} exceeded its deadline of {timeout:?}")]
    DeadlineExceeded {
        operation: &'static str,
        timeout: Duration,
    },
    /// Any other failure reported by the backend, typically on the read path.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl AccessorError {
    /// Builds a [`AccessorError::Write`] for the given collection.
    pub fn write(collection: &str, message: impl Into<String>) -> Self {
        AccessorError::Write {
            collection: collection.to_string(),
            message: message.into(),
        }
    }

    /// Builds a [`AccessorError::Index`] annotated with the offending collection and field.
    pub fn index(collection: &str, field: &str, message: impl Into<String>) -> Self {
        AccessorError::Index {
            collection: collection.to_string(),
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Whether this error belongs to the write class (single writes and bulk writes).
    pub fn is_write(&self) -> bool {
        matches!(self, AccessorError::Write { .. } | AccessorError::BulkWrite(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AccessorError::NotFound { .. })
    }
}

/// Details of a bulk write in which at least one model failed.
///
/// `outcome` counts what was applied before (ordered) or despite (unordered)
/// the failures. `failures` holds the position of each failed model in the
/// submitted batch along with the datastore's message.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkWriteFailure {
    pub collection: String,
    pub outcome: BulkWriteOutcome,
    pub failures: Vec<(usize, String)>,
}

impl std::fmt::Display for BulkWriteFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Bulk write in collection {} failed for {} model(s)",
            self.collection,
            self.failures.len(),
        )?;

        if let Some((index, message)) = self.failures.first() {
            write!(f, ", first at #{index}: {message}")?;
        }

        Ok(())
    }
}

/// A specialized `Result` type for accessor operations.
pub type AccessorResult<T> = Result<T, AccessorError>;
