//! Main mgo crate: a narrow, typed collection accessor for document datastores.
//!
//! This crate is the primary entry point. It re-exports the core types and the
//! available connection backends.
//!
//! # Features
//!
//! - **One handle per database** - [`Accessor`](accessor::Accessor) binds a backend to a database name
//! - **Typed payloads** - documents in and out are any serde type
//! - **Explicit outcomes** - matched/modified/deleted counts instead of silent no-ops
//! - **Bulk writes** - ordered or unordered batches of inserts, updates and deletes
//! - **Index management** - unique and sparse single-field indexes
//!
//! # Quick Start
//!
//! ```ignore
//! use mgo::{prelude::*, memory::MemoryBackend};
//! use bson::doc;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct Item {
//!     #[serde(rename = "_id")]
//!     pub id: i32,
//!     pub name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let accessor = Accessor::new(MemoryBackend::builder("app").build().await.unwrap());
//!
//!     accessor
//!         .insert_one("items", &Item { id: 1, name: "a".into() })
//!         .await
//!         .unwrap();
//!
//!     let item: Item = accessor
//!         .find_one("items", doc! { "_id": 1 }, FindOptions::default())
//!         .await
//!         .unwrap();
//!
//!     println!("Found item: {:?}", item);
//!
//!     accessor.close().await.unwrap();
//! }
//! ```
//!
//! # Replacing collection contents
//!
//! [`replace_collection`](accessor::Accessor::replace_collection) and
//! [`replace_collection_all`](accessor::Accessor::replace_collection_all) clear a
//! collection and then insert. The two steps are independent writes: if the
//! insert fails, the collection stays empty. An empty slice passed to
//! `replace_collection_all` leaves the collection as it was.
//!
//! # Backends
//!
//! - [`memory`] - In-process backend for development and testing
//! - [`mongodb`] - MongoDB driver backend (requires `mongodb` feature)

pub mod prelude;

pub use mgo_core::{accessor, backend, bulk, error, index, options, outcome};

// Re-export BSON types for convenience
pub use bson;

/// In-memory backend implementations.
pub mod memory {
    pub use mgo_memory::{MemoryBackend, MemoryBackendBuilder};
}

/// MongoDB backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use mgo_mongodb::{DEFAULT_CONNECTION_TIMEOUT, MongoDbBackend, MongoDbBackendBuilder};
}

/// Connects to `uri` with the default 20 second handshake deadline and binds
/// the returned accessor to `database`.
///
/// # Errors
///
/// [`AccessorError::Connection`](error::AccessorError::Connection) if the URI
/// is malformed or the server does not answer in time.
#[cfg(feature = "mongodb")]
pub async fn connect(
    uri: &str,
    database: &str,
) -> error::AccessorResult<accessor::Accessor<mgo_mongodb::MongoDbBackend>> {
    use backend::BackendBuilder;

    Ok(accessor::Accessor::new(
        mgo_mongodb::MongoDbBackend::builder(uri, database)
            .build()
            .await?,
    ))
}
