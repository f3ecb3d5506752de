//! In-memory connection backend for mgo.
//!
//! This crate provides a thread-safe, in-process implementation of the
//! `ConnectionBackend` trait. It mirrors the datastore's observable behavior
//! for the verbs the accessor uses and is intended for development and tests.
//!
//! # Features
//!
//! - **Query documents** - `$and`/`$or`/`$nor`, comparisons, `$in`/`$nin`, `$exists`, `$not`, dotted paths
//! - **Update operators** - `$set`, `$unset`, `$inc`, `$rename`, `$push`, `$setOnInsert`
//! - **Unique and sparse indexes** - duplicate keys are rejected as write errors
//! - **Sort, skip, limit, projection** - the full `FindOptions` surface
//!
//! # Quick Start
//!
//! ```ignore
//! use mgo::{prelude::*, memory::MemoryBackend};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let accessor = Accessor::new(MemoryBackend::builder("app").build().await?);
//!
//!     accessor.insert_one("items", &doc! { "_id": 1, "name": "a" }).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as mgo_memory;

pub mod store;
mod collection;
mod matcher;
mod update;

pub use store::{MemoryBackend, MemoryBackendBuilder};
