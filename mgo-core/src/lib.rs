//! Core of the mgo project: a narrow, typed accessor over a document datastore.
//!
//! This crate provides:
//!
//! - **Accessor** ([`accessor`]) - The handle bound to one database exposing CRUD, bulk and index verbs
//! - **Backend abstraction** ([`backend`]) - The connection capability the accessor delegates to
//! - **Bulk writes** ([`bulk`]) - Write models and ordered/unordered batch application
//! - **Read options** ([`options`]) - Named sort, limit, skip and projection settings
//! - **Index descriptors** ([`index`]) - Single-field index definitions
//! - **Outcomes** ([`outcome`]) - Matched/modified/deleted counts returned by writes
//! - **Error handling** ([`error`]) - Error taxonomy and result alias
//!
//! # Example
//!
//! ```ignore
//! use mgo_core::{accessor::Accessor, index::IndexDescriptor};
//! use bson::doc;
//!
//! let accessor = Accessor::new(backend);
//!
//! accessor.create_index(&IndexDescriptor::new("users", "email").unique(true)).await?;
//! accessor.insert_one("users", &doc! { "email": "a@example.com" }).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as mgo_core;

pub mod accessor;
pub mod backend;
pub mod bulk;
pub mod error;
pub mod index;
pub mod options;
pub mod outcome;
