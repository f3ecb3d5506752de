//! MongoDB connection backend for mgo.
//!
//! This crate implements the `ConnectionBackend` trait on top of the official
//! MongoDB async driver. To use it, enable the `mongodb` feature:
//!
//! ```toml
//! [dependencies]
//! mgo = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Connection
//!
//! [`MongoDbBackend::builder`] takes a standard `mongodb://` or `mongodb+srv://`
//! URI and the database name to bind. Building parses the URI and pings the
//! server; both must finish within the connect deadline (20 seconds unless
//! configured). Shutting the backend down is bounded the same way.
//!
//! Bulk writes are applied model by model through the single-document
//! commands, which keeps ordered and unordered semantics available on every
//! server version.
//!
//! # Example
//!
//! ```ignore
//! use mgo::{prelude::*, mongodb::MongoDbBackend};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = MongoDbBackend::builder("mongodb://localhost:27017", "my_database")
//!         .build()
//!         .await?;
//!     let accessor = Accessor::new(backend);
//!
//!     accessor.close().await?;
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as mgo_mongodb;

pub mod store;
mod options;

pub use store::{DEFAULT_CONNECTION_TIMEOUT, MongoDbBackend, MongoDbBackendBuilder};
