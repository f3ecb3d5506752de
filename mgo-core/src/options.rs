//! Read options for find operations.
//!
//! Instead of passing driver-specific option objects through, reads take a
//! [`FindOptions`] with named fields which each backend translates into whatever
//! its binding expects.
//!
//! ```ignore
//! use mgo::options::{FindOptions, SortDirection};
//!
//! let options = FindOptions::builder()
//!     .sort("created_at", SortDirection::Desc)
//!     .skip(20)
//!     .limit(10)
//!     .build();
//! ```

use bson::{Document, doc};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

impl SortDirection {
    /// The numeric form used in sort and index key documents.
    pub fn as_i32(self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

/// One key of a sort specification.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

/// Options applied to `find_one` and `find_many`.
///
/// All fields are optional; the default value means "datastore defaults".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Sort keys, applied in order.
    pub sort: Vec<Sort>,
    /// Maximum number of documents to return.
    pub limit: Option<u64>,
    /// Number of matching documents to skip.
    pub skip: Option<u64>,
    /// Fields to include (`1`) or exclude (`0`) from returned documents.
    pub projection: Option<Document>,
}

impl FindOptions {
    /// Creates a new options builder for fluent construction.
    pub fn builder() -> FindOptionsBuilder {
        FindOptionsBuilder::new()
    }

    /// The sort specification as a key-ordered document, or `None` when unsorted.
    pub fn sort_document(&self) -> Option<Document> {
        if self.sort.is_empty() {
            return None;
        }

        let mut sort = doc! {};
        for key in &self.sort {
            sort.insert(key.field.clone(), key.direction.as_i32());
        }

        Some(sort)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FindOptionsBuilder {
    options: FindOptions,
}

impl FindOptionsBuilder {
    /// Creates a new options builder.
    pub fn new() -> Self {
        FindOptionsBuilder { options: FindOptions::default() }
    }

    /// Appends a sort key. Calling this several times sorts by each key in turn.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.options.sort.push(Sort { field: field.into(), direction });
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: u64) -> Self {
        self.options.limit = Some(limit);
        self
    }

    /// Sets the number of documents to skip.
    pub fn skip(mut self, skip: u64) -> Self {
        self.options.skip = Some(skip);
        self
    }

    /// Sets the projection document.
    pub fn projection(mut self, projection: Document) -> Self {
        self.options.projection = Some(projection);
        self
    }

    /// Builds and returns the final options.
    pub fn build(self) -> FindOptions {
        self.options
    }
}
