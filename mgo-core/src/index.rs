//! Index descriptors.

/// Describes a single-field ascending index to create on a collection.
///
/// ```ignore
/// use mgo::index::IndexDescriptor;
///
/// let by_email = IndexDescriptor::new("users", "email").unique(true);
/// let by_referrer = IndexDescriptor::new("users", "referrer").sparse(true);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    pub collection: String,
    pub field: String,
    /// Reject documents sharing a value for `field`.
    pub unique: bool,
    /// Omit documents lacking `field` from the index.
    pub sparse: bool,
}

impl IndexDescriptor {
    /// A non-unique, non-sparse index on `collection.field`.
    pub fn new(collection: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            field: field.into(),
            unique: false,
            sparse: false,
        }
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn sparse(mut self, sparse: bool) -> Self {
        self.sparse = sparse;
        self
    }

    /// The name the datastore gives a single-field ascending index by default.
    pub fn default_name(&self) -> String {
        format!("{}_1", self.field)
    }
}
