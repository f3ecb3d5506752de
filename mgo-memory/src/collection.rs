//! Per-collection state: documents in natural order plus secondary indexes.

use std::cmp::Ordering;

use bson::{Bson, Document, oid::ObjectId};

use mgo_core::{
    error::{AccessorError, AccessorResult},
    index::IndexDescriptor,
};

use crate::matcher::{FilterMatcher, compare_values, lookup};

/// Name of the primary index every collection carries.
pub(crate) const PRIMARY_INDEX: &str = "_id_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IndexState {
    pub name: String,
    pub field: String,
    pub unique: bool,
    pub sparse: bool,
}

impl IndexState {
    /// The key a document contributes to this index, or `None` if a sparse index skips it.
    fn key_of<'d>(&self, document: &'d Document) -> Option<&'d Bson> {
        match lookup(document, &self.field) {
            Some(value) => Some(value),
            None if self.sparse => None,
            None => Some(&crate::matcher::NULL),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct CollectionState {
    documents: Vec<Document>,
    indexes: Vec<IndexState>,
}

impl CollectionState {
    /// Positions of the documents matching `filter`, at most one if `first_only`.
    pub fn matching(&self, filter: &Document, first_only: bool) -> AccessorResult<Vec<usize>> {
        let mut positions = Vec::new();

        for (position, document) in self.documents.iter().enumerate() {
            if FilterMatcher::new(document).matches(filter)? {
                positions.push(position);

                if first_only {
                    break;
                }
            }
        }

        Ok(positions)
    }

    /// Stores `document`, generating an `_id` if it has none, and returns the `_id`.
    pub fn insert(&mut self, namespace: &str, document: Document) -> Result<Bson, String> {
        let document = with_id(document);
        self.check_constraints(namespace, &document, None)?;

        let id = document.get("_id").cloned().unwrap_or(Bson::Null);
        self.documents.push(document);

        Ok(id)
    }

    /// Overwrites the document at `position` after checking unique constraints.
    pub fn replace_at(&mut self, namespace: &str, position: usize, document: Document) -> Result<(), String> {
        self.check_constraints(namespace, &document, Some(position))?;
        self.documents[position] = document;

        Ok(())
    }

    pub fn get(&self, position: usize) -> &Document {
        &self.documents[position]
    }

    /// Removes the documents at `positions`, which must be ascending.
    pub fn remove(&mut self, positions: &[usize]) -> u64 {
        for position in positions.iter().rev() {
            self.documents.remove(*position);
        }

        positions.len() as u64
    }

    fn check_constraints(&self, namespace: &str, candidate: &Document, skip: Option<usize>) -> Result<(), String> {
        let primary = IndexState {
            name: PRIMARY_INDEX.to_string(),
            field: "_id".to_string(),
            unique: true,
            sparse: false,
        };

        for index in std::iter::once(&primary).chain(self.indexes.iter().filter(|index| index.unique)) {
            let Some(key) = index.key_of(candidate) else {
                continue;
            };

            let clash = self
                .documents
                .iter()
                .enumerate()
                .filter(|(position, _)| Some(*position) != skip)
                .filter_map(|(_, existing)| index.key_of(existing))
                .any(|existing| compare_values(existing, key) == Ordering::Equal);

            if clash {
                return Err(duplicate_key(namespace, index, key));
            }
        }

        Ok(())
    }

    /// Registers a single-field index, returning its name.
    ///
    /// An identical existing index is accepted as-is; the same key with other
    /// options is a conflict. A unique index is refused if existing documents
    /// already violate it.
    pub fn create_index(&mut self, namespace: &str, descriptor: &IndexDescriptor) -> AccessorResult<String> {
        let conflict = |message: String| AccessorError::index(&descriptor.collection, &descriptor.field, message);

        if descriptor.field == "_id" {
            if descriptor.unique || descriptor.sparse {
                return Err(conflict("options unique and sparse are not valid for an _id index".to_string()));
            }
            return Ok(PRIMARY_INDEX.to_string());
        }

        let requested = IndexState {
            name: descriptor.default_name(),
            field: descriptor.field.clone(),
            unique: descriptor.unique,
            sparse: descriptor.sparse,
        };

        if let Some(existing) = self.indexes.iter().find(|index| index.name == requested.name) {
            if existing == &requested {
                return Ok(requested.name);
            }

            return Err(conflict(format!(
                "IndexOptionsConflict: an index named {} already exists with different options",
                requested.name,
            )));
        }

        if requested.unique {
            let keys = self
                .documents
                .iter()
                .filter_map(|document| requested.key_of(document))
                .collect::<Vec<_>>();

            for (i, key) in keys.iter().enumerate() {
                if keys[i + 1..].iter().any(|other| compare_values(other, key) == Ordering::Equal) {
                    return Err(conflict(duplicate_key(namespace, &requested, key)));
                }
            }
        }

        let name = requested.name.clone();
        self.indexes.push(requested);

        Ok(name)
    }

    pub fn drop_indexes(&mut self) {
        self.indexes.clear();
    }

    pub fn index_names(&self) -> Vec<String> {
        std::iter::once(PRIMARY_INDEX.to_string())
            .chain(self.indexes.iter().map(|index| index.name.clone()))
            .collect()
    }
}

fn with_id(document: Document) -> Document {
    if document.contains_key("_id") {
        return document;
    }

    let mut stored = Document::new();
    stored.insert("_id", ObjectId::new());
    for (key, value) in document {
        stored.insert(key, value);
    }
    stored
}

fn duplicate_key(namespace: &str, index: &IndexState, key: &Bson) -> String {
    format!(
        "E11000 duplicate key error collection: {namespace} index: {} dup key: {{ {}: {key} }}",
        index.name, index.field,
    )
}
