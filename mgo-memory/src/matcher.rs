//! Filter evaluation for in-memory documents.
//!
//! Filters use the datastore's query-document syntax: top-level `$and`, `$or`
//! and `$nor`, field equality, and the comparison operators `$eq`, `$ne`, `$gt`,
//! `$gte`, `$lt`, `$lte`, `$in`, `$nin`, `$exists` and `$not`. Dotted paths reach
//! into embedded documents and array positions.

use std::cmp::Ordering;

use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};

use mgo_core::error::{AccessorError, AccessorResult};

pub(crate) static NULL: Bson = Bson::Null;

/// Type-erased, comparable representation of BSON values.
///
/// Numbers of every width are normalized to `f64`. Values of different kinds
/// order by kind first, following the datastore's cross-type sort order.
#[derive(Debug)]
enum Comparable<'a> {
    Null,
    Number(f64),
    String(&'a str),
    Document(&'a Document),
    Array(&'a [Bson]),
    ObjectId(ObjectId),
    Bool(bool),
    DateTime(DateTime),
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Document(doc) => Comparable::Document(doc),
            Bson::Array(arr) => Comparable::Array(arr),
            Bson::ObjectId(oid) => Comparable::ObjectId(*oid),
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            other => Comparable::Other(other),
        }
    }
}

impl Comparable<'_> {
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 1,
            Comparable::Number(_) => 2,
            Comparable::String(_) => 3,
            Comparable::Document(_) => 4,
            Comparable::Array(_) => 5,
            Comparable::ObjectId(_) => 7,
            Comparable::Bool(_) => 8,
            Comparable::DateTime(_) => 9,
            Comparable::Other(_) => 10,
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Ordering::Equal,
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Comparable::String(a), Comparable::String(b)) => a.cmp(b),
            (Comparable::Document(a), Comparable::Document(b)) => {
                for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                    let ordering = ka.cmp(kb).then_with(|| compare_values(va, vb));
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                a.len().cmp(&b.len())
            },
            (Comparable::Array(a), Comparable::Array(b)) => {
                for (va, vb) in a.iter().zip(b.iter()) {
                    let ordering = compare_values(va, vb);
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                a.len().cmp(&b.len())
            },
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.bytes().cmp(&b.bytes()),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.cmp(b),
            (Comparable::Other(a), Comparable::Other(b)) if a == b => Ordering::Equal,
            (Comparable::Other(a), Comparable::Other(b)) => format!("{a:?}").cmp(&format!("{b:?}")),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Total order over BSON values used for sorting, equality and range operators.
pub(crate) fn compare_values(left: &Bson, right: &Bson) -> Ordering {
    Comparable::from(left).compare(&Comparable::from(right))
}

fn same_kind(left: &Bson, right: &Bson) -> bool {
    Comparable::from(left).rank() == Comparable::from(right).rank()
}

/// Resolves a dotted path against a document.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Bson::Document(doc) => doc.get(segment)?,
            Bson::Array(arr) => arr.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Evaluates query documents against one stored document.
pub(crate) struct FilterMatcher<'a> {
    document: &'a Document,
}

impl<'a> FilterMatcher<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Whether the document satisfies every clause of `filter`. An empty filter matches.
    pub fn matches(&self, filter: &Document) -> AccessorResult<bool> {
        for (key, condition) in filter {
            let matched = match key.as_str() {
                "$and" => {
                    let mut all = true;
                    for clause in clauses(key, condition)? {
                        if !self.matches(clause)? {
                            all = false;
                            break;
                        }
                    }
                    all
                },
                "$or" => {
                    let mut any = false;
                    for clause in clauses(key, condition)? {
                        if self.matches(clause)? {
                            any = true;
                            break;
                        }
                    }
                    any
                },
                "$nor" => {
                    let mut none = true;
                    for clause in clauses(key, condition)? {
                        if self.matches(clause)? {
                            none = false;
                            break;
                        }
                    }
                    none
                },
                operator if operator.starts_with('$') => {
                    return Err(AccessorError::Backend(format!("unknown top level operator: {operator}")));
                },
                path => self.matches_condition(lookup(self.document, path), condition)?,
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn matches_condition(&self, value: Option<&Bson>, condition: &Bson) -> AccessorResult<bool> {
        match condition {
            Bson::Document(operators) if is_operator_document(operators) => {
                for (operator, operand) in operators {
                    if !apply_operator(value, operator, operand)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            },
            literal => Ok(equals(value, literal)),
        }
    }
}

/// True when the document's keys are query or update operators rather than fields.
pub(crate) fn is_operator_document(document: &Document) -> bool {
    document
        .keys()
        .next()
        .is_some_and(|key| key.starts_with('$'))
}

fn clauses<'f>(operator: &str, condition: &'f Bson) -> AccessorResult<Vec<&'f Document>> {
    match condition {
        Bson::Array(items) if !items.is_empty() => items
            .iter()
            .map(|item| {
                item.as_document().ok_or_else(|| {
                    AccessorError::Backend(format!("{operator} argument's entries must be objects"))
                })
            })
            .collect(),
        _ => Err(AccessorError::Backend(format!("{operator} argument must be a non-empty array"))),
    }
}

fn equals(value: Option<&Bson>, expected: &Bson) -> bool {
    match value {
        None => matches!(expected, Bson::Null),
        Some(Bson::Array(items)) if !matches!(expected, Bson::Array(_)) => items
            .iter()
            .any(|item| compare_values(item, expected) == Ordering::Equal),
        Some(actual) => compare_values(actual, expected) == Ordering::Equal,
    }
}

fn range(value: Option<&Bson>, bound: &Bson, accept: fn(Ordering) -> bool) -> bool {
    let satisfies = |candidate: &Bson| {
        same_kind(candidate, bound) && accept(compare_values(candidate, bound))
    };

    match value {
        None => false,
        Some(Bson::Array(items)) if !matches!(bound, Bson::Array(_)) => items.iter().any(satisfies),
        Some(actual) => satisfies(actual),
    }
}

fn apply_operator(value: Option<&Bson>, operator: &str, operand: &Bson) -> AccessorResult<bool> {
    Ok(match operator {
        "$eq" => equals(value, operand),
        "$ne" => !equals(value, operand),
        "$gt" => range(value, operand, |o| o == Ordering::Greater),
        "$gte" => range(value, operand, |o| o != Ordering::Less),
        "$lt" => range(value, operand, |o| o == Ordering::Less),
        "$lte" => range(value, operand, |o| o != Ordering::Greater),
        "$in" => match operand {
            Bson::Array(candidates) => candidates.iter().any(|candidate| equals(value, candidate)),
            _ => return Err(AccessorError::Backend("$in needs an array".to_string())),
        },
        "$nin" => match operand {
            Bson::Array(candidates) => !candidates.iter().any(|candidate| equals(value, candidate)),
            _ => return Err(AccessorError::Backend("$nin needs an array".to_string())),
        },
        "$exists" => value.is_some() == truthy(operand),
        "$not" => match operand {
            Bson::Document(inner) if is_operator_document(inner) => {
                for (operator, operand) in inner {
                    if !apply_operator(value, operator, operand)? {
                        return Ok(true);
                    }
                }
                false
            },
            _ => return Err(AccessorError::Backend("$not needs an operator document".to_string())),
        },
        unknown => return Err(AccessorError::Backend(format!("unknown operator: {unknown}"))),
    })
}

/// Interprets flag-like values (`true`, `1`, `0`) the way the datastore does.
pub(crate) fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(flag) => *flag,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        Bson::Null | Bson::Undefined => false,
        _ => true,
    }
}
