//! Application of update documents and replacements to stored documents.

use bson::{Bson, Document};

use crate::matcher::{is_operator_document, lookup};

/// Applies an operator update (`$set`, `$unset`, `$inc`, `$rename`, `$push`,
/// `$setOnInsert`) to `target` in place.
///
/// `inserting` is set when the update seeds a document created by an upsert,
/// which is the only case where `$setOnInsert` takes effect.
pub(crate) fn apply_update(target: &mut Document, update: &Document, inserting: bool) -> Result<(), String> {
    if !is_operator_document(update) {
        return Err("update document requires atomic operators".to_string());
    }

    let original_id = target.get("_id").cloned();

    for (operator, arguments) in update {
        let arguments = arguments
            .as_document()
            .ok_or_else(|| format!("modifier {operator} requires a document argument"))?;

        for (path, value) in arguments {
            match operator.as_str() {
                "$set" => set_path(target, path, value.clone())?,
                "$setOnInsert" => {
                    if inserting {
                        set_path(target, path, value.clone())?;
                    }
                },
                "$unset" => {
                    remove_path(target, path);
                },
                "$inc" => {
                    let current = lookup(target, path).cloned();
                    set_path(target, path, increment(current, value, path)?)?;
                },
                "$rename" => {
                    let destination = value
                        .as_str()
                        .ok_or_else(|| format!("$rename target for '{path}' must be a string"))?;

                    if let Some(moved) = remove_path(target, path) {
                        set_path(target, destination, moved)?;
                    }
                },
                "$push" => match lookup(target, path).cloned() {
                    None => set_path(target, path, Bson::Array(vec![value.clone()]))?,
                    Some(Bson::Array(mut items)) => {
                        items.push(value.clone());
                        set_path(target, path, Bson::Array(items))?;
                    },
                    Some(_) => return Err(format!("the field '{path}' must be an array")),
                },
                unknown => return Err(format!("unknown modifier: {unknown}")),
            }
        }
    }

    if original_id.is_some() && target.get("_id") != original_id.as_ref() {
        return Err("performing an update on the path '_id' would modify the immutable field '_id'".to_string());
    }

    Ok(())
}

/// Builds the document stored in place of `current` by a replacement.
///
/// The stored `_id` is kept and moved to the front; a replacement carrying a
/// different `_id` is rejected.
pub(crate) fn apply_replacement(current: &Document, replacement: &Document) -> Result<Document, String> {
    validate_replacement(replacement)?;

    let id = current.get("_id").cloned().unwrap_or(Bson::Null);

    if let Some(new_id) = replacement.get("_id") {
        if new_id != &id {
            return Err("the _id field cannot be changed by a replacement".to_string());
        }
    }

    let mut replaced = Document::new();
    replaced.insert("_id", id);
    for (key, value) in replacement {
        if key != "_id" {
            replaced.insert(key.clone(), value.clone());
        }
    }

    Ok(replaced)
}

pub(crate) fn validate_replacement(replacement: &Document) -> Result<(), String> {
    match replacement.keys().find(|key| key.starts_with('$')) {
        Some(key) => Err(format!("replacement document must not contain update operators ({key})")),
        None => Ok(()),
    }
}

/// Extracts the equality clauses of a filter, used as the base of an upserted document.
pub(crate) fn seed_from_filter(filter: &Document) -> Result<Document, String> {
    let mut seed = Document::new();
    collect_equalities(filter, &mut seed)?;
    Ok(seed)
}

fn collect_equalities(filter: &Document, seed: &mut Document) -> Result<(), String> {
    for (key, condition) in filter {
        if key == "$and" {
            if let Bson::Array(clauses) = condition {
                for clause in clauses.iter().filter_map(Bson::as_document) {
                    collect_equalities(clause, seed)?;
                }
            }
            continue;
        }

        if key.starts_with('$') {
            continue;
        }

        match condition {
            Bson::Document(operators) if is_operator_document(operators) => {
                if let Some(value) = operators.get("$eq") {
                    set_path(seed, key, value.clone())?;
                }
            },
            value => set_path(seed, key, value.clone())?,
        }
    }

    Ok(())
}

fn set_path(target: &mut Document, path: &str, value: Bson) -> Result<(), String> {
    match path.split_once('.') {
        None => {
            target.insert(path.to_string(), value);
            Ok(())
        },
        Some((head, rest)) => {
            if !target.contains_key(head) {
                target.insert(head.to_string(), Document::new());
            }

            match target.get_mut(head) {
                Some(Bson::Document(child)) => set_path(child, rest, value),
                _ => Err(format!("cannot create field '{rest}' in element '{head}'")),
            }
        },
    }
}

fn remove_path(target: &mut Document, path: &str) -> Option<Bson> {
    match path.split_once('.') {
        None => target.remove(path),
        Some((head, rest)) => match target.get_mut(head) {
            Some(Bson::Document(child)) => remove_path(child, rest),
            _ => None,
        },
    }
}

fn increment(current: Option<Bson>, delta: &Bson, path: &str) -> Result<Bson, String> {
    let non_numeric = || format!("cannot apply $inc to a non-numeric value at '{path}'");
    let widened = |a: i64, b: i64| {
        a.checked_add(b)
            .map(Bson::Int64)
            .ok_or_else(|| format!("$inc at '{path}' would overflow a 64-bit integer"))
    };

    Ok(match (current, delta) {
        (None, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) => delta.clone(),
        (Some(Bson::Int32(a)), Bson::Int32(b)) => match a.checked_add(*b) {
            Some(sum) => Bson::Int32(sum),
            None => Bson::Int64(a as i64 + *b as i64),
        },
        (Some(Bson::Int32(a)), Bson::Int64(b)) => widened(a as i64, *b)?,
        (Some(Bson::Int64(a)), Bson::Int32(b)) => widened(a, *b as i64)?,
        (Some(Bson::Int64(a)), Bson::Int64(b)) => widened(a, *b)?,
        (Some(Bson::Double(a)), Bson::Int32(b)) => Bson::Double(a + *b as f64),
        (Some(Bson::Double(a)), Bson::Int64(b)) => Bson::Double(a + *b as f64),
        (Some(Bson::Double(a)), Bson::Double(b)) => Bson::Double(a + b),
        (Some(Bson::Int32(a)), Bson::Double(b)) => Bson::Double(a as f64 + b),
        (Some(Bson::Int64(a)), Bson::Double(b)) => Bson::Double(a as f64 + b),
        _ => return Err(non_numeric()),
    })
}
