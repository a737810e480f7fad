//! Arrays of sub-documents

use std::sync::Arc;

use bson::oid::ObjectId;
use bson::Bson;

use super::{array, CastOptions, SchemaPath};
use crate::caster::{cast_filter, FilterOptions};
use crate::cast::cast_object_id;
use crate::document::{Document, DocumentOptions, Projection};
use crate::errors::{ObjectParameterError, OdmError, OdmResult, ValidationError};
use crate::schema::{SchemaId, SchemaRegistry};
use crate::value::{Map, Value};

/// Casts each element into a sub-document of `schema` (or of the
/// discriminator its key selects).
///
/// Elements whose `_id` matches an element of the prior array reuse that
/// instance, so pending modifications on it survive the assignment.
/// Element failures are collected and reported together.
pub(super) fn cast(
    path: &SchemaPath,
    schema: SchemaId,
    registry: &Arc<SchemaRegistry>,
    value: Value,
    opts: &CastOptions<'_>,
) -> OdmResult<Value> {
    let items = match value {
        v if v.is_nullish() => return Ok(v),
        Value::Array(items) => items,
        other => vec![other],
    };

    let prior_docs: Vec<Document> = opts
        .prior
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|v| v.as_document().cloned()).collect())
        .unwrap_or_default();
    let selected = opts.selected.and_then(|s| s.scoped(path.path()));
    let base = opts.doc.map(Document::child_options).unwrap_or_default();
    let cx = ElementContext {
        prior_docs: &prior_docs,
        init: opts.init,
        selected: selected.as_ref(),
        base: &base,
    };

    let mut out = Vec::with_capacity(items.len());
    let mut failures: Option<ValidationError> = None;

    for (i, item) in items.into_iter().enumerate() {
        let raw = match item {
            Value::Hole => {
                out.push(Value::Hole);
                continue;
            }
            v if v.is_nullish() => {
                out.push(v);
                continue;
            }
            Value::Document(doc) if registry.is_instance_of(doc.schema_id(), schema) => {
                out.push(Value::Document(doc));
                continue;
            }
            Value::Document(doc) => doc.to_map(),
            Value::Object(map) => map,
            other => return Err(ObjectParameterError::new(&other, "obj", "Document").into()),
        };

        match cast_element(schema, registry, raw, &cx) {
            Ok(doc) => out.push(Value::Document(doc)),
            Err(err) => {
                let key = match err.path() {
                    Some(p) if !p.is_empty() => format!("{}.{}.{}", path.path(), i, p),
                    _ => format!("{}.{}", path.path(), i),
                };
                failures
                    .get_or_insert_with(ValidationError::new)
                    .add_error(key, err);
                out.push(Value::Hole);
            }
        }
    }

    match failures {
        Some(err) => Err(err.into()),
        None => Ok(Value::Array(out)),
    }
}

/// Per-array state shared by every element cast.
struct ElementContext<'a> {
    prior_docs: &'a [Document],
    init: bool,
    selected: Option<&'a Projection>,
    /// Root and strict override inherited from the owning document
    base: &'a DocumentOptions,
}

fn cast_element(
    schema: SchemaId,
    registry: &Arc<SchemaRegistry>,
    raw: Map,
    cx: &ElementContext<'_>,
) -> OdmResult<Document> {
    if let Some(id) = raw.get("_id") {
        let existing = cx
            .prior_docs
            .iter()
            .find(|d| d.get("_id").map_or(false, |current| ids_match(&current, id)));
        if let Some(existing) = existing {
            if cx.init {
                existing.init(raw)?;
            } else {
                existing.set_all(Value::Object(raw))?;
            }
            return Ok(existing.clone());
        }
    }

    let target = registry.resolve_discriminator(schema, &raw);
    if cx.init {
        let options = DocumentOptions {
            selected: cx.selected.cloned(),
            ..cx.base.clone()
        };
        Document::hydrate_with(registry, target, Value::Object(raw), options)
    } else {
        Document::build(registry, target, Value::Object(raw), cx.base.clone())
    }
}

/// Compares a stored `_id` against raw input, casting hex strings and
/// `{ _id }` objects when the stored id is an ObjectId.
pub(crate) fn ids_match(current: &Value, candidate: &Value) -> bool {
    if current == candidate {
        return true;
    }
    let Some(oid) = current.as_object_id() else {
        return false;
    };
    match candidate {
        Value::Scalar(Bson::String(s)) => ObjectId::parse_str(s).map_or(false, |c| c == oid),
        Value::Object(_) | Value::Document(_) => cast_object_id(candidate)
            .ok()
            .and_then(|v| v.as_object_id())
            == Some(oid),
        _ => false,
    }
}

pub(super) fn cast_for_query(
    path: &SchemaPath,
    schema: SchemaId,
    element: &SchemaPath,
    registry: &Arc<SchemaRegistry>,
    operator: Option<&str>,
    value: Value,
) -> OdmResult<Value> {
    match operator {
        Some("$elemMatch") => cast_filter(registry, schema, value, &FilterOptions::default()),
        Some(op) => array::cast_operator(path, element, registry, op, value),
        None => match value {
            Value::Array(items) => items
                .into_iter()
                .map(|item| {
                    if item.as_object().map_or(false, |m| m.contains_key("$elemMatch")) {
                        Ok(item)
                    } else {
                        element.cast_for_query(registry, None, item)
                    }
                })
                .collect::<OdmResult<Vec<_>>>()
                .map(Value::Array),
            v if v.is_nullish() => Ok(v),
            other => element.cast_for_query(registry, None, other),
        },
    }
}
