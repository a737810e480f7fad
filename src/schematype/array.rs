//! Arrays of non-document elements

use std::sync::Arc;

use super::{geo, query, CastOptions, SchemaPath};
use crate::cast::cast_number;
use crate::errors::{CastError, OdmError, OdmResult};
use crate::schema::SchemaRegistry;
use crate::value::Value;

pub(super) fn cast(
    path: &SchemaPath,
    caster: &SchemaPath,
    registry: &Arc<SchemaRegistry>,
    value: Value,
    opts: &CastOptions<'_>,
) -> OdmResult<Value> {
    let items = match value {
        v if v.is_nullish() => return Ok(v),
        Value::Array(items) => items,
        // Single values are wrapped
        other => vec![other],
    };
    if caster.is_mixed() {
        return Ok(Value::Array(items));
    }

    let element_opts = CastOptions {
        prior: None,
        ..*opts
    };
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        if item.is_hole() {
            out.push(Value::Hole);
            continue;
        }
        match caster.apply_setters(registry, item.clone(), &element_opts) {
            Ok(v) => out.push(v),
            Err(err) => return Err(element_error(path, caster, i, &item, err)),
        }
    }
    Ok(Value::Array(out))
}

/// Wraps an element failure in a `CastError` for the whole array. The
/// element error becomes the reason, re-pathed to `<path>.<index>`.
fn element_error(
    path: &SchemaPath,
    caster: &SchemaPath,
    index: usize,
    raw: &Value,
    err: OdmError,
) -> OdmError {
    let (kind, reason) = match err {
        OdmError::Cast(mut inner) => {
            let kind = format!("[{}]", inner.kind());
            inner.set_path(format!("{}.{}", path.path(), index));
            (kind, OdmError::Cast(inner))
        }
        other => (format!("[{}]", caster.instance()), other),
    };
    CastError::new(kind, raw, path.path())
        .with_reason(reason)
        .into()
}

pub(super) fn cast_for_query(
    path: &SchemaPath,
    caster: &SchemaPath,
    registry: &Arc<SchemaRegistry>,
    operator: Option<&str>,
    value: Value,
) -> OdmResult<Value> {
    match operator {
        Some(op) => cast_operator(path, caster, registry, op, value),
        None => cast_plain(path, caster, registry, value),
    }
}

/// Equality against the whole array, or containment of one element.
fn cast_plain(
    path: &SchemaPath,
    caster: &SchemaPath,
    registry: &Arc<SchemaRegistry>,
    value: Value,
) -> OdmResult<Value> {
    match value {
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                if is_elem_match(&item) || item.is_hole() {
                    out.push(item);
                } else {
                    out.push(caster.cast_for_query(registry, None, item)?);
                }
            }
            Ok(Value::Array(out))
        }
        v if v.is_nullish() => Ok(v),
        other => caster.cast_for_query(registry, None, other),
    }
}

fn is_elem_match(value: &Value) -> bool {
    value
        .as_object()
        .map_or(false, |map| map.contains_key("$elemMatch"))
}

/// Operator handlers shared by plain arrays and document arrays.
pub(super) fn cast_operator(
    path: &SchemaPath,
    caster: &SchemaPath,
    registry: &Arc<SchemaRegistry>,
    op: &str,
    value: Value,
) -> OdmResult<Value> {
    match op {
        "$all" => {
            let items = match value {
                Value::Array(items) => items,
                other => vec![other],
            };
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Object(map) if map.contains_key("$elemMatch") => {
                        let mut map = map;
                        if let Some(inner) = map.remove("$elemMatch") {
                            let cast = path.cast_for_query(registry, Some("$elemMatch"), inner)?;
                            map.insert("$elemMatch".to_string(), cast);
                        }
                        out.push(Value::Object(map));
                    }
                    other => out.push(caster.cast_for_query(registry, None, other)?),
                }
            }
            Ok(Value::Array(out))
        }
        "$in" | "$nin" => {
            let items = match value {
                Value::Array(items) => items,
                other => vec![other],
            };
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                // Nested arrays match whole array values
                out.push(cast_plain(path, caster, registry, item)?);
            }
            Ok(Value::Array(out))
        }
        "$elemMatch" => cast_elem_match(path, caster, registry, value),
        "$eq" | "$ne" | "$gt" | "$gte" | "$lt" | "$lte" | "$not" | "$regex" => {
            cast_plain(path, caster, registry, value)
        }
        "$size" | "$minDistance" | "$maxDistance" => cast_number(&value).map_err(|reason| {
            CastError::new("Number", &value, path.path())
                .with_reason(reason)
                .into()
        }),
        "$options" => query::cast_options(path, value),
        "$exists" => query::cast_exists(path, value),
        "$type" => query::cast_type(value),
        "$near" | "$nearSphere" => geo::cast_near(path, value),
        "$geoWithin" | "$within" => geo::cast_within(path, value),
        "$geoIntersects" => geo::cast_intersects(path, value),
        _ => Err(OdmError::operator(format!("Can't use {} with Array.", op))),
    }
}

fn cast_elem_match(
    path: &SchemaPath,
    caster: &SchemaPath,
    registry: &Arc<SchemaRegistry>,
    value: Value,
) -> OdmResult<Value> {
    let map = match value {
        Value::Object(map) => map,
        other => return Ok(other),
    };

    let mut out = crate::value::Map::new();
    for (key, nested) in map {
        let cast = if key == "$not" || key == "$and" || key == "$or" || key == "$nor" {
            match nested {
                Value::Array(items) => Value::Array(
                    items
                        .into_iter()
                        .map(|item| cast_elem_match(path, caster, registry, item))
                        .collect::<OdmResult<Vec<_>>>()?,
                ),
                other => cast_elem_match(path, caster, registry, other)?,
            }
        } else if key.starts_with('$') {
            caster.cast_for_query(registry, Some(&key), nested)?
        } else {
            nested
        };
        out.insert(key, cast);
    }
    Ok(Value::Object(out))
}
