//! Query filter casting
//!
//! Walks a filter document against a schema. Field conditions are cast
//! through the path's `cast_for_query`; logical operators recurse;
//! unknown fields follow `strictQuery`.

use std::sync::Arc;

use super::embedded::embedded_discriminator_path;
use super::strict::{effective_strict, StrictScope};
use crate::cast::{cast_boolean, cast_string};
use crate::errors::{CastError, ObjectParameterError, OdmError, OdmResult, StrictModeError};
use crate::observability::{log_event_with_fields, Event};
use crate::schema::{discriminator_value_string, PathMatch, PathType, SchemaId, SchemaRegistry, StrictMode};
use crate::schematype::SchemaPath;
use crate::value::{Map, Value};

/// Options for `cast_filter`.
#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    /// Overrides the schema's `strict`; consulted for upserts
    pub strict: Option<StrictMode>,
    /// Overrides the schema's `strictQuery`
    pub strict_query: Option<StrictMode>,
    /// The filter seeds an upserted document
    pub upsert: bool,
}

fn is_operator(key: &str) -> bool {
    key.starts_with('$')
}

/// Casts a query filter against `schema`.
///
/// A filter naming a discriminator value in the schema's discriminator key
/// is cast against that discriminator.
pub fn cast_filter(
    registry: &Arc<SchemaRegistry>,
    schema: SchemaId,
    filter: Value,
    opts: &FilterOptions,
) -> OdmResult<Value> {
    let map = match filter {
        v if v.is_nullish() => return Ok(v),
        Value::Object(map) => map,
        Value::Document(doc) => doc.to_map(),
        array @ Value::Array(_) => {
            return Err(OdmError::message(format!(
                "Query filter must be an object, got an array {}",
                array
            )))
        }
        other => return Err(ObjectParameterError::new(&other, "filter", "find").into()),
    };

    let schema = narrow_discriminator(registry, schema, &map);
    FilterWalker {
        registry,
        schema,
        opts,
    }
    .walk(map)
    .map(Value::Object)
}

/// The discriminator a filter or update selects through the key field.
pub(crate) fn narrow_discriminator(
    registry: &SchemaRegistry,
    schema: SchemaId,
    map: &Map,
) -> SchemaId {
    let current = registry.schema(schema);
    if current.discriminators().is_empty() {
        return schema;
    }
    map.get(current.discriminator_key())
        .and_then(discriminator_value_string)
        .and_then(|value| registry.discriminator_by_value(schema, &value))
        .unwrap_or(schema)
}

struct FilterWalker<'a> {
    registry: &'a Arc<SchemaRegistry>,
    schema: SchemaId,
    opts: &'a FilterOptions,
}

impl FilterWalker<'_> {
    fn walk(&self, map: Map) -> OdmResult<Map> {
        let context = map.clone();
        let mut out = Map::new();

        for (path, value) in map {
            match path.as_str() {
                "$and" | "$or" | "$nor" => {
                    let clauses = match value {
                        Value::Array(clauses) => clauses,
                        other => return Err(CastError::new("Array", &other, path).into()),
                    };
                    let mut cast = Vec::with_capacity(clauses.len());
                    for (i, clause) in clauses.into_iter().enumerate() {
                        let clause = match clause {
                            Value::Object(inner) => inner,
                            Value::Document(doc) => doc.to_map(),
                            other => {
                                return Err(
                                    CastError::new("Object", &other, format!("{}.{}", path, i)).into()
                                )
                            }
                        };
                        cast.push(Value::Object(self.walk(clause)?));
                    }
                    out.insert(path, Value::Array(cast));
                }
                "$where" => {
                    if !value.is_string() {
                        return Err(OdmError::message("Must have a string or function for $where"));
                    }
                    out.insert(path, value);
                }
                "$expr" => {
                    if !value.is_plain_object() {
                        return Err(OdmError::message("`$expr` must be an object"));
                    }
                    out.insert(path, value);
                }
                "$comment" => {
                    out.insert(path, value);
                }
                "$text" => {
                    let cast = cast_text_search(value)?;
                    out.insert(path, cast);
                }
                "$elemMatch" => {
                    let cast = match value {
                        Value::Object(inner) => Value::Object(self.walk(inner)?),
                        other => other,
                    };
                    out.insert(path, cast);
                }
                _ => {
                    if let Some(cast) = self.cast_path(&path, value, &context)? {
                        out.insert(path, cast);
                    }
                }
            }
        }
        Ok(out)
    }

    /// Casts one field condition. `None` drops the field.
    fn cast_path(&self, path: &str, value: Value, context: &Map) -> OdmResult<Option<Value>> {
        let registry = self.registry.as_ref();
        let schema = registry.schema(self.schema);

        let found = schema
            .path(path)
            .map(|st| PathMatch {
                schema_type: st,
                owner: self.schema,
                under_document_array: false,
            })
            .or_else(|| {
                embedded_discriminator_path(registry, self.schema, path, Some(context), None)
            })
            .or_else(|| registry.search(self.schema, path));

        if let Some(found) = found {
            return cast_condition(self.registry, found.schema_type, value).map(Some);
        }

        // Declared only by discriminators of a document array element
        let candidates = registry.search_types(self.schema, path, None);
        if !candidates.is_empty() {
            return cast_first_match(self.registry, &candidates, value).map(Some);
        }

        let info = registry.path_type(self.schema, path);
        match info.kind {
            PathType::Nested => return self.cast_nested(path, value).map(Some),
            PathType::Mixed => return Ok(Some(value)),
            _ => {}
        }

        self.unknown_path(path, value, info.owner)
    }

    /// `{ address: { city: .. } }` against a nested prefix: each key is cast
    /// as `address.<key>`. Operator objects pass through.
    fn cast_nested(&self, path: &str, value: Value) -> OdmResult<Value> {
        let map = match value {
            Value::Object(map) => map,
            other => return Ok(other),
        };
        if map.keys().any(|k| is_operator(k)) {
            return Ok(Value::Object(map));
        }

        let mut out = Map::new();
        for (key, nested) in map {
            let full = format!("{}.{}", path, key);
            if let Some(cast) = self.cast_path(&full, nested, &Map::new())? {
                out.insert(key, cast);
            }
        }
        Ok(Value::Object(out))
    }

    fn unknown_path(&self, path: &str, value: Value, owner: SchemaId) -> OdmResult<Option<Value>> {
        let registry = self.registry.as_ref();
        if registry.schema(self.schema).is_virtual(path) {
            return Ok(Some(value));
        }

        if self.opts.upsert {
            let strict =
                effective_strict(registry, self.schema, owner, StrictScope::Write, self.opts.strict);
            match strict {
                StrictMode::Throw => return Err(StrictModeError::new(path).into()),
                StrictMode::Drop => {
                    log_event_with_fields(Event::StrictDrop, &[("path", path), ("in", "filter")]);
                    return Ok(None);
                }
                StrictMode::Allow => {}
            }
        }

        let strict_query = effective_strict(
            registry,
            self.schema,
            owner,
            StrictScope::Query,
            self.opts.strict_query,
        );
        match strict_query {
            StrictMode::Throw => Err(StrictModeError::with_message(
                path,
                format!(
                    "Path \"{}\" is not in schema and strictQuery is 'throw'.",
                    path
                ),
            )
            .into()),
            StrictMode::Drop => {
                log_event_with_fields(Event::StrictDrop, &[("path", path), ("in", "filter")]);
                Ok(None)
            }
            StrictMode::Allow => Ok(Some(value)),
        }
    }
}

/// Casts against each candidate in turn and keeps the first success. When
/// every candidate fails, the first failure is returned.
fn cast_first_match(
    registry: &Arc<SchemaRegistry>,
    candidates: &[PathMatch<'_>],
    value: Value,
) -> OdmResult<Value> {
    let mut first_err = None;
    for candidate in candidates {
        match cast_condition(registry, candidate.schema_type, value.clone()) {
            Ok(cast) => return Ok(cast),
            Err(err) => {
                first_err.get_or_insert(err);
            }
        }
    }
    match first_err {
        Some(err) => Err(err),
        None => Ok(value),
    }
}

/// Casts the condition on one declared path.
///
/// Operator objects cast each operand; `$not` may hold a nested operator
/// object. Arrays against non-array paths become `$in`.
pub(crate) fn cast_condition(
    registry: &Arc<SchemaRegistry>,
    st: &SchemaPath,
    value: Value,
) -> OdmResult<Value> {
    match value {
        v if v.is_nullish() => Ok(v),
        Value::Object(map) if map.keys().any(|k| is_operator(k)) => {
            let mut out = Map::new();
            for (op, nested) in map {
                let cast = match (op.as_str(), nested) {
                    ("$not", Value::Object(inner))
                        if !st.has_caster() && inner.keys().next().map_or(false, |k| is_operator(k)) =>
                    {
                        let mut cast_inner = Map::new();
                        for (inner_op, operand) in inner {
                            let cast = st.cast_for_query(registry, Some(inner_op.as_str()), operand)?;
                            cast_inner.insert(inner_op, cast);
                        }
                        Value::Object(cast_inner)
                    }
                    (op, nested) => st.cast_for_query(registry, Some(op), nested)?,
                };
                out.insert(op, cast);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) if !st.is_array() && st.instance() != "Buffer" => {
            let cast = items
                .into_iter()
                .map(|item| st.cast_for_query(registry, None, item))
                .collect::<OdmResult<Vec<_>>>()?;
            let mut wrapped = Map::new();
            wrapped.insert("$in".to_string(), Value::Array(cast));
            Ok(Value::Object(wrapped))
        }
        other => st.cast_for_query(registry, None, other),
    }
}

/// `$text: { $search, $language, $caseSensitive, $diacriticSensitive }`
fn cast_text_search(value: Value) -> OdmResult<Value> {
    let map = match value {
        Value::Object(map) => map,
        other => return Err(CastError::new("$text", &other, "$text").into()),
    };

    let mut out = Map::new();
    for (key, operand) in map {
        let cast = match key.as_str() {
            "$search" | "$language" => cast_string(&operand),
            "$caseSensitive" | "$diacriticSensitive" => cast_boolean(&operand),
            _ => Ok(operand.clone()),
        }
        .map_err(|reason| {
            OdmError::from(
                CastError::new("$text", &operand, format!("$text.{}", key)).with_reason(reason),
            )
        })?;
        out.insert(key, cast);
    }
    Ok(Value::Object(out))
}
