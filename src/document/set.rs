//! Path assignment
//!
//! `set` resolves the target path against the schema: declared paths are
//! cast through their `SchemaPath`, nested prefixes are assigned key by
//! key, paths beneath sub-documents, arrays and maps are delegated, and
//! anything else follows the strict mode.

use std::sync::Arc;

use super::{write_at, Document};
use crate::errors::{CastError, ObjectExpectedError, ObjectParameterError, OdmError, OdmResult};
use crate::errors::StrictModeError;
use crate::observability::{log_event_with_fields, Event};
use crate::schema::{SchemaRegistry, StrictMode};
use crate::schematype::{CastOptions, PathKind, SchemaPath};
use crate::value::{Map, Value};

/// Wraps `value` in objects along `segments`.
fn nest(segments: &[&str], value: Value) -> Value {
    let mut map = Map::new();
    write_at(&mut map, &segments.join("."), value);
    Value::Object(map)
}

/// Holes `place` may add past the end of an array in one assignment.
const MAX_INDEX_GAP: usize = 10_000;

/// Writes `value` at `index`, padding with holes.
fn place(items: &mut Vec<Value>, index: usize, value: Value, path: &str) -> OdmResult<()> {
    if index < items.len() {
        items[index] = value;
        return Ok(());
    }
    if index - items.len() > MAX_INDEX_GAP {
        return Err(CastError::new("Array", &Value::from(index.to_string()), path).into());
    }
    items.resize(index, Value::Hole);
    items.push(value);
    Ok(())
}

impl Document {
    /// Assigns `value` at a dotted path.
    pub fn set(&self, path: &str, value: impl Into<Value>) -> OdmResult<()> {
        let strict = self.strict_mode();
        self.set_path(path, value.into(), strict)
    }

    /// Assigns with an explicit strict mode for unknown paths.
    pub fn set_with_strict(
        &self,
        path: &str,
        value: impl Into<Value>,
        strict: StrictMode,
    ) -> OdmResult<()> {
        self.set_path(path, value.into(), strict)
    }

    /// Assigns every key of an object.
    pub fn set_all(&self, value: Value) -> OdmResult<()> {
        let entries = match value {
            Value::Object(map) => map,
            Value::Document(doc) => doc.to_map(),
            other => return Err(ObjectParameterError::new(&other, "obj", "Document").into()),
        };
        let strict = self.strict_mode();
        for (key, value) in entries {
            self.set_path(&key, value, strict)?;
        }
        Ok(())
    }

    pub(crate) fn set_path(&self, path: &str, value: Value, strict: StrictMode) -> OdmResult<()> {
        let registry = self.registry();
        let schema = registry.schema(self.schema_id());

        if let Some(st) = schema.path(path) {
            return self.set_real(&registry, st, path, value, strict);
        }
        if schema.is_virtual(path) {
            return Ok(());
        }
        if schema.has_nested(path) {
            return self.set_nested(path, value, strict);
        }

        let parts: Vec<&str> = path.split('.').collect();
        for i in (1..parts.len()).rev() {
            let prefix = parts[..i].join(".");
            if let Some(st) = schema.path(&prefix) {
                if st.scalar_type().is_some() {
                    break;
                }
                return self.set_beneath(&registry, st, path, &prefix, &parts[i..], value, strict);
            }
        }
        self.set_unknown(path, value, strict)
    }

    fn set_real(
        &self,
        registry: &Arc<SchemaRegistry>,
        st: &SchemaPath,
        path: &str,
        value: Value,
        strict: StrictMode,
    ) -> OdmResult<()> {
        let current = self.get(path);

        if st.options().immutable && !self.is_new() {
            let held = current
                .clone()
                .or_else(|| self.prior().and_then(|prior| prior.get(path)));
            let unchanged = held.as_ref().map_or(value.is_nullish(), |h| *h == value);
            if !unchanged {
                if strict == StrictMode::Throw {
                    return Err(StrictModeError::immutable(path).into());
                }
                log_event_with_fields(Event::ImmutableDrop, &[("path", path)]);
            }
            if current.is_none() {
                if let Some(held) = held {
                    self.write(path, held);
                }
            }
            return Ok(());
        }

        let raw = value.clone();
        let selected = self.selected();
        let opts = CastOptions {
            doc: Some(self),
            init: false,
            prior: current.as_ref(),
            selected: selected.as_ref(),
        };
        let cast = st
            .apply_setters(registry, value, &opts)
            .map_err(|err| match err {
                OdmError::Cast(_) | OdmError::Validation(_) | OdmError::StrictMode(_) => err,
                other => CastError::new(st.instance(), &raw, path)
                    .with_reason(other)
                    .into(),
            })?;

        let changed = current.as_ref() != Some(&cast);
        self.write(path, cast);
        if changed {
            self.mark_modified(path);
        }
        Ok(())
    }

    fn set_nested(&self, path: &str, value: Value, strict: StrictMode) -> OdmResult<()> {
        let entries = match value {
            Value::Object(map) => map,
            Value::Document(doc) => doc.to_map(),
            v if v.is_nullish() => {
                self.unmark_modified(path);
                self.write(path, v);
                self.mark_modified(path);
                return Ok(());
            }
            other => return Err(ObjectExpectedError::new(path, &other).into()),
        };

        // Assigning a nested object replaces its previous contents
        self.unmark_modified(path);
        self.write(path, Value::object());
        if entries.is_empty() {
            self.mark_modified(path);
        }
        for (key, value) in entries {
            self.set_path(&format!("{}.{}", path, key), value, strict)?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn set_beneath(
        &self,
        registry: &Arc<SchemaRegistry>,
        st: &SchemaPath,
        path: &str,
        prefix: &str,
        rest: &[&str],
        value: Value,
        strict: StrictMode,
    ) -> OdmResult<()> {
        let current = self.get(prefix);

        match st.kind() {
            PathKind::Mixed => {
                let mut holder = current
                    .filter(Value::is_plain_object)
                    .unwrap_or_else(Value::object);
                if let Value::Object(map) = &mut holder {
                    write_at(map, &rest.join("."), value);
                }
                self.write(prefix, holder);
                self.mark_modified(prefix);
                Ok(())
            }
            PathKind::Subdocument(_) => match current {
                Some(Value::Document(child)) => {
                    let child_strict = self.strict_for(child.schema_id());
                    child.set_path(&rest.join("."), value, child_strict)
                }
                _ => self.set_real(registry, st, prefix, nest(rest, value), strict),
            },
            PathKind::DocumentArray { .. } => {
                let Ok(index) = rest[0].parse::<usize>() else {
                    return self.set_unknown(path, value, strict);
                };
                let tail = &rest[1..];
                let mut items = match current {
                    Some(Value::Array(items)) => items,
                    _ => Vec::new(),
                };
                if !tail.is_empty() {
                    if let Some(Value::Document(child)) = items.get(index) {
                        let child_strict = self.strict_for(child.schema_id());
                        return child.set_path(&tail.join("."), value, child_strict);
                    }
                }
                let element = if tail.is_empty() { value } else { nest(tail, value) };
                place(&mut items, index, element, path)?;
                self.set_real(registry, st, prefix, Value::Array(items), strict)
            }
            PathKind::Array(_) => {
                let index = match rest {
                    [single] => single.parse::<usize>().ok(),
                    _ => None,
                };
                let Some(index) = index else {
                    return self.set_unknown(path, value, strict);
                };
                let mut items = match current {
                    Some(Value::Array(items)) => items,
                    _ => Vec::new(),
                };
                place(&mut items, index, value, path)?;
                self.set_real(registry, st, prefix, Value::Array(items), strict)
            }
            PathKind::Map(_) => {
                let key = rest[0];
                let tail = &rest[1..];
                let mut entries = match current {
                    Some(Value::Object(map)) => map,
                    _ => Map::new(),
                };
                if !tail.is_empty() {
                    if let Some(Value::Document(child)) = entries.get(key) {
                        let child_strict = self.strict_for(child.schema_id());
                        return child.set_path(&tail.join("."), value, child_strict);
                    }
                }
                let entry = match (tail.is_empty(), entries.remove(key)) {
                    (true, _) => value,
                    (false, Some(Value::Object(mut existing))) => {
                        write_at(&mut existing, &tail.join("."), value);
                        Value::Object(existing)
                    }
                    (false, _) => nest(tail, value),
                };
                entries.insert(key.to_string(), entry);
                self.set_real(registry, st, prefix, Value::Object(entries), strict)
            }
            PathKind::Scalar(_) => self.set_unknown(path, value, strict),
        }
    }

    fn set_unknown(&self, path: &str, value: Value, strict: StrictMode) -> OdmResult<()> {
        match strict {
            StrictMode::Allow => {
                self.write(path, value);
                self.mark_modified(path);
                Ok(())
            }
            StrictMode::Drop => {
                log_event_with_fields(Event::StrictDrop, &[("path", path)]);
                Ok(())
            }
            StrictMode::Throw => Err(StrictModeError::new(path).into()),
        }
    }
}
