//! Update casting
//!
//! Casts an update document (`{ $set: .., $push: .., name: .. }`) against
//! a schema. Plain keys are folded into `$set`, each operator's operands
//! are cast for the path they target, and operators left empty are
//! removed.
//!
//! # Operator handling
//!
//! - `$set`, `$setOnInsert`: cast like an assignment
//! - `$push`, `$addToSet`: cast one element, or each element of `$each`
//! - `$inc`, `$pop`: cast to a number whatever the path type
//! - `$pull`: cast as a query condition on the elements
//! - `$unset`, `$rename`: passed through

use std::sync::Arc;

use super::embedded::embedded_discriminator_path;
use super::filter::{cast_condition, cast_filter, narrow_discriminator, FilterOptions};
use super::strict::{effective_strict, StrictScope};
use crate::cast::{cast_boolean, cast_number};
use crate::errors::{CastError, ObjectParameterError, OdmError, OdmResult, StrictModeError, ValidationError};
use crate::observability::{log_event_with_fields, Event};
use crate::schema::{
    discriminator_value_string, PathMatch, PathType, Schema, SchemaId, SchemaRegistry, StrictMode,
};
use crate::schematype::{CastOptions, SchemaPath};
use crate::value::{map_to_bson, Map, Value};

/// Options for `cast_update`.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Treat an update without operators as a replacement document
    pub overwrite: bool,
    /// The update may insert; immutable `$set` entries move to `$setOnInsert`
    pub upsert: bool,
    /// Overrides the schema's `strict`
    pub strict: Option<StrictMode>,
    /// Collect every cast failure into one `ValidationError`. Falls back to
    /// the registry configuration.
    pub multiple_cast_error: Option<bool>,
    /// Allow changing the discriminator key
    pub overwrite_discriminator_key: bool,
}

/// A cast update document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CastUpdate {
    pub update: Map,
    /// False when no operator has anything to apply
    pub has_keys: bool,
}

impl CastUpdate {
    pub fn is_noop(&self) -> bool {
        !self.has_keys
    }

    pub fn to_bson(&self) -> bson::Document {
        map_to_bson(self.update.clone())
    }
}

fn is_cast_op(op: &str) -> bool {
    matches!(op, "$push" | "$addToSet" | "$set" | "$setOnInsert")
}

fn is_number_op(op: &str) -> bool {
    matches!(op, "$pop" | "$inc")
}

fn is_overwrite_op(op: &str) -> bool {
    matches!(op, "$set" | "$setOnInsert")
}

/// Casts `update` against `schema`.
///
/// `filter` is the query the update is paired with. It selects the
/// discriminator to cast against and supplies embedded discriminator
/// values.
pub fn cast_update(
    registry: &Arc<SchemaRegistry>,
    schema: SchemaId,
    update: Value,
    opts: &UpdateOptions,
    filter: Option<&Value>,
) -> OdmResult<CastUpdate> {
    let mut map = match update {
        v if v.is_nullish() => return Ok(CastUpdate::default()),
        Value::Object(map) => map,
        Value::Document(doc) => doc.to_map(),
        other => return Err(ObjectParameterError::new(&other, "update", "cast_update").into()),
    };
    let filter = filter.and_then(Value::as_object).cloned().unwrap_or_default();
    let schema = select_schema(registry, schema, &map, &filter, opts);

    if opts.upsert && !opts.overwrite {
        move_immutable(registry.schema(schema), &mut map);
    }

    let mut walker = UpdateWalker {
        registry,
        schema,
        opts,
        filter: &filter,
        multiple: opts
            .multiple_cast_error
            .unwrap_or(registry.config().multiple_cast_error),
        failures: None,
    };

    let replacement = opts.overwrite && !map.keys().any(|k| k.starts_with('$'));
    let mut out = Map::new();
    if replacement {
        let top = map.clone();
        out = walker.walk(map, "$set", "", &top)?;
    } else {
        for (op, value) in normalize(map)? {
            let entries = match value {
                Value::Object(entries) => entries,
                Value::Document(doc) => doc.to_map(),
                other => {
                    return Err(OdmError::message(format!(
                        "Invalid atomic update value for {}. Expected an object, received {}",
                        op,
                        other.type_name()
                    )))
                }
            };
            let top = entries.clone();
            let cast = walker.walk(entries, &op, "", &top)?;
            if !cast.is_empty() {
                out.insert(op, Value::Object(cast));
            }
        }
    }

    if let Some(failures) = walker.failures.take() {
        return Err(failures.into());
    }

    let has_keys = !out.is_empty();
    if !has_keys {
        let schema_index = schema.index().to_string();
        log_event_with_fields(Event::UpdateNoop, &[("schema", &schema_index)]);
    }
    Ok(CastUpdate {
        update: out,
        has_keys,
    })
}

/// Folds plain keys into `$set`. Plain keys win over the same key in an
/// explicit `$set`.
fn normalize(map: Map) -> OdmResult<Map> {
    let mut sugar = Map::new();
    let mut ops = Map::new();
    for (key, value) in map {
        if key.starts_with('$') {
            ops.insert(key, value);
        } else {
            sugar.insert(key, value);
        }
    }
    if sugar.is_empty() {
        return Ok(ops);
    }

    match ops.remove("$set") {
        Some(Value::Object(explicit)) => {
            for (key, value) in explicit {
                if !sugar.contains_key(&key) {
                    sugar.insert(key, value);
                }
            }
        }
        Some(other) if !other.is_nullish() => {
            return Err(OdmError::message(format!(
                "Invalid atomic update value for $set. Expected an object, received {}",
                other.type_name()
            )))
        }
        _ => {}
    }

    let mut out = Map::new();
    out.insert("$set".to_string(), Value::Object(sugar));
    for (key, value) in ops {
        out.insert(key, value);
    }
    Ok(out)
}

/// The discriminator to cast against: named by the filter, or by the
/// update itself when the key may be overwritten.
fn select_schema(
    registry: &SchemaRegistry,
    schema: SchemaId,
    update: &Map,
    filter: &Map,
    opts: &UpdateOptions,
) -> SchemaId {
    let narrowed = narrow_discriminator(registry, schema, filter);
    if narrowed != schema || !opts.overwrite_discriminator_key {
        return narrowed;
    }

    let from_update = narrow_discriminator(registry, schema, update);
    if from_update != schema {
        return from_update;
    }
    update
        .get("$set")
        .and_then(Value::as_object)
        .map_or(schema, |set| narrow_discriminator(registry, schema, set))
}

/// Moves `$set` and plain entries for immutable paths into `$setOnInsert`.
fn move_immutable(schema: &Schema, map: &mut Map) {
    let is_immutable = |path: &str| schema.path(path).map_or(false, |st| st.options().immutable);

    let mut moved = Map::new();
    let plain: Vec<String> = map
        .keys()
        .filter(|k| !k.starts_with('$') && is_immutable(k))
        .cloned()
        .collect();
    for key in plain {
        if let Some(value) = map.remove(&key) {
            moved.insert(key, value);
        }
    }

    if let Some(set) = map.get_mut("$set").and_then(Value::as_object_mut) {
        let keys: Vec<String> = set.keys().filter(|k| is_immutable(k)).cloned().collect();
        for key in keys {
            if let Some(value) = set.remove(&key) {
                moved.insert(key, value);
            }
        }
    }

    if moved.is_empty() {
        return;
    }
    let entry = map
        .entry("$setOnInsert".to_string())
        .or_insert_with(Value::object);
    if !entry.is_plain_object() {
        *entry = Value::object();
    }
    if let Some(on_insert) = entry.as_object_mut() {
        for (key, value) in moved {
            on_insert.insert(key, value);
        }
    }
}

struct UpdateWalker<'a> {
    registry: &'a Arc<SchemaRegistry>,
    schema: SchemaId,
    opts: &'a UpdateOptions,
    filter: &'a Map,
    multiple: bool,
    failures: Option<ValidationError>,
}

impl<'a> UpdateWalker<'a> {
    /// Records a failure, or returns it when failures are not collected.
    fn fail(&mut self, path: &str, err: OdmError) -> OdmResult<()> {
        if !self.multiple {
            return Err(err);
        }
        self.failures
            .get_or_insert_with(ValidationError::new)
            .add_error(path, err);
        Ok(())
    }

    fn lookup(&self, path: &str, top: &Map) -> Option<PathMatch<'a>> {
        let registry: &'a SchemaRegistry = self.registry;
        registry.search(self.schema, path).or_else(|| {
            embedded_discriminator_path(registry, self.schema, path, Some(self.filter), Some(top))
        })
    }

    /// True when the entry is dropped because the path is immutable.
    fn drop_immutable(
        &self,
        st: Option<&SchemaPath>,
        path: &str,
        strict: StrictMode,
    ) -> OdmResult<bool> {
        if !st.map_or(false, |st| st.options().immutable) {
            return Ok(false);
        }
        if strict == StrictMode::Throw {
            return Err(StrictModeError::immutable(path).into());
        }
        log_event_with_fields(Event::ImmutableDrop, &[("path", path), ("in", "update")]);
        Ok(true)
    }

    fn walk(&mut self, obj: Map, op: &str, prefix: &str, top: &Map) -> OdmResult<Map> {
        let registry: &'a SchemaRegistry = self.registry;
        let schema = registry.schema(self.schema);
        let strict = self.opts.strict.unwrap_or_else(|| schema.strict());
        let mut out = Map::new();

        for (key, val) in obj {
            let full = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", prefix, key)
            };

            if op == "$pull" {
                if let Some(found) = self.lookup(&full, top) {
                    let st = found.schema_type;
                    let result = match st.schema_id() {
                        Some(child) if val.is_plain_object() => {
                            let filter_opts = FilterOptions {
                                strict: self.opts.strict,
                                ..FilterOptions::default()
                            };
                            cast_filter(self.registry, child, val, &filter_opts)
                        }
                        _ => cast_condition(self.registry, st, val),
                    };
                    match result {
                        Ok(cast) => {
                            out.insert(key, cast);
                        }
                        Err(err) => self.fail(&full, err)?,
                    }
                    continue;
                }
            }

            if let Some(mapping) = schema.discriminator_mapping() {
                if full == mapping.key
                    && !self.opts.overwrite_discriminator_key
                    && discriminator_value_string(&val) != mapping.value
                {
                    match strict {
                        StrictMode::Throw => {
                            let err = OdmError::message(format!(
                                "Can't modify discriminator key \"{}\" on discriminator model",
                                full
                            ));
                            self.fail(&full, err)?;
                            continue;
                        }
                        StrictMode::Drop => {
                            log_event_with_fields(
                                Event::StrictDrop,
                                &[("path", &full), ("in", "update")],
                            );
                            continue;
                        }
                        StrictMode::Allow => {}
                    }
                }
            }

            match val {
                Value::Object(inner) => {
                    if let Some(cast) = self.walk_object(key.as_str(), &full, inner, op, strict, top)? {
                        out.insert(key, cast);
                    }
                }
                other => {
                    if let Some(cast) = self.walk_leaf(key.as_str(), prefix, &full, other, op, strict, top)? {
                        out.insert(key, cast);
                    }
                }
            }
        }
        Ok(out)
    }

    /// Object operand: a modifier (`$each`), a sub-document, or a nested
    /// prefix to walk into.
    fn walk_object(
        &mut self,
        key: &str,
        full: &str,
        inner: Map,
        op: &str,
        strict: StrictMode,
        top: &Map,
    ) -> OdmResult<Option<Value>> {
        let registry: &'a SchemaRegistry = self.registry;
        let st = self.lookup(full, top).map(|found| found.schema_type);
        if op != "$setOnInsert" && self.drop_immutable(st, full, strict)? {
            return Ok(None);
        }

        match st {
            Some(st) if st.has_caster() && is_cast_op(op) => {
                if inner.contains_key("$each") {
                    return self.cast_each(st, key, full, inner, op);
                }
                let result = if st.is_single_nested() {
                    st.cast_for_query(self.registry, None, Value::Object(inner))
                } else {
                    self.cast_value(Some(st), Value::Object(inner), op, key, full)
                };
                self.keep(full, result)
            }
            st if op == "$currentDate" || (is_cast_op(op) && st.is_some()) => {
                let result = self.cast_value(st, Value::Object(inner), op, key, full);
                self.keep(full, result)
            }
            _ => {
                let info = registry.path_type(self.schema, full);
                if info.kind == PathType::Undefined {
                    let mode = effective_strict(
                        registry,
                        self.schema,
                        info.owner,
                        StrictScope::Write,
                        self.opts.strict,
                    );
                    match mode {
                        StrictMode::Throw => return Err(StrictModeError::new(full).into()),
                        StrictMode::Drop => {
                            log_event_with_fields(Event::StrictDrop, &[("path", full), ("in", "update")]);
                            return Ok(None);
                        }
                        StrictMode::Allow => {}
                    }
                }

                // An explicitly empty object is kept; one emptied by drops is not
                let was_empty = inner.is_empty();
                let nested = self.walk(inner, op, full, top)?;
                if nested.is_empty() && !was_empty {
                    return Ok(None);
                }
                Ok(Some(Value::Object(nested)))
            }
        }
    }

    /// `{ $each, $slice, $sort, $position }` for `$push` and `$addToSet`.
    fn cast_each(
        &mut self,
        st: &SchemaPath,
        key: &str,
        full: &str,
        mut inner: Map,
        op: &str,
    ) -> OdmResult<Option<Value>> {
        let mut modifier = Map::new();
        let each = inner.remove("$each").unwrap_or_else(Value::undefined);
        match self.cast_value(Some(st), each, op, key, full) {
            Ok(cast) => {
                modifier.insert("$each".to_string(), cast);
            }
            Err(err) => {
                self.fail(full, err)?;
                return Ok(None);
            }
        }

        if let Some(slice) = inner.get("$slice").filter(|v| !v.is_nullish()) {
            let n = cast_number(slice)
                .ok()
                .and_then(|v| v.as_f64())
                .map_or(0, |n| n.trunc() as i32);
            modifier.insert("$slice".to_string(), Value::from(n));
        }
        if let Some(sort) = inner.get("$sort").filter(|v| !v.is_nullish()) {
            modifier.insert("$sort".to_string(), sort.clone());
        }
        if let Some(position) = inner.get("$position").filter(|v| !v.is_nullish()) {
            match cast_number(position) {
                Ok(cast) => {
                    modifier.insert("$position".to_string(), cast);
                }
                Err(reason) => {
                    let err = CastError::new("Number", position, format!("{}.$position", full))
                        .with_reason(reason);
                    self.fail(full, err.into())?;
                }
            }
        }
        Ok(Some(Value::Object(modifier)))
    }

    /// Non-object operand.
    #[allow(clippy::too_many_arguments)]
    fn walk_leaf(
        &mut self,
        key: &str,
        prefix: &str,
        full: &str,
        val: Value,
        op: &str,
        strict: StrictMode,
        top: &Map,
    ) -> OdmResult<Option<Value>> {
        let registry: &'a SchemaRegistry = self.registry;
        let check_path = match key {
            "$each" | "$or" | "$and" | "$in" => prefix,
            _ => full,
        };
        let st = self.lookup(check_path, top).map(|found| found.schema_type);
        if op != "$setOnInsert" && self.drop_immutable(st, full, strict)? {
            return Ok(None);
        }

        let info = registry.path_type(self.schema, check_path);
        let mode = effective_strict(
            registry,
            self.schema,
            info.owner,
            StrictScope::Write,
            self.opts.strict,
        );
        let known = st.is_some() || matches!(info.kind, PathType::Real | PathType::Nested);
        if mode != StrictMode::Allow && !known {
            if mode == StrictMode::Throw && !registry.schema(self.schema).is_virtual(check_path) {
                return Err(StrictModeError::new(full).into());
            }
            log_event_with_fields(Event::StrictDrop, &[("path", full), ("in", "update")]);
            return Ok(None);
        }

        if op == "$rename" {
            return Ok(Some(val));
        }

        let result = self.cast_value(st, val, op, key, full).map(|cast| match (cast, st) {
            (Value::Array(items), Some(st))
                if matches!(op, "$push" | "$addToSet")
                    && key != "$each"
                    && st.caster().map_or(false, |c| !c.is_array()) =>
            {
                let mut each = Map::new();
                each.insert("$each".to_string(), Value::Array(items));
                Value::Object(each)
            }
            (cast, _) => cast,
        });
        self.keep(full, result)
    }

    /// Drops undefined results and routes failures through `fail`.
    fn keep(&mut self, full: &str, result: OdmResult<Value>) -> OdmResult<Option<Value>> {
        match result {
            Ok(cast) if cast.is_undefined() => Ok(None),
            Ok(cast) => Ok(Some(cast)),
            Err(err) => {
                self.fail(full, err)?;
                Ok(None)
            }
        }
    }

    /// Casts one operand for `op`.
    ///
    /// `$push` and `$addToSet` wrap the operand to the path's array depth,
    /// cast it with the array path, then unwrap, so a single element comes
    /// back as a single element.
    fn cast_value(
        &self,
        st: Option<&SchemaPath>,
        val: Value,
        op: &str,
        conditional: &str,
        path: &str,
    ) -> OdmResult<Value> {
        let Some(st) = st else {
            if is_number_op(op) {
                return cast_number(&val).map_err(|reason| {
                    CastError::new("number", &val, path)
                        .with_reason(reason)
                        .into()
                });
            }
            return Ok(val);
        };

        let structured = val.is_plain_object() || val.is_array();
        if st.is_array() && structured && matches!(op, "$push" | "$addToSet") {
            let schema_depth = st.array_depth();
            let mut value_depth = 0;
            let mut innermost = &val;
            while let Value::Array(items) = innermost {
                value_depth += 1;
                match items.first() {
                    Some(first) => innermost = first,
                    None => break,
                }
            }

            let additional = schema_depth.saturating_sub(value_depth);
            let mut wrapped = val;
            for _ in 0..additional {
                wrapped = Value::Array(vec![wrapped]);
            }
            if !wrapped.is_array() {
                wrapped = Value::Array(vec![wrapped]);
            }

            let mut cast = st.apply_setters(self.registry, wrapped, &CastOptions::default())?;
            for _ in 0..additional {
                cast = match cast {
                    Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
                    other => other,
                };
            }
            return Ok(cast);
        }

        if op == "$unset" {
            return Ok(val);
        }
        if is_number_op(op) {
            if val.is_nullish() {
                return Err(CastError::new("number", &val, st.path()).into());
            }
            return cast_number(&val).map_err(|reason| {
                CastError::new("number", &val, st.path())
                    .with_reason(reason)
                    .into()
            });
        }
        if op == "$currentDate" {
            if let Value::Object(current) = &val {
                let mut out = Map::new();
                out.insert(
                    "$type".to_string(),
                    current.get("$type").cloned().unwrap_or_else(Value::undefined),
                );
                return Ok(Value::Object(out));
            }
            return cast_boolean(&val).map_err(|reason| {
                CastError::new("Boolean", &val, path)
                    .with_reason(reason)
                    .into()
            });
        }
        if conditional.starts_with('$') {
            return st.cast_for_query(self.registry, Some(conditional), val);
        }
        if is_overwrite_op(op) && ((!val.is_nullish() && st.is_array()) || st.is_mixed()) {
            return st.apply_setters(self.registry, val, &CastOptions::default());
        }
        st.cast_for_query(self.registry, None, val)
    }
}
