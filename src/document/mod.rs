//! Document instances
//!
//! A `Document` is a cast, schema-bound value with identity. It records
//! which paths were modified since it was built or loaded, whether it is
//! new, and which projection it was loaded with. Sub-documents are
//! themselves `Document`s stored inside the parent's fields.
//!
//! # Design Principles
//!
//! - Shared handle (`Rc<RefCell<..>>`), cheap to clone, compared by identity
//! - No borrow is held while casting or running user setters and defaults
//! - Parents see child modifications by walking their children

mod projection;
mod set;

pub use projection::Projection;

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use bson::Bson;
use linked_hash_map::LinkedHashMap;

use crate::caster::{effective_strict, StrictScope};
use crate::errors::{ObjectParameterError, OdmError, OdmResult, ValidationError};
use crate::observability::{log_event_with_fields, Event};
use crate::schema::{SchemaId, SchemaRegistry, StrictMode};
use crate::schematype::CastOptions;
use crate::value::{map_to_bson, Map, Value};

/// Construction options for `Document::build`.
#[derive(Debug, Clone)]
pub struct DocumentOptions {
    /// Projection the document is restricted to
    pub selected: Option<Projection>,
    /// Overrides the schema's `strict` for this document
    pub strict: Option<StrictMode>,
    /// Top-level schema whose `strict` governs this document. Defaults to
    /// the document's own schema.
    pub root: Option<SchemaId>,
    /// Instance being replaced; immutable paths keep its values
    pub prior: Option<Document>,
    pub is_new: bool,
    pub apply_defaults: bool,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            selected: None,
            strict: None,
            root: None,
            prior: None,
            is_new: true,
            apply_defaults: true,
        }
    }
}

struct DocumentState {
    registry: Arc<SchemaRegistry>,
    schema: SchemaId,
    fields: Map,
    is_new: bool,
    modified: BTreeSet<String>,
    /// Cast failures recorded while hydrating; reported by `validate`
    invalid: LinkedHashMap<String, OdmError>,
    selected: Option<Projection>,
    strict: Option<StrictMode>,
    root: SchemaId,
    prior: Option<Document>,
}

/// Shared handle to a document instance.
#[derive(Clone)]
pub struct Document(Rc<RefCell<DocumentState>>);

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.borrow();
        f.debug_struct("Document")
            .field("schema", &state.schema)
            .field("is_new", &state.is_new)
            .field("fields", &state.fields)
            .field("modified", &state.modified)
            .finish()
    }
}

fn object_parameter(value: Value) -> OdmResult<Map> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Document(doc) => Ok(doc.to_map()),
        v if v.is_nullish() => Ok(Map::new()),
        other => Err(ObjectParameterError::new(&other, "obj", "Document").into()),
    }
}

impl Document {
    fn empty(registry: &Arc<SchemaRegistry>, schema: SchemaId, options: &DocumentOptions) -> Self {
        Document(Rc::new(RefCell::new(DocumentState {
            registry: Arc::clone(registry),
            schema,
            fields: Map::new(),
            is_new: options.is_new,
            modified: BTreeSet::new(),
            invalid: LinkedHashMap::new(),
            selected: options.selected.clone(),
            strict: options.strict,
            root: options.root.unwrap_or(schema),
            prior: options.prior.clone(),
        })))
    }

    /// Builds a new document from raw input.
    pub fn new(
        registry: &Arc<SchemaRegistry>,
        schema: SchemaId,
        value: impl Into<Value>,
    ) -> OdmResult<Self> {
        Self::build(registry, schema, value.into(), DocumentOptions::default())
    }

    /// Builds a document: every key is set under the effective strict mode,
    /// then defaults fill the selected paths that are still unset.
    pub fn build(
        registry: &Arc<SchemaRegistry>,
        schema: SchemaId,
        value: Value,
        options: DocumentOptions,
    ) -> OdmResult<Self> {
        let raw = object_parameter(value)?;
        let doc = Self::empty(registry, schema, &options);
        doc.set_all(Value::Object(raw))?;
        if options.apply_defaults {
            doc.apply_defaults()?;
        }
        Ok(doc)
    }

    /// Loads a persisted document. Known paths are cast as trusted data,
    /// unknown keys are kept as stored, nothing is marked modified.
    pub fn hydrate(
        registry: &Arc<SchemaRegistry>,
        schema: SchemaId,
        raw: Value,
        selected: Option<Projection>,
    ) -> OdmResult<Self> {
        let options = DocumentOptions {
            selected,
            ..DocumentOptions::default()
        };
        Self::hydrate_with(registry, schema, raw, options)
    }

    /// `hydrate` with construction options; `is_new` is always false.
    pub(crate) fn hydrate_with(
        registry: &Arc<SchemaRegistry>,
        schema: SchemaId,
        raw: Value,
        options: DocumentOptions,
    ) -> OdmResult<Self> {
        let raw = object_parameter(raw)?;
        let options = DocumentOptions {
            is_new: false,
            ..options
        };
        let doc = Self::empty(registry, schema, &options);
        doc.init(raw)?;
        doc.apply_defaults()?;
        Ok(doc)
    }

    /// Replaces the document's contents with persisted data.
    pub(crate) fn init(&self, raw: Map) -> OdmResult<()> {
        {
            let mut state = self.0.borrow_mut();
            state.fields = Map::new();
            state.modified.clear();
            state.invalid.clear();
            state.is_new = false;
        }
        self.init_object("", raw);
        Ok(())
    }

    fn init_object(&self, prefix: &str, raw: Map) {
        let registry = self.registry();
        let schema = registry.schema(self.schema_id());
        let selected = self.selected();

        for (key, value) in raw {
            let full = format!("{}{}", prefix, key);
            if let Some(st) = schema.path(&full) {
                let opts = CastOptions {
                    doc: Some(self),
                    init: true,
                    prior: None,
                    selected: selected.as_ref(),
                };
                match st.cast(&registry, value.clone(), &opts) {
                    Ok(cast) => self.write(&full, cast),
                    Err(err) => {
                        let detail = err.to_string();
                        log_event_with_fields(
                            Event::CastRejected,
                            &[("path", &full), ("error", &detail)],
                        );
                        self.write(&full, value);
                        self.0.borrow_mut().invalid.insert(full, err);
                    }
                }
                continue;
            }
            match value {
                Value::Object(map) if schema.has_nested(&full) => {
                    self.write(&full, Value::object());
                    self.init_object(&format!("{}.", full), map);
                }
                other => self.write(&full, other),
            }
        }
    }

    /// Fills unset, selected paths with their defaults. Defaults are not
    /// modifications.
    fn apply_defaults(&self) -> OdmResult<()> {
        let registry = self.registry();
        let schema = registry.schema(self.schema_id());

        for (name, st) in schema.paths() {
            if self.get(name).map_or(false, |v| !v.is_undefined()) {
                continue;
            }
            if !self.is_selected(name) || self.has_null_ancestor(name) {
                continue;
            }
            if let Some(value) = st.get_default(&registry, Some(self))? {
                self.write(name, value);
            }
        }
        Ok(())
    }

    fn has_null_ancestor(&self, path: &str) -> bool {
        let mut prefix = String::new();
        let parts: Vec<&str> = path.split('.').collect();
        for part in &parts[..parts.len().saturating_sub(1)] {
            if !prefix.is_empty() {
                prefix.push('.');
            }
            prefix.push_str(part);
            if self.get(&prefix).map_or(false, |v| v.is_null()) {
                return true;
            }
        }
        false
    }

    // ==================
    // Accessors
    // ==================

    /// True when both handles refer to the same instance.
    pub fn ptr_eq(&self, other: &Document) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn schema_id(&self) -> SchemaId {
        self.0.borrow().schema
    }

    pub fn registry(&self) -> Arc<SchemaRegistry> {
        Arc::clone(&self.0.borrow().registry)
    }

    pub fn is_new(&self) -> bool {
        self.0.borrow().is_new
    }

    pub fn set_is_new(&self, is_new: bool) {
        self.0.borrow_mut().is_new = is_new;
    }

    pub fn selected(&self) -> Option<Projection> {
        self.0.borrow().selected.clone()
    }

    pub fn is_selected(&self, path: &str) -> bool {
        self.0
            .borrow()
            .selected
            .as_ref()
            .map_or(true, |p| p.is_selected(path))
    }

    /// Strict mode used for unknown paths set on this document. The root
    /// schema decides unless it sets `useNestedStrict`.
    pub fn strict_mode(&self) -> StrictMode {
        self.strict_for(self.schema_id())
    }

    /// Strict mode for a sub-document of schema `child` owned by this
    /// document.
    pub(crate) fn strict_for(&self, child: SchemaId) -> StrictMode {
        let state = self.0.borrow();
        effective_strict(&state.registry, state.root, child, StrictScope::Write, state.strict)
    }

    /// Options that carry this document's root and strict override into a
    /// sub-document it owns.
    pub(crate) fn child_options(&self) -> DocumentOptions {
        let state = self.0.borrow();
        DocumentOptions {
            strict: state.strict,
            root: Some(state.root),
            ..DocumentOptions::default()
        }
    }

    pub(crate) fn prior(&self) -> Option<Document> {
        self.0.borrow().prior.clone()
    }

    /// Value at a dotted path.
    pub fn get(&self, path: &str) -> Option<Value> {
        let state = self.0.borrow();
        if let Some(v) = state.fields.get(path) {
            return Some(v.clone());
        }
        let (head, rest) = path.split_once('.')?;
        let child = state.fields.get(head)?.clone();
        drop(state);
        child.get_path(rest)
    }

    /// The `_id` rendered as a string.
    pub fn id(&self) -> Option<String> {
        match self.get("_id")? {
            Value::Scalar(Bson::ObjectId(oid)) => Some(oid.to_hex()),
            Value::Scalar(Bson::String(s)) => Some(s),
            v if v.is_nullish() => None,
            other => Some(other.to_string()),
        }
    }

    // ==================
    // Storage
    // ==================

    /// Writes a value at a dotted path, creating intermediate objects.
    /// Writing `undefined` removes the key.
    pub(crate) fn write(&self, path: &str, value: Value) {
        let mut state = self.0.borrow_mut();
        write_at(&mut state.fields, path, value);
    }

    /// Shallow copy of the stored fields; sub-documents stay instances.
    pub fn to_map(&self) -> Map {
        self.0.borrow().fields.clone()
    }

    /// Plain deep copy, minimized when the schema asks for it.
    pub fn to_value(&self) -> Value {
        let (fields, minimize) = {
            let state = self.0.borrow();
            let minimize = state
                .registry
                .schema(state.schema)
                .to_object_options()
                .minimize;
            (state.fields.clone(), minimize)
        };
        let plain = Value::Object(fields).to_plain();
        strip(plain, minimize)
    }

    pub fn to_bson(&self) -> bson::Document {
        match self.to_value() {
            Value::Object(map) => map_to_bson(map),
            _ => bson::Document::new(),
        }
    }

    // ==================
    // Modification tracking
    // ==================

    pub fn mark_modified(&self, path: &str) {
        self.0.borrow_mut().modified.insert(path.to_string());
    }

    /// Clears the modified flag on `path` and everything below it.
    pub fn unmark_modified(&self, path: &str) {
        let nested = format!("{}.", path);
        self.0
            .borrow_mut()
            .modified
            .retain(|p| p != path && !p.starts_with(&nested));
    }

    /// Paths set on this document or inside its sub-documents.
    fn direct_modified_paths(&self) -> BTreeSet<String> {
        let (mut direct, fields) = {
            let state = self.0.borrow();
            (state.modified.clone(), state.fields.clone())
        };
        collect_child_modifications("", &fields, &mut direct);
        direct
    }

    /// Modified paths, including their parent paths and modifications made
    /// inside sub-documents.
    pub fn modified_paths(&self) -> Vec<String> {
        let mut all = BTreeSet::new();
        for path in self.direct_modified_paths() {
            let mut prefix = String::new();
            for part in path.split('.') {
                if !prefix.is_empty() {
                    prefix.push('.');
                }
                prefix.push_str(part);
                all.insert(prefix.clone());
            }
        }
        all.into_iter().collect()
    }

    /// True when `path`, one of its parents or one of its children was
    /// modified.
    pub fn is_modified(&self, path: &str) -> bool {
        let nested = format!("{}.", path);
        self.direct_modified_paths().iter().any(|p| {
            p == path
                || p.starts_with(&nested)
                || path.strip_prefix(p.as_str()).map_or(false, |rest| rest.starts_with('.'))
        })
    }

    pub fn is_any_modified(&self) -> bool {
        !self.direct_modified_paths().is_empty()
    }

    // ==================
    // Validation
    // ==================

    /// Runs required checks and validators on every selected path and on
    /// every sub-document. Failures are collected into one
    /// `ValidationError`.
    pub fn validate(&self) -> OdmResult<()> {
        let registry = self.registry();
        let schema = registry.schema(self.schema_id());
        let mut errors = ValidationError::new();

        for (path, err) in self.0.borrow().invalid.iter() {
            errors.add_error(path.clone(), err.clone());
        }

        for (name, st) in schema.paths() {
            if !self.is_selected(name) || errors.get(name).is_some() {
                continue;
            }
            let value = self.get(name).unwrap_or_else(Value::undefined);
            if let Err(err) = st.do_validate(&value) {
                errors.add_error(name, err.into());
                continue;
            }

            match &value {
                Value::Document(child) => {
                    if let Err(err) = child.validate() {
                        errors.add_error(name, err);
                    }
                }
                Value::Array(items) if st.is_document_array() => {
                    for (i, item) in items.iter().enumerate() {
                        if let Value::Document(child) = item {
                            if let Err(err) = child.validate() {
                                errors.add_error(format!("{}.{}", name, i), err);
                            }
                        }
                    }
                }
                Value::Object(entries) if st.is_map() => {
                    for (key, entry) in entries {
                        if let Value::Document(child) = entry {
                            if let Err(err) = child.validate() {
                                errors.add_error(format!("{}.{}", name, key), err);
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.into())
        }
    }
}

fn write_at(fields: &mut Map, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            if value.is_undefined() {
                fields.remove(path);
            } else {
                fields.insert(path.to_string(), value);
            }
        }
        Some((head, rest)) => {
            let slot = fields.entry(head.to_string()).or_insert_with(Value::object);
            if !slot.is_plain_object() {
                *slot = Value::object();
            }
            if let Value::Object(inner) = slot {
                write_at(inner, rest, value);
            }
        }
    }
}

fn collect_child_modifications(prefix: &str, fields: &Map, out: &mut BTreeSet<String>) {
    for (key, value) in fields {
        let full = format!("{}{}", prefix, key);
        match value {
            Value::Document(child) => {
                for p in child.modified_paths() {
                    out.insert(format!("{}.{}", full, p));
                }
            }
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if let Value::Document(child) = item {
                        for p in child.modified_paths() {
                            out.insert(format!("{}.{}.{}", full, i, p));
                        }
                    }
                }
            }
            Value::Object(map) => collect_child_modifications(&format!("{}.", full), map, out),
            _ => {}
        }
    }
}

/// Drops `undefined` entries and, when minimizing, empty objects.
fn strip(value: Value, minimize: bool) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                if v.is_undefined() {
                    continue;
                }
                let v = strip(v, minimize);
                if minimize && v.as_object().map_or(false, Map::is_empty) {
                    continue;
                }
                out.insert(k, v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(|v| strip(v, minimize)).collect()),
        other => other,
    }
}
