//! Schema registry
//!
//! Owns every compiled schema and hands out `SchemaId` handles. Nested
//! schemas reference each other by handle, so self-embedding schemas and
//! cloned schemas never form ownership cycles. The registry is mutable
//! while schemas are being declared and is shared behind an `Arc` once
//! casting starts.

use bson::oid::ObjectId;
use linked_hash_map::LinkedHashMap;

use super::definition::{FieldDef, SchemaDefinition, TypeToken};
use super::types::{Schema, SchemaDefaults, SchemaOptions};
use crate::config::OdmConfig;
use crate::errors::{OdmError, OdmResult};
use crate::observability::{log_event_with_fields, Event};
use crate::schematype::{PathOptions, ScalarType, SchemaPath};
use crate::value::Value;

/// Handle to a schema owned by a `SchemaRegistry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(pub(crate) usize);

impl SchemaId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct SchemaRegistry {
    pub(crate) schemas: Vec<Schema>,
    models: LinkedHashMap<String, SchemaId>,
    config: OdmConfig,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: OdmConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &OdmConfig {
        &self.config
    }

    pub fn schema_count(&self) -> usize {
        self.schemas.len()
    }

    /// Compiles a definition into a new schema.
    pub fn compile(&mut self, def: SchemaDefinition, options: SchemaOptions) -> OdmResult<SchemaId> {
        let id = SchemaId(self.schemas.len());
        self.schemas
            .push(Schema::new(options, SchemaDefaults::from(&self.config)));

        if self.schema(id).auto_id() && def.get("_id").is_none() {
            let id_path = SchemaPath::scalar("_id", ScalarType::ObjectId)
                .with_options(PathOptions::new().default_fn(|_| Value::from(ObjectId::new())));
            self.schema_mut(id).insert_path(id_path);
        }

        self.add(id, def, "")?;

        let paths = self.schema(id).paths.len().to_string();
        let schema_id = id.0.to_string();
        log_event_with_fields(
            Event::SchemaCompiled,
            &[("schema_id", &schema_id), ("paths", &paths)],
        );
        Ok(id)
    }

    /// Parses and compiles a JSON definition.
    pub fn compile_json(
        &mut self,
        json: &serde_json::Value,
        options: SchemaOptions,
    ) -> OdmResult<SchemaId> {
        let type_key = options
            .type_key
            .clone()
            .unwrap_or_else(|| self.config.type_key.clone());
        let def = SchemaDefinition::from_json(json, &type_key, self)?;
        self.compile(def, options)
    }

    pub fn schema(&self, id: SchemaId) -> &Schema {
        &self.schemas[id.0]
    }

    pub(crate) fn schema_mut(&mut self, id: SchemaId) -> &mut Schema {
        &mut self.schemas[id.0]
    }

    /// Mutable access to one path, for attaching validators and setters
    /// after compilation.
    pub fn path_mut(&mut self, id: SchemaId, path: &str) -> Option<&mut SchemaPath> {
        self.schemas.get_mut(id.0)?.paths.get_mut(path)
    }

    /// Adds the fields of `def` under `prefix`. Re-adding a name replaces
    /// the existing path.
    pub fn add(&mut self, id: SchemaId, def: SchemaDefinition, prefix: &str) -> OdmResult<()> {
        for (name, field) in def.into_fields() {
            if name.is_empty() {
                return Err(OdmError::Schema(
                    "Invalid schema configuration: empty path name".to_string(),
                ));
            }
            let full = format!("{}{}", prefix, name);
            match field {
                FieldDef::Nested(sub) if !sub.is_empty() => {
                    self.mark_nested(id, &full);
                    self.add(id, sub, &format!("{}.", full))?;
                }
                other => {
                    let path = self.build_path(id, &full, other)?;
                    log_event_with_fields(
                        Event::PathAdded,
                        &[("path", &full), ("instance", path.instance())],
                    );
                    self.schema_mut(id).insert_path(path);
                }
            }
        }
        Ok(())
    }

    fn mark_nested(&mut self, id: SchemaId, full: &str) {
        let schema = self.schema_mut(id);
        let mut prefix = String::new();
        for segment in full.split('.') {
            if !prefix.is_empty() {
                prefix.push('.');
            }
            prefix.push_str(segment);
            if !schema.paths.contains_key(&prefix) {
                schema.nested.insert(prefix.clone());
            }
        }
    }

    fn build_path(&mut self, owner: SchemaId, full: &str, field: FieldDef) -> OdmResult<SchemaPath> {
        Ok(match field {
            FieldDef::Type(TypeToken::Scalar(ty)) => SchemaPath::scalar(full, ty),
            FieldDef::Type(TypeToken::Mixed) => SchemaPath::mixed(full),
            FieldDef::Nested(sub) if sub.is_empty() => SchemaPath::mixed(full),
            FieldDef::Nested(sub) => {
                let child = self.compile_child(owner, sub)?;
                SchemaPath::subdocument(full, child)
            }
            FieldDef::Schema(child) => SchemaPath::subdocument(full, child),
            FieldDef::Typed(inner, options) => {
                let mut path = self.build_path(owner, full, *inner)?;
                *path.options_mut() = options;
                path
            }
            FieldDef::Array(element) => {
                let caster = self.build_path(owner, full, *element)?;
                match caster.schema_id() {
                    Some(child) if caster.is_single_nested() => {
                        SchemaPath::document_array(full, child)
                    }
                    _ => SchemaPath::array(full, caster),
                }
            }
            FieldDef::Map(of) => {
                let of = self.build_path(owner, full, *of)?;
                SchemaPath::map(full, of)
            }
        })
    }

    /// Compiles an inline nested definition as its own schema.
    fn compile_child(&mut self, owner: SchemaId, def: SchemaDefinition) -> OdmResult<SchemaId> {
        let options = self.schema(owner).options.inherited();
        self.compile(def, options)
    }

    /// Independent copy of a schema. Child schemas stay shared by handle.
    pub fn clone_schema(&mut self, id: SchemaId) -> SchemaId {
        let copy = self.schema(id).clone();
        self.schemas.push(copy);
        SchemaId(self.schemas.len() - 1)
    }

    /// Registers a computed path that is never stored.
    pub fn add_virtual(&mut self, id: SchemaId, name: impl Into<String>) {
        self.schema_mut(id).virtuals.insert(name.into());
    }

    /// Binds a model name to a schema.
    pub fn model(&mut self, name: impl Into<String>, id: SchemaId) -> OdmResult<()> {
        let name = name.into();
        if self.models.contains_key(&name) {
            return Err(OdmError::OverwriteModel(name));
        }
        let schema_id = id.0.to_string();
        log_event_with_fields(
            Event::ModelRegistered,
            &[("model", &name), ("schema_id", &schema_id)],
        );
        self.models.insert(name, id);
        Ok(())
    }

    pub fn model_schema(&self, name: &str) -> OdmResult<SchemaId> {
        self.models
            .get(name)
            .copied()
            .ok_or_else(|| OdmError::MissingSchema(name.to_string()))
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }
}
