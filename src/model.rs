//! Models
//!
//! A model is a registered name bound to a schema. It is the entry point
//! for creating and hydrating documents and for casting the filters and
//! updates sent on its behalf. Cast and validation errors raised through a
//! model name it in their message.

use std::sync::Arc;

use crate::caster::{self, CastUpdate, FilterOptions, UpdateOptions};
use crate::document::{Document, Projection};
use crate::errors::{OdmError, OdmResult};
use crate::schema::{Schema, SchemaId, SchemaRegistry};
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct Model {
    name: String,
    schema: SchemaId,
    registry: Arc<SchemaRegistry>,
}

impl Model {
    /// Looks up a registered model.
    pub fn new(registry: &Arc<SchemaRegistry>, name: &str) -> OdmResult<Self> {
        let schema = registry.model_schema(name)?;
        Ok(Self {
            name: name.to_string(),
            schema,
            registry: Arc::clone(registry),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema_id(&self) -> SchemaId {
        self.schema
    }

    pub fn schema(&self) -> &Schema {
        self.registry.schema(self.schema)
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    fn tag(&self, err: OdmError) -> OdmError {
        err.with_model(&self.name)
    }

    /// Builds a new document.
    pub fn create(&self, value: impl Into<Value>) -> OdmResult<Document> {
        Document::new(&self.registry, self.schema, value).map_err(|e| self.tag(e))
    }

    /// Loads a stored document. On a base model the stored discriminator
    /// key selects the schema.
    pub fn hydrate(&self, raw: impl Into<Value>, selected: Option<Projection>) -> OdmResult<Document> {
        let raw = raw.into();
        let schema = raw
            .as_object()
            .map_or(self.schema, |map| self.registry.resolve_discriminator(self.schema, map));
        Document::hydrate(&self.registry, schema, raw, selected).map_err(|e| self.tag(e))
    }

    pub fn validate(&self, doc: &Document) -> OdmResult<()> {
        doc.validate().map_err(|e| self.tag(e))
    }

    pub fn cast_filter(&self, filter: impl Into<Value>, opts: &FilterOptions) -> OdmResult<Value> {
        caster::cast_filter(&self.registry, self.schema, filter.into(), opts).map_err(|e| self.tag(e))
    }

    pub fn cast_update(
        &self,
        update: impl Into<Value>,
        opts: &UpdateOptions,
        filter: Option<&Value>,
    ) -> OdmResult<CastUpdate> {
        caster::cast_update(&self.registry, self.schema, update.into(), opts, filter)
            .map_err(|e| self.tag(e))
    }

    /// The model of a discriminator registered on this model's schema.
    pub fn discriminator(&self, name: &str) -> OdmResult<Model> {
        let entry = self
            .schema()
            .discriminators()
            .get(name)
            .ok_or_else(|| OdmError::MissingSchema(name.to_string()))?;
        Ok(Model {
            name: name.to_string(),
            schema: entry.schema,
            registry: Arc::clone(&self.registry),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaOptions;
    use serde_json::json;

    fn registry() -> Arc<SchemaRegistry> {
        let mut reg = SchemaRegistry::new();
        let event = reg
            .compile_json(&json!({"time": "Date", "count": "Number"}), SchemaOptions::new())
            .unwrap();
        reg.model("Event", event).unwrap();
        let clicked = reg
            .compile_json(&json!({"url": "String"}), SchemaOptions::new())
            .unwrap();
        reg.discriminator(event, "Clicked", clicked, Some("click")).unwrap();
        Arc::new(reg)
    }

    #[test]
    fn test_missing_model() {
        let err = Model::new(&registry(), "Nope").unwrap_err();
        assert_eq!(err.name(), "MissingSchemaError");
        assert_eq!(
            err.to_string(),
            "Schema hasn't been registered for model \"Nope\"."
        );
    }

    #[test]
    fn test_errors_name_the_model() {
        let model = Model::new(&registry(), "Event").unwrap();
        let err = model.create(json!({"count": "many"})).unwrap_err();
        assert!(err.to_string().ends_with("for model \"Event\""));

        let err = model
            .cast_filter(json!({"count": "many"}), &FilterOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("for model \"Event\""));
    }

    #[test]
    fn test_hydrate_selects_discriminator() {
        let model = Model::new(&registry(), "Event").unwrap();
        let doc = model
            .hydrate(json!({"__t": "click", "url": "x"}), None)
            .unwrap();
        let clicked = model.discriminator("Clicked").unwrap();
        assert_eq!(doc.schema_id(), clicked.schema_id());
        assert_eq!(doc.get("url"), Some(Value::from("x")));
    }
}
