//! Discriminators
//!
//! A discriminator is a child schema registered against a root schema. It
//! holds the root's paths merged with its own, and documents select it
//! through the value stored at the discriminator key.

use bson::Bson;

use super::registry::{SchemaId, SchemaRegistry};
use super::types::{DiscriminatorEntry, DiscriminatorMapping, Schema};
use crate::cast::js_number_to_string;
use crate::errors::{OdmError, OdmResult};
use crate::observability::{log_event_with_fields, Event};
use crate::schematype::{PathOptions, ScalarType, SchemaPath};
use crate::value::{Map, Value};

/// String form of a discriminator key value. Numbers and ObjectIds are
/// accepted so that `1` and `"1"` select the same discriminator.
pub fn discriminator_value_string(value: &Value) -> Option<String> {
    match value {
        Value::Scalar(Bson::String(s)) => Some(s.clone()),
        Value::Scalar(Bson::Int32(n)) => Some(n.to_string()),
        Value::Scalar(Bson::Int64(n)) => Some(n.to_string()),
        Value::Scalar(Bson::Double(d)) => Some(js_number_to_string(*d)),
        Value::Scalar(Bson::ObjectId(oid)) => Some(oid.to_hex()),
        _ => None,
    }
}

/// Finds the first non-customizable option the child sets differently
/// from the base.
fn customized_option(base: &Schema, child: &Schema) -> Option<&'static str> {
    let opts = child.options();
    if opts.strict.map_or(false, |s| s != base.strict()) {
        return Some("strict");
    }
    if opts.strict_query.map_or(false, |s| s != base.strict_query()) {
        return Some("strictQuery");
    }
    if opts
        .use_nested_strict
        .map_or(false, |s| s != base.use_nested_strict())
    {
        return Some("useNestedStrict");
    }
    if opts
        .discriminator_key
        .as_deref()
        .map_or(false, |k| k != base.discriminator_key())
    {
        return Some("discriminatorKey");
    }
    if opts.type_key.as_deref().map_or(false, |k| k != base.type_key()) {
        return Some("typeKey");
    }
    if opts.minimize.is_some() && opts.minimize != base.options().minimize {
        return Some("minimize");
    }
    if opts.version_key.is_some() && opts.version_key != base.options().version_key {
        return Some("versionKey");
    }
    None
}

impl SchemaRegistry {
    /// Registers `child` as discriminator `name` of `base`. `value` is the
    /// stored key value and defaults to `name`.
    ///
    /// Returns the handle of the merged schema.
    pub fn discriminator(
        &mut self,
        base: SchemaId,
        name: &str,
        child: SchemaId,
        value: Option<&str>,
    ) -> OdmResult<SchemaId> {
        let value = value.unwrap_or(name).to_string();
        let base_schema = self.schema(base);
        let child_schema = self.schema(child);
        let key = base_schema.discriminator_key().to_string();

        if base_schema
            .discriminator_mapping()
            .map_or(false, |m| !m.is_root)
        {
            return Err(OdmError::Schema(format!(
                "Discriminator \"{}\" can only be a discriminator of the root model",
                name
            )));
        }
        if base_schema.discriminators().contains_key(name) {
            return Err(OdmError::Schema(format!(
                "Discriminator with name \"{}\" already exists",
                name
            )));
        }
        if let Some((existing, _)) = base_schema
            .discriminators()
            .iter()
            .find(|(_, entry)| entry.value == value)
        {
            return Err(OdmError::Schema(format!(
                "Discriminator \"{}\" has already been registered with value \"{}\"",
                existing, value
            )));
        }
        if child_schema.path(&key).is_some() {
            return Err(OdmError::Schema(format!(
                "Discriminator \"{}\" cannot have field with name \"{}\"",
                name, key
            )));
        }
        if let Some(option) = customized_option(base_schema, child_schema) {
            return Err(OdmError::Schema(format!(
                "Can't customize discriminator option {} (can only modify toJSON, toObject, _id, id)",
                option
            )));
        }

        let mut merged = base_schema.clone();
        merged.discriminators.clear();

        let child_opts = child_schema.options();
        if child_opts.to_json.is_some() {
            merged.options.to_json = child_opts.to_json;
        }
        if child_opts.to_object.is_some() {
            merged.options.to_object = child_opts.to_object;
        }
        if child_opts.id.is_some() {
            merged.options.id = child_opts.id;
        }
        if child_opts.auto_id.is_some() {
            merged.options.auto_id = child_opts.auto_id;
        }

        for (path, st) in child_schema.paths() {
            if path == "_id" && child_opts.auto_id.is_none() && merged.path("_id").is_some() {
                // The child's generated `_id` never replaces the base's
                continue;
            }
            merged.insert_path(st.clone());
        }
        if child_opts.auto_id == Some(false) && child_schema.path("_id").is_none() {
            merged.paths.remove("_id");
        }
        merged.nested.extend(child_schema.nested.iter().cloned());
        merged.virtuals.extend(child_schema.virtuals.iter().cloned());

        let mut key_options = PathOptions::new().default_value(value.clone()).select(true);
        key_options.discriminator_value = Some(value.clone());
        merged.insert_path(SchemaPath::scalar(&key, ScalarType::String).with_options(key_options));
        merged.discriminator_mapping = Some(DiscriminatorMapping {
            key: key.clone(),
            value: Some(value.clone()),
            is_root: false,
        });
        merged.base = Some(base);

        self.schemas.push(merged);
        let merged_id = SchemaId(self.schemas.len() - 1);

        let base_schema = self.schema_mut(base);
        if base_schema.path(&key).is_none() {
            base_schema.insert_path(
                SchemaPath::scalar(&key, ScalarType::String)
                    .with_options(PathOptions::new().select(true)),
            );
        }
        if base_schema.discriminator_mapping.is_none() {
            base_schema.discriminator_mapping = Some(DiscriminatorMapping {
                key: key.clone(),
                value: None,
                is_root: true,
            });
        }
        base_schema.discriminators.insert(
            name.to_string(),
            DiscriminatorEntry {
                value: value.clone(),
                schema: merged_id,
            },
        );

        log_event_with_fields(
            Event::DiscriminatorRegistered,
            &[("name", name), ("key", &key), ("value", &value)],
        );
        Ok(merged_id)
    }

    /// Discriminator of `base` selected by a key value: matched by value
    /// first, then by name.
    pub fn discriminator_by_value(&self, base: SchemaId, value: &str) -> Option<SchemaId> {
        let discriminators = self.schema(base).discriminators();
        discriminators
            .values()
            .find(|entry| entry.value == value)
            .or_else(|| discriminators.get(value))
            .map(|entry| entry.schema)
    }

    /// Schema a raw object should be cast with: the discriminator its key
    /// value selects, or `base` itself.
    pub fn resolve_discriminator(&self, base: SchemaId, raw: &Map) -> SchemaId {
        let schema = self.schema(base);
        if schema.discriminators().is_empty() {
            return base;
        }
        raw.get(schema.discriminator_key())
            .and_then(discriminator_value_string)
            .and_then(|value| self.discriminator_by_value(base, &value))
            .unwrap_or(base)
    }

    /// True when `candidate` is `target` or one of its discriminators.
    pub fn is_instance_of(&self, candidate: SchemaId, target: SchemaId) -> bool {
        candidate == target || self.schema(candidate).base() == Some(target)
    }

    /// Root schema of a discriminator, or the schema itself.
    pub fn discriminator_base(&self, id: SchemaId) -> SchemaId {
        self.schema(id).base().unwrap_or(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{SchemaOptions, StrictMode};
    use serde_json::json;

    fn event_schema() -> (SchemaRegistry, SchemaId) {
        let mut reg = SchemaRegistry::new();
        let base = reg
            .compile_json(&json!({"time": "Date"}), SchemaOptions::new())
            .unwrap();
        (reg, base)
    }

    #[test]
    fn test_merged_paths_and_key() {
        let (mut reg, base) = event_schema();
        let child = reg
            .compile_json(&json!({"url": "String"}), SchemaOptions::new())
            .unwrap();
        let clicked = reg.discriminator(base, "Clicked", child, None).unwrap();

        let schema = reg.schema(clicked);
        assert!(schema.path("time").is_some());
        assert!(schema.path("url").is_some());
        let key = schema.path("__t").unwrap();
        assert_eq!(key.options().discriminator_value.as_deref(), Some("Clicked"));
        assert_eq!(schema.base(), Some(base));

        let base_schema = reg.schema(base);
        assert!(base_schema.path("__t").is_some());
        assert!(base_schema.discriminator_mapping().unwrap().is_root);
        assert_eq!(base_schema.discriminators().len(), 1);
    }

    #[test]
    fn test_resolution_by_value_then_name() {
        let (mut reg, base) = event_schema();
        let child = reg
            .compile_json(&json!({"url": "String"}), SchemaOptions::new())
            .unwrap();
        let clicked = reg.discriminator(base, "Clicked", child, Some("click")).unwrap();

        assert_eq!(reg.discriminator_by_value(base, "click"), Some(clicked));
        assert_eq!(reg.discriminator_by_value(base, "Clicked"), Some(clicked));
        assert_eq!(reg.discriminator_by_value(base, "nope"), None);

        let mut raw = Map::new();
        raw.insert("__t".to_string(), Value::from("click"));
        assert_eq!(reg.resolve_discriminator(base, &raw), clicked);
        raw.insert("__t".to_string(), Value::from("other"));
        assert_eq!(reg.resolve_discriminator(base, &raw), base);

        assert!(reg.is_instance_of(clicked, base));
        assert!(!reg.is_instance_of(base, clicked));
        assert_eq!(reg.discriminator_base(clicked), base);
    }

    #[test]
    fn test_registration_errors() {
        let (mut reg, base) = event_schema();
        let child = reg.compile_json(&json!({}), SchemaOptions::new()).unwrap();
        let first = reg.discriminator(base, "A", child, None).unwrap();

        let err = reg.discriminator(base, "A", child, Some("other")).unwrap_err();
        assert!(err.to_string().contains("already exists"));

        let err = reg.discriminator(base, "B", child, Some("A")).unwrap_err();
        assert!(err.to_string().contains("already been registered"));

        let err = reg.discriminator(first, "C", child, None).unwrap_err();
        assert!(err.to_string().contains("root model"));

        let keyed = reg
            .compile_json(&json!({"__t": "String"}), SchemaOptions::new())
            .unwrap();
        let err = reg.discriminator(base, "D", keyed, None).unwrap_err();
        assert!(err.to_string().contains("cannot have field"));
    }

    #[test]
    fn test_option_customization() {
        let (mut reg, base) = event_schema();
        let strict = reg
            .compile_json(&json!({}), SchemaOptions::new().strict(StrictMode::Throw))
            .unwrap();
        let err = reg.discriminator(base, "Strict", strict, None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Can't customize discriminator option strict (can only modify toJSON, toObject, _id, id)"
        );

        let no_id = reg
            .compile_json(&json!({}), SchemaOptions::new().auto_id(false))
            .unwrap();
        let merged = reg.discriminator(base, "NoId", no_id, None).unwrap();
        assert!(reg.schema(merged).path("_id").is_none());
    }

    #[test]
    fn test_value_strings() {
        assert_eq!(discriminator_value_string(&Value::from("a")), Some("a".into()));
        assert_eq!(discriminator_value_string(&Value::from(1)), Some("1".into()));
        assert_eq!(discriminator_value_string(&Value::from(1.5)), Some("1.5".into()));
        assert_eq!(discriminator_value_string(&Value::null()), None);
    }
}
