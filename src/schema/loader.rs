//! Schema loader for reading schema definition files from disk
//!
//! Each `*.json` file in the schema directory declares one model:
//!
//! ```json
//! {
//!   "model": "Event",
//!   "options": { "strict": "throw" },
//!   "definition": { "time": "Date" },
//!   "discriminators": [{ "name": "Clicked", "value": "click", "definition": { "url": "String" } }]
//! }
//! ```
//!
//! Files are loaded in file-name order, so a file may use models declared
//! by earlier files as field types.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use super::registry::SchemaRegistry;
use super::types::SchemaOptions;
use crate::errors::{OdmError, OdmResult};
use crate::observability::{log_event_with_fields, Event};

/// On-disk form of a model declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaFile {
    pub model: String,
    #[serde(default)]
    pub options: SchemaOptions,
    pub definition: Json,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub discriminators: Vec<DiscriminatorFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscriminatorFile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default = "empty_definition")]
    pub definition: Json,
    #[serde(default)]
    pub options: SchemaOptions,
}

fn empty_definition() -> Json {
    Json::Object(serde_json::Map::new())
}

fn malformed(path: &Path, detail: impl std::fmt::Display) -> OdmError {
    OdmError::Schema(format!("{}: {}", path.display(), detail))
}

/// Loads schema files into a registry.
pub struct SchemaLoader {
    /// Directory containing schema files
    schema_dir: PathBuf,
}

impl SchemaLoader {
    pub fn new(schema_dir: impl Into<PathBuf>) -> Self {
        Self {
            schema_dir: schema_dir.into(),
        }
    }

    pub fn schema_dir(&self) -> &Path {
        &self.schema_dir
    }

    /// Loads every schema file into `registry` and returns the model names
    /// registered, discriminators included.
    ///
    /// A missing directory is created and yields no models.
    pub fn load_all(&self, registry: &mut SchemaRegistry) -> OdmResult<Vec<String>> {
        if !self.schema_dir.exists() {
            fs::create_dir_all(&self.schema_dir).map_err(|e| {
                malformed(
                    &self.schema_dir,
                    format!("Failed to create schema directory: {}", e),
                )
            })?;
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.schema_dir).map_err(|e| {
            malformed(
                &self.schema_dir,
                format!("Failed to read schema directory: {}", e),
            )
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                malformed(
                    &self.schema_dir,
                    format!("Failed to read directory entry: {}", e),
                )
            })?;
            let path = entry.path();

            // Skip non-JSON files
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            files.push(path);
        }
        files.sort();

        let mut models = Vec::new();
        for path in &files {
            models.extend(self.load_schema_file(path, registry)?);
        }

        let count = models.len().to_string();
        let dir = self.schema_dir.display().to_string();
        log_event_with_fields(Event::SchemasLoaded, &[("dir", &dir), ("models", &count)]);
        Ok(models)
    }

    /// Loads a single schema file.
    pub fn load_schema_file(
        &self,
        path: &Path,
        registry: &mut SchemaRegistry,
    ) -> OdmResult<Vec<String>> {
        let content = fs::read_to_string(path)
            .map_err(|e| malformed(path, format!("Failed to read file: {}", e)))?;
        let file: SchemaFile = serde_json::from_str(&content)
            .map_err(|e| malformed(path, format!("Invalid JSON: {}", e)))?;

        register(registry, file).map_err(|e| match e {
            OdmError::Schema(msg) => malformed(path, msg),
            other => other,
        })
    }

    /// Writes a schema file named after its model. Existing files are
    /// never overwritten.
    pub fn save_schema(&self, file: &SchemaFile) -> OdmResult<PathBuf> {
        fs::create_dir_all(&self.schema_dir).map_err(|e| {
            malformed(
                &self.schema_dir,
                format!("Failed to create schema directory: {}", e),
            )
        })?;

        let path = self.schema_dir.join(format!("{}.json", file.model));
        if path.exists() {
            return Err(malformed(
                &path,
                format!("Schema file for model `{}` already exists", file.model),
            ));
        }

        let content = serde_json::to_string_pretty(file)
            .map_err(|e| malformed(&path, format!("Failed to serialize schema: {}", e)))?;
        fs::write(&path, content)
            .map_err(|e| malformed(&path, format!("Failed to write file: {}", e)))?;
        Ok(path)
    }
}

/// Compiles a declaration and registers its model and discriminators.
pub fn register(registry: &mut SchemaRegistry, file: SchemaFile) -> OdmResult<Vec<String>> {
    let base = registry.compile_json(&file.definition, file.options)?;
    registry.model(file.model.clone(), base)?;

    let mut models = vec![file.model];
    for disc in file.discriminators {
        let child = registry.compile_json(&disc.definition, disc.options)?;
        let merged = registry.discriminator(base, &disc.name, child, disc.value.as_deref())?;
        registry.model(disc.name.clone(), merged)?;
        models.push(disc.name);
    }
    Ok(models)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_file_defaults() {
        let file: SchemaFile =
            serde_json::from_value(json!({"model": "User", "definition": {"name": "String"}}))
                .unwrap();
        assert!(file.discriminators.is_empty());
        assert_eq!(file.options, SchemaOptions::default());
    }

    #[test]
    fn test_register_with_discriminators() {
        let mut reg = SchemaRegistry::new();
        let file: SchemaFile = serde_json::from_value(json!({
            "model": "Event",
            "definition": {"time": "Date"},
            "discriminators": [{"name": "Clicked", "value": "click", "definition": {"url": "String"}}]
        }))
        .unwrap();

        let models = register(&mut reg, file).unwrap();
        assert_eq!(models, vec!["Event".to_string(), "Clicked".to_string()]);

        let clicked = reg.model_schema("Clicked").unwrap();
        assert!(reg.schema(clicked).path("url").is_some());
        assert!(reg.schema(clicked).path("time").is_some());
    }
}
