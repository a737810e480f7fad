//! Compiled schema types

use std::collections::BTreeSet;

use linked_hash_map::LinkedHashMap;
use serde::{Deserialize, Serialize};

use super::registry::SchemaId;
use crate::config::OdmConfig;
use crate::schematype::SchemaPath;

/// Handling of paths that are not declared in the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "StrictRepr", into = "StrictRepr")]
pub enum StrictMode {
    /// Keep unknown paths
    Allow,
    /// Silently discard unknown paths
    #[default]
    Drop,
    /// Reject unknown paths with a `StrictModeError`
    Throw,
}

/// Wire form: `true`, `false` or `"throw"`.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum StrictRepr {
    Flag(bool),
    Named(String),
}

impl TryFrom<StrictRepr> for StrictMode {
    type Error = String;

    fn try_from(repr: StrictRepr) -> Result<Self, Self::Error> {
        match repr {
            StrictRepr::Flag(true) => Ok(StrictMode::Drop),
            StrictRepr::Flag(false) => Ok(StrictMode::Allow),
            StrictRepr::Named(s) if s == "throw" => Ok(StrictMode::Throw),
            StrictRepr::Named(s) => Err(format!(
                "invalid strict mode `{}`, expected true, false or \"throw\"",
                s
            )),
        }
    }
}

impl From<StrictMode> for StrictRepr {
    fn from(mode: StrictMode) -> Self {
        match mode {
            StrictMode::Allow => StrictRepr::Flag(false),
            StrictMode::Drop => StrictRepr::Flag(true),
            StrictMode::Throw => StrictRepr::Named("throw".to_string()),
        }
    }
}

/// Serialization transform options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformOptions {
    /// Drop empty nested objects from output
    pub minimize: bool,
    pub virtuals: bool,
    pub getters: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            minimize: true,
            virtuals: false,
            getters: false,
        }
    }
}

/// Schema options as declared. `None` means "not set explicitly"; the
/// effective value then comes from the registry configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SchemaOptions {
    pub strict: Option<StrictMode>,
    pub strict_query: Option<StrictMode>,
    /// Let nested schemas' own `strict` govern their paths in updates
    pub use_nested_strict: Option<bool>,
    pub discriminator_key: Option<String>,
    pub type_key: Option<String>,
    #[serde(rename = "_id")]
    pub auto_id: Option<bool>,
    pub id: Option<bool>,
    #[serde(rename = "toJSON")]
    pub to_json: Option<TransformOptions>,
    pub to_object: Option<TransformOptions>,
    pub minimize: Option<bool>,
    pub version_key: Option<String>,
}

impl SchemaOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict(mut self, mode: StrictMode) -> Self {
        self.strict = Some(mode);
        self
    }

    pub fn strict_query(mut self, mode: StrictMode) -> Self {
        self.strict_query = Some(mode);
        self
    }

    pub fn use_nested_strict(mut self, enabled: bool) -> Self {
        self.use_nested_strict = Some(enabled);
        self
    }

    pub fn discriminator_key(mut self, key: impl Into<String>) -> Self {
        self.discriminator_key = Some(key.into());
        self
    }

    pub fn type_key(mut self, key: impl Into<String>) -> Self {
        self.type_key = Some(key.into());
        self
    }

    pub fn auto_id(mut self, enabled: bool) -> Self {
        self.auto_id = Some(enabled);
        self
    }

    pub fn to_json(mut self, options: TransformOptions) -> Self {
        self.to_json = Some(options);
        self
    }

    pub fn to_object(mut self, options: TransformOptions) -> Self {
        self.to_object = Some(options);
        self
    }

    /// Options a child schema inherits when it is declared inline.
    pub(crate) fn inherited(&self) -> Self {
        Self {
            strict: self.strict,
            strict_query: self.strict_query,
            type_key: self.type_key.clone(),
            ..Self::default()
        }
    }
}

/// Registry defaults captured when a schema is compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDefaults {
    pub strict: StrictMode,
    pub strict_query: StrictMode,
    pub discriminator_key: String,
    pub type_key: String,
    pub auto_id: bool,
}

impl From<&OdmConfig> for SchemaDefaults {
    fn from(config: &OdmConfig) -> Self {
        Self {
            strict: config.strict,
            strict_query: config.strict_query,
            discriminator_key: config.discriminator_key.clone(),
            type_key: config.type_key.clone(),
            auto_id: config.auto_id,
        }
    }
}

impl Default for SchemaDefaults {
    fn default() -> Self {
        Self::from(&OdmConfig::default())
    }
}

/// Discriminator metadata of a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscriminatorMapping {
    pub key: String,
    /// `None` on the root schema
    pub value: Option<String>,
    pub is_root: bool,
}

/// A discriminator registered on a base schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscriminatorEntry {
    pub value: String,
    pub schema: SchemaId,
}

/// A compiled schema.
///
/// Paths are keyed by their full dotted name. Nested (non-schema)
/// objects contribute only their prefixes to `nested`.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub(crate) paths: LinkedHashMap<String, SchemaPath>,
    pub(crate) nested: BTreeSet<String>,
    pub(crate) virtuals: BTreeSet<String>,
    pub(crate) options: SchemaOptions,
    pub(crate) defaults: SchemaDefaults,
    pub(crate) discriminators: LinkedHashMap<String, DiscriminatorEntry>,
    pub(crate) discriminator_mapping: Option<DiscriminatorMapping>,
    pub(crate) base: Option<SchemaId>,
}

impl Schema {
    pub(crate) fn new(options: SchemaOptions, defaults: SchemaDefaults) -> Self {
        Self {
            options,
            defaults,
            ..Self::default()
        }
    }

    /// Exact path lookup.
    pub fn path(&self, name: &str) -> Option<&SchemaPath> {
        self.paths.get(name)
    }

    pub fn paths(&self) -> impl Iterator<Item = (&str, &SchemaPath)> {
        self.paths.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn path_names(&self) -> impl Iterator<Item = &str> {
        self.paths.keys().map(String::as_str)
    }

    pub fn has_nested(&self, name: &str) -> bool {
        self.nested.contains(name)
    }

    pub fn nested_paths(&self) -> impl Iterator<Item = &str> {
        self.nested.iter().map(String::as_str)
    }

    pub fn is_virtual(&self, name: &str) -> bool {
        self.virtuals.contains(name)
    }

    pub fn options(&self) -> &SchemaOptions {
        &self.options
    }

    pub fn strict(&self) -> StrictMode {
        self.options.strict.unwrap_or(self.defaults.strict)
    }

    pub fn strict_query(&self) -> StrictMode {
        self.options.strict_query.unwrap_or(self.defaults.strict_query)
    }

    pub fn use_nested_strict(&self) -> bool {
        self.options.use_nested_strict.unwrap_or(false)
    }

    pub fn discriminator_key(&self) -> &str {
        self.options
            .discriminator_key
            .as_deref()
            .unwrap_or(&self.defaults.discriminator_key)
    }

    pub fn type_key(&self) -> &str {
        self.options
            .type_key
            .as_deref()
            .unwrap_or(&self.defaults.type_key)
    }

    pub fn auto_id(&self) -> bool {
        self.options.auto_id.unwrap_or(self.defaults.auto_id)
    }

    pub fn to_object_options(&self) -> TransformOptions {
        let mut opts = self.options.to_object.unwrap_or_default();
        if let Some(minimize) = self.options.minimize {
            opts.minimize = minimize;
        }
        opts
    }

    pub fn to_json_options(&self) -> TransformOptions {
        self.options
            .to_json
            .unwrap_or_else(|| self.to_object_options())
    }

    /// Discriminators registered on this schema, by name.
    pub fn discriminators(&self) -> &LinkedHashMap<String, DiscriminatorEntry> {
        &self.discriminators
    }

    pub fn discriminator_mapping(&self) -> Option<&DiscriminatorMapping> {
        self.discriminator_mapping.as_ref()
    }

    /// Base schema of a discriminator child.
    pub fn base(&self) -> Option<SchemaId> {
        self.base
    }

    pub(crate) fn insert_path(&mut self, path: SchemaPath) {
        // Registering a real path removes any nested marker with the same name
        self.nested.remove(path.path());
        self.paths.insert(path.path().to_string(), path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_mode_wire_forms() {
        let mode: StrictMode = serde_json::from_str("\"throw\"").unwrap();
        assert_eq!(mode, StrictMode::Throw);
        let mode: StrictMode = serde_json::from_str("false").unwrap();
        assert_eq!(mode, StrictMode::Allow);
        assert!(serde_json::from_str::<StrictMode>("\"loose\"").is_err());

        assert_eq!(serde_json::to_string(&StrictMode::Drop).unwrap(), "true");
    }

    #[test]
    fn test_effective_options_fall_back_to_defaults() {
        let schema = Schema::new(SchemaOptions::new(), SchemaDefaults::default());
        assert_eq!(schema.strict(), StrictMode::Drop);
        assert_eq!(schema.discriminator_key(), "__t");
        assert!(schema.auto_id());

        let schema = Schema::new(
            SchemaOptions::new().strict(StrictMode::Throw).discriminator_key("kind"),
            SchemaDefaults::default(),
        );
        assert_eq!(schema.strict(), StrictMode::Throw);
        assert_eq!(schema.discriminator_key(), "kind");
    }

    #[test]
    fn test_options_deserialize_explicitness() {
        let opts: SchemaOptions =
            serde_json::from_str(r#"{"strict": "throw", "_id": false, "toJSON": {"virtuals": true}}"#)
                .unwrap();
        assert_eq!(opts.strict, Some(StrictMode::Throw));
        assert_eq!(opts.auto_id, Some(false));
        assert!(opts.to_json.unwrap().virtuals);
        assert_eq!(opts.strict_query, None);
    }
}
