//! Schema definitions
//!
//! A definition is the uncompiled shape of a schema. It can be built in
//! code with `SchemaDefinition::new().field(..)` or parsed from JSON in the
//! familiar `{ name: "String", tags: ["String"], meta: { ... } }` form.

use regex::Regex;
use serde_json::Value as Json;

use super::registry::{SchemaId, SchemaRegistry};
use crate::errors::{OdmError, OdmResult};
use crate::schematype::{PathOptions, ScalarType};
use crate::value::Value;

/// Leaf type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeToken {
    Scalar(ScalarType),
    Mixed,
}

/// One field of a definition.
#[derive(Debug, Clone)]
pub enum FieldDef {
    Type(TypeToken),
    /// A type with path options attached
    Typed(Box<FieldDef>, PathOptions),
    /// Plain nested object; an empty one is Mixed
    Nested(SchemaDefinition),
    /// Child schema by handle
    Schema(SchemaId),
    Array(Box<FieldDef>),
    /// String-keyed map of the inner type
    Map(Box<FieldDef>),
}

impl FieldDef {
    pub fn scalar(ty: ScalarType) -> Self {
        FieldDef::Type(TypeToken::Scalar(ty))
    }

    pub fn string() -> Self {
        Self::scalar(ScalarType::String)
    }

    pub fn number() -> Self {
        Self::scalar(ScalarType::Number)
    }

    pub fn boolean() -> Self {
        Self::scalar(ScalarType::Boolean)
    }

    pub fn date() -> Self {
        Self::scalar(ScalarType::Date)
    }

    pub fn object_id() -> Self {
        Self::scalar(ScalarType::ObjectId)
    }

    pub fn mixed() -> Self {
        FieldDef::Type(TypeToken::Mixed)
    }

    pub fn schema(id: SchemaId) -> Self {
        FieldDef::Schema(id)
    }

    pub fn nested(def: SchemaDefinition) -> Self {
        FieldDef::Nested(def)
    }

    pub fn array_of(element: FieldDef) -> Self {
        FieldDef::Array(Box::new(element))
    }

    pub fn map_of(of: FieldDef) -> Self {
        FieldDef::Map(Box::new(of))
    }

    pub fn with_options(self, options: PathOptions) -> Self {
        match self {
            FieldDef::Typed(inner, _) => FieldDef::Typed(inner, options),
            other => FieldDef::Typed(Box::new(other), options),
        }
    }
}

/// Ordered field list of an uncompiled schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaDefinition {
    fields: Vec<(String, FieldDef)>,
}

impl SchemaDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field. Re-declaring a name replaces the earlier declaration.
    pub fn field(mut self, name: impl Into<String>, def: FieldDef) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = def,
            None => self.fields.push((name, def)),
        }
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldDef)> {
        self.fields.iter().map(|(n, d)| (n.as_str(), d))
    }

    pub fn get(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, d)| d)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(crate) fn into_fields(self) -> Vec<(String, FieldDef)> {
        self.fields
    }

    /// Parses a JSON definition. Registered model names may be used as
    /// type tokens and resolve to that model's schema.
    pub fn from_json(json: &Json, type_key: &str, registry: &SchemaRegistry) -> OdmResult<Self> {
        let Json::Object(obj) = json else {
            return Err(OdmError::Schema(format!(
                "Schema definition must be an object, got {}",
                json
            )));
        };
        let parser = Parser {
            type_key,
            registry,
        };
        let mut def = SchemaDefinition::new();
        for (name, raw) in obj {
            let field = parser.field(name, raw)?;
            def = def.field(name.clone(), field);
        }
        Ok(def)
    }
}

struct Parser<'a> {
    type_key: &'a str,
    registry: &'a SchemaRegistry,
}

impl Parser<'_> {
    fn field(&self, name: &str, raw: &Json) -> OdmResult<FieldDef> {
        match raw {
            Json::String(token) => self.token(name, token),
            Json::Array(items) => match items.first() {
                None => Ok(FieldDef::array_of(FieldDef::mixed())),
                Some(element) => Ok(FieldDef::array_of(self.field(name, element)?)),
            },
            Json::Object(obj) if obj.is_empty() => Ok(FieldDef::Nested(SchemaDefinition::new())),
            Json::Object(obj) => {
                // `{ type: { type: String } }` declares a field called `type`
                let declared = obj.get(self.type_key).filter(|t| {
                    !t.as_object()
                        .map_or(false, |inner| inner.contains_key(self.type_key))
                });
                match declared {
                    Some(ty) => {
                        let inner = match self.field(name, ty)? {
                            FieldDef::Map(_) => {
                                let of = match obj.get("of") {
                                    Some(of) => self.field(name, of)?,
                                    None => FieldDef::mixed(),
                                };
                                FieldDef::map_of(of)
                            }
                            other => other,
                        };
                        Ok(inner.with_options(parse_options(name, obj)?))
                    }
                    None => {
                        let mut def = SchemaDefinition::new();
                        for (key, value) in obj {
                            def = def.field(key.clone(), self.field(key, value)?);
                        }
                        Ok(FieldDef::Nested(def))
                    }
                }
            }
            other => Err(invalid_type(name, &other.to_string())),
        }
    }

    fn token(&self, name: &str, token: &str) -> OdmResult<FieldDef> {
        if let Some(ty) = ScalarType::from_token(token) {
            return Ok(FieldDef::scalar(ty));
        }
        match token {
            "Mixed" | "mixed" | "Object" | "object" | "Any" => Ok(FieldDef::mixed()),
            "Map" | "map" => Ok(FieldDef::map_of(FieldDef::mixed())),
            "Array" | "array" => Ok(FieldDef::array_of(FieldDef::mixed())),
            model => self
                .registry
                .model_schema(model)
                .map(FieldDef::Schema)
                .map_err(|_| invalid_type(name, token)),
        }
    }
}

fn invalid_type(name: &str, token: &str) -> OdmError {
    OdmError::Schema(format!(
        "Invalid schema configuration: `{}` is not a valid type at path `{}`",
        token, name
    ))
}

fn parse_options(name: &str, obj: &serde_json::Map<String, Json>) -> OdmResult<PathOptions> {
    let mut opts = PathOptions::new();
    let flag = |key: &str| obj.get(key).and_then(Json::as_bool).unwrap_or(false);
    let length = |keys: [&str; 2]| {
        keys.iter()
            .find_map(|k| obj.get(*k))
            .and_then(Json::as_u64)
            .map(|n| n as usize)
    };

    match obj.get("required") {
        Some(Json::Bool(true)) => opts = opts.required(),
        Some(Json::String(message)) => opts = opts.required_with(message.clone()),
        Some(Json::Array(pair)) => {
            if pair.first().and_then(Json::as_bool) == Some(true) {
                opts = match pair.get(1).and_then(Json::as_str) {
                    Some(message) => opts.required_with(message),
                    None => opts.required(),
                };
            }
        }
        _ => {}
    }

    if let Some(default) = obj.get("default") {
        opts = opts.default_value(Value::from(default.clone()));
    }
    if let Some(reference) = obj.get("ref").and_then(Json::as_str) {
        opts = opts.reference(reference);
    }
    if let Some(values) = obj.get("enum").and_then(Json::as_array) {
        opts = opts.enum_values(values.iter().cloned().map(Value::from).collect());
    }
    if let Some(min) = obj.get("min") {
        opts = opts.min(Value::from(min.clone()));
    }
    if let Some(max) = obj.get("max") {
        opts = opts.max(Value::from(max.clone()));
    }
    opts.min_length = length(["minlength", "minLength"]);
    opts.max_length = length(["maxlength", "maxLength"]);

    if let Some(pattern) = obj.get("match").and_then(Json::as_str) {
        let re = Regex::new(pattern).map_err(|e| {
            OdmError::Schema(format!("Invalid `match` pattern for path `{}`: {}", name, e))
        })?;
        opts = opts.pattern(re);
    }

    opts.lowercase = flag("lowercase");
    opts.uppercase = flag("uppercase");
    opts.trim = flag("trim");
    opts.immutable = flag("immutable");
    opts.index = flag("index");
    opts.unique = flag("unique");
    opts.sparse = flag("sparse");
    opts.select = obj.get("select").and_then(Json::as_bool);
    Ok(opts)
}
