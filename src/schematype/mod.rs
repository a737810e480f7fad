//! Schema paths
//!
//! A `SchemaPath` is one declared field of a schema: its type, options,
//! validators and setters. It knows how to cast a value for storage
//! (`cast`), how to cast a value inside a query filter
//! (`cast_for_query`), how to produce a default and how to validate.
//!
//! Path types form a closed set (`PathKind`); each variant's behavior
//! lives in its own module and is dispatched from here.

mod array;
pub mod config;
mod document_array;
mod geo;
mod map;
mod options;
mod query;
mod scalar;
mod subdocument;

pub use options::{DefaultFn, DefaultValue, PathOptions, SetterFn, Validator, ValidatorFn};
pub use scalar::ScalarType;

use std::fmt;
use std::sync::Arc;

use crate::document::{Document, Projection};
use crate::errors::{OdmError, OdmResult, ValidatorError};
use crate::schema::{discriminator_value_string, SchemaId, SchemaRegistry};
use crate::value::Value;

/// The closed set of path types.
#[derive(Debug, Clone)]
pub enum PathKind {
    Scalar(ScalarType),
    /// Array of a non-document element type
    Array(Box<SchemaPath>),
    /// Array of sub-documents; `element` is the `<path>.$` element path
    DocumentArray {
        schema: SchemaId,
        element: Box<SchemaPath>,
    },
    /// Single nested sub-document
    Subdocument(SchemaId),
    /// String-keyed map; the boxed path casts each value
    Map(Box<SchemaPath>),
    /// Untyped; values pass through unchanged
    Mixed,
}

/// Context for a storage cast.
#[derive(Clone, Copy, Default)]
pub struct CastOptions<'a> {
    /// Document the value is being assigned onto
    pub doc: Option<&'a Document>,
    /// Hydrating from storage rather than assigning
    pub init: bool,
    /// Value currently held at the path
    pub prior: Option<&'a Value>,
    /// Projection the owning document was loaded with
    pub selected: Option<&'a Projection>,
}

#[derive(Clone)]
pub struct SchemaPath {
    path: String,
    kind: PathKind,
    options: PathOptions,
    validators: Vec<Validator>,
    setters: Vec<SetterFn>,
}

impl fmt::Debug for SchemaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaPath")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("options", &self.options)
            .field("validators", &self.validators)
            .field("setters", &self.setters.len())
            .finish()
    }
}

impl SchemaPath {
    pub fn new(path: impl Into<String>, kind: PathKind) -> Self {
        let mut sp = Self {
            path: String::new(),
            kind,
            options: PathOptions::default(),
            validators: Vec::new(),
            setters: Vec::new(),
        };
        sp.rename(path.into());
        sp
    }

    pub fn scalar(path: impl Into<String>, ty: ScalarType) -> Self {
        Self::new(path, PathKind::Scalar(ty))
    }

    pub fn mixed(path: impl Into<String>) -> Self {
        Self::new(path, PathKind::Mixed)
    }

    pub fn array(path: impl Into<String>, caster: SchemaPath) -> Self {
        Self::new(path, PathKind::Array(Box::new(caster)))
    }

    pub fn document_array(path: impl Into<String>, schema: SchemaId) -> Self {
        let element = Box::new(SchemaPath::subdocument("", schema));
        Self::new(path, PathKind::DocumentArray { schema, element })
    }

    pub fn subdocument(path: impl Into<String>, schema: SchemaId) -> Self {
        Self::new(path, PathKind::Subdocument(schema))
    }

    pub fn map(path: impl Into<String>, of: SchemaPath) -> Self {
        Self::new(path, PathKind::Map(Box::new(of)))
    }

    pub fn with_options(mut self, options: PathOptions) -> Self {
        self.options = options;
        self
    }

    /// Adds a user validator. `{PATH}` and `{VALUE}` in the message are
    /// substituted on failure.
    pub fn validate_with(
        &mut self,
        message: impl Into<String>,
        check: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> &mut Self {
        self.validators.push(Validator::new(message, Arc::new(check)));
        self
    }

    /// Adds a setter run before casting.
    pub fn set_with(
        &mut self,
        setter: impl Fn(Value) -> OdmResult<Value> + Send + Sync + 'static,
    ) -> &mut Self {
        self.setters.push(Arc::new(setter));
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Renames the path along with its element and value casters.
    pub(crate) fn rename(&mut self, path: String) {
        match &mut self.kind {
            PathKind::Array(caster) => caster.rename(path.clone()),
            PathKind::DocumentArray { element, .. } => element.rename(format!("{}.$", path)),
            PathKind::Map(of) => of.rename(format!("{}.$*", path)),
            _ => {}
        }
        self.path = path;
    }

    pub fn kind(&self) -> &PathKind {
        &self.kind
    }

    pub fn options(&self) -> &PathOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut PathOptions {
        &mut self.options
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    /// Type label used in error kinds.
    pub fn instance(&self) -> &'static str {
        match &self.kind {
            PathKind::Scalar(ty) => ty.name(),
            PathKind::Array(_) => "Array",
            PathKind::DocumentArray { .. } => "DocumentArray",
            PathKind::Subdocument(_) => "Embedded",
            PathKind::Map(_) => "Map",
            PathKind::Mixed => "Mixed",
        }
    }

    pub fn scalar_type(&self) -> Option<ScalarType> {
        match self.kind {
            PathKind::Scalar(ty) => Some(ty),
            _ => None,
        }
    }

    /// Element path of an array or document array.
    pub fn caster(&self) -> Option<&SchemaPath> {
        match &self.kind {
            PathKind::Array(caster) => Some(caster),
            PathKind::DocumentArray { element, .. } => Some(element),
            _ => None,
        }
    }

    /// True for arrays and single nested sub-documents.
    pub fn has_caster(&self) -> bool {
        self.caster().is_some() || self.is_single_nested()
    }

    /// Child schema of a sub-document or document array.
    pub fn schema_id(&self) -> Option<SchemaId> {
        match self.kind {
            PathKind::DocumentArray { schema, .. } | PathKind::Subdocument(schema) => Some(schema),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, PathKind::Array(_) | PathKind::DocumentArray { .. })
    }

    pub fn is_document_array(&self) -> bool {
        matches!(self.kind, PathKind::DocumentArray { .. })
    }

    pub fn is_single_nested(&self) -> bool {
        matches!(self.kind, PathKind::Subdocument(_))
    }

    pub fn is_mixed(&self) -> bool {
        matches!(self.kind, PathKind::Mixed)
    }

    pub fn is_map(&self) -> bool {
        matches!(self.kind, PathKind::Map(_))
    }

    /// Number of array levels the path declares.
    pub fn array_depth(&self) -> usize {
        match &self.kind {
            PathKind::Array(caster) => 1 + caster.array_depth(),
            PathKind::DocumentArray { .. } => 1,
            _ => 0,
        }
    }

    /// Casts a value for storage.
    pub fn cast(
        &self,
        registry: &Arc<SchemaRegistry>,
        value: Value,
        opts: &CastOptions<'_>,
    ) -> OdmResult<Value> {
        match &self.kind {
            PathKind::Scalar(ty) => scalar_cast(self, *ty, value),
            PathKind::Array(caster) => array::cast(self, caster, registry, value, opts),
            PathKind::DocumentArray { schema, .. } => {
                document_array::cast(self, *schema, registry, value, opts)
            }
            PathKind::Subdocument(schema) => subdocument::cast(self, *schema, registry, value, opts),
            PathKind::Map(of) => map::cast(self, of, registry, value, opts),
            PathKind::Mixed => Ok(value),
        }
    }

    /// Runs setters, casts, then applies string transforms.
    pub fn apply_setters(
        &self,
        registry: &Arc<SchemaRegistry>,
        value: Value,
        opts: &CastOptions<'_>,
    ) -> OdmResult<Value> {
        if let Some(expected) = &self.options.discriminator_value {
            if !value.is_nullish()
                && discriminator_value_string(&value).as_deref() != Some(expected.as_str())
            {
                return Err(OdmError::message(format!(
                    "Can't set discriminator key \"{}\"",
                    self.path
                )));
            }
        }

        let mut value = value;
        for setter in &self.setters {
            value = setter(value)?;
        }

        let value = self.cast(registry, value, opts)?;
        Ok(match self.kind {
            PathKind::Scalar(ty) => {
                let defaults = config::type_defaults(ty);
                scalar::transform_string(
                    value,
                    self.options.trim || defaults.trim,
                    self.options.lowercase || defaults.lowercase,
                    self.options.uppercase || defaults.uppercase,
                )
            }
            _ => value,
        })
    }

    /// Casts a value appearing in a query filter, optionally under an
    /// operator such as `$in` or `$gt`.
    pub fn cast_for_query(
        &self,
        registry: &Arc<SchemaRegistry>,
        operator: Option<&str>,
        value: Value,
    ) -> OdmResult<Value> {
        match &self.kind {
            PathKind::Scalar(ty) => query::cast_scalar(self, *ty, registry, operator, value),
            PathKind::Array(caster) => array::cast_for_query(self, caster, registry, operator, value),
            PathKind::DocumentArray { schema, element } => {
                document_array::cast_for_query(self, *schema, element, registry, operator, value)
            }
            PathKind::Subdocument(schema) => {
                subdocument::cast_for_query(self, *schema, registry, operator, value)
            }
            PathKind::Map(_) => query::cast_base(self, registry, operator, value),
            PathKind::Mixed => Ok(value),
        }
    }

    /// Default value for a new document, already cast. `None` when the
    /// path has no default.
    pub fn get_default(
        &self,
        registry: &Arc<SchemaRegistry>,
        scope: Option<&Document>,
    ) -> OdmResult<Option<Value>> {
        let raw = match &self.options.default {
            Some(DefaultValue::Static(v)) => v.clone(),
            Some(DefaultValue::Generator(f)) => f(scope),
            None if self.is_array() => Value::Array(Vec::new()),
            None => return Ok(None),
        };
        if raw.is_undefined() {
            return Ok(None);
        }
        if raw.is_null() {
            return Ok(Some(raw));
        }

        let opts = CastOptions {
            doc: scope,
            ..CastOptions::default()
        };
        self.apply_setters(registry, raw, &opts).map(Some)
    }

    pub fn check_required(&self, value: &Value) -> bool {
        match &self.kind {
            PathKind::Scalar(ty) => ty.check_required(value),
            PathKind::Array(_) | PathKind::DocumentArray { .. } => {
                value.as_array().map_or(false, |items| !items.is_empty())
            }
            PathKind::Subdocument(_) => {
                matches!(value, Value::Document(_) | Value::Object(_))
            }
            PathKind::Map(_) | PathKind::Mixed => !value.is_nullish() && !value.is_hole(),
        }
    }

    fn is_required(&self) -> bool {
        self.options.required
            || self
                .scalar_type()
                .map_or(false, |ty| config::type_defaults(ty).required)
    }

    /// Runs the required check, built-in validators and user validators.
    /// Returns the first failure.
    pub fn do_validate(&self, value: &Value) -> Result<(), ValidatorError> {
        if self.is_required() && !self.check_required(value) {
            let message = self
                .options
                .required_message
                .clone()
                .unwrap_or_else(|| format!("Path `{}` is required.", self.path));
            return Err(ValidatorError::new(&self.path, "required", message, value));
        }
        if value.is_nullish() || value.is_hole() {
            return Ok(());
        }

        self.builtin_validators(&self.path, value)?;

        if let (PathKind::Array(caster), Value::Array(items)) = (&self.kind, value) {
            for (i, item) in items.iter().enumerate() {
                if item.is_nullish() || item.is_hole() {
                    continue;
                }
                caster.builtin_validators(&format!("{}.{}", self.path, i), item)?;
            }
        }
        Ok(())
    }

    fn builtin_validators(&self, path: &str, value: &Value) -> Result<(), ValidatorError> {
        let opts = &self.options;
        let shown = plain(value);

        if !opts.enum_values.is_empty() && !opts.enum_values.contains(value) {
            return Err(ValidatorError::new(
                path,
                "enum",
                format!("`{}` is not a valid enum value for path `{}`.", shown, path),
                value,
            ));
        }

        if let Some(n) = scalar::comparable(value).filter(|_| !value.is_string()) {
            if let Some(min) = opts.min.as_ref() {
                if scalar::comparable(min).map_or(false, |m| n < m) {
                    return Err(ValidatorError::new(
                        path,
                        "min",
                        format!(
                            "Path `{}` ({}) is less than minimum allowed value ({}).",
                            path,
                            shown,
                            plain(min)
                        ),
                        value,
                    ));
                }
            }
            if let Some(max) = opts.max.as_ref() {
                if scalar::comparable(max).map_or(false, |m| n > m) {
                    return Err(ValidatorError::new(
                        path,
                        "max",
                        format!(
                            "Path `{}` ({}) is more than maximum allowed value ({}).",
                            path,
                            shown,
                            plain(max)
                        ),
                        value,
                    ));
                }
            }
        }

        if let Some(s) = value.as_str() {
            let len = s.chars().count();
            if let Some(min) = opts.min_length.filter(|min| len < *min) {
                return Err(ValidatorError::new(
                    path,
                    "minlength",
                    format!(
                        "Path `{}` (`{}`) is shorter than the minimum allowed length ({}).",
                        path, s, min
                    ),
                    value,
                ));
            }
            if let Some(max) = opts.max_length.filter(|max| len > *max) {
                return Err(ValidatorError::new(
                    path,
                    "maxlength",
                    format!(
                        "Path `{}` (`{}`) is longer than the maximum allowed length ({}).",
                        path, s, max
                    ),
                    value,
                ));
            }
            if let Some(pattern) = opts.pattern.as_ref().filter(|p| !p.is_match(s)) {
                return Err(ValidatorError::new(
                    path,
                    "regexp",
                    format!("Path `{}` is invalid ({}). Expected {}", path, s, pattern),
                    value,
                ));
            }
        }

        for validator in &self.validators {
            if !validator.check(value) {
                let message = validator
                    .message()
                    .replace("{PATH}", path)
                    .replace("{VALUE}", &shown);
                return Err(ValidatorError::new(path, validator.kind(), message, value));
            }
        }
        Ok(())
    }
}

fn scalar_cast(path: &SchemaPath, ty: ScalarType, value: Value) -> OdmResult<Value> {
    ty.cast_primitive(&value).map_err(|reason| {
        crate::errors::CastError::new(ty.name(), &value, path.path())
            .with_reason(reason)
            .into()
    })
}

/// Unquoted rendering used in validator messages.
fn plain(value: &Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaRegistry;
    use serde_json::json;

    fn registry() -> Arc<SchemaRegistry> {
        Arc::new(SchemaRegistry::new())
    }

    #[test]
    fn test_scalar_cast_error_carries_path_and_kind() {
        let reg = registry();
        let path = SchemaPath::scalar("age", ScalarType::Number);

        let err = path
            .cast(&reg, Value::from("abc"), &CastOptions::default())
            .unwrap_err();
        let cast = err.as_cast().unwrap();
        assert_eq!(cast.kind(), "Number");
        assert_eq!(cast.path(), "age");
        assert_eq!(cast.value(), &Value::from("abc"));
    }

    #[test]
    fn test_string_transforms_after_cast() {
        let reg = registry();
        let path = SchemaPath::scalar("email", ScalarType::String)
            .with_options(PathOptions::new().trim().lowercase());

        let v = path
            .apply_setters(&reg, Value::from("  A@B.COM "), &CastOptions::default())
            .unwrap();
        assert_eq!(v, Value::from("a@b.com"));
    }

    #[test]
    fn test_setters_run_before_cast() {
        let reg = registry();
        let mut path = SchemaPath::scalar("score", ScalarType::Number);
        path.set_with(|v| Ok(Value::from(format!("{}0", v.as_str().unwrap_or("")))));

        let v = path
            .apply_setters(&reg, Value::from("4"), &CastOptions::default())
            .unwrap();
        assert_eq!(v, Value::from(40));
    }

    #[test]
    fn test_array_default_is_empty() {
        let reg = registry();
        let path = SchemaPath::array("tags", SchemaPath::scalar("tags", ScalarType::String));
        assert_eq!(path.get_default(&reg, None).unwrap(), Some(Value::Array(vec![])));

        let scalar = SchemaPath::scalar("name", ScalarType::String);
        assert_eq!(scalar.get_default(&reg, None).unwrap(), None);
    }

    #[test]
    fn test_static_default_is_cast() {
        let reg = registry();
        let path = SchemaPath::scalar("count", ScalarType::Number)
            .with_options(PathOptions::new().default_value("5"));
        assert_eq!(path.get_default(&reg, None).unwrap(), Some(Value::from(5)));
    }

    #[test]
    fn test_required_and_builtin_validators() {
        let path = SchemaPath::scalar("name", ScalarType::String)
            .with_options(PathOptions::new().required().min_length(3));

        let err = path.do_validate(&Value::undefined()).unwrap_err();
        assert_eq!(err.kind(), "required");
        assert_eq!(err.message(), "Path `name` is required.");

        let err = path.do_validate(&Value::from("ab")).unwrap_err();
        assert_eq!(err.kind(), "minlength");

        assert!(path.do_validate(&Value::from("abc")).is_ok());
    }

    #[test]
    fn test_min_max_and_enum() {
        let age = SchemaPath::scalar("age", ScalarType::Number)
            .with_options(PathOptions::new().min(0).max(150));
        assert_eq!(age.do_validate(&Value::from(-1)).unwrap_err().kind(), "min");
        assert_eq!(age.do_validate(&Value::from(200)).unwrap_err().kind(), "max");

        let role = SchemaPath::scalar("role", ScalarType::String).with_options(
            PathOptions::new().enum_values(vec![Value::from("admin"), Value::from("user")]),
        );
        let err = role.do_validate(&Value::from("root")).unwrap_err();
        assert_eq!(err.message(), "`root` is not a valid enum value for path `role`.");
    }

    #[test]
    fn test_user_validator_message_substitution() {
        let mut path = SchemaPath::scalar("even", ScalarType::Number);
        path.validate_with("{VALUE} is not even for {PATH}", |v| {
            v.as_f64().map_or(false, |n| n % 2.0 == 0.0)
        });

        let err = path.do_validate(&Value::from(3)).unwrap_err();
        assert_eq!(err.message(), "3 is not even for even");
    }

    #[test]
    fn test_array_elements_checked_against_enum() {
        let caster = SchemaPath::scalar("tags", ScalarType::String)
            .with_options(PathOptions::new().enum_values(vec![Value::from("a")]));
        let path = SchemaPath::array("tags", caster);

        let err = path.do_validate(&Value::from(json!(["a", "b"]))).unwrap_err();
        assert_eq!(err.path(), "tags.1");
    }
}
