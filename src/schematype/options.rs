//! Per-path options, validators and setters

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::document::Document;
use crate::errors::OdmResult;
use crate::value::Value;

/// Produces a default value, optionally from the owning document.
pub type DefaultFn = Arc<dyn Fn(Option<&Document>) -> Value + Send + Sync>;

/// Transforms a value before it is cast.
pub type SetterFn = Arc<dyn Fn(Value) -> OdmResult<Value> + Send + Sync>;

/// Predicate run during validation.
pub type ValidatorFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

#[derive(Clone)]
pub enum DefaultValue {
    Static(Value),
    Generator(DefaultFn),
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Static(v) => f.debug_tuple("Static").field(v).finish(),
            DefaultValue::Generator(_) => f.write_str("Generator(..)"),
        }
    }
}

/// User validator attached to a path.
#[derive(Clone)]
pub struct Validator {
    kind: String,
    message: String,
    check: ValidatorFn,
}

impl Validator {
    pub fn new(message: impl Into<String>, check: ValidatorFn) -> Self {
        Self {
            kind: "user defined".to_string(),
            message: message.into(),
            check,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn check(&self, value: &Value) -> bool {
        (self.check)(value)
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .finish()
    }
}

/// Declarative options of a schema path.
#[derive(Debug, Clone, Default)]
pub struct PathOptions {
    pub required: bool,
    pub required_message: Option<String>,
    pub default: Option<DefaultValue>,
    /// Name of the referenced model.
    pub reference: Option<String>,
    pub enum_values: Vec<Value>,
    pub min: Option<Value>,
    pub max: Option<Value>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<Regex>,
    pub lowercase: bool,
    pub uppercase: bool,
    pub trim: bool,
    pub immutable: bool,
    pub index: bool,
    pub unique: bool,
    pub sparse: bool,
    pub select: Option<bool>,
    /// Set on a discriminator child's key path; any other value is refused.
    pub(crate) discriminator_value: Option<String>,
}

impl PathOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn required_with(mut self, message: impl Into<String>) -> Self {
        self.required = true;
        self.required_message = Some(message.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Static(value.into()));
        self
    }

    pub fn default_fn(
        mut self,
        f: impl Fn(Option<&Document>) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.default = Some(DefaultValue::Generator(Arc::new(f)));
        self
    }

    pub fn reference(mut self, model: impl Into<String>) -> Self {
        self.reference = Some(model.into());
        self
    }

    pub fn enum_values(mut self, values: Vec<Value>) -> Self {
        self.enum_values = values;
        self
    }

    pub fn min(mut self, min: impl Into<Value>) -> Self {
        self.min = Some(min.into());
        self
    }

    pub fn max(mut self, max: impl Into<Value>) -> Self {
        self.max = Some(max.into());
        self
    }

    pub fn min_length(mut self, len: usize) -> Self {
        self.min_length = Some(len);
        self
    }

    pub fn max_length(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }

    pub fn pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn lowercase(mut self) -> Self {
        self.lowercase = true;
        self
    }

    pub fn uppercase(mut self) -> Self {
        self.uppercase = true;
        self
    }

    pub fn trim(mut self) -> Self {
        self.trim = true;
        self
    }

    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    pub fn index(mut self) -> Self {
        self.index = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn sparse(mut self) -> Self {
        self.sparse = true;
        self
    }

    pub fn select(mut self, select: bool) -> Self {
        self.select = Some(select);
        self
    }
}
