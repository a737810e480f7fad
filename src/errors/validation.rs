//! Validation errors

use std::fmt;

use linked_hash_map::LinkedHashMap;

use super::OdmError;
use crate::value::Value;

/// A single failed validator.
#[derive(Debug, Clone)]
pub struct ValidatorError {
    path: String,
    kind: String,
    message: String,
    value: Value,
}

impl ValidatorError {
    pub fn new(
        path: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
        value: &Value,
    ) -> Self {
        Self {
            path: path.into(),
            kind: kind.into(),
            message: message.into(),
            value: value.clone(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Validator kind such as `required`, `min` or `user defined`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl fmt::Display for ValidatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ValidatorError {}

/// Per-path failures collected into one error.
#[derive(Debug, Clone, Default)]
pub struct ValidationError {
    errors: LinkedHashMap<String, OdmError>,
    model: Option<String>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `error` under `path`.
    ///
    /// Nested aggregates are flattened with `path` as prefix. Errors that
    /// carry their own relative path are keyed by `path.<their path>`.
    pub fn add_error(&mut self, path: impl Into<String>, error: OdmError) {
        let path = path.into();
        match error {
            OdmError::Validation(nested) => {
                for (child, err) in nested.errors {
                    self.errors.insert(join(&path, &child), err);
                }
            }
            other => {
                self.errors.insert(path, other);
            }
        }
    }

    pub fn errors(&self) -> &LinkedHashMap<String, OdmError> {
        &self.errors
    }

    pub fn get(&self, path: &str) -> Option<&OdmError> {
        self.errors.get(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = Some(model.into());
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }
}

fn join(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        path.to_string()
    } else if path.is_empty() {
        prefix.to_string()
    } else {
        format!("{}.{}", prefix, path)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.model {
            Some(model) => write!(f, "{} validation failed", model)?,
            None => write!(f, "Validation failed")?,
        }
        for (i, (path, err)) in self.errors.iter().enumerate() {
            let sep = if i == 0 { ": " } else { ", " };
            write!(f, "{}{}: {}", sep, path, err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CastError;

    #[test]
    fn test_nested_aggregates_flatten() {
        let mut inner = ValidationError::new();
        inner.add_error(
            "title",
            CastError::new("String", &Value::object(), "title").into(),
        );

        let mut outer = ValidationError::new();
        outer.add_error("comments.1", inner.into());

        assert_eq!(outer.len(), 1);
        assert!(outer.get("comments.1.title").is_some());
    }

    #[test]
    fn test_display_lists_paths() {
        let mut err = ValidationError::new();
        err.add_error(
            "name",
            ValidatorError::new("name", "required", "Path `name` is required.", &Value::undefined())
                .into(),
        );
        err.set_model("User");
        assert_eq!(
            err.to_string(),
            "User validation failed: name: Path `name` is required."
        );
    }
}
