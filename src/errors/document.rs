//! Errors raised while assigning values onto documents

use std::fmt;

use crate::value::Value;

/// Unknown path, or immutable path change, under `throw` strictness.
#[derive(Debug, Clone)]
pub struct StrictModeError {
    path: String,
    message: String,
    immutable: bool,
}

impl StrictModeError {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let message = format!(
            "Field `{}` is not in schema and strict mode is set to throw.",
            path
        );
        Self {
            path,
            message,
            immutable: false,
        }
    }

    pub fn with_message(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            immutable: false,
        }
    }

    /// Change to an immutable path.
    pub fn immutable(path: impl Into<String>) -> Self {
        let path = path.into();
        let message = format!("Field `{}` is immutable and strict = 'throw'", path);
        Self {
            path,
            message,
            immutable: true,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_immutable_error(&self) -> bool {
        self.immutable
    }
}

impl fmt::Display for StrictModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StrictModeError {}

/// A nested path was assigned something other than an object.
#[derive(Debug, Clone)]
pub struct ObjectExpectedError {
    path: String,
    value: Value,
}

impl ObjectExpectedError {
    pub fn new(path: impl Into<String>, value: &Value) -> Self {
        Self {
            path: path.into(),
            value: value.clone(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl fmt::Display for ObjectExpectedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tried to set nested object field `{}` to primitive value `{}`",
            self.path, self.value
        )
    }
}

impl std::error::Error for ObjectExpectedError {}

/// An operation parameter that must be an object was not.
#[derive(Debug, Clone)]
pub struct ObjectParameterError {
    value: Value,
    param: String,
    operation: String,
}

impl ObjectParameterError {
    pub fn new(value: &Value, param: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            value: value.clone(),
            param: param.into(),
            operation: operation.into(),
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn param(&self) -> &str {
        &self.param
    }
}

impl fmt::Display for ObjectParameterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Parameter \"{}\" to {}() must be an object, got \"{}\" (type {})",
            self.param,
            self.operation,
            self.value,
            self.value.type_name()
        )
    }
}

impl std::error::Error for ObjectParameterError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_mode_messages() {
        let err = StrictModeError::new("nickname");
        assert!(err.message().contains("`nickname` is not in schema"));
        assert!(!err.is_immutable_error());

        let err = StrictModeError::immutable("createdAt");
        assert!(err.is_immutable_error());
        assert!(err.message().contains("immutable"));
    }

    #[test]
    fn test_object_parameter_display() {
        let err = ObjectParameterError::new(&Value::from(5), "obj", "Document");
        assert_eq!(
            err.to_string(),
            "Parameter \"obj\" to Document() must be an object, got \"5\" (type number)"
        );
    }

    #[test]
    fn test_object_expected_display() {
        let err = ObjectExpectedError::new("name", &Value::from("bob"));
        assert!(err.to_string().contains("nested object field `name`"));
    }
}
