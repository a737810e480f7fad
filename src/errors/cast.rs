//! Cast failure carrying the offending value and path

use std::fmt;

use super::OdmError;
use crate::value::Value;

/// Raised when a value cannot be converted to a path's declared type.
///
/// The message is derived from the other fields and recomputed whenever
/// the path or model changes.
#[derive(Debug, Clone)]
pub struct CastError {
    kind: String,
    value: Value,
    path: String,
    reason: Option<Box<OdmError>>,
    string_value: String,
    value_type: String,
    model: Option<String>,
    message: String,
}

impl CastError {
    pub fn new(kind: impl Into<String>, value: &Value, path: impl Into<String>) -> Self {
        let mut err = Self {
            kind: kind.into(),
            value: value.clone(),
            path: path.into(),
            reason: None,
            string_value: value.to_string(),
            value_type: value.type_name().to_string(),
            model: None,
            message: String::new(),
        };
        err.refresh_message();
        err
    }

    /// Attaches the underlying failure.
    pub fn with_reason(mut self, reason: impl Into<OdmError>) -> Self {
        self.reason = Some(Box::new(reason.into()));
        self.refresh_message();
        self
    }

    /// Target type label, e.g. `Number` or `[Number]`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn reason(&self) -> Option<&OdmError> {
        self.reason.as_deref()
    }

    /// Inspect-style rendering of the value.
    pub fn string_value(&self) -> &str {
        &self.string_value
    }

    pub fn value_type(&self) -> &str {
        &self.value_type
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
        self.refresh_message();
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = Some(model.into());
        self.refresh_message();
    }

    fn refresh_message(&mut self) {
        let mut msg = format!(
            "Cast to {} failed for value {} (type {}) at path \"{}\"",
            self.kind, self.string_value, self.value_type, self.path
        );
        if let Some(model) = &self.model {
            msg.push_str(&format!(" for model \"{}\"", model));
        }
        // Plain errors are not named
        if let Some(reason) = &self.reason {
            let name = reason.name();
            if name != "Error" {
                msg.push_str(&format!(" because of \"{}\"", name));
            }
        }
        self.message = msg;
    }
}

impl fmt::Display for CastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CastError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cast::PrimitiveCastError;

    #[test]
    fn test_message_format() {
        let err = CastError::new("Number", &Value::from("abc"), "age");
        assert_eq!(
            err.message(),
            "Cast to Number failed for value \"abc\" (type string) at path \"age\""
        );
        assert_eq!(err.string_value(), "\"abc\"");
        assert_eq!(err.value_type(), "string");
    }

    #[test]
    fn test_model_suffix() {
        let mut err = CastError::new("Number", &Value::from("abc"), "age");
        err.set_model("User");
        assert!(err.message().ends_with("at path \"age\" for model \"User\""));
    }

    #[test]
    fn test_named_reason_is_mentioned() {
        let inner = CastError::new("Number", &Value::from("x"), "tags.1");
        let err = CastError::new("[Number]", &Value::from("x"), "tags").with_reason(inner);
        assert!(err.message().ends_with("because of \"CastError\""));

        let plain = CastError::new("Number", &Value::from("x"), "n")
            .with_reason(PrimitiveCastError::new("not a number"));
        assert!(!plain.message().contains("because of"));
    }

    #[test]
    fn test_set_path_recomputes_message() {
        let mut err = CastError::new("Number", &Value::from("x"), "tags");
        err.set_path("tags.2");
        assert_eq!(err.path(), "tags.2");
        assert!(err.message().contains("at path \"tags.2\""));
    }
}
