//! Error types for casting, validation and schema registration
//!
//! Every failure the engine raises is an `OdmError`. Each variant wraps a
//! dedicated struct carrying the path and offending value, and `name()`
//! gives a stable discriminator callers can branch on.

mod cast;
mod document;
mod validation;

pub use cast::CastError;
pub use document::{ObjectExpectedError, ObjectParameterError, StrictModeError};
pub use validation::{ValidationError, ValidatorError};

use thiserror::Error;

use crate::cast::PrimitiveCastError;

/// Result type for engine operations
pub type OdmResult<T> = Result<T, OdmError>;

/// Errors raised by the engine
#[derive(Debug, Clone, Error)]
pub enum OdmError {
    // ==================
    // Casting
    // ==================
    /// Value could not be converted to the path's type
    #[error("{0}")]
    Cast(CastError),

    /// Primitive conversion failure, carried as the reason of a `CastError`
    #[error("{0}")]
    Primitive(#[from] PrimitiveCastError),

    /// Unknown or immutable path under `throw` strictness
    #[error("{0}")]
    StrictMode(StrictModeError),

    /// Nested path assigned a non-object value
    #[error("{0}")]
    ObjectExpected(ObjectExpectedError),

    /// Non-object passed where an object parameter was required
    #[error("{0}")]
    ObjectParameter(ObjectParameterError),

    // ==================
    // Validation
    // ==================
    /// Aggregate of per-path failures
    #[error("{0}")]
    Validation(ValidationError),

    /// Single validator failure
    #[error("{0}")]
    Validator(ValidatorError),

    // ==================
    // Registry
    // ==================
    /// Model name not registered
    #[error("Schema hasn't been registered for model \"{0}\".")]
    MissingSchema(String),

    /// Model name registered twice
    #[error("Cannot overwrite `{0}` model once compiled.")]
    OverwriteModel(String),

    /// Invalid schema definition or registration
    #[error("{0}")]
    Schema(String),

    // ==================
    // Persistence lifecycle
    // ==================
    /// Operation attempted without a live connection
    #[error("Operation `{0}` failed because the connection is disconnected")]
    Disconnected(String),

    /// Optimistic concurrency check failed
    #[error("No matching document found for id \"{id}\" version {version} modifiedPaths \"{modified_paths}\"")]
    Version {
        id: String,
        version: i64,
        modified_paths: String,
    },

    /// Unsafe whole-array write on a partially loaded array
    #[error("For your own good, saving an array that was selected using $elemMatch or a positional projection is not supported. The following path(s) would have been modified unsafely: {0}")]
    DivergentArray(String),

    /// Same document saved concurrently
    #[error("Can't save() the same doc multiple times in parallel. Document: {0}")]
    ParallelSave(String),

    // ==================
    // Operators and guards
    // ==================
    /// Unsupported query operator or malformed operand
    #[error("{0}")]
    Operator(String),

    /// Plain error raised by setters and guards
    #[error("{0}")]
    Message(String),
}

impl OdmError {
    pub fn message(msg: impl Into<String>) -> Self {
        OdmError::Message(msg.into())
    }

    pub fn operator(msg: impl Into<String>) -> Self {
        OdmError::Operator(msg.into())
    }

    /// Stable error name.
    pub fn name(&self) -> &'static str {
        match self {
            OdmError::Cast(_) => "CastError",
            OdmError::Primitive(_) | OdmError::Operator(_) | OdmError::Message(_) => "Error",
            OdmError::StrictMode(_) => "StrictModeError",
            OdmError::ObjectExpected(_) => "ObjectExpectedError",
            OdmError::ObjectParameter(_) => "ObjectParameterError",
            OdmError::Validation(_) => "ValidationError",
            OdmError::Validator(_) => "ValidatorError",
            OdmError::MissingSchema(_) => "MissingSchemaError",
            OdmError::OverwriteModel(_) => "OverwriteModelError",
            OdmError::Schema(_) => "SchemaError",
            OdmError::Disconnected(_) => "DisconnectedError",
            OdmError::Version { .. } => "VersionError",
            OdmError::DivergentArray(_) => "DivergentArrayError",
            OdmError::ParallelSave(_) => "ParallelSaveError",
        }
    }

    /// Path the error is attached to, when it has one.
    pub fn path(&self) -> Option<&str> {
        match self {
            OdmError::Cast(e) => Some(e.path()),
            OdmError::StrictMode(e) => Some(e.path()),
            OdmError::ObjectExpected(e) => Some(e.path()),
            OdmError::Validator(e) => Some(e.path()),
            _ => None,
        }
    }

    pub fn as_cast(&self) -> Option<&CastError> {
        match self {
            OdmError::Cast(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            OdmError::Validation(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_strict_mode(&self) -> Option<&StrictModeError> {
        match self {
            OdmError::StrictMode(e) => Some(e),
            _ => None,
        }
    }

    /// Attaches a model name to cast errors raised at the model boundary.
    pub(crate) fn with_model(self, model: &str) -> Self {
        match self {
            OdmError::Cast(mut e) => {
                e.set_model(model);
                OdmError::Cast(e)
            }
            OdmError::Validation(mut e) => {
                e.set_model(model);
                OdmError::Validation(e)
            }
            other => other,
        }
    }
}

impl From<CastError> for OdmError {
    fn from(e: CastError) -> Self {
        OdmError::Cast(e)
    }
}

impl From<StrictModeError> for OdmError {
    fn from(e: StrictModeError) -> Self {
        OdmError::StrictMode(e)
    }
}

impl From<ObjectExpectedError> for OdmError {
    fn from(e: ObjectExpectedError) -> Self {
        OdmError::ObjectExpected(e)
    }
}

impl From<ObjectParameterError> for OdmError {
    fn from(e: ObjectParameterError) -> Self {
        OdmError::ObjectParameter(e)
    }
}

impl From<ValidationError> for OdmError {
    fn from(e: ValidationError) -> Self {
        OdmError::Validation(e)
    }
}

impl From<ValidatorError> for OdmError {
    fn from(e: ValidatorError) -> Self {
        OdmError::Validator(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_error_names() {
        let cast: OdmError = CastError::new("Number", &Value::from("abc"), "age").into();
        assert_eq!(cast.name(), "CastError");
        assert_eq!(cast.path(), Some("age"));

        let strict: OdmError = StrictModeError::new("nickname").into();
        assert_eq!(strict.name(), "StrictModeError");

        assert_eq!(OdmError::MissingSchema("User".into()).name(), "MissingSchemaError");
        assert_eq!(OdmError::message("boom").name(), "Error");
    }

    #[test]
    fn test_lifecycle_messages() {
        let err = OdmError::MissingSchema("User".into());
        assert_eq!(err.to_string(), "Schema hasn't been registered for model \"User\".");

        let err = OdmError::OverwriteModel("User".into());
        assert_eq!(err.to_string(), "Cannot overwrite `User` model once compiled.");

        let err = OdmError::Version {
            id: "abc".into(),
            version: 3,
            modified_paths: "name, tags".into(),
        };
        assert!(err.to_string().contains("version 3"));
        assert_eq!(err.name(), "VersionError");
    }

    #[test]
    fn test_with_model_sets_cast_error_model() {
        let err: OdmError = CastError::new("Number", &Value::from("abc"), "age").into();
        let err = err.with_model("User");
        assert!(err.to_string().ends_with("for model \"User\""));
    }
}
