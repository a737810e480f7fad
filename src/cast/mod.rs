//! Primitive casters
//!
//! Stateless conversions from arbitrary input values to the canonical BSON
//! representation of each scalar type. `null` and `undefined` pass through
//! every caster unchanged; the empty string becomes `null` for the numeric
//! and date casters. Failures carry a plain message and are turned into
//! `CastError`s by the schema path that invoked the caster.

mod binary;
mod boolean;
mod date;
mod decimal128;
mod number;
mod object_id;
mod string;

pub use binary::{cast_buffer, cast_uuid};
pub use boolean::{cast_boolean, cast_boolean_with, BooleanTokens};
pub use date::{cast_date, format_datetime, parse_date_str};
pub use decimal128::cast_decimal128;
pub use number::{
    cast_bigint, cast_double, cast_int32, cast_number, js_number_to_string, number_value,
    to_number, BIGINT_RANGE_MESSAGE,
};
pub use object_id::cast_object_id;
pub use string::cast_string;

use std::fmt;

use crate::value::Value;

/// Result of a primitive conversion
pub type PrimitiveResult = Result<Value, PrimitiveCastError>;

/// Plain conversion failure without path context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimitiveCastError {
    message: String,
}

impl PrimitiveCastError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub(crate) fn rejected(type_name: &str, value: &Value) -> Self {
        Self::new(format!("{} is not a valid {}", value, type_name))
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for PrimitiveCastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for PrimitiveCastError {}

/// Shared nullish and empty-string handling.
///
/// Returns `Some` when the caster should short-circuit with that value.
pub(crate) fn passthrough(value: &Value, empty_string_is_null: bool) -> Option<Value> {
    if value.is_nullish() {
        return Some(value.clone());
    }
    if empty_string_is_null && value.as_str() == Some("") {
        return Some(Value::null());
    }
    None
}
