//! Scalar path types

use std::fmt;

use bson::spec::BinarySubtype;
use bson::Bson;

use super::config::{self, CasterOverride};
use crate::cast::{
    self, cast_bigint, cast_boolean_with, cast_buffer, cast_date, cast_decimal128, cast_double,
    cast_int32, cast_number, cast_object_id, cast_string, cast_uuid, PrimitiveCastError,
    PrimitiveResult,
};
use crate::value::Value;

/// Scalar types a path can be declared as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    String,
    Number,
    Boolean,
    Date,
    ObjectId,
    Buffer,
    BigInt,
    Int32,
    Double,
    Decimal128,
    Uuid,
}

impl ScalarType {
    pub const ALL: [ScalarType; 11] = [
        ScalarType::String,
        ScalarType::Number,
        ScalarType::Boolean,
        ScalarType::Date,
        ScalarType::ObjectId,
        ScalarType::Buffer,
        ScalarType::BigInt,
        ScalarType::Int32,
        ScalarType::Double,
        ScalarType::Decimal128,
        ScalarType::Uuid,
    ];

    /// Type name used in error kinds.
    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::String => "String",
            ScalarType::Number => "Number",
            ScalarType::Boolean => "Boolean",
            ScalarType::Date => "Date",
            ScalarType::ObjectId => "ObjectId",
            ScalarType::Buffer => "Buffer",
            ScalarType::BigInt => "BigInt",
            ScalarType::Int32 => "Int32",
            ScalarType::Double => "Double",
            ScalarType::Decimal128 => "Decimal128",
            ScalarType::Uuid => "UUID",
        }
    }

    /// Parses a type token from a definition.
    pub fn from_token(token: &str) -> Option<Self> {
        let ty = match token {
            "String" | "string" => ScalarType::String,
            "Number" | "number" => ScalarType::Number,
            "Boolean" | "boolean" | "Bool" | "bool" => ScalarType::Boolean,
            "Date" | "date" => ScalarType::Date,
            "ObjectId" | "ObjectID" | "objectid" | "Oid" => ScalarType::ObjectId,
            "Buffer" | "buffer" | "Binary" => ScalarType::Buffer,
            "BigInt" | "bigint" | "Long" => ScalarType::BigInt,
            "Int32" | "int32" => ScalarType::Int32,
            "Double" | "double" => ScalarType::Double,
            "Decimal128" | "decimal128" | "Decimal" => ScalarType::Decimal128,
            "UUID" | "Uuid" | "uuid" => ScalarType::Uuid,
            _ => return None,
        };
        Some(ty)
    }

    /// Runs the caster for this type, honoring process-wide overrides.
    pub fn cast_primitive(&self, value: &Value) -> PrimitiveResult {
        match config::caster_override(*self) {
            Some(CasterOverride::Custom(f)) => f(value),
            Some(CasterOverride::Disabled) => {
                if value.is_nullish() || self.is_canonical(value) {
                    Ok(value.clone())
                } else {
                    Err(PrimitiveCastError::new(format!(
                        "casting is disabled for {} and {} is not one",
                        self.name(),
                        value
                    )))
                }
            }
            None => self.builtin_cast(value),
        }
    }

    fn builtin_cast(&self, value: &Value) -> PrimitiveResult {
        match self {
            ScalarType::String => cast_string(value),
            ScalarType::Number => cast_number(value),
            ScalarType::Boolean => cast_boolean_with(value, &config::boolean_tokens()),
            ScalarType::Date => cast_date(value),
            ScalarType::ObjectId => cast_object_id(value),
            ScalarType::Buffer => cast_buffer(value),
            ScalarType::BigInt => cast_bigint(value),
            ScalarType::Int32 => cast_int32(value),
            ScalarType::Double => cast_double(value),
            ScalarType::Decimal128 => cast_decimal128(value),
            ScalarType::Uuid => cast_uuid(value),
        }
    }

    /// Whether `value` is already stored in this type's representation.
    pub fn is_canonical(&self, value: &Value) -> bool {
        let Value::Scalar(b) = value else {
            return false;
        };
        match (self, b) {
            (ScalarType::String, Bson::String(_)) => true,
            (ScalarType::Number, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) => true,
            (ScalarType::Boolean, Bson::Boolean(_)) => true,
            (ScalarType::Date, Bson::DateTime(_)) => true,
            (ScalarType::ObjectId, Bson::ObjectId(_)) => true,
            (ScalarType::Buffer, Bson::Binary(_)) => true,
            (ScalarType::BigInt, Bson::Int64(_)) => true,
            (ScalarType::Int32, Bson::Int32(_)) => true,
            (ScalarType::Double, Bson::Double(_)) => true,
            (ScalarType::Decimal128, Bson::Decimal128(_)) => true,
            (ScalarType::Uuid, Bson::Binary(bin)) => bin.subtype == BinarySubtype::Uuid,
            _ => false,
        }
    }

    /// Required check for a stored value of this type.
    pub fn check_required(&self, value: &Value) -> bool {
        match self {
            ScalarType::String => value.as_str().map_or(false, |s| !s.is_empty()),
            ScalarType::Boolean => value.as_bool().is_some(),
            _ => !value.is_nullish() && !value.is_hole(),
        }
    }

    /// Whether range comparisons apply to this type.
    pub(crate) fn is_ordered(&self) -> bool {
        !matches!(self, ScalarType::Boolean | ScalarType::ObjectId)
    }

    pub(crate) fn supports_bitwise(&self) -> bool {
        matches!(
            self,
            ScalarType::Number
                | ScalarType::Int32
                | ScalarType::BigInt
                | ScalarType::Buffer
                | ScalarType::Uuid
        )
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Applies string transforms from path options and type defaults.
pub(crate) fn transform_string(
    value: Value,
    trim: bool,
    lowercase: bool,
    uppercase: bool,
) -> Value {
    let mut s = match value {
        Value::Scalar(Bson::String(s)) => s,
        other => return other,
    };
    if trim {
        s = s.trim().to_string();
    }
    if lowercase {
        s = s.to_lowercase();
    } else if uppercase {
        s = s.to_uppercase();
    }
    Value::Scalar(Bson::String(s))
}

/// Numeric view used by min/max validators. Dates compare by epoch millis.
pub(crate) fn comparable(value: &Value) -> Option<f64> {
    match value {
        Value::Scalar(Bson::DateTime(dt)) => Some(dt.timestamp_millis() as f64),
        other => cast::to_number(other).filter(|n| !n.is_nan()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_round_trip_names() {
        for ty in ScalarType::ALL {
            assert_eq!(ScalarType::from_token(ty.name()), Some(ty));
        }
        assert_eq!(ScalarType::from_token("Mixed"), None);
    }

    #[test]
    fn test_required_checks() {
        assert!(!ScalarType::String.check_required(&Value::from("")));
        assert!(ScalarType::String.check_required(&Value::from("x")));
        assert!(ScalarType::Boolean.check_required(&Value::from(false)));
        assert!(!ScalarType::Number.check_required(&Value::null()));
    }

    #[test]
    fn test_canonical_values() {
        assert!(ScalarType::Number.is_canonical(&Value::from(1.5)));
        assert!(!ScalarType::Number.is_canonical(&Value::from("1.5")));
        assert!(ScalarType::Int32.is_canonical(&Value::from(1)));
    }

    #[test]
    fn test_transform_string() {
        let v = transform_string(Value::from("  MiXed "), true, true, false);
        assert_eq!(v, Value::from("mixed"));
        assert_eq!(transform_string(Value::from(5), true, true, false), Value::from(5));
    }
}
