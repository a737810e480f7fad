//! Numeric casters: Number, Int32, Double and BigInt

use bson::Bson;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{passthrough, PrimitiveCastError, PrimitiveResult};
use crate::value::Value;

pub const BIGINT_RANGE_MESSAGE: &str = "BigInt values must be between -9223372036854775808 and 9223372036854775807 because MongoDB does not support arbitrary precision integers";

const INT32_RANGE_MESSAGE: &str =
    "Int32 values must be integers between -2147483648 and 2147483647";

static DOUBLE_LITERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?$").expect("static pattern")
});

/// Casts to a JavaScript-style number.
///
/// Integral results inside the 32-bit range are stored as `Int32`, 64-bit
/// integer input stays `Int64`, and everything else becomes `Double`.
pub fn cast_number(value: &Value) -> PrimitiveResult {
    if let Some(v) = passthrough(value, true) {
        return Ok(v);
    }
    if let Value::Scalar(Bson::Int64(i)) = value {
        return Ok(Value::Scalar(Bson::Int64(*i)));
    }

    let n = to_number(value).ok_or_else(|| PrimitiveCastError::rejected("number", value))?;
    if n.is_nan() {
        return Err(PrimitiveCastError::rejected("number", value));
    }
    Ok(number_value(n))
}

/// Casts to a 32-bit integer, rejecting fractions and out-of-range input.
pub fn cast_int32(value: &Value) -> PrimitiveResult {
    if let Some(v) = passthrough(value, true) {
        return Ok(v);
    }

    let n = to_number(value).ok_or_else(|| PrimitiveCastError::new(INT32_RANGE_MESSAGE))?;
    if n.fract() != 0.0 || n < f64::from(i32::MIN) || n > f64::from(i32::MAX) {
        return Err(PrimitiveCastError::new(INT32_RANGE_MESSAGE));
    }
    Ok(Value::Scalar(Bson::Int32(n as i32)))
}

/// Casts to a 64-bit float. Strings must be complete numeric literals.
pub fn cast_double(value: &Value) -> PrimitiveResult {
    if let Some(v) = passthrough(value, true) {
        return Ok(v);
    }

    let n = match value {
        Value::Scalar(Bson::String(s)) => parse_strict_double(s),
        Value::Scalar(
            Bson::Int32(_)
            | Bson::Int64(_)
            | Bson::Double(_)
            | Bson::Boolean(_)
            | Bson::DateTime(_)
            | Bson::Decimal128(_),
        ) => to_number(value),
        _ => None,
    };

    match n {
        Some(n) => Ok(Value::Scalar(Bson::Double(n))),
        None => Err(PrimitiveCastError::rejected("double", value)),
    }
}

fn parse_strict_double(s: &str) -> Option<f64> {
    match s {
        "Infinity" | "+Infinity" => return Some(f64::INFINITY),
        "-Infinity" => return Some(f64::NEG_INFINITY),
        "NaN" => return Some(f64::NAN),
        _ => {}
    }
    if !DOUBLE_LITERAL.is_match(s) {
        return None;
    }
    s.parse::<f64>().ok()
}

/// Casts to a 64-bit integer.
pub fn cast_bigint(value: &Value) -> PrimitiveResult {
    if let Some(v) = passthrough(value, true) {
        return Ok(v);
    }

    let wide: i128 = match value {
        Value::Scalar(Bson::Int32(i)) => i128::from(*i),
        Value::Scalar(Bson::Int64(i)) => i128::from(*i),
        Value::Scalar(Bson::Boolean(b)) => i128::from(*b),
        Value::Scalar(Bson::Double(d)) => {
            if !d.is_finite() || d.fract() != 0.0 {
                return Err(PrimitiveCastError::new(format!(
                    "The number {} cannot be converted to a BigInt because it is not an integer",
                    js_number_to_string(*d)
                )));
            }
            if d.abs() >= 1e38 {
                return Err(PrimitiveCastError::new(BIGINT_RANGE_MESSAGE));
            }
            *d as i128
        }
        Value::Scalar(Bson::String(s)) => parse_bigint_str(s.trim())?,
        Value::Scalar(Bson::Decimal128(d)) => parse_bigint_str(&d.to_string())?,
        _ => return Err(PrimitiveCastError::rejected("BigInt", value)),
    };

    i64::try_from(wide)
        .map(|i| Value::Scalar(Bson::Int64(i)))
        .map_err(|_| PrimitiveCastError::new(BIGINT_RANGE_MESSAGE))
}

fn parse_bigint_str(s: &str) -> Result<i128, PrimitiveCastError> {
    use std::num::IntErrorKind;

    if s.is_empty() {
        return Ok(0);
    }
    let lower = s.to_ascii_lowercase();
    for (prefix, radix) in [("0x", 16), ("0o", 8), ("0b", 2)] {
        if let Some(digits) = lower.strip_prefix(prefix) {
            return i128::from_str_radix(digits, radix)
                .map_err(|_| PrimitiveCastError::new(format!("Cannot convert {} to a BigInt", s)));
        }
    }

    s.parse::<i128>().map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
            PrimitiveCastError::new(BIGINT_RANGE_MESSAGE)
        }
        _ => PrimitiveCastError::new(format!("Cannot convert {} to a BigInt", s)),
    })
}

/// JavaScript `Number(value)` for scalar input. `None` for structural values.
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Scalar(b) => match b {
            Bson::Int32(i) => Some(f64::from(*i)),
            Bson::Int64(i) => Some(*i as f64),
            Bson::Double(d) => Some(*d),
            Bson::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Bson::String(s) => Some(parse_js_number(s)),
            Bson::DateTime(dt) => Some(dt.timestamp_millis() as f64),
            Bson::Decimal128(d) => d.to_string().parse::<f64>().ok(),
            _ => None,
        },
        _ => None,
    }
}

/// JavaScript string-to-number conversion, `NaN` on garbage.
pub(crate) fn parse_js_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    let lower = t.to_ascii_lowercase();
    for (prefix, radix) in [("0x", 16), ("0o", 8), ("0b", 2)] {
        if let Some(digits) = lower.strip_prefix(prefix) {
            return u64::from_str_radix(digits, radix)
                .map(|v| v as f64)
                .unwrap_or(f64::NAN);
        }
    }

    if !DOUBLE_LITERAL.is_match(t) {
        return f64::NAN;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

/// Canonical numeric value for `n`.
pub fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n >= f64::from(i32::MIN) && n <= f64::from(i32::MAX) {
        Value::Scalar(Bson::Int32(n as i32))
    } else {
        Value::Scalar(Bson::Double(n))
    }
}

/// JavaScript-style rendering of a double.
pub fn js_number_to_string(d: f64) -> String {
    if d.is_nan() {
        return "NaN".to_string();
    }
    if d.is_infinite() {
        return if d > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if d.fract() == 0.0 && d.abs() < 1e21 {
        return format!("{:.0}", d);
    }
    format!("{}", d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_from_numeric_string() {
        assert_eq!(cast_number(&Value::from("42")).unwrap(), Value::from(42));
        assert_eq!(cast_number(&Value::from(" 1.5 ")).unwrap(), Value::from(1.5));
        assert_eq!(cast_number(&Value::from("0x10")).unwrap(), Value::from(16));
    }

    #[test]
    fn test_number_empty_string_is_null() {
        assert!(cast_number(&Value::from("")).unwrap().is_null());
        assert!(cast_number(&Value::undefined()).unwrap().is_undefined());
    }

    #[test]
    fn test_number_rejects_garbage_and_objects() {
        assert!(cast_number(&Value::from("abc")).is_err());
        assert!(cast_number(&Value::object()).is_err());
        assert!(cast_number(&Value::Array(vec![Value::from(1)])).is_err());
    }

    #[test]
    fn test_number_booleans() {
        assert_eq!(cast_number(&Value::from(true)).unwrap(), Value::from(1));
        assert_eq!(cast_number(&Value::from(false)).unwrap(), Value::from(0));
    }

    #[test]
    fn test_int32_range() {
        assert_eq!(cast_int32(&Value::from("7")).unwrap(), Value::from(7));
        assert!(cast_int32(&Value::from(1.5)).is_err());
        assert!(cast_int32(&Value::from(3_000_000_000i64)).is_err());
    }

    #[test]
    fn test_double_requires_full_literal() {
        assert_eq!(cast_double(&Value::from("2.5")).unwrap(), Value::from(2.5));
        assert_eq!(cast_double(&Value::from(3)).unwrap(), Value::from(3.0));
        assert!(cast_double(&Value::from(" 2.5")).is_err());
        assert!(cast_double(&Value::from("2.5abc")).is_err());
        assert!(cast_double(&Value::undefined()).unwrap().is_undefined());
    }

    #[test]
    fn test_bigint_range_message() {
        let err = cast_bigint(&Value::from("99999999999999999999")).unwrap_err();
        assert_eq!(err.message(), BIGINT_RANGE_MESSAGE);

        assert_eq!(
            cast_bigint(&Value::from("9007199254740993")).unwrap(),
            Value::from(9_007_199_254_740_993i64)
        );
        assert!(cast_bigint(&Value::from(1.5)).is_err());
    }

    #[test]
    fn test_js_number_to_string() {
        assert_eq!(js_number_to_string(3.0), "3");
        assert_eq!(js_number_to_string(1.25), "1.25");
        assert_eq!(js_number_to_string(f64::INFINITY), "Infinity");
    }
}
