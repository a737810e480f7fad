use std::str::FromStr;

use bson::{Bson, Decimal128};

use super::number::js_number_to_string;
use super::{passthrough, PrimitiveCastError, PrimitiveResult};
use crate::value::Value;

/// Casts to a 128-bit decimal.
pub fn cast_decimal128(value: &Value) -> PrimitiveResult {
    if let Some(v) = passthrough(value, true) {
        return Ok(v);
    }

    let text = match value {
        Value::Scalar(Bson::Decimal128(d)) => return Ok(Value::Scalar(Bson::Decimal128(*d))),
        Value::Scalar(Bson::Binary(bin)) if bin.bytes.len() == 16 => {
            let mut bytes = [0u8; 16];
            bytes.copy_from_slice(&bin.bytes);
            return Ok(Value::Scalar(Bson::Decimal128(Decimal128::from_bytes(bytes))));
        }
        Value::Scalar(Bson::String(s)) => s.trim().to_string(),
        Value::Scalar(Bson::Int32(i)) => i.to_string(),
        Value::Scalar(Bson::Int64(i)) => i.to_string(),
        Value::Scalar(Bson::Double(d)) => js_number_to_string(*d),
        Value::Object(map) => match map.get("$numberDecimal").and_then(Value::as_str) {
            Some(s) => s.to_string(),
            None => return Err(PrimitiveCastError::rejected("Decimal128", value)),
        },
        _ => return Err(PrimitiveCastError::rejected("Decimal128", value)),
    };

    Decimal128::from_str(&text)
        .map(|d| Value::Scalar(Bson::Decimal128(d)))
        .map_err(|_| PrimitiveCastError::rejected("Decimal128", value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn is_decimal(v: &Value) -> bool {
        matches!(v, Value::Scalar(Bson::Decimal128(_)))
    }

    #[test]
    fn test_numeric_inputs() {
        assert!(is_decimal(&cast_decimal128(&Value::from("1.25")).unwrap()));
        assert!(is_decimal(&cast_decimal128(&Value::from(3)).unwrap()));
        assert!(is_decimal(&cast_decimal128(&Value::from(0.5)).unwrap()));
    }

    #[test]
    fn test_extended_json_object() {
        let v = cast_decimal128(&Value::from(json!({"$numberDecimal": "10.01"}))).unwrap();
        assert!(is_decimal(&v));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(cast_decimal128(&Value::from("abc")).is_err());
        assert!(cast_decimal128(&Value::from(true)).is_err());
    }
}
