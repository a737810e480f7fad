//! Buffer and UUID casters

use bson::spec::BinarySubtype;
use bson::{Binary, Bson};

use super::number::to_number;
use super::{passthrough, PrimitiveCastError, PrimitiveResult};
use crate::value::Value;

/// Casts to generic binary data.
pub fn cast_buffer(value: &Value) -> PrimitiveResult {
    if let Some(v) = passthrough(value, false) {
        return Ok(v);
    }

    let bytes = match value {
        Value::Scalar(Bson::Binary(bin)) => return Ok(Value::from(bin.clone())),
        Value::Scalar(Bson::String(s)) => s.as_bytes().to_vec(),
        Value::Array(items) => byte_list(items).ok_or_else(|| PrimitiveCastError::rejected("Buffer", value))?,
        Value::Object(map) => match (map.get("type").and_then(Value::as_str), map.get("data")) {
            (Some("Buffer"), Some(Value::Array(items))) => {
                byte_list(items).ok_or_else(|| PrimitiveCastError::rejected("Buffer", value))?
            }
            _ => return Err(PrimitiveCastError::rejected("Buffer", value)),
        },
        _ => return Err(PrimitiveCastError::rejected("Buffer", value)),
    };

    Ok(Value::from(Binary {
        subtype: BinarySubtype::Generic,
        bytes,
    }))
}

// Elements wrap modulo 256 like a typed byte array.
fn byte_list(items: &[Value]) -> Option<Vec<u8>> {
    items
        .iter()
        .map(|item| {
            let n = to_number(item)?;
            if n.is_nan() {
                return Some(0);
            }
            Some((n.trunc() as i64).rem_euclid(256) as u8)
        })
        .collect()
}

/// Casts to a UUID stored as binary subtype 4.
pub fn cast_uuid(value: &Value) -> PrimitiveResult {
    if let Some(v) = passthrough(value, false) {
        return Ok(v);
    }

    let bytes = match value {
        Value::Scalar(Bson::Binary(bin)) if bin.bytes.len() == 16 => bin.bytes.clone(),
        Value::Scalar(Bson::String(s)) => uuid::Uuid::parse_str(s)
            .map(|u| u.as_bytes().to_vec())
            .map_err(|_| PrimitiveCastError::rejected("UUID", value))?,
        _ => return Err(PrimitiveCastError::rejected("UUID", value)),
    };

    Ok(Value::from(Binary {
        subtype: BinarySubtype::Uuid,
        bytes,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bytes_of(v: Value) -> Vec<u8> {
        match v {
            Value::Scalar(Bson::Binary(bin)) => bin.bytes,
            other => panic!("expected binary, got {:?}", other),
        }
    }

    #[test]
    fn test_buffer_from_string_and_array() {
        assert_eq!(bytes_of(cast_buffer(&Value::from("hi")).unwrap()), b"hi".to_vec());
        assert_eq!(
            bytes_of(cast_buffer(&Value::from(json!([1, 2, 257]))).unwrap()),
            vec![1, 2, 1]
        );
    }

    #[test]
    fn test_buffer_from_serialized_object() {
        let v = Value::from(json!({"type": "Buffer", "data": [104, 105]}));
        assert_eq!(bytes_of(cast_buffer(&v).unwrap()), b"hi".to_vec());
    }

    #[test]
    fn test_buffer_rejects_numbers() {
        assert!(cast_buffer(&Value::from(5)).is_err());
    }

    #[test]
    fn test_uuid_string() {
        let v = cast_uuid(&Value::from("09190f70-3d30-11e5-8814-0f4df9a59c41")).unwrap();
        match v {
            Value::Scalar(Bson::Binary(bin)) => {
                assert_eq!(bin.subtype, BinarySubtype::Uuid);
                assert_eq!(bin.bytes.len(), 16);
            }
            other => panic!("expected binary, got {:?}", other),
        }
        assert!(cast_uuid(&Value::from("not-a-uuid")).is_err());
    }
}
