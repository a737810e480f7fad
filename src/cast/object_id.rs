use bson::oid::ObjectId;
use bson::Bson;

use super::{passthrough, PrimitiveCastError, PrimitiveResult};
use crate::value::Value;

/// Casts to an ObjectId.
///
/// Accepts ObjectIds, 24-character hex strings, 12-byte binaries, and
/// objects or documents carrying a castable `_id`.
pub fn cast_object_id(value: &Value) -> PrimitiveResult {
    if let Some(v) = passthrough(value, false) {
        return Ok(v);
    }

    match value {
        Value::Scalar(Bson::ObjectId(oid)) => Ok(Value::from(*oid)),
        Value::Scalar(Bson::String(s)) if s.len() == 24 => ObjectId::parse_str(s)
            .map(Value::from)
            .map_err(|_| PrimitiveCastError::rejected("ObjectId", value)),
        Value::Scalar(Bson::Binary(bin)) if bin.bytes.len() == 12 => {
            let mut bytes = [0u8; 12];
            bytes.copy_from_slice(&bin.bytes);
            Ok(Value::from(ObjectId::from_bytes(bytes)))
        }
        Value::Object(map) => match map.get("_id") {
            Some(id) if !id.is_nullish() => cast_object_id(id),
            _ => Err(PrimitiveCastError::rejected("ObjectId", value)),
        },
        Value::Document(doc) => match doc.get("_id") {
            Some(id) if !id.is_nullish() => cast_object_id(&id),
            _ => Err(PrimitiveCastError::rejected("ObjectId", value)),
        },
        _ => Err(PrimitiveCastError::rejected("ObjectId", value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const HEX: &str = "5f1a2b3c4d5e6f7a8b9c0d1e";

    #[test]
    fn test_hex_string() {
        let v = cast_object_id(&Value::from(HEX)).unwrap();
        assert_eq!(v.as_object_id().unwrap().to_hex(), HEX);
    }

    #[test]
    fn test_wrong_length_string_fails() {
        assert!(cast_object_id(&Value::from("abc")).is_err());
        assert!(cast_object_id(&Value::from("zz1a2b3c4d5e6f7a8b9c0d1e")).is_err());
    }

    #[test]
    fn test_object_with_id() {
        let v = cast_object_id(&Value::from(json!({"_id": HEX, "name": "x"}))).unwrap();
        assert_eq!(v.as_object_id().unwrap().to_hex(), HEX);

        assert!(cast_object_id(&Value::from(json!({"name": "x"}))).is_err());
    }

    #[test]
    fn test_numbers_fail() {
        assert!(cast_object_id(&Value::from(12)).is_err());
    }
}
