use bson::Bson;

use super::date::format_datetime;
use super::number::js_number_to_string;
use super::{passthrough, PrimitiveCastError, PrimitiveResult};
use crate::value::Value;

/// Casts to a string.
///
/// Scalars render the way JavaScript's `String()` would. Objects and
/// documents are accepted only when they carry a string `_id`; arrays are
/// always rejected.
pub fn cast_string(value: &Value) -> PrimitiveResult {
    if let Some(v) = passthrough(value, false) {
        return Ok(v);
    }

    let s = match value {
        Value::Scalar(b) => match b {
            Bson::String(s) => s.clone(),
            Bson::Symbol(s) => s.clone(),
            Bson::Int32(i) => i.to_string(),
            Bson::Int64(i) => i.to_string(),
            Bson::Double(d) => js_number_to_string(*d),
            Bson::Boolean(b) => b.to_string(),
            Bson::ObjectId(oid) => oid.to_hex(),
            Bson::Decimal128(d) => d.to_string(),
            Bson::DateTime(dt) => {
                format_datetime(*dt).ok_or_else(|| PrimitiveCastError::rejected("string", value))?
            }
            _ => return Err(PrimitiveCastError::rejected("string", value)),
        },
        Value::Object(map) => match map.get("_id") {
            Some(Value::Scalar(Bson::String(id))) => id.clone(),
            _ => return Err(PrimitiveCastError::rejected("string", value)),
        },
        Value::Document(doc) => match doc.get("_id") {
            Some(Value::Scalar(Bson::String(id))) => id,
            _ => return Err(PrimitiveCastError::rejected("string", value)),
        },
        _ => return Err(PrimitiveCastError::rejected("string", value)),
    };

    Ok(Value::from(s))
}
