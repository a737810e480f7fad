//! Query operator handlers for scalar and map paths
//!
//! Each type supports a fixed operator table. Operators outside the table
//! are rejected with `Can't use <op> with <Type>.`

use std::sync::Arc;

use bson::Bson;

use super::{CastOptions, ScalarType, SchemaPath};
use crate::cast::{cast_boolean, cast_number, cast_string};
use crate::errors::{CastError, OdmError, OdmResult};
use crate::schema::SchemaRegistry;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handler {
    /// Cast the operand like a plain value
    Single,
    /// Cast each element of the operand
    Array,
    Exists,
    Type,
    Bitwise,
    Regex,
    Options,
}

/// Operators every path type accepts.
fn base_handler(op: &str) -> Option<Handler> {
    match op {
        "$all" | "$in" | "$nin" => Some(Handler::Array),
        "$eq" | "$ne" | "$not" => Some(Handler::Single),
        "$exists" => Some(Handler::Exists),
        "$type" => Some(Handler::Type),
        _ => None,
    }
}

fn scalar_handler(ty: ScalarType, op: &str) -> Option<Handler> {
    if let Some(h) = base_handler(op) {
        return Some(h);
    }
    match op {
        "$gt" | "$gte" | "$lt" | "$lte" if ty.is_ordered() => Some(Handler::Single),
        "$bitsAllClear" | "$bitsAnyClear" | "$bitsAllSet" | "$bitsAnySet"
            if ty.supports_bitwise() =>
        {
            Some(Handler::Bitwise)
        }
        "$mod" if ty == ScalarType::Number => Some(Handler::Array),
        "$regex" if ty == ScalarType::String => Some(Handler::Regex),
        "$options" if ty == ScalarType::String => Some(Handler::Options),
        _ => None,
    }
}

pub(super) fn cast_scalar(
    path: &SchemaPath,
    ty: ScalarType,
    registry: &Arc<SchemaRegistry>,
    operator: Option<&str>,
    value: Value,
) -> OdmResult<Value> {
    let Some(op) = operator else {
        if ty == ScalarType::String && value.is_regex() {
            return Ok(value);
        }
        return path.apply_setters(registry, value, &CastOptions::default());
    };

    let handler = scalar_handler(ty, op)
        .ok_or_else(|| OdmError::operator(format!("Can't use {} with {}.", op, ty.name())))?;
    run(path, registry, handler, value)
}

/// Base handlers only, for paths without a type-specific table.
pub(super) fn cast_base(
    path: &SchemaPath,
    registry: &Arc<SchemaRegistry>,
    operator: Option<&str>,
    value: Value,
) -> OdmResult<Value> {
    let Some(op) = operator else {
        return path.apply_setters(registry, value, &CastOptions::default());
    };
    let handler = base_handler(op)
        .ok_or_else(|| OdmError::operator(format!("Can't use {} with {}.", op, path.instance())))?;
    run(path, registry, handler, value)
}

fn run(
    path: &SchemaPath,
    registry: &Arc<SchemaRegistry>,
    handler: Handler,
    value: Value,
) -> OdmResult<Value> {
    match handler {
        Handler::Single => {
            if value.is_regex() {
                return Ok(value);
            }
            path.cast_for_query(registry, None, value)
        }
        Handler::Array => {
            let items = match value {
                Value::Array(items) => items,
                other => vec![other],
            };
            items
                .into_iter()
                .map(|item| path.cast_for_query(registry, None, item))
                .collect::<OdmResult<Vec<_>>>()
                .map(Value::Array)
        }
        Handler::Exists => cast_exists(path, value),
        Handler::Type => cast_type(value),
        Handler::Bitwise => match value {
            Value::Array(items) => items
                .into_iter()
                .map(|item| number_operand(path, item))
                .collect::<OdmResult<Vec<_>>>()
                .map(Value::Array),
            Value::Scalar(Bson::Binary(_)) => Ok(value),
            other => number_operand(path, other),
        },
        Handler::Regex => {
            if value.is_regex() {
                Ok(value)
            } else {
                string_operand(path, value)
            }
        }
        Handler::Options => string_operand(path, value),
    }
}

fn number_operand(path: &SchemaPath, value: Value) -> OdmResult<Value> {
    cast_number(&value).map_err(|reason| {
        CastError::new("number", &value, path.path())
            .with_reason(reason)
            .into()
    })
}

fn string_operand(path: &SchemaPath, value: Value) -> OdmResult<Value> {
    cast_string(&value).map_err(|reason| {
        CastError::new("String", &value, path.path())
            .with_reason(reason)
            .into()
    })
}

pub(super) fn cast_options(path: &SchemaPath, value: Value) -> OdmResult<Value> {
    string_operand(path, value)
}

pub(super) fn cast_exists(path: &SchemaPath, value: Value) -> OdmResult<Value> {
    cast_boolean(&value).map_err(|reason| {
        CastError::new("Boolean", &value, path.path())
            .with_reason(reason)
            .into()
    })
}

/// `$type` accepts a number, a string, or an array of those.
pub(super) fn cast_type(value: Value) -> OdmResult<Value> {
    let valid = |v: &Value| v.is_number() || v.is_string();
    let ok = match &value {
        Value::Array(items) => items.iter().all(valid),
        other => valid(other),
    };
    if ok {
        Ok(value)
    } else {
        Err(OdmError::operator(format!(
            "$type parameter must be number, string, or array of numbers and strings, got {}",
            value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schematype::PathOptions;
    use serde_json::json;

    fn registry() -> Arc<SchemaRegistry> {
        Arc::new(SchemaRegistry::new())
    }

    #[test]
    fn test_number_comparison_operators() {
        let reg = registry();
        let age = SchemaPath::scalar("age", ScalarType::Number);
        assert_eq!(
            age.cast_for_query(&reg, Some("$gte"), Value::from("18")).unwrap(),
            Value::from(18)
        );
        assert_eq!(
            age.cast_for_query(&reg, Some("$in"), Value::from(json!(["1", 2])))
                .unwrap(),
            Value::from(json!([1, 2]))
        );
    }

    #[test]
    fn test_unsupported_operator_message() {
        let reg = registry();
        let flag = SchemaPath::scalar("active", ScalarType::Boolean);
        let err = flag
            .cast_for_query(&reg, Some("$gt"), Value::from(true))
            .unwrap_err();
        assert_eq!(err.to_string(), "Can't use $gt with Boolean.");

        let name = SchemaPath::scalar("name", ScalarType::String);
        let err = name
            .cast_for_query(&reg, Some("$size"), Value::from(1))
            .unwrap_err();
        assert_eq!(err.to_string(), "Can't use $size with String.");
    }

    #[test]
    fn test_exists_casts_to_boolean() {
        let reg = registry();
        let name = SchemaPath::scalar("name", ScalarType::String);
        assert_eq!(
            name.cast_for_query(&reg, Some("$exists"), Value::from("yes"))
                .unwrap(),
            Value::from(true)
        );
    }

    #[test]
    fn test_string_regex_passes_through() {
        let reg = registry();
        let name = SchemaPath::scalar("name", ScalarType::String)
            .with_options(PathOptions::new().lowercase());
        let re = Value::Scalar(Bson::RegularExpression(bson::Regex {
            pattern: "^A".into(),
            options: "i".into(),
        }));
        assert_eq!(name.cast_for_query(&reg, None, re.clone()).unwrap(), re);
        assert_eq!(
            name.cast_for_query(&reg, Some("$regex"), Value::from("^a"))
                .unwrap(),
            Value::from("^a")
        );
    }

    #[test]
    fn test_query_applies_setters() {
        let reg = registry();
        let email = SchemaPath::scalar("email", ScalarType::String)
            .with_options(PathOptions::new().lowercase());
        assert_eq!(
            email.cast_for_query(&reg, None, Value::from("A@B.C")).unwrap(),
            Value::from("a@b.c")
        );
    }

    #[test]
    fn test_bitwise_operands() {
        let reg = registry();
        let flags = SchemaPath::scalar("flags", ScalarType::Number);
        assert_eq!(
            flags
                .cast_for_query(&reg, Some("$bitsAllSet"), Value::from(json!(["1", 5])))
                .unwrap(),
            Value::from(json!([1, 5]))
        );
    }

    #[test]
    fn test_type_operand_validation() {
        assert!(cast_type(Value::from("string")).is_ok());
        assert!(cast_type(Value::from(json!([2, "date"]))).is_ok());
        assert!(cast_type(Value::from(json!({"a": 1}))).is_err());
    }
}
