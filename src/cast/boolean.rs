//! Boolean caster driven by configurable token lists

use bson::Bson;

use super::{passthrough, PrimitiveCastError, PrimitiveResult};
use crate::value::Value;

/// Values accepted as `true` and `false`.
#[derive(Debug, Clone, PartialEq)]
pub struct BooleanTokens {
    pub truthy: Vec<Bson>,
    pub falsy: Vec<Bson>,
}

impl Default for BooleanTokens {
    fn default() -> Self {
        Self {
            truthy: vec![
                Bson::Boolean(true),
                Bson::String("true".into()),
                Bson::Int32(1),
                Bson::String("1".into()),
                Bson::String("yes".into()),
            ],
            falsy: vec![
                Bson::Boolean(false),
                Bson::String("false".into()),
                Bson::Int32(0),
                Bson::String("0".into()),
                Bson::String("no".into()),
            ],
        }
    }
}

impl BooleanTokens {
    fn matches(list: &[Bson], value: &Bson) -> bool {
        list.iter().any(|token| token_eq(token, value))
    }
}

fn numeric(b: &Bson) -> Option<f64> {
    match b {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(d) => Some(*d),
        _ => None,
    }
}

fn token_eq(token: &Bson, value: &Bson) -> bool {
    match (numeric(token), numeric(value)) {
        (Some(a), Some(b)) => a == b,
        _ => token == value,
    }
}

/// Casts with the default token lists.
pub fn cast_boolean(value: &Value) -> PrimitiveResult {
    cast_boolean_with(value, &BooleanTokens::default())
}

/// Casts against explicit token lists.
pub fn cast_boolean_with(value: &Value, tokens: &BooleanTokens) -> PrimitiveResult {
    if let Some(v) = passthrough(value, false) {
        return Ok(v);
    }
    if let Value::Scalar(b) = value {
        if BooleanTokens::matches(&tokens.truthy, b) {
            return Ok(Value::from(true));
        }
        if BooleanTokens::matches(&tokens.falsy, b) {
            return Ok(Value::from(false));
        }
    }
    Err(PrimitiveCastError::rejected("boolean", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tokens() {
        for raw in [Value::from("yes"), Value::from("1"), Value::from(1), Value::from("true")] {
            assert_eq!(cast_boolean(&raw).unwrap(), Value::from(true));
        }
        for raw in [Value::from("no"), Value::from("0"), Value::from(0.0), Value::from(false)] {
            assert_eq!(cast_boolean(&raw).unwrap(), Value::from(false));
        }
    }

    #[test]
    fn test_unlisted_values_fail() {
        assert!(cast_boolean(&Value::from("maybe")).is_err());
        assert!(cast_boolean(&Value::from(2)).is_err());
        assert!(cast_boolean(&Value::object()).is_err());
    }

    #[test]
    fn test_custom_tokens() {
        let mut tokens = BooleanTokens::default();
        tokens.truthy.push(Bson::String("on".into()));

        assert_eq!(
            cast_boolean_with(&Value::from("on"), &tokens).unwrap(),
            Value::from(true)
        );
        assert!(cast_boolean(&Value::from("on")).is_err());
    }

    #[test]
    fn test_nullish_passthrough() {
        assert!(cast_boolean(&Value::null()).unwrap().is_null());
    }
}
