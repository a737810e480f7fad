//! Value tree shared by casting input and cast output.
//!
//! Scalars are carried as BSON values so that cast output is already in
//! the canonical storage representation. Structural values are split into
//! plain objects (raw input) and `Document` instances (already cast), so
//! callers never have to guess which one they are holding.

use std::fmt;

use bson::oid::ObjectId;
use bson::spec::BinarySubtype;
use bson::{Binary, Bson};
use linked_hash_map::LinkedHashMap;

use crate::document::Document;

/// Insertion-ordered map used for plain objects.
pub type Map = LinkedHashMap<String, Value>;

/// A value flowing through the casting engine.
#[derive(Debug, Clone)]
pub enum Value {
    /// Unset slot of a sparse array
    Hole,
    /// Any non-structural BSON value, including `Null` and `Undefined`
    Scalar(Bson),
    /// Ordered list of values
    Array(Vec<Value>),
    /// Plain structural object (not yet cast)
    Object(Map),
    /// Cast sub-document instance
    Document(Document),
}

impl Value {
    /// JavaScript-style `null`.
    pub fn null() -> Self {
        Value::Scalar(Bson::Null)
    }

    /// JavaScript-style `undefined`.
    pub fn undefined() -> Self {
        Value::Scalar(Bson::Undefined)
    }

    /// Empty plain object.
    pub fn object() -> Self {
        Value::Object(Map::new())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Scalar(Bson::Null))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Scalar(Bson::Undefined))
    }

    /// `null` or `undefined`.
    pub fn is_nullish(&self) -> bool {
        self.is_null() || self.is_undefined()
    }

    pub fn is_hole(&self) -> bool {
        matches!(self, Value::Hole)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    /// True for plain objects only; sub-document instances are excluded.
    pub fn is_plain_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::Scalar(Bson::String(_)))
    }

    pub fn is_regex(&self) -> bool {
        matches!(self, Value::Scalar(Bson::RegularExpression(_)))
    }

    /// True for any numeric BSON scalar.
    pub fn is_number(&self) -> bool {
        matches!(
            self,
            Value::Scalar(Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(Bson::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Scalar(Bson::Boolean(b)) => Some(*b),
            _ => None,
        }
    }

    /// Numeric view of integer and double scalars.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Scalar(Bson::Int32(i)) => Some(f64::from(*i)),
            Value::Scalar(Bson::Int64(i)) => Some(*i as f64),
            Value::Scalar(Bson::Double(d)) => Some(*d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut Map> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_object_id(&self) -> Option<ObjectId> {
        match self {
            Value::Scalar(Bson::ObjectId(oid)) => Some(*oid),
            _ => None,
        }
    }

    /// Looks up a dotted path through objects, sub-documents and arrays.
    pub fn get_path(&self, path: &str) -> Option<Value> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };

        let child = match self {
            Value::Object(map) => {
                // Literal dotted keys win over nested traversal
                if let Some(v) = map.get(path) {
                    return Some(v.clone());
                }
                map.get(head).cloned()
            }
            Value::Document(doc) => return doc.get(path),
            Value::Array(items) => {
                let index: usize = head.parse().ok()?;
                items.get(index).cloned()
            }
            _ => None,
        }?;

        match rest {
            Some(rest) => child.get_path(rest),
            None => Some(child),
        }
    }

    /// Type label used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Hole => "undefined",
            Value::Array(_) => "Array",
            Value::Object(_) => "Object",
            Value::Document(_) => "EmbeddedDocument",
            Value::Scalar(b) => match b {
                Bson::Null => "null",
                Bson::Undefined => "undefined",
                Bson::String(_) | Bson::Symbol(_) => "string",
                Bson::Boolean(_) => "boolean",
                Bson::Int32(_) | Bson::Double(_) => "number",
                Bson::Int64(_) => "bigint",
                Bson::Decimal128(_) => "Decimal128",
                Bson::DateTime(_) => "Date",
                Bson::ObjectId(_) => "ObjectId",
                Bson::Binary(b) if b.subtype == BinarySubtype::Uuid => "UUID",
                Bson::Binary(_) => "Buffer",
                Bson::RegularExpression(_) => "RegExp",
                Bson::Timestamp(_) => "Timestamp",
                _ => "Object",
            },
        }
    }

    /// Converts into the BSON wire representation. Holes become `null`.
    pub fn into_bson(self) -> Bson {
        match self {
            Value::Hole => Bson::Null,
            Value::Scalar(b) => b,
            Value::Array(items) => Bson::Array(items.into_iter().map(Value::into_bson).collect()),
            Value::Object(map) => Bson::Document(map_to_bson(map)),
            Value::Document(doc) => Bson::Document(doc.to_bson()),
        }
    }

    /// Deep copy with every sub-document instance flattened to a plain object.
    pub fn to_plain(&self) -> Value {
        match self {
            Value::Array(items) => Value::Array(items.iter().map(Value::to_plain).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_plain()))
                    .collect(),
            ),
            Value::Document(doc) => doc.to_value(),
            other => other.clone(),
        }
    }
}

/// Converts a plain object into a BSON document.
pub fn map_to_bson(map: Map) -> bson::Document {
    let mut doc = bson::Document::new();
    for (k, v) in map {
        doc.insert(k, v.into_bson());
    }
    doc
}

fn maps_equal(a: &Map, b: &Map) -> bool {
    a.len() == b.len() && a.iter().all(|(k, v)| b.get(k).map_or(false, |other| other == v))
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Hole, Value::Hole) => true,
            (Value::Scalar(a), Value::Scalar(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => maps_equal(a, b),
            (Value::Document(a), Value::Document(b)) => {
                a.ptr_eq(b) || maps_equal(&a.to_map(), &b.to_map())
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Hole => write!(f, "<empty>"),
            Value::Scalar(b) => fmt_bson(b, f),
            Value::Array(items) => {
                if items.is_empty() {
                    return write!(f, "[]");
                }
                write!(f, "[ ")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, " ]")
            }
            Value::Object(map) => fmt_map(map, f),
            Value::Document(doc) => fmt_map(&doc.to_map(), f),
        }
    }
}

fn fmt_map(map: &Map, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if map.is_empty() {
        return write!(f, "{{}}");
    }
    write!(f, "{{ ")?;
    for (i, (k, v)) in map.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}: {}", k, v)?;
    }
    write!(f, " }}")
}

fn fmt_bson(b: &Bson, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match b {
        Bson::Null => write!(f, "null"),
        Bson::Undefined => write!(f, "undefined"),
        Bson::String(s) => write!(f, "\"{}\"", s),
        Bson::Boolean(v) => write!(f, "{}", v),
        Bson::Int32(i) => write!(f, "{}", i),
        Bson::Int64(i) => write!(f, "{}n", i),
        Bson::Double(d) => write!(f, "{}", crate::cast::js_number_to_string(*d)),
        Bson::ObjectId(oid) => write!(f, "ObjectId(\"{}\")", oid.to_hex()),
        Bson::DateTime(dt) => match crate::cast::format_datetime(*dt) {
            Some(s) => write!(f, "{}", s),
            None => write!(f, "Invalid Date"),
        },
        Bson::Binary(bin) => {
            write!(f, "Binary(")?;
            for byte in &bin.bytes {
                write!(f, "{:02x}", byte)?;
            }
            write!(f, ")")
        }
        other => write!(f, "{}", other),
    }
}

impl From<Bson> for Value {
    fn from(b: Bson) -> Self {
        match b {
            Bson::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Bson::Document(doc) => Value::from(doc),
            other => Value::Scalar(other),
        }
    }
}

impl From<bson::Document> for Value {
    fn from(doc: bson::Document) -> Self {
        Value::Object(doc.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::null(),
            Json::Bool(b) => Value::Scalar(Bson::Boolean(b)),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    match i32::try_from(i) {
                        Ok(small) => Value::Scalar(Bson::Int32(small)),
                        Err(_) => Value::Scalar(Bson::Int64(i)),
                    }
                } else {
                    Value::Scalar(Bson::Double(n.as_f64().unwrap_or(f64::NAN)))
                }
            }
            Json::String(s) => Value::Scalar(Bson::String(s)),
            Json::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => {
                if map.len() == 1 {
                    if let Some(v) = extended_json(&map) {
                        return v;
                    }
                }
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

/// Recognizes the handful of extended JSON wrappers that carry a type the
/// plain JSON model cannot express.
fn extended_json(map: &serde_json::Map<String, serde_json::Value>) -> Option<Value> {
    let (key, inner) = map.iter().next()?;
    let text = inner.as_str();
    match key.as_str() {
        "$oid" => ObjectId::parse_str(text?).ok().map(|oid| Value::Scalar(Bson::ObjectId(oid))),
        "$numberLong" => text?.parse::<i64>().ok().map(|i| Value::Scalar(Bson::Int64(i))),
        "$numberInt" => text?.parse::<i32>().ok().map(|i| Value::Scalar(Bson::Int32(i))),
        "$numberDouble" => text?.parse::<f64>().ok().map(|d| Value::Scalar(Bson::Double(d))),
        "$date" => match inner {
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(|ms| Value::Scalar(Bson::DateTime(bson::DateTime::from_millis(ms)))),
            serde_json::Value::String(s) => crate::cast::parse_date_str(s)
                .map(|dt| Value::Scalar(Bson::DateTime(dt))),
            _ => None,
        },
        _ => None,
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Scalar(Bson::String(s.to_string()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Scalar(Bson::String(s))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Scalar(Bson::Boolean(b))
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Scalar(Bson::Int32(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Scalar(Bson::Int64(i))
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Scalar(Bson::Double(d))
    }
}

impl From<ObjectId> for Value {
    fn from(oid: ObjectId) -> Self {
        Value::Scalar(Bson::ObjectId(oid))
    }
}

impl From<Binary> for Value {
    fn from(bin: Binary) -> Self {
        Value::Scalar(Bson::Binary(bin))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Object(map)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        Value::Document(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_integers_become_int32_when_small() {
        assert_eq!(Value::from(json!(5)), Value::Scalar(Bson::Int32(5)));
        assert_eq!(
            Value::from(json!(5_000_000_000i64)),
            Value::Scalar(Bson::Int64(5_000_000_000))
        );
        assert_eq!(Value::from(json!(1.5)), Value::Scalar(Bson::Double(1.5)));
    }

    #[test]
    fn test_extended_json_object_id() {
        let v = Value::from(json!({"$oid": "5f1a2b3c4d5e6f7a8b9c0d1e"}));
        assert!(v.as_object_id().is_some());

        // Unknown `$` keys are plain objects (query operators)
        let v = Value::from(json!({"$gt": 5}));
        assert!(v.is_plain_object());
    }

    #[test]
    fn test_get_path_through_arrays() {
        let v = Value::from(json!({"a": {"b": [{"c": 1}, {"c": 2}]}}));
        assert_eq!(v.get_path("a.b.1.c"), Some(Value::from(2)));
        assert_eq!(v.get_path("a.missing"), None);
    }

    #[test]
    fn test_object_equality_ignores_order() {
        let a = Value::from(json!({"x": 1, "y": 2}));
        let b = Value::from(json!({"y": 2, "x": 1}));
        assert_eq!(a, b);
    }

    #[test]
    fn test_display_is_inspect_like() {
        let v = Value::from(json!({"name": "x", "tags": [1, 2]}));
        assert_eq!(v.to_string(), "{ name: \"x\", tags: [ 1, 2 ] }");
        assert_eq!(Value::null().to_string(), "null");
    }

    #[test]
    fn test_into_bson_replaces_holes() {
        let v = Value::Array(vec![Value::from(1), Value::Hole]);
        assert_eq!(v.into_bson(), Bson::Array(vec![Bson::Int32(1), Bson::Null]));
    }
}
