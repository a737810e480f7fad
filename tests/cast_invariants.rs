//! Cast Invariant Tests
//!
//! Properties every cast must hold:
//! - Nullish input passes through every primitive caster
//! - Casting an already cast value is a no-op
//! - Int32 and BigInt reject values outside their range
//! - Array element failures name the element, not the array
//! - Document arrays reuse sub-documents matched by `_id`
//! - Sub-document failures surface at the parent path

use std::sync::Arc;

use docschema::cast::{
    cast_bigint, cast_boolean, cast_buffer, cast_date, cast_decimal128, cast_double, cast_int32,
    cast_number, cast_object_id, cast_string, cast_uuid, PrimitiveResult, BIGINT_RANGE_MESSAGE,
};
use docschema::schema::FieldDef;
use docschema::schematype::CastOptions;
use docschema::{
    Document, SchemaDefinition, SchemaId, SchemaOptions, SchemaRegistry, StrictMode, Value,
};
use serde_json::json;

type Caster = fn(&Value) -> PrimitiveResult;

const CASTERS: &[(&str, Caster)] = &[
    ("Number", cast_number),
    ("Int32", cast_int32),
    ("Double", cast_double),
    ("BigInt", cast_bigint),
    ("Boolean", cast_boolean),
    ("String", cast_string),
    ("Date", cast_date),
    ("ObjectId", cast_object_id),
    ("Buffer", cast_buffer),
    ("UUID", cast_uuid),
    ("Decimal128", cast_decimal128),
];

const ID1: &str = "5f0c8d1e9b1e8a3c2d4f6a7b";

// =============================================================================
// Helper Functions
// =============================================================================

fn compile(def: serde_json::Value, options: SchemaOptions) -> (Arc<SchemaRegistry>, SchemaId) {
    let mut reg = SchemaRegistry::new();
    let id = reg.compile_json(&def, options).unwrap();
    (Arc::new(reg), id)
}

// =============================================================================
// Nullish Identity Tests
// =============================================================================

/// null and undefined come back unchanged from every caster.
#[test]
fn test_nullish_identity() {
    for (name, caster) in CASTERS {
        assert_eq!(caster(&Value::null()).unwrap(), Value::null(), "{} null", name);
        let undefined = caster(&Value::undefined()).unwrap();
        assert!(undefined.is_undefined(), "{} undefined", name);
    }
}

// =============================================================================
// Idempotence Tests
// =============================================================================

/// cast(cast(x)) == cast(x) for inputs that cast successfully.
#[test]
fn test_casting_is_idempotent() {
    let inputs: Vec<(Caster, Value)> = vec![
        (cast_number, Value::from("42")),
        (cast_number, Value::from(1.5)),
        (cast_number, Value::from(true)),
        (cast_int32, Value::from("-7")),
        (cast_double, Value::from("2.25")),
        (cast_bigint, Value::from("9007199254740993")),
        (cast_boolean, Value::from("yes")),
        (cast_boolean, Value::from(0)),
        (cast_string, Value::from(12)),
        (cast_date, Value::from("2020-01-02T03:04:05Z")),
        (cast_date, Value::from(1_600_000_000_000i64)),
        (cast_object_id, Value::from(ID1)),
        (cast_buffer, Value::from("bytes")),
        (cast_uuid, Value::from("09190f70-3d30-11e5-8814-0f4df9a59c41")),
        (cast_decimal128, Value::from("1.10")),
    ];

    for (caster, input) in inputs {
        let once = caster(&input).unwrap();
        let twice = caster(&once).unwrap();
        assert_eq!(once, twice, "input {:?}", input);
    }
}

// =============================================================================
// Boundary Tests
// =============================================================================

/// Int32 accepts the full signed 32-bit range and nothing else.
#[test]
fn test_int32_boundary() {
    assert_eq!(
        cast_int32(&Value::from(2_147_483_647i64)).unwrap(),
        Value::from(2_147_483_647)
    );
    assert_eq!(
        cast_int32(&Value::from(-2_147_483_648i64)).unwrap(),
        Value::from(-2_147_483_648)
    );
    assert!(cast_int32(&Value::from(2_147_483_648i64)).is_err());
    assert!(cast_int32(&Value::from(1.5)).is_err());
}

/// BigInt stops at the signed 64-bit range and says so.
#[test]
fn test_bigint_boundary() {
    assert_eq!(
        cast_bigint(&Value::from("9223372036854775807")).unwrap(),
        Value::from(i64::MAX)
    );
    let err = cast_bigint(&Value::from("9223372036854775808")).unwrap_err();
    assert_eq!(err.message(), BIGINT_RANGE_MESSAGE);
    assert!(err.message().contains("9223372036854775807"));
}

// =============================================================================
// Array Element Isolation Tests
// =============================================================================

/// The failing element is reported, at the array's own path.
#[test]
fn test_array_element_isolation() {
    let (reg, id) = compile(json!({"nums": ["Number"]}), SchemaOptions::new());
    let nums = reg.schema(id).path("nums").unwrap();

    let err = nums
        .cast(&reg, Value::from(json!([1, "x", 3])), &CastOptions::default())
        .unwrap_err();
    let cast = err.as_cast().unwrap();
    assert_eq!(cast.value(), &Value::from("x"));
    assert_eq!(cast.path(), "nums");
}

/// Documents report the same failure at the array path.
#[test]
fn test_array_element_failure_through_document() {
    let (reg, id) = compile(json!({"nums": ["Number"]}), SchemaOptions::new());
    let err = Document::new(&reg, id, json!({"nums": [1, "x", 3]})).unwrap_err();
    assert_eq!(err.name(), "CastError");
    assert_eq!(err.path(), Some("nums"));
}

// =============================================================================
// Document Array Identity Tests
// =============================================================================

/// Re-assigning an array keeps the sub-document whose `_id` matches, along
/// with its pending modifications.
#[test]
fn test_document_array_reuses_matching_element() {
    let (reg, id) = compile(
        json!({"comments": [{"body": "String", "votes": "Number"}]}),
        SchemaOptions::new(),
    );
    let doc = Document::new(&reg, id, json!({"comments": [{"_id": ID1, "body": "a"}]})).unwrap();

    let first = doc.get("comments.0").unwrap().as_document().cloned().unwrap();
    first.set("votes", 3).unwrap();
    assert!(first.is_modified("votes"));

    doc.set(
        "comments",
        json!([{"_id": ID1, "body": "b"}, {"body": "c"}]),
    )
    .unwrap();

    let reused = doc.get("comments.0").unwrap().as_document().cloned().unwrap();
    assert!(reused.ptr_eq(&first));
    assert_eq!(reused.get("body"), Some(Value::from("b")));
    assert_eq!(reused.get("votes"), Some(Value::from(3)));
    assert!(reused.is_modified("votes"));

    let added = doc.get("comments.1").unwrap().as_document().cloned().unwrap();
    assert!(!added.ptr_eq(&first));
}

// =============================================================================
// Strict Mode Tests
// =============================================================================

/// Drop silently removes unknown fields.
#[test]
fn test_strict_drop_removes_unknown_fields() {
    let (reg, id) = compile(json!({"name": "String"}), SchemaOptions::new().strict(StrictMode::Drop));
    let doc = Document::new(&reg, id, json!({"name": "a", "unknownField": 1})).unwrap();
    assert_eq!(doc.get("unknownField"), None);
    assert_eq!(doc.get("name"), Some(Value::from("a")));
}

/// Throw names the unknown field.
#[test]
fn test_strict_throw_names_unknown_field() {
    let (reg, id) = compile(json!({"name": "String"}), SchemaOptions::new().strict(StrictMode::Throw));
    let err = Document::new(&reg, id, json!({"unknownField": 1})).unwrap_err();
    assert_eq!(err.name(), "StrictModeError");
    assert_eq!(err.as_strict_mode().unwrap().path(), "unknownField");
}

// =============================================================================
// Embedded Error Tests
// =============================================================================

/// A child cast failure is re-kinded as `Embedded` at the parent path and
/// keeps the original error as its reason.
#[test]
fn test_embedded_rekinding() {
    let mut reg = SchemaRegistry::new();
    let profile = reg
        .compile_json(&json!({"age": "Number"}), SchemaOptions::new())
        .unwrap();
    let user = reg
        .compile(
            SchemaDefinition::new()
                .field("name", FieldDef::string())
                .field("profile", FieldDef::schema(profile)),
            SchemaOptions::new(),
        )
        .unwrap();
    let reg = Arc::new(reg);

    let err = Document::new(&reg, user, json!({"profile": {"age": "old"}})).unwrap_err();
    let cast = err.as_cast().unwrap();
    assert_eq!(cast.kind(), "Embedded");
    assert_eq!(cast.path(), "profile");

    let reason = cast.reason().unwrap().as_cast().unwrap();
    assert_eq!(reason.kind(), "Number");
    assert_eq!(reason.path(), "age");
    assert_eq!(reason.value(), &Value::from("old"));
}
