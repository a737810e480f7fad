//! Schema Loader Tests
//!
//! Tests for loading model declarations from disk:
//! - Files load in name order so later files can reference earlier models
//! - Discriminators declared in a file are registered as models
//! - Malformed files are rejected with the file named
//! - Saved schemas load back into an equivalent registry

use std::fs;
use std::sync::Arc;

use docschema::schema::{SchemaFile, SchemaLoader};
use docschema::{Model, OdmConfig, SchemaRegistry, StrictMode, Value};
use serde_json::json;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn write(dir: &TempDir, name: &str, content: serde_json::Value) {
    fs::write(dir.path().join(name), content.to_string()).unwrap();
}

// =============================================================================
// Loading Tests
// =============================================================================

/// Models load in file-name order and may reference earlier models.
#[test]
fn test_load_in_name_order() {
    let tmp = TempDir::new().unwrap();
    write(
        &tmp,
        "01_address.json",
        json!({"model": "Address", "definition": {"city": "String", "zip": "Number"}}),
    );
    write(
        &tmp,
        "02_user.json",
        json!({
            "model": "User",
            "options": {"strict": "throw"},
            "definition": {"name": "String", "home": "Address", "past": ["Address"]},
        }),
    );
    fs::write(tmp.path().join("README.md"), "not a schema").unwrap();

    let mut reg = SchemaRegistry::new();
    let models = SchemaLoader::new(tmp.path()).load_all(&mut reg).unwrap();
    assert_eq!(models, vec!["Address".to_string(), "User".to_string()]);

    let reg = Arc::new(reg);
    let user = Model::new(&reg, "User").unwrap();
    assert_eq!(user.schema().strict(), StrictMode::Throw);

    let doc = user
        .create(json!({"name": "ann", "home": {"zip": "123"}, "past": [{"city": 5}]}))
        .unwrap();
    assert_eq!(doc.get("home.zip"), Some(Value::from(123)));
    assert_eq!(doc.get("past.0.city"), Some(Value::from("5")));
}

/// Discriminators declared in a file become models of their own.
#[test]
fn test_load_discriminators() {
    let tmp = TempDir::new().unwrap();
    write(
        &tmp,
        "event.json",
        json!({
            "model": "Event",
            "definition": {"time": "Date"},
            "discriminators": [
                {"name": "Clicked", "value": "click", "definition": {"url": "String"}},
                {"name": "Purchased", "definition": {"amount": "Number"}},
            ],
        }),
    );

    let mut reg = SchemaRegistry::new();
    let models = SchemaLoader::new(tmp.path()).load_all(&mut reg).unwrap();
    assert_eq!(models.len(), 3);

    let reg = Arc::new(reg);
    let event = Model::new(&reg, "Event").unwrap();
    let doc = event
        .hydrate(json!({"__t": "Purchased", "amount": "9"}), None)
        .unwrap();
    assert_eq!(doc.schema_id(), Model::new(&reg, "Purchased").unwrap().schema_id());
    assert_eq!(doc.get("amount"), Some(Value::from(9)));
}

/// A missing directory is created and yields no models.
#[test]
fn test_missing_directory_is_created() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("schemas");

    let mut reg = SchemaRegistry::new();
    let models = SchemaLoader::new(&dir).load_all(&mut reg).unwrap();
    assert!(models.is_empty());
    assert!(dir.is_dir());
}

// =============================================================================
// Error Tests
// =============================================================================

/// Invalid JSON names the offending file.
#[test]
fn test_invalid_json_rejected() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("broken.json"), "{ not json").unwrap();

    let mut reg = SchemaRegistry::new();
    let err = SchemaLoader::new(tmp.path()).load_all(&mut reg).unwrap_err();
    assert_eq!(err.name(), "SchemaError");
    assert!(err.to_string().contains("broken.json"));
    assert!(err.to_string().contains("Invalid JSON"));
}

/// Unknown type names are definition errors.
#[test]
fn test_unknown_type_rejected() {
    let tmp = TempDir::new().unwrap();
    write(&tmp, "bad.json", json!({"model": "Bad", "definition": {"x": "Nope"}}));

    let mut reg = SchemaRegistry::new();
    let err = SchemaLoader::new(tmp.path()).load_all(&mut reg).unwrap_err();
    assert!(err.to_string().contains("bad.json"));
    assert!(err.to_string().contains("Nope"));
}

/// Two files may not declare the same model.
#[test]
fn test_duplicate_model_rejected() {
    let tmp = TempDir::new().unwrap();
    write(&tmp, "a.json", json!({"model": "Thing", "definition": {}}));
    write(&tmp, "b.json", json!({"model": "Thing", "definition": {}}));

    let mut reg = SchemaRegistry::new();
    let err = SchemaLoader::new(tmp.path()).load_all(&mut reg).unwrap_err();
    assert_eq!(err.name(), "OverwriteModelError");
}

// =============================================================================
// Save Tests
// =============================================================================

/// A saved declaration loads back; saving twice is refused.
#[test]
fn test_save_then_load() {
    let tmp = TempDir::new().unwrap();
    let loader = SchemaLoader::new(tmp.path());
    let file: SchemaFile = serde_json::from_value(json!({
        "model": "Note",
        "definition": {"body": {"type": "String", "trim": true}},
    }))
    .unwrap();

    let path = loader.save_schema(&file).unwrap();
    assert!(path.ends_with("Note.json"));
    assert!(loader.save_schema(&file).is_err());

    let mut reg = SchemaRegistry::new();
    assert_eq!(loader.load_all(&mut reg).unwrap(), vec!["Note".to_string()]);

    let reg = Arc::new(reg);
    let doc = Model::new(&reg, "Note")
        .unwrap()
        .create(json!({"body": "  hi  "}))
        .unwrap();
    assert_eq!(doc.get("body"), Some(Value::from("hi")));
}

// =============================================================================
// Configuration Tests
// =============================================================================

/// Engine configuration loads from a file; omitted fields keep defaults.
#[test]
fn test_config_from_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("docschema.json");
    fs::write(&path, r#"{"strict": "throw", "discriminatorKey": "kind"}"#).unwrap();

    let config = OdmConfig::from_file(&path).unwrap();
    assert_eq!(config.strict, StrictMode::Throw);
    assert_eq!(config.discriminator_key, "kind");
    assert_eq!(config.strict_query, StrictMode::Allow);
    assert!(config.auto_id);

    let mut reg = SchemaRegistry::with_config(config);
    let id = reg.compile_json(&json!({}), Default::default()).unwrap();
    assert_eq!(reg.schema(id).discriminator_key(), "kind");
    assert_eq!(reg.schema(id).strict(), StrictMode::Throw);

    assert!(OdmConfig::from_file(&tmp.path().join("missing.json")).is_err());
}
