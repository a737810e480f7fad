//! Single nested sub-documents

use std::sync::Arc;

use super::{query, CastOptions, SchemaPath};
use crate::document::{Document, DocumentOptions};
use crate::errors::{CastError, ObjectExpectedError, OdmError, OdmResult};
use crate::schema::{SchemaId, SchemaRegistry};
use crate::value::Value;

pub(super) fn cast(
    path: &SchemaPath,
    schema: SchemaId,
    registry: &Arc<SchemaRegistry>,
    value: Value,
    opts: &CastOptions<'_>,
) -> OdmResult<Value> {
    let raw = match value {
        v if v.is_nullish() => return Ok(v),
        Value::Document(doc) if !opts.init && registry.is_instance_of(doc.schema_id(), schema) => {
            return Ok(Value::Document(doc));
        }
        Value::Document(doc) => doc.to_map(),
        Value::Object(map) => map,
        other => return Err(ObjectExpectedError::new(path.path(), &other).into()),
    };

    let original = Value::Object(raw.clone());
    let target = registry.resolve_discriminator(schema, &raw);
    let selected = opts.selected.and_then(|s| s.scoped(path.path()));

    // The owner's root schema governs strict mode inside the child
    let base = opts.doc.map(Document::child_options).unwrap_or_default();

    let result = if opts.init {
        Document::hydrate_with(
            registry,
            target,
            Value::Object(raw),
            DocumentOptions { selected, ..base },
        )
    } else {
        // The prior value is merge context for immutable paths
        let prior = opts.prior.and_then(Value::as_document).cloned();
        let is_new = match (&prior, opts.doc) {
            (Some(_), Some(owner)) => owner.is_new(),
            _ => true,
        };
        Document::build(
            registry,
            target,
            Value::Object(raw),
            DocumentOptions {
                prior,
                is_new,
                selected,
                ..base
            },
        )
    };

    result
        .map(Value::Document)
        .map_err(|err| embed_error(path, &original, err))
}

/// Child failures surface as an `Embedded` cast error at the parent path.
/// Aggregates and strict-mode errors pass through unchanged.
fn embed_error(path: &SchemaPath, value: &Value, err: OdmError) -> OdmError {
    let passthrough = match &err {
        OdmError::Validation(_) | OdmError::StrictMode(_) => true,
        OdmError::Cast(c) => c.path() == path.path() && c.kind() == "Embedded",
        _ => false,
    };
    if passthrough {
        return err;
    }
    CastError::new("Embedded", value, path.path())
        .with_reason(err)
        .into()
}

pub(super) fn cast_for_query(
    path: &SchemaPath,
    schema: SchemaId,
    registry: &Arc<SchemaRegistry>,
    operator: Option<&str>,
    value: Value,
) -> OdmResult<Value> {
    if operator.is_some() {
        return query::cast_base(path, registry, operator, value);
    }

    let raw = match value {
        v if v.is_nullish() => return Ok(v),
        Value::Document(doc) => return Ok(Value::Document(doc)),
        Value::Object(map) => map,
        other => {
            let reason: OdmError =
                crate::errors::ObjectParameterError::new(&other, "obj", "Document").into();
            return Err(CastError::new("Embedded", &other, path.path())
                .with_reason(reason)
                .into());
        }
    };

    let original = Value::Object(raw.clone());
    let target = registry.resolve_discriminator(schema, &raw);
    Document::build(registry, target, Value::Object(raw), DocumentOptions::default())
        .map(Value::Document)
        .map_err(|err| match err {
            OdmError::Cast(_) => err,
            other => CastError::new("Embedded", &original, path.path())
                .with_reason(other)
                .into(),
        })
}
