//! Embedded discriminator resolution
//!
//! A path such as `events.0.url` may only exist on one discriminator of the
//! `events` element schema. The discriminator value is read from the
//! query filter or from the update itself.

use crate::schema::{discriminator_value_string, is_positional, PathMatch, SchemaId, SchemaRegistry};
use crate::schematype::PathKind;
use crate::value::{Map, Value};

/// Looks up the discriminator value for an element at `element_path`.
///
/// Checked in order: the filter at the element path, the filter with
/// positional segments removed, `$elemMatch` on the array in the filter,
/// then the update at the element path.
fn discriminator_hint(
    element_path: &str,
    array_path: Option<&str>,
    key: &str,
    filter: Option<&Map>,
    update: Option<&Map>,
) -> Option<String> {
    let value_path = format!("{}.{}", element_path, key);
    let clean_path = value_path
        .split('.')
        .filter(|seg| !is_positional(seg))
        .collect::<Vec<_>>()
        .join(".");

    let mut hint: Option<&Value> = None;
    if let Some(filter) = filter {
        hint = filter.get(&value_path).or_else(|| filter.get(&clean_path));
        if let Some(array_path) = array_path {
            let elem_match = filter
                .get(array_path)
                .and_then(Value::as_object)
                .and_then(|cond| cond.get("$elemMatch"))
                .and_then(|cond| cond.get_path(key));
            if let Some(found) = elem_match {
                return discriminator_value_string(&found);
            }
        }
    }
    if let Some(found) = update.and_then(|u| u.get(&value_path)) {
        hint = Some(found);
    }
    hint.and_then(discriminator_value_string)
}

/// Resolves `path` through the first embedded discriminator whose value the
/// filter or update names.
pub(crate) fn embedded_discriminator_path<'a>(
    registry: &'a SchemaRegistry,
    schema: SchemaId,
    path: &str,
    filter: Option<&Map>,
    update: Option<&Map>,
) -> Option<PathMatch<'a>> {
    let parts: Vec<&str> = path.split('.').collect();
    let root = registry.schema(schema);

    for i in 0..parts.len() {
        let prefix = parts[..=i].join(".");
        let Some(st) = root.path(&prefix) else {
            continue;
        };

        let (child, element_end, array_path) = match st.kind() {
            PathKind::Subdocument(child) => (*child, i, None),
            PathKind::DocumentArray { schema: child, .. }
                if i + 1 < parts.len() && is_positional(parts[i + 1]) =>
            {
                (*child, i + 1, Some(prefix.as_str()))
            }
            _ => continue,
        };

        let child_schema = registry.schema(child);
        if child_schema.discriminators().is_empty() {
            continue;
        }

        let element_path = parts[..=element_end].join(".");
        let key = child_schema.discriminator_key();
        let Some(value) = discriminator_hint(&element_path, array_path, key, filter, update) else {
            continue;
        };
        let Some(target) = registry.discriminator_by_value(child, &value) else {
            continue;
        };

        let rest = parts[element_end + 1..].join(".");
        if rest.is_empty() {
            continue;
        }
        if let Some(found) = registry.search(target, &rest) {
            return Some(PathMatch {
                under_document_array: found.under_document_array || array_path.is_some(),
                ..found
            });
        }
    }
    None
}
