//! Path search across nested schemas
//!
//! Exact lookup (`Schema::path`) only sees paths declared on one schema.
//! Search additionally walks into arrays, sub-documents, document arrays
//! and maps, treating numeric segments and the positional operators `$`,
//! `$[]` and `$[name]` as "any element".

use super::registry::{SchemaId, SchemaRegistry};
use crate::schematype::{PathKind, SchemaPath};
use crate::value::Value;

/// Result of a search lookup.
#[derive(Debug, Clone, Copy)]
pub struct PathMatch<'a> {
    pub schema_type: &'a SchemaPath,
    /// The schema that declares `schema_type`
    pub owner: SchemaId,
    /// True when the path is reached through a document array
    pub under_document_array: bool,
}

/// Classification returned by `SchemaRegistry::path_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathType {
    /// Declared path, or a path resolved inside a sub-schema or map
    Real,
    /// Prefix of nested declared paths
    Nested,
    Virtual,
    /// Positional element of an array of scalars
    Array,
    /// Beneath a Mixed path
    Mixed,
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathTypeInfo {
    pub kind: PathType,
    /// The schema the answer came from
    pub owner: SchemaId,
}

/// `$`, `$[]`, `$[name]` or an array index.
pub(crate) fn is_positional(segment: &str) -> bool {
    segment == "$"
        || (segment.starts_with("$[") && segment.ends_with(']'))
        || (!segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()))
}

impl SchemaRegistry {
    /// Finds the path type governing `path`, descending into nested
    /// schemas. The longest declared prefix wins.
    pub fn search(&self, id: SchemaId, path: &str) -> Option<PathMatch<'_>> {
        let schema = self.schema(id);
        if let Some(st) = schema.path(path) {
            return Some(PathMatch {
                schema_type: st,
                owner: id,
                under_document_array: false,
            });
        }

        let parts: Vec<&str> = path.split('.').collect();
        for i in (1..parts.len()).rev() {
            let prefix = parts[..i].join(".");
            if let Some(st) = schema.path(&prefix) {
                return self.descend(st, id, &parts[i..]);
            }
        }
        None
    }

    fn descend<'a>(
        &'a self,
        st: &'a SchemaPath,
        owner: SchemaId,
        rest: &[&str],
    ) -> Option<PathMatch<'a>> {
        let found = |schema_type: &'a SchemaPath| {
            Some(PathMatch {
                schema_type,
                owner,
                under_document_array: false,
            })
        };
        let Some((head, tail)) = rest.split_first() else {
            return found(st);
        };

        match st.kind() {
            PathKind::Mixed => found(st),
            PathKind::Scalar(_) => None,
            PathKind::Array(caster) => {
                if caster.is_mixed() {
                    return found(caster);
                }
                if is_positional(head) {
                    return self.descend(caster, owner, tail);
                }
                None
            }
            PathKind::DocumentArray { schema, element } => {
                let rest = if is_positional(head) { tail } else { rest };
                if rest.is_empty() {
                    return Some(PathMatch {
                        schema_type: element,
                        owner,
                        under_document_array: true,
                    });
                }
                self.search(*schema, &rest.join(".")).map(|m| PathMatch {
                    under_document_array: true,
                    ..m
                })
            }
            PathKind::Subdocument(schema) => self.search(*schema, &rest.join(".")),
            PathKind::Map(of) => {
                if tail.is_empty() {
                    return found(of);
                }
                match of.kind() {
                    PathKind::Mixed => found(of),
                    PathKind::Subdocument(schema) => self.search(*schema, &tail.join(".")),
                    _ => self.descend(of, owner, tail),
                }
            }
        }
    }

    /// Discriminator-aware search.
    ///
    /// When `path` runs through a document array whose element schema has
    /// discriminators, `doc` (the document the path is evaluated against)
    /// selects the concrete element schema by index. Without a concrete
    /// element, every candidate schema that declares the remaining path is
    /// returned.
    pub fn search_types(&self, id: SchemaId, path: &str, doc: Option<&Value>) -> Vec<PathMatch<'_>> {
        let schema = self.schema(id);
        let parts: Vec<&str> = path.split('.').collect();

        for i in 1..parts.len() {
            let prefix = parts[..i].join(".");
            let Some(st) = schema.path(&prefix) else {
                continue;
            };
            let PathKind::DocumentArray { schema: child, .. } = st.kind() else {
                break;
            };
            let child_schema = self.schema(*child);
            if child_schema.discriminators().is_empty() {
                break;
            }

            let (index, rest) = match parts[i..].split_first() {
                Some((head, tail)) if is_positional(head) => (Some(*head), tail),
                _ => (None, &parts[i..]),
            };
            let sub_path = rest.join(".");

            let element = index
                .zip(doc)
                .and_then(|(index, doc)| doc.get_path(&format!("{}.{}", prefix, index)));
            if let Some(element) = element {
                let target = match element.as_object() {
                    Some(map) => self.resolve_discriminator(*child, map),
                    None => match element.as_document() {
                        Some(d) => d.schema_id(),
                        None => *child,
                    },
                };
                return self
                    .search(target, &sub_path)
                    .map(|m| PathMatch {
                        under_document_array: true,
                        ..m
                    })
                    .into_iter()
                    .collect();
            }

            let candidates = std::iter::once(*child)
                .chain(child_schema.discriminators().values().map(|d| d.schema));
            return candidates
                .filter_map(|sid| self.search(sid, &sub_path))
                .map(|m| PathMatch {
                    under_document_array: true,
                    ..m
                })
                .collect();
        }

        self.search(id, path).into_iter().collect()
    }

    /// Classifies `path` relative to schema `id`.
    pub fn path_type(&self, id: SchemaId, path: &str) -> PathTypeInfo {
        let schema = self.schema(id);
        let info = |kind| PathTypeInfo { kind, owner: id };

        if schema.path(path).is_some() {
            return info(PathType::Real);
        }
        if schema.is_virtual(path) {
            return info(PathType::Virtual);
        }
        if schema.has_nested(path) {
            return info(PathType::Nested);
        }

        let parts: Vec<&str> = path.split('.').collect();
        for i in (1..parts.len()).rev() {
            let prefix = parts[..i].join(".");
            let Some(st) = schema.path(&prefix) else {
                continue;
            };
            let rest = &parts[i..];
            return match st.kind() {
                PathKind::Mixed => info(PathType::Mixed),
                PathKind::Scalar(_) => info(PathType::Undefined),
                PathKind::Array(caster) => {
                    if caster.is_mixed() {
                        info(PathType::Mixed)
                    } else if rest.len() == 1 && is_positional(rest[0]) {
                        info(PathType::Array)
                    } else if self.descend(st, id, rest).is_some() {
                        info(PathType::Real)
                    } else {
                        info(PathType::Undefined)
                    }
                }
                PathKind::DocumentArray { schema: child, .. } => {
                    let rest = match rest.split_first() {
                        Some((head, tail)) if is_positional(head) => tail,
                        _ => rest,
                    };
                    if rest.is_empty() {
                        info(PathType::Real)
                    } else {
                        self.path_type(*child, &rest.join("."))
                    }
                }
                PathKind::Subdocument(child) => self.path_type(*child, &rest.join(".")),
                PathKind::Map(of) => {
                    if rest.len() == 1 {
                        return info(PathType::Real);
                    }
                    match of.kind() {
                        PathKind::Mixed => info(PathType::Mixed),
                        PathKind::Subdocument(child) => {
                            self.path_type(*child, &rest[1..].join("."))
                        }
                        _ => info(PathType::Undefined),
                    }
                }
            };
        }
        info(PathType::Undefined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaOptions;
    use serde_json::json;

    fn registry() -> (SchemaRegistry, SchemaId) {
        let mut reg = SchemaRegistry::new();
        let id = reg
            .compile_json(
                &json!({
                    "name": "String",
                    "tags": ["String"],
                    "matrix": [["Number"]],
                    "bag": [],
                    "meta": "Mixed",
                    "profile": {"type": {"bio": "String"}},
                    "comments": [{"body": "String", "votes": ["Number"]}],
                    "scores": {"type": "Map", "of": "Number"},
                    "address": {"city": "String"},
                }),
                SchemaOptions::new(),
            )
            .unwrap();
        (reg, id)
    }

    #[test]
    fn test_positional_segments() {
        assert!(is_positional("$"));
        assert!(is_positional("$[]"));
        assert!(is_positional("$[elem]"));
        assert!(is_positional("12"));
        assert!(!is_positional("name"));
        assert!(!is_positional(""));
    }

    #[test]
    fn test_search_into_arrays() {
        let (reg, id) = registry();
        let m = reg.search(id, "tags.$").unwrap();
        assert_eq!(m.schema_type.instance(), "String");

        let m = reg.search(id, "matrix.0.1").unwrap();
        assert_eq!(m.schema_type.instance(), "Number");

        let m = reg.search(id, "bag.anything.here").unwrap();
        assert!(m.schema_type.is_mixed());

        assert!(reg.search(id, "tags.foo").is_none());
    }

    #[test]
    fn test_search_into_document_arrays_and_subdocs() {
        let (reg, id) = registry();

        let m = reg.search(id, "comments.$[].body").unwrap();
        assert_eq!(m.schema_type.instance(), "String");
        assert!(m.under_document_array);
        assert_ne!(m.owner, id);

        let m = reg.search(id, "comments.3.votes.$").unwrap();
        assert_eq!(m.schema_type.instance(), "Number");

        let m = reg.search(id, "comments.body").unwrap();
        assert_eq!(m.schema_type.instance(), "String");

        let m = reg.search(id, "profile.bio").unwrap();
        assert_eq!(m.schema_type.instance(), "String");
        assert!(!m.under_document_array);
    }

    #[test]
    fn test_search_maps_and_mixed() {
        let (reg, id) = registry();
        let m = reg.search(id, "scores.math").unwrap();
        assert_eq!(m.schema_type.instance(), "Number");

        let m = reg.search(id, "meta.deep.key").unwrap();
        assert!(m.schema_type.is_mixed());

        assert!(reg.search(id, "name.first").is_none());
    }

    /// `{events: [Event]}` where `Event` has discriminators `Click` (`x` is a
    /// Number) and `View` (`x` is a String).
    fn event_registry() -> (SchemaRegistry, SchemaId) {
        let mut reg = SchemaRegistry::new();
        let event = reg
            .compile_json(&json!({"time": "Date"}), SchemaOptions::new())
            .unwrap();
        let click = reg
            .compile_json(&json!({"x": "Number"}), SchemaOptions::new())
            .unwrap();
        let view = reg
            .compile_json(&json!({"x": "String"}), SchemaOptions::new())
            .unwrap();
        reg.discriminator(event, "Click", click, None).unwrap();
        reg.discriminator(event, "View", view, None).unwrap();
        reg.model("Event", event).unwrap();
        let id = reg
            .compile_json(&json!({"events": ["Event"]}), SchemaOptions::new())
            .unwrap();
        (reg, id)
    }

    #[test]
    fn test_search_types_unions_discriminators() {
        let (reg, id) = event_registry();
        assert!(reg.search(id, "events.$.x").is_none());

        let found: Vec<(&str, bool)> = reg
            .search_types(id, "events.$.x", None)
            .iter()
            .map(|m| (m.schema_type.instance(), m.under_document_array))
            .collect();
        assert_eq!(found, vec![("Number", true), ("String", true)]);

        let found = reg.search_types(id, "events.time", None);
        assert_eq!(found.len(), 3);
        assert!(found.iter().all(|m| m.schema_type.instance() == "Date"));
    }

    #[test]
    fn test_search_types_narrows_by_document() {
        let (reg, id) = event_registry();
        let doc = Value::from(json!({"events": [{"__t": "View"}, {"__t": "Click"}]}));

        let found: Vec<&str> = reg
            .search_types(id, "events.0.x", Some(&doc))
            .iter()
            .map(|m| m.schema_type.instance())
            .collect();
        assert_eq!(found, vec!["String"]);

        let found = reg.search_types(id, "events.1.x", Some(&doc));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].schema_type.instance(), "Number");

        // No element at the index: every candidate is returned
        assert_eq!(reg.search_types(id, "events.5.x", Some(&doc)).len(), 2);
    }

    #[test]
    fn test_search_types_without_discriminators() {
        let (reg, id) = registry();
        let found = reg.search_types(id, "comments.0.body", None);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].schema_type.instance(), "String");
        assert!(reg.search_types(id, "nope", None).is_empty());
    }

    #[test]
    fn test_path_type() {
        let (mut reg, id) = registry();
        reg.add_virtual(id, "fullName");

        assert_eq!(reg.path_type(id, "name").kind, PathType::Real);
        assert_eq!(reg.path_type(id, "address").kind, PathType::Nested);
        assert_eq!(reg.path_type(id, "fullName").kind, PathType::Virtual);
        assert_eq!(reg.path_type(id, "tags.0").kind, PathType::Array);
        assert_eq!(reg.path_type(id, "meta.x").kind, PathType::Mixed);
        assert_eq!(reg.path_type(id, "name.first").kind, PathType::Undefined);
        assert_eq!(reg.path_type(id, "nope").kind, PathType::Undefined);

        let info = reg.path_type(id, "comments.0.body");
        assert_eq!(info.kind, PathType::Real);
        assert_ne!(info.owner, id);
    }
}
