//! Field projections

use std::collections::BTreeMap;

use crate::errors::{OdmError, OdmResult};
use crate::value::Value;

/// Projection a document was loaded with: `true` includes a path, `false`
/// excludes it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    fields: BTreeMap<String, bool>,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(mut self, path: impl Into<String>) -> Self {
        self.fields.insert(path.into(), true);
        self
    }

    pub fn exclude(mut self, path: impl Into<String>) -> Self {
        self.fields.insert(path.into(), false);
        self
    }

    /// Parses `{ path: 0 | 1 | true | false }`.
    pub fn from_value(value: &Value) -> OdmResult<Self> {
        let Some(map) = value.as_object() else {
            return Err(OdmError::message(format!(
                "Projection must be an object, got {}",
                value
            )));
        };
        let mut projection = Projection::new();
        for (path, flag) in map {
            let include = match (flag.as_bool(), flag.as_f64()) {
                (Some(b), _) => b,
                (None, Some(n)) => n != 0.0,
                _ => {
                    return Err(OdmError::message(format!(
                        "Invalid projection value for `{}`: {}",
                        path, flag
                    )))
                }
            };
            projection.fields.insert(path.clone(), include);
        }
        Ok(projection)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// True when any path other than `_id` is included.
    pub fn is_inclusive(&self) -> bool {
        self.fields.iter().any(|(path, include)| *include && path != "_id")
    }

    pub fn is_selected(&self, path: &str) -> bool {
        if self.fields.is_empty() {
            return true;
        }
        let related = |p: &str| {
            path == p
                || path.strip_prefix(p).map_or(false, |rest| rest.starts_with('.'))
        };

        if self.is_inclusive() {
            if path == "_id" {
                return self.fields.get("_id") != Some(&false);
            }
            self.fields.iter().any(|(p, include)| {
                *include
                    && (related(p)
                        || p.strip_prefix(path).map_or(false, |rest| rest.starts_with('.')))
            })
        } else {
            !self
                .fields
                .iter()
                .any(|(p, include)| !*include && related(p))
        }
    }

    /// Projection relative to a sub-document at `prefix`. `None` when no
    /// entry reaches below the prefix.
    pub fn scoped(&self, prefix: &str) -> Option<Projection> {
        let fields: BTreeMap<String, bool> = self
            .fields
            .iter()
            .filter_map(|(path, include)| {
                path.strip_prefix(prefix)
                    .and_then(|rest| rest.strip_prefix('.'))
                    .map(|rest| (rest.to_string(), *include))
            })
            .collect();
        if fields.is_empty() {
            None
        } else {
            Some(Projection { fields })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inclusive() {
        let p = Projection::new().include("name").include("address.city");
        assert!(p.is_inclusive());
        assert!(p.is_selected("name"));
        assert!(p.is_selected("_id"));
        assert!(p.is_selected("address"));
        assert!(p.is_selected("address.city"));
        assert!(!p.is_selected("address.zip"));
        assert!(!p.is_selected("age"));
    }

    #[test]
    fn test_exclusive() {
        let p = Projection::new().exclude("secret").exclude("_id");
        assert!(!p.is_inclusive());
        assert!(!p.is_selected("secret"));
        assert!(!p.is_selected("secret.inner"));
        assert!(!p.is_selected("_id"));
        assert!(p.is_selected("secretive"));
        assert!(p.is_selected("name"));
    }

    #[test]
    fn test_scoped() {
        let p = Projection::new().include("comments.body").include("name");
        let scoped = p.scoped("comments").unwrap();
        assert!(scoped.is_selected("body"));
        assert!(!scoped.is_selected("votes"));
        assert!(p.scoped("name").is_none());
    }

    #[test]
    fn test_from_value() {
        let p = Projection::from_value(&Value::from(json!({"a": 1, "b": 0, "c": true}))).unwrap();
        assert!(p.is_selected("a"));
        assert!(!p.is_selected("b"));
        assert!(Projection::from_value(&Value::from("a")).is_err());
    }
}
