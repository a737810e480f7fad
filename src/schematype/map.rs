//! String-keyed maps

use std::sync::Arc;

use super::{CastOptions, SchemaPath};
use crate::errors::{CastError, OdmError, OdmResult};
use crate::schema::SchemaRegistry;
use crate::value::{Map, Value};

pub(super) fn cast(
    path: &SchemaPath,
    of: &SchemaPath,
    registry: &Arc<SchemaRegistry>,
    value: Value,
    opts: &CastOptions<'_>,
) -> OdmResult<Value> {
    let entries = match value {
        v if v.is_nullish() => return Ok(v),
        Value::Object(map) => map,
        Value::Document(doc) => doc.to_map(),
        other => return Err(CastError::new("Map", &other, path.path()).into()),
    };

    let prior = opts.prior.and_then(Value::as_object);
    let mut out = Map::new();
    for (key, raw) in entries {
        if key.starts_with('$') {
            return Err(OdmError::message(format!(
                "Maps do not support keys that start with \"$\", got \"{}\"",
                key
            )));
        }
        if key.contains('.') {
            return Err(OdmError::message(format!(
                "Maps do not support keys that contain \".\", got \"{}\"",
                key
            )));
        }

        let entry_opts = CastOptions {
            prior: prior.and_then(|p| p.get(&key)),
            ..*opts
        };
        let cast = of
            .apply_setters(registry, raw, &entry_opts)
            .map_err(|err| match err {
                OdmError::Cast(mut c) => {
                    c.set_path(format!("{}.{}", path.path(), key));
                    OdmError::Cast(c)
                }
                other => other,
            })?;
        out.insert(key, cast);
    }
    Ok(Value::Object(out))
}
