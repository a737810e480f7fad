//! Geospatial query operands

use super::SchemaPath;
use crate::cast::cast_number;
use crate::errors::{CastError, OdmError, OdmResult};
use crate::value::{Map, Value};

fn to_number(path: &SchemaPath, value: Value) -> OdmResult<Value> {
    cast_number(&value).map_err(|reason| {
        CastError::new("Number", &value, path.path())
            .with_reason(reason)
            .into()
    })
}

/// Casts every leaf of arbitrarily nested coordinate arrays to a number.
fn cast_coordinates(path: &SchemaPath, value: Value) -> OdmResult<Value> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| cast_coordinates(path, item))
            .collect::<OdmResult<Vec<_>>>()
            .map(Value::Array),
        other => to_number(path, other),
    }
}

fn cast_distances(path: &SchemaPath, map: &mut Map) -> OdmResult<()> {
    for key in ["$maxDistance", "$minDistance"] {
        if let Some(v) = map.get_mut(key) {
            let raw = std::mem::replace(v, Value::null());
            *v = to_number(path, raw)?;
        }
    }
    Ok(())
}

fn cast_geometry(path: &SchemaPath, map: &mut Map) -> OdmResult<()> {
    if let Some(Value::Object(geometry)) = map.get_mut("$geometry") {
        let kind = geometry.get("type").and_then(Value::as_str).map(str::to_string);
        if matches!(kind.as_deref(), Some("Point" | "LineString" | "Polygon")) {
            if let Some(coords) = geometry.get_mut("coordinates") {
                let raw = std::mem::replace(coords, Value::null());
                *coords = cast_coordinates(path, raw)?;
            }
        }
    }
    cast_distances(path, map)
}

/// `$near` / `$nearSphere`: legacy coordinate pair or `$geometry` object.
pub(super) fn cast_near(path: &SchemaPath, value: Value) -> OdmResult<Value> {
    match value {
        Value::Array(_) => cast_coordinates(path, value),
        Value::Object(mut map) => {
            if map.contains_key("$geometry") {
                cast_geometry(path, &mut map)?;
                return Ok(Value::Object(map));
            }
            cast_distances(path, &mut map)?;
            Ok(Value::Object(map))
        }
        _ => Err(OdmError::operator(
            "$near must be either an array or an object with a $geometry property",
        )),
    }
}

/// `$geoWithin` / `$within`: `$box`, `$polygon`, `$center`,
/// `$centerSphere` or `$geometry`.
pub(super) fn cast_within(path: &SchemaPath, value: Value) -> OdmResult<Value> {
    let mut map = match value {
        Value::Object(map) => map,
        other => return Ok(other),
    };
    cast_distances(path, &mut map)?;

    for shape in ["$box", "$polygon"] {
        if let Some(v) = map.get_mut(shape) {
            let Value::Array(points) = std::mem::replace(v, Value::null()) else {
                return Err(OdmError::operator(format!(
                    "Invalid $within {} argument. Expected an array",
                    shape
                )));
            };
            let mut out = Vec::with_capacity(points.len());
            for point in points {
                if !point.is_array() {
                    return Err(OdmError::operator(format!(
                        "Invalid $within {} argument. Expected an array, received {}",
                        shape, point
                    )));
                }
                out.push(cast_coordinates(path, point)?);
            }
            *v = Value::Array(out);
            return Ok(Value::Object(map));
        }
    }

    for shape in ["$center", "$centerSphere"] {
        if let Some(v) = map.get_mut(shape) {
            let raw = std::mem::replace(v, Value::null());
            *v = cast_coordinates(path, raw)?;
            return Ok(Value::Object(map));
        }
    }

    cast_geometry(path, &mut map)?;
    Ok(Value::Object(map))
}

/// `$geoIntersects` with a `$geometry` operand.
pub(super) fn cast_intersects(path: &SchemaPath, value: Value) -> OdmResult<Value> {
    match value {
        Value::Object(mut map) if map.contains_key("$geometry") => {
            cast_geometry(path, &mut map)?;
            Ok(Value::Object(map))
        }
        other => Ok(other),
    }
}
