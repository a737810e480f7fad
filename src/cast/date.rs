//! Date caster

use bson::Bson;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};

use super::number::{parse_js_number, to_number};
use super::{passthrough, PrimitiveCastError, PrimitiveResult};
use crate::value::Value;

/// Largest distance from the epoch a date may have, in milliseconds.
const MAX_EPOCH_MILLIS: f64 = 8.64e15;

/// Casts to a UTC datetime.
///
/// Numbers are epoch milliseconds. Numeric strings are treated as epoch
/// milliseconds only outside the range that could be read as a year;
/// everything else is parsed as a date string.
pub fn cast_date(value: &Value) -> PrimitiveResult {
    if let Some(v) = passthrough(value, true) {
        return Ok(v);
    }

    let dt = match value {
        Value::Scalar(Bson::DateTime(dt)) => return Ok(Value::Scalar(Bson::DateTime(*dt))),
        Value::Scalar(Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_)) => {
            let n = to_number(value).ok_or_else(|| PrimitiveCastError::rejected("date", value))?;
            from_millis(n)
        }
        Value::Scalar(Bson::String(s)) => {
            let n = parse_js_number(s);
            if !n.is_nan() && (n >= 275_761.0 || n < -271_820.0) {
                from_millis(n)
            } else {
                parse_date_str(s)
            }
        }
        _ => None,
    };

    dt.map(|dt| Value::Scalar(Bson::DateTime(dt)))
        .ok_or_else(|| PrimitiveCastError::rejected("date", value))
}

fn from_millis(n: f64) -> Option<bson::DateTime> {
    if !n.is_finite() || n.abs() > MAX_EPOCH_MILLIS {
        return None;
    }
    Some(bson::DateTime::from_millis(n.trunc() as i64))
}

/// Parses the date string formats accepted on input.
pub fn parse_date_str(s: &str) -> Option<bson::DateTime> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Some(bson::DateTime::from_millis(dt.timestamp_millis()));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(t) {
        return Some(bson::DateTime::from_millis(dt.timestamp_millis()));
    }

    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(t, fmt) {
            return Some(bson::DateTime::from_millis(
                Utc.from_utc_datetime(&naive).timestamp_millis(),
            ));
        }
    }

    let date = NaiveDate::parse_from_str(t, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{}-01", t), "%Y-%m-%d"))
        .ok()
        .or_else(|| {
            if t.len() == 4 && t.bytes().all(|b| b.is_ascii_digit()) {
                NaiveDate::from_ymd_opt(t.parse().ok()?, 1, 1)
            } else {
                None
            }
        })?;
    let naive = date.and_hms_opt(0, 0, 0)?;
    Some(bson::DateTime::from_millis(
        Utc.from_utc_datetime(&naive).timestamp_millis(),
    ))
}

/// ISO-8601 rendering with millisecond precision.
pub fn format_datetime(dt: bson::DateTime) -> Option<String> {
    Utc.timestamp_millis_opt(dt.timestamp_millis())
        .single()
        .map(|d| d.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn millis(v: Value) -> i64 {
        match v {
            Value::Scalar(Bson::DateTime(dt)) => dt.timestamp_millis(),
            other => panic!("expected date, got {:?}", other),
        }
    }

    #[test]
    fn test_numbers_are_epoch_millis() {
        assert_eq!(millis(cast_date(&Value::from(0)).unwrap()), 0);
        assert_eq!(
            millis(cast_date(&Value::from(1_577_836_800_000i64)).unwrap()),
            1_577_836_800_000
        );
    }

    #[test]
    fn test_large_numeric_string_is_millis() {
        assert_eq!(
            millis(cast_date(&Value::from("1577836800000")).unwrap()),
            1_577_836_800_000
        );
    }

    #[test]
    fn test_small_numeric_string_is_a_year() {
        assert_eq!(
            millis(cast_date(&Value::from("2020")).unwrap()),
            1_577_836_800_000
        );
    }

    #[test]
    fn test_iso_strings() {
        assert_eq!(
            millis(cast_date(&Value::from("2020-01-01T00:00:00.000Z")).unwrap()),
            1_577_836_800_000
        );
        assert_eq!(
            millis(cast_date(&Value::from("2020-01-01")).unwrap()),
            1_577_836_800_000
        );
    }

    #[test]
    fn test_invalid_dates() {
        assert!(cast_date(&Value::from("not a date")).is_err());
        assert!(cast_date(&Value::from(true)).is_err());
        assert!(cast_date(&Value::from(f64::NAN)).is_err());
        assert!(cast_date(&Value::from("")).unwrap().is_null());
        assert!(cast_date(&Value::undefined()).unwrap().is_undefined());
    }

    #[test]
    fn test_format_datetime() {
        let dt = bson::DateTime::from_millis(1_577_836_800_000);
        assert_eq!(format_datetime(dt).unwrap(), "2020-01-01T00:00:00.000Z");
    }
}
