//! Coercion helpers for loosely-typed record values.
//!
//! Exported rows arrive as untyped JSON, so every analysis goes through the
//! same small set of conversions: numbers (with booleans as 0/1), opaque
//! identifiers, the JSON state-management blob and the several timestamp
//! shapes the export produces.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::warn;

use crate::models::StateManagement;

// ── Numeric coercion ──────────────────────────────────────────────────────────

/// Interpret a value as a number for aggregation and correlation.
///
/// Numbers pass through, booleans become 0/1, everything else is `None`.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Numeric value of an optional field, treating missing or non-numeric
/// values as 0 (the "missing/falsy is zero" duration rule).
pub fn number_or_zero(value: Option<&Value>) -> f64 {
    value.and_then(as_number).unwrap_or(0.0)
}

/// Whether a flag field is set: boolean `true` or the number 1.
pub fn is_truthy_flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        _ => false,
    }
}

// ── Identifier coercion ───────────────────────────────────────────────────────

/// Interpret a value as an opaque identifier string.
///
/// Strings must be non-empty; numbers are rendered in their JSON form so
/// integer and string ids compare consistently across tables.
pub fn as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Identifier of an optional field.
pub fn id_of(value: Option<&Value>) -> Option<String> {
    value.and_then(as_id)
}

// ── State-management blob ─────────────────────────────────────────────────────

/// Parse an invoice's state-management column.
///
/// The column holds either a JSON-encoded string or an inline object.
/// Malformed blobs yield `None`; the caller decides whether to count them.
pub fn parse_state_blob(value: &Value) -> Option<StateManagement> {
    match value {
        Value::String(s) => serde_json::from_str(s).ok(),
        Value::Object(_) => serde_json::from_value(value.clone()).ok(),
        _ => None,
    }
}

// ── Timestamps ────────────────────────────────────────────────────────────────

/// Parse the timestamp shapes found in exported rows into UTC datetimes.
pub struct TimestampParser;

impl TimestampParser {
    /// Attempt to parse a value into a UTC [`DateTime`].
    ///
    /// Handles `null` (→ `None`), RFC 3339 strings (including a bare `Z`
    /// suffix), a handful of naive date-time patterns, date-only strings,
    /// and Unix seconds as integer or float.
    pub fn parse(value: &Value) -> Option<DateTime<Utc>> {
        match value {
            Value::Null => None,
            Value::String(s) => Self::parse_str(s),
            Value::Number(n) => {
                if let Some(secs) = n.as_i64() {
                    DateTime::from_timestamp(secs, 0)
                } else if let Some(f) = n.as_f64() {
                    let secs = f.trunc() as i64;
                    let nanos = (f.fract() * 1_000_000_000.0).round() as u32;
                    DateTime::from_timestamp(secs, nanos)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn parse_str(s: &str) -> Option<DateTime<Utc>> {
        if s.is_empty() {
            return None;
        }

        let normalised = match s.strip_suffix('Z') {
            Some(stripped) => format!("{stripped}+00:00"),
            None => s.to_string(),
        };
        if let Ok(dt) = DateTime::parse_from_rfc3339(&normalised) {
            return Some(dt.with_timezone(&Utc));
        }

        const FORMATS: &[&str] = &[
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%d",
        ];
        for fmt in FORMATS {
            if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
                return Some(Utc.from_utc_datetime(&naive));
            }
            if let Ok(date) = chrono::NaiveDate::parse_from_str(s, fmt) {
                let naive = date.and_hms_opt(0, 0, 0)?;
                return Some(Utc.from_utc_datetime(&naive));
            }
        }

        warn!("TimestampParser: could not parse timestamp string \"{}\"", s);
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
