//! Canonical, comparable rendering of heterogeneous configuration values.
//!
//! Two values are considered equal during reconciliation iff their
//! normalized forms are identical strings.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;

/// Marker for the empty string and for absent values.
pub const EMPTY_MARKER: &str = "[FALSE] / [EMPTY STRING]";
/// Marker for explicit nulls.
pub const NULL_MARKER: &str = "[NULL]";
/// Marker for `true`, `1` and `"1"`.
pub const TRUE_MARKER: &str = "[TRUE] / 1";
/// Marker for `false`, `0` and `"0"`.
pub const FALSE_MARKER: &str = "[FALSE] / 0";

/// A value in canonical string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedValue(String);

impl NormalizedValue {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is one of the canonical markers rather than literal text.
    pub fn is_marker(&self) -> bool {
        matches!(
            self.0.as_str(),
            EMPTY_MARKER | NULL_MARKER | TRUE_MARKER | FALSE_MARKER
        )
    }
}

impl fmt::Display for NormalizedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalize a raw value.
pub fn normalize(value: &Value) -> NormalizedValue {
    let s = match value {
        Value::Null => NULL_MARKER.to_string(),
        Value::Bool(true) => TRUE_MARKER.to_string(),
        Value::Bool(false) => FALSE_MARKER.to_string(),
        Value::String(s) => match s.as_str() {
            "" => EMPTY_MARKER.to_string(),
            "1" => TRUE_MARKER.to_string(),
            "0" => FALSE_MARKER.to_string(),
            _ => s.clone(),
        },
        Value::Number(n) => match integral(n) {
            Some(1) => TRUE_MARKER.to_string(),
            Some(0) => FALSE_MARKER.to_string(),
            Some(i) => i.to_string(),
            None => n.to_string(),
        },
        Value::Array(_) | Value::Object(_) => canonical_json(value),
    };
    NormalizedValue(s)
}

/// Whole numbers, including floats like `1.0`, as integers.
fn integral(n: &Number) -> Option<i64> {
    // Beyond 2^53 a float no longer holds an exact integer.
    const EXACT: f64 = 9_007_199_254_740_992.0;
    n.as_i64().or_else(|| {
        n.as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() <= EXACT)
            .map(|f| f as i64)
    })
}

/// Normalize a value that may be absent. Absent reads as the empty marker.
pub fn normalize_opt(value: Option<&Value>) -> NormalizedValue {
    match value {
        Some(v) => normalize(v),
        None => NormalizedValue(EMPTY_MARKER.to_string()),
    }
}

/// Serialize structured values with object keys sorted at every level.
fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
