use serde::{Deserialize, Serialize};
use std::fmt;

/// A single cell value inside a row's data mapping.
///
/// Rows carry loosely-typed scalars: everything arrives from a CSV upload as
/// a string, but cell edits may store numbers, booleans or nulls. The enum is
/// untagged so the JSON form is the bare scalar (`"abc"`, `42`, `true`,
/// `null`), matching what clients send and receive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Explicit null (JSON `null`)
    Null,

    /// Boolean scalar
    Boolean(bool),

    /// Numeric scalar, stored as f64 like a JSON number
    Number(f64),

    /// Text scalar; also the carrier for every value parsed from CSV
    String(String),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// True for values the pipeline treats as "no data": null or the empty
    /// string. Whitespace is not trimmed; `" "` counts as data.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Numeric view of the value. Strings are parsed; only finite numbers
    /// qualify. Booleans and nulls have no numeric view.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) if n.is_finite() => Some(*n),
            CellValue::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    /// Stringification used for filtering, sorting fallback, unique-value
    /// counting and chart labels. Whole numbers print without a trailing
    /// `.0` so an edited cell holding `5` matches the uploaded string `"5"`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Boolean(b) => write!(f, "{}", b),
            CellValue::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            CellValue::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}
