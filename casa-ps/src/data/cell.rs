//! Typed dataset cells

use serde::ser::{Error as _, Serialize, Serializer};

/// Missing-value markers in the reference CSV (the pandas default set)
pub const NA_TOKENS: [&str; 19] = [
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null", "",
];

/// One value of the reference dataset
///
/// Floats may be non-finite right after loading (`inf` in the CSV).
/// Serialization refuses them; batches must pass through
/// [`crate::sanitize`] before being returned.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl Cell {
    /// Type a raw CSV field
    ///
    /// Empty or an [`NA_TOKENS`] marker → `Null`, `True`/`False` → `Bool`,
    /// then integer, then float, anything else is text.
    pub fn parse(raw: &str) -> Cell {
        let trimmed = raw.trim();
        if NA_TOKENS.contains(&trimmed) {
            return Cell::Null;
        }
        match trimmed {
            "True" | "true" => return Cell::Bool(true),
            "False" | "false" => return Cell::Bool(false),
            _ => {}
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Cell::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return Cell::Float(f);
        }
        Cell::Text(raw.to_string())
    }

    /// Numeric view (ints and floats, finite or not)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Numeric view restricted to finite values
    pub fn as_finite(&self) -> Option<f64> {
        self.as_f64().filter(|v| v.is_finite())
    }

    /// Integer view; floats only when integral
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Int(i) => Some(*i),
            Cell::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// True for NaN, +Inf and -Inf floats
    pub fn is_non_finite(&self) -> bool {
        matches!(self, Cell::Float(f) if !f.is_finite())
    }
}

impl From<Option<i64>> for Cell {
    fn from(value: Option<i64>) -> Self {
        value.map(Cell::Int).unwrap_or(Cell::Null)
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Null => serializer.serialize_none(),
            Cell::Int(i) => serializer.serialize_i64(*i),
            Cell::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            Cell::Float(f) => Err(S::Error::custom(format!(
                "non-finite float {} reached the serializer",
                f
            ))),
            Cell::Bool(b) => serializer.serialize_bool(*b),
            Cell::Text(s) => serializer.serialize_str(s),
        }
    }
}
