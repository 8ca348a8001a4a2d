//! Raw, partial property records
//!
//! A `PropertyRecord` is whatever the caller handed us: a dataset row, a JSON
//! body or a decoded form. Nothing about it is guaranteed complete or typed.

use serde_json::Value;
use std::collections::BTreeMap;

use super::{Cell, RecordBatch};

/// Loosely typed input value
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl From<&Cell> for RawValue {
    fn from(cell: &Cell) -> Self {
        match cell {
            Cell::Null => RawValue::Null,
            Cell::Int(i) => RawValue::Number(*i as f64),
            Cell::Float(f) => RawValue::Number(*f),
            Cell::Bool(b) => RawValue::Bool(*b),
            Cell::Text(s) => RawValue::Text(s.clone()),
        }
    }
}

impl From<&Value> for RawValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => RawValue::Null,
            Value::Bool(b) => RawValue::Bool(*b),
            Value::Number(n) => n.as_f64().map(RawValue::Number).unwrap_or(RawValue::Null),
            Value::String(s) => RawValue::Text(s.clone()),
            other => RawValue::Text(other.to_string()),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

/// Field name → raw value, ordered by name for deterministic iteration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyRecord {
    fields: BTreeMap<String, RawValue>,
}

impl PropertyRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<RawValue>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&RawValue> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Record for one row of a batch; `None` when the row does not exist
    pub fn from_batch_row(batch: &RecordBatch, index: usize) -> Option<Self> {
        let row = batch.row(index)?;
        let fields = batch
            .columns()
            .iter()
            .zip(row)
            .map(|(name, cell)| (name.clone(), RawValue::from(cell)))
            .collect();
        Some(Self { fields })
    }

    /// Record from the members of a JSON object; other JSON values give an
    /// empty record
    pub fn from_json(value: &Value) -> Self {
        let fields = value
            .as_object()
            .map(|object| {
                object
                    .iter()
                    .map(|(k, v)| (k.clone(), RawValue::from(v)))
                    .collect()
            })
            .unwrap_or_default();
        Self { fields }
    }
}
