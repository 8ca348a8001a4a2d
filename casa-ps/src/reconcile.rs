//! Feature reconciliation
//!
//! Turns any partial `PropertyRecord` into a `CanonicalRow`: exactly the
//! reference schema's columns, in order, each coerced to its kind. This step
//! never fails; unusable values fall back to the kind default.

use std::sync::Arc;

use crate::data::{Cell, PropertyRecord, RawValue};
use crate::models::{format_number, FeatureValue, Frame, StageError};
use crate::schema::{FieldKind, ReferenceSchema, SchemaRegistry, CATEGORICAL_PLACEHOLDER};

/// External name → canonical binary flag
pub const BINARY_ALIASES: [(&str, &str); 4] = [
    ("has_parking_space", "has_parking"),
    ("has_air_conditioning", "has_ac"),
    ("has_swimming_pool", "has_pool"),
    ("has_box_room", "has_storage_room"),
];

/// Fully typed row in reference schema order
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRow {
    schema: Arc<ReferenceSchema>,
    values: Vec<FeatureValue>,
}

impl CanonicalRow {
    pub fn schema(&self) -> &ReferenceSchema {
        &self.schema
    }

    pub fn values(&self) -> &[FeatureValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.schema.index_of(name).map(|i| &self.values[i])
    }

    /// One-row frame for pipeline input
    pub fn to_frame(&self) -> Result<Frame, StageError> {
        Self::frame_of(std::slice::from_ref(self))
    }

    /// Frame over several rows sharing this row's schema
    pub fn frame_of(rows: &[CanonicalRow]) -> Result<Frame, StageError> {
        let columns: Vec<String> = match rows.first() {
            Some(first) => first.schema.names().map(str::to_string).collect(),
            None => Vec::new(),
        };
        Frame::new(columns, rows.iter().map(|r| r.values.clone()).collect())
    }
}

/// Stateless mapper from partial records to canonical rows
#[derive(Debug, Clone)]
pub struct FeatureReconciler {
    registry: Arc<SchemaRegistry>,
}

impl FeatureReconciler {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn reconcile(&self, record: &PropertyRecord) -> CanonicalRow {
        let schema = Arc::clone(self.registry.schema());
        let mut values: Vec<Option<FeatureValue>> = vec![None; schema.len()];

        for (external, canonical) in BINARY_ALIASES {
            if let (Some(raw), Some(index)) = (record.get(external), schema.index_of(canonical)) {
                values[index] = Some(FeatureValue::Number(literal_truth(raw)));
            }
        }

        for (index, (name, kind)) in schema.columns().iter().enumerate() {
            if values[index].is_some() {
                continue;
            }
            values[index] = match record.get(name) {
                Some(raw) => coerce(*kind, raw),
                None => None,
            }
            .or_else(|| {
                kind.default_value()
                    .or_else(|| self.registry.default_cell(name).and_then(untyped_default))
            });
        }

        CanonicalRow {
            values: values
                .into_iter()
                .map(|v| v.unwrap_or(FeatureValue::Number(0.0)))
                .collect(),
            schema,
        }
    }
}

/// 1.0 only for the literal `"true"`
fn literal_truth(raw: &RawValue) -> f64 {
    match raw {
        RawValue::Text(s) if s == "true" => 1.0,
        RawValue::Bool(true) => 1.0,
        _ => 0.0,
    }
}

fn coerce(kind: FieldKind, raw: &RawValue) -> Option<FeatureValue> {
    match kind {
        FieldKind::Numeric => Some(FeatureValue::Number(numeric(raw))),
        FieldKind::BinaryFlag => Some(FeatureValue::Number(binary_flag(raw))),
        FieldKind::Categorical => Some(FeatureValue::Text(categorical(raw))),
        FieldKind::Untyped => match raw {
            RawValue::Number(v) if v.is_finite() => Some(FeatureValue::Number(*v)),
            RawValue::Bool(b) => Some(FeatureValue::Number(if *b { 1.0 } else { 0.0 })),
            RawValue::Text(s) if !s.trim().is_empty() => Some(FeatureValue::Text(s.clone())),
            _ => None,
        },
    }
}

fn numeric(raw: &RawValue) -> f64 {
    let value = match raw {
        RawValue::Number(v) => *v,
        RawValue::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        RawValue::Text(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        RawValue::Null => 0.0,
    };
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn binary_flag(raw: &RawValue) -> f64 {
    match raw {
        RawValue::Text(s) => match s.as_str() {
            "true" | "1.0" => 1.0,
            _ => 0.0,
        },
        RawValue::Number(v) if *v == 1.0 => 1.0,
        RawValue::Bool(true) => 1.0,
        _ => 0.0,
    }
}

fn categorical(raw: &RawValue) -> String {
    let text = match raw {
        RawValue::Text(s) => s.trim().to_string(),
        RawValue::Number(v) => format_number(*v),
        RawValue::Bool(true) => "True".to_string(),
        RawValue::Bool(false) => "False".to_string(),
        RawValue::Null => String::new(),
    };
    if text.is_empty() {
        CATEGORICAL_PLACEHOLDER.to_string()
    } else {
        text
    }
}

fn untyped_default(cell: &Cell) -> Option<FeatureValue> {
    match cell {
        Cell::Int(i) => Some(FeatureValue::Number(*i as f64)),
        Cell::Float(f) if f.is_finite() => Some(FeatureValue::Number(*f)),
        Cell::Bool(b) => Some(FeatureValue::Number(if *b { 1.0 } else { 0.0 })),
        Cell::Text(s) if !s.trim().is_empty() => Some(FeatureValue::Text(s.clone())),
        _ => None,
    }
}
