//! Reference schema and the dataset it is derived from
//!
//! The column order is the reference dataset's header order. Field kinds are
//! declared statically; dataset columns without a declared kind are untyped
//! and take their defaults from the first data row.

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::data::{Cell, RecordBatch};
use crate::error::{PipelineError, PipelineResult};
use crate::models::FeatureValue;

/// Continuous features
pub const NUMERIC_FIELDS: [&str; 9] = [
    "sq_mt_built",
    "sq_mt_useful",
    "n_rooms",
    "n_bathrooms",
    "floor",
    "built_year",
    "buy_price_by_area",
    "latitude",
    "longitude",
];

/// 0.0 / 1.0 flags
pub const BINARY_FIELDS: [&str; 16] = [
    "has_lift",
    "is_exterior",
    "has_parking",
    "is_new_development",
    "has_central_heating",
    "has_individual_heating",
    "has_ac",
    "has_garden",
    "has_pool",
    "has_terrace",
    "has_storage_room",
    "is_furnished",
    "is_orientation_north",
    "is_orientation_south",
    "is_orientation_east",
    "is_orientation_west",
];

pub const CATEGORICAL_FIELDS: [&str; 4] =
    ["house_type", "energy_certificate", "district", "neighborhood"];

/// Default for an absent or empty categorical field
pub const CATEGORICAL_PLACEHOLDER: &str = "unknown";

/// How a column is coerced during reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Numeric,
    BinaryFlag,
    Categorical,
    /// Present in the dataset but not declared; defaults from the reference row
    Untyped,
}

impl FieldKind {
    /// Declared kind of a column name
    pub fn of(name: &str) -> FieldKind {
        if NUMERIC_FIELDS.contains(&name) {
            FieldKind::Numeric
        } else if BINARY_FIELDS.contains(&name) {
            FieldKind::BinaryFlag
        } else if CATEGORICAL_FIELDS.contains(&name) {
            FieldKind::Categorical
        } else {
            FieldKind::Untyped
        }
    }

    /// Kind default; `None` for untyped columns
    pub fn default_value(self) -> Option<FeatureValue> {
        match self {
            FieldKind::Numeric => Some(FeatureValue::Number(0.0)),
            FieldKind::BinaryFlag => Some(FeatureValue::Number(0.0)),
            FieldKind::Categorical => Some(FeatureValue::Text(CATEGORICAL_PLACEHOLDER.to_string())),
            FieldKind::Untyped => None,
        }
    }
}

/// Ordered `(column, kind)` list
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSchema {
    columns: Vec<(String, FieldKind)>,
}

impl ReferenceSchema {
    pub fn from_columns<S: AsRef<str>>(names: &[S]) -> Self {
        Self {
            columns: names
                .iter()
                .map(|n| (n.as_ref().to_string(), FieldKind::of(n.as_ref())))
                .collect(),
        }
    }

    pub fn columns(&self) -> &[(String, FieldKind)] {
        &self.columns
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|(n, _)| n == name)
    }

    pub fn kind_of(&self, name: &str) -> Option<FieldKind> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, k)| *k)
    }
}

/// Schema, default row and the reference dataset, built once at startup
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schema: Arc<ReferenceSchema>,
    default_row: Vec<Cell>,
    dataset: Arc<RecordBatch>,
}

impl SchemaRegistry {
    /// Read the reference dataset; any failure is fatal to the caller
    pub fn load(path: &Path) -> PipelineResult<Self> {
        if !path.is_file() {
            return Err(PipelineError::UpstreamData(format!(
                "reference dataset not found at {}",
                path.display()
            )));
        }
        let batch = RecordBatch::from_csv_path(path).map_err(|e| {
            PipelineError::UpstreamData(format!("{}: {}", path.display(), e))
        })?;
        let registry = Self::from_dataset(batch)?;
        info!(
            "Loaded reference dataset {} ({} rows, {} columns)",
            path.display(),
            registry.dataset.len(),
            registry.schema.len()
        );
        Ok(registry)
    }

    pub fn from_dataset(dataset: RecordBatch) -> PipelineResult<Self> {
        if dataset.columns().is_empty() {
            return Err(PipelineError::UpstreamData(
                "reference dataset has no header".to_string(),
            ));
        }
        let default_row = dataset
            .row(0)
            .ok_or_else(|| {
                PipelineError::UpstreamData("reference dataset has no data rows".to_string())
            })?
            .to_vec();

        let schema = ReferenceSchema::from_columns(dataset.columns());
        let declared = NUMERIC_FIELDS
            .iter()
            .chain(BINARY_FIELDS.iter())
            .chain(CATEGORICAL_FIELDS.iter());
        let absent: Vec<&str> = declared
            .filter(|name| schema.index_of(name).is_none())
            .copied()
            .collect();
        if !absent.is_empty() {
            warn!(
                "Reference dataset lacks declared feature columns: {}",
                absent.join(", ")
            );
        }

        Ok(Self {
            schema: Arc::new(schema),
            default_row,
            dataset: Arc::new(dataset),
        })
    }

    pub fn schema(&self) -> &Arc<ReferenceSchema> {
        &self.schema
    }

    /// `(name, kind)` in canonical order
    pub fn columns(&self) -> &[(String, FieldKind)] {
        self.schema.columns()
    }

    /// First dataset row, in schema order
    pub fn default_row(&self) -> &[Cell] {
        &self.default_row
    }

    /// Default-row cell for a column
    pub fn default_cell(&self, name: &str) -> Option<&Cell> {
        self.schema.index_of(name).and_then(|i| self.default_row.get(i))
    }

    pub fn dataset(&self) -> &Arc<RecordBatch> {
        &self.dataset
    }
}
