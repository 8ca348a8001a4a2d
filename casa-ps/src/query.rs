//! Query filter engine
//!
//! Predicates run in a fixed order over batch rows and the surviving rows are
//! truncated to the effective limit. Row order is always preserved.

use std::collections::HashMap;

use crate::data::RecordBatch;
use crate::error::{PipelineError, PipelineResult};

/// District value that disables the district predicate
pub const ALL_DISTRICTS: &str = "Todos";

const PRICE_COLUMN: &str = "buy_price";
const DISTRICT_COLUMN: &str = "district";

/// Row predicates; every field is optional
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFilter {
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub district: Option<String>,
    pub cluster: Option<i64>,
    /// Column the cluster predicate compares against
    pub cluster_column: String,
}

impl Default for RecordFilter {
    fn default() -> Self {
        Self {
            min_price: None,
            max_price: None,
            district: None,
            cluster: None,
            cluster_column: "cluster".to_string(),
        }
    }
}

impl RecordFilter {
    fn district_predicate(&self) -> Option<&str> {
        self.district.as_deref().filter(|d| *d != ALL_DISTRICTS)
    }

    fn required_columns(&self) -> Vec<&str> {
        let mut columns = Vec::new();
        if self.min_price.is_some() || self.max_price.is_some() {
            columns.push(PRICE_COLUMN);
        }
        if self.district_predicate().is_some() {
            columns.push(DISTRICT_COLUMN);
        }
        if self.cluster.is_some() {
            columns.push(self.cluster_column.as_str());
        }
        columns
    }

    /// Rows satisfying every active predicate, at most `limit` of them
    ///
    /// A row whose compared value is missing or of the wrong type fails the
    /// predicate.
    pub fn apply(&self, batch: &RecordBatch, limit: Option<usize>) -> PipelineResult<RecordBatch> {
        let missing: Vec<String> = self
            .required_columns()
            .into_iter()
            .filter(|c| !batch.has_column(c))
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::SchemaMismatch { missing });
        }

        let price = batch.column_index(PRICE_COLUMN);
        let district = batch.column_index(DISTRICT_COLUMN);
        let cluster = batch.column_index(&self.cluster_column);
        let wanted_district = self.district_predicate();
        let limit = limit.unwrap_or(usize::MAX);

        let mut indices = Vec::new();
        for (i, row) in batch.rows().iter().enumerate() {
            if indices.len() >= limit {
                break;
            }
            let row_price = price.and_then(|c| row[c].as_finite());
            if let Some(min) = self.min_price {
                if !row_price.is_some_and(|p| p >= min) {
                    continue;
                }
            }
            if let Some(max) = self.max_price {
                if !row_price.is_some_and(|p| p <= max) {
                    continue;
                }
            }
            if let Some(wanted) = wanted_district {
                if district.and_then(|c| row[c].as_str()) != Some(wanted) {
                    continue;
                }
            }
            if let Some(wanted) = self.cluster {
                if cluster.and_then(|c| row[c].as_i64()) != Some(wanted) {
                    continue;
                }
            }
            indices.push(i);
        }
        Ok(batch.take(&indices))
    }
}

/// Default and hard cap for a listing's row count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultLimit {
    pub default: usize,
    pub cap: usize,
}

impl ResultLimit {
    pub fn new(default: usize, cap: usize) -> Self {
        Self { default, cap }
    }

    /// `min(requested or default, cap)`; negative or non-integer → 400
    pub fn resolve(&self, requested: Option<&str>) -> PipelineResult<usize> {
        let requested = match requested.map(str::trim).filter(|s| !s.is_empty()) {
            None => self.default,
            Some(raw) => {
                let value: i64 = raw.parse().map_err(|_| {
                    PipelineError::Validation(format!("limit must be an integer, got '{}'", raw))
                })?;
                usize::try_from(value).map_err(|_| {
                    PipelineError::Validation(format!("limit must not be negative, got {}", value))
                })?
            }
        };
        Ok(requested.min(self.cap))
    }
}

/// Optional float query parameter; empty counts as absent
pub fn optional_f64(params: &HashMap<String, String>, key: &str) -> PipelineResult<Option<f64>> {
    match params.get(key).map(|s| s.trim()).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| {
                PipelineError::Validation(format!("{} must be a number, got '{}'", key, raw))
            }),
    }
}

/// Optional integer query parameter; empty counts as absent
pub fn optional_i64(params: &HashMap<String, String>, key: &str) -> PipelineResult<Option<i64>> {
    match params.get(key).map(|s| s.trim()).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => raw.parse::<i64>().map(Some).map_err(|_| {
            PipelineError::Validation(format!("{} must be an integer, got '{}'", key, raw))
        }),
    }
}

/// Optional text query parameter; empty counts as absent
pub fn optional_text(params: &HashMap<String, String>, key: &str) -> Option<String> {
    params
        .get(key)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
