//! Model pipeline runner
//!
//! Composes stages from the [`ArtifactStore`] into the two pipelines the
//! service runs:
//!
//! - regression: `preprocessor → regressor` over canonical rows
//! - clustering: `preprocessor → reducer → k-means` over a fixed column
//!   projection of a batch, or k-means alone over coordinates
//!
//! Runs are synchronous and side-effect free apart from populating the
//! artifact cache.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::data::RecordBatch;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{ArtifactName, ArtifactStore, FeatureValue, Frame, StageError};
use crate::reconcile::CanonicalRow;

/// Columns fed to the three-stage clustering pipeline
pub const FULL_PROJECTION: [&str; 7] = [
    "latitude",
    "longitude",
    "sq_mt_built",
    "n_rooms",
    "n_bathrooms",
    "buy_price",
    "rent_price",
];

/// Columns fed to the coordinates-only clusterer
pub const GEO_PROJECTION: [&str; 2] = ["latitude", "longitude"];

/// Which clustering pipeline to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterProjection {
    /// Preprocessor, PCA and k-means over [`FULL_PROJECTION`], median imputed
    Full,
    /// K-means over [`GEO_PROJECTION`], mean imputed
    Geo,
}

impl ClusterProjection {
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            ClusterProjection::Full => &FULL_PROJECTION,
            ClusterProjection::Geo => &GEO_PROJECTION,
        }
    }

    fn imputation(self) -> Imputation {
        match self {
            ClusterProjection::Full => Imputation::Median,
            ClusterProjection::Geo => Imputation::Mean,
        }
    }

    fn artifacts(self) -> &'static [ArtifactName] {
        match self {
            ClusterProjection::Full => &[
                ArtifactName::ClusterPreprocessor,
                ArtifactName::ClusterReducer,
                ArtifactName::ClusterModel,
            ],
            ClusterProjection::Geo => &[ArtifactName::ClusterModel],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Imputation {
    Median,
    Mean,
}

impl Imputation {
    fn fill_value(self, values: &mut [f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        match self {
            Imputation::Mean => Some(values.iter().sum::<f64>() / values.len() as f64),
            Imputation::Median => {
                values.sort_by(f64::total_cmp);
                let mid = values.len() / 2;
                if values.len() % 2 == 0 {
                    Some((values[mid - 1] + values[mid]) / 2.0)
                } else {
                    Some(values[mid])
                }
            }
        }
    }
}

/// Runs pipelines over shared artifacts
#[derive(Debug, Clone)]
pub struct PipelineRunner {
    store: Arc<ArtifactStore>,
}

impl PipelineRunner {
    pub fn new(store: Arc<ArtifactStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Price estimate for one canonical row
    pub fn predict_price(&self, row: &CanonicalRow) -> PipelineResult<f64> {
        self.predict_prices(std::slice::from_ref(row))?
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::PredictionFailed("regressor returned no output".into()))
    }

    /// Price estimates for rows sharing one schema; all or nothing
    pub fn predict_prices(&self, rows: &[CanonicalRow]) -> PipelineResult<Vec<f64>> {
        let load = |name: ArtifactName| {
            self.store.load(name).map_err(|e| {
                PipelineError::PredictionFailed(format!("regression pipeline: {}", e))
            })
        };
        let preprocessor = load(ArtifactName::Preprocessor)?;
        let regressor = load(ArtifactName::Regressor)?;

        let stage_failed =
            |e: StageError| PipelineError::PredictionFailed(format!("regression pipeline: {}", e));
        let frame = CanonicalRow::frame_of(rows).map_err(stage_failed)?;
        let features = preprocessor.transform_frame(&frame).map_err(stage_failed)?;
        let predictions = regressor.predict_values(&features).map_err(stage_failed)?;

        if predictions.len() != rows.len() {
            return Err(PipelineError::PredictionFailed(format!(
                "regressor returned {} values for {} rows",
                predictions.len(),
                rows.len()
            )));
        }
        if let Some(bad) = predictions.iter().find(|v| !v.is_finite()) {
            return Err(PipelineError::PredictionFailed(format!(
                "regressor produced non-finite value {}",
                bad
            )));
        }
        debug!("Regression pipeline produced {} estimates", predictions.len());
        Ok(predictions)
    }

    /// True when every artifact of the projection's pipeline is on disk
    pub fn clustering_available(&self, projection: ClusterProjection) -> bool {
        projection.artifacts().iter().all(|name| self.store.exists(*name))
    }

    /// Imputed numeric frame of the projection columns
    ///
    /// Missing or non-numeric cells take the column's median or mean over the
    /// batch; a column with no usable value at all is filled with 0.
    pub fn project(&self, batch: &RecordBatch, projection: ClusterProjection) -> PipelineResult<Frame> {
        let names = projection.columns();
        let missing: Vec<String> = names
            .iter()
            .filter(|name| !batch.has_column(name))
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::SchemaMismatch { missing });
        }

        let mut columns: Vec<Vec<Option<f64>>> = Vec::with_capacity(names.len());
        for name in names {
            let cells = batch
                .column(name)
                .ok_or_else(|| PipelineError::SchemaMismatch {
                    missing: vec![name.to_string()],
                })?;
            let mut values: Vec<Option<f64>> = cells.iter().map(|c| c.as_finite()).collect();
            let mut present: Vec<f64> = values.iter().flatten().copied().collect();
            if present.len() < values.len() {
                let fill = projection.imputation().fill_value(&mut present).unwrap_or_else(|| {
                    warn!("Column {} has no numeric values, imputing 0", name);
                    0.0
                });
                for value in values.iter_mut().filter(|v| v.is_none()) {
                    *value = Some(fill);
                }
            }
            columns.push(values);
        }

        let rows = (0..batch.len())
            .map(|i| {
                columns
                    .iter()
                    .map(|col| FeatureValue::Number(col[i].unwrap_or(0.0)))
                    .collect()
            })
            .collect();
        Frame::new(names.iter().map(|n| n.to_string()).collect(), rows)
            .map_err(|e| PipelineError::Internal(e.to_string()))
    }

    /// Cluster id per batch row
    ///
    /// Artifact availability is checked before the projection, so a missing
    /// artifact reports `ModelUnavailable` even when columns are missing too.
    pub fn cluster(&self, batch: &RecordBatch, projection: ClusterProjection) -> PipelineResult<Vec<i64>> {
        let stages = projection
            .artifacts()
            .iter()
            .map(|name| self.store.load(*name))
            .collect::<PipelineResult<Vec<_>>>()?;

        let frame = self.project(batch, projection)?;
        if frame.n_rows() == 0 {
            return Ok(Vec::new());
        }

        let stage_failed =
            |e: StageError| PipelineError::PredictionFailed(format!("clustering pipeline: {}", e));
        let labels = match stages.as_slice() {
            [preprocessor, reducer, model] => {
                let encoded = preprocessor.transform_frame(&frame).map_err(stage_failed)?;
                let reduced = reducer.transform(&encoded).map_err(stage_failed)?;
                model.predict_clusters(&reduced).map_err(stage_failed)?
            }
            [model] => {
                let coords = frame.to_matrix().map_err(stage_failed)?;
                model.predict_clusters(&coords).map_err(stage_failed)?
            }
            _ => {
                return Err(PipelineError::Internal(
                    "unexpected clustering stage count".to_string(),
                ))
            }
        };
        debug!("Clustering pipeline labelled {} rows", labels.len());
        Ok(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn runner_with(files: &[(ArtifactName, &str)]) -> (TempDir, PipelineRunner) {
        let dir = TempDir::new().unwrap();
        for (name, body) in files {
            std::fs::write(dir.path().join(name.file_name()), body).unwrap();
        }
        let runner = PipelineRunner::new(Arc::new(ArtifactStore::new(dir.path())));
        (dir, runner)
    }

    const GEO_KMEANS: &str = r#"{"type":"kmeans","centroids":[[40.40,-3.70],[40.50,-3.60]]}"#;

    #[test]
    fn test_median_and_mean() {
        assert_eq!(Imputation::Median.fill_value(&mut [3.0, 1.0, 2.0, 10.0]), Some(2.5));
        assert_eq!(Imputation::Median.fill_value(&mut [5.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(Imputation::Mean.fill_value(&mut [1.0, 2.0, 6.0]), Some(3.0));
        assert_eq!(Imputation::Mean.fill_value(&mut Vec::new()), None);
    }

    #[test]
    fn test_project_imputes_missing_cells() {
        let (_dir, runner) = runner_with(&[]);
        let batch = RecordBatch::from_csv_reader(
            "latitude,longitude\n40.0,-3.0\n,-4.0\n42.0,nan\n".as_bytes(),
        )
        .unwrap();
        let frame = runner.project(&batch, ClusterProjection::Geo).unwrap();
        let m = frame.to_matrix().unwrap();
        assert_eq!(m.row(1), &[41.0, -4.0]);
        assert_eq!(m.row(2), &[42.0, -3.5]);
    }

    #[test]
    fn test_project_reports_missing_columns() {
        let (_dir, runner) = runner_with(&[]);
        let batch = RecordBatch::from_csv_reader("latitude,buy_price\n40.0,1\n".as_bytes()).unwrap();
        match runner.project(&batch, ClusterProjection::Geo) {
            Err(PipelineError::SchemaMismatch { missing }) => assert_eq!(missing, ["longitude"]),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_geo_clustering() {
        let (_dir, runner) = runner_with(&[(ArtifactName::ClusterModel, GEO_KMEANS)]);
        assert!(runner.clustering_available(ClusterProjection::Geo));
        assert!(!runner.clustering_available(ClusterProjection::Full));

        let batch = RecordBatch::from_csv_reader(
            "latitude,longitude\n40.41,-3.71\n40.49,-3.61\n".as_bytes(),
        )
        .unwrap();
        assert_eq!(runner.cluster(&batch, ClusterProjection::Geo).unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_missing_artifact_checked_before_columns() {
        let (_dir, runner) = runner_with(&[]);
        let batch = RecordBatch::from_csv_reader("buy_price\n1\n".as_bytes()).unwrap();
        assert!(matches!(
            runner.cluster(&batch, ClusterProjection::Geo),
            Err(PipelineError::ModelUnavailable { .. })
        ));
    }

    #[test]
    fn test_wrong_width_model_fails_prediction() {
        let (_dir, runner) = runner_with(&[(
            ArtifactName::ClusterModel,
            r#"{"type":"kmeans","centroids":[[1.0,2.0,3.0]]}"#,
        )]);
        let batch = RecordBatch::from_csv_reader("latitude,longitude\n40.4,-3.7\n".as_bytes()).unwrap();
        assert!(matches!(
            runner.cluster(&batch, ClusterProjection::Geo),
            Err(PipelineError::PredictionFailed(_))
        ));
    }
}
