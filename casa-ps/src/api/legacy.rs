//! Legacy endpoints kept for the old dashboard
//!
//! `/clustering/` serves a filtered table labelled by the full clustering
//! pipeline. `/xgboost/` estimates a price from the old form fields.

use axum::{
    extract::{rejection::FormRejection, Query, State},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use super::{post_only, run_blocking};
use crate::data::RecordBatch;
use crate::error::{PipelineError, PipelineResult};
use crate::forms::record_from_form;
use crate::pipeline::ClusterProjection;
use crate::query::{optional_f64, optional_i64, RecordFilter};
use crate::sanitize::sanitize_batch;
use crate::segment::label_batch;
use crate::AppState;

/// Label column on the legacy table
pub const LEGACY_CLUSTER_COLUMN: &str = "cluster_kmeans";

/// Columns shown by the legacy table, when present in the dataset
pub const LEGACY_TABLE_COLUMNS: [&str; 8] = [
    "id",
    "address",
    "sq_mt_built",
    "n_rooms",
    "n_bathrooms",
    "buy_price",
    "rent_price",
    LEGACY_CLUSTER_COLUMN,
];

#[derive(Debug, Serialize)]
pub struct EstimateResponse {
    pub prediction: f64,
}

/// GET /clustering/
///
/// Query: `cluster`, `min_price`, `max_price`. Returns a bare JSON array.
pub async fn clustering_table(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> PipelineResult<Json<RecordBatch>> {
    let filter = RecordFilter {
        min_price: optional_f64(&params, "min_price")?,
        max_price: optional_f64(&params, "max_price")?,
        cluster: optional_i64(&params, "cluster")?,
        cluster_column: LEGACY_CLUSTER_COLUMN.to_string(),
        ..Default::default()
    };

    let table = run_blocking(move || {
        let dataset = RecordBatch::clone(state.registry.dataset());
        let (labelled, source) = label_batch(
            &state.runner,
            dataset,
            LEGACY_CLUSTER_COLUMN,
            ClusterProjection::Full,
            false,
        )?;
        debug!("Legacy clustering table labelled from {:?}", source);
        let mut table = filter.apply(&labelled, None)?.select(&LEGACY_TABLE_COLUMNS);
        sanitize_batch(&mut table);
        Ok(table)
    })
    .await?;

    Ok(Json(table))
}

/// POST /xgboost/
///
/// Form-encoded property attributes → `{prediction}`.
pub async fn form_estimate(
    State(state): State<AppState>,
    form: Result<Form<HashMap<String, String>>, FormRejection>,
) -> PipelineResult<Json<EstimateResponse>> {
    let Form(form) = form.map_err(|e| PipelineError::Validation(e.body_text()))?;
    let record = record_from_form(&form)?;

    let prediction = run_blocking(move || {
        let row = state.reconciler.reconcile(&record);
        state.runner.predict_price(&row)
    })
    .await?;

    Ok(Json(EstimateResponse { prediction }))
}

pub fn legacy_routes() -> Router<AppState> {
    Router::new()
        .route("/clustering", get(clustering_table))
        .route("/clustering/", get(clustering_table))
        .route("/xgboost", post(form_estimate).fallback(post_only))
        .route("/xgboost/", post(form_estimate).fallback(post_only))
}
