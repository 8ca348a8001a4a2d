//! Clustered property listing

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::collections::HashMap;

use super::run_blocking;
use crate::config::clustering_limit;
use crate::data::RecordBatch;
use crate::error::PipelineResult;
use crate::pipeline::ClusterProjection;
use crate::sanitize::sanitize_batch;
use crate::segment::{label_batch, ClusterSource};
use crate::AppState;

/// Label column on the clustering listing
pub const CLUSTER_COLUMN: &str = "cluster";

#[derive(Debug, Serialize)]
pub struct ClusteringResponse {
    pub properties: RecordBatch,
    pub total_properties: usize,
    pub cluster_source: ClusterSource,
}

/// GET /api/clustering/
///
/// Labels come from a precomputed `cluster` column when the dataset has one,
/// else from the coordinates clusterer, else from price buckets over the full
/// dataset. The limit applies after labelling.
pub async fn list_clusters(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> PipelineResult<Json<ClusteringResponse>> {
    let limit = clustering_limit(&state.limits).resolve(params.get("limit").map(String::as_str))?;

    let response = run_blocking(move || {
        let dataset = RecordBatch::clone(state.registry.dataset());
        let (mut batch, source) = label_batch(
            &state.runner,
            dataset,
            CLUSTER_COLUMN,
            ClusterProjection::Geo,
            true,
        )?;
        batch.truncate(limit);
        sanitize_batch(&mut batch);
        Ok(ClusteringResponse {
            total_properties: batch.len(),
            properties: batch,
            cluster_source: source,
        })
    })
    .await?;

    Ok(Json(response))
}

pub fn clustering_routes() -> Router<AppState> {
    Router::new()
        .route("/api/clustering", get(list_clusters))
        .route("/api/clustering/", get(list_clusters))
}
