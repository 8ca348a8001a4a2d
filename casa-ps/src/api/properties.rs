//! Property listing and per-property estimates

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::run_blocking;
use crate::config::listing_limit;
use crate::data::{PropertyRecord, RecordBatch};
use crate::error::{PipelineError, PipelineResult};
use crate::query::{optional_f64, optional_text, RecordFilter};
use crate::sanitize::{sanitize_batch, sanitize_value};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ListingResponse {
    pub count: usize,
    pub properties: RecordBatch,
}

#[derive(Debug, Serialize)]
pub struct EstimateResponse {
    pub id: i64,
    pub prediction: f64,
    /// Listed price, null when missing or non-finite
    pub buy_price: Option<f64>,
}

/// GET /api/properties/
///
/// Query: `min_price`, `max_price`, `district` (`Todos` = any), `limit`.
pub async fn list_properties(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> PipelineResult<Json<ListingResponse>> {
    let filter = RecordFilter {
        min_price: optional_f64(&params, "min_price")?,
        max_price: optional_f64(&params, "max_price")?,
        district: optional_text(&params, "district"),
        ..Default::default()
    };
    let limit = listing_limit(&state.limits).resolve(params.get("limit").map(String::as_str))?;

    let dataset = Arc::clone(state.registry.dataset());
    let properties = run_blocking(move || {
        let mut batch = filter.apply(&dataset, Some(limit))?;
        sanitize_batch(&mut batch);
        Ok(batch)
    })
    .await?;

    debug!("Listing returned {} properties", properties.len());
    Ok(Json(ListingResponse {
        count: properties.len(),
        properties,
    }))
}

/// GET /api/properties/:id/estimate
///
/// Regression estimate for the dataset row with this `id`.
pub async fn estimate_property(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> PipelineResult<Json<EstimateResponse>> {
    let id: i64 = raw_id
        .trim()
        .parse()
        .map_err(|_| PipelineError::Validation(format!("id must be an integer, got '{}'", raw_id)))?;

    let response = run_blocking(move || {
        let dataset = state.registry.dataset();
        let index = (0..dataset.len())
            .find(|&i| dataset.cell(i, "id").and_then(|c| c.as_i64()) == Some(id))
            .ok_or_else(|| PipelineError::NotFound(format!("property {}", id)))?;
        let record = PropertyRecord::from_batch_row(dataset, index)
            .ok_or_else(|| PipelineError::NotFound(format!("property {}", id)))?;

        let row = state.reconciler.reconcile(&record);
        let prediction = state.runner.predict_price(&row)?;
        let buy_price = dataset
            .cell(index, "buy_price")
            .and_then(|c| c.as_f64())
            .and_then(sanitize_value);
        Ok(EstimateResponse {
            id,
            prediction,
            buy_price,
        })
    })
    .await?;

    Ok(Json(response))
}

pub fn property_routes() -> Router<AppState> {
    Router::new()
        .route("/api/properties", get(list_properties))
        .route("/api/properties/", get(list_properties))
        .route("/api/properties/:id/estimate", get(estimate_property))
}
