//! API root descriptor

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::segment::PRICE_BUCKETS;
use crate::AppState;

/// GET /api/
pub async fn api_root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "message": "Madrid property prediction API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "properties": "/api/properties/",
            "clustering": "/api/clustering/",
            "predict": "/api/predict/",
            "estimate": "/api/properties/{id}/estimate",
            "health": "/health",
        },
        "legacy_endpoints": {
            "clustering_table": "/clustering/",
            "xgboost": "/xgboost/",
        },
        "status": "active",
        "total_properties": state.registry.dataset().len(),
        "clusters": PRICE_BUCKETS,
    }))
}

pub fn root_routes() -> Router<AppState> {
    Router::new()
        .route("/api", get(api_root))
        .route("/api/", get(api_root))
}
