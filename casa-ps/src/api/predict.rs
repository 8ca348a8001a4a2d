//! Quick price-band prediction

use axum::{
    extract::rejection::JsonRejection,
    routing::post,
    Json, Router,
};
use serde_json::Value;

use super::post_only;
use crate::error::{PipelineError, PipelineResult};
use crate::segment::{quick_predict, QuickPrediction};
use crate::AppState;

/// `buy_price` from the request body; absent means 0, booleans are 1/0
fn buy_price(body: &Value) -> PipelineResult<f64> {
    let object = body
        .as_object()
        .ok_or_else(|| PipelineError::Validation("body must be a JSON object".to_string()))?;
    let price = match object.get("buy_price") {
        None => Some(0.0),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::Bool(b)) => Some(if *b { 1.0 } else { 0.0 }),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };
    price.filter(|p| p.is_finite()).ok_or_else(|| {
        PipelineError::Validation(format!(
            "buy_price must be a number, got {}",
            object.get("buy_price").unwrap_or(&Value::Null)
        ))
    })
}

/// POST /api/predict/
pub async fn predict(
    body: Result<Json<Value>, JsonRejection>,
) -> PipelineResult<Json<QuickPrediction>> {
    let Json(body) = body.map_err(|e| PipelineError::Validation(e.body_text()))?;
    Ok(Json(quick_predict(buy_price(&body)?)))
}

pub fn predict_routes() -> Router<AppState> {
    Router::new()
        .route("/api/predict", post(predict).fallback(post_only))
        .route("/api/predict/", post(predict).fallback(post_only))
}
