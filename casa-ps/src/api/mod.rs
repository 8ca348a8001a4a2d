//! HTTP API handlers for casa-ps

pub mod clustering;
pub mod health;
pub mod legacy;
pub mod predict;
pub mod properties;
pub mod root;

pub use clustering::clustering_routes;
pub use health::health_routes;
pub use legacy::legacy_routes;
pub use predict::predict_routes;
pub use properties::property_routes;
pub use root::root_routes;

use axum::http::Method;

use crate::error::{PipelineError, PipelineResult};

/// Run pipeline work on the blocking pool
pub(crate) async fn run_blocking<F, T>(work: F) -> PipelineResult<T>
where
    F: FnOnce() -> PipelineResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| PipelineError::Internal(format!("blocking task failed: {}", e)))?
}

/// Fallback for POST-only routes
pub(crate) async fn post_only(method: Method) -> PipelineError {
    PipelineError::MethodNotAllowed(method.to_string())
}
