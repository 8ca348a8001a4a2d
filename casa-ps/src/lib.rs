//! casa-ps library interface
//!
//! Property prediction service: reconciles partial property records against
//! the reference dataset's schema, runs exported regression and clustering
//! pipelines over them and serves the results as JSON.

pub mod api;
pub mod config;
pub mod data;
pub mod error;
pub mod forms;
pub mod models;
pub mod pipeline;
pub mod query;
pub mod reconcile;
pub mod sanitize;
pub mod schema;
pub mod segment;

pub use crate::error::{PipelineError, PipelineResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use casa_common::config::LimitsConfig;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::models::ArtifactStore;
use crate::pipeline::PipelineRunner;
use crate::reconcile::FeatureReconciler;
use crate::schema::SchemaRegistry;

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Reference schema and dataset, read-only after startup
    pub registry: Arc<SchemaRegistry>,
    pub reconciler: FeatureReconciler,
    pub runner: PipelineRunner,
    pub limits: LimitsConfig,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(registry: SchemaRegistry, store: ArtifactStore, limits: LimitsConfig) -> Self {
        let registry = Arc::new(registry);
        Self {
            reconciler: FeatureReconciler::new(Arc::clone(&registry)),
            runner: PipelineRunner::new(Arc::new(store)),
            registry,
            limits,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::root_routes())
        .merge(api::property_routes())
        .merge(api::clustering_routes())
        .merge(api::predict_routes())
        .merge(api::legacy_routes())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
