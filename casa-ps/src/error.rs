//! Error types for casa-ps
//!
//! Every failure inside reconciliation or pipeline execution is one of the
//! `PipelineError` kinds. The HTTP boundary turns each kind into a status code
//! and a `{"error": ...}` body; internal detail only goes to the server log.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Pipeline error kinds
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Unparseable request value (400)
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Request used a method the endpoint does not accept (405)
    #[error("Method {0} not allowed")]
    MethodNotAllowed(String),

    /// Columns required by a projection are absent from the batch (400)
    #[error("Missing required columns: {}", .missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    /// Artifact file missing or corrupt (500 unless a fallback applies)
    #[error("Model artifact {artifact} unavailable: {reason}")]
    ModelUnavailable { artifact: String, reason: String },

    /// A pipeline stage failed while running (500)
    #[error("Prediction failed: {0}")]
    PredictionFailed(String),

    /// Reference dataset missing or corrupt (500, fatal at startup)
    #[error("Reference data error: {0}")]
    UpstreamData(String),

    /// Requested record does not exist (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unexpected server-side failure (500)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for pipeline and handler code
pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    /// HTTP status for this error kind
    pub fn status(&self) -> StatusCode {
        match self {
            PipelineError::Validation(_) | PipelineError::SchemaMismatch { .. } => {
                StatusCode::BAD_REQUEST
            }
            PipelineError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
            PipelineError::ModelUnavailable { .. }
            | PipelineError::PredictionFailed(_)
            | PipelineError::UpstreamData(_)
            | PipelineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to clients
    ///
    /// Client-caused errors echo their detail. Server-side errors return a
    /// fixed message per kind.
    pub fn public_message(&self) -> String {
        match self {
            PipelineError::Validation(_)
            | PipelineError::SchemaMismatch { .. }
            | PipelineError::NotFound(_) => self.to_string(),
            PipelineError::MethodNotAllowed(method) => {
                format!("Method {} not allowed, use POST", method)
            }
            PipelineError::ModelUnavailable { .. } => "Model unavailable".to_string(),
            PipelineError::PredictionFailed(_) => "Prediction failed".to_string(),
            PipelineError::UpstreamData(_) => "Reference data unavailable".to_string(),
            PipelineError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl From<casa_common::Error> for PipelineError {
    fn from(err: casa_common::Error) -> Self {
        match err {
            casa_common::Error::InvalidInput(msg) => PipelineError::Validation(msg),
            other => PipelineError::UpstreamData(other.to_string()),
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }

        let body = Json(json!({
            "error": self.public_message(),
        }));

        (status, body).into_response()
    }
}
