//! Error taxonomy for the oracle and its HTTP mapping.
//!
//! Validation problems are the caller's fault (400), collaborator problems are
//! upstream faults (502 / 504). An empty ledger is never an error.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::time::Duration;
use thiserror::Error;

/// Failure of the text classifier collaborator.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier is not configured: {0}")]
    NotConfigured(String),
    #[error("classifier transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("classifier returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("classifier returned a malformed response: {0}")]
    Malformed(String),
}

impl ClassifierError {
    /// Whether a retry has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            ClassifierError::Transport(_) => true,
            ClassifierError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Failure of a single aggregation.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error("classifier did not answer within {0:?}")]
    Timeout(Duration),
}

impl AnalyzeError {
    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalyzeError::Classifier(_) => "classifier",
            AnalyzeError::Timeout(_) => "timeout",
        }
    }
}

/// Errors surfaced by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Analyze(#[from] AnalyzeError),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Analyze(AnalyzeError::Classifier(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Analyze(AnalyzeError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}
