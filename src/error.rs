use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::models::SubmissionResult;

/// Failures at the HTTP boundary, before a submission reaches the orchestrator.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload")]
    MalformedPayload,

    #[error("Too many requests. Please slow down.")]
    Throttled { retry_after_secs: i64 },

    #[error("Metrics unavailable")]
    Metrics(#[from] prometheus::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::MalformedPayload => StatusCode::BAD_REQUEST,
            AppError::Throttled { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Metrics(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(SubmissionResult::failed(self.to_string()));

        match self {
            AppError::Throttled { retry_after_secs } => (
                status,
                [("retry-after", retry_after_secs.max(1).to_string())],
                body,
            )
                .into_response(),
            _ => (status, body).into_response(),
        }
    }
}
