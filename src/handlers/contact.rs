use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::debug;

use super::client_id_from_headers;
use crate::error::AppError;
use crate::models::{SubmissionPayload, SubmissionResult};
use crate::state::AppState;

pub async fn contact_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<SubmissionPayload>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            debug!(error = %rejection, "rejected contact payload");
            return AppError::MalformedPayload.into_response();
        }
    };

    let client_id = client_id_from_headers(&headers);
    match state.contact.process(payload, &client_id).await {
        Ok(()) => (StatusCode::OK, Json(SubmissionResult::ok())).into_response(),
        Err(e) => (e.status_code(), Json(SubmissionResult::failed(e.to_string()))).into_response(),
    }
}
