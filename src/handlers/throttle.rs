use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::{error, warn};

use super::client_id_from_headers;
use crate::error::AppError;
use crate::metrics::API_THROTTLED;
use crate::state::AppState;

/// Generic per-client limiter in front of every `/api` route.
pub async fn api_rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let client_id = client_id_from_headers(request.headers());
    let now = Utc::now();

    match state.api_limiter.check_at(&client_id, now) {
        Ok(decision) if decision.allowed => next.run(request).await,
        Ok(decision) => {
            API_THROTTLED.inc();
            warn!(path = %request.uri().path(), "api request throttled");
            AppError::Throttled {
                retry_after_secs: (decision.reset_time - now).num_seconds(),
            }
            .into_response()
        }
        // fail open
        Err(e) => {
            error!(error = %e, "api rate limiter failed");
            next.run(request).await
        }
    }
}
