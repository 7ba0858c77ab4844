//! Contact form gateway.
//!
//! Accepts contact form submissions over HTTP and runs each one through a
//! short safety pipeline (schema, sanitizing, heuristic screening, duplicate
//! and rate checks) before handing it to an email provider.

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};

pub mod client;
pub mod config;
pub mod contact;
pub mod duplicate;
pub mod error;
pub mod handlers;
pub mod mailer;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod sanitize;
pub mod security;
pub mod state;
pub mod sweeper;
pub mod validation;

use handlers::{api_rate_limit, contact_handler, health_handler, metrics_handler};
use state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/contact", post(contact_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), api_rate_limit))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}
