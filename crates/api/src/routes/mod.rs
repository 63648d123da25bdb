//! HTTP routes

mod health;
mod import;


use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub use health::{health, HealthResponse};
pub use import::{import_customers, ImportCustomersRequest, ImportCustomersResponse};

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.max_body_bytes;

    Router::new()
        .route("/health", get(health))
        .route("/api/import-customers", post(import_customers))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
