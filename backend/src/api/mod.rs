//! API module
//!
//! HTTP handlers for app setups, config vars and spaces.

pub mod config_vars;
pub mod setups;
pub mod spaces;

use crate::state::AppState;
use axum::{
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;

/// Body of `GET /api/health`
#[derive(Serialize)]
pub struct HealthResponse {
    /// Always `healthy`
    pub status: String,
    /// Crate version
    pub version: String,
}

/// GET /api/health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// All routes, without middleware
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/app-setups", post(setups::create_setup))
        .route("/app-setups/:id", get(setups::get_setup))
        .route(
            "/apps/:app/config-vars",
            get(config_vars::get_config_vars).patch(config_vars::update_config_vars),
        )
        .route("/apps/:app/app-setups", get(setups::get_app_definition))
        .route("/spaces", post(spaces::create_space))
        .with_state(state)
}
