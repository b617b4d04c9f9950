//! App setup endpoints

use crate::error::AppError;
use crate::setup::{AppDefinition, SetupRequest};
use crate::state::{AppState, SetupStatus};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Json,
};
use std::sync::Arc;
use uuid::Uuid;

/// Submit an app setup
///
/// POST /app-setups
pub async fn create_setup(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SetupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SetupStatus>), AppError> {
    let Json(request) = payload?;
    let accepted = state.setups.submit(request).await?;
    Ok((StatusCode::CREATED, Json(accepted)))
}

/// Get the state of an app setup
///
/// GET /app-setups/:id
pub async fn get_setup(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SetupStatus>, AppError> {
    let setup_id = Uuid::parse_str(&id)
        .map_err(|_| AppError::NotFound(format!("The specified app setup {} was not found.", id)))?;
    Ok(Json(state.setups.status(setup_id).await?))
}

/// Blueprint of an existing app, shaped like a setup request
///
/// GET /apps/:app/app-setups
pub async fn get_app_definition(
    State(state): State<Arc<AppState>>,
    Path(app): Path<String>,
) -> Result<Json<AppDefinition>, AppError> {
    Ok(Json(state.setups.definition(&app).await?))
}
