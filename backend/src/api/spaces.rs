//! Space registration endpoint

use crate::error::AppError;
use crate::state::{AppState, SpaceRecord};
use axum::{extract::State, http::StatusCode, response::Json};
use serde::Deserialize;
use std::sync::Arc;

/// Body of `POST /spaces`
#[derive(Debug, Deserialize)]
pub struct CreateSpaceRequest {
    /// Space name
    pub name: String,
    /// Stack serving the space's apps
    pub stack: String,
    /// Region serving the space's services
    pub region: String,
    /// Compliance regimes, e.g. `["socs"]`
    #[serde(default)]
    pub compliance: Vec<String>,
}

/// Register or update a space
///
/// POST /spaces
pub async fn create_space(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateSpaceRequest>,
) -> Result<(StatusCode, Json<SpaceRecord>), AppError> {
    let name = request.name.trim().to_lowercase();
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(AppError::Validation(format!(
            "The space name {:?} is invalid.",
            request.name
        )));
    }
    if request.stack.trim().is_empty() || request.region.trim().is_empty() {
        return Err(AppError::Validation(
            "A space requires both a stack and a region.".to_string(),
        ));
    }

    let space = SpaceRecord {
        name,
        stack: request.stack.trim().to_string(),
        region: request.region.trim().to_string(),
        tags: request
            .compliance
            .iter()
            .map(|regime| format!("compliance={}", regime.trim().to_lowercase()))
            .collect(),
    };
    state.catalog.register_space(&space).await?;
    Ok((StatusCode::CREATED, Json(space)))
}
