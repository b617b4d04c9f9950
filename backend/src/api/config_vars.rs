//! Config var endpoints

use crate::config_vars::{ConfigMap, DesiredChanges};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::Json,
};
use std::sync::Arc;

/// Get an app's visible config vars
///
/// GET /apps/:app/config-vars
pub async fn get_config_vars(
    State(state): State<Arc<AppState>>,
    Path(app): Path<String>,
) -> Result<Json<ConfigMap>, AppError> {
    let target = state.catalog.find_app(&app).await?;
    Ok(Json(state.config_vars.visible_config(&target).await?))
}

/// Set (string) or delete (`null`) config vars
///
/// PATCH /apps/:app/config-vars
pub async fn update_config_vars(
    State(state): State<Arc<AppState>>,
    Path(app): Path<String>,
    payload: Result<Json<DesiredChanges>, JsonRejection>,
) -> Result<Json<ConfigMap>, AppError> {
    let Json(desired) = payload?;
    let target = state.catalog.find_app(&app).await?;
    let outcome = state.config_vars.reconcile(&target, desired).await?;
    Ok(Json(outcome.config_vars))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::test_state;
    use axum::body::{to_bytes, Body};
    use axum::extract::FromRequest;
    use axum::http::{header, Request, StatusCode};
    use axum::response::IntoResponse;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_patch_then_get_round_trip() {
        let (state, _platform, _dir) = test_state().await;
        state
            .catalog
            .register_app("acme", "default", "api")
            .await
            .unwrap();

        let mut desired = BTreeMap::new();
        desired.insert("FOO".to_string(), Some("bar".to_string()));
        let Json(updated) = update_config_vars(
            State(state.clone()),
            Path("api-default".to_string()),
            Ok(Json(desired)),
        )
        .await
        .unwrap();
        assert_eq!(updated.get("FOO").map(String::as_str), Some("bar"));

        let Json(visible) = get_config_vars(State(state), Path("api-default".to_string()))
            .await
            .unwrap();
        assert_eq!(visible, updated);
    }

    #[tokio::test]
    async fn test_unknown_app() {
        let (state, _platform, _dir) = test_state().await;
        let err = get_config_vars(State(state), Path("ghost-default".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_key_is_unprocessable() {
        let (state, platform, _dir) = test_state().await;
        state
            .catalog
            .register_app("acme", "default", "api")
            .await
            .unwrap();

        let mut desired = BTreeMap::new();
        desired.insert("GOOD".to_string(), Some("1".to_string()));
        desired.insert("NOT-GOOD".to_string(), Some("2".to_string()));
        let err = update_config_vars(State(state), Path("api-default".to_string()), Ok(Json(desired)))
            .await
            .unwrap_err();

        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(platform.config_calls().is_empty());
    }

    #[tokio::test]
    async fn test_mistyped_body_gets_json_error() {
        let (state, platform, _dir) = test_state().await;
        state
            .catalog
            .register_app("acme", "default", "api")
            .await
            .unwrap();

        let request = Request::builder()
            .method("PATCH")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"PORT": 5000}"#))
            .unwrap();
        let payload = Json::<DesiredChanges>::from_request(request, &()).await;

        let err = update_config_vars(State(state), Path("api-default".to_string()), payload)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(platform.config_calls().is_empty());

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["status"], 422);
        assert!(body["error"].as_str().unwrap().contains("PORT"));
    }
}
