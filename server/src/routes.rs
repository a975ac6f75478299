//! HTTP routes.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::error::ApiError;
use crate::handler::{
    AddRootDirsResponse, LibraryStats, RebuildAccepted, RootDirsResponse, SettingsHandler,
};

pub type AppState = Arc<SettingsHandler>;

/// Build the HTTP router.
pub fn router(handler: AppState) -> Router {
    Router::new()
        .route("/settings/add-root-dirs", post(add_root_dirs))
        .route("/settings/get-root-dirs", get(get_root_dirs))
        .route("/library/rebuild", post(rebuild))
        .route("/library/stats", get(stats))
        .with_state(handler)
}

// The body is taken raw so that malformed JSON maps to our own 400 reply.
pub async fn add_root_dirs(
    State(handler): State<AppState>,
    body: Bytes,
) -> Result<Json<AddRootDirsResponse>, ApiError> {
    handler.add_root_dirs(&body).await.map(Json)
}

pub async fn get_root_dirs(
    State(handler): State<AppState>,
) -> Result<Json<RootDirsResponse>, ApiError> {
    handler.get_root_dirs().await.map(Json)
}

pub async fn rebuild(
    State(handler): State<AppState>,
) -> Result<(StatusCode, Json<RebuildAccepted>), ApiError> {
    let accepted = handler.rebuild().await?;
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

pub async fn stats(State(handler): State<AppState>) -> Json<LibraryStats> {
    Json(handler.stats().await)
}
