//! `POST /setup`: start or refresh a user's archive sync.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::service::{ApiError, AppState};
use crate::sync::SyncResponse;

#[derive(Debug, Deserialize)]
pub struct SetupRequest {
    #[serde(default)]
    pub username: String,
}

/// Returns as soon as the request is accepted; the sync itself keeps running
/// in the background.
pub async fn setup(
    State(state): State<AppState>,
    Json(request): Json<SetupRequest>,
) -> Result<Json<SyncResponse>, ApiError> {
    tracing::info!(username = %request.username, "HTTP setup");
    let handle = state.sync.request_sync(&request.username).await?;
    tracing::debug!(
        user_id = %handle.response.id,
        status = %handle.response.status,
        started = handle.started_work(),
        "Setup accepted"
    );
    Ok(Json(handle.response))
}
