//! Stats endpoints. All of them take `?username=` and require the user's
//! setup to have finished at least once.

use std::collections::BTreeMap;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::identity::resolve;
use crate::registry::JobStatus;
use crate::service::{ApiError, AppState};
use crate::stats::{DrawStats, GameStats, PlayerStats, WinLossStats};

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub username: Option<String>,
}

async fn load(state: &AppState, query: &StatsQuery) -> Result<PlayerStats, ApiError> {
    let (username, id) = query
        .username
        .as_deref()
        .and_then(resolve)
        .ok_or(ApiError::UsernameRequired)?;

    match state.sync.registry().get(&id).await {
        Some(status) if status.is_idle() => {}
        Some(JobStatus::Started | JobStatus::Updating) => return Err(ApiError::SetupInProgress),
        _ => return Err(ApiError::NotSetUp),
    }

    let store = state.sync.stores().handle(&id).await?;
    let counts = store.outcome_counts().await?;
    Ok(PlayerStats::from_counts(&username, &counts))
}

pub async fn game_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<BTreeMap<String, GameStats>>, ApiError> {
    tracing::debug!(username = ?query.username, "HTTP gamestats");
    Ok(Json(load(&state, &query).await?.games))
}

pub async fn win_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<BTreeMap<String, WinLossStats>>, ApiError> {
    tracing::debug!(username = ?query.username, "HTTP winstats");
    Ok(Json(load(&state, &query).await?.wins))
}

pub async fn loss_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<BTreeMap<String, WinLossStats>>, ApiError> {
    tracing::debug!(username = ?query.username, "HTTP lossstats");
    Ok(Json(load(&state, &query).await?.losses))
}

pub async fn draw_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<BTreeMap<String, DrawStats>>, ApiError> {
    tracing::debug!(username = ?query.username, "HTTP drawstats");
    Ok(Json(load(&state, &query).await?.draws))
}
