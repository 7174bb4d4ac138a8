//! HTTP service with modular organization
//!
//! - endpoints: handlers, one module per resource
//! - error: `ApiError` and its JSON response body
//!
//! | Route | Handler |
//! |---|---|
//! | `POST /setup` | [`endpoints::setup::setup`] |
//! | `GET /gamestats` | [`endpoints::stats::game_stats`] |
//! | `GET /winstats` | [`endpoints::stats::win_stats`] |
//! | `GET /lossstats` | [`endpoints::stats::loss_stats`] |
//! | `GET /drawstats` | [`endpoints::stats::draw_stats`] |
//! | `GET /health` | [`endpoints::health`] |

mod endpoints;
mod error;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::sync::SyncService;

pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub sync: Arc<SyncService>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/setup", post(endpoints::setup::setup))
        .route("/gamestats", get(endpoints::stats::game_stats))
        .route("/winstats", get(endpoints::stats::win_stats))
        .route("/lossstats", get(endpoints::stats::loss_stats))
        .route("/drawstats", get(endpoints::stats::draw_stats))
        .route("/health", get(endpoints::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
