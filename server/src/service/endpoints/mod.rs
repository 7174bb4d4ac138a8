//! Endpoint handlers organized by resource

pub mod setup;
pub mod stats;

pub async fn health() -> &'static str {
    "ok"
}
