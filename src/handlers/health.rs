use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{instrument, warn};

use crate::services::VotingService;

/// Liveness plus the service's view of "today" and the cutoff
#[instrument(name = "health_check", skip(voting_service))]
pub async fn health_check(
    State(voting_service): State<Arc<VotingService>>,
) -> Result<Json<Value>, StatusCode> {
    let window = voting_service.window();

    Ok(Json(json!({
        "status": "healthy",
        "service": "lunchvote-rs",
        "version": env!("CARGO_PKG_VERSION"),
        "voting_date": voting_service.today().format(crate::models::VOTE_DATE_FORMAT).to_string(),
        "vote_cutoff": window.cutoff().format("%H:%M").to_string(),
        "timezone": window.timezone().to_string(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

/// Fallback for unmatched routes
pub async fn not_found() -> (StatusCode, Json<Value>) {
    warn!("No route matched");
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not found",
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}
