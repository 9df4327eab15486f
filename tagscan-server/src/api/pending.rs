//! Pending-tag endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tracing::info;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct PendingTagResponse {
    pub tag: Option<String>,
}

/// GET /api/pending-tag
pub async fn get_pending_tag(State(state): State<AppState>) -> Json<PendingTagResponse> {
    Json(PendingTagResponse {
        tag: state.resolver.pending_tag(),
    })
}

/// DELETE /api/pending-tag
pub async fn clear_pending_tag(State(state): State<AppState>) -> StatusCode {
    state.resolver.clear_pending_tag();
    info!("Pending tag cleared");
    StatusCode::NO_CONTENT
}
