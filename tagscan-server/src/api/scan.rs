//! Scan ingestion endpoint

use axum::{extract::State, http::StatusCode};
use tracing::info;

use super::ApiError;
use crate::AppState;

/// POST /api/tag
///
/// Body is the raw tag as plain text. Responds as soon as the scan is queued;
/// resolution happens in the background.
pub async fn receive_scan(
    State(state): State<AppState>,
    body: String,
) -> Result<StatusCode, ApiError> {
    let tag = body.trim();
    if tag.is_empty() {
        return Err(ApiError::bad_request("tag must not be empty"));
    }

    info!(tag, "Received scan");
    state.resolver.submit(tag);
    Ok(StatusCode::OK)
}
