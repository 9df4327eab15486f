//! Play log endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tagscan_common::{Item, LogEntry, SortOrder, Store};
use tracing::info;

use super::{parse_page, ApiError};
use crate::pagination::{paginate, Pagination, PAGE_SIZE};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct LogListQuery {
    pub order: Option<String>,
    pub page: Option<String>,
}

/// A log entry with the item it refers to, `null` once that item is deleted
#[derive(Debug, Serialize)]
pub struct LogView {
    #[serde(flatten)]
    pub entry: LogEntry,
    pub item: Option<Item>,
}

#[derive(Debug, Serialize)]
pub struct LogListResponse {
    pub entries: Vec<LogView>,
    pub order: SortOrder,
    pub total: u64,
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize)]
pub struct CreateLogPayload {
    pub item_id: u64,
}

async fn resolve_item(store: &dyn Store, entry: LogEntry) -> Result<LogView, ApiError> {
    let item = match store.get_item(entry.item_id).await {
        Ok(item) => Some(item),
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(e.into()),
    };
    Ok(LogView { entry, item })
}

/// GET /api/logs
///
/// Newest first unless `order=asc`.
pub async fn list_logs(
    State(state): State<AppState>,
    Query(query): Query<LogListQuery>,
) -> Result<Json<LogListResponse>, ApiError> {
    let order: SortOrder = query
        .order
        .as_deref()
        .and_then(|s| s.parse().ok())
        .unwrap_or(SortOrder::Desc);

    let total = state.store.count_logs().await?;
    let pagination = paginate(total, PAGE_SIZE, parse_page(query.page.as_deref()));
    let page = state
        .store
        .list_logs(order, pagination.offset, PAGE_SIZE)
        .await?;

    let mut entries = Vec::with_capacity(page.len());
    for entry in page {
        entries.push(resolve_item(state.store.as_ref(), entry).await?);
    }

    Ok(Json(LogListResponse {
        entries,
        order,
        total,
        pagination,
    }))
}

/// POST /api/logs
///
/// Records a manual play; the item is not required to exist.
pub async fn create_log(
    State(state): State<AppState>,
    Json(payload): Json<CreateLogPayload>,
) -> Result<(StatusCode, Json<LogEntry>), ApiError> {
    let entry = state.store.create_log(payload.item_id).await?;
    info!(log_id = entry.id, item_id = entry.item_id, "Recorded manual play");
    Ok((StatusCode::CREATED, Json(entry)))
}

/// GET /api/logs/:id
pub async fn get_log(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<LogView>, ApiError> {
    let entry = state.store.get_log(id).await?;
    Ok(Json(resolve_item(state.store.as_ref(), entry).await?))
}

/// DELETE /api/logs/:id
pub async fn delete_log(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    match state.store.delete_log(id).await {
        Ok(()) => info!(log_id = id, "Deleted log entry"),
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e.into()),
    }
    Ok(StatusCode::NO_CONTENT)
}
