//! Item catalogue endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tagscan_common::{Item, ItemSort, LogEntry, SortOrder};
use tracing::{info, warn};

use super::{parse_page, ApiError};
use crate::pagination::{paginate, Pagination, PAGE_SIZE};
use crate::AppState;

/// Query parameters for item listing
///
/// Kept as raw strings so unknown values fall back to defaults instead of failing.
#[derive(Debug, Default, Deserialize)]
pub struct ItemListQuery {
    pub sort: Option<String>,
    pub order: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ItemListResponse {
    pub items: Vec<Item>,
    pub sort: ItemSort,
    pub order: SortOrder,
    pub total: u64,
    pub pagination: Pagination,
}

/// Body for create and full update
#[derive(Debug, Deserialize)]
pub struct ItemPayload {
    pub name: String,
    pub artist: String,
    #[serde(default)]
    pub tag: Option<String>,
    /// Create only: also record a play of the new item
    #[serde(default)]
    pub log: bool,
}

impl ItemPayload {
    fn into_item(self, id: u64) -> Item {
        Item {
            id,
            name: self.name.trim().to_string(),
            artist: self.artist.trim().to_string(),
            tag: self.tag.map(|tag| tag.trim().to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedItem {
    pub item: Item,
    pub log_entry: Option<LogEntry>,
}

#[derive(Debug, Deserialize)]
pub struct BindTagPayload {
    pub tag: String,
}

/// GET /api/items
pub async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<ItemListQuery>,
) -> Result<Json<ItemListResponse>, ApiError> {
    let sort: ItemSort = query
        .sort
        .as_deref()
        .and_then(|s| s.parse().ok())
        .unwrap_or_default();
    let order: SortOrder = query
        .order
        .as_deref()
        .and_then(|s| s.parse().ok())
        .unwrap_or_default();

    let total = state.store.count_items().await?;
    let pagination = paginate(total, PAGE_SIZE, parse_page(query.page.as_deref()));
    let items = state
        .store
        .list_items(sort, order, pagination.offset, PAGE_SIZE)
        .await?;

    Ok(Json(ItemListResponse {
        items,
        sort,
        order,
        total,
        pagination,
    }))
}

/// POST /api/items
///
/// With `log: true` a play of the new item is recorded as well.
pub async fn create_item(
    State(state): State<AppState>,
    Json(payload): Json<ItemPayload>,
) -> Result<(StatusCode, Json<CreatedItem>), ApiError> {
    let log = payload.log;
    let item = state.store.create_item(payload.into_item(0)).await?;
    info!(item_id = item.id, tag = ?item.tag, "Created item");

    if let Some(tag) = item.tag.as_deref() {
        state.resolver.clear_pending_tag_if(tag);
    }

    // Item is already committed; a log failure only leaves log_entry empty
    let log_entry = if log {
        match state.store.create_log(item.id).await {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(item_id = item.id, error = %e, "Created item but failed to log play");
                None
            }
        }
    } else {
        None
    };

    Ok((StatusCode::CREATED, Json(CreatedItem { item, log_entry })))
}

/// GET /api/items/:id
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Item>, ApiError> {
    Ok(Json(state.store.get_item(id).await?))
}

/// PUT /api/items/:id
///
/// Replaces every field; omitting `tag` unbinds the item.
pub async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(payload): Json<ItemPayload>,
) -> Result<Json<Item>, ApiError> {
    let item = state.store.update_item(payload.into_item(id)).await?;
    info!(item_id = item.id, tag = ?item.tag, "Updated item");

    if let Some(tag) = item.tag.as_deref() {
        state.resolver.clear_pending_tag_if(tag);
    }
    Ok(Json(item))
}

/// DELETE /api/items/:id
///
/// Deleting an item that does not exist succeeds.
pub async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    match state.store.delete_item(id).await {
        Ok(()) => info!(item_id = id, "Deleted item"),
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e.into()),
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/items/:id/tag
///
/// Binds `tag` to the item and clears the pending tag if it was this one.
pub async fn bind_tag(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(payload): Json<BindTagPayload>,
) -> Result<Json<Item>, ApiError> {
    let tag = payload.tag.trim();
    if tag.is_empty() {
        return Err(ApiError::bad_request("tag must not be empty"));
    }

    let item = state.store.set_item_tag(id, tag).await?;
    info!(item_id = id, tag, "Bound tag");

    state.resolver.clear_pending_tag_if(tag);
    Ok(Json(item))
}
