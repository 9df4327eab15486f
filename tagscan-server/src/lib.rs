//! tagscan-server library
//!
//! Receives tag scans over HTTP, resolves them against the item catalogue in
//! the background, and serves the administrative JSON API.

use std::sync::Arc;

use axum::Router;
use tagscan_common::Store;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod notify;
pub mod pagination;
pub mod scan;

use scan::ScanResolver;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub resolver: Arc<ScanResolver>,
    /// `None` disables authentication
    pub api_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        resolver: Arc<ScanResolver>,
        api_token: Option<String>,
    ) -> Self {
        Self {
            store,
            resolver,
            api_token: api_token.map(Arc::from),
        }
    }
}

/// Build application router
///
/// Everything under `/api` requires the API token; `/health` does not.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    // Protected routes (require authentication)
    let protected = Router::new()
        .route("/api/tag", post(api::receive_scan))
        .route("/api/buildinfo", get(api::get_build_info))
        .route("/api/items", get(api::list_items).post(api::create_item))
        .route(
            "/api/items/:id",
            get(api::get_item)
                .put(api::update_item)
                .delete(api::delete_item),
        )
        .route("/api/items/:id/tag", post(api::bind_tag))
        .route("/api/logs", get(api::list_logs).post(api::create_log))
        .route("/api/logs/:id", get(api::get_log).delete(api::delete_log))
        .route(
            "/api/pending-tag",
            get(api::get_pending_tag).delete(api::clear_pending_tag),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    // Public routes (no authentication)
    let public = Router::new().merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
