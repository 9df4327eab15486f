//! HTTP API handlers for tagscan-server

pub mod auth;
pub mod buildinfo;
pub mod error;
pub mod health;
pub mod items;
pub mod logs;
pub mod pending;
pub mod scan;

pub use auth::auth_middleware;
pub use buildinfo::get_build_info;
pub use error::ApiError;
pub use health::health_routes;
pub use items::{bind_tag, create_item, delete_item, get_item, list_items, update_item};
pub use logs::{create_log, delete_log, get_log, list_logs};
pub use pending::{clear_pending_tag, get_pending_tag};
pub use scan::receive_scan;

/// Requested page number; anything unparsable means the first page
pub(crate) fn parse_page(raw: Option<&str>) -> u64 {
    raw.and_then(|p| p.trim().parse().ok()).unwrap_or(1)
}
