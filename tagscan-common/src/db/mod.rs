//! Persistent storage for items and play logs
//!
//! Two interchangeable backends implement [`Store`]:
//! - [`SqliteStore`]: relational, constraints and ordering delegated to SQLite
//! - [`KvStore`]: ordered key-value (redb), uniqueness and ordering kept in
//!   application-maintained index tables
//!
//! Both are driven by the same contract test suite (`tests/store_contract_tests.rs`).

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{Error, Result};

pub mod kv;
pub mod models;
pub mod sqlite;

pub use kv::KvStore;
pub use models::*;
pub use sqlite::SqliteStore;

/// Storage contract shared by every backend
///
/// Writes are serialized by the backend's own transaction mechanism and the
/// tag uniqueness rule is enforced inside the write, never by the caller.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a new item, assigning an id when `item.id == 0`
    ///
    /// Fails `Validation` on blank name/artist and `Conflict` when the tag
    /// (or an explicit id) is already taken.
    async fn create_item(&self, item: Item) -> Result<Item>;

    /// Replace an existing item; `NotFound` when `item.id` does not exist
    async fn update_item(&self, item: Item) -> Result<Item>;

    /// Bind `tag` to an existing item in a single write, leaving other fields untouched
    ///
    /// `Validation` on a blank tag, `NotFound` for a missing item, `Conflict` when
    /// another item holds the tag. Any tag the item held before is released.
    async fn set_item_tag(&self, id: u64, tag: &str) -> Result<Item>;

    async fn get_item(&self, id: u64) -> Result<Item>;

    async fn get_item_by_tag(&self, tag: &str) -> Result<Item>;

    /// Remove an item; `NotFound` when it does not exist
    ///
    /// Log entries referencing the item are left in place.
    async fn delete_item(&self, id: u64) -> Result<()>;

    /// Page through items ordered by `sort`, ties broken by ascending id
    async fn list_items(
        &self,
        sort: ItemSort,
        order: SortOrder,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Item>>;

    async fn count_items(&self) -> Result<u64>;

    /// Record a play of `item_id` at the current UTC time
    ///
    /// The item is not required to exist.
    async fn create_log(&self, item_id: u64) -> Result<LogEntry>;

    async fn get_log(&self, id: u64) -> Result<LogEntry>;

    /// Page through log entries ordered by time, ties broken by ascending id
    async fn list_logs(&self, order: SortOrder, offset: u64, limit: u64) -> Result<Vec<LogEntry>>;

    async fn count_logs(&self) -> Result<u64>;

    /// Remove a log entry; `NotFound` when it does not exist
    async fn delete_log(&self, id: u64) -> Result<()>;
}

/// Which storage engine backs the [`Store`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Kv,
}

impl StoreBackend {
    /// File name of the database inside the data directory
    pub fn file_name(&self) -> &'static str {
        match self {
            StoreBackend::Sqlite => "tagscan.db",
            StoreBackend::Kv => "tagscan.redb",
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Sqlite => f.write_str("sqlite"),
            StoreBackend::Kv => f.write_str("kv"),
        }
    }
}

impl FromStr for StoreBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(StoreBackend::Sqlite),
            "kv" | "redb" => Ok(StoreBackend::Kv),
            other => Err(Error::Config(format!(
                "unknown storage backend '{}' (expected 'sqlite' or 'kv')",
                other
            ))),
        }
    }
}

/// Open (creating if needed) the store for `backend` inside `data_dir`
pub async fn open_store(backend: StoreBackend, data_dir: &Path) -> Result<Arc<dyn Store>> {
    std::fs::create_dir_all(data_dir)?;
    let path = data_dir.join(backend.file_name());

    info!(backend = %backend, path = %path.display(), "Opening store");

    let store: Arc<dyn Store> = match backend {
        StoreBackend::Sqlite => Arc::new(SqliteStore::open(&path).await?),
        StoreBackend::Kv => Arc::new(KvStore::open(&path).await?),
    };
    Ok(store)
}
