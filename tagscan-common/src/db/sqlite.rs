//! Relational backend on SQLite
//!
//! Tag uniqueness comes from the `UNIQUE` constraint on `items.tag` (NULL when
//! unbound), ordering from `ORDER BY`. SQLite's writer lock serializes writes.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::{debug, info};

use super::models::{log_timestamp_now, Item, ItemSort, LogEntry, SortOrder};
use super::Store;
use crate::{Error, Result};

type ItemRow = (i64, String, String, Option<String>);
type LogRow = (i64, i64, i64);

/// [`Store`] backed by a SQLite connection pool
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open or create the database at `db_path` and ensure the schema exists
    pub async fn open(db_path: &Path) -> Result<Self> {
        let newly_created = !db_path.exists();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&db_url)
            .await?;

        if newly_created {
            info!("Initialized new database: {}", db_path.display());
        } else {
            info!("Opened existing database: {}", db_path.display());
        }

        // WAL lets readers proceed while a write is in flight
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA busy_timeout = 5000")
            .execute(&pool)
            .await?;

        let store = Self { pool };
        store.create_schema().await?;
        Ok(store)
    }

    async fn create_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                artist TEXT NOT NULL,
                tag TEXT UNIQUE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // No foreign key on item_id: log entries outlive deleted items
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                logged_at_us INTEGER NOT NULL,
                item_id INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_name ON items(name, id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_artist ON items(artist, id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_logs_time ON logs(logged_at_us, id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Underlying pool, for tests and diagnostics
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn item_from_row((id, name, artist, tag): ItemRow) -> Item {
    Item {
        id: id as u64,
        name,
        artist,
        tag,
    }
}

fn log_from_row((id, logged_at_us, item_id): LogRow) -> Result<LogEntry> {
    let time = DateTime::<Utc>::from_timestamp_micros(logged_at_us).ok_or_else(|| {
        Error::Internal(format!("log {} has invalid timestamp {}", id, logged_at_us))
    })?;
    Ok(LogEntry {
        id: id as u64,
        time,
        item_id: item_id as u64,
    })
}

/// SQLITE_FULL, also raised once AUTOINCREMENT has issued the largest rowid
const SQLITE_FULL: &str = "13";

/// Translate unique-constraint violations into `Conflict`
fn map_write_error(e: sqlx::Error, id: u64, tag: Option<&str>) -> Error {
    if let sqlx::Error::Database(db_err) = &e {
        if id == 0 && db_err.code().as_deref() == Some(SQLITE_FULL) {
            return Error::Conflict("item id space exhausted".to_string());
        }
        if db_err.is_unique_violation() {
            return if db_err.message().contains("items.tag") {
                Error::Conflict(format!(
                    "tag '{}' is already bound to another item",
                    tag.unwrap_or_default()
                ))
            } else {
                Error::Conflict(format!("item {} already exists", id))
            };
        }
    }
    Error::Database(e)
}

/// Rowid for `id`, or `None` when no row can have it
fn row_id(id: u64) -> Option<i64> {
    i64::try_from(id).ok()
}

/// LIMIT/OFFSET value; anything past `i64::MAX` means "no bound" anyway
fn clamp_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_item(&self, item: Item) -> Result<Item> {
        let mut item = item.validated_new()?;
        let explicit_id = row_id(item.id).filter(|id| *id != 0);

        let result = sqlx::query("INSERT INTO items (id, name, artist, tag) VALUES (?, ?, ?, ?)")
            .bind(explicit_id)
            .bind(&item.name)
            .bind(&item.artist)
            .bind(&item.tag)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, item.id, item.tag.as_deref()))?;

        item.id = result.last_insert_rowid() as u64;
        debug!(id = item.id, "Created item");
        Ok(item)
    }

    async fn update_item(&self, item: Item) -> Result<Item> {
        let item = item.validated()?;
        let Some(id) = row_id(item.id) else {
            return Err(Error::NotFound(format!("item {}", item.id)));
        };

        let result = sqlx::query("UPDATE items SET name = ?, artist = ?, tag = ? WHERE id = ?")
            .bind(&item.name)
            .bind(&item.artist)
            .bind(&item.tag)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, item.id, item.tag.as_deref()))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("item {}", item.id)));
        }
        Ok(item)
    }

    async fn set_item_tag(&self, id: u64, tag: &str) -> Result<Item> {
        if tag.trim().is_empty() {
            return Err(Error::Validation("tag must not be empty".to_string()));
        }
        let Some(rowid) = row_id(id) else {
            return Err(Error::NotFound(format!("item {}", id)));
        };

        sqlx::query_as::<_, ItemRow>(
            "UPDATE items SET tag = ? WHERE id = ? RETURNING id, name, artist, tag",
        )
        .bind(tag)
        .bind(rowid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_write_error(e, id, Some(tag)))?
        .map(item_from_row)
        .ok_or_else(|| Error::NotFound(format!("item {}", id)))
    }

    async fn get_item(&self, id: u64) -> Result<Item> {
        let Some(rowid) = row_id(id) else {
            return Err(Error::NotFound(format!("item {}", id)));
        };
        sqlx::query_as::<_, ItemRow>("SELECT id, name, artist, tag FROM items WHERE id = ?")
            .bind(rowid)
            .fetch_optional(&self.pool)
            .await?
            .map(item_from_row)
            .ok_or_else(|| Error::NotFound(format!("item {}", id)))
    }

    async fn get_item_by_tag(&self, tag: &str) -> Result<Item> {
        sqlx::query_as::<_, ItemRow>("SELECT id, name, artist, tag FROM items WHERE tag = ?")
            .bind(tag)
            .fetch_optional(&self.pool)
            .await?
            .map(item_from_row)
            .ok_or_else(|| Error::NotFound(format!("item with tag '{}'", tag)))
    }

    async fn delete_item(&self, id: u64) -> Result<()> {
        let Some(rowid) = row_id(id) else {
            return Err(Error::NotFound(format!("item {}", id)));
        };
        let result = sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(rowid)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("item {}", id)));
        }
        Ok(())
    }

    async fn list_items(
        &self,
        sort: ItemSort,
        order: SortOrder,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Item>> {
        // Column and direction come from enums, never from user text
        let sql = format!(
            "SELECT id, name, artist, tag FROM items ORDER BY {} {}, id ASC LIMIT ? OFFSET ?",
            sort.as_str(),
            order.as_sql()
        );

        let rows = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(clamp_i64(limit))
            .bind(clamp_i64(offset))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(item_from_row).collect())
    }

    async fn count_items(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn create_log(&self, item_id: u64) -> Result<LogEntry> {
        let time = log_timestamp_now();

        let result = sqlx::query("INSERT INTO logs (logged_at_us, item_id) VALUES (?, ?)")
            .bind(time.timestamp_micros())
            // Bit pattern of the u64; reads cast back, so every value round-trips
            .bind(item_id as i64)
            .execute(&self.pool)
            .await?;

        Ok(LogEntry {
            id: result.last_insert_rowid() as u64,
            time,
            item_id,
        })
    }

    async fn get_log(&self, id: u64) -> Result<LogEntry> {
        let Some(rowid) = row_id(id) else {
            return Err(Error::NotFound(format!("log entry {}", id)));
        };
        let row = sqlx::query_as::<_, LogRow>(
            "SELECT id, logged_at_us, item_id FROM logs WHERE id = ?",
        )
        .bind(rowid)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("log entry {}", id)))?;

        log_from_row(row)
    }

    async fn list_logs(&self, order: SortOrder, offset: u64, limit: u64) -> Result<Vec<LogEntry>> {
        let sql = format!(
            "SELECT id, logged_at_us, item_id FROM logs ORDER BY logged_at_us {}, id ASC LIMIT ? OFFSET ?",
            order.as_sql()
        );

        let rows = sqlx::query_as::<_, LogRow>(&sql)
            .bind(clamp_i64(limit))
            .bind(clamp_i64(offset))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(log_from_row).collect()
    }

    async fn count_logs(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM logs")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn delete_log(&self, id: u64) -> Result<()> {
        let Some(rowid) = row_id(id) else {
            return Err(Error::NotFound(format!("log entry {}", id)));
        };
        let result = sqlx::query("DELETE FROM logs WHERE id = ?")
            .bind(rowid)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("log entry {}", id)));
        }
        Ok(())
    }
}
