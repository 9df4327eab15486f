//! Ordered key-value backend on redb
//!
//! redb has no constraints or query planner, so this backend keeps its own
//! index tables and checks uniqueness inside the single write transaction
//! redb allows at a time:
//!
//! | table             | key          | value          |
//! |-------------------|--------------|----------------|
//! | `items`           | id           | JSON `Item`    |
//! | `item_tags`       | tag          | item id        |
//! | `items_by_name`   | (name, id)   | ()             |
//! | `items_by_artist` | (artist, id) | ()             |
//! | `logs`            | id           | JSON `LogEntry`|
//! | `logs_by_time`    | (micros, id) | ()             |
//! | `sequences`       | name         | last issued id |
//!
//! redb is synchronous; every operation runs on the blocking thread pool.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use redb::{
    Database, ReadTransaction, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use tracing::{debug, info, warn};

use super::models::{log_timestamp_now, Item, ItemSort, LogEntry, SortOrder, MAX_ITEM_ID};
use super::Store;
use crate::{Error, Result};

const ITEMS: TableDefinition<u64, &[u8]> = TableDefinition::new("items");
const ITEM_TAGS: TableDefinition<&str, u64> = TableDefinition::new("item_tags");
const ITEMS_BY_NAME: TableDefinition<(&str, u64), ()> = TableDefinition::new("items_by_name");
const ITEMS_BY_ARTIST: TableDefinition<(&str, u64), ()> = TableDefinition::new("items_by_artist");
const LOGS: TableDefinition<u64, &[u8]> = TableDefinition::new("logs");
const LOGS_BY_TIME: TableDefinition<(i64, u64), ()> = TableDefinition::new("logs_by_time");
const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

const ITEM_SEQ: &str = "items";
const LOG_SEQ: &str = "logs";

/// [`Store`] backed by a redb database file
#[derive(Clone)]
pub struct KvStore {
    db: Arc<Database>,
}

impl KvStore {
    /// Open or create the database at `db_path` and ensure every table exists
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let path = db_path.to_path_buf();
        let db = tokio::task::spawn_blocking(move || -> Result<Database> {
            let db = Database::create(&path)?;
            write(&db, |txn| {
                txn.open_table(ITEMS)?;
                txn.open_table(ITEM_TAGS)?;
                txn.open_table(ITEMS_BY_NAME)?;
                txn.open_table(ITEMS_BY_ARTIST)?;
                txn.open_table(LOGS)?;
                txn.open_table(LOGS_BY_TIME)?;
                txn.open_table(SEQUENCES)?;
                Ok(())
            })?;
            Ok(db)
        })
        .await
        .map_err(|e| Error::Internal(format!("storage task failed: {}", e)))??;

        info!("Opened key-value store: {}", db_path.display());
        Ok(Self { db: Arc::new(db) })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| Error::Internal(format!("storage task failed: {}", e)))?
    }
}

/// Run `f` in a write transaction, committing on success and aborting on error
fn write<T>(db: &Database, f: impl FnOnce(&WriteTransaction) -> Result<T>) -> Result<T> {
    let txn = db.begin_write()?;
    match f(&txn) {
        Ok(out) => {
            txn.commit()?;
            Ok(out)
        }
        Err(e) => {
            if let Err(abort_err) = txn.abort() {
                warn!("Failed to abort write transaction: {}", abort_err);
            }
            Err(e)
        }
    }
}

fn read<T>(db: &Database, f: impl FnOnce(&ReadTransaction) -> Result<T>) -> Result<T> {
    let txn = db.begin_read()?;
    f(&txn)
}

fn to_usize(v: u64) -> usize {
    usize::try_from(v).unwrap_or(usize::MAX)
}

/// Page through index keys visited in descending order while keeping ties
/// (equal keys) in ascending id order
///
/// `entries` must yield `(key, id)` pairs sorted by `(key desc, id desc)`,
/// i.e. a reversed scan of a `(key, id)` index.
fn page_desc_ascending_ties<K, I>(entries: I, offset: usize, limit: usize) -> Result<Vec<u64>>
where
    K: PartialEq,
    I: IntoIterator<Item = Result<(K, u64)>>,
{
    let wanted = offset.saturating_add(limit);
    let mut page = Vec::new();
    let mut position = 0usize;
    let mut run_key: Option<K> = None;
    let mut run: Vec<u64> = Vec::new();

    let mut flush = |run: &mut Vec<u64>, position: &mut usize| {
        for id in run.drain(..).rev() {
            if *position >= offset && page.len() < limit {
                page.push(id);
            }
            *position += 1;
        }
    };

    for entry in entries {
        let (key, id) = entry?;
        if run_key.as_ref() != Some(&key) {
            flush(&mut run, &mut position);
            if position >= wanted {
                run_key = None;
                break;
            }
            run_key = Some(key);
        }
        run.push(id);
    }
    if run_key.is_some() {
        flush(&mut run, &mut position);
    }

    Ok(page)
}

fn load_item(txn: &ReadTransaction, id: u64) -> Result<Option<Item>> {
    let items = txn.open_table(ITEMS)?;
    let record = items.get(id)?;
    match record {
        Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
        None => Ok(None),
    }
}

fn load_log(txn: &ReadTransaction, id: u64) -> Result<Option<LogEntry>> {
    let logs = txn.open_table(LOGS)?;
    let record = logs.get(id)?;
    match record {
        Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
        None => Ok(None),
    }
}

fn tag_conflict(tag: &str, owner: u64) -> Error {
    Error::Conflict(format!("tag '{}' is already bound to item {}", tag, owner))
}

fn insert_sort_keys(txn: &WriteTransaction, item: &Item) -> Result<()> {
    txn.open_table(ITEMS_BY_NAME)?
        .insert((item.name.as_str(), item.id), ())?;
    txn.open_table(ITEMS_BY_ARTIST)?
        .insert((item.artist.as_str(), item.id), ())?;
    Ok(())
}

fn remove_sort_keys(txn: &WriteTransaction, item: &Item) -> Result<()> {
    txn.open_table(ITEMS_BY_NAME)?
        .remove((item.name.as_str(), item.id))?;
    txn.open_table(ITEMS_BY_ARTIST)?
        .remove((item.artist.as_str(), item.id))?;
    Ok(())
}

fn create_item_txn(txn: &WriteTransaction, mut item: Item) -> Result<Item> {
    let mut items = txn.open_table(ITEMS)?;
    let mut tags = txn.open_table(ITEM_TAGS)?;
    let mut sequences = txn.open_table(SEQUENCES)?;

    let last_id = sequences.get(ITEM_SEQ)?.map(|g| g.value()).unwrap_or(0);
    if item.id == 0 {
        item.id = last_id
            .checked_add(1)
            .filter(|id| *id <= MAX_ITEM_ID)
            .ok_or_else(|| Error::Conflict("item id space exhausted".to_string()))?;
    } else if items.get(item.id)?.is_some() {
        return Err(Error::Conflict(format!("item {} already exists", item.id)));
    }

    if let Some(tag) = item.tag.as_deref() {
        if let Some(owner) = tags.get(tag)?.map(|g| g.value()) {
            return Err(tag_conflict(tag, owner));
        }
        tags.insert(tag, item.id)?;
    }

    sequences.insert(ITEM_SEQ, last_id.max(item.id))?;
    let record = serde_json::to_vec(&item)?;
    items.insert(item.id, record.as_slice())?;
    drop((items, tags, sequences));

    insert_sort_keys(txn, &item)?;
    Ok(item)
}

fn update_item_txn(txn: &WriteTransaction, item: Item) -> Result<Item> {
    let mut items = txn.open_table(ITEMS)?;
    let mut tags = txn.open_table(ITEM_TAGS)?;

    let previous: Item = match items.get(item.id)? {
        Some(guard) => serde_json::from_slice(guard.value())?,
        None => return Err(Error::NotFound(format!("item {}", item.id))),
    };

    if let Some(tag) = item.tag.as_deref() {
        if let Some(owner) = tags.get(tag)?.map(|g| g.value()) {
            if owner != item.id {
                return Err(tag_conflict(tag, owner));
            }
        }
    }

    if previous.tag != item.tag {
        if let Some(old_tag) = previous.tag.as_deref() {
            tags.remove(old_tag)?;
        }
        if let Some(new_tag) = item.tag.as_deref() {
            tags.insert(new_tag, item.id)?;
        }
    }

    let record = serde_json::to_vec(&item)?;
    items.insert(item.id, record.as_slice())?;
    drop((items, tags));

    remove_sort_keys(txn, &previous)?;
    insert_sort_keys(txn, &item)?;
    Ok(item)
}

fn set_item_tag_txn(txn: &WriteTransaction, id: u64, tag: String) -> Result<Item> {
    let current: Item = {
        let items = txn.open_table(ITEMS)?;
        let guard = items.get(id)?;
        match guard {
            Some(guard) => serde_json::from_slice(guard.value())?,
            None => return Err(Error::NotFound(format!("item {}", id))),
        }
    };

    update_item_txn(
        txn,
        Item {
            tag: Some(tag),
            ..current
        },
    )
}

fn delete_item_txn(txn: &WriteTransaction, id: u64) -> Result<()> {
    let mut items = txn.open_table(ITEMS)?;
    let previous: Item = match items.remove(id)? {
        Some(guard) => serde_json::from_slice(guard.value())?,
        None => return Err(Error::NotFound(format!("item {}", id))),
    };
    drop(items);

    if let Some(tag) = previous.tag.as_deref() {
        txn.open_table(ITEM_TAGS)?.remove(tag)?;
    }
    remove_sort_keys(txn, &previous)
}

fn create_log_txn(txn: &WriteTransaction, item_id: u64) -> Result<LogEntry> {
    let mut logs = txn.open_table(LOGS)?;
    let mut by_time = txn.open_table(LOGS_BY_TIME)?;
    let mut sequences = txn.open_table(SEQUENCES)?;

    let id = sequences
        .get(LOG_SEQ)?
        .map(|g| g.value())
        .unwrap_or(0)
        .checked_add(1)
        .ok_or_else(|| Error::Conflict("log id space exhausted".to_string()))?;
    let entry = LogEntry {
        id,
        time: log_timestamp_now(),
        item_id,
    };

    sequences.insert(LOG_SEQ, id)?;
    let record = serde_json::to_vec(&entry)?;
    logs.insert(id, record.as_slice())?;
    by_time.insert((entry.time.timestamp_micros(), id), ())?;
    Ok(entry)
}

fn delete_log_txn(txn: &WriteTransaction, id: u64) -> Result<()> {
    let mut logs = txn.open_table(LOGS)?;
    let previous: LogEntry = match logs.remove(id)? {
        Some(guard) => serde_json::from_slice(guard.value())?,
        None => return Err(Error::NotFound(format!("log entry {}", id))),
    };

    txn.open_table(LOGS_BY_TIME)?
        .remove((previous.time.timestamp_micros(), id))?;
    Ok(())
}

/// Resolve an ordered page of ids from a `(key, id) -> ()` index
macro_rules! page_index_ids {
    ($index:expr, $order:expr, $offset:expr, $limit:expr, |$key:ident| $owned:expr) => {{
        let entries = $index.iter()?.map(|entry| {
            entry.map_err(Error::from).map(|(k, _)| {
                let ($key, id) = k.value();
                ($owned, id)
            })
        });
        match $order {
            SortOrder::Asc => entries
                .skip($offset)
                .take($limit)
                .map(|entry| entry.map(|(_, id)| id))
                .collect::<Result<Vec<u64>>>(),
            SortOrder::Desc => page_desc_ascending_ties(entries.rev(), $offset, $limit),
        }
    }};
}

#[async_trait]
impl Store for KvStore {
    async fn create_item(&self, item: Item) -> Result<Item> {
        let item = item.validated_new()?;
        let item = self
            .blocking(move |db| write(db, |txn| create_item_txn(txn, item)))
            .await?;
        debug!(id = item.id, "Created item");
        Ok(item)
    }

    async fn update_item(&self, item: Item) -> Result<Item> {
        let item = item.validated()?;
        self.blocking(move |db| write(db, |txn| update_item_txn(txn, item)))
            .await
    }

    async fn set_item_tag(&self, id: u64, tag: &str) -> Result<Item> {
        if tag.trim().is_empty() {
            return Err(Error::Validation("tag must not be empty".to_string()));
        }
        let tag = tag.to_string();
        self.blocking(move |db| write(db, |txn| set_item_tag_txn(txn, id, tag)))
            .await
    }

    async fn get_item(&self, id: u64) -> Result<Item> {
        self.blocking(move |db| read(db, |txn| load_item(txn, id)))
            .await?
            .ok_or_else(|| Error::NotFound(format!("item {}", id)))
    }

    async fn get_item_by_tag(&self, tag: &str) -> Result<Item> {
        let tag = tag.to_string();
        self.blocking(move |db| {
            read(db, |txn| {
                let tags = txn.open_table(ITEM_TAGS)?;
                let owner = tags.get(tag.as_str())?.map(|g| g.value());
                match owner {
                    Some(id) => load_item(txn, id)?.ok_or_else(|| {
                        Error::Internal(format!("tag '{}' points at missing item {}", tag, id))
                    }),
                    None => Err(Error::NotFound(format!("item with tag '{}'", tag))),
                }
            })
        })
        .await
    }

    async fn delete_item(&self, id: u64) -> Result<()> {
        self.blocking(move |db| write(db, |txn| delete_item_txn(txn, id)))
            .await
    }

    async fn list_items(
        &self,
        sort: ItemSort,
        order: SortOrder,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Item>> {
        let (offset, limit) = (to_usize(offset), to_usize(limit));
        self.blocking(move |db| {
            read(db, |txn| {
                let index = match sort {
                    ItemSort::Name => txn.open_table(ITEMS_BY_NAME)?,
                    ItemSort::Artist => txn.open_table(ITEMS_BY_ARTIST)?,
                };
                let ids = page_index_ids!(index, order, offset, limit, |key| key.to_string())?;

                ids.into_iter()
                    .map(|id| {
                        load_item(txn, id)?.ok_or_else(|| {
                            Error::Internal(format!("sort index points at missing item {}", id))
                        })
                    })
                    .collect()
            })
        })
        .await
    }

    async fn count_items(&self) -> Result<u64> {
        self.blocking(|db| read(db, |txn| Ok(txn.open_table(ITEMS)?.len()?)))
            .await
    }

    async fn create_log(&self, item_id: u64) -> Result<LogEntry> {
        self.blocking(move |db| write(db, |txn| create_log_txn(txn, item_id)))
            .await
    }

    async fn get_log(&self, id: u64) -> Result<LogEntry> {
        self.blocking(move |db| read(db, |txn| load_log(txn, id)))
            .await?
            .ok_or_else(|| Error::NotFound(format!("log entry {}", id)))
    }

    async fn list_logs(&self, order: SortOrder, offset: u64, limit: u64) -> Result<Vec<LogEntry>> {
        let (offset, limit) = (to_usize(offset), to_usize(limit));
        self.blocking(move |db| {
            read(db, |txn| {
                let index = txn.open_table(LOGS_BY_TIME)?;
                let ids = page_index_ids!(index, order, offset, limit, |micros| micros)?;

                ids.into_iter()
                    .map(|id| {
                        load_log(txn, id)?.ok_or_else(|| {
                            Error::Internal(format!("time index points at missing log {}", id))
                        })
                    })
                    .collect()
            })
        })
        .await
    }

    async fn count_logs(&self) -> Result<u64> {
        self.blocking(|db| read(db, |txn| Ok(txn.open_table(LOGS)?.len()?)))
            .await
    }

    async fn delete_log(&self, id: u64) -> Result<()> {
        self.blocking(move |db| write(db, |txn| delete_log_txn(txn, id)))
            .await
    }
}
