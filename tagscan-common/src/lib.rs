//! # tagscan Common Library
//!
//! Shared code for the tagscan server and tools:
//! - Item / log entry models
//! - The `Store` contract with SQLite and redb backends
//! - Configuration loading
//! - Error taxonomy

pub mod config;
pub mod db;
pub mod error;

pub use db::{
    open_store, Item, ItemSort, LogEntry, SortOrder, Store, StoreBackend, MAX_ITEM_ID,
};
pub use error::{Error, ErrorKind, Result};
