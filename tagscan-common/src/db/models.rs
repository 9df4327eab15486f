//! Database models

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Largest item id either backend can hold (SQLite rowids are signed 64-bit)
pub const MAX_ITEM_ID: u64 = i64::MAX as u64;

/// Catalogued object a scanned tag can be bound to
///
/// `id == 0` means "not yet stored"; the store assigns a positive id on create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: u64,
    pub name: String,
    pub artist: String,
    /// Unique across all items when present
    pub tag: Option<String>,
}

impl Item {
    pub fn new(name: impl Into<String>, artist: impl Into<String>, tag: Option<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            artist: artist.into(),
            tag,
        }
    }

    /// Check required fields and normalize the tag
    ///
    /// A tag that is empty after trimming is stored as no tag.
    pub fn validated(mut self) -> Result<Self> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("name is required".to_string()));
        }
        if self.artist.trim().is_empty() {
            return Err(Error::Validation("artist is required".to_string()));
        }
        self.tag = self.tag.take().filter(|t| !t.trim().is_empty());
        Ok(self)
    }

    /// [`validated`](Self::validated) plus a range check on an explicit id
    pub fn validated_new(self) -> Result<Self> {
        if self.id > MAX_ITEM_ID {
            return Err(Error::Validation(format!(
                "item id {} exceeds the maximum {}",
                self.id, MAX_ITEM_ID
            )));
        }
        self.validated()
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.name)?;
        if !self.artist.is_empty() {
            write!(f, " by {}", self.artist)?;
        }
        Ok(())
    }
}

/// One recorded play of an item
///
/// `item_id` is not checked against the items table and may dangle after the item is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub time: DateTime<Utc>,
    pub item_id: u64,
}

/// Column used to order item listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemSort {
    #[default]
    Name,
    Artist,
}

impl ItemSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemSort::Name => "name",
            ItemSort::Artist => "artist",
        }
    }
}

impl FromStr for ItemSort {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "name" => Ok(ItemSort::Name),
            "artist" => Ok(ItemSort::Artist),
            other => Err(Error::Validation(format!("unknown sort key: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(Error::Validation(format!("unknown sort order: {}", other))),
        }
    }
}

/// Current time truncated to the microsecond precision both backends persist
pub fn log_timestamp_now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now)
}
