//! In-memory [`CollectionStore`] backend.
//!
//! Used by tests and by embedders that hold their data in memory. Documents
//! are keyed by their `_id` field; inserts without one get a minted id.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use crate::models::Record;
use crate::store::{CollectionStore, CookieStore};
use crate::{Error, Result};

type Collections = BTreeMap<String, BTreeMap<String, Record>>;

/// An in-memory document store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of documents in a collection.
    #[must_use]
    pub fn len(&self, collection: &str) -> usize {
        let guard = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        guard.get(collection).map_or(0, BTreeMap::len)
    }

    /// Returns true when a collection holds no documents.
    #[must_use]
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

#[async_trait]
impl CollectionStore for MemoryStore {
    async fn fetch_page(
        &self,
        collection: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Record>> {
        let guard = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(docs) = guard.get(collection) else {
            return Ok(Vec::new());
        };
        let page = match cursor {
            Some(last) => docs
                .range::<str, _>((
                    std::ops::Bound::Excluded(last),
                    std::ops::Bound::Unbounded,
                ))
                .take(limit)
                .map(|(_, doc)| doc.clone())
                .collect(),
            None => docs.values().take(limit).cloned().collect(),
        };
        Ok(page)
    }

    async fn read_one(&self, collection: &str, id: &str) -> Result<Option<Record>> {
        let guard = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(guard
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn insert(&self, collection: &str, records: Vec<Record>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut guard = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let docs = guard.entry(collection.to_string()).or_default();
        for mut record in records {
            let id = match record.get("_id").and_then(Value::as_str) {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => {
                    let minted = uuid::Uuid::new_v4().to_string();
                    record.insert("_id".to_string(), Value::String(minted.clone()));
                    minted
                }
            };
            docs.insert(id, record);
        }
        drop(guard);
        Ok(())
    }
}

/// An in-memory cookie provider holding a fixed cookie list.
///
/// Useful for tests and hosts that snapshot their native cookie jar.
#[derive(Debug, Default)]
pub struct MemoryCookieStore {
    cookies: Vec<Record>,
}

impl MemoryCookieStore {
    /// Creates a provider answering with the given cookies.
    #[must_use]
    pub const fn new(cookies: Vec<Record>) -> Self {
        Self { cookies }
    }
}

#[async_trait]
impl CookieStore for MemoryCookieStore {
    async fn list_all(&self) -> Option<Vec<Record>> {
        Some(self.cookies.clone())
    }
}

impl MemoryStore {
    /// Seeds a collection from JSON values, ignoring non-object entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn seed(&self, collection: &str, values: Vec<Value>) -> Result<()> {
        let records: Vec<Record> = values
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();
        if records.is_empty() {
            return Err(Error::InvalidInput(format!(
                "no object records to seed into {collection}"
            )));
        }
        self.insert(collection, records).await
    }
}
