//! Datastore boundary: collection access traits and paginated reads.
//!
//! The pipeline never talks to a concrete database. Export reads and import
//! writes go through [`CollectionStore`]; hosts with a native cookie store
//! additionally provide a [`CookieStore`].

mod memory;

pub use memory::{MemoryCookieStore, MemoryStore};

use async_trait::async_trait;

use crate::Result;
use crate::models::Record;

/// Datastore collection names.
pub mod collections {
    /// Saved requests.
    pub const SAVED_REQUESTS: &str = "saved-requests";
    /// History requests.
    pub const HISTORY_REQUESTS: &str = "history-requests";
    /// Projects (the collection kept its historical name).
    pub const LEGACY_PROJECTS: &str = "legacy-projects";
    /// Websocket URL history.
    pub const WEBSOCKET_URL_HISTORY: &str = "websocket-url-history";
    /// URL history.
    pub const URL_HISTORY: &str = "url-history";
    /// Environment variables.
    pub const VARIABLES: &str = "variables";
    /// Cookies.
    pub const COOKIES: &str = "cookies";
    /// Cached authorization data.
    pub const AUTH_DATA: &str = "auth-data";
    /// Host rules.
    pub const HOST_RULES: &str = "host-rules";
    /// Client certificate index records.
    pub const CLIENT_CERTIFICATES: &str = "client-certificates";
    /// Client certificate payload records.
    pub const CLIENT_CERTIFICATES_DATA: &str = "client-certificates-data";
}

/// Access to the document store's collections.
///
/// Documents carry their identity in an `_id` field and, depending on the
/// backing store, a revision marker in `_rev`. Both are treated as storage
/// internals by the pipeline and never leave it.
#[async_trait]
pub trait CollectionStore: Send + Sync {
    /// Fetches one page of documents, ordered by id, starting after
    /// `cursor` (exclusive) when given.
    async fn fetch_page(
        &self,
        collection: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Record>>;

    /// Reads a single document by id. `None` when not found.
    async fn read_one(&self, collection: &str, id: &str) -> Result<Option<Record>>;

    /// Inserts documents into a collection, replacing existing ids.
    async fn insert(&self, collection: &str, records: Vec<Record>) -> Result<()>;
}

/// Host-native cookie store, used instead of the `cookies` collection when
/// [`crate::ExportConfig::native_cookies`] is set.
#[async_trait]
pub trait CookieStore: Send + Sync {
    /// Lists every cookie. `None` means the provider did not answer, which
    /// callers treat as "no cookies", not an error.
    async fn list_all(&self) -> Option<Vec<Record>>;
}

/// Reads an entire collection with a last-seen-id cursor.
///
/// Pages until a page shorter than `page_size` is returned. A failed page
/// fetch ends the read with whatever was gathered so far; optional
/// collections missing from a store must not abort an export.
pub async fn read_all<S>(store: &S, collection: &str, page_size: usize) -> Vec<Record>
where
    S: CollectionStore + ?Sized,
{
    let mut result = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = match store.fetch_page(collection, cursor.as_deref(), page_size).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(collection, error = %e, "page fetch failed, ending read");
                break;
            }
        };
        let len = page.len();
        tracing::debug!(collection, page_len = len, "fetched collection page");
        let last_id = page
            .last()
            .and_then(|r| r.get("_id"))
            .and_then(serde_json::Value::as_str)
            .map(ToOwned::to_owned);
        result.extend(page);
        if len < page_size {
            break;
        }
        match last_id {
            Some(id) => cursor = Some(id),
            // Cannot continue the cursor without an id on the last document.
            None => break,
        }
    }
    result
}
