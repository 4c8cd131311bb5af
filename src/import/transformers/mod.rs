//! Import transformers: one per recognized file format.
//!
//! Every transformer produces the same canonical envelope with `kind` set
//! to [`kinds::IMPORT`]. The set of formats is closed; recognition happens
//! in [`ImportTransformer::for_object`] and unrecognized content is the
//! caller's [`crate::Error::ContentNotRecognized`].

mod dexie;
mod legacy;
mod postman;
mod pouch;

use chrono::{SecondsFormat, TimeZone, Utc};
use serde_json::Value;

use crate::Result;
use crate::models::{ExportEnvelope, Record, kinds};

/// The dexie-era export envelope kind.
const DEXIE_EXPORT_KIND: &str = "ARC#requestsDataExport";

/// Envelope kinds produced by the document-store era of the application.
/// All normalize through the same transformer.
const POUCH_EXPORT_KINDS: &[&str] = &[
    kinds::IMPORT,
    kinds::ALL_DATA_EXPORT,
    "ARC#SavedHistoryDataExport",
    "ARC#SavedDataExport",
    "ARC#SavedExport",
    "ARC#HistoryDataExport",
    "ARC#HistoryExport",
    "ARC#Project",
    "ARC#ProjectExport",
    "ARC#SessionCookies",
    "ARC#HostRules",
];

/// A recognized import format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportTransformer {
    /// The oldest export format with numeric record ids.
    Legacy,
    /// The dexie-era export format (`ARC#requestsDataExport`).
    Dexie,
    /// The document-store export format (the `ARC#` envelope family).
    Pouch,
    /// Postman backup dumps and v1 collections.
    Postman,
}

impl ImportTransformer {
    /// Matches the parsed content against the known formats.
    ///
    /// Returns `None` when no format claims the object.
    #[must_use]
    pub fn for_object(data: &Value) -> Option<Self> {
        let object = data.as_object()?;
        if postman::is_postman(object) {
            return Some(Self::Postman);
        }
        if let Some(kind) = object.get("kind").and_then(Value::as_str) {
            if kind == DEXIE_EXPORT_KIND {
                return Some(Self::Dexie);
            }
            if POUCH_EXPORT_KINDS.contains(&kind) {
                return Some(Self::Pouch);
            }
            return None;
        }
        // No kind discriminant: the oldest format carried none.
        if object.get("requests").is_some_and(Value::is_array)
            || object.get("projects").is_some_and(Value::is_array)
        {
            return Some(Self::Legacy);
        }
        None
    }

    /// Normalizes the content into the canonical envelope.
    ///
    /// # Errors
    ///
    /// Returns an error when the content does not match the format's
    /// structure after all.
    pub async fn transform(self, data: Value) -> Result<ExportEnvelope> {
        match self {
            Self::Legacy => legacy::transform(data).await,
            Self::Dexie => dexie::transform(data).await,
            Self::Pouch => pouch::transform(data).await,
            Self::Postman => postman::transform(data).await,
        }
    }
}

/// Import timestamp for envelopes that carry none.
fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Zeroes a millisecond timestamp to the start of its UTC day.
fn day_start(millis: i64) -> Result<i64> {
    let time = Utc.timestamp_millis_opt(millis).single().ok_or_else(|| {
        crate::Error::InvalidInput(format!("timestamp {millis} is outside the representable range"))
    })?;
    let day = time.date_naive().and_time(chrono::NaiveTime::MIN);
    Ok(day.and_utc().timestamp_millis())
}

/// Moves the store id into `key`, preferring an existing `key`, and drops
/// the revision marker.
fn normalize_identity(record: &mut Record) {
    let id = record.remove("_id");
    if !record.contains_key("key") {
        if let Some(id) = id {
            record.insert("key".to_string(), id);
        }
    }
    record.remove("_rev");
}

fn set_kind(record: &mut Record, kind: &str) {
    record.insert("kind".to_string(), Value::String(kind.to_string()));
}

fn record_key(record: &Record) -> Option<&str> {
    record.get("key").and_then(Value::as_str)
}

/// Adds a request reference to a project's `requests` array. A no-op on an
/// empty key or when the reference is already present.
fn add_request_reference(project: &mut Record, request_key: &str) {
    add_reference(project, "requests", request_key);
}

/// Adds a project reference to a request's `projects` array. A no-op on an
/// empty key or when the reference is already present.
fn add_project_reference(request: &mut Record, project_key: &str) {
    add_reference(request, "projects", project_key);
}

fn add_reference(record: &mut Record, field: &str, key: &str) {
    if key.is_empty() {
        return;
    }
    let value = Value::String(key.to_string());
    match record.get_mut(field).and_then(Value::as_array_mut) {
        Some(refs) => {
            if !refs.contains(&value) {
                refs.push(value);
            }
        }
        None => {
            record.insert(field.to_string(), Value::Array(vec![value]));
        }
    }
}

/// Yields to the runtime periodically inside record loops so a large file
/// does not starve other tasks.
async fn cooperative_yield(index: usize) {
    const CHUNK: usize = 250;
    if index > 0 && index % CHUNK == 0 {
        tokio::task::yield_now().await;
    }
}

fn take_array(object: &mut Record, field: &str) -> Vec<Value> {
    match object.remove(field) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

fn into_record(value: Value) -> Option<Record> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
