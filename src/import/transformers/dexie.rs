//! Transformer for the dexie-era export format.
//!
//! A `ARC#requestsDataExport` file holds a single `requests` array with a
//! per-record `type` discriminating saved from history entries, and
//! projects referencing requests by their numeric dexie id. Saved and
//! history records split into their canonical buckets; history entries are
//! deduplicated to one record per request URL, method and UTC day.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use super::{
    add_project_reference, add_request_reference, cooperative_yield, day_start, into_record,
    set_kind, take_array, timestamp_now,
};
use crate::models::{ExportEnvelope, Record, kinds};
use crate::{Error, Result, UNKNOWN_VERSION};

pub(super) async fn transform(data: Value) -> Result<ExportEnvelope> {
    let mut object = into_record(data)
        .ok_or_else(|| Error::InvalidInput("export content is not an object".to_string()))?;

    let created_at = object
        .get("createdAt")
        .and_then(Value::as_str)
        .map_or_else(timestamp_now, ToOwned::to_owned);
    let version = object
        .get("version")
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN_VERSION)
        .to_string();

    let mut saved = Vec::new();
    let mut history = Vec::new();
    // Dexie numeric request id to position in `saved`.
    let mut request_positions: HashMap<i64, usize> = HashMap::new();
    // One history record per (url, method, day).
    let mut seen_history: HashSet<(String, String, i64)> = HashSet::new();

    for (i, item) in take_array(&mut object, "requests").into_iter().enumerate() {
        cooperative_yield(i).await;
        let Some(mut record) = into_record(item) else {
            continue;
        };
        let is_history = record.get("type").and_then(Value::as_str) == Some("history");
        let old_id = record.remove("id").as_ref().and_then(Value::as_i64);
        record.insert(
            "key".to_string(),
            Value::String(uuid::Uuid::new_v4().to_string()),
        );

        if is_history {
            record.remove("type");
            set_kind(&mut record, kinds::HISTORY_DATA);
            if let Some(bucket) = history_bucket(&record)? {
                if !seen_history.insert(bucket) {
                    continue;
                }
            }
            history.push(record);
        } else {
            record.insert("type".to_string(), Value::String("saved".to_string()));
            set_kind(&mut record, kinds::REQUEST_DATA);
            if let Some(id) = old_id {
                request_positions.insert(id, saved.len());
            }
            saved.push(record);
        }
    }

    let mut projects = Vec::new();
    for (i, item) in take_array(&mut object, "projects").into_iter().enumerate() {
        cooperative_yield(i).await;
        let Some(mut record) = into_record(item) else {
            continue;
        };
        record.remove("id");
        let key = uuid::Uuid::new_v4().to_string();
        record.insert("key".to_string(), Value::String(key.clone()));
        set_kind(&mut record, kinds::PROJECT_DATA);

        let request_ids = match record.remove("requestIds") {
            Some(Value::Array(ids)) => ids,
            _ => Vec::new(),
        };
        for id in request_ids.iter().filter_map(Value::as_i64) {
            match request_positions.get(&id).copied() {
                Some(position) => {
                    let request = &mut saved[position];
                    let request_key = request
                        .get("key")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    add_project_reference(request, &key);
                    add_request_reference(&mut record, &request_key);
                }
                None => {
                    tracing::warn!(request_id = id, "project references a missing request");
                }
            }
        }
        projects.push(record);
    }

    Ok(ExportEnvelope {
        created_at,
        version,
        kind: kinds::IMPORT.to_string(),
        requests: (!saved.is_empty()).then_some(saved),
        projects: (!projects.is_empty()).then_some(projects),
        history: (!history.is_empty()).then_some(history),
        ..Default::default()
    })
}

/// The grouping key of a history entry, or `None` when the record is too
/// incomplete to group.
fn history_bucket(record: &Record) -> Result<Option<(String, String, i64)>> {
    let (Some(url), Some(method), Some(time)) = (
        record.get("url").and_then(Value::as_str),
        record.get("method").and_then(Value::as_str),
        record.get("time").and_then(Value::as_i64),
    ) else {
        return Ok(None);
    };
    Ok(Some((url.to_string(), method.to_string(), day_start(time)?)))
}
