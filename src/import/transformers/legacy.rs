//! Transformer for the oldest export format.
//!
//! Legacy files carry `requests` and `projects` arrays with numeric record
//! ids and a numeric `project` field on each request. Records get freshly
//! minted string keys; the numeric ids only survive long enough to rebuild
//! the request/project references.

use std::collections::HashMap;

use serde_json::Value;

use super::{
    add_project_reference, add_request_reference, cooperative_yield, into_record, set_kind,
    take_array, timestamp_now,
};
use crate::models::{ExportEnvelope, Record, kinds};
use crate::{Error, Result, UNKNOWN_VERSION};

pub(super) async fn transform(data: Value) -> Result<ExportEnvelope> {
    let mut object = into_record(data)
        .ok_or_else(|| Error::InvalidInput("export content is not an object".to_string()))?;

    let mut projects = Vec::new();
    // Old numeric project id to minted key.
    let mut project_keys: HashMap<i64, usize> = HashMap::new();
    for (i, item) in take_array(&mut object, "projects").into_iter().enumerate() {
        cooperative_yield(i).await;
        let Some(mut record) = into_record(item) else {
            continue;
        };
        let key = uuid::Uuid::new_v4().to_string();
        if let Some(id) = record.remove("id").as_ref().and_then(Value::as_i64) {
            project_keys.insert(id, projects.len());
        }
        record.insert("key".to_string(), Value::String(key));
        ensure_name(&mut record);
        set_kind(&mut record, kinds::PROJECT_DATA);
        projects.push(record);
    }

    let mut requests = Vec::new();
    for (i, item) in take_array(&mut object, "requests").into_iter().enumerate() {
        cooperative_yield(i).await;
        let Some(mut record) = into_record(item) else {
            continue;
        };
        let key = uuid::Uuid::new_v4().to_string();
        record.remove("id");
        record.insert("key".to_string(), Value::String(key.clone()));
        ensure_name(&mut record);
        record
            .entry("type".to_string())
            .or_insert_with(|| Value::String("saved".to_string()));
        set_kind(&mut record, kinds::REQUEST_DATA);

        if let Some(project_id) = record.remove("project").as_ref().and_then(Value::as_i64) {
            match project_keys.get(&project_id).copied() {
                Some(i) => {
                    let project = &mut projects[i];
                    let project_key = project
                        .get("key")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    add_project_reference(&mut record, &project_key);
                    add_request_reference(project, &key);
                }
                None => {
                    tracing::warn!(project_id, "request references a missing project");
                }
            }
        }
        requests.push(record);
    }

    Ok(ExportEnvelope {
        created_at: timestamp_now(),
        version: UNKNOWN_VERSION.to_string(),
        kind: kinds::IMPORT.to_string(),
        requests: (!requests.is_empty()).then_some(requests),
        projects: (!projects.is_empty()).then_some(projects),
        ..Default::default()
    })
}

fn ensure_name(record: &mut Record) {
    let missing = record
        .get("name")
        .and_then(Value::as_str)
        .is_none_or(str::is_empty);
    if missing {
        record.insert("name".to_string(), Value::String("unnamed".to_string()));
    }
}
