//! Transformer for the document-store export family.
//!
//! Files of this era are already close to the canonical envelope. The
//! transform moves store ids into `key`, migrates the historical
//! `legacyProject` field, repairs request/project cross-references in both
//! directions and stamps record kinds, leaving everything else untouched.

use std::collections::HashMap;

use serde_json::Value;

use super::{
    add_project_reference, add_request_reference, cooperative_yield, into_record,
    normalize_identity, record_key, set_kind, take_array, timestamp_now,
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
    let load_to_workspace = object.get("loadToWorkspace").and_then(Value::as_bool);

    let mut requests = normalize_requests(take_array(&mut object, "requests")).await;
    let mut projects =
        normalize_simple(take_array(&mut object, "projects"), kinds::PROJECT_DATA).await;
    repair_references(&mut requests, &mut projects);

    let history = normalize_simple(take_array(&mut object, "history"), kinds::HISTORY_DATA).await;
    let websocket_url_history = normalize_simple(
        take_array(&mut object, "websocket-url-history"),
        kinds::WEBSOCKET_HISTORY_DATA,
    )
    .await;
    let url_history =
        normalize_simple(take_array(&mut object, "url-history"), kinds::URL_HISTORY_DATA).await;
    let variables = normalize_simple(take_array(&mut object, "variables"), kinds::VARIABLE).await;
    let auth_data = normalize_simple(take_array(&mut object, "auth-data"), kinds::AUTH_DATA).await;
    let cookies = normalize_simple(take_array(&mut object, "cookies"), kinds::COOKIE).await;
    let host_rules =
        normalize_simple(take_array(&mut object, "host-rules"), kinds::HOST_RULE).await;
    let client_certificates =
        normalize_certificates(take_array(&mut object, "client-certificates")).await;

    Ok(ExportEnvelope {
        created_at,
        version,
        kind: kinds::IMPORT.to_string(),
        load_to_workspace,
        requests: non_empty(requests),
        projects: non_empty(projects),
        history: non_empty(history),
        websocket_url_history: non_empty(websocket_url_history),
        url_history: non_empty(url_history),
        variables: non_empty(variables),
        auth_data: non_empty(auth_data),
        cookies: non_empty(cookies),
        host_rules: non_empty(host_rules),
        client_certificates: non_empty(client_certificates),
    })
}

fn non_empty(records: Vec<Record>) -> Option<Vec<Record>> {
    (!records.is_empty()).then_some(records)
}

async fn normalize_requests(items: Vec<Value>) -> Vec<Record> {
    let mut result = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        cooperative_yield(i).await;
        let Some(mut record) = into_record(item) else {
            continue;
        };
        normalize_identity(&mut record);
        migrate_legacy_project(&mut record);
        set_kind(&mut record, kinds::REQUEST_DATA);
        result.push(record);
    }
    result
}

async fn normalize_simple(items: Vec<Value>, kind: &str) -> Vec<Record> {
    let mut result = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        cooperative_yield(i).await;
        let Some(mut record) = into_record(item) else {
            continue;
        };
        normalize_identity(&mut record);
        set_kind(&mut record, kind);
        result.push(record);
    }
    result
}

/// Moves a single-project `legacyProject` reference into the `projects`
/// array without duplicating an existing entry.
fn migrate_legacy_project(request: &mut Record) {
    let Some(legacy) = request.remove("legacyProject") else {
        return;
    };
    match request.get_mut("projects").and_then(Value::as_array_mut) {
        Some(projects) => {
            if !projects.contains(&legacy) {
                projects.push(legacy);
            }
        }
        None => {
            request.insert("projects".to_string(), Value::Array(vec![legacy]));
        }
    }
}

/// Makes request/project references bidirectional: every project listed on
/// a request knows the request, and every request listed on a project
/// knows the project. References to keys not present in the file are left
/// as they are.
fn repair_references(requests: &mut [Record], projects: &mut [Record]) {
    let project_index: HashMap<String, usize> = index_by_key(projects);
    let request_index: HashMap<String, usize> = index_by_key(requests);

    for request in requests.iter_mut() {
        let Some(request_key) = record_key(request).map(ToOwned::to_owned) else {
            continue;
        };
        for project_key in reference_keys(request, "projects") {
            if let Some(&i) = project_index.get(&project_key) {
                add_request_reference(&mut projects[i], &request_key);
            }
        }
    }
    for project in projects.iter_mut() {
        let Some(project_key) = record_key(project).map(ToOwned::to_owned) else {
            continue;
        };
        for request_key in reference_keys(project, "requests") {
            if let Some(&i) = request_index.get(&request_key) {
                add_project_reference(&mut requests[i], &project_key);
            }
        }
    }
}

fn index_by_key(records: &[Record]) -> HashMap<String, usize> {
    records
        .iter()
        .enumerate()
        .filter_map(|(i, r)| record_key(r).map(|k| (k.to_string(), i)))
        .collect()
}

fn reference_keys(record: &Record, field: &str) -> Vec<String> {
    record
        .get(field)
        .and_then(Value::as_array)
        .map(|refs| {
            refs.iter()
                .filter_map(Value::as_str)
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// Certificates appear either as canonical merged records or, in older
/// files, as two-element `[index, payload]` arrays. Both normalize to the
/// merged form.
async fn normalize_certificates(items: Vec<Value>) -> Vec<Record> {
    let mut result = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        cooperative_yield(i).await;
        match item {
            Value::Object(mut record) => {
                normalize_identity(&mut record);
                set_kind(&mut record, kinds::CLIENT_CERTIFICATE);
                result.push(record);
            }
            Value::Array(parts) if parts.len() == 2 => {
                let mut parts = parts.into_iter();
                let (Some(index), Some(data)) = (
                    parts.next().and_then(into_record),
                    parts.next().and_then(into_record),
                ) else {
                    continue;
                };
                result.push(merge_certificate(index, &data));
            }
            _ => {
                tracing::warn!("skipping malformed client certificate entry");
            }
        }
    }
    result
}

fn merge_certificate(index: Record, data: &Record) -> Record {
    let mut record = index;
    normalize_identity(&mut record);
    set_kind(&mut record, kinds::CLIENT_CERTIFICATE);
    if let Some(cert) = data.get("cert") {
        record.insert("cert".to_string(), cert.clone());
    }
    if let Some(p_key) = data.get("key") {
        record.insert("pKey".to_string(), p_key.clone());
    }
    record
}
