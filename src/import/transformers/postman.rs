//! Transformer for Postman files.
//!
//! Two shapes are supported: a full backup dump (`version` plus
//! `collections`, optionally `environments` and `globals`) and a single v1
//! collection. Environment value files (`_postman_variable_scope`) map to
//! variables. Postman v2 collections carry an `info.schema` marker and are
//! not supported. Variable placeholders (`{{host}}`) are carried through
//! untouched; resolving them is the consumer's job.

use serde_json::Value;

use super::{cooperative_yield, into_record, set_kind, take_array, timestamp_now};
use crate::models::{ExportEnvelope, Record, kinds};
use crate::{Error, Result, UNKNOWN_VERSION};

/// Recognizes Postman content.
pub(super) fn is_postman(object: &Record) -> bool {
    if object.contains_key("_postman_variable_scope") {
        return true;
    }
    if object.contains_key("info")
        && object
            .get("info")
            .and_then(Value::as_object)
            .is_some_and(|info| info.contains_key("schema"))
    {
        return true;
    }
    if object.contains_key("version") && object.contains_key("collections") {
        return true;
    }
    // A standalone v1 collection: requests plus ordering metadata the
    // legacy export format never carried.
    object.get("requests").is_some_and(Value::is_array)
        && (object.contains_key("order") || object.contains_key("folders"))
        && object.contains_key("name")
}

pub(super) async fn transform(data: Value) -> Result<ExportEnvelope> {
    let mut object = into_record(data)
        .ok_or_else(|| Error::InvalidInput("Postman content is not an object".to_string()))?;

    if object.contains_key("info") {
        // v2 collection format.
        return Err(Error::ContentNotRecognized);
    }

    let mut requests = Vec::new();
    let mut projects = Vec::new();
    let mut variables = Vec::new();

    if object.contains_key("_postman_variable_scope") {
        transform_environment(&mut object, &mut variables);
    } else if object.contains_key("collections") {
        for (i, collection) in take_array(&mut object, "collections").into_iter().enumerate() {
            cooperative_yield(i).await;
            if let Some(collection) = into_record(collection) {
                transform_collection(collection, &mut requests, &mut projects);
            }
        }
        for environment in take_array(&mut object, "environments") {
            if let Some(mut environment) = into_record(environment) {
                transform_environment(&mut environment, &mut variables);
            }
        }
        if let Some(Value::Array(globals)) = object.remove("globals") {
            collect_values("globals", globals, &mut variables);
        }
    } else {
        transform_collection(object, &mut requests, &mut projects);
    }

    Ok(ExportEnvelope {
        created_at: timestamp_now(),
        version: UNKNOWN_VERSION.to_string(),
        kind: kinds::IMPORT.to_string(),
        requests: (!requests.is_empty()).then_some(requests),
        projects: (!projects.is_empty()).then_some(projects),
        variables: (!variables.is_empty()).then_some(variables),
        ..Default::default()
    })
}

/// Converts one v1 collection into a project and its requests.
fn transform_collection(
    mut collection: Record,
    requests: &mut Vec<Record>,
    projects: &mut Vec<Record>,
) {
    let project_key = uuid::Uuid::new_v4().to_string();
    let mut project = Record::new();
    project.insert("key".to_string(), Value::String(project_key.clone()));
    project.insert(
        "name".to_string(),
        collection
            .remove("name")
            .unwrap_or_else(|| Value::String("unnamed".to_string())),
    );
    if let Some(description) = collection.remove("description") {
        project.insert("description".to_string(), description);
    }
    set_kind(&mut project, kinds::PROJECT_DATA);

    let mut request_keys = Vec::new();
    for item in take_array(&mut collection, "requests") {
        let Some(source) = into_record(item) else {
            continue;
        };
        let request = transform_request(source, &project_key);
        if let Some(key) = request.get("key").and_then(Value::as_str) {
            request_keys.push(Value::String(key.to_string()));
        }
        requests.push(request);
    }
    project.insert("requests".to_string(), Value::Array(request_keys));
    projects.push(project);
}

fn transform_request(mut source: Record, project_key: &str) -> Record {
    let mut request = Record::new();
    request.insert(
        "key".to_string(),
        Value::String(uuid::Uuid::new_v4().to_string()),
    );
    request.insert(
        "name".to_string(),
        source
            .remove("name")
            .unwrap_or_else(|| Value::String("unnamed".to_string())),
    );
    if let Some(url) = source.remove("url") {
        request.insert("url".to_string(), url);
    }
    if let Some(method) = source.remove("method") {
        request.insert("method".to_string(), method);
    }
    if let Some(headers) = source.remove("headers") {
        request.insert("headers".to_string(), headers);
    }
    if let Some(payload) = request_payload(&mut source) {
        request.insert("payload".to_string(), payload);
    }
    if let Some(time) = source.get("time").and_then(Value::as_i64) {
        request.insert("created".to_string(), Value::Number(time.into()));
        request.insert("updated".to_string(), Value::Number(time.into()));
    }
    if let Some(description) = source.remove("description") {
        request.insert("description".to_string(), description);
    }
    request.insert("type".to_string(), Value::String("saved".to_string()));
    request.insert(
        "projects".to_string(),
        Value::Array(vec![Value::String(project_key.to_string())]),
    );
    set_kind(&mut request, kinds::REQUEST_DATA);
    request
}

/// Postman v1 keeps the raw body in `rawModeData` and form data in `data`.
fn request_payload(source: &mut Record) -> Option<Value> {
    match source.remove("rawModeData") {
        Some(Value::String(raw)) if !raw.is_empty() => Some(Value::String(raw)),
        _ => match source.remove("data") {
            Some(Value::String(data)) if !data.is_empty() => Some(Value::String(data)),
            _ => None,
        },
    }
}

/// Converts an environment value file into variable records.
fn transform_environment(environment: &mut Record, variables: &mut Vec<Record>) {
    let name = environment
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("default")
        .to_string();
    let values = take_array(environment, "values");
    collect_values(&name, values, variables);
}

fn collect_values(environment: &str, values: Vec<Value>, variables: &mut Vec<Record>) {
    for value in values {
        let Some(mut source) = into_record(value) else {
            continue;
        };
        let Some(variable) = source.remove("key") else {
            continue;
        };
        let mut record = Record::new();
        record.insert(
            "key".to_string(),
            Value::String(uuid::Uuid::new_v4().to_string()),
        );
        record.insert(
            "environment".to_string(),
            Value::String(environment.to_string()),
        );
        record.insert("variable".to_string(), variable);
        record.insert(
            "value".to_string(),
            source.remove("value").unwrap_or(Value::String(String::new())),
        );
        record.insert(
            "enabled".to_string(),
            source.remove("enabled").unwrap_or(Value::Bool(true)),
        );
        set_kind(&mut record, kinds::VARIABLE);
        variables.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => Record::new(),
        }
    }

    #[test]
    fn test_detection() {
        assert!(is_postman(&record(json!({"version": 1, "collections": []}))));
        assert!(is_postman(&record(
            json!({"_postman_variable_scope": "environment", "values": []})
        )));
        assert!(is_postman(&record(
            json!({"info": {"schema": "https://schema.getpostman.com/json/collection/v2.0.0/"}})
        )));
        assert!(is_postman(&record(
            json!({"id": "x", "name": "c", "order": [], "requests": []})
        )));
        // The legacy export format has requests but no ordering metadata.
        assert!(!is_postman(&record(json!({"requests": [], "projects": []}))));
    }

    #[tokio::test]
    async fn test_v2_collection_is_rejected() {
        let err = transform(json!({
            "info": {"schema": "https://schema.getpostman.com/json/collection/v2.1.0/"},
            "item": []
        }))
        .await
        .unwrap_err();
        assert!(matches!(err, Error::ContentNotRecognized));
    }

    #[tokio::test]
    async fn test_v1_collection() {
        let envelope = transform(json!({
            "id": "c1",
            "name": "My API",
            "order": ["r1"],
            "requests": [{
                "id": "r1",
                "name": "List users",
                "url": "https://{{host}}/users",
                "method": "GET",
                "headers": "x-api-key: {{key}}",
                "rawModeData": "",
                "time": 1_499_177_265_511_i64
            }]
        }))
        .await
        .unwrap();

        assert_eq!(envelope.kind, "ARC#Import");
        let projects = envelope.projects.unwrap();
        let requests = envelope.requests.unwrap();
        assert_eq!(projects[0].get("name"), Some(&json!("My API")));

        let request = &requests[0];
        // Placeholders are left for the consumer to resolve.
        assert_eq!(request.get("url"), Some(&json!("https://{{host}}/users")));
        assert_eq!(request.get("headers"), Some(&json!("x-api-key: {{key}}")));
        assert_eq!(request.get("type"), Some(&json!("saved")));
        assert!(request.get("payload").is_none());

        let project_key = projects[0].get("key").and_then(Value::as_str).unwrap();
        assert_eq!(request.get("projects"), Some(&json!([project_key])));
        let request_key = request.get("key").and_then(Value::as_str).unwrap();
        assert_eq!(projects[0].get("requests"), Some(&json!([request_key])));
    }

    #[tokio::test]
    async fn test_backup_dump_with_environments() {
        let envelope = transform(json!({
            "version": 1,
            "collections": [
                {"id": "c1", "name": "A", "requests": [
                    {"id": "r1", "name": "one", "url": "x", "method": "GET"}
                ]},
                {"id": "c2", "name": "B", "requests": []}
            ],
            "environments": [
                {"name": "staging", "values": [
                    {"key": "host", "value": "stage.test", "enabled": true}
                ]}
            ],
            "globals": [
                {"key": "token", "value": "abc"}
            ]
        }))
        .await
        .unwrap();

        assert_eq!(envelope.projects.unwrap().len(), 2);
        assert_eq!(envelope.requests.unwrap().len(), 1);

        let variables = envelope.variables.unwrap();
        assert_eq!(variables.len(), 2);
        assert_eq!(variables[0].get("environment"), Some(&json!("staging")));
        assert_eq!(variables[0].get("variable"), Some(&json!("host")));
        assert_eq!(variables[1].get("environment"), Some(&json!("globals")));
        assert_eq!(variables[1].get("enabled"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_environment_scope_file() {
        let envelope = transform(json!({
            "id": "e1",
            "name": "production",
            "_postman_variable_scope": "environment",
            "values": [
                {"key": "host", "value": "prod.test", "enabled": false}
            ]
        }))
        .await
        .unwrap();

        let variables = envelope.variables.unwrap();
        assert_eq!(variables[0].get("environment"), Some(&json!("production")));
        assert_eq!(variables[0].get("enabled"), Some(&json!(false)));
        assert_eq!(variables[0].get("kind"), Some(&json!("ARC#Variable")));
    }
}
