//! End-to-end export tests: store to file and back again.

use std::sync::Arc;

use proptest::prelude::*;
use serde_json::{Value, json};

use arcdata::export::pair_certificates;
use arcdata::store::{collections, CollectionStore};
use arcdata::{
    ArcExportOptions, DataExportRequest, DataExporter, DataImporter, ExportConfig, ExportEnvelope,
    ExportSelection, FileSystemWriter, MemoryStore, Record,
};

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

async fn seeded_store() -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    store
        .seed(
            collections::SAVED_REQUESTS,
            vec![
                json!({"_id": "r1", "_rev": "1-a", "name": "list users", "url": "https://api.test/users", "method": "GET", "projects": ["p1"]}),
                json!({"_id": "r2", "_rev": "1-b", "name": "create user", "url": "https://api.test/users", "method": "POST"}),
            ],
        )
        .await
        .unwrap();
    store
        .seed(
            collections::LEGACY_PROJECTS,
            vec![json!({"_id": "p1", "_rev": "3-x", "name": "Users API", "requests": ["r1"]})],
        )
        .await
        .unwrap();
    store
        .seed(
            collections::HISTORY_REQUESTS,
            vec![json!({"_id": "h1", "url": "https://api.test/ping", "method": "GET"})],
        )
        .await
        .unwrap();
    store
        .seed(
            collections::VARIABLES,
            vec![
                json!({"_id": "v1", "environment": "default", "variable": "host", "value": "api.test"}),
                json!({"_id": "v2", "views": {"by_env": true}}),
            ],
        )
        .await
        .unwrap();
    store
        .seed(
            collections::CLIENT_CERTIFICATES,
            vec![json!({"_id": "c1", "name": "client", "type": "pem", "dataKey": "cd1"})],
        )
        .await
        .unwrap();
    store
        .seed(
            collections::CLIENT_CERTIFICATES_DATA,
            vec![json!({"_id": "cd1", "cert": {"data": "CERT"}, "key": {"data": "PKEY"}})],
        )
        .await
        .unwrap();
    Arc::new(store)
}

async fn export_everything(store: Arc<MemoryStore>, dir: &std::path::Path) -> ExportEnvelope {
    let exporter = DataExporter::new(ExportConfig::new().with_app_version("13.0.0"), store)
        .with_destination("file", Arc::new(FileSystemWriter::new(dir)));
    let request = DataExportRequest::new(
        ExportSelection::everything(),
        ArcExportOptions::new("file", "backup.json"),
    );
    exporter.arc_export(request).await.unwrap();

    let content = std::fs::read_to_string(dir.join("backup.json")).unwrap();
    serde_json::from_str(&content).unwrap()
}

#[tokio::test]
async fn full_export_produces_canonical_envelope() {
    let dir = tempfile::tempdir().unwrap();
    let envelope = export_everything(seeded_store().await, dir.path()).await;

    assert_eq!(envelope.kind, "ARC#AllDataExport");
    assert_eq!(envelope.version, "13.0.0");

    let requests = envelope.requests.as_ref().unwrap();
    assert_eq!(requests.len(), 2);
    for request in requests {
        assert!(request.get("_id").is_none());
        assert!(request.get("_rev").is_none());
        assert_eq!(request.get("kind"), Some(&json!("ARC#RequestData")));
    }

    // The view artifact variable is filtered, the real one kept.
    let variables = envelope.variables.as_ref().unwrap();
    assert_eq!(variables.len(), 1);
    assert_eq!(variables[0].get("variable"), Some(&json!("host")));

    // Certificates are merged into single records.
    let certs = envelope.client_certificates.as_ref().unwrap();
    assert_eq!(certs[0].get("cert"), Some(&json!({"data": "CERT"})));
    assert_eq!(certs[0].get("pKey"), Some(&json!({"data": "PKEY"})));

    // Cookies were never seeded, so the property is absent.
    assert!(envelope.cookies.is_none());
}

#[tokio::test]
async fn exported_file_imports_into_a_fresh_store() {
    let dir = tempfile::tempdir().unwrap();
    let source = seeded_store().await;
    export_everything(Arc::clone(&source), dir.path()).await;

    let content = std::fs::read_to_string(dir.path().join("backup.json")).unwrap();
    let target = Arc::new(MemoryStore::new());
    let importer = DataImporter::new(Arc::clone(&target));

    let envelope = importer.normalize(&content, None).await.unwrap();
    assert_eq!(envelope.kind, "ARC#Import");
    let report = importer.store_data(envelope).await.unwrap();
    assert_eq!(report.inserted(collections::SAVED_REQUESTS), 2);
    assert_eq!(report.inserted(collections::HISTORY_REQUESTS), 1);
    assert_eq!(report.inserted(collections::CLIENT_CERTIFICATES), 1);

    // Records come back under their original ids, without pipeline fields.
    let request = target
        .read_one(collections::SAVED_REQUESTS, "r1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(request.get("url"), Some(&json!("https://api.test/users")));
    assert!(request.get("key").is_none());
    assert!(request.get("kind").is_none());

    // The certificate pair is split back into two documents.
    let index = target
        .read_one(collections::CLIENT_CERTIFICATES, "c1")
        .await
        .unwrap()
        .unwrap();
    let data_key = index.get("dataKey").and_then(Value::as_str).unwrap();
    let payload = target
        .read_one(collections::CLIENT_CERTIFICATES_DATA, data_key)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payload.get("cert"), Some(&json!({"data": "CERT"})));
}

#[tokio::test]
async fn request_referenced_certificates_are_linked() {
    let store = MemoryStore::new();
    store
        .seed(
            collections::SAVED_REQUESTS,
            vec![json!({
                "_id": "r1",
                "url": "https://secure.test",
                "method": "GET",
                "authType": "client certificate",
                "auth": {"id": "c1"}
            })],
        )
        .await
        .unwrap();
    store
        .seed(
            collections::CLIENT_CERTIFICATES,
            vec![json!({"_id": "c1", "name": "client", "dataKey": "cd1"})],
        )
        .await
        .unwrap();
    store
        .seed(
            collections::CLIENT_CERTIFICATES_DATA,
            vec![json!({"_id": "cd1", "cert": {"data": "CERT"}})],
        )
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let exporter = DataExporter::new(ExportConfig::new(), Arc::new(store))
        .with_destination("file", Arc::new(FileSystemWriter::new(dir.path())));
    // Only saved requests are selected; the certificate rides along.
    let request = DataExportRequest::new(
        ExportSelection::new().from_store(arcdata::DataKind::Saved),
        ArcExportOptions::new("file", "saved.json"),
    );
    exporter.arc_export(request).await.unwrap();

    let content = std::fs::read_to_string(dir.path().join("saved.json")).unwrap();
    let envelope: ExportEnvelope = serde_json::from_str(&content).unwrap();
    let certs = envelope.client_certificates.unwrap();
    assert_eq!(certs.len(), 1);
    assert_eq!(certs[0].get("key"), Some(&json!("c1")));
}

#[cfg(feature = "encryption")]
#[tokio::test]
async fn encrypted_export_round_trips_through_import() {
    use arcdata::crypto::AesEncryption;

    let dir = tempfile::tempdir().unwrap();
    let source = seeded_store().await;
    let exporter = DataExporter::new(ExportConfig::new(), source)
        .with_encryption(Arc::new(AesEncryption::new()))
        .with_destination("file", Arc::new(FileSystemWriter::new(dir.path())));
    let request = DataExportRequest::new(
        ExportSelection::everything(),
        ArcExportOptions::new("file", "secret.json").with_passphrase("hunter2"),
    );
    exporter.arc_export(request).await.unwrap();

    let content = std::fs::read_to_string(dir.path().join("secret.json")).unwrap();
    assert!(content.starts_with("aes\n"));

    let importer = DataImporter::new(Arc::new(MemoryStore::new()))
        .with_encryption(Arc::new(AesEncryption::new()));
    let envelope = importer.normalize(&content, Some("hunter2")).await.unwrap();
    assert_eq!(envelope.kind, "ARC#Import");
    assert_eq!(envelope.requests.unwrap().len(), 2);

    // Wrong passphrase never yields plaintext.
    assert!(importer.normalize(&content, Some("wrong")).await.is_err());
}

fn certificate_records(ids: Vec<(String, String)>) -> Vec<Record> {
    ids.into_iter()
        .map(|(id, data_key)| record(json!({"_id": id, "dataKey": data_key})))
        .collect()
}

proptest! {
    // Pairing never invents pairs and never reuses a payload.
    #[test]
    fn certificate_pairing_is_deterministic(
        links in prop::collection::vec(("i[0-9]{1,3}", "d[0-9]{1,2}"), 0..20),
        payload_ids in prop::collection::hash_set("d[0-9]{1,2}", 0..20),
    ) {
        let indexes = certificate_records(links.clone());
        let payloads: Vec<Record> = payload_ids
            .iter()
            .map(|id| record(json!({"_id": id, "cert": "x"})))
            .collect();

        let pairs = pair_certificates(indexes.clone(), payloads.clone());
        let again = pair_certificates(indexes, payloads);
        prop_assert_eq!(pairs.clone(), again);
        prop_assert!(pairs.len() <= links.len());

        // Each payload id is consumed at most once.
        let mut used: Vec<&str> = pairs
            .iter()
            .filter_map(|p| p.data.get("_id").and_then(Value::as_str))
            .collect();
        let total = used.len();
        used.sort_unstable();
        used.dedup();
        prop_assert_eq!(used.len(), total);
    }
}
