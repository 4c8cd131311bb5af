//! Import orchestration.
//!
//! [`DataImporter`] normalizes file content, decides what should happen
//! with it ([`ImportOutcome`]) and writes normalized envelopes back into
//! the datastore.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::crypto::Encryption;
use crate::import::detect;
use crate::models::{ExportEnvelope, Record, kinds};
use crate::store::{CollectionStore, collections};
use crate::{Error, Result};

/// What a processed file asks the host to do.
#[derive(Debug, Clone)]
pub enum ImportOutcome {
    /// The file held a single request; open it instead of importing.
    OpenRequest(Record),
    /// The envelope asked for a direct workspace load.
    LoadToWorkspace(ExportEnvelope),
    /// Regular import data, to be inspected and then passed to
    /// [`DataImporter::store_data`].
    Inspect(ExportEnvelope),
}

/// Per-collection insert counts of one [`DataImporter::store_data`] call.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    inserted: BTreeMap<String, usize>,
}

impl ImportReport {
    /// Number of records written into one collection.
    #[must_use]
    pub fn inserted(&self, collection: &str) -> usize {
        self.inserted.get(collection).copied().unwrap_or(0)
    }

    /// Total number of records written.
    #[must_use]
    pub fn total(&self) -> usize {
        self.inserted.values().sum()
    }

    fn add(&mut self, collection: &str, count: usize) {
        if count > 0 {
            *self.inserted.entry(collection.to_string()).or_default() += count;
        }
    }
}

/// The import pipeline facade.
pub struct DataImporter<S> {
    store: Arc<S>,
    encryption: Option<Arc<dyn Encryption>>,
}

impl<S: CollectionStore> DataImporter<S> {
    /// Creates an importer writing into the given store.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            encryption: None,
        }
    }

    /// Registers the encryption collaborator used for sealed payloads.
    #[must_use]
    pub fn with_encryption(mut self, encryption: Arc<dyn Encryption>) -> Self {
        self.encryption = Some(encryption);
        self
    }

    /// Normalizes raw file content into the canonical envelope.
    ///
    /// # Errors
    ///
    /// See [`detect::normalize`].
    pub async fn normalize(
        &self,
        content: &str,
        passphrase: Option<&str>,
    ) -> Result<ExportEnvelope> {
        detect::normalize(content, self.encryption.as_deref(), passphrase).await
    }

    /// Normalizes the content and decides what to do with it.
    ///
    /// # Errors
    ///
    /// Fails when normalization fails; the decision itself cannot fail.
    pub async fn process_data(
        &self,
        content: &str,
        passphrase: Option<&str>,
    ) -> Result<ImportOutcome> {
        let envelope = self.normalize(content, passphrase).await?;
        if envelope.is_single_request() {
            let request = envelope
                .requests
                .and_then(|mut requests| (requests.len() == 1).then(|| requests.remove(0)))
                .ok_or_else(|| {
                    Error::InvalidInput("single request envelope without a request".to_string())
                })?;
            return Ok(ImportOutcome::OpenRequest(request));
        }
        if envelope.load_to_workspace == Some(true) {
            return Ok(ImportOutcome::LoadToWorkspace(envelope));
        }
        Ok(ImportOutcome::Inspect(envelope))
    }

    /// Writes a normalized envelope into the datastore.
    ///
    /// Records go back with their `key` restored to the store's `_id` and
    /// the `kind` discriminant removed; merged certificate records split
    /// back into their index and payload documents.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidInput`] when the envelope was not
    /// normalized (its kind is not `ARC#Import`), and on store write
    /// errors.
    pub async fn store_data(&self, envelope: ExportEnvelope) -> Result<ImportReport> {
        if envelope.kind != kinds::IMPORT {
            return Err(Error::InvalidInput(
                "data is not normalized for import".to_string(),
            ));
        }
        let mut report = ImportReport::default();

        self.insert_bucket(envelope.requests, collections::SAVED_REQUESTS, &mut report)
            .await?;
        self.insert_bucket(envelope.projects, collections::LEGACY_PROJECTS, &mut report)
            .await?;
        self.insert_bucket(envelope.history, collections::HISTORY_REQUESTS, &mut report)
            .await?;
        self.insert_bucket(
            envelope.websocket_url_history,
            collections::WEBSOCKET_URL_HISTORY,
            &mut report,
        )
        .await?;
        self.insert_bucket(envelope.url_history, collections::URL_HISTORY, &mut report)
            .await?;
        self.insert_bucket(envelope.variables, collections::VARIABLES, &mut report)
            .await?;
        self.insert_bucket(envelope.auth_data, collections::AUTH_DATA, &mut report)
            .await?;
        self.insert_bucket(envelope.cookies, collections::COOKIES, &mut report)
            .await?;
        self.insert_bucket(envelope.host_rules, collections::HOST_RULES, &mut report)
            .await?;
        self.insert_certificates(envelope.client_certificates, &mut report)
            .await?;

        tracing::info!(total = report.total(), "stored import data");
        Ok(report)
    }

    async fn insert_bucket(
        &self,
        records: Option<Vec<Record>>,
        collection: &str,
        report: &mut ImportReport,
    ) -> Result<()> {
        let Some(records) = records else {
            return Ok(());
        };
        let docs: Vec<Record> = records.into_iter().map(into_store_doc).collect();
        let count = docs.len();
        self.store.insert(collection, docs).await?;
        report.add(collection, count);
        Ok(())
    }

    /// Splits merged certificate records back into index and payload
    /// documents linked through `dataKey`.
    async fn insert_certificates(
        &self,
        records: Option<Vec<Record>>,
        report: &mut ImportReport,
    ) -> Result<()> {
        let Some(records) = records else {
            return Ok(());
        };
        let mut indexes = Vec::with_capacity(records.len());
        let mut payloads = Vec::with_capacity(records.len());
        for record in records {
            let mut index = into_store_doc(record);
            let cert = index.remove("cert");
            let p_key = index.remove("pKey");

            let data_key = match index.get("dataKey").and_then(Value::as_str) {
                Some(key) if !key.is_empty() => key.to_string(),
                _ => {
                    let minted = uuid::Uuid::new_v4().to_string();
                    index.insert("dataKey".to_string(), Value::String(minted.clone()));
                    minted
                }
            };

            let mut payload = Record::new();
            payload.insert("_id".to_string(), Value::String(data_key));
            if let Some(cert) = cert {
                payload.insert("cert".to_string(), cert);
            }
            if let Some(p_key) = p_key {
                payload.insert("key".to_string(), p_key);
            }
            indexes.push(index);
            payloads.push(payload);
        }

        let count = indexes.len();
        self.store
            .insert(collections::CLIENT_CERTIFICATES, indexes)
            .await?;
        self.store
            .insert(collections::CLIENT_CERTIFICATES_DATA, payloads)
            .await?;
        report.add(collections::CLIENT_CERTIFICATES, count);
        Ok(())
    }
}

/// Converts a canonical record back into its store document form.
fn into_store_doc(mut record: Record) -> Record {
    if let Some(key) = record.remove("key") {
        record.insert("_id".to_string(), key);
    }
    record.remove("kind");
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => Record::new(),
        }
    }

    fn importer() -> (Arc<MemoryStore>, DataImporter<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (Arc::clone(&store), DataImporter::new(store))
    }

    #[tokio::test]
    async fn test_store_data_requires_normalized_envelope() {
        let (_, importer) = importer();
        let envelope = ExportEnvelope {
            kind: "ARC#AllDataExport".to_string(),
            ..Default::default()
        };
        let err = importer.store_data(envelope).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_store_data_writes_collections() {
        let (store, importer) = importer();
        let envelope = ExportEnvelope {
            kind: kinds::IMPORT.to_string(),
            requests: Some(vec![record(
                json!({"key": "r1", "url": "x", "kind": "ARC#RequestData"}),
            )]),
            variables: Some(vec![record(
                json!({"key": "v1", "environment": "default", "kind": "ARC#Variable"}),
            )]),
            ..Default::default()
        };
        let report = importer.store_data(envelope).await.unwrap();
        assert_eq!(report.total(), 2);
        assert_eq!(report.inserted(collections::SAVED_REQUESTS), 1);

        let doc = store
            .read_one(collections::SAVED_REQUESTS, "r1")
            .await
            .unwrap()
            .unwrap();
        assert!(doc.get("key").is_none());
        assert!(doc.get("kind").is_none());
        assert_eq!(doc.get("url"), Some(&json!("x")));
    }

    #[tokio::test]
    async fn test_store_data_splits_certificates() {
        let (store, importer) = importer();
        let envelope = ExportEnvelope {
            kind: kinds::IMPORT.to_string(),
            client_certificates: Some(vec![record(json!({
                "key": "c1",
                "name": "cert",
                "type": "pem",
                "cert": {"data": "abc"},
                "pKey": {"data": "priv"},
                "kind": "ARC#ClientCertificate"
            }))]),
            ..Default::default()
        };
        importer.store_data(envelope).await.unwrap();

        let index = store
            .read_one(collections::CLIENT_CERTIFICATES, "c1")
            .await
            .unwrap()
            .unwrap();
        assert!(index.get("cert").is_none());
        let data_key = index.get("dataKey").and_then(Value::as_str).unwrap();

        let payload = store
            .read_one(collections::CLIENT_CERTIFICATES_DATA, data_key)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payload.get("cert"), Some(&json!({"data": "abc"})));
        assert_eq!(payload.get("key"), Some(&json!({"data": "priv"})));
    }

    #[tokio::test]
    async fn test_process_single_request() {
        let (_, importer) = importer();
        let content = json!({"url": "https://a.test", "method": "GET"}).to_string();
        let outcome = importer.process_data(&content, None).await.unwrap();
        assert!(matches!(outcome, ImportOutcome::OpenRequest(_)));
    }

    #[tokio::test]
    async fn test_process_load_to_workspace() {
        let (_, importer) = importer();
        let content = json!({
            "kind": "ARC#AllDataExport",
            "loadToWorkspace": true,
            "requests": [{"_id": "r1"}],
            "history": [{"_id": "h1"}]
        })
        .to_string();
        let outcome = importer.process_data(&content, None).await.unwrap();
        assert!(matches!(outcome, ImportOutcome::LoadToWorkspace(_)));
    }

    #[tokio::test]
    async fn test_process_regular_import() {
        let (_, importer) = importer();
        let content = json!({
            "kind": "ARC#AllDataExport",
            "requests": [{"_id": "r1"}, {"_id": "r2"}]
        })
        .to_string();
        let outcome = importer.process_data(&content, None).await.unwrap();
        match outcome {
            ImportOutcome::Inspect(envelope) => {
                assert_eq!(envelope.requests.unwrap().len(), 2);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
