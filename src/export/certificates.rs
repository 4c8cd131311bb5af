//! Client certificate gathering for exports.
//!
//! Certificates live in two collections: an index collection with metadata
//! and a payload collection with the certificate material. The index record
//! points at its payload through `dataKey`. This module pairs the two on a
//! bulk export and resolves the certificates referenced by individual
//! requests when only requests are exported.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::models::{CertificatePair, Record};
use crate::store::{CollectionStore, collections};

/// The `authType` value marking a request as certificate-authenticated.
const CLIENT_CERTIFICATE_AUTH: &str = "client certificate";

/// Pairs certificate index records with their payload records.
///
/// Index order is preserved. Each payload is matched by its `_id` against
/// the index's `dataKey`; the first match wins and the payload is consumed,
/// so a payload can back at most one index record. Indexes without a
/// payload are dropped with a warning.
#[must_use]
pub fn pair_certificates(indexes: Vec<Record>, payloads: Vec<Record>) -> Vec<CertificatePair> {
    let mut pool: Vec<Option<Record>> = payloads.into_iter().map(Some).collect();
    let mut pairs = Vec::with_capacity(indexes.len());
    for index in indexes {
        let data_key = index.get("dataKey").and_then(Value::as_str);
        let matched = data_key.and_then(|key| {
            pool.iter_mut()
                .find(|slot| {
                    slot.as_ref()
                        .and_then(|payload| payload.get("_id"))
                        .and_then(Value::as_str)
                        == Some(key)
                })
                .and_then(Option::take)
        });
        match matched {
            Some(data) => pairs.push(CertificatePair::new(index, data)),
            None => {
                let id = index.get("_id").and_then(Value::as_str);
                tracing::warn!(id, "certificate index has no payload, dropping");
            }
        }
    }
    pairs
}

/// Resolves the client certificates referenced by exported requests.
///
/// A request referencing a certificate carries `authType` set to
/// `client certificate` and the certificate's id in `auth.id`. The linker
/// reads each referenced certificate once, deduplicating across batches,
/// and clears the reference from any request whose certificate no longer
/// exists so the exported file never points at missing material.
pub struct CertificateLinker<'a, S: ?Sized> {
    store: &'a S,
    /// Resolution cache: id to whether the certificate was found.
    resolved: BTreeMap<String, bool>,
    pairs: Vec<CertificatePair>,
}

impl<'a, S: CollectionStore + ?Sized> CertificateLinker<'a, S> {
    /// Creates a linker reading from the given store.
    pub fn new(store: &'a S) -> Self {
        Self::with_pairs(store, Vec::new())
    }

    /// Creates a linker seeded with already-gathered pairs.
    ///
    /// Requests referencing a seeded certificate are left alone and the
    /// certificate is not read again.
    pub fn with_pairs(store: &'a S, pairs: Vec<CertificatePair>) -> Self {
        let resolved = pairs
            .iter()
            .filter_map(|pair| pair.index_id().map(|id| (id.to_string(), true)))
            .collect();
        Self {
            store,
            resolved,
            pairs,
        }
    }

    /// Scans a batch of requests, gathering referenced certificates and
    /// clearing references to missing ones.
    ///
    /// May be called once per request batch; the accumulated pairs are
    /// shared across calls so a certificate referenced from both saved and
    /// history requests is exported once.
    pub async fn collect(&mut self, requests: &mut [Record]) {
        for request in requests.iter_mut() {
            let Some(id) = certificate_id(request) else {
                continue;
            };
            let found = match self.resolved.get(&id) {
                Some(found) => *found,
                None => {
                    let pair = self.read_pair(&id).await;
                    let found = pair.is_some();
                    if let Some(pair) = pair {
                        self.pairs.push(pair);
                    }
                    self.resolved.insert(id.clone(), found);
                    found
                }
            };
            if !found {
                tracing::warn!(id = %id, "referenced client certificate not found, clearing");
                clear_certificate_reference(request);
            }
        }
    }

    /// Consumes the linker, returning the gathered pairs in reference
    /// order.
    #[must_use]
    pub fn into_pairs(self) -> Vec<CertificatePair> {
        self.pairs
    }

    /// Returns true when no certificates were gathered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    async fn read_pair(&self, id: &str) -> Option<CertificatePair> {
        let index = self
            .store
            .read_one(collections::CLIENT_CERTIFICATES, id)
            .await
            .ok()??;
        let data_key = index.get("dataKey").and_then(Value::as_str)?;
        let data = self
            .store
            .read_one(collections::CLIENT_CERTIFICATES_DATA, data_key)
            .await
            .ok()??;
        Some(CertificatePair::new(index, data))
    }
}

fn certificate_id(request: &Record) -> Option<String> {
    let auth_type = request.get("authType").and_then(Value::as_str)?;
    if auth_type != CLIENT_CERTIFICATE_AUTH {
        return None;
    }
    request
        .get("auth")
        .and_then(Value::as_object)
        .and_then(|auth| auth.get("id"))
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
}

fn clear_certificate_reference(request: &mut Record) {
    if let Some(auth) = request.get_mut("auth").and_then(Value::as_object_mut) {
        auth.remove("id");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => Record::new(),
        }
    }

    fn records(values: Vec<serde_json::Value>) -> Vec<Record> {
        values.into_iter().map(record).collect()
    }

    #[test]
    fn test_pairing_preserves_index_order() {
        let pairs = pair_certificates(
            records(vec![
                json!({"_id": "i1", "dataKey": "d1"}),
                json!({"_id": "i2", "dataKey": "d2"}),
            ]),
            records(vec![
                json!({"_id": "d2", "cert": "second"}),
                json!({"_id": "d1", "cert": "first"}),
            ]),
        );
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].index_id(), Some("i1"));
        assert_eq!(pairs[0].data.get("cert"), Some(&json!("first")));
        assert_eq!(pairs[1].index_id(), Some("i2"));
    }

    #[test]
    fn test_payload_consumed_once() {
        // Two indexes pointing at the same payload: only the first gets it.
        let pairs = pair_certificates(
            records(vec![
                json!({"_id": "i1", "dataKey": "d1"}),
                json!({"_id": "i2", "dataKey": "d1"}),
            ]),
            records(vec![json!({"_id": "d1", "cert": "x"})]),
        );
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].index_id(), Some("i1"));
    }

    #[test]
    fn test_index_without_payload_is_dropped() {
        let pairs = pair_certificates(
            records(vec![json!({"_id": "i1", "dataKey": "missing"})]),
            records(vec![json!({"_id": "d1", "cert": "x"})]),
        );
        assert!(pairs.is_empty());
    }

    async fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert(
                collections::CLIENT_CERTIFICATES,
                records(vec![json!({"_id": "cert-1", "name": "test", "dataKey": "data-1"})]),
            )
            .await
            .unwrap();
        store
            .insert(
                collections::CLIENT_CERTIFICATES_DATA,
                records(vec![json!({"_id": "data-1", "cert": {"data": "abc"}})]),
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_linker_gathers_referenced_certificate() {
        let store = seeded_store().await;
        let mut linker = CertificateLinker::new(&store);
        let mut requests = records(vec![json!({
            "_id": "r1",
            "authType": "client certificate",
            "auth": {"id": "cert-1"}
        })]);
        linker.collect(&mut requests).await;

        let pairs = linker.into_pairs();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].index_id(), Some("cert-1"));
        // The reference stays on the request.
        assert_eq!(
            requests[0].get("auth"),
            Some(&json!({"id": "cert-1"}))
        );
    }

    #[tokio::test]
    async fn test_linker_dedupes_across_batches() {
        let store = seeded_store().await;
        let mut linker = CertificateLinker::new(&store);
        let mut saved = records(vec![json!({
            "authType": "client certificate",
            "auth": {"id": "cert-1"}
        })]);
        let mut history = records(vec![json!({
            "authType": "client certificate",
            "auth": {"id": "cert-1"}
        })]);
        linker.collect(&mut saved).await;
        linker.collect(&mut history).await;

        assert_eq!(linker.into_pairs().len(), 1);
    }

    #[tokio::test]
    async fn test_seeded_pairs_are_not_read_again() {
        // An empty store: any read attempt would come back as missing.
        let store = MemoryStore::new();
        let seeded = vec![CertificatePair::new(
            record(json!({"_id": "cert-1", "name": "test", "dataKey": "data-1"})),
            record(json!({"_id": "data-1", "cert": {"data": "abc"}})),
        )];
        let mut linker = CertificateLinker::with_pairs(&store, seeded);
        let mut requests = records(vec![json!({
            "authType": "client certificate",
            "auth": {"id": "cert-1"}
        })]);
        linker.collect(&mut requests).await;

        // The reference is kept and the pair is not duplicated.
        assert_eq!(requests[0].get("auth"), Some(&json!({"id": "cert-1"})));
        assert_eq!(linker.into_pairs().len(), 1);
    }

    #[tokio::test]
    async fn test_linker_clears_missing_reference() {
        let store = MemoryStore::new();
        let mut linker = CertificateLinker::new(&store);
        let mut requests = records(vec![json!({
            "authType": "client certificate",
            "auth": {"id": "gone", "other": "kept"}
        })]);
        linker.collect(&mut requests).await;

        assert!(linker.is_empty());
        assert_eq!(requests[0].get("auth"), Some(&json!({"other": "kept"})));
    }

    #[tokio::test]
    async fn test_linker_ignores_other_auth_types() {
        let store = seeded_store().await;
        let mut linker = CertificateLinker::new(&store);
        let mut requests = records(vec![json!({
            "authType": "basic",
            "auth": {"id": "cert-1"}
        })]);
        linker.collect(&mut requests).await;
        assert!(linker.is_empty());
    }
}
