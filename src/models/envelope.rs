//! The canonical export envelope and its record types.
//!
//! The envelope is the top-level object written to export files and produced
//! by every import transformer. Record arrays keep their original wire
//! property names; a kind with no records serializes to no property at all.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single datastore document as an open set of JSON fields.
///
/// Records are schemaless at this layer: the pipeline only interprets the
/// identity fields (`_id`, `_rev`, `key`, `kind`) and a handful of
/// cross-reference fields (`projects`, `requests`, `legacyProject`, `auth`),
/// everything else is carried through untouched.
pub type Record = serde_json::Map<String, Value>;

/// Kind discriminant strings.
///
/// These are wire-format constants; changing any of them breaks
/// compatibility with previously exported files.
pub mod kinds {
    /// Envelope kind for a full export.
    pub const ALL_DATA_EXPORT: &str = "ARC#AllDataExport";
    /// Envelope kind signaling data normalized for import.
    pub const IMPORT: &str = "ARC#Import";

    /// Saved request record.
    pub const REQUEST_DATA: &str = "ARC#RequestData";
    /// Project record.
    pub const PROJECT_DATA: &str = "ARC#ProjectData";
    /// History request record.
    pub const HISTORY_DATA: &str = "ARC#HistoryData";
    /// Websocket URL history record.
    pub const WEBSOCKET_HISTORY_DATA: &str = "ARC#WebsocketHistoryData";
    /// URL history record.
    pub const URL_HISTORY_DATA: &str = "ARC#UrlHistoryData";
    /// Environment variable record.
    pub const VARIABLE: &str = "ARC#Variable";
    /// Cached authorization data record.
    pub const AUTH_DATA: &str = "ARC#AuthData";
    /// Cookie record.
    pub const COOKIE: &str = "ARC#Cookie";
    /// Host rule record.
    pub const HOST_RULE: &str = "ARC#HostRule";
    /// Client certificate record (merged index + payload).
    pub const CLIENT_CERTIFICATE: &str = "ARC#ClientCertificate";
}

/// A client certificate as stored: an index record holding metadata and a
/// payload record holding the certificate material.
///
/// The pairing key is `dataKey` on the index record matching the raw `_id`
/// of the payload record.
#[derive(Debug, Clone, PartialEq)]
pub struct CertificatePair {
    /// The certificate index record (name, type, created, `dataKey`).
    pub index: Record,
    /// The certificate payload record (`cert`, optional `key`).
    pub data: Record,
}

impl CertificatePair {
    /// Creates a pair from its two documents.
    #[must_use]
    pub const fn new(index: Record, data: Record) -> Self {
        Self { index, data }
    }

    /// Returns the raw store id of the index record.
    #[must_use]
    pub fn index_id(&self) -> Option<&str> {
        self.index.get("_id").and_then(Value::as_str)
    }
}

/// Input buckets for [`crate::ExportProcessor`].
///
/// Each field holds owned per-call copies of the records to export; the
/// processor consumes them and never touches caller-held data. `requests`
/// holds records fetched from the store, `saved` holds manually listed
/// saved requests — both end up in the envelope's `requests` array,
/// fetched first.
#[derive(Debug, Clone, Default)]
pub struct ExportData {
    /// Saved requests fetched from the datastore.
    pub requests: Option<Vec<Record>>,
    /// Manually listed saved requests.
    pub saved: Option<Vec<Record>>,
    /// Projects.
    pub projects: Option<Vec<Record>>,
    /// History requests.
    pub history: Option<Vec<Record>>,
    /// Websocket URL history entries.
    pub websocket_url_history: Option<Vec<Record>>,
    /// URL history entries.
    pub url_history: Option<Vec<Record>>,
    /// Environment variables.
    pub variables: Option<Vec<Record>>,
    /// Cached authorization data.
    pub auth_data: Option<Vec<Record>>,
    /// Cookies.
    pub cookies: Option<Vec<Record>>,
    /// Host rules.
    pub host_rules: Option<Vec<Record>>,
    /// Client certificates as (index, payload) pairs.
    pub client_certificates: Option<Vec<CertificatePair>>,
}

impl ExportData {
    /// Creates an empty set of buckets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// The canonical top-level export/import object.
///
/// Top-level property names and the `kind` discriminants are wire-format
/// stable. Record arrays that would be empty are omitted entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExportEnvelope {
    /// Export timestamp, RFC 3339.
    #[serde(rename = "createdAt", default)]
    pub created_at: String,
    /// Version of the application that produced the file.
    #[serde(default)]
    pub version: String,
    /// Envelope kind discriminant.
    #[serde(default)]
    pub kind: String,
    /// Present and true only when the exporter requested skip-import
    /// (direct load into the workspace) semantics.
    #[serde(rename = "loadToWorkspace", skip_serializing_if = "Option::is_none")]
    pub load_to_workspace: Option<bool>,
    /// Saved requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests: Option<Vec<Record>>,
    /// Projects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projects: Option<Vec<Record>>,
    /// History requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<Record>>,
    /// Websocket URL history.
    #[serde(
        rename = "websocket-url-history",
        skip_serializing_if = "Option::is_none"
    )]
    pub websocket_url_history: Option<Vec<Record>>,
    /// URL history.
    #[serde(rename = "url-history", skip_serializing_if = "Option::is_none")]
    pub url_history: Option<Vec<Record>>,
    /// Environment variables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Vec<Record>>,
    /// Cached authorization data.
    #[serde(rename = "auth-data", skip_serializing_if = "Option::is_none")]
    pub auth_data: Option<Vec<Record>>,
    /// Cookies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookies: Option<Vec<Record>>,
    /// Host rules.
    #[serde(rename = "host-rules", skip_serializing_if = "Option::is_none")]
    pub host_rules: Option<Vec<Record>>,
    /// Client certificates, merged into single records on export.
    #[serde(
        rename = "client-certificates",
        skip_serializing_if = "Option::is_none"
    )]
    pub client_certificates: Option<Vec<Record>>,
}

impl ExportEnvelope {
    /// Returns true when the envelope holds exactly one request and nothing
    /// else, which callers treat as an "open in workspace" shortcut.
    #[must_use]
    pub fn is_single_request(&self) -> bool {
        if self.requests.as_ref().is_none_or(|r| r.len() != 1) {
            return false;
        }
        self.projects.is_none()
            && self.history.is_none()
            && self.websocket_url_history.is_none()
            && self.url_history.is_none()
            && self.variables.is_none()
            && self.auth_data.is_none()
            && self.cookies.is_none()
            && self.host_rules.is_none()
            && self.client_certificates.is_none()
    }

    /// Serializes the envelope to its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string(self).map_err(|e| crate::Error::OperationFailed {
            operation: "serialize_envelope".to_string(),
            cause: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(fields: Value) -> Record {
        match fields {
            Value::Object(map) => map,
            _ => Record::new(),
        }
    }

    #[test]
    fn test_empty_kinds_are_omitted() {
        let envelope = ExportEnvelope {
            created_at: "2023-01-01T00:00:00Z".to_string(),
            version: "1.0.0".to_string(),
            kind: kinds::ALL_DATA_EXPORT.to_string(),
            ..Default::default()
        };
        let json = envelope.to_json().unwrap();
        assert!(!json.contains("variables"));
        assert!(!json.contains("loadToWorkspace"));
        assert!(json.contains("\"createdAt\""));
    }

    #[test]
    fn test_wire_property_names() {
        let envelope = ExportEnvelope {
            url_history: Some(vec![record(json!({"key": "a"}))]),
            websocket_url_history: Some(vec![record(json!({"key": "b"}))]),
            auth_data: Some(vec![record(json!({"key": "c"}))]),
            host_rules: Some(vec![record(json!({"key": "d"}))]),
            client_certificates: Some(vec![record(json!({"key": "e"}))]),
            ..Default::default()
        };
        let json = envelope.to_json().unwrap();
        assert!(json.contains("\"url-history\""));
        assert!(json.contains("\"websocket-url-history\""));
        assert!(json.contains("\"auth-data\""));
        assert!(json.contains("\"host-rules\""));
        assert!(json.contains("\"client-certificates\""));
    }

    #[test]
    fn test_single_request_detection() {
        let mut envelope = ExportEnvelope {
            requests: Some(vec![record(json!({"url": "https://api.test"}))]),
            ..Default::default()
        };
        assert!(envelope.is_single_request());

        envelope.projects = Some(vec![]);
        assert!(!envelope.is_single_request());

        envelope.projects = None;
        envelope.requests = Some(vec![]);
        assert!(!envelope.is_single_request());
    }

    #[test]
    fn test_round_trip_deserialization() {
        let envelope = ExportEnvelope {
            created_at: "2023-01-01T00:00:00Z".to_string(),
            version: "1.0.0".to_string(),
            kind: kinds::ALL_DATA_EXPORT.to_string(),
            load_to_workspace: Some(true),
            requests: Some(vec![record(json!({"key": "r1", "url": "x"}))]),
            ..Default::default()
        };
        let json = envelope.to_json().unwrap();
        let parsed: ExportEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, envelope);
    }
}
