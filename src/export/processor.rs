//! Canonical export envelope construction.
//!
//! [`ExportProcessor`] converts a bag of typed record arrays into the
//! versioned export envelope. Every per-kind rule strips storage-internal
//! fields (`_id`, `_rev`), moves the store id into `key` and stamps the
//! record's kind discriminant. The processor works on owned records and
//! never errors: a missing or empty bucket simply produces no envelope
//! property.

use chrono::{SecondsFormat, Utc};
use serde_json::Value;

use crate::UNKNOWN_VERSION;
use crate::models::{CertificatePair, ExportData, ExportEnvelope, Record, kinds};

/// Options for one envelope build.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Exporting application version. Substituted with
    /// [`crate::UNKNOWN_VERSION`] when unset.
    pub app_version: Option<String>,
    /// Envelope kind. Defaults to [`kinds::ALL_DATA_EXPORT`].
    pub kind: Option<String>,
    /// Marks the envelope for direct workspace load instead of an import
    /// pass.
    pub skip_import: bool,
}

impl ExportOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the application version.
    #[must_use]
    pub fn with_app_version(mut self, version: impl Into<String>) -> Self {
        self.app_version = Some(version.into());
        self
    }

    /// Sets the envelope kind.
    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Requests skip-import semantics.
    #[must_use]
    pub const fn with_skip_import(mut self, skip: bool) -> Self {
        self.skip_import = skip;
        self
    }
}

/// Builds canonical export envelopes from record buckets.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportProcessor {
    /// Cookies come from the host's native store; their ids are
    /// caller-meaningful and must not be remapped.
    native_cookies: bool,
}

impl ExportProcessor {
    /// Creates a processor.
    #[must_use]
    pub const fn new(native_cookies: bool) -> Self {
        Self { native_cookies }
    }

    /// Creates the export envelope for the given buckets.
    ///
    /// The requests array concatenates store-fetched requests and manually
    /// listed ones, fetched first. Kinds with no records produce no
    /// envelope property.
    #[must_use]
    pub fn create_export_object(&self, data: ExportData, options: &ExportOptions) -> ExportEnvelope {
        let mut envelope = ExportEnvelope {
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            version: options
                .app_version
                .clone()
                .unwrap_or_else(|| UNKNOWN_VERSION.to_string()),
            kind: options
                .kind
                .clone()
                .unwrap_or_else(|| kinds::ALL_DATA_EXPORT.to_string()),
            load_to_workspace: options.skip_import.then_some(true),
            ..Default::default()
        };

        let mut requests = data.requests.unwrap_or_default();
        requests.extend(data.saved.unwrap_or_default());
        envelope.requests = non_empty(prepare_requests(requests));

        envelope.projects = non_empty(prepare_simple(
            data.projects.unwrap_or_default(),
            kinds::PROJECT_DATA,
        ));
        envelope.history = non_empty(prepare_simple(
            data.history.unwrap_or_default(),
            kinds::HISTORY_DATA,
        ));
        envelope.websocket_url_history = non_empty(prepare_simple(
            data.websocket_url_history.unwrap_or_default(),
            kinds::WEBSOCKET_HISTORY_DATA,
        ));
        envelope.url_history = non_empty(prepare_simple(
            data.url_history.unwrap_or_default(),
            kinds::URL_HISTORY_DATA,
        ));
        envelope.variables = non_empty(prepare_variables(data.variables.unwrap_or_default()));
        envelope.auth_data = non_empty(prepare_simple(
            data.auth_data.unwrap_or_default(),
            kinds::AUTH_DATA,
        ));
        envelope.cookies = non_empty(self.prepare_cookies(data.cookies.unwrap_or_default()));
        envelope.host_rules = non_empty(prepare_simple(
            data.host_rules.unwrap_or_default(),
            kinds::HOST_RULE,
        ));
        envelope.client_certificates = non_empty(prepare_certificates(
            data.client_certificates.unwrap_or_default(),
        ));

        envelope
    }

    fn prepare_cookies(&self, cookies: Vec<Record>) -> Vec<Record> {
        cookies
            .into_iter()
            .map(|mut item| {
                if !self.native_cookies {
                    remap_store_id(&mut item);
                }
                item.insert("kind".to_string(), Value::String(kinds::COOKIE.to_string()));
                item
            })
            .collect()
    }
}

/// Moves the store id into `key` and drops the revision marker.
fn remap_store_id(record: &mut Record) {
    if let Some(id) = record.remove("_id") {
        record.insert("key".to_string(), id);
    }
    record.remove("_rev");
}

fn set_kind(record: &mut Record, kind: &str) {
    record.insert("kind".to_string(), Value::String(kind.to_string()));
}

fn non_empty(records: Vec<Record>) -> Option<Vec<Record>> {
    (!records.is_empty()).then_some(records)
}

/// Applies the shared strip/assign rule for kinds with no extra policy.
fn prepare_simple(records: Vec<Record>, kind: &str) -> Vec<Record> {
    records
        .into_iter()
        .map(|mut item| {
            remap_store_id(&mut item);
            set_kind(&mut item, kind);
            item
        })
        .collect()
}

fn prepare_requests(requests: Vec<Record>) -> Vec<Record> {
    requests
        .into_iter()
        .map(|mut item| {
            migrate_legacy_project(&mut item);
            remap_store_id(&mut item);
            set_kind(&mut item, kinds::REQUEST_DATA);
            item
        })
        .collect()
}

/// Moves a single-project reference from the historical `legacyProject`
/// field into the `projects` array. The id is not appended twice when the
/// array already carries it.
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

/// Variables without an `environment` field are datastore view artifacts
/// and are dropped from the export.
fn prepare_variables(variables: Vec<Record>) -> Vec<Record> {
    variables
        .into_iter()
        .filter(|item| item.contains_key("environment"))
        .map(|mut item| {
            remap_store_id(&mut item);
            set_kind(&mut item, kinds::VARIABLE);
            item
        })
        .collect()
}

/// Merges each (index, payload) pair into one certificate record carrying
/// the index metadata plus `cert` and, when present, `pKey`.
fn prepare_certificates(pairs: Vec<CertificatePair>) -> Vec<Record> {
    pairs
        .into_iter()
        .map(|pair| {
            let CertificatePair { index, data } = pair;
            let mut item = index;
            remap_store_id(&mut item);
            set_kind(&mut item, kinds::CLIENT_CERTIFICATE);
            if let Some(cert) = data.get("cert") {
                item.insert("cert".to_string(), cert.clone());
            }
            if let Some(p_key) = data.get("key") {
                item.insert("pKey".to_string(), p_key.clone());
            }
            item
        })
        .collect()
}
