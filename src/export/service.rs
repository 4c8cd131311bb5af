//! Export orchestration.
//!
//! [`DataExporter`] ties the pipeline together: it gathers records per the
//! caller's selection, builds the canonical envelope, optionally encrypts
//! the serialized payload and hands it to the named destination writer.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::config::ExportConfig;
use crate::crypto::{AES_METHOD, Encryption, seal};
use crate::destination::{DestinationWriter, ProviderOptions, WriteResult};
use crate::export::certificates::{CertificateLinker, pair_certificates};
use crate::export::processor::{ExportOptions, ExportProcessor};
use crate::models::{CertificatePair, DataKind, DataSource, ExportData, ExportSelection, Record};
use crate::store::{CollectionStore, CookieStore, collections, read_all};
use crate::{Error, Result};

/// Options for one export operation.
#[derive(Debug, Clone, Default)]
pub struct ArcExportOptions {
    /// Destination writer name.
    pub provider: String,
    /// File name at the destination.
    pub file: String,
    /// Encrypt the payload before writing.
    pub encrypt: bool,
    /// Passphrase for encryption. Required when `encrypt` is set.
    pub passphrase: Option<String>,
    /// Envelope kind override.
    pub kind: Option<String>,
    /// Mark the envelope for direct workspace load.
    pub skip_import: bool,
    /// Options passed through to the destination writer.
    pub provider_options: ProviderOptions,
}

impl ArcExportOptions {
    /// Creates options for the given destination and file name.
    #[must_use]
    pub fn new(provider: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            file: file.into(),
            ..Default::default()
        }
    }

    /// Requests payload encryption with the given passphrase.
    #[must_use]
    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.encrypt = true;
        self.passphrase = Some(passphrase.into());
        self
    }

    /// Overrides the envelope kind.
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

    /// Sets provider options.
    #[must_use]
    pub fn with_provider_options(mut self, options: ProviderOptions) -> Self {
        self.provider_options = options;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.provider.is_empty() {
            return Err(Error::InvalidInput(
                "export destination is not set".to_string(),
            ));
        }
        if self.file.is_empty() {
            return Err(Error::InvalidInput("file name is not set".to_string()));
        }
        if self.encrypt && self.passphrase.is_none() {
            return Err(Error::InvalidInput(
                "passphrase is required to encrypt the export".to_string(),
            ));
        }
        Ok(())
    }
}

/// A full export request: what to export and where it goes.
#[derive(Debug, Clone, Default)]
pub struct DataExportRequest {
    /// Per-kind selection of data to export.
    pub selection: ExportSelection,
    /// Destination, file and encryption options.
    pub options: ArcExportOptions,
}

impl DataExportRequest {
    /// Creates a request.
    #[must_use]
    pub fn new(selection: ExportSelection, options: ArcExportOptions) -> Self {
        Self { selection, options }
    }
}

/// An already-assembled payload for a raw export.
#[derive(Debug, Clone)]
pub enum ExportPayload {
    /// Write the string verbatim.
    Text(String),
    /// Serialize the value to JSON.
    Json(Value),
}

impl ExportPayload {
    fn into_content(self) -> Result<String> {
        match self {
            Self::Text(text) => Ok(text),
            Self::Json(value) => {
                serde_json::to_string(&value).map_err(|e| Error::OperationFailed {
                    operation: "serialize_payload".to_string(),
                    cause: e.to_string(),
                })
            }
        }
    }
}

/// The export pipeline facade.
///
/// Collaborators are injected: a [`CollectionStore`] for reads, an optional
/// [`CookieStore`] for hosts with a native cookie jar, an optional
/// [`Encryption`] implementation, and named [`DestinationWriter`]s.
pub struct DataExporter<S> {
    config: ExportConfig,
    store: Arc<S>,
    cookie_store: Option<Arc<dyn CookieStore>>,
    encryption: Option<Arc<dyn Encryption>>,
    destinations: HashMap<String, Arc<dyn DestinationWriter>>,
}

impl<S: CollectionStore> DataExporter<S> {
    /// Creates an exporter over the given store.
    #[must_use]
    pub fn new(config: ExportConfig, store: Arc<S>) -> Self {
        Self {
            config,
            store,
            cookie_store: None,
            encryption: None,
            destinations: HashMap::new(),
        }
    }

    /// Registers the host's native cookie store.
    #[must_use]
    pub fn with_cookie_store(mut self, cookies: Arc<dyn CookieStore>) -> Self {
        self.cookie_store = Some(cookies);
        self
    }

    /// Registers the encryption collaborator.
    #[must_use]
    pub fn with_encryption(mut self, encryption: Arc<dyn Encryption>) -> Self {
        self.encryption = Some(encryption);
        self
    }

    /// Registers a destination writer under a name.
    #[must_use]
    pub fn with_destination(
        mut self,
        name: impl Into<String>,
        writer: Arc<dyn DestinationWriter>,
    ) -> Self {
        self.destinations.insert(name.into(), writer);
        self
    }

    /// Exports a pre-assembled payload without envelope processing.
    ///
    /// # Errors
    ///
    /// Fails on invalid options, on encryption errors and on destination
    /// write errors.
    pub async fn export_data(
        &self,
        payload: ExportPayload,
        options: &ArcExportOptions,
    ) -> Result<WriteResult> {
        options.validate()?;
        let content = payload.into_content()?;
        self.finish(content, options).await
    }

    /// Gathers the selected data, builds the canonical envelope and writes
    /// it to the named destination.
    ///
    /// # Errors
    ///
    /// Fails on invalid options, on serialization or encryption errors and
    /// on destination write errors. Individual collection read failures do
    /// not abort the export; the affected kind is exported with whatever
    /// was gathered.
    pub async fn arc_export(&self, request: DataExportRequest) -> Result<WriteResult> {
        request.options.validate()?;
        let data = self.gather(&request.selection).await;

        let processor = ExportProcessor::new(self.config.native_cookies);
        let process_options = ExportOptions {
            app_version: self.config.app_version.clone(),
            kind: request.options.kind.clone(),
            skip_import: request.options.skip_import,
        };
        let envelope = processor.create_export_object(data, &process_options);
        tracing::info!(
            kind = %envelope.kind,
            destination = %request.options.provider,
            "built export envelope"
        );
        self.finish(envelope.to_json()?, &request.options).await
    }

    async fn gather(&self, selection: &ExportSelection) -> ExportData {
        let mut data = ExportData::new();
        let page = self.config.page_size;

        for (kind, source) in selection.iter() {
            match source {
                DataSource::Listed(records) => {
                    if kind == DataKind::Saved {
                        // Listed saved requests go into the manual bucket,
                        // ordered after store-fetched ones.
                        data.saved = Some(records.clone());
                    } else {
                        assign_bucket(&mut data, kind, records.clone());
                    }
                }
                DataSource::Store => match kind {
                    DataKind::Cookies if self.config.native_cookies => {
                        let cookies = match &self.cookie_store {
                            Some(store) => store.list_all().await.unwrap_or_default(),
                            None => Vec::new(),
                        };
                        data.cookies = Some(cookies);
                    }
                    DataKind::ClientCertificates => {
                        let indexes =
                            read_all(&*self.store, collections::CLIENT_CERTIFICATES, page).await;
                        let payloads =
                            read_all(&*self.store, collections::CLIENT_CERTIFICATES_DATA, page)
                                .await;
                        data.client_certificates = Some(pair_certificates(indexes, payloads));
                    }
                    _ => {
                        let records =
                            read_all(&*self.store, kind.collection_name(), page).await;
                        assign_bucket(&mut data, kind, records);
                    }
                },
            }
        }

        // Saved requests carry project references; pull the projects along
        // unless the caller selected them explicitly.
        if (data.requests.is_some() || data.saved.is_some()) && data.projects.is_none() {
            data.projects =
                Some(read_all(&*self.store, collections::LEGACY_PROJECTS, page).await);
        }

        self.link_certificates(&mut data).await;

        data
    }

    /// Runs the certificate linker over every exported request batch,
    /// seeded with whatever the selection already gathered, so the file is
    /// self-contained and never points at missing certificate material.
    async fn link_certificates(&self, data: &mut ExportData) {
        let seeded = data.client_certificates.take().unwrap_or_default();
        let mut linker = CertificateLinker::with_pairs(&*self.store, seeded);
        if let Some(requests) = data.requests.as_mut() {
            linker.collect(requests).await;
        }
        if let Some(saved) = data.saved.as_mut() {
            linker.collect(saved).await;
        }
        if let Some(history) = data.history.as_mut() {
            linker.collect(history).await;
        }
        if !linker.is_empty() {
            data.client_certificates = Some(linker.into_pairs());
        }
    }

    /// Applies encryption when requested and dispatches to the writer.
    async fn finish(&self, content: String, options: &ArcExportOptions) -> Result<WriteResult> {
        let content = if options.encrypt {
            let passphrase = options
                .passphrase
                .as_deref()
                .ok_or_else(|| Error::InvalidInput("passphrase is not set".to_string()))?;
            let encryption = self
                .encryption
                .as_ref()
                .ok_or_else(|| Error::FeatureNotEnabled("encryption".to_string()))?;
            let cipher = encryption.encrypt(&content, passphrase, AES_METHOD).await?;
            seal(&cipher)
        } else {
            content
        };

        let writer = self
            .destinations
            .get(&options.provider)
            .ok_or_else(|| Error::UnknownDestination(options.provider.clone()))?;
        writer
            .save(&content, &options.file, &options.provider_options)
            .await
    }
}

fn assign_bucket(data: &mut ExportData, kind: DataKind, records: Vec<Record>) {
    match kind {
        // Store-fetched saved requests; listed ones go to `data.saved`.
        DataKind::Saved => data.requests = Some(records),
        DataKind::History => data.history = Some(records),
        DataKind::Projects => data.projects = Some(records),
        DataKind::Websocket => data.websocket_url_history = Some(records),
        DataKind::UrlHistory => data.url_history = Some(records),
        DataKind::Variables => data.variables = Some(records),
        DataKind::AuthData => data.auth_data = Some(records),
        DataKind::Cookies => data.cookies = Some(records),
        DataKind::HostRules => data.host_rules = Some(records),
        // Listed certificates come as merged records; the material splits
        // back into the payload side of the pair.
        DataKind::ClientCertificates => {
            data.client_certificates =
                Some(records.into_iter().map(split_certificate_record).collect());
        }
    }
}

/// Splits a merged certificate record into its (index, payload) pair. The
/// `cert` and `pKey` fields move to the payload, where the private key
/// lives under `key`.
fn split_certificate_record(mut index: Record) -> CertificatePair {
    let mut data = Record::new();
    if let Some(cert) = index.remove("cert") {
        data.insert("cert".to_string(), cert);
    }
    if let Some(p_key) = index.remove("pKey") {
        data.insert("key".to_string(), p_key);
    }
    CertificatePair::new(index, data)
}
