//! # arcdata
//!
//! Export and import pipeline for REST client data stores.
//!
//! The crate reads records from a set of document-store collections
//! (requests, history, projects, variables, cookies, auth data, host rules,
//! client certificates), reshapes them into a versioned export envelope,
//! optionally encrypts the payload and hands it to a named destination
//! writer. The import path accepts envelopes in several historical formats
//! and normalizes all of them into the current schema before insertion back
//! into the store.
//!
//! ## Architecture
//!
//! - [`export::ExportProcessor`] — pure data-shape transformation from typed
//!   record buckets into the canonical envelope
//! - [`export::DataExporter`] — orchestrator: gathers records, links client
//!   certificates, encrypts and dispatches to a destination
//! - [`import::DataImporter`] — format detection and normalization of
//!   historical export files
//! - [`import::transformers::ImportTransformer`] — the closed set of legacy
//!   schema transformers
//!
//! The storage layer, cookie provider, encryption routine and destination
//! writers are injected collaborators; see [`store`], [`crypto`] and
//! [`destination`] for the boundary traits.
//!
//! ## Example
//!
//! ```rust,ignore
//! use arcdata::{
//!     ArcExportOptions, DataExportRequest, DataExporter, DataKind, ExportConfig, ExportSelection,
//! };
//!
//! let exporter = DataExporter::new(ExportConfig::default(), store)
//!     .with_destination("file", writer);
//! let selection = ExportSelection::new()
//!     .from_store(DataKind::Saved)
//!     .from_store(DataKind::History);
//! let request = DataExportRequest::new(selection, ArcExportOptions::new("file", "backup.json"));
//! let result = exporter.arc_export(request).await?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod crypto;
pub mod destination;
pub mod export;
pub mod import;
pub mod models;
pub mod store;

// Re-exports for convenience
pub use config::ExportConfig;
pub use destination::{DestinationWriter, FileSystemWriter, ProviderOptions, WriteResult};
pub use export::{
    ArcExportOptions, DataExportRequest, DataExporter, ExportOptions, ExportPayload,
    ExportProcessor,
};
pub use import::{DataImporter, ImportOutcome, ImportReport, transformers::ImportTransformer};
pub use models::{
    CertificatePair, DataKind, DataSource, ExportData, ExportEnvelope, ExportSelection, Record,
};
pub use store::{CollectionStore, CookieStore, MemoryCookieStore, MemoryStore};

/// Error type for arcdata operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Missing required options, malformed JSON, bad timestamps |
/// | `OperationFailed` | Store reads/writes fail, serialization fails, IO errors |
/// | `UnknownDestination` | No writer registered under the requested name |
/// | `ContentNotRecognized` | No import transformer matches the parsed content |
/// | `FeatureNotEnabled` | Using features requiring compile-time flags |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - Required export options are missing (provider, file name)
    /// - An encryption passphrase is missing while `encrypt` is requested
    /// - Import content is not valid JSON
    /// - A legacy record carries a timestamp that cannot be interpreted
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - A store write fails during import
    /// - Envelope serialization fails
    /// - A destination writer reports an IO error
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// No destination writer is registered under the given name.
    #[error("unknown destination {0}")]
    UnknownDestination(String),

    /// The import content does not match any known format.
    #[error("file not recognized")]
    ContentNotRecognized,

    /// Feature not enabled (requires feature flag).
    ///
    /// Raised when the AES encryption collaborator is requested without the
    /// `encryption` cargo feature compiled in.
    #[error("feature not enabled: {0} (compile with --features {0})")]
    FeatureNotEnabled(String),
}

/// Result type alias for arcdata operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Version string substituted when the hosting application does not report one.
pub const UNKNOWN_VERSION: &str = "Unknown version";

/// Content type attached to export payloads when the caller does not set one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/restclient+data";
