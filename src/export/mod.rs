//! Export direction: canonical envelope construction and orchestration.

pub mod certificates;
pub mod processor;
pub mod service;

pub use certificates::{CertificateLinker, pair_certificates};
pub use processor::{ExportOptions, ExportProcessor};
pub use service::{ArcExportOptions, DataExporter, DataExportRequest, ExportPayload};
