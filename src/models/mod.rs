//! Data model: canonical envelope, record buckets and export selections.

pub mod envelope;
pub mod selection;

pub use envelope::{CertificatePair, ExportData, ExportEnvelope, Record, kinds};
pub use selection::{DataKind, DataSource, ExportSelection};
