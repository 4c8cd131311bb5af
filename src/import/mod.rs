//! Import direction: content recognition, normalization and store writes.
//!
//! Import is a three-step pipeline. [`detect`] turns raw file content into
//! the canonical envelope via the matching [`transformers::ImportTransformer`],
//! [`service::DataImporter`] drives the pipeline and writes normalized
//! records back into the datastore.

pub mod detect;
pub mod service;
pub mod transformers;

pub use service::{DataImporter, ImportOutcome, ImportReport};
pub use transformers::ImportTransformer;
