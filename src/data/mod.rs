//! Data domain: raw property records, validation and dataset ingest.

pub mod domain;
pub mod service;

pub use domain::{Dataset, DatasetId, FieldDecl, FieldKind, FieldValue, PropertyRecord, RecordSchema};
pub use service::{from_records, load_csv};
