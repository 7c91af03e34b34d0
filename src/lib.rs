//! Price-estimation core for residential property.
//!
//! Raw records flow through the feature builder into the trainer, which
//! registers a versioned artifact; the inference service loads artifacts
//! back and serves predictions with additive attributions.

pub mod api;
pub mod common;
pub mod data;
pub mod evaluation;
pub mod explain;
pub mod features;
pub mod inference;
pub mod training;

pub use common::{AppCfg, RealtyCode, RealtyError, RealtyResult};
pub use data::{Dataset, FieldValue, PropertyRecord, RecordSchema};
pub use explain::{explain, Attribution};
pub use features::{build, derive_schema, FeatureSchema, FeatureVector};
pub use inference::{ArtifactSelector, InferenceService, PredictionResult};
pub use training::{
    train, train_and_register, ArtifactId, ArtifactRegistry, FsArtifactRegistry, MemoryArtifactRegistry,
    ModelArtifact, ModelKind, TrainConfig,
};
