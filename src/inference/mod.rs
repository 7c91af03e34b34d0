//! Inference domain providing single and batch prediction over a shared
//! artifact cache.

pub mod domain;
pub mod service;

pub use domain::{ArtifactSelector, ConfidenceInterval, PredictRequest, PredictionResult};
pub use service::{InferenceService, LoadedArtifact};
