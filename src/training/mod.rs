//! Training domain responsible for model fitting, selection and versioning.

pub mod domain;
pub mod models;
pub mod registry;
pub mod repo_fs;
pub mod service;

pub use domain::{
    ArtifactId, ArtifactRegistry, BoostingParams, CandidateReport, LinearParams, ModelArtifact, ModelKind,
    TrainConfig,
};
pub use models::{Model, Regressor};
pub use registry::MemoryArtifactRegistry;
pub use repo_fs::FsArtifactRegistry;
pub use service::{predict_raw, select_champion, train, train_and_register, train_dataset};
