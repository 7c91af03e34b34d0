//! Explainability Engine: additive per-feature attributions.

pub mod domain;
pub mod service;

pub use domain::{Attribution, FeatureContribution};
pub use service::{explain, explain_model};
