//! Evaluation: regression metrics and offline scoring of artifacts.

pub mod domain;
pub mod service;

pub use domain::{RegressionMetrics, TrainingMetrics};
pub use service::{evaluate_artifact, regression_metrics, residual_quantile};
