//! Metric containers shared by training and offline scoring.

use serde::{Deserialize, Serialize};

/// Point-estimate quality on a labelled set.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
}

/// Validation metrics recorded on an artifact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
    pub train_rows: usize,
    pub validation_rows: usize,
    /// Coverage target of the residual interval, e.g. `0.9`.
    pub interval_level: f64,
    /// Quantile of absolute validation residuals at `interval_level`.
    pub interval_half_width: f64,
}

impl TrainingMetrics {
    pub fn regression(&self) -> RegressionMetrics {
        RegressionMetrics {
            rmse: self.rmse,
            mae: self.mae,
            r2: self.r2,
        }
    }
}
