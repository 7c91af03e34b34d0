//! Metric computation for trained models.

use ndarray::{s, Array1, ArrayView1};

use crate::common::error::{RealtyError, RealtyResult};
use crate::data::domain::Dataset;
use crate::features::service::build_matrix;
use crate::training::domain::ModelArtifact;
use crate::training::models::{Model, Regressor};

use super::domain::RegressionMetrics;

/// RMSE, MAE and R² of `predictions` against `targets`.
///
/// R² is reported as 0 when the targets have no variance.
pub fn regression_metrics(predictions: ArrayView1<'_, f64>, targets: ArrayView1<'_, f64>) -> RegressionMetrics {
    let n = predictions.len().min(targets.len());
    if n == 0 {
        return RegressionMetrics::default();
    }
    let (predictions, targets) = (predictions.slice(s![..n]), targets.slice(s![..n]));

    let mean = targets.sum() / n as f64;
    let residuals = &predictions - &targets;
    let sq = residuals.dot(&residuals);
    let abs = residuals.mapv(f64::abs).sum();
    let total = targets.mapv(|y| (y - mean) * (y - mean)).sum();

    RegressionMetrics {
        rmse: (sq / n as f64).sqrt(),
        mae: abs / n as f64,
        r2: if total > 0.0 { 1.0 - sq / total } else { 0.0 },
    }
}

/// `level` quantile (nearest rank) of absolute residuals.
pub fn residual_quantile(predictions: ArrayView1<'_, f64>, targets: ArrayView1<'_, f64>, level: f64) -> f64 {
    let mut residuals: Vec<f64> = predictions
        .iter()
        .zip(targets)
        .map(|(p, y)| (p - y).abs())
        .collect();
    if residuals.is_empty() {
        return 0.0;
    }
    residuals.sort_by(f64::total_cmp);
    let rank = (level.clamp(0.0, 1.0) * residuals.len() as f64).ceil() as usize;
    residuals[rank.clamp(1, residuals.len()) - 1]
}

/// Score a registered artifact on a labelled holdout dataset.
pub fn evaluate_artifact(artifact: &ModelArtifact, dataset: &Dataset) -> RealtyResult<RegressionMetrics> {
    if dataset.is_empty() {
        return Err(RealtyError::InsufficientData {
            required: 1,
            actual: 0,
        });
    }
    let model = Model::deserialize(artifact.model_kind, &artifact.serialized_parameters)?;
    let rows = build_matrix(&dataset.records, &artifact.schema)?;
    let predictions: Array1<f64> = rows.iter().map(|r| model.predict_raw(r.as_slice())).collect();
    let targets = Array1::from(dataset.targets()?);
    Ok(regression_metrics(predictions.view(), targets.view()))
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    use super::*;

    #[test]
    fn perfect_predictions() {
        let y = array![1.0, 2.0, 3.0];
        let m = regression_metrics(y.view(), y.view());
        assert_eq!(m.rmse, 0.0);
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.r2, 1.0);
    }

    #[test]
    fn known_errors() {
        let m = regression_metrics(array![2.0, 2.0, 2.0, 2.0].view(), array![1.0, 3.0, 1.0, 3.0].view());
        assert_abs_diff_eq!(m.rmse, 1.0);
        assert_abs_diff_eq!(m.mae, 1.0);
        assert_abs_diff_eq!(m.r2, 0.0);
    }

    #[test]
    fn constant_targets_have_zero_r2() {
        let m = regression_metrics(array![1.0, 2.0].view(), array![5.0, 5.0].view());
        assert_eq!(m.r2, 0.0);
    }

    #[test]
    fn residual_quantile_nearest_rank() {
        let preds = Array1::<f64>::zeros(10);
        let targets = Array1::range(1.0, 11.0, 1.0);
        assert_eq!(residual_quantile(preds.view(), targets.view(), 0.9), 9.0);
        assert_eq!(residual_quantile(preds.view(), targets.view(), 1.0), 10.0);
        assert_eq!(residual_quantile(preds.view(), targets.view(), 0.0), 1.0);
        let empty = Array1::<f64>::zeros(0);
        assert_eq!(residual_quantile(empty.view(), empty.view(), 0.9), 0.0);
    }
}
