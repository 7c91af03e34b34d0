//! Estimator families behind one capability interface.
//!
//! [`Model`] is the closed set of variants the trainer can produce; everything
//! downstream (registry, explainability, inference) goes through it.

pub mod gbdt;
pub mod linear;

use ndarray::{ArrayView1, ArrayView2};

use crate::common::error::RealtyResult;
use crate::training::domain::{ModelKind, TrainConfig};

pub use gbdt::{GbdtModel, RegressionTree, TreeNode};
pub use linear::LinearModel;

/// Shared behaviour of fitted regressors.
pub trait Regressor {
    fn kind(&self) -> ModelKind;

    /// Width of the feature vectors the model was fitted on.
    fn n_features(&self) -> usize;

    /// Complexity measure used to break validation ties.
    fn n_parameters(&self) -> usize;

    fn predict_raw(&self, features: &[f64]) -> f64;

    /// Baseline and per-column contributions; `baseline + Σ contributions`
    /// equals [`Regressor::predict_raw`] up to float rounding.
    fn contributions(&self, features: &[f64]) -> (f64, Vec<f64>);
}

#[derive(Clone, Debug, PartialEq)]
pub enum Model {
    Linear(LinearModel),
    GradientBoosting(GbdtModel),
}

impl Model {
    /// Fit `kind` on the design matrix `x` (one row per listing) and targets `y`.
    pub fn fit(
        kind: ModelKind,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        cfg: &TrainConfig,
    ) -> RealtyResult<Self> {
        match kind {
            ModelKind::Linear => LinearModel::fit(x, y, &cfg.linear).map(Model::Linear),
            ModelKind::GradientBoosting => GbdtModel::fit(x, y, &cfg.boosting, cfg.seed).map(Model::GradientBoosting),
        }
    }

    /// JSON encoding of the parameters; the kind is stored next to it.
    pub fn serialize(&self) -> RealtyResult<String> {
        Ok(match self {
            Model::Linear(m) => serde_json::to_string(m)?,
            Model::GradientBoosting(m) => serde_json::to_string(m)?,
        })
    }

    pub fn deserialize(kind: ModelKind, raw: &str) -> RealtyResult<Self> {
        Ok(match kind {
            ModelKind::Linear => Model::Linear(serde_json::from_str(raw)?),
            ModelKind::GradientBoosting => Model::GradientBoosting(serde_json::from_str(raw)?),
        })
    }

    fn inner(&self) -> &dyn Regressor {
        match self {
            Model::Linear(m) => m,
            Model::GradientBoosting(m) => m,
        }
    }
}

impl Regressor for Model {
    fn kind(&self) -> ModelKind {
        self.inner().kind()
    }

    fn n_features(&self) -> usize {
        self.inner().n_features()
    }

    fn n_parameters(&self) -> usize {
        self.inner().n_parameters()
    }

    fn predict_raw(&self, features: &[f64]) -> f64 {
        self.inner().predict_raw(features)
    }

    fn contributions(&self, features: &[f64]) -> (f64, Vec<f64>) {
        self.inner().contributions(features)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{array, Array1, Array2};

    use super::*;

    #[test]
    fn serialization_preserves_predictions() {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| if j == 0 { i as f64 * 0.37 } else { (i % 5) as f64 });
        let y: Array1<f64> = x.rows().into_iter().map(|r| 1.5 * r[0] + r[1] * r[1]).collect();
        let mut cfg = TrainConfig::default();
        cfg.boosting.n_rounds = 20;
        cfg.boosting.min_samples_leaf = 2;

        for kind in [ModelKind::Linear, ModelKind::GradientBoosting] {
            let model = Model::fit(kind, x.view(), y.view(), &cfg).unwrap();
            assert_eq!(model.kind(), kind);
            let raw = model.serialize().unwrap();
            let back = Model::deserialize(kind, &raw).unwrap();
            assert_eq!(back, model);
            assert_eq!(back.predict_raw(&[3.3, 2.0]).to_bits(), model.predict_raw(&[3.3, 2.0]).to_bits());
        }
    }

    #[test]
    fn deserialize_with_wrong_kind_fails() {
        let x = array![[1.0], [2.0]];
        let y = array![1.0, 2.0];
        let model = Model::fit(ModelKind::Linear, x.view(), y.view(), &TrainConfig::default()).unwrap();
        let raw = model.serialize().unwrap();
        assert!(Model::deserialize(ModelKind::GradientBoosting, &raw).is_err());
    }
}
