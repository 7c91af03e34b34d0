//! Ridge regression baseline.
//!
//! Features are standardized before solving `(ZᵀZ + λI) w = Zᵀ(y − ȳ)` by
//! Cholesky factorisation; weights are mapped back to raw feature units so
//! inference needs no scaling step. Constant columns get a zero weight.

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::common::error::{RealtyError, RealtyResult};
use crate::training::domain::{LinearParams, ModelKind};

use super::Regressor;

const JITTER: f64 = 1e-9;

/// Fitted linear model in raw feature units.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub weights: Vec<f64>,
    pub bias: f64,
    /// Training means, the background point for attributions.
    pub feature_means: Vec<f64>,
}

impl LinearModel {
    pub fn fit(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>, params: &LinearParams) -> RealtyResult<Self> {
        let n = x.nrows();
        if n == 0 || y.len() != n {
            return Err(RealtyError::InsufficientData {
                required: 1,
                actual: n.min(y.len()),
            });
        }

        let means = x
            .mean_axis(Axis(0))
            .ok_or_else(|| RealtyError::internal("empty design matrix"))?;
        let scale = x.std_axis(Axis(0), 0.0).mapv(|s| if s > 0.0 { 1.0 / s } else { 0.0 });
        let y_mean = y.sum() / n as f64;

        // Normal equations on standardized columns.
        let z = (&x - &means) * &scale;
        let yc = &y - y_mean;
        let mut gram = z.t().dot(&z);
        gram.diag_mut().map_inplace(|d| *d += params.l2 + JITTER);
        let rhs = z.t().dot(&yc);

        let solved =
            solve_spd(&gram, &rhs).ok_or_else(|| RealtyError::internal("ridge system is not positive definite"))?;

        let weights = solved * &scale;
        let bias = y_mean - weights.dot(&means);

        Ok(Self {
            weights: weights.to_vec(),
            bias,
            feature_means: means.to_vec(),
        })
    }
}

impl Regressor for LinearModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Linear
    }

    fn n_features(&self) -> usize {
        self.weights.len()
    }

    fn n_parameters(&self) -> usize {
        self.weights.len() + 1
    }

    fn predict_raw(&self, features: &[f64]) -> f64 {
        self.bias + self.weights.iter().zip(features).map(|(w, x)| w * x).sum::<f64>()
    }

    /// `c_j = w_j (x_j − mean_j)` against the baseline `bias + Σ w_j mean_j`.
    fn contributions(&self, features: &[f64]) -> (f64, Vec<f64>) {
        let baseline =
            self.bias + self.weights.iter().zip(&self.feature_means).map(|(w, m)| w * m).sum::<f64>();
        let contributions = self
            .weights
            .iter()
            .zip(&self.feature_means)
            .zip(features)
            .map(|((w, m), x)| w * (x - m))
            .collect();
        (baseline, contributions)
    }
}

/// Solve `A x = b` for symmetric positive definite `A`.
fn solve_spd(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let p = a.nrows();
    let mut l = Array2::<f64>::zeros((p, p));
    for i in 0..p {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return None;
                }
                l[[i, i]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }

    // L y = b
    let mut y = Array1::<f64>::zeros(p);
    for i in 0..p {
        let sum = b[i] - l.slice(s![i, ..i]).dot(&y.slice(s![..i]));
        y[i] = sum / l[[i, i]];
    }
    // Lᵀ x = y
    let mut x = Array1::<f64>::zeros(p);
    for i in (0..p).rev() {
        let sum = y[i] - l.slice(s![i + 1.., i]).dot(&x.slice(s![i + 1..]));
        x[i] = sum / l[[i, i]];
    }
    Some(x)
}
