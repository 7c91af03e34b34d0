//! Gradient-boosted regression trees (squared loss).
//!
//! With squared loss the gradient of row `i` is `pred_i − y_i` and the hessian
//! is 1, so the XGBoost split gain reduces to
//!
//! ```text
//! gain = ½ [ G_L²/(n_L + λ) + G_R²/(n_R + λ) − G²/(n + λ) ]
//! ```
//!
//! over residual sums `G`. Every node stores its cover (row count) and the
//! cover-weighted mean of the leaves below it, which is what path attribution
//! needs at explain time.

use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::error::{RealtyError, RealtyResult};
use crate::training::domain::{BoostingParams, ModelKind};

use super::Regressor;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    /// Rows with `x[feature] <= threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        cover: f64,
        value: f64,
    },
    Leaf {
        value: f64,
        cover: f64,
    },
}

impl TreeNode {
    /// Leaf output, or expected output below an internal node.
    pub fn value(&self) -> f64 {
        match self {
            TreeNode::Split { value, .. } | TreeNode::Leaf { value, .. } => *value,
        }
    }

    pub fn cover(&self) -> f64 {
        match self {
            TreeNode::Split { cover, .. } | TreeNode::Leaf { cover, .. } => *cover,
        }
    }
}

/// One regression tree; node 0 is the root.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    pub fn predict(&self, features: &[f64]) -> f64 {
        self.leaf_value(|f| features[f])
    }

    fn leaf_value(&self, feature: impl Fn(usize) -> f64) -> f64 {
        let mut node = 0;
        loop {
            match &self.nodes[node] {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature: f,
                    threshold,
                    left,
                    right,
                    ..
                } => node = if feature(*f) <= *threshold { *left } else { *right },
            }
        }
    }

    /// Credit `E[child] − E[node]` along the decision path to the split feature.
    fn accumulate_path(&self, features: &[f64], out: &mut [f64]) {
        let mut node = 0;
        while let TreeNode::Split {
            feature,
            threshold,
            left,
            right,
            value,
            ..
        } = &self.nodes[node]
        {
            let next = if features[*feature] <= *threshold { *left } else { *right };
            out[*feature] += self.nodes[next].value() - value;
            node = next;
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], idx: usize) -> usize {
            match &nodes[idx] {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

/// Additive tree ensemble on top of a constant base score.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GbdtModel {
    pub base_score: f64,
    pub n_features: usize,
    pub trees: Vec<RegressionTree>,
}

impl GbdtModel {
    pub fn fit(
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        params: &BoostingParams,
        seed: u64,
    ) -> RealtyResult<Self> {
        let (n, n_features) = x.dim();
        if n == 0 || y.len() != n {
            return Err(RealtyError::InsufficientData {
                required: 1,
                actual: n.min(y.len()),
            });
        }
        let base_score = y.sum() / n as f64;

        let mut predictions = Array1::from_elem(n, base_score);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut trees = Vec::with_capacity(params.n_rounds);

        for round in 0..params.n_rounds {
            let residuals = &y - &predictions;

            let mut sample: Vec<usize> = (0..n).collect();
            if params.subsample < 1.0 {
                let keep = ((n as f64 * params.subsample).round() as usize).max(1);
                sample.shuffle(&mut rng);
                sample.truncate(keep);
                sample.sort_unstable();
            }

            let tree = TreeGrower::new(x.view(), residuals.view(), params).grow(sample);
            for (pred, row) in predictions.iter_mut().zip(x.rows()) {
                *pred += tree.leaf_value(|f| row[f]);
            }
            if round % 50 == 0 {
                debug!(round, nodes = tree.nodes.len(), "boosting round");
            }
            trees.push(tree);
        }

        Ok(Self {
            base_score,
            n_features,
            trees,
        })
    }
}

impl Regressor for GbdtModel {
    fn kind(&self) -> ModelKind {
        ModelKind::GradientBoosting
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    /// Base score plus one parameter per node.
    fn n_parameters(&self) -> usize {
        1 + self.trees.iter().map(|t| t.nodes.len()).sum::<usize>()
    }

    fn predict_raw(&self, features: &[f64]) -> f64 {
        self.base_score + self.trees.iter().map(|t| t.predict(features)).sum::<f64>()
    }

    fn contributions(&self, features: &[f64]) -> (f64, Vec<f64>) {
        let mut contributions = vec![0.0; self.n_features];
        let mut baseline = self.base_score;
        for tree in &self.trees {
            baseline += tree.nodes[0].value();
            tree.accumulate_path(features, &mut contributions);
        }
        (baseline, contributions)
    }
}

#[derive(Copy, Clone, Debug)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct TreeGrower<'a> {
    x: ArrayView2<'a, f64>,
    residuals: ArrayView1<'a, f64>,
    params: &'a BoostingParams,
    nodes: Vec<TreeNode>,
}

impl<'a> TreeGrower<'a> {
    fn new(x: ArrayView2<'a, f64>, residuals: ArrayView1<'a, f64>, params: &'a BoostingParams) -> Self {
        Self {
            x,
            residuals,
            params,
            nodes: Vec::new(),
        }
    }

    fn grow(mut self, sample: Vec<usize>) -> RegressionTree {
        self.grow_node(sample, 0);
        RegressionTree { nodes: self.nodes }
    }

    fn grow_node(&mut self, indices: Vec<usize>, depth: usize) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(TreeNode::Leaf { value: 0.0, cover: 0.0 });

        let sum: f64 = indices.iter().map(|&i| self.residuals[i]).sum();
        let cover = indices.len() as f64;
        let splittable =
            depth < self.params.max_depth && indices.len() >= 2 * self.params.min_samples_leaf;

        match splittable.then(|| self.best_split(&indices, sum)).flatten() {
            None => {
                let value = self.params.learning_rate * sum / (cover + self.params.reg_lambda);
                self.nodes[idx] = TreeNode::Leaf { value, cover };
            }
            Some(split) => {
                let column = self.x.column(split.feature);
                let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
                    indices.into_iter().partition(|&i| column[i] <= split.threshold);
                let left = self.grow_node(left_rows, depth + 1);
                let right = self.grow_node(right_rows, depth + 1);
                let (l, r) = (&self.nodes[left], &self.nodes[right]);
                let value = (l.cover() * l.value() + r.cover() * r.value()) / (l.cover() + r.cover());
                self.nodes[idx] = TreeNode::Split {
                    feature: split.feature,
                    threshold: split.threshold,
                    left,
                    right,
                    cover,
                    value,
                };
            }
        }
        idx
    }

    /// Exact greedy search; ties go to the lower feature, then the lower threshold.
    fn best_split(&self, indices: &[usize], sum: f64) -> Option<SplitCandidate> {
        let n = indices.len();
        let lambda = self.params.reg_lambda;
        let min_leaf = self.params.min_samples_leaf;
        let parent_score = sum * sum / (n as f64 + lambda);
        let n_features = self.x.ncols();

        let per_feature: Vec<Option<SplitCandidate>> = (0..n_features)
            .into_par_iter()
            .map(|feature| {
                let column = self.x.column(feature);
                let mut sorted: Vec<(f64, f64)> =
                    indices.iter().map(|&i| (column[i], self.residuals[i])).collect();
                sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

                let mut best: Option<SplitCandidate> = None;
                let mut left_sum = 0.0;
                for k in 1..n {
                    left_sum += sorted[k - 1].1;
                    if k < min_leaf || n - k < min_leaf {
                        continue;
                    }
                    let (lo, hi) = (sorted[k - 1].0, sorted[k].0);
                    if lo >= hi {
                        continue;
                    }
                    let right_sum = sum - left_sum;
                    let gain = 0.5
                        * (left_sum * left_sum / (k as f64 + lambda)
                            + right_sum * right_sum / ((n - k) as f64 + lambda)
                            - parent_score);
                    if gain <= self.params.min_split_gain || gain <= 0.0 {
                        continue;
                    }
                    if best.map_or(true, |b| gain > b.gain) {
                        let mut threshold = lo + (hi - lo) / 2.0;
                        if threshold >= hi {
                            threshold = lo;
                        }
                        best = Some(SplitCandidate {
                            feature,
                            threshold,
                            gain,
                        });
                    }
                }
                best
            })
            .collect();

        per_feature
            .into_iter()
            .flatten()
            .fold(None, |acc: Option<SplitCandidate>, c| match acc {
                Some(b) if b.gain >= c.gain => Some(b),
                _ => Some(c),
            })
    }
}
