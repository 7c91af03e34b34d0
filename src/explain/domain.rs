//! Attribution types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Signed contribution of one feature column to a prediction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    /// Output column name, e.g. `area` or `neighborhood=B`.
    pub feature: String,
    /// Raw record field the column was derived from.
    pub field: String,
    pub value: f64,
}

/// Additive decomposition of one prediction: `baseline + Σ value`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    pub baseline: f64,
    /// One entry per feature column, in schema order.
    pub contributions: Vec<FeatureContribution>,
}

impl Attribution {
    /// Prediction reconstructed from the decomposition.
    pub fn total(&self) -> f64 {
        self.baseline + self.contributions.iter().map(|c| c.value).sum::<f64>()
    }

    pub fn get(&self, feature: &str) -> Option<f64> {
        self.contributions
            .iter()
            .find(|c| c.feature == feature)
            .map(|c| c.value)
    }

    /// Contributions summed per source field, so one-hot columns collapse
    /// back into their categorical field.
    pub fn by_field(&self) -> BTreeMap<String, f64> {
        let mut out = BTreeMap::new();
        for c in &self.contributions {
            *out.entry(c.field.clone()).or_insert(0.0) += c.value;
        }
        out
    }

    /// The `k` largest contributions by magnitude.
    pub fn top(&self, k: usize) -> Vec<&FeatureContribution> {
        let mut sorted: Vec<&FeatureContribution> = self.contributions.iter().collect();
        sorted.sort_by(|a, b| b.value.abs().total_cmp(&a.value.abs()));
        sorted.truncate(k);
        sorted
    }
}
