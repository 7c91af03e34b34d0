//! Domain types for model training and versioning.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::error::{RealtyError, RealtyResult};
use crate::common::ids;
use crate::data::domain::DatasetId;
use crate::evaluation::domain::TrainingMetrics;
use crate::features::domain::{FeatureSchema, UnseenCategoryPolicy};

/// Unique identifier of a trained artifact.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(String);

impl ArtifactId {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self(value.into())
    }

    /// Fresh id for a new training run.
    pub fn generate() -> Self {
        Self(ids::new_artifact_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Supported estimator families.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Linear,
    GradientBoosting,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Linear => "linear",
            ModelKind::GradientBoosting => "gradient_boosting",
        }
    }
}

/// Ridge parameters for the linear baseline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinearParams {
    /// L2 penalty applied to standardized weights.
    pub l2: f64,
}

impl Default for LinearParams {
    fn default() -> Self {
        Self { l2: 1.0 }
    }
}

/// Gradient-boosted tree parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BoostingParams {
    pub n_rounds: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub reg_lambda: f64,
    pub min_split_gain: f64,
    /// Row fraction sampled per round; 1.0 disables sampling.
    pub subsample: f64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_rounds: 150,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 5,
            reg_lambda: 1.0,
            min_split_gain: 0.0,
            subsample: 1.0,
        }
    }
}

/// Training configuration with enumerated, validated options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainConfig {
    pub model_kinds: BTreeSet<ModelKind>,
    pub min_rows: usize,
    pub validation_fraction: f64,
    pub seed: u64,
    /// Refit the champion on all rows after selection.
    pub refit_full: bool,
    pub unseen_categories: UnseenCategoryPolicy,
    /// Coverage of the residual interval attached to predictions.
    pub interval_level: f64,
    pub linear: LinearParams,
    pub boosting: BoostingParams,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            model_kinds: [ModelKind::Linear, ModelKind::GradientBoosting].into_iter().collect(),
            min_rows: 50,
            validation_fraction: 0.2,
            seed: 42,
            refit_full: true,
            unseen_categories: UnseenCategoryPolicy::OtherBucket,
            interval_level: 0.9,
            linear: LinearParams::default(),
            boosting: BoostingParams::default(),
        }
    }
}

impl TrainConfig {
    /// Parse and validate a JSON configuration; absent keys take defaults.
    pub fn parse(raw: &str) -> RealtyResult<Self> {
        let cfg: Self = serde_json::from_str(raw)
            .map_err(|e| RealtyError::config("train_config", e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> RealtyResult<Self> {
        Self::parse(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> RealtyResult<()> {
        if self.model_kinds.is_empty() {
            return Err(RealtyError::config("model_kinds", "at least one model kind is required"));
        }
        if self.min_rows < 2 {
            return Err(RealtyError::config("min_rows", "must be at least 2"));
        }
        if !(self.validation_fraction > 0.0 && self.validation_fraction < 1.0) {
            return Err(RealtyError::config(
                "validation_fraction",
                format!("must lie in (0, 1), got {}", self.validation_fraction),
            ));
        }
        if !(self.interval_level > 0.0 && self.interval_level <= 1.0) {
            return Err(RealtyError::config("interval_level", "must lie in (0, 1]"));
        }
        if !(self.linear.l2 >= 0.0 && self.linear.l2.is_finite()) {
            return Err(RealtyError::config("linear.l2", "must be finite and non-negative"));
        }

        let b = &self.boosting;
        if b.n_rounds == 0 {
            return Err(RealtyError::config("boosting.n_rounds", "must be positive"));
        }
        if !(b.learning_rate > 0.0 && b.learning_rate <= 1.0) {
            return Err(RealtyError::config("boosting.learning_rate", "must lie in (0, 1]"));
        }
        if b.max_depth == 0 {
            return Err(RealtyError::config("boosting.max_depth", "must be positive"));
        }
        if b.min_samples_leaf == 0 {
            return Err(RealtyError::config("boosting.min_samples_leaf", "must be positive"));
        }
        if !(b.reg_lambda >= 0.0 && b.reg_lambda.is_finite()) {
            return Err(RealtyError::config("boosting.reg_lambda", "must be finite and non-negative"));
        }
        if !(b.min_split_gain >= 0.0 && b.min_split_gain.is_finite()) {
            return Err(RealtyError::config("boosting.min_split_gain", "must be finite and non-negative"));
        }
        if !(b.subsample > 0.0 && b.subsample <= 1.0) {
            return Err(RealtyError::config("boosting.subsample", "must lie in (0, 1]"));
        }
        Ok(())
    }
}

/// Validation outcome of one candidate model kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateReport {
    pub kind: ModelKind,
    pub n_parameters: usize,
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
}

/// Durable output of one training run. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub id: ArtifactId,
    pub model_kind: ModelKind,
    /// JSON-encoded parameters of the champion model.
    pub serialized_parameters: String,
    pub schema: FeatureSchema,
    pub metrics: TrainingMetrics,
    pub candidates: Vec<CandidateReport>,
    pub dataset_id: Option<DatasetId>,
    pub seed: u64,
    pub created_at: DateTime<Utc>,
}

/// Append-only store of model artifacts.
pub trait ArtifactRegistry: Send + Sync {
    /// Persist a new artifact. Fails with `DuplicateArtifact` if the id exists.
    fn save(&self, artifact: &ModelArtifact) -> RealtyResult<ArtifactId>;
    /// Fetch an artifact by id, or `NotFound`.
    fn load(&self, id: &ArtifactId) -> RealtyResult<ModelArtifact>;
    /// Most recently created artifact, or `EmptyRegistry`.
    fn latest(&self) -> RealtyResult<ModelArtifact>;
    /// Id of [`ArtifactRegistry::latest`] without loading the artifact.
    fn latest_id(&self) -> RealtyResult<ArtifactId> {
        self.latest().map(|a| a.id)
    }
    /// All ids in creation order.
    fn list(&self) -> RealtyResult<Vec<ArtifactId>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = TrainConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.model_kinds.len(), 2);
    }

    #[test]
    fn parse_fills_defaults() {
        let cfg = TrainConfig::parse(
            r#"{"model_kinds":["linear"],"min_rows":10,"validation_fraction":0.25,"seed":7}"#,
        )
        .unwrap();
        assert_eq!(cfg.model_kinds.iter().copied().collect::<Vec<_>>(), vec![ModelKind::Linear]);
        assert_eq!(cfg.min_rows, 10);
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.boosting, BoostingParams::default());
    }

    #[test]
    fn parse_rejects_bad_values() {
        for raw in [
            r#"{"model_kinds":[]}"#,
            r#"{"validation_fraction":1.0}"#,
            r#"{"validation_fraction":0.0}"#,
            r#"{"min_rows":1}"#,
            r#"{"boosting":{"learning_rate":0.0}}"#,
            r#"{"boosting":{"subsample":1.5}}"#,
            r#"{"model_kinds":["random_forest"]}"#,
            r#"{"unknown_option":true}"#,
        ] {
            let err = TrainConfig::parse(raw).unwrap_err();
            assert!(matches!(err, RealtyError::InvalidConfig { .. }), "{raw}: {err}");
        }
    }

    #[test]
    fn model_kind_names() {
        assert_eq!(serde_json::to_string(&ModelKind::GradientBoosting).unwrap(), "\"gradient_boosting\"");
        assert_eq!(ModelKind::Linear.as_str(), "linear");
    }
}
