//! Domain definitions for inference requests and results.

use serde::{Deserialize, Serialize};

use crate::data::domain::PropertyRecord;
use crate::explain::domain::Attribution;
use crate::features::domain::UnseenCategory;
use crate::training::domain::ArtifactId;

/// Which artifact a prediction runs against.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum ArtifactSelector {
    /// Most recently created artifact in the registry.
    #[default]
    Latest,
    Id(ArtifactId),
}

impl From<Option<ArtifactId>> for ArtifactSelector {
    fn from(id: Option<ArtifactId>) -> Self {
        id.map_or(ArtifactSelector::Latest, ArtifactSelector::Id)
    }
}

impl From<ArtifactId> for ArtifactSelector {
    fn from(id: ArtifactId) -> Self {
        ArtifactSelector::Id(id)
    }
}

/// Symmetric interval around the point estimate from validation residuals.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
    /// Nominal coverage, e.g. `0.9`.
    pub level: f64,
}

impl ConfidenceInterval {
    pub fn around(point: f64, half_width: f64, level: f64) -> Self {
        Self {
            lower: point - half_width,
            upper: point + half_width,
            level,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

/// Serving output for one record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub point_estimate: f64,
    pub attribution: Attribution,
    pub artifact_id: ArtifactId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_interval: Option<ConfidenceInterval>,
    /// Categories that were routed to the `__other__` bucket.
    #[serde(default)]
    pub unseen_categories: Vec<UnseenCategory>,
}

/// Wire form of a prediction request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PredictRequest {
    pub record: PropertyRecord,
    #[serde(default)]
    pub artifact_id: Option<ArtifactId>,
}

impl PredictRequest {
    pub fn selector(&self) -> ArtifactSelector {
        self.artifact_id.clone().into()
    }
}
