//! Feature schema and vector types.
//!
//! A [`FeatureSchema`] is derived once from training data and then travels
//! inside every artifact; serving never builds one from caller input.

use serde::{Deserialize, Serialize};

use crate::common::ids::SimpleHash;

/// Name of the reserved one-hot column that absorbs unseen categories.
pub const OTHER_BUCKET: &str = "__other__";

/// What to do with a categorical value that was not seen during derivation.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnseenCategoryPolicy {
    /// Encode into the `__other__` column and report the occurrence.
    #[default]
    OtherBucket,
    /// Fail with `UnseenCategory`.
    Reject,
}

/// Per-field transform.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transform {
    /// Numeric passthrough; missing optional values take `impute`.
    Numeric { impute: f64 },
    /// One column per known category plus the `__other__` column.
    OneHot { categories: Vec<String> },
}

impl Transform {
    pub fn width(&self) -> usize {
        match self {
            Transform::Numeric { .. } => 1,
            Transform::OneHot { categories } => categories.len() + 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub field: String,
    pub required: bool,
    pub transform: Transform,
}

impl FeatureSpec {
    /// Output column names contributed by this spec, in order.
    pub fn column_names(&self) -> Vec<String> {
        match &self.transform {
            Transform::Numeric { .. } => vec![self.field.clone()],
            Transform::OneHot { categories } => categories
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(OTHER_BUCKET))
                .map(|c| format!("{}={}", self.field, c))
                .collect(),
        }
    }
}

/// Ordered, immutable transform applied to raw records.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub fingerprint: String,
    pub specs: Vec<FeatureSpec>,
    pub unseen_policy: UnseenCategoryPolicy,
}

impl FeatureSchema {
    /// Build a schema and stamp its fingerprint.
    pub fn new(specs: Vec<FeatureSpec>, unseen_policy: UnseenCategoryPolicy) -> Self {
        let fingerprint = Self::compute_fingerprint(&specs, unseen_policy);
        Self {
            fingerprint,
            specs,
            unseen_policy,
        }
    }

    fn compute_fingerprint(specs: &[FeatureSpec], policy: UnseenCategoryPolicy) -> String {
        let mut hasher = SimpleHash::new();
        for spec in specs {
            hasher.update(spec.field.as_bytes());
            hasher.separator();
            hasher.update(&[u8::from(spec.required)]);
            match &spec.transform {
                Transform::Numeric { impute } => {
                    hasher.update(b"num");
                    hasher.update(&impute.to_bits().to_le_bytes());
                }
                Transform::OneHot { categories } => {
                    hasher.update(b"onehot");
                    for c in categories {
                        hasher.separator();
                        hasher.update(c.as_bytes());
                    }
                }
            }
            hasher.update(b"\n");
        }
        let policy: &[u8] = match policy {
            UnseenCategoryPolicy::OtherBucket => b"other",
            UnseenCategoryPolicy::Reject => b"reject",
        };
        hasher.update(policy);
        format!("fs-{}", hasher.finish_hex())
    }

    /// Number of output columns.
    pub fn width(&self) -> usize {
        self.specs.iter().map(|s| s.transform.width()).sum()
    }

    /// Output column names in vector order.
    pub fn feature_names(&self) -> Vec<String> {
        self.specs.iter().flat_map(FeatureSpec::column_names).collect()
    }

    /// Source field for every output column, in vector order.
    pub fn column_fields(&self) -> Vec<&str> {
        self.specs
            .iter()
            .flat_map(|s| std::iter::repeat(s.field.as_str()).take(s.transform.width()))
            .collect()
    }
}

/// Fixed-length numeric encoding of one record under one schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub schema: String,
    pub values: Vec<f64>,
}

impl FeatureVector {
    pub fn new(schema: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            schema: schema.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}

/// Report of a category routed to the `__other__` bucket.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct UnseenCategory {
    pub field: String,
    pub value: String,
}
