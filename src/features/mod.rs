//! Feature Builder: turns raw property records into fixed-width numeric vectors.

pub mod domain;
pub mod service;

pub use domain::{
    FeatureSchema, FeatureSpec, FeatureVector, Transform, UnseenCategory, UnseenCategoryPolicy,
    OTHER_BUCKET,
};
pub use service::{build, build_matrix, build_reported, derive_schema, stack};
