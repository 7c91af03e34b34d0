//! Explainability Engine.
//!
//! Linear models attribute `w_j (x_j − mean_j)` per column. Tree ensembles
//! walk each tree's decision path and credit every split with the change in
//! node expectation it causes. Both decompositions are exact, so
//! `baseline + Σ contributions` reproduces the raw prediction.

use crate::common::error::RealtyResult;
use crate::features::domain::{FeatureSchema, FeatureVector};
use crate::training::domain::ModelArtifact;
use crate::training::models::{Model, Regressor};
use crate::training::service::check_compatible;

use super::domain::{Attribution, FeatureContribution};

/// Explain the prediction of `artifact` for `vector`.
///
/// Fails with `IncompatibleArtifact` when `vector` was not built with the
/// artifact's schema.
pub fn explain(artifact: &ModelArtifact, vector: &FeatureVector) -> RealtyResult<Attribution> {
    check_compatible(&artifact.schema, vector)?;
    let model = Model::deserialize(artifact.model_kind, &artifact.serialized_parameters)?;
    explain_model(&model, &artifact.schema, vector)
}

/// Same as [`explain`] for a model that is already deserialized.
pub fn explain_model(model: &Model, schema: &FeatureSchema, vector: &FeatureVector) -> RealtyResult<Attribution> {
    check_compatible(schema, vector)?;
    let (baseline, values) = model.contributions(vector.as_slice());
    let contributions = schema
        .feature_names()
        .into_iter()
        .zip(schema.column_fields())
        .zip(values)
        .map(|((feature, field), value)| FeatureContribution {
            feature,
            field: field.to_string(),
            value,
        })
        .collect();
    Ok(Attribution {
        baseline,
        contributions,
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::common::error::RealtyError;
    use crate::data::domain::{PropertyRecord, RecordSchema};
    use crate::data::service::from_records;
    use crate::features::service::{build, build_matrix};
    use crate::training::domain::{ModelKind, TrainConfig};
    use crate::training::service::train_dataset;

    fn artifact(kind: ModelKind) -> ModelArtifact {
        let records = (0..90)
            .map(|i| {
                let area = 50.0 + (i * 13 % 90) as f64;
                let hood = ["A", "B", "C"][i % 3];
                let baths = 1.0 + (i % 3) as f64;
                PropertyRecord::new()
                    .with("area", area)
                    .with("bedrooms", 1.0 + (i % 4) as f64)
                    .with("bathrooms", baths)
                    .with("neighborhood", hood)
                    .with("price", 900.0 * area + 20_000.0 * baths + if hood == "B" { 35_000.0 } else { 0.0 })
            })
            .collect();
        let data = from_records(records, RecordSchema::property()).unwrap();
        let mut cfg = TrainConfig {
            model_kinds: [kind].into_iter().collect(),
            ..TrainConfig::default()
        };
        cfg.boosting.n_rounds = 40;
        train_dataset(&data, &cfg).unwrap()
    }

    fn listing() -> PropertyRecord {
        PropertyRecord::new()
            .with("area", 101.5)
            .with("bedrooms", 3.0)
            .with("bathrooms", 2.0)
            .with("neighborhood", "B")
    }

    #[test]
    fn attributions_are_additive_for_every_kind() {
        for kind in [ModelKind::Linear, ModelKind::GradientBoosting] {
            let artifact = artifact(kind);
            let vector = build(&listing(), &artifact.schema).unwrap();
            let attribution = explain(&artifact, &vector).unwrap();
            let predicted = crate::training::service::predict_raw(&artifact, &vector).unwrap();

            assert_eq!(attribution.contributions.len(), artifact.schema.width());
            assert_relative_eq!(attribution.total(), predicted, max_relative = 1e-4);
        }
    }

    #[test]
    fn names_follow_schema_order() {
        let artifact = artifact(ModelKind::Linear);
        let vector = build(&listing(), &artifact.schema).unwrap();
        let attribution = explain(&artifact, &vector).unwrap();
        let names: Vec<String> = attribution.contributions.iter().map(|c| c.feature.clone()).collect();
        assert_eq!(names, artifact.schema.feature_names());
        assert!(attribution.by_field().contains_key("neighborhood"));
    }

    #[test]
    fn mismatched_vectors_are_incompatible() {
        let artifact = artifact(ModelKind::Linear);
        let wrong_len = FeatureVector::new(artifact.schema.fingerprint.clone(), vec![0.0; 2]);
        assert!(matches!(
            explain(&artifact, &wrong_len),
            Err(RealtyError::IncompatibleArtifact { .. })
        ));

        let mut foreign = build(&listing(), &artifact.schema).unwrap();
        foreign.schema = "fs-ffffffffffffffff".into();
        assert!(matches!(
            explain(&artifact, &foreign),
            Err(RealtyError::IncompatibleArtifact { .. })
        ));
    }

    #[test]
    fn tree_baseline_is_shared_across_rows() {
        let artifact = artifact(ModelKind::GradientBoosting);
        let model = Model::deserialize(artifact.model_kind, &artifact.serialized_parameters).unwrap();
        let data: Vec<PropertyRecord> = vec![listing(), listing().with("area", 60.0).with("neighborhood", "A")];
        let vectors = build_matrix(&data, &artifact.schema).unwrap();
        let a = explain_model(&model, &artifact.schema, &vectors[0]).unwrap();
        let b = explain_model(&model, &artifact.schema, &vectors[1]).unwrap();
        assert_eq!(a.baseline.to_bits(), b.baseline.to_bits());
        assert_ne!(a.total(), b.total());
    }
}
