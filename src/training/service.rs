//! Service layer orchestrating schema derivation, candidate fitting and
//! champion selection.
//!
//! Training is a blocking batch job. Nothing is published until the artifact
//! is complete, and registration happens only after training succeeded.

use std::time::Instant;

use ndarray::{Array1, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;

use crate::common::error::{RealtyError, RealtyResult};
use crate::common::time;
use crate::data::domain::{Dataset, DatasetId};
use crate::evaluation::domain::TrainingMetrics;
use crate::evaluation::service::{regression_metrics, residual_quantile};
use crate::features::domain::{FeatureSchema, FeatureVector};
use crate::features::service::{build_matrix, derive_schema, stack};

use super::domain::{ArtifactId, ArtifactRegistry, CandidateReport, ModelArtifact, TrainConfig};
use super::models::{Model, Regressor};

/// Relative RMSE difference under which two candidates count as tied.
const TIE_TOLERANCE: f64 = 1e-9;

/// Seeded shuffle split into `(train, validation)` row indices.
pub fn split_indices(n: usize, validation_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let n_val = ((n as f64 * validation_fraction).round() as usize).clamp(1, n.saturating_sub(1).max(1));
    let train = indices.split_off(n_val);
    (train, indices)
}

/// Lowest validation RMSE wins; near-ties go to the model with fewer parameters.
pub fn select_champion(candidates: &[CandidateReport]) -> Option<&CandidateReport> {
    candidates.iter().fold(None, |best: Option<&CandidateReport>, c| match best {
        None => Some(c),
        Some(b) => {
            let scale = b.rmse.abs().max(c.rmse.abs()).max(f64::MIN_POSITIVE);
            let tied = (c.rmse - b.rmse).abs() <= TIE_TOLERANCE * scale;
            if (tied && c.n_parameters < b.n_parameters) || (!tied && c.rmse < b.rmse) {
                Some(c)
            } else {
                Some(b)
            }
        }
    })
}

/// Train every configured model kind on pre-built vectors and emit an artifact.
///
/// # Errors
///
/// - `InvalidConfig` when `cfg` fails validation
/// - `InsufficientData` when fewer than `cfg.min_rows` rows are given
/// - `SchemaViolation` when targets do not line up with vectors or a vector
///   was built against a different schema
pub fn train(
    vectors: &[FeatureVector],
    targets: &[f64],
    schema: &FeatureSchema,
    cfg: &TrainConfig,
) -> RealtyResult<ModelArtifact> {
    train_with_lineage(vectors, targets, schema, cfg, None)
}

fn train_with_lineage(
    vectors: &[FeatureVector],
    targets: &[f64],
    schema: &FeatureSchema,
    cfg: &TrainConfig,
    dataset_id: Option<DatasetId>,
) -> RealtyResult<ModelArtifact> {
    cfg.validate()?;
    if vectors.len() < cfg.min_rows {
        return Err(RealtyError::InsufficientData {
            required: cfg.min_rows,
            actual: vectors.len(),
        });
    }
    if targets.len() != vectors.len() {
        return Err(RealtyError::schema(
            "target",
            format!("{} targets for {} feature vectors", targets.len(), vectors.len()),
        ));
    }
    if let Some(bad) = targets.iter().find(|t| !t.is_finite()) {
        return Err(RealtyError::schema("target", format!("non-finite target {bad}")));
    }
    let width = schema.width();
    for (i, v) in vectors.iter().enumerate() {
        if v.schema != schema.fingerprint || v.len() != width {
            return Err(RealtyError::schema(
                "features",
                format!("row {i} was not built with schema {}", schema.fingerprint),
            ));
        }
    }

    let started = Instant::now();
    let x = stack(vectors, width)?;
    let y = ArrayView1::from(targets);
    let (train_idx, val_idx) = split_indices(vectors.len(), cfg.validation_fraction, cfg.seed);
    let x_train = x.select(Axis(0), &train_idx);
    let y_train = y.select(Axis(0), &train_idx);
    let y_val = y.select(Axis(0), &val_idx);

    let mut candidates = Vec::with_capacity(cfg.model_kinds.len());
    let mut fitted = Vec::with_capacity(cfg.model_kinds.len());
    for &kind in &cfg.model_kinds {
        let model = Model::fit(kind, x_train.view(), y_train.view(), cfg)?;
        let predictions: Array1<f64> = val_idx
            .iter()
            .map(|&i| model.predict_raw(vectors[i].as_slice()))
            .collect();
        let m = regression_metrics(predictions.view(), y_val.view());
        info!(
            model_kind = kind.as_str(),
            rmse = m.rmse,
            mae = m.mae,
            r2 = m.r2,
            n_parameters = model.n_parameters(),
            "candidate evaluated"
        );
        candidates.push(CandidateReport {
            kind,
            n_parameters: model.n_parameters(),
            rmse: m.rmse,
            mae: m.mae,
            r2: m.r2,
        });
        fitted.push((model, predictions));
    }

    let champion = select_champion(&candidates)
        .ok_or_else(|| RealtyError::internal("no candidate model was fitted"))?
        .clone();
    let position = candidates
        .iter()
        .position(|c| c.kind == champion.kind)
        .ok_or_else(|| RealtyError::internal("champion missing from candidates"))?;
    let (mut model, val_predictions) = fitted.swap_remove(position);

    let metrics = TrainingMetrics {
        rmse: champion.rmse,
        mae: champion.mae,
        r2: champion.r2,
        train_rows: train_idx.len(),
        validation_rows: val_idx.len(),
        interval_level: cfg.interval_level,
        interval_half_width: residual_quantile(val_predictions.view(), y_val.view(), cfg.interval_level),
    };

    if cfg.refit_full {
        model = Model::fit(champion.kind, x.view(), y, cfg)?;
    }

    let artifact = ModelArtifact {
        id: ArtifactId::generate(),
        model_kind: champion.kind,
        serialized_parameters: model.serialize()?,
        schema: schema.clone(),
        metrics,
        candidates,
        dataset_id,
        seed: cfg.seed,
        created_at: time::now(),
    };
    info!(
        artifact_id = %artifact.id,
        model_kind = artifact.model_kind.as_str(),
        rmse = artifact.metrics.rmse,
        dur_ms = time::elapsed_ms(started) as u64,
        "training completed"
    );
    Ok(artifact)
}

/// Derive the schema from `dataset`, encode it and train.
pub fn train_dataset(dataset: &Dataset, cfg: &TrainConfig) -> RealtyResult<ModelArtifact> {
    cfg.validate()?;
    if dataset.len() < cfg.min_rows {
        return Err(RealtyError::InsufficientData {
            required: cfg.min_rows,
            actual: dataset.len(),
        });
    }
    let schema = derive_schema(dataset, cfg.unseen_categories)?;
    let vectors = build_matrix(&dataset.records, &schema)?;
    let targets = dataset.targets()?;
    train_with_lineage(&vectors, &targets, &schema, cfg, Some(dataset.id.clone()))
}

/// Train on `dataset` and register the artifact. Nothing is saved on failure.
pub fn train_and_register<R>(dataset: &Dataset, cfg: &TrainConfig, registry: &R) -> RealtyResult<ModelArtifact>
where
    R: ArtifactRegistry + ?Sized,
{
    let artifact = train_dataset(dataset, cfg)?;
    registry.save(&artifact)?;
    Ok(artifact)
}

/// Raw model output for a vector built with the artifact's schema.
pub fn predict_raw(artifact: &ModelArtifact, vector: &FeatureVector) -> RealtyResult<f64> {
    check_compatible(&artifact.schema, vector)?;
    let model = Model::deserialize(artifact.model_kind, &artifact.serialized_parameters)?;
    Ok(model.predict_raw(vector.as_slice()))
}

/// `IncompatibleArtifact` unless `vector` matches `schema` in width and fingerprint.
pub fn check_compatible(schema: &FeatureSchema, vector: &FeatureVector) -> RealtyResult<()> {
    if vector.len() != schema.width() {
        return Err(RealtyError::incompatible(format!(
            "expected {} features, got {}",
            schema.width(),
            vector.len()
        )));
    }
    if vector.schema != schema.fingerprint {
        return Err(RealtyError::incompatible(format!(
            "vector built with schema {}, artifact uses {}",
            vector.schema, schema.fingerprint
        )));
    }
    Ok(())
}
