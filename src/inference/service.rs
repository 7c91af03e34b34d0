//! Inference orchestration: resolve an artifact, encode, predict, explain.
//!
//! Loaded artifacts are cached behind `Arc` and never mutated, so any number
//! of threads may predict against the same artifact through `&self`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockWriteGuard};
use std::time::Instant;

use rayon::prelude::*;
use tracing::debug;

use crate::common::error::{RealtyError, RealtyResult};
use crate::common::time;
use crate::data::domain::PropertyRecord;
use crate::explain::service::explain_model;
use crate::features::service::build_reported;
use crate::training::domain::{ArtifactId, ArtifactRegistry, ModelArtifact};
use crate::training::models::{Model, Regressor};

use super::domain::{ArtifactSelector, ConfidenceInterval, PredictionResult};

/// Artifact together with its deserialized model.
#[derive(Debug)]
pub struct LoadedArtifact {
    pub artifact: ModelArtifact,
    pub model: Model,
}

impl LoadedArtifact {
    pub fn new(artifact: ModelArtifact) -> RealtyResult<Self> {
        let model = Model::deserialize(artifact.model_kind, &artifact.serialized_parameters)?;
        if model.n_features() != artifact.schema.width() {
            return Err(RealtyError::incompatible(format!(
                "model expects {} features, schema yields {}",
                model.n_features(),
                artifact.schema.width()
            )));
        }
        Ok(Self { artifact, model })
    }

    pub fn id(&self) -> &ArtifactId {
        &self.artifact.id
    }

    /// Predict and explain one record with this artifact's own schema.
    pub fn predict(&self, record: &PropertyRecord) -> RealtyResult<PredictionResult> {
        let (vector, unseen_categories) = build_reported(record, &self.artifact.schema)?;
        let point_estimate = self.model.predict_raw(vector.as_slice());
        let attribution = explain_model(&self.model, &self.artifact.schema, &vector)?;

        let metrics = &self.artifact.metrics;
        let confidence_interval = (metrics.interval_half_width.is_finite() && metrics.interval_half_width >= 0.0)
            .then(|| ConfidenceInterval::around(point_estimate, metrics.interval_half_width, metrics.interval_level));

        Ok(PredictionResult {
            point_estimate,
            attribution,
            artifact_id: self.artifact.id.clone(),
            confidence_interval,
            unseen_categories,
        })
    }
}

/// Serving front end over an injected artifact registry.
pub struct InferenceService<R: ArtifactRegistry + ?Sized> {
    registry: Arc<R>,
    cache: RwLock<HashMap<ArtifactId, Arc<LoadedArtifact>>>,
}

impl<R: ArtifactRegistry + ?Sized> InferenceService<R> {
    pub fn new(registry: Arc<R>) -> Self {
        Self {
            registry,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<R> {
        &self.registry
    }

    /// Resolve and cache an artifact ahead of the first request.
    pub fn warm(&self, selector: &ArtifactSelector) -> RealtyResult<Arc<LoadedArtifact>> {
        // Latest is re-resolved on every call so new registrations are
        // picked up; only the loaded artifact is cached.
        let id = match selector {
            ArtifactSelector::Id(id) => id.clone(),
            ArtifactSelector::Latest => self.registry.latest_id()?,
        };
        if let Some(hit) = self.cached(&id)? {
            return Ok(hit);
        }
        let artifact = self.registry.load(&id)?;
        self.insert(artifact)
    }

    pub fn predict(&self, record: &PropertyRecord, selector: &ArtifactSelector) -> RealtyResult<PredictionResult> {
        let started = Instant::now();
        let loaded = self.warm(selector)?;
        let result = loaded.predict(record)?;
        debug!(
            artifact_id = %loaded.id(),
            point_estimate = result.point_estimate,
            unseen = result.unseen_categories.len(),
            dur_ms = time::elapsed_ms(started) as u64,
            "prediction served"
        );
        Ok(result)
    }

    /// Predict many records against one resolved artifact, in parallel.
    /// Results keep the input order; the first failure aborts the batch.
    pub fn predict_batch(
        &self,
        records: &[PropertyRecord],
        selector: &ArtifactSelector,
    ) -> RealtyResult<Vec<PredictionResult>> {
        let started = Instant::now();
        let loaded = self.warm(selector)?;
        let results = records
            .par_iter()
            .map(|r| loaded.predict(r))
            .collect::<RealtyResult<Vec<_>>>()?;
        debug!(
            artifact_id = %loaded.id(),
            rows = results.len(),
            dur_ms = time::elapsed_ms(started) as u64,
            "batch prediction served"
        );
        Ok(results)
    }

    /// Drop one artifact from the cache. Returns whether it was present.
    pub fn release(&self, id: &ArtifactId) -> RealtyResult<bool> {
        Ok(self.write_cache()?.remove(id).is_some())
    }

    pub fn clear(&self) -> RealtyResult<()> {
        self.write_cache()?.clear();
        Ok(())
    }

    pub fn cached_ids(&self) -> RealtyResult<Vec<ArtifactId>> {
        let cache = self
            .cache
            .read()
            .map_err(|_| RealtyError::internal("artifact cache lock poisoned"))?;
        let mut ids: Vec<ArtifactId> = cache.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn cached(&self, id: &ArtifactId) -> RealtyResult<Option<Arc<LoadedArtifact>>> {
        let cache = self
            .cache
            .read()
            .map_err(|_| RealtyError::internal("artifact cache lock poisoned"))?;
        Ok(cache.get(id).cloned())
    }

    fn insert(&self, artifact: ModelArtifact) -> RealtyResult<Arc<LoadedArtifact>> {
        let loaded = Arc::new(LoadedArtifact::new(artifact)?);
        let mut cache = self.write_cache()?;
        // First writer wins; a concurrent loader gets the entry already cached.
        let entry = cache.entry(loaded.id().clone()).or_insert(loaded);
        debug!(artifact_id = %entry.id(), "artifact cached");
        Ok(Arc::clone(entry))
    }

    fn write_cache(&self) -> RealtyResult<RwLockWriteGuard<'_, HashMap<ArtifactId, Arc<LoadedArtifact>>>> {
        self.cache
            .write()
            .map_err(|_| RealtyError::internal("artifact cache lock poisoned"))
    }
}
