//! In-memory artifact registry, used by tests and embedded callers.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::error::{RealtyError, RealtyResult};

use super::domain::{ArtifactId, ArtifactRegistry, ModelArtifact};

/// Append-only registry holding artifacts in insertion order.
#[derive(Debug, Default)]
pub struct MemoryArtifactRegistry {
    artifacts: RwLock<Vec<ModelArtifact>>,
}

impl MemoryArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> RealtyResult<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> RealtyResult<bool> {
        Ok(self.read()?.is_empty())
    }

    fn read(&self) -> RealtyResult<RwLockReadGuard<'_, Vec<ModelArtifact>>> {
        self.artifacts
            .read()
            .map_err(|_| RealtyError::internal("artifact registry lock poisoned"))
    }

    fn write(&self) -> RealtyResult<RwLockWriteGuard<'_, Vec<ModelArtifact>>> {
        self.artifacts
            .write()
            .map_err(|_| RealtyError::internal("artifact registry lock poisoned"))
    }
}

impl ArtifactRegistry for MemoryArtifactRegistry {
    fn save(&self, artifact: &ModelArtifact) -> RealtyResult<ArtifactId> {
        let mut artifacts = self.write()?;
        if artifacts.iter().any(|a| a.id == artifact.id) {
            return Err(RealtyError::DuplicateArtifact(artifact.id.to_string()));
        }
        artifacts.push(artifact.clone());
        Ok(artifact.id.clone())
    }

    fn load(&self, id: &ArtifactId) -> RealtyResult<ModelArtifact> {
        self.read()?
            .iter()
            .find(|a| &a.id == id)
            .cloned()
            .ok_or_else(|| RealtyError::NotFound(id.to_string()))
    }

    fn latest(&self) -> RealtyResult<ModelArtifact> {
        let artifacts = self.read()?;
        // max_by_key keeps the last of equal keys, so later saves win ties.
        artifacts
            .iter()
            .max_by_key(|a| a.created_at)
            .cloned()
            .ok_or(RealtyError::EmptyRegistry)
    }

    fn latest_id(&self) -> RealtyResult<ArtifactId> {
        let artifacts = self.read()?;
        artifacts
            .iter()
            .max_by_key(|a| a.created_at)
            .map(|a| a.id.clone())
            .ok_or(RealtyError::EmptyRegistry)
    }

    fn list(&self) -> RealtyResult<Vec<ArtifactId>> {
        Ok(self.read()?.iter().map(|a| a.id.clone()).collect())
    }
}
