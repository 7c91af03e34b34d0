//! Filesystem repository for trained model artifacts.
//!
//! Layout under `<data_root>/artifacts`:
//!
//! ```text
//! <id>.json    self-contained artifact
//! index.tsv    append-only `id<TAB>created_at` lines
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, info, warn};

use crate::common::config::AppCfg;
use crate::common::error::{RealtyError, RealtyResult};

use super::domain::{ArtifactId, ArtifactRegistry, ModelArtifact};

const INDEX_FILE: &str = "index.tsv";

/// Persist artifacts on the local filesystem.
#[derive(Debug)]
pub struct FsArtifactRegistry {
    root: PathBuf,
    // Serializes the link-then-append sequence between writers in this process.
    write_lock: Mutex<()>,
}

impl FsArtifactRegistry {
    pub fn new(cfg: &AppCfg) -> RealtyResult<Self> {
        Self::open(cfg.artifacts_dir())
    }

    /// Open (creating if needed) a registry rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> RealtyResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn artifact_path(&self, id: &ArtifactId) -> RealtyResult<PathBuf> {
        let valid = !id.as_str().is_empty()
            && id
                .as_str()
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if !valid {
            return Err(RealtyError::NotFound(id.to_string()));
        }
        Ok(self.root.join(format!("{id}.json")))
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    fn read_index(&self) -> RealtyResult<Vec<(ArtifactId, DateTime<Utc>)>> {
        let raw = match fs::read_to_string(self.index_path()) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        raw.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let (id, ts) = line
                    .split_once('\t')
                    .ok_or_else(|| RealtyError::internal(format!("malformed index line `{line}`")))?;
                let created_at = DateTime::parse_from_rfc3339(ts.trim())
                    .map_err(|e| RealtyError::internal(format!("bad timestamp in index: {e}")))?
                    .with_timezone(&Utc);
                Ok((ArtifactId::new(id), created_at))
            })
            .collect()
    }

    fn append_index(&self, artifact: &ModelArtifact) -> RealtyResult<()> {
        let mut index = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.index_path())?;
        writeln!(
            index,
            "{}\t{}",
            artifact.id,
            artifact.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true)
        )?;
        index.sync_all()?;
        Ok(())
    }

    fn newest(&self) -> RealtyResult<ArtifactId> {
        // max_by_key keeps the last of equal keys, so later index lines win ties.
        self.read_index()?
            .into_iter()
            .max_by_key(|(_, created_at)| *created_at)
            .map(|(id, _)| id)
            .ok_or(RealtyError::EmptyRegistry)
    }

    fn write_temp(&self, artifact: &ModelArtifact) -> RealtyResult<PathBuf> {
        let tmp = self
            .root
            .join(format!(".{}.{}.tmp", artifact.id, uuid::Uuid::new_v4().simple()));
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        let written = serde_json::to_writer_pretty(&mut writer, artifact)
            .map_err(RealtyError::from)
            .and_then(|_| writer.flush().map_err(RealtyError::from))
            .and_then(|_| writer.get_ref().sync_all().map_err(RealtyError::from));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        Ok(tmp)
    }
}

impl ArtifactRegistry for FsArtifactRegistry {
    fn save(&self, artifact: &ModelArtifact) -> RealtyResult<ArtifactId> {
        let target = self.artifact_path(&artifact.id)?;
        let tmp = self.write_temp(artifact)?;

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| RealtyError::internal("registry write lock poisoned"))?;

        // hard_link refuses to replace an existing file.
        let linked = fs::hard_link(&tmp, &target);
        let _ = fs::remove_file(&tmp);
        match linked {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(RealtyError::DuplicateArtifact(artifact.id.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        // An artifact the index does not list must not stay loadable.
        if let Err(e) = self.append_index(artifact) {
            if let Err(cleanup) = fs::remove_file(&target) {
                warn!(artifact_id = %artifact.id, error = %cleanup, "failed to unlink unindexed artifact");
            }
            return Err(e);
        }

        info!(artifact_id = %artifact.id, path = %target.display(), "artifact saved");
        Ok(artifact.id.clone())
    }

    fn load(&self, id: &ArtifactId) -> RealtyResult<ModelArtifact> {
        let path = self.artifact_path(id)?;
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(RealtyError::NotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let artifact: ModelArtifact = serde_json::from_slice(&raw)?;
        debug!(artifact_id = %id, "artifact loaded");
        Ok(artifact)
    }

    fn latest(&self) -> RealtyResult<ModelArtifact> {
        self.load(&self.newest()?)
    }

    /// Reads only the index.
    fn latest_id(&self) -> RealtyResult<ArtifactId> {
        self.newest()
    }

    fn list(&self) -> RealtyResult<Vec<ArtifactId>> {
        Ok(self.read_index()?.into_iter().map(|(id, _)| id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::registry::fixtures::artifact;

    #[test]
    fn save_load_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let a = artifact("art-a", 0);
        {
            let registry = FsArtifactRegistry::open(dir.path()).unwrap();
            registry.save(&a).unwrap();
            assert_eq!(registry.load(&a.id).unwrap(), a);
        }

        let reopened = FsArtifactRegistry::open(dir.path()).unwrap();
        assert_eq!(reopened.load(&a.id).unwrap(), a);
        assert_eq!(reopened.list().unwrap(), vec![a.id.clone()]);
        assert_eq!(reopened.latest().unwrap(), a);
    }

    #[test]
    fn duplicate_save_keeps_original() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FsArtifactRegistry::open(dir.path()).unwrap();
        let a = artifact("art-a", 0);
        registry.save(&a).unwrap();

        let mut clash = artifact("art-a", 30);
        clash.seed = 7;
        let err = registry.save(&clash).unwrap_err();
        assert!(matches!(err, RealtyError::DuplicateArtifact(_)));
        assert_eq!(registry.load(&a.id).unwrap(), a);
        assert_eq!(registry.list().unwrap().len(), 1);

        let leftovers = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn latest_uses_created_at_then_index_order() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FsArtifactRegistry::open(dir.path()).unwrap();
        assert!(matches!(registry.latest(), Err(RealtyError::EmptyRegistry)));

        registry.save(&artifact("art-old", 0)).unwrap();
        registry.save(&artifact("art-new", 60)).unwrap();
        registry.save(&artifact("art-mid", 30)).unwrap();
        assert_eq!(registry.latest().unwrap().id.as_str(), "art-new");

        registry.save(&artifact("art-tie", 60)).unwrap();
        assert_eq!(registry.latest().unwrap().id.as_str(), "art-tie");
        assert_eq!(registry.latest_id().unwrap().as_str(), "art-tie");
    }

    #[test]
    fn failed_index_write_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FsArtifactRegistry::open(dir.path()).unwrap();
        registry.save(&artifact("art-kept", 0)).unwrap();
        let index = fs::read_to_string(dir.path().join(INDEX_FILE)).unwrap();

        // A directory in place of the index makes the append fail.
        fs::remove_file(dir.path().join(INDEX_FILE)).unwrap();
        fs::create_dir(dir.path().join(INDEX_FILE)).unwrap();
        let a = artifact("art-a", 10);
        assert!(matches!(registry.save(&a), Err(RealtyError::Io(_))));
        assert!(matches!(registry.load(&a.id), Err(RealtyError::NotFound(_))));
        assert!(!dir.path().join("art-a.json").exists());

        fs::remove_dir(dir.path().join(INDEX_FILE)).unwrap();
        fs::write(dir.path().join(INDEX_FILE), index).unwrap();
        assert_eq!(registry.list().unwrap(), vec![ArtifactId::new("art-kept")]);
        assert_eq!(registry.latest_id().unwrap().as_str(), "art-kept");

        registry.save(&a).unwrap();
        assert_eq!(registry.load(&a.id).unwrap(), a);
        assert_eq!(registry.latest_id().unwrap(), a.id);
    }

    #[test]
    fn unknown_or_unsafe_ids_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FsArtifactRegistry::open(dir.path()).unwrap();
        for id in ["art-missing", "../escape", ""] {
            let err = registry.load(&ArtifactId::new(id)).unwrap_err();
            assert!(matches!(err, RealtyError::NotFound(_)), "{id}");
        }
    }
}
