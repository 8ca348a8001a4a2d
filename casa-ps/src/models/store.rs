//! Pipeline artifact store
//!
//! Loads fitted stages from `<data>/models/` on first use and keeps them for
//! the process lifetime. Population happens at most once per artifact:
//! concurrent first callers block on the same cell, and a failed load leaves
//! the cell empty so a later call retries.

use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::Artifact;
use crate::error::{PipelineError, PipelineResult};

/// First byte of a pickle protocol 2+ stream
const PICKLE_MAGIC: u8 = 0x80;

/// Every artifact the service knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactName {
    /// Column transformer feeding the price regressor
    Preprocessor,
    Regressor,
    /// Column transformer feeding the clustering reducer
    ClusterPreprocessor,
    ClusterReducer,
    ClusterModel,
}

impl ArtifactName {
    pub const ALL: [ArtifactName; 5] = [
        ArtifactName::Preprocessor,
        ArtifactName::Regressor,
        ArtifactName::ClusterPreprocessor,
        ArtifactName::ClusterReducer,
        ArtifactName::ClusterModel,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            ArtifactName::Preprocessor => "preprocessor.joblib",
            ArtifactName::Regressor => "mejor_modelo.joblib",
            ArtifactName::ClusterPreprocessor => "preprocessor_kmeans.joblib",
            ArtifactName::ClusterReducer => "pca_kmeans.joblib",
            ArtifactName::ClusterModel => "kmeans_model.joblib",
        }
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Lazily populated, read-only artifact cache
pub struct ArtifactStore {
    dir: PathBuf,
    cells: HashMap<ArtifactName, OnceCell<Arc<Artifact>>>,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cells: ArtifactName::ALL
                .iter()
                .map(|name| (*name, OnceCell::new()))
                .collect(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: ArtifactName) -> PathBuf {
        self.dir.join(name.file_name())
    }

    /// File presence check; never loads or fails
    pub fn exists(&self, name: ArtifactName) -> bool {
        self.path(name).is_file()
    }

    pub fn is_loaded(&self, name: ArtifactName) -> bool {
        self.cells.get(&name).is_some_and(|cell| cell.get().is_some())
    }

    /// Cached artifact, loading it on first call
    pub fn load(&self, name: ArtifactName) -> PipelineResult<Arc<Artifact>> {
        let cell = self.cells.get(&name).ok_or_else(|| {
            PipelineError::Internal(format!("no cache slot for artifact {}", name))
        })?;
        cell.get_or_try_init(|| self.read_artifact(name).map(Arc::new))
            .cloned()
    }

    fn read_artifact(&self, name: ArtifactName) -> PipelineResult<Artifact> {
        let path = self.path(name);
        let unavailable = |reason: String| {
            warn!("Artifact {} unavailable: {}", name, reason);
            PipelineError::ModelUnavailable {
                artifact: name.file_name().to_string(),
                reason,
            }
        };

        let started = Instant::now();
        debug!("Loading artifact {} from {}", name, path.display());

        let bytes = std::fs::read(&path)
            .map_err(|e| unavailable(format!("{}: {}", path.display(), e)))?;

        if bytes.first() == Some(&PICKLE_MAGIC) {
            return Err(unavailable(
                "pickled payload; re-export the fitted stage as JSON".to_string(),
            ));
        }

        let artifact: Artifact = serde_json::from_slice(&bytes)
            .map_err(|e| unavailable(format!("malformed artifact: {}", e)))?;
        artifact
            .validate()
            .map_err(|e| unavailable(e.to_string()))?;

        info!(
            "Loaded artifact {} ({}, {} input features) in {:.1}ms",
            name,
            artifact.kind_name(),
            artifact.n_features_in(),
            started.elapsed().as_secs_f64() * 1000.0
        );
        Ok(artifact)
    }
}

impl fmt::Debug for ArtifactStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let loaded: Vec<_> = ArtifactName::ALL
            .iter()
            .filter(|name| self.is_loaded(**name))
            .map(|name| name.file_name())
            .collect();
        f.debug_struct("ArtifactStore")
            .field("dir", &self.dir)
            .field("loaded", &loaded)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const KMEANS: &str = r#"{"type":"kmeans","centroids":[[0.0,0.0],[1.0,1.0]]}"#;

    fn store_with(name: ArtifactName, contents: &[u8]) -> (TempDir, ArtifactStore) {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(name.file_name()), contents).unwrap();
        let store = ArtifactStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_load_caches_instance() {
        let (_dir, store) = store_with(ArtifactName::ClusterModel, KMEANS.as_bytes());
        assert!(!store.is_loaded(ArtifactName::ClusterModel));

        let first = store.load(ArtifactName::ClusterModel).unwrap();
        let second = store.load(ArtifactName::ClusterModel).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(store.is_loaded(ArtifactName::ClusterModel));
    }

    #[test]
    fn test_concurrent_first_loads_share_one_instance() {
        let (_dir, store) = store_with(ArtifactName::ClusterModel, KMEANS.as_bytes());
        let barrier = std::sync::Barrier::new(8);

        let loaded: Vec<Arc<Artifact>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        store.load(ArtifactName::ClusterModel).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(loaded.iter().all(|a| Arc::ptr_eq(a, &loaded[0])));
        assert!(Arc::ptr_eq(&loaded[0], &store.load(ArtifactName::ClusterModel).unwrap()));
    }

    #[test]
    fn test_concurrent_loads_of_missing_artifact_leave_no_entry() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let barrier = std::sync::Barrier::new(8);

        let results: Vec<PipelineResult<Arc<Artifact>>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        store.load(ArtifactName::ClusterModel)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(results
            .iter()
            .all(|r| matches!(r, Err(PipelineError::ModelUnavailable { .. }))));
        assert!(!store.is_loaded(ArtifactName::ClusterModel));
    }

    #[test]
    fn test_missing_artifact_is_unavailable_and_retried() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        assert!(!store.exists(ArtifactName::ClusterModel));

        let err = store.load(ArtifactName::ClusterModel).unwrap_err();
        assert!(matches!(err, PipelineError::ModelUnavailable { .. }));
        assert!(!store.is_loaded(ArtifactName::ClusterModel));

        std::fs::write(store.path(ArtifactName::ClusterModel), KMEANS).unwrap();
        assert!(store.exists(ArtifactName::ClusterModel));
        assert!(store.load(ArtifactName::ClusterModel).is_ok());
    }

    #[test]
    fn test_pickle_payload_reports_reexport_hint() {
        let (_dir, store) = store_with(ArtifactName::Regressor, &[0x80, 0x04, 0x95]);
        match store.load(ArtifactName::Regressor) {
            Err(PipelineError::ModelUnavailable { artifact, reason }) => {
                assert_eq!(artifact, "mejor_modelo.joblib");
                assert!(reason.contains("re-export"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_inconsistent_artifact_rejected() {
        let (_dir, store) = store_with(
            ArtifactName::ClusterReducer,
            br#"{"type":"pca","mean":[0.0,0.0],"components":[[1.0]]}"#,
        );
        assert!(matches!(
            store.load(ArtifactName::ClusterReducer),
            Err(PipelineError::ModelUnavailable { .. })
        ));
    }
}
