//! JSON persistence of fitted artifacts and a change-aware in-memory cache.

use std::{
    fs,
    io::ErrorKind as IoErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};

use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    error::{ArtifactError, Result},
    models::FittedModel,
    schema::FEATURE_COUNT,
    transformation::FittedPreprocessor,
};

/// File name of the fitted preprocessor.
pub const PREPROCESSOR_FILE: &str = "preprocessor.json";
/// File name of the selected model.
pub const MODEL_FILE: &str = "model.json";
/// File name of the training summary.
pub const EVALUATION_FILE: &str = "evaluation.json";

/// Serializes `value` to `path`, creating parent directories.
pub fn save_object<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<(), ArtifactError> {
    let path = path.as_ref();
    let io_error = |source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    let encoded = serde_json::to_vec_pretty(value).map_err(|source| ArtifactError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, encoded).map_err(io_error)
}

/// Reads an artifact written by [`save_object`].
pub fn load_object<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ArtifactError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| {
        if source.kind() == IoErrorKind::NotFound {
            ArtifactError::Missing(path.to_path_buf())
        } else {
            ArtifactError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

/// Where the serving pair lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Fitted preprocessor document.
    pub preprocessor: PathBuf,
    /// Selected model document.
    pub model: PathBuf,
}

impl ArtifactPaths {
    /// The standard file names inside `dir`.
    #[must_use]
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            preprocessor: dir.join(PREPROCESSOR_FILE),
            model: dir.join(MODEL_FILE),
        }
    }
}

/// A preprocessor and model loaded together.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedArtifacts {
    /// Fitted preprocessor.
    pub preprocessor: FittedPreprocessor,
    /// Selected model.
    pub model: FittedModel,
}

impl LoadedArtifacts {
    /// Loads and checks both artifacts.
    pub fn load(paths: &ArtifactPaths) -> Result<Self> {
        let preprocessor: FittedPreprocessor = load_object(&paths.preprocessor)?;
        preprocessor.check_layout()?;
        let model: FittedModel = load_object(&paths.model)?;
        model
            .check(FEATURE_COUNT)
            .map_err(|reason| ArtifactError::Invalid {
                path: paths.model.clone(),
                reason,
            })?;
        Ok(Self {
            preprocessor,
            model,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    len: u64,
    modified: Option<SystemTime>,
}

impl Fingerprint {
    fn of(path: &Path) -> Result<Self, ArtifactError> {
        let meta = fs::metadata(path).map_err(|source| {
            if source.kind() == IoErrorKind::NotFound {
                ArtifactError::Missing(path.to_path_buf())
            } else {
                ArtifactError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Ok(Self {
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

#[derive(Debug)]
struct CacheEntry {
    fingerprints: [Fingerprint; 2],
    artifacts: Arc<LoadedArtifacts>,
}

/// Keeps the last loaded pair until either file changes on disk.
#[derive(Debug)]
pub struct ArtifactCache {
    paths: ArtifactPaths,
    entry: RwLock<Option<CacheEntry>>,
}

impl ArtifactCache {
    /// Creates an empty cache for `paths`.
    #[must_use]
    pub fn new(paths: ArtifactPaths) -> Self {
        Self {
            paths,
            entry: RwLock::new(None),
        }
    }

    /// Paths this cache watches.
    #[must_use]
    pub const fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    /// Returns the cached pair, reloading when a file's length or
    /// modification time changed since the last load.
    pub fn get(&self) -> Result<Arc<LoadedArtifacts>> {
        let current = [
            Fingerprint::of(&self.paths.preprocessor)?,
            Fingerprint::of(&self.paths.model)?,
        ];
        if let Some(entry) = self.entry.read().as_ref() {
            if entry.fingerprints == current {
                return Ok(Arc::clone(&entry.artifacts));
            }
        }
        let artifacts = Arc::new(LoadedArtifacts::load(&self.paths)?);
        *self.entry.write() = Some(CacheEntry {
            fingerprints: current,
            artifacts: Arc::clone(&artifacts),
        });
        Ok(artifacts)
    }

    /// Drops the cached pair.
    pub fn invalidate(&self) {
        *self.entry.write() = None;
    }
}
