//! Local repository index cache
//!
//! One cached `index.yaml` per repository, stored as `<dir>/<name>-index.yaml`.
//! The cache is only read here; refreshing it is the job of `repo update`.

use std::path::{Path, PathBuf};

use crate::error::{RepoError, Result};
use crate::index::RepositoryIndex;

/// Directory holding cached repository indexes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryCache {
    dir: PathBuf,
}

impl RepositoryCache {
    /// Use `dir` as the cache directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the cached index for a repository
    pub fn index_path(&self, repo_name: &str) -> PathBuf {
        self.dir.join(format!("{}-index.yaml", repo_name))
    }

    /// Load the cached index for a repository
    ///
    /// A missing, unreadable or corrupt index is reported as
    /// [`RepoError::IndexUnavailable`].
    pub fn load(&self, repo_name: &str) -> Result<RepositoryIndex> {
        let path = self.index_path(repo_name);
        RepositoryIndex::load_from(&path).map_err(|e| RepoError::IndexUnavailable {
            name: repo_name.to_string(),
            path,
            message: e.to_string(),
        })
    }
}
