//! CLI commands

pub mod pull;
pub mod verify;

use std::path::Path;

use chartroom_repo::{RepoError, RepositoryConfig};

use crate::error::Result;

/// Load the repository file; a missing file is an empty registry
///
/// Literal chart URLs still resolve without any configured repository.
pub fn load_registry(path: &Path) -> Result<RepositoryConfig> {
    match RepositoryConfig::load_from(path) {
        Ok(config) => Ok(config),
        Err(RepoError::ReadFailed { source, .. })
            if source.kind() == std::io::ErrorKind::NotFound =>
        {
            tracing::debug!("No repository file at {}", path.display());
            Ok(RepositoryConfig::default())
        }
        Err(e) => Err(e.into()),
    }
}
