//! Repository registry
//!
//! Read-only view of `repositories.yaml`: the ordered list of configured
//! chart repositories with their credentials and TLS material.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RepoError, Result};

/// Repository registry file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryConfig {
    /// API version
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Configured repositories, in lookup order
    #[serde(default)]
    pub repositories: Vec<Repository>,
}

fn default_api_version() -> String {
    "v1".to_string()
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            repositories: Vec::new(),
        }
    }
}

impl RepositoryConfig {
    /// Build a registry from an ordered list of repositories
    pub fn new(repositories: Vec<Repository>) -> Self {
        Self {
            repositories,
            ..Self::default()
        }
    }

    /// Load the registry from a specific path
    ///
    /// A missing file is an error: callers decide whether an absent registry
    /// means "no repositories".
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| RepoError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content).map_err(|message| RepoError::InvalidConfig {
            path: path.to_path_buf(),
            message,
        })
    }

    fn from_yaml(content: &str) -> std::result::Result<Self, String> {
        // An empty file is a valid, empty registry
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| e.to_string())
    }

    /// Get a repository by exact name
    pub fn get(&self, name: &str) -> Option<&Repository> {
        self.repositories.iter().find(|r| r.name == name)
    }
}

/// Repository definition
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    /// Unique name for this repository
    pub name: String,

    /// Base URL; relative chart URLs in the index resolve against it
    #[serde(default)]
    pub url: String,

    /// Basic auth username
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,

    /// Basic auth password
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,

    /// CA bundle for TLS verification
    #[serde(default)]
    pub ca_file: Option<PathBuf>,

    /// Client certificate (PEM)
    #[serde(default)]
    pub cert_file: Option<PathBuf>,

    /// Client private key (PEM)
    #[serde(default)]
    pub key_file: Option<PathBuf>,

    /// Skip TLS verification (insecure, not recommended)
    #[serde(default)]
    pub insecure_skip_tls_verify: bool,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .field("ca_file", &self.ca_file)
            .field("cert_file", &self.cert_file)
            .field("key_file", &self.key_file)
            .field("insecure_skip_tls_verify", &self.insecure_skip_tls_verify)
            .finish()
    }
}

impl Repository {
    /// Create a repository entry without credentials
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    /// Attach basic auth credentials
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// TLS settings to hand to a transport bound to this repository
    pub fn tls(&self) -> TlsMaterial {
        TlsMaterial {
            ca_file: self.ca_file.clone(),
            cert_file: self.cert_file.clone(),
            key_file: self.key_file.clone(),
            insecure_skip_verify: self.insecure_skip_tls_verify,
        }
    }
}

/// TLS material used to configure a transport
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsMaterial {
    pub ca_file: Option<PathBuf>,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    pub insecure_skip_verify: bool,
}

impl TlsMaterial {
    /// True when nothing beyond the system defaults is configured
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}
