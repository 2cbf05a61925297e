//! Repository index types
//!
//! Helm-compatible `index.yaml` format: chart name to version entries, each
//! with its candidate download URLs.

use chrono::{DateTime, Utc};
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;

use crate::error::IndexError;

/// Repository index (Helm-compatible)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryIndex {
    /// API version
    #[serde(default)]
    pub api_version: String,

    /// When this index was generated
    #[serde(default = "Utc::now")]
    pub generated: DateTime<Utc>,

    /// Charts indexed by name
    #[serde(default)]
    pub entries: HashMap<String, Vec<ChartVersion>>,
}

impl Default for RepositoryIndex {
    fn default() -> Self {
        Self {
            api_version: "v1".to_string(),
            generated: Utc::now(),
            entries: HashMap::new(),
        }
    }
}

impl RepositoryIndex {
    /// Parse index from YAML string
    ///
    /// Entries are sorted newest first.
    pub fn from_yaml(yaml: &str) -> Result<Self, IndexError> {
        let mut index: Self =
            serde_yaml::from_str(yaml).map_err(|e| IndexError::Parse(e.to_string()))?;
        if index.api_version.is_empty() {
            return Err(IndexError::NoApiVersion);
        }
        index.sort_entries();
        Ok(index)
    }

    /// Parse index from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IndexError> {
        let yaml = std::str::from_utf8(bytes)
            .map_err(|e| IndexError::Parse(format!("Invalid UTF-8: {}", e)))?;
        Self::from_yaml(yaml)
    }

    /// Load an index file from disk
    pub fn load_from(path: &Path) -> Result<Self, IndexError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Sort every chart's versions by descending semver
    pub fn sort_entries(&mut self) {
        for versions in self.entries.values_mut() {
            versions.sort_by(|a, b| compare_versions(b, a));
        }
    }

    /// Select a chart version
    ///
    /// An empty `version` selects the greatest version. Otherwise a verbatim
    /// match wins. A full version (optionally `v`-prefixed) only ever matches
    /// an equal version; anything else is read as a semver requirement and
    /// selects the greatest version satisfying it.
    pub fn get(&self, name: &str, version: &str) -> Result<&ChartVersion, IndexError> {
        let versions = self.entries.get(name).ok_or(IndexError::NoChartName)?;
        if versions.is_empty() {
            return Err(IndexError::NoChartVersion);
        }

        if version.is_empty() {
            return versions
                .iter()
                .max_by(|a, b| compare_versions(a, b))
                .ok_or(IndexError::NoChartVersion);
        }

        if let Some(exact) = versions.iter().find(|v| v.version == version) {
            return Ok(exact);
        }

        let no_match = || IndexError::NoMatchingVersion {
            name: name.to_string(),
            version: version.to_string(),
        };

        let bare = version.strip_prefix('v').unwrap_or(version);
        if let Ok(wanted) = Version::parse(bare) {
            return versions
                .iter()
                .find(|v| v.parsed_version().as_ref() == Some(&wanted))
                .ok_or_else(no_match);
        }

        let req = VersionReq::parse(version).map_err(|e| IndexError::InvalidConstraint {
            constraint: version.to_string(),
            message: e.to_string(),
        })?;

        versions
            .iter()
            .filter_map(|v| v.parsed_version().filter(|p| req.matches(p)).map(|p| (p, v)))
            .max_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, v)| v)
            .ok_or_else(no_match)
    }

    /// Every candidate download URL listed in the index
    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.entries
            .values()
            .flatten()
            .flat_map(|v| v.urls.iter().map(String::as_str))
    }
}

/// Semver ordering; unparsable versions rank below parsable ones
fn compare_versions(a: &ChartVersion, b: &ChartVersion) -> Ordering {
    match (a.parsed_version(), b.parsed_version()) {
        (Some(va), Some(vb)) => va.cmp(&vb),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.version.cmp(&b.version),
    }
}

/// Chart version entry in the index
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartVersion {
    /// Chart name
    pub name: String,

    /// Chart version (semver)
    pub version: String,

    /// Application version
    #[serde(default)]
    pub app_version: Option<String>,

    /// Description
    #[serde(default)]
    pub description: Option<String>,

    /// Home URL
    #[serde(default)]
    pub home: Option<String>,

    /// Icon URL
    #[serde(default)]
    pub icon: Option<String>,

    /// Source URLs
    #[serde(default)]
    pub sources: Vec<String>,

    /// Keywords for search
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Maintainers
    #[serde(default)]
    pub maintainers: Vec<Maintainer>,

    /// Candidate URLs for the chart archive, absolute or relative to the
    /// repository URL
    #[serde(default)]
    pub urls: Vec<String>,

    /// SHA256 digest of the archive
    #[serde(default)]
    pub digest: Option<String>,

    /// Creation timestamp
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,

    /// Deprecated flag
    #[serde(default)]
    pub deprecated: bool,

    /// Chart API version
    #[serde(default)]
    pub api_version: Option<String>,
}

impl ChartVersion {
    /// Get the primary download URL
    ///
    /// Only the first listed URL is ever used; mirrors are not tried.
    pub fn download_url(&self) -> Option<&str> {
        self.urls.first().map(|s| s.as_str())
    }

    /// Parse version as semver, tolerating a leading `v`
    pub fn parsed_version(&self) -> Option<Version> {
        let raw = self.version.strip_prefix('v').unwrap_or(&self.version);
        Version::parse(raw).ok()
    }
}

/// Maintainer in index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Maintainer {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}
