//! Chart downloader
//!
//! Drives resolution, fetch, persistence and the verification policy for a
//! single chart reference.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, info, warn};
use url::Url;

use crate::cache::RepositoryCache;
use crate::config::RepositoryConfig;
use crate::error::{RepoError, Result};
use crate::getter::Providers;
use crate::provenance::{self, PROVENANCE_SUFFIX, Verification};
use crate::urlutil;

/// How much provenance checking a download performs
///
/// Ordered: `Never < IfPossible < Always < Later`. Anything above `Never`
/// fetches the provenance file; `Later` fetches it but leaves verification to
/// a subsequent step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum VerificationStrategy {
    /// Never fetch or verify provenance
    #[default]
    Never,
    /// Verify when a provenance file exists, warn otherwise
    IfPossible,
    /// Require a provenance file and a valid signature
    Always,
    /// Fetch the provenance file but do not verify it
    Later,
}

impl FromStr for VerificationStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "never" => Ok(Self::Never),
            "if-possible" | "ifpossible" => Ok(Self::IfPossible),
            "always" => Ok(Self::Always),
            "later" => Ok(Self::Later),
            _ => Err(format!(
                "unknown verification strategy '{}', expected never, if-possible, always or later",
                s
            )),
        }
    }
}

impl fmt::Display for VerificationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Never => "never",
            Self::IfPossible => "if-possible",
            Self::Always => "always",
            Self::Later => "later",
        };
        f.write_str(name)
    }
}

/// Files written by a download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    /// The chart archive
    pub path: PathBuf,
    /// The provenance file, when one was fetched
    pub provenance: Option<PathBuf>,
    /// Verification outcome, when verification ran
    pub verification: Option<Verification>,
}

impl Download {
    fn unverified(path: PathBuf) -> Self {
        Self {
            path,
            provenance: None,
            verification: None,
        }
    }
}

/// Resolves chart references and downloads archives with their provenance
///
/// The registry and cache are read-only snapshots; credentials set here are
/// merged with each owning repository's per call and never written back.
pub struct ChartDownloader {
    pub(crate) registry: RepositoryConfig,
    pub(crate) cache: RepositoryCache,
    pub(crate) getters: Providers,
    pub(crate) username: Option<String>,
    pub(crate) password: Option<String>,
    verify: VerificationStrategy,
    keyring: PathBuf,
}

impl ChartDownloader {
    /// Downloader over a registry snapshot and index cache, with HTTP(S)
    /// transports and no verification
    pub fn new(registry: RepositoryConfig, cache: RepositoryCache) -> Self {
        Self {
            registry,
            cache,
            getters: Providers::default(),
            username: None,
            password: None,
            verify: VerificationStrategy::Never,
            keyring: PathBuf::new(),
        }
    }

    pub fn with_verify(mut self, verify: VerificationStrategy) -> Self {
        self.verify = verify;
        self
    }

    /// Keyring used when verification runs
    pub fn with_keyring(mut self, keyring: impl Into<PathBuf>) -> Self {
        self.keyring = keyring.into();
        self
    }

    /// Caller-level username, taking precedence over repository configuration
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Caller-level password, taking precedence over repository configuration
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Replace the transport providers
    pub fn with_providers(mut self, getters: Providers) -> Self {
        self.getters = getters;
        self
    }

    pub fn verify(&self) -> VerificationStrategy {
        self.verify
    }

    pub fn keyring(&self) -> &Path {
        &self.keyring
    }

    /// Download a chart into `dest`
    ///
    /// The archive is written under the remote file name, replacing any
    /// existing file. Depending on the verification strategy the provenance
    /// file is fetched next to it and verified.
    pub async fn download_to(&self, reference: &str, version: &str, dest: &Path) -> Result<Download> {
        let resolved = self.resolve_chart_version(reference, version)?;
        let data = resolved.getter.get(&resolved.url).await?;

        let name = urlutil::file_name(&resolved.url).ok_or_else(|| RepoError::InvalidChartUrl {
            url: resolved.url.to_string(),
            reason: "URL has no file name".to_string(),
        })?;
        let path = dest.join(name);
        write_file(&path, &data).await?;
        info!("Saved {} to {}", resolved.url, path.display());

        if self.verify == VerificationStrategy::Never {
            return Ok(Download::unverified(path));
        }

        let prov_url = provenance_url(&resolved.url);
        let body = match resolved.getter.get(&prov_url).await {
            Ok(body) => body,
            Err(e) if self.verify == VerificationStrategy::Always => {
                return Err(RepoError::ProvenanceFetchFailed {
                    reference: reference.to_string(),
                    url: prov_url.to_string(),
                    archive: path,
                    source: Box::new(e),
                });
            }
            Err(e) => {
                warn!("Verification not found for {}: {}", reference, e);
                return Ok(Download::unverified(path));
            }
        };

        let prov_path = provenance::provenance_path(&path);
        write_file(&prov_path, &body).await?;
        info!("Saved {} to {}", prov_url, prov_path.display());

        if self.verify == VerificationStrategy::Later {
            debug!("Deferring verification of {}", path.display());
            return Ok(Download {
                path,
                provenance: Some(prov_path),
                verification: None,
            });
        }

        let verification = provenance::verify_chart(&path, &self.keyring).map_err(|source| {
            RepoError::VerificationFailed {
                archive: path.clone(),
                source,
            }
        })?;
        debug!(
            "Verified {} signed by {}",
            verification.file_name, verification.signed_by
        );

        Ok(Download {
            path,
            provenance: Some(prov_path),
            verification: Some(verification),
        })
    }
}

/// Provenance URL: `.prov` appended to the path, query kept
pub fn provenance_url(url: &Url) -> Url {
    let mut prov = url.clone();
    let path = format!("{}{}", url.path(), PROVENANCE_SUFFIX);
    prov.set_path(&path);
    prov
}

async fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    tokio::fs::write(path, data)
        .await
        .map_err(|source| RepoError::WriteFailed {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_order() {
        use VerificationStrategy::*;
        assert!(Never < IfPossible);
        assert!(IfPossible < Always);
        assert!(Always < Later);
        assert_eq!(VerificationStrategy::default(), Never);
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!(
            "if-possible".parse::<VerificationStrategy>().unwrap(),
            VerificationStrategy::IfPossible
        );
        assert_eq!(
            "ALWAYS".parse::<VerificationStrategy>().unwrap(),
            VerificationStrategy::Always
        );
        assert!("sometimes".parse::<VerificationStrategy>().is_err());
    }

    #[test]
    fn test_strategy_display_roundtrip() {
        for strategy in [
            VerificationStrategy::Never,
            VerificationStrategy::IfPossible,
            VerificationStrategy::Always,
            VerificationStrategy::Later,
        ] {
            assert_eq!(strategy.to_string().parse::<VerificationStrategy>().unwrap(), strategy);
        }
    }

    #[test]
    fn test_provenance_url() {
        let url = Url::parse("https://example.com/repo/foo-1.2.3.tgz?token=x").unwrap();
        assert_eq!(
            provenance_url(&url).as_str(),
            "https://example.com/repo/foo-1.2.3.tgz.prov?token=x"
        );
    }

    #[tokio::test]
    async fn test_write_failure_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("nginx-1.0.0.tgz");

        let err = write_file(&path, b"data").await.unwrap_err();
        assert_eq!(err.archive_path(), Some(path.as_path()));
    }
}
