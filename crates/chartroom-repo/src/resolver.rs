//! Chart reference resolution
//!
//! Turns a reference and version constraint into a concrete URL plus a
//! transport bound to the right credentials and TLS material.

use std::fmt;

use tracing::debug;
use url::Url;

use crate::config::Repository;
use crate::credentials::Credentials;
use crate::downloader::ChartDownloader;
use crate::error::{RepoError, Result};
use crate::getter::{Getter, GetterOptions};
use crate::reference::ChartReference;
use crate::urlutil;

/// A resolved chart location
pub struct ResolvedChart {
    /// Absolute archive URL
    pub url: Url,
    /// Repository the URL belongs to; `None` for a literal URL listed in no
    /// repository index
    pub repository: Option<Repository>,
    /// Transport able to fetch `url`
    pub getter: Box<dyn Getter>,
}

impl fmt::Debug for ResolvedChart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedChart")
            .field("url", &self.url.as_str())
            .field("repository", &self.repository.as_ref().map(|r| &r.name))
            .finish_non_exhaustive()
    }
}

impl ChartDownloader {
    /// Resolve a chart reference to a URL and a bound transport
    ///
    /// Literal URLs are matched against every repository index to recover
    /// credentials; a URL no index lists resolves without a repository.
    /// Shorthand references (`repo/chart`) are looked up in the named
    /// repository's cached index. Only the first candidate URL of the
    /// selected version is used.
    pub fn resolve_chart_version(&self, reference: &str, version: &str) -> Result<ResolvedChart> {
        match ChartReference::parse(reference)? {
            ChartReference::Url(url) => self.resolve_url(url),
            ChartReference::Shorthand { repository, chart } => {
                self.resolve_shorthand(reference, &repository, &chart, version)
            }
        }
    }

    fn resolve_url(&self, url: Url) -> Result<ResolvedChart> {
        let repository = self.scan_repos_for_url(&url)?.cloned();
        match &repository {
            Some(repo) => debug!("Found repository {} for {}", repo.name, url),
            None => debug!("No repository lists {}, fetching without repository credentials", url),
        }

        let getter = self.bind(url.clone(), repository.as_ref())?;
        Ok(ResolvedChart {
            url,
            repository,
            getter,
        })
    }

    fn resolve_shorthand(
        &self,
        reference: &str,
        repo_name: &str,
        chart: &str,
        version: &str,
    ) -> Result<ResolvedChart> {
        let repo = self
            .registry
            .get(repo_name)
            .ok_or_else(|| RepoError::RepositoryNotFound {
                name: repo_name.to_string(),
            })?;
        if repo.url.is_empty() {
            return Err(RepoError::EmptyRepositoryUrl {
                name: repo.name.clone(),
            });
        }

        let index = self.cache.load(&repo.name)?;
        let entry = index
            .get(chart, version)
            .map_err(|e| RepoError::ChartNotFound {
                chart: chart.to_string(),
                version: version.to_string(),
                repo: repo.name.clone(),
                reason: e.to_string(),
            })?;
        let candidate = entry.download_url().ok_or_else(|| RepoError::NoDownloadUrl {
            reference: reference.to_string(),
        })?;

        let base = Url::parse(&repo.url).map_err(|e| RepoError::InvalidRepositoryUrl {
            name: repo.name.clone(),
            url: repo.url.clone(),
            reason: e.to_string(),
        })?;
        let invalid = |e: url::ParseError| RepoError::InvalidChartUrl {
            url: candidate.to_string(),
            reason: e.to_string(),
        };

        let (url, bound) = match Url::parse(candidate) {
            Ok(url) => (url.clone(), url),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let url = urlutil::resolve_relative(&base, candidate).map_err(invalid)?;
                debug!("Resolved {} against {} to {}", candidate, repo.url, url);
                (url, base)
            }
            Err(e) => return Err(invalid(e)),
        };

        let getter = self.bind(bound, Some(repo))?;
        Ok(ResolvedChart {
            url,
            repository: Some(repo.clone()),
            getter,
        })
    }

    /// First repository, in registry order, whose index lists `url`
    ///
    /// Every index up to the match is loaded; one that cannot be loaded
    /// fails the scan rather than being skipped.
    pub fn scan_repos_for_url(&self, url: &Url) -> Result<Option<&Repository>> {
        for repo in &self.registry.repositories {
            let index = self.cache.load(&repo.name)?;
            if index
                .urls()
                .any(|candidate| urlutil::equal(url.as_str(), candidate))
            {
                return Ok(Some(repo));
            }
        }
        Ok(None)
    }

    /// Build a transport for `url` with merged credentials
    fn bind(&self, url: Url, repository: Option<&Repository>) -> Result<Box<dyn Getter>> {
        let credentials = Credentials::merge(
            self.username.as_deref(),
            self.password.as_deref(),
            repository,
        );
        let tls = repository.map(Repository::tls).unwrap_or_default();
        debug!(
            "Binding {} transport for {} (credentials: {})",
            url.scheme(),
            url,
            !credentials.is_empty()
        );

        let options = GetterOptions::new(url)
            .with_credentials(credentials)
            .with_tls(tls);
        self.getters.build(&options)
    }
}
