//! Error types for chart resolution, download and verification

use std::path::PathBuf;

use thiserror::Error;

/// Chart resolution and download errors
#[derive(Debug, Error)]
pub enum RepoError {
    // ============ Reference Errors ============
    #[error("invalid chart URL format: {reference}: {reason}")]
    InvalidReference { reference: String, reason: String },

    #[error("non-absolute URLs should be in form of repo_name/path_to_chart, got: {reference}")]
    MalformedReference { reference: String },

    // ============ Lookup Errors ============
    #[error("repo {name} not found")]
    RepositoryNotFound { name: String },

    #[error("no URL found for repository {name}")]
    EmptyRepositoryUrl { name: String },

    #[error("invalid URL for repository {name}: {url} - {reason}")]
    InvalidRepositoryUrl {
        name: String,
        url: String,
        reason: String,
    },

    #[error("no cached repo found for {name} at {}: {message} (try 'chartroom repo update')", path.display())]
    IndexUnavailable {
        name: String,
        path: PathBuf,
        message: String,
    },

    #[error("chart {chart:?} matching {version} not found in {repo} index: {reason} (try 'chartroom repo update')")]
    ChartNotFound {
        chart: String,
        version: String,
        repo: String,
        reason: String,
    },

    #[error("chart {reference:?} has no downloadable URLs")]
    NoDownloadUrl { reference: String },

    #[error("invalid chart URL format: {url}: {reason}")]
    InvalidChartUrl { url: String, reason: String },

    // ============ Transport Errors ============
    #[error("no getter registered for URL scheme {scheme:?}")]
    UnsupportedScheme { scheme: String },

    #[error("failed to fetch {url}: HTTP {status}")]
    HttpError { url: String, status: u16 },

    #[error("failed to fetch {url}: {message}")]
    NetworkError { url: String, message: String },

    #[error("authentication required for {url}")]
    AuthRequired { url: String },

    #[error("access denied to {url}")]
    AuthFailed { url: String },

    #[error("rate limited by {url}, retry after {retry_after} seconds")]
    RateLimited { url: String, retry_after: u64 },

    #[error("too many redirects fetching {url} (max {max})")]
    TooManyRedirects { url: String, max: u32 },

    #[error("invalid TLS material {}: {message}", path.display())]
    InvalidTlsMaterial { path: PathBuf, message: String },

    // ============ Persistence Errors ============
    #[error("failed to write {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {}: {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ============ Verification Errors ============
    #[error("failed to fetch provenance {url:?} for {reference}")]
    ProvenanceFetchFailed {
        reference: String,
        url: String,
        archive: PathBuf,
        #[source]
        source: Box<RepoError>,
    },

    #[error("verification of {} failed: {source}", archive.display())]
    VerificationFailed {
        archive: PathBuf,
        #[source]
        source: ProvenanceError,
    },

    // ============ Registry Errors ============
    #[error("failed to parse repository file {}: {message}", path.display())]
    InvalidConfig { path: PathBuf, message: String },
}

impl RepoError {
    /// Path of the archive written before the failure, if any
    pub fn archive_path(&self) -> Option<&std::path::Path> {
        match self {
            RepoError::WriteFailed { path, .. } => Some(path),
            RepoError::ProvenanceFetchFailed { archive, .. }
            | RepoError::VerificationFailed { archive, .. } => Some(archive),
            _ => None,
        }
    }
}

/// Result type for repository operations
pub type Result<T> = std::result::Result<T, RepoError>;

/// Index loading and lookup errors
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("invalid index: {0}")]
    Parse(String),

    #[error("no API version specified")]
    NoApiVersion,

    #[error("no chart name found")]
    NoChartName,

    #[error("no chart version found")]
    NoChartVersion,

    #[error("no chart version found for {name}-{version}")]
    NoMatchingVersion { name: String, version: String },

    #[error("invalid version constraint {constraint:?}: {message}")]
    InvalidConstraint { constraint: String, message: String },
}

/// Provenance verification and signing errors
#[derive(Debug, Error)]
pub enum ProvenanceError {
    #[error("unpacked charts cannot be verified: {}", path.display())]
    UnpackedChart { path: PathBuf },

    #[error("chart must be a tgz file: {}", path.display())]
    NotAnArchive { path: PathBuf },

    #[error("could not read chart archive {}: {source}", path.display())]
    ArchiveUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not load provenance file {}: {source}", path.display())]
    MissingProvenance {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load keyring {}: {message}", path.display())]
    Keyring { path: PathBuf, message: String },

    #[error("malformed provenance file: {message}")]
    Malformed { message: String },

    #[error("provenance does not contain a SHA for a file named {file:?}")]
    MissingDigest { file: String },

    #[error("sha256 sum does not match for {file}: {expected:?} != {actual:?}")]
    DigestMismatch {
        file: String,
        expected: String,
        actual: String,
        /// Signer whose signature was valid before the digest check failed
        signed_by: String,
    },

    #[error("signature verification failed: {message}")]
    SignatureInvalid { message: String },

    #[error("failed to sign chart: {message}")]
    Signing { message: String },
}
