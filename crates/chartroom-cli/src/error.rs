//! CLI error types with exit code handling
//!
//! Library errors are mapped onto a small set of diagnostics, each carrying
//! help text and an exit code.

use chartroom_repo::RepoError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// The chart reference or an argument is unusable
    #[error("{message}")]
    #[diagnostic(code(chartroom::cli::usage))]
    Usage {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Repository file or repository entry problem
    #[error("{message}")]
    #[diagnostic(code(chartroom::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Repository, index, chart or version not found
    #[error("{message}")]
    #[diagnostic(code(chartroom::cli::not_found))]
    NotFound {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Fetch failed
    #[error("{message}")]
    #[diagnostic(code(chartroom::cli::network))]
    Network {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Provenance missing or invalid
    #[error("{message}")]
    #[diagnostic(code(chartroom::cli::verification))]
    Verification {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(chartroom::cli::io))]
    Io { message: String },

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(chartroom::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::NotFound { .. } => exit_codes::NOT_FOUND,
            CliError::Network { .. } => exit_codes::NETWORK_ERROR,
            CliError::Verification { .. } => exit_codes::VERIFICATION_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<RepoError> for CliError {
    fn from(err: RepoError) -> Self {
        let message = err.to_string();
        match &err {
            RepoError::InvalidReference { .. } | RepoError::MalformedReference { .. } => {
                CliError::Usage {
                    message,
                    help: Some(
                        "use repo_name/chart_name or an absolute URL to a chart archive"
                            .to_string(),
                    ),
                }
            }

            RepoError::RepositoryNotFound { name } => CliError::Config {
                message,
                help: Some(format!(
                    "add the repository first, or check the spelling of '{}'",
                    name
                )),
            },
            RepoError::EmptyRepositoryUrl { .. }
            | RepoError::InvalidRepositoryUrl { .. }
            | RepoError::InvalidConfig { .. }
            | RepoError::ReadFailed { .. } => CliError::Config {
                message,
                help: Some("check the repository file (--repository-config)".to_string()),
            },

            RepoError::IndexUnavailable { .. }
            | RepoError::ChartNotFound { .. }
            | RepoError::NoDownloadUrl { .. } => CliError::NotFound {
                message,
                help: Some("the local repository index may be out of date".to_string()),
            },

            RepoError::AuthRequired { .. } | RepoError::AuthFailed { .. } => CliError::Network {
                message,
                help: Some("pass credentials with --username and --password".to_string()),
            },
            RepoError::RateLimited { retry_after, .. } => CliError::Network {
                message,
                help: Some(format!("retry in {} seconds", retry_after)),
            },
            RepoError::InvalidTlsMaterial { .. } => CliError::Network {
                message,
                help: Some(
                    "check caFile, certFile and keyFile in the repository file".to_string(),
                ),
            },
            RepoError::InvalidChartUrl { .. }
            | RepoError::UnsupportedScheme { .. }
            | RepoError::HttpError { .. }
            | RepoError::NetworkError { .. }
            | RepoError::TooManyRedirects { .. } => CliError::Network {
                message,
                help: None,
            },

            RepoError::WriteFailed { .. } => CliError::Io { message },

            RepoError::ProvenanceFetchFailed {
                archive, source, ..
            } => CliError::Verification {
                message: format!("{}: {}", message, source),
                help: Some(format!(
                    "{} was saved but not verified; use --verify-strategy if-possible to accept charts without provenance",
                    archive.display()
                )),
            },
            RepoError::VerificationFailed { archive, .. } => CliError::Verification {
                message,
                help: Some(format!(
                    "do not use {} until its provenance can be verified",
                    archive.display()
                )),
            },
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::internal(format!("failed to encode JSON output: {}", err))
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
