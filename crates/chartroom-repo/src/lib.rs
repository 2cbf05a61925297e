//! Chartroom chart acquisition
//!
//! This crate turns a chart reference into a verified archive on disk:
//!
//! - **Resolution**: literal archive URLs or `repo/chart` shorthands looked
//!   up in cached Helm-compatible repository indexes
//! - **Owner discovery**: literal URLs are matched against every configured
//!   repository so its credentials and TLS settings still apply
//! - **Pluggable transports**: a scheme-keyed [`Providers`] factory builds
//!   [`Getter`]s with credentials bound at construction
//! - **Provenance**: minisign-signed `.prov` files checked against a keyring
//!   under a [`VerificationStrategy`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use chartroom_repo::{ChartDownloader, RepositoryCache, RepositoryConfig, VerificationStrategy};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = RepositoryConfig::load_from(Path::new("repositories.yaml"))?;
//! let downloader = ChartDownloader::new(registry, RepositoryCache::new("cache"))
//!     .with_verify(VerificationStrategy::Always)
//!     .with_keyring("trusted.pub");
//!
//! let download = downloader.download_to("stable/nginx", "^1.2", Path::new(".")).await?;
//! println!("{}", download.path.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Security Notes
//!
//! - Credentials are never sent after cross-origin redirects
//! - A failed verification is always an error, whatever the strategy

pub mod cache;
pub mod config;
pub mod credentials;
pub mod downloader;
pub mod error;
pub mod getter;
pub mod http;
pub mod index;
pub mod provenance;
pub mod reference;
pub mod resolver;
pub mod urlutil;

// Re-exports for convenience
pub use cache::RepositoryCache;
pub use config::{Repository, RepositoryConfig, TlsMaterial};
pub use credentials::Credentials;
pub use downloader::{ChartDownloader, Download, VerificationStrategy};
pub use error::{IndexError, ProvenanceError, RepoError, Result};
pub use getter::{Getter, GetterOptions, Providers};
pub use http::HttpGetter;
pub use index::{ChartVersion, RepositoryIndex};
pub use provenance::{Verification, verify_chart};
pub use reference::ChartReference;
pub use resolver::ResolvedChart;
