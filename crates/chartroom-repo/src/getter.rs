//! Transport capability
//!
//! A [`Getter`] fetches the bytes behind a URL. [`Providers`] maps URL schemes
//! to getter constructors and binds credentials at construction time, so
//! resolution and download logic never depend on a concrete protocol.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::config::TlsMaterial;
use crate::credentials::Credentials;
use crate::error::{RepoError, Result};
use crate::http::HttpGetter;

/// Something that can fetch the bytes behind a URL
#[async_trait]
pub trait Getter: Send + Sync {
    /// Fetch the full body at `url`
    async fn get(&self, url: &Url) -> Result<Vec<u8>>;

    /// Configure basic auth credentials for subsequent fetches
    fn set_credentials(&mut self, username: &str, password: &str);
}

/// Everything a provider needs to build a getter
#[derive(Debug, Clone)]
pub struct GetterOptions {
    /// URL the getter is bound to (chart URL or repository base URL)
    pub url: Url,
    /// Effective credentials, applied after construction
    pub credentials: Credentials,
    /// TLS material from the owning repository, if any
    pub tls: TlsMaterial,
    /// User agent sent with every request
    pub user_agent: String,
    /// Limit on establishing a connection; body transfer is not time-limited
    pub connect_timeout: Option<Duration>,
}

impl GetterOptions {
    /// Options for `url` with no credentials and default TLS
    pub fn new(url: Url) -> Self {
        Self {
            url,
            credentials: Credentials::default(),
            tls: TlsMaterial::default(),
            user_agent: default_user_agent(),
            connect_timeout: Some(Duration::from_secs(30)),
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_tls(mut self, tls: TlsMaterial) -> Self {
        self.tls = tls;
        self
    }
}

/// `chartroom/<version>`
pub fn default_user_agent() -> String {
    format!("chartroom/{}", env!("CARGO_PKG_VERSION"))
}

/// Getter constructor
pub type Constructor = Arc<dyn Fn(&GetterOptions) -> Result<Box<dyn Getter>> + Send + Sync>;

/// A getter constructor and the URL schemes it serves
#[derive(Clone)]
pub struct Provider {
    pub schemes: Vec<String>,
    pub constructor: Constructor,
}

impl Provider {
    /// Whether this provider serves `scheme`
    pub fn provides(&self, scheme: &str) -> bool {
        self.schemes.iter().any(|s| s.eq_ignore_ascii_case(scheme))
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("schemes", &self.schemes)
            .finish_non_exhaustive()
    }
}

/// Ordered collection of providers, first match wins
#[derive(Clone, Debug)]
pub struct Providers {
    providers: Vec<Provider>,
}

impl Default for Providers {
    /// HTTP and HTTPS through [`HttpGetter`]
    fn default() -> Self {
        Self::empty().register(&["http", "https"], |options| {
            Ok(Box::new(HttpGetter::new(options)?) as Box<dyn Getter>)
        })
    }
}

impl Providers {
    /// No providers at all
    pub fn empty() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Register a constructor for `schemes`
    ///
    /// Later registrations are consulted after earlier ones, so register
    /// overrides on an [`empty`](Self::empty) collection.
    pub fn register<F>(mut self, schemes: &[&str], constructor: F) -> Self
    where
        F: Fn(&GetterOptions) -> Result<Box<dyn Getter>> + Send + Sync + 'static,
    {
        self.providers.push(Provider {
            schemes: schemes.iter().map(|s| s.to_string()).collect(),
            constructor: Arc::new(constructor),
        });
        self
    }

    /// Provider serving `scheme`
    pub fn by_scheme(&self, scheme: &str) -> Result<&Provider> {
        self.providers
            .iter()
            .find(|p| p.provides(scheme))
            .ok_or_else(|| RepoError::UnsupportedScheme {
                scheme: scheme.to_string(),
            })
    }

    /// Build a getter for `options.url` and bind its credentials
    pub fn build(&self, options: &GetterOptions) -> Result<Box<dyn Getter>> {
        let provider = self.by_scheme(options.url.scheme())?;
        let mut getter = (provider.constructor)(options)?;
        if !options.credentials.is_empty() {
            getter.set_credentials(&options.credentials.username, &options.credentials.password);
        }
        Ok(getter)
    }
}
