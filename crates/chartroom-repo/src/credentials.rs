//! Effective credentials for a single download
//!
//! Key rules:
//! - Caller-supplied username/password win field by field
//! - Unset fields fall back to the owning repository's configuration
//! - Credentials are computed per call and never written back
//! - Credentials are never forwarded across origins on redirect

use base64::Engine;
use url::Url;

use crate::config::Repository;

/// Username/password pair bound to a transport
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .finish()
    }
}

impl Credentials {
    /// Create basic auth credentials
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Merge caller-level credentials with a repository's configuration
    ///
    /// Empty caller fields count as unset.
    pub fn merge(
        username: Option<&str>,
        password: Option<&str>,
        repository: Option<&Repository>,
    ) -> Self {
        let pick = |caller: Option<&str>, configured: Option<&String>| {
            caller
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .or_else(|| configured.cloned())
                .unwrap_or_default()
        };

        Self {
            username: pick(username, repository.map(|r| &r.username)),
            password: pick(password, repository.map(|r| &r.password)),
        }
    }

    /// True when neither field is set
    pub fn is_empty(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }

    /// `Authorization` header value, only when both fields are set
    pub fn auth_header(&self) -> Option<String> {
        if self.username.is_empty() || self.password.is_empty() {
            return None;
        }
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", self.username, self.password));
        Some(format!("Basic {}", encoded))
    }
}

/// Check if two URLs are same-origin (for redirect safety)
pub fn same_origin(url1: &Url, url2: &Url) -> bool {
    url1.scheme() == url2.scheme()
        && url1.host() == url2.host()
        && url1.port_or_known_default() == url2.port_or_known_default()
}
