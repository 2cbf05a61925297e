//! HTTP(S) getter
//!
//! Redirects are followed manually so basic auth never leaves the origin of
//! the first request.

use async_trait::async_trait;
use std::path::Path;
use url::Url;

use crate::config::TlsMaterial;
use crate::credentials::{Credentials, same_origin};
use crate::error::{RepoError, Result};
use crate::getter::{Getter, GetterOptions};

/// Maximum number of redirects followed for a single fetch
pub const MAX_REDIRECTS: u32 = 10;

/// Getter for `http` and `https` URLs
pub struct HttpGetter {
    client: reqwest::Client,
    credentials: Credentials,
}

impl HttpGetter {
    /// Build a client from the options' TLS material, user agent and connect timeout
    ///
    /// Credentials are bound separately through [`Getter::set_credentials`].
    pub fn new(options: &GetterOptions) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(options.user_agent.clone());

        if let Some(timeout) = options.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        builder = apply_tls(builder, &options.tls)?;

        let client = builder.build().map_err(|e| RepoError::NetworkError {
            url: options.url.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            client,
            credentials: Credentials::default(),
        })
    }

    async fn get_with_redirects(&self, url: &Url, max_redirects: u32) -> Result<Vec<u8>> {
        let mut current = url.clone();
        let mut redirects = 0;

        loop {
            let mut request = self.client.get(current.clone());

            if same_origin(url, &current) {
                if let Some(auth) = self.credentials.auth_header() {
                    request = request.header(reqwest::header::AUTHORIZATION, auth);
                }
            } else if !self.credentials.is_empty() {
                tracing::warn!(
                    "Cross-origin redirect from {} to {} - credentials not forwarded",
                    url,
                    current
                );
            }

            let response = request.send().await.map_err(|e| RepoError::NetworkError {
                url: current.to_string(),
                message: e.to_string(),
            })?;
            let status = response.status();

            if status.is_redirection() {
                redirects += 1;
                if redirects > max_redirects {
                    return Err(RepoError::TooManyRedirects {
                        url: url.to_string(),
                        max: max_redirects,
                    });
                }

                let location = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| RepoError::NetworkError {
                        url: current.to_string(),
                        message: "redirect without Location header".to_string(),
                    })?;

                current = current.join(location).map_err(|e| RepoError::NetworkError {
                    url: current.to_string(),
                    message: format!("invalid redirect location {:?}: {}", location, e),
                })?;
                tracing::debug!("Following redirect to {}", current);
                continue;
            }

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                let retry_after = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60);

                return Err(RepoError::RateLimited {
                    url: current.to_string(),
                    retry_after,
                });
            }
            if status == reqwest::StatusCode::UNAUTHORIZED {
                return Err(RepoError::AuthRequired {
                    url: current.to_string(),
                });
            }
            if status == reqwest::StatusCode::FORBIDDEN {
                return Err(RepoError::AuthFailed {
                    url: current.to_string(),
                });
            }
            if !status.is_success() {
                return Err(RepoError::HttpError {
                    url: current.to_string(),
                    status: status.as_u16(),
                });
            }

            let bytes = response.bytes().await.map_err(|e| RepoError::NetworkError {
                url: current.to_string(),
                message: e.to_string(),
            })?;
            return Ok(bytes.to_vec());
        }
    }
}

#[async_trait]
impl Getter for HttpGetter {
    async fn get(&self, url: &Url) -> Result<Vec<u8>> {
        self.get_with_redirects(url, MAX_REDIRECTS).await
    }

    fn set_credentials(&mut self, username: &str, password: &str) {
        self.credentials = Credentials::basic(username, password);
    }
}

fn apply_tls(
    mut builder: reqwest::ClientBuilder,
    tls: &TlsMaterial,
) -> Result<reqwest::ClientBuilder> {
    if let Some(ca_file) = &tls.ca_file {
        let pem = read_pem(ca_file)?;
        let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| invalid_tls(ca_file, e))?;
        builder = builder.add_root_certificate(cert);
    }

    match (&tls.cert_file, &tls.key_file) {
        (Some(cert_file), Some(key_file)) => {
            let mut pem = read_pem(cert_file)?;
            pem.push(b'\n');
            pem.extend(read_pem(key_file)?);
            let identity =
                reqwest::Identity::from_pem(&pem).map_err(|e| invalid_tls(cert_file, e))?;
            builder = builder.identity(identity);
        }
        (Some(path), None) | (None, Some(path)) => {
            return Err(RepoError::InvalidTlsMaterial {
                path: path.clone(),
                message: "client certificate and key must be configured together".to_string(),
            });
        }
        (None, None) => {}
    }

    if tls.insecure_skip_verify {
        builder = builder.danger_accept_invalid_certs(true);
    }
    Ok(builder)
}

fn read_pem(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| RepoError::InvalidTlsMaterial {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn invalid_tls(path: &Path, err: reqwest::Error) -> RepoError {
    RepoError::InvalidTlsMaterial {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
