//! Chart reference parsing
//!
//! A reference is either a literal archive URL
//! (`https://charts.example.com/nginx-1.0.0.tgz`) or a `repo/chart`
//! shorthand looked up through the registry and the repository index.

use std::fmt;

use url::Url;

use crate::error::{RepoError, Result};

/// Classified chart reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChartReference {
    /// Literal archive location with scheme, host and path
    Url(Url),

    /// `repository/chart`; the chart part may itself contain slashes
    Shorthand { repository: String, chart: String },
}

impl ChartReference {
    /// Classify a raw reference string
    pub fn parse(reference: &str) -> Result<Self> {
        match Url::parse(reference) {
            Ok(url) if is_absolute(&url) => Ok(ChartReference::Url(url)),
            // Scheme present but no host or path: neither a usable URL nor a shorthand
            Ok(_) => Err(RepoError::MalformedReference {
                reference: reference.to_string(),
            }),
            Err(url::ParseError::RelativeUrlWithoutBase) => Self::parse_shorthand(reference),
            Err(e) => Err(RepoError::InvalidReference {
                reference: reference.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn parse_shorthand(reference: &str) -> Result<Self> {
        if let Some(reason) = invalid_path_reason(reference) {
            return Err(RepoError::InvalidReference {
                reference: reference.to_string(),
                reason,
            });
        }

        // Query and fragment are not part of the chart path
        let path = reference
            .split(['?', '#'])
            .next()
            .unwrap_or(reference);

        match path.split_once('/') {
            Some((repository, chart)) => Ok(ChartReference::Shorthand {
                repository: repository.to_string(),
                chart: chart.to_string(),
            }),
            None => Err(RepoError::MalformedReference {
                reference: reference.to_string(),
            }),
        }
    }
}

impl fmt::Display for ChartReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartReference::Url(url) => write!(f, "{}", url),
            ChartReference::Shorthand { repository, chart } => write!(f, "{}/{}", repository, chart),
        }
    }
}

/// Scheme, non-empty host and a path beyond the root
fn is_absolute(url: &Url) -> bool {
    let has_host = url.host_str().is_some_and(|h| !h.is_empty());
    let has_path = !url.cannot_be_a_base() && !url.path().is_empty() && url.path() != "/";
    has_host && has_path
}

fn invalid_path_reason(reference: &str) -> Option<String> {
    if let Some(c) = reference.chars().find(|c| c.is_control()) {
        return Some(format!("invalid control character {:?}", c));
    }

    let bytes = reference.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'%' {
            let escape = bytes.get(i + 1..i + 3);
            let valid = escape.is_some_and(|e| e.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                return Some(format!("invalid URL escape at byte {}", i));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_url() {
        let reference =
            ChartReference::parse("https://charts.example.com/stable/nginx-1.0.0.tgz").unwrap();
        match reference {
            ChartReference::Url(url) => {
                assert_eq!(url.host_str(), Some("charts.example.com"));
                assert_eq!(url.path(), "/stable/nginx-1.0.0.tgz");
            }
            other => panic!("expected URL, got {:?}", other),
        }
    }

    #[test]
    fn test_shorthand() {
        assert_eq!(
            ChartReference::parse("stable/nginx").unwrap(),
            ChartReference::Shorthand {
                repository: "stable".to_string(),
                chart: "nginx".to_string(),
            }
        );
    }

    #[test]
    fn test_shorthand_splits_on_first_slash() {
        assert_eq!(
            ChartReference::parse("stable/incubator/nginx").unwrap(),
            ChartReference::Shorthand {
                repository: "stable".to_string(),
                chart: "incubator/nginx".to_string(),
            }
        );
    }

    #[test]
    fn test_shorthand_ignores_query() {
        assert_eq!(
            ChartReference::parse("stable/nginx?foo=bar").unwrap(),
            ChartReference::Shorthand {
                repository: "stable".to_string(),
                chart: "nginx".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_separator() {
        assert!(matches!(
            ChartReference::parse("nginx"),
            Err(RepoError::MalformedReference { .. })
        ));
        assert!(matches!(
            ChartReference::parse(""),
            Err(RepoError::MalformedReference { .. })
        ));
    }

    #[test]
    fn test_url_without_path_is_not_absolute() {
        assert!(matches!(
            ChartReference::parse("https://charts.example.com"),
            Err(RepoError::MalformedReference { .. })
        ));
        assert!(matches!(
            ChartReference::parse("https://charts.example.com/"),
            Err(RepoError::MalformedReference { .. })
        ));
    }

    #[test]
    fn test_unparsable() {
        assert!(matches!(
            ChartReference::parse("https://[::1/nginx.tgz"),
            Err(RepoError::InvalidReference { .. })
        ));
        assert!(matches!(
            ChartReference::parse("stable/ngi%zznx"),
            Err(RepoError::InvalidReference { .. })
        ));
        assert!(matches!(
            ChartReference::parse("stable/ng\ninx"),
            Err(RepoError::InvalidReference { .. })
        ));
    }

    #[test]
    fn test_display() {
        let reference = ChartReference::parse("stable/nginx").unwrap();
        assert_eq!(reference.to_string(), "stable/nginx");
    }
}
