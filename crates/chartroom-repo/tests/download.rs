//! Integration tests for chart download and verification

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chartroom_repo::provenance::{clear_sign, provenance_path};
use chartroom_repo::{
    ChartDownloader, ProvenanceError, RepoError, Repository, RepositoryCache, RepositoryConfig,
    VerificationStrategy,
};
use flate2::Compression;
use flate2::write::GzEncoder;
use minisign::{KeyPair, PublicKey};
use tempfile::TempDir;
use wiremock::matchers::{basic_auth, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SIGNER: &str = "Chartroom Test Signer";

/// A repository served by a mock server, its cache, a keyring and a destination
struct Fixture {
    server: MockServer,
    cache: TempDir,
    dest: TempDir,
    keys: TempDir,
    public_key: PublicKey,
    archive: Vec<u8>,
    provenance: String,
}

impl Fixture {
    async fn new() -> Self {
        let server = MockServer::start().await;
        let cache = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let keys = TempDir::new().unwrap();

        let KeyPair { pk, sk } = KeyPair::generate_unencrypted_keypair().unwrap();
        let staged = keys.path().join("nginx-1.2.3.tgz");
        std::fs::write(&staged, chart_archive("nginx", "1.2.3")).unwrap();
        let provenance = clear_sign(&staged, &sk, SIGNER).unwrap();
        let archive = std::fs::read(&staged).unwrap();

        std::fs::write(
            keys.path().join("trusted.pub"),
            format!("untrusted comment: test key\n{}\n", pk.to_base64()),
        )
        .unwrap();

        Self {
            server,
            cache,
            dest,
            keys,
            public_key: pk,
            archive,
            provenance,
        }
    }

    fn keyring(&self) -> PathBuf {
        self.keys.path().join("trusted.pub")
    }

    fn repo_url(&self) -> String {
        format!("{}/repo", self.server.uri())
    }

    /// Cache an index for `name` listing nginx 1.0.0 and 1.2.3
    fn write_index(&self, name: &str, urls_123: &[String]) {
        let urls = urls_123
            .iter()
            .map(|u| format!("        - {}\n", u))
            .collect::<String>();
        let yaml = format!(
            "apiVersion: v1\nentries:\n  nginx:\n    - name: nginx\n      version: 1.0.0\n      urls:\n        - charts/nginx-1.0.0.tgz\n    - name: nginx\n      version: 1.2.3\n      urls:\n{}",
            urls
        );
        std::fs::write(self.cache.path().join(format!("{}-index.yaml", name)), yaml).unwrap();
    }

    fn downloader(&self, repositories: Vec<Repository>) -> ChartDownloader {
        ChartDownloader::new(
            RepositoryConfig::new(repositories),
            RepositoryCache::new(self.cache.path()),
        )
        .with_keyring(self.keyring())
    }

    /// Standard layout: repository `stable` with relative chart URLs
    fn stable(&self) -> ChartDownloader {
        self.write_index("stable", &["charts/nginx-1.2.3.tgz".to_string()]);
        self.downloader(vec![Repository::new("stable", self.repo_url())])
    }

    async fn serve_archive(&self) {
        Mock::given(method("GET"))
            .and(path("/repo/charts/nginx-1.2.3.tgz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(self.archive.clone()))
            .mount(&self.server)
            .await;
    }

    async fn serve_provenance(&self, body: &str) {
        Mock::given(method("GET"))
            .and(path("/repo/charts/nginx-1.2.3.tgz.prov"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&self.server)
            .await;
    }

    fn dest_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.dest.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    async fn requested_paths(&self) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|r| r.url.path().to_string())
            .collect()
    }
}

fn chart_archive(name: &str, version: &str) -> Vec<u8> {
    let chart_yaml = format!("apiVersion: v2\nname: {}\nversion: {}\n", name, version);
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

    let mut header = tar::Header::new_gnu();
    header.set_size(chart_yaml.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(
            &mut header,
            format!("{}/Chart.yaml", name),
            chart_yaml.as_bytes(),
        )
        .unwrap();

    builder.into_inner().unwrap().finish().unwrap()
}

/// Captures formatted log output for the current thread
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}

fn assert_archive(path: &Path, expected: &[u8]) {
    assert_eq!(std::fs::read(path).unwrap(), expected);
}

mod verification_strategy {
    use super::*;

    #[tokio::test]
    async fn test_never_skips_provenance() {
        let fx = Fixture::new().await;
        fx.serve_archive().await;
        fx.serve_provenance(&fx.provenance).await;

        let download = fx
            .stable()
            .download_to("stable/nginx", "", fx.dest.path())
            .await
            .unwrap();

        assert_eq!(download.path, fx.dest.path().join("nginx-1.2.3.tgz"));
        assert!(download.provenance.is_none());
        assert!(download.verification.is_none());
        assert_archive(&download.path, &fx.archive);
        assert_eq!(fx.dest_files(), vec!["nginx-1.2.3.tgz"]);
        assert_eq!(fx.requested_paths().await, vec!["/repo/charts/nginx-1.2.3.tgz"]);
    }

    #[tokio::test]
    async fn test_always_requires_provenance() {
        let fx = Fixture::new().await;
        fx.serve_archive().await;

        let err = fx
            .stable()
            .with_verify(VerificationStrategy::Always)
            .download_to("stable/nginx", "", fx.dest.path())
            .await
            .unwrap_err();

        let archive = fx.dest.path().join("nginx-1.2.3.tgz");
        match &err {
            RepoError::ProvenanceFetchFailed {
                reference, url, source, ..
            } => {
                assert_eq!(reference, "stable/nginx");
                assert!(url.ends_with("/repo/charts/nginx-1.2.3.tgz.prov"));
                assert!(matches!(**source, RepoError::HttpError { status: 404, .. }));
            }
            other => panic!("expected ProvenanceFetchFailed, got {:?}", other),
        }
        assert_eq!(err.archive_path(), Some(archive.as_path()));
        assert!(err.to_string().contains("failed to fetch provenance"));
        assert_eq!(fx.dest_files(), vec!["nginx-1.2.3.tgz"]);
    }

    #[tokio::test]
    async fn test_if_possible_without_provenance_warns() {
        let fx = Fixture::new().await;
        fx.serve_archive().await;
        let (logs, _guard) = capture_logs();

        let download = fx
            .stable()
            .with_verify(VerificationStrategy::IfPossible)
            .download_to("stable/nginx", "", fx.dest.path())
            .await
            .unwrap();

        assert!(download.provenance.is_none());
        assert!(download.verification.is_none());
        assert_archive(&download.path, &fx.archive);
        assert_eq!(fx.dest_files(), vec!["nginx-1.2.3.tgz"]);

        let output = logs.contents();
        assert!(output.contains("WARN"), "missing warning in {:?}", output);
        assert!(output.contains("Verification not found for stable/nginx"));
    }

    #[tokio::test]
    async fn test_if_possible_verifies_when_present() {
        let fx = Fixture::new().await;
        fx.serve_archive().await;
        fx.serve_provenance(&fx.provenance).await;

        let download = fx
            .stable()
            .with_verify(VerificationStrategy::IfPossible)
            .download_to("stable/nginx", "", fx.dest.path())
            .await
            .unwrap();

        let verification = download.verification.unwrap();
        assert_eq!(verification.signed_by, SIGNER);
        assert_eq!(verification.key, fx.public_key.to_base64());
        assert_eq!(verification.file_name, "nginx-1.2.3.tgz");
        assert_eq!(
            download.provenance,
            Some(provenance_path(&fx.dest.path().join("nginx-1.2.3.tgz")))
        );
        assert_eq!(fx.dest_files(), vec!["nginx-1.2.3.tgz", "nginx-1.2.3.tgz.prov"]);
    }

    #[tokio::test]
    async fn test_always_verifies() {
        let fx = Fixture::new().await;
        fx.serve_archive().await;
        fx.serve_provenance(&fx.provenance).await;

        let download = fx
            .stable()
            .with_verify(VerificationStrategy::Always)
            .download_to("stable/nginx", "1.2.3", fx.dest.path())
            .await
            .unwrap();

        assert_eq!(download.verification.unwrap().signed_by, SIGNER);
    }

    #[tokio::test]
    async fn test_verification_failure_is_fatal_even_if_possible() {
        let fx = Fixture::new().await;
        fx.serve_archive().await;
        fx.serve_provenance(&fx.provenance.replace("name: nginx", "name: evil"))
            .await;

        let err = fx
            .stable()
            .with_verify(VerificationStrategy::IfPossible)
            .download_to("stable/nginx", "", fx.dest.path())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RepoError::VerificationFailed {
                source: ProvenanceError::SignatureInvalid { .. },
                ..
            }
        ));
        assert_eq!(
            err.archive_path(),
            Some(fx.dest.path().join("nginx-1.2.3.tgz").as_path())
        );
    }

    #[tokio::test]
    async fn test_untrusted_signer_fails() {
        let fx = Fixture::new().await;
        fx.serve_archive().await;
        fx.serve_provenance(&fx.provenance).await;

        let other = KeyPair::generate_unencrypted_keypair().unwrap().pk;
        let keyring = fx.keys.path().join("other.pub");
        std::fs::write(&keyring, format!("{}\n", other.to_base64())).unwrap();

        let err = fx
            .stable()
            .with_verify(VerificationStrategy::Always)
            .with_keyring(&keyring)
            .download_to("stable/nginx", "", fx.dest.path())
            .await
            .unwrap_err();

        assert!(matches!(err, RepoError::VerificationFailed { .. }));
    }

    #[tokio::test]
    async fn test_later_fetches_without_verifying() {
        let fx = Fixture::new().await;
        fx.serve_archive().await;
        fx.serve_provenance("not even a signed message").await;

        let download = fx
            .stable()
            .with_verify(VerificationStrategy::Later)
            .with_keyring("/nonexistent/keyring.pub")
            .download_to("stable/nginx", "", fx.dest.path())
            .await
            .unwrap();

        assert!(download.verification.is_none());
        let prov = download.provenance.unwrap();
        assert_eq!(
            std::fs::read_to_string(prov).unwrap(),
            "not even a signed message"
        );
    }

    #[tokio::test]
    async fn test_later_without_provenance_warns() {
        let fx = Fixture::new().await;
        fx.serve_archive().await;
        let (logs, _guard) = capture_logs();

        let download = fx
            .stable()
            .with_verify(VerificationStrategy::Later)
            .download_to("stable/nginx", "", fx.dest.path())
            .await
            .unwrap();

        assert!(download.provenance.is_none());
        assert!(logs.contents().contains("Verification not found"));
    }
}

mod resolution {
    use super::*;

    #[tokio::test]
    async fn test_overwrites_existing_archive() {
        let fx = Fixture::new().await;
        fx.serve_archive().await;
        std::fs::write(fx.dest.path().join("nginx-1.2.3.tgz"), b"stale").unwrap();

        let download = fx
            .stable()
            .download_to("stable/nginx", "", fx.dest.path())
            .await
            .unwrap();
        assert_archive(&download.path, &fx.archive);
    }

    #[tokio::test]
    async fn test_relative_url_keeps_repository_query() {
        let fx = Fixture::new().await;
        fx.write_index("stable", &["charts/nginx-1.2.3.tgz".to_string()]);
        Mock::given(method("GET"))
            .and(path("/repo/charts/nginx-1.2.3.tgz"))
            .and(query_param("token", "x"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(fx.archive.clone()))
            .mount(&fx.server)
            .await;

        let downloader = fx.downloader(vec![Repository::new(
            "stable",
            format!("{}?token=x", fx.repo_url()),
        )]);
        let download = downloader
            .download_to("stable/nginx", "", fx.dest.path())
            .await
            .unwrap();

        assert_eq!(download.path, fx.dest.path().join("nginx-1.2.3.tgz"));
    }

    #[tokio::test]
    async fn test_archive_fetch_failure_is_fatal() {
        let fx = Fixture::new().await;

        let err = fx
            .stable()
            .with_verify(VerificationStrategy::IfPossible)
            .download_to("stable/nginx", "", fx.dest.path())
            .await
            .unwrap_err();

        assert!(matches!(err, RepoError::HttpError { status: 404, .. }));
        assert!(fx.dest_files().is_empty());
    }

    #[tokio::test]
    async fn test_missing_destination_directory() {
        let fx = Fixture::new().await;
        fx.serve_archive().await;
        let dest = fx.dest.path().join("missing");

        let err = fx
            .stable()
            .download_to("stable/nginx", "", &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, RepoError::WriteFailed { .. }));
        assert_eq!(err.archive_path(), Some(dest.join("nginx-1.2.3.tgz").as_path()));
    }
}

mod credentials {
    use super::*;

    #[tokio::test]
    async fn test_shorthand_uses_repository_credentials() {
        let fx = Fixture::new().await;
        fx.write_index("private", &["charts/nginx-1.2.3.tgz".to_string()]);
        Mock::given(method("GET"))
            .and(path("/repo/charts/nginx-1.2.3.tgz"))
            .and(basic_auth("repo-user", "repo-pass"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(fx.archive.clone()))
            .mount(&fx.server)
            .await;

        let downloader = fx.downloader(vec![
            Repository::new("private", fx.repo_url()).with_credentials("repo-user", "repo-pass"),
        ]);
        downloader
            .download_to("private/nginx", "", fx.dest.path())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_caller_credentials_override_repository() {
        let fx = Fixture::new().await;
        fx.write_index("private", &["charts/nginx-1.2.3.tgz".to_string()]);
        Mock::given(method("GET"))
            .and(path("/repo/charts/nginx-1.2.3.tgz"))
            .and(basic_auth("alice", "hunter2"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(fx.archive.clone()))
            .mount(&fx.server)
            .await;

        let downloader = fx
            .downloader(vec![
                Repository::new("private", fx.repo_url())
                    .with_credentials("repo-user", "repo-pass"),
            ])
            .with_username("alice")
            .with_password("hunter2");
        downloader
            .download_to("private/nginx", "", fx.dest.path())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_literal_url_recovers_owner_credentials() {
        let fx = Fixture::new().await;
        let chart_url = format!("{}/charts/nginx-1.2.3.tgz", fx.repo_url());
        fx.write_index("public", &["https://elsewhere.example.com/nginx-1.2.3.tgz".to_string()]);
        fx.write_index("first", &[chart_url.clone()]);
        fx.write_index("second", &[chart_url.clone()]);
        Mock::given(method("GET"))
            .and(path("/repo/charts/nginx-1.2.3.tgz"))
            .and(basic_auth("first-user", "first-pass"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(fx.archive.clone()))
            .mount(&fx.server)
            .await;

        let downloader = fx.downloader(vec![
            Repository::new("public", "https://elsewhere.example.com"),
            Repository::new("first", fx.repo_url()).with_credentials("first-user", "first-pass"),
            Repository::new("second", fx.repo_url())
                .with_credentials("second-user", "second-pass"),
        ]);

        let resolved = downloader.resolve_chart_version(&chart_url, "").unwrap();
        assert_eq!(resolved.repository.as_ref().unwrap().name, "first");

        downloader
            .download_to(&chart_url, "", fx.dest.path())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_literal_url_without_owner_sends_no_credentials() {
        let fx = Fixture::new().await;
        fx.write_index("private", &["charts/nginx-1.2.3.tgz".to_string()]);
        fx.serve_archive().await;

        let downloader = fx.downloader(vec![
            Repository::new("private", "https://private.example.com")
                .with_credentials("repo-user", "repo-pass"),
        ]);
        let chart_url = format!("{}/charts/nginx-1.2.3.tgz", fx.repo_url());

        let resolved = downloader.resolve_chart_version(&chart_url, "").unwrap();
        assert!(resolved.repository.is_none());

        downloader
            .download_to(&chart_url, "", fx.dest.path())
            .await
            .unwrap();

        let requests = fx.server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].headers.contains_key("authorization"));
    }
}
