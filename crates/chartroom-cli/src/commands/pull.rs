//! Pull command - download a chart and optionally verify its provenance

use std::path::PathBuf;

use chartroom_repo::provenance::Verification;
use chartroom_repo::{ChartDownloader, Download, RepositoryCache, VerificationStrategy};
use console::style;
use serde::Serialize;

use super::load_registry;
use crate::error::Result;

/// Everything `pull` needs, resolved from flags and defaults
#[derive(Debug)]
pub struct PullOptions {
    pub chart: String,
    pub version: String,
    pub destination: PathBuf,
    pub strategy: VerificationStrategy,
    pub keyring: PathBuf,
    pub username: Option<String>,
    pub password: Option<String>,
    pub repository_config: PathBuf,
    pub repository_cache: PathBuf,
    pub json: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PullOutput<'a> {
    chart: &'a str,
    path: &'a PathBuf,
    provenance: Option<&'a PathBuf>,
    verification: Option<&'a Verification>,
}

/// Pick the strategy from `--verify`, `--prov` and `--verify-strategy`
pub fn strategy_from_flags(
    verify: bool,
    prov: bool,
    explicit: Option<VerificationStrategy>,
) -> VerificationStrategy {
    match (explicit, verify, prov) {
        (Some(strategy), _, _) => strategy,
        (None, true, _) => VerificationStrategy::Always,
        (None, false, true) => VerificationStrategy::Later,
        (None, false, false) => VerificationStrategy::Never,
    }
}

pub async fn run(options: PullOptions) -> Result<()> {
    let registry = load_registry(&options.repository_config)?;
    let mut downloader =
        ChartDownloader::new(registry, RepositoryCache::new(&options.repository_cache))
            .with_verify(options.strategy)
            .with_keyring(&options.keyring);
    if let Some(username) = &options.username {
        downloader = downloader.with_username(username);
    }
    if let Some(password) = &options.password {
        downloader = downloader.with_password(password);
    }

    let download = downloader
        .download_to(&options.chart, &options.version, &options.destination)
        .await?;

    if options.json {
        let output = PullOutput {
            chart: &options.chart,
            path: &download.path,
            provenance: download.provenance.as_ref(),
            verification: download.verification.as_ref(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_download(&download);
    }

    Ok(())
}

fn print_download(download: &Download) {
    println!(
        "{} {}",
        style("Pulled").green().bold(),
        download.path.display()
    );
    if let Some(provenance) = &download.provenance {
        println!(
            "{} {}",
            style("Provenance").green().bold(),
            provenance.display()
        );
    }
    if let Some(verification) = &download.verification {
        super::verify::print_verification(verification);
    }
}
