//! Chartroom CLI - resolve, download and verify Helm-compatible charts

use clap::{ArgAction, Args, Parser, Subcommand};
use miette::GraphicalReportHandler;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt, prelude::*};

use chartroom_repo::VerificationStrategy;

mod commands;
mod error;
mod exit_codes;

use error::{CliError, Result};

#[derive(Parser)]
#[command(name = "chartroom")]
#[command(author = "Chartroom Contributors")]
#[command(version)]
#[command(about = "Resolve, download and verify Helm-compatible charts", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,
}

/// Where repository configuration and cached indexes live
#[derive(Args)]
struct RepositoryArgs {
    /// Repository file (default: <config dir>/chartroom/repositories.yaml)
    #[arg(long, env = "CHARTROOM_REPOSITORY_CONFIG")]
    repository_config: Option<PathBuf>,

    /// Directory of cached repository indexes (default: <cache dir>/chartroom/repository)
    #[arg(long, env = "CHARTROOM_REPOSITORY_CACHE")]
    repository_cache: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a chart from a repository or URL
    #[command(disable_version_flag = true)]
    Pull {
        /// Chart reference (repo/chart) or absolute chart URL
        chart: String,

        /// Version or semver constraint (default: latest)
        #[arg(long, default_value = "")]
        version: String,

        /// Directory to write the chart to
        #[arg(short, long, default_value = ".")]
        destination: PathBuf,

        /// Require and verify the provenance file
        #[arg(long)]
        verify: bool,

        /// Fetch the provenance file without verifying it
        #[arg(long)]
        prov: bool,

        /// Verification strategy, overrides --verify and --prov
        #[arg(long, value_name = "never|if-possible|always|later")]
        verify_strategy: Option<VerificationStrategy>,

        /// Keyring of trusted public keys (default: <config dir>/chartroom/keyring.pub)
        #[arg(long, env = "CHARTROOM_KEYRING")]
        keyring: Option<PathBuf>,

        /// Username, overrides the repository's configured username
        #[arg(long, env = "CHARTROOM_USERNAME")]
        username: Option<String>,

        /// Password, overrides the repository's configured password
        #[arg(long, env = "CHARTROOM_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        #[command(flatten)]
        repositories: RepositoryArgs,

        /// Output the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Verify a chart archive against its provenance file
    Verify {
        /// Chart archive (.tgz) with a sibling .prov file
        archive: PathBuf,

        /// Keyring of trusted public keys (default: <config dir>/chartroom/keyring.pub)
        #[arg(long, env = "CHARTROOM_KEYRING")]
        keyring: Option<PathBuf>,

        /// Output the result as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    miette::set_panic_hook();
    let cli = Cli::parse();

    let result = match init_tracing(cli.verbose) {
        Ok(()) => run(cli.command).await,
        Err(e) => Err(e),
    };

    if let Err(err) = result {
        report(&err);
        std::process::exit(err.exit_code());
    }
}

/// Render an error to stderr without wrapping, so paths and URLs stay whole
fn report(err: &CliError) {
    let handler = GraphicalReportHandler::new().with_width(1000);
    let mut out = String::new();
    match handler.render_report(&mut out, err) {
        Ok(()) => eprint!("{out}"),
        Err(_) => eprintln!("Error: {err}"),
    }
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Pull {
            chart,
            version,
            destination,
            verify,
            prov,
            verify_strategy,
            keyring,
            username,
            password,
            repositories,
            json,
        } => {
            let options = commands::pull::PullOptions {
                chart,
                version,
                destination,
                strategy: commands::pull::strategy_from_flags(verify, prov, verify_strategy),
                keyring: keyring.map_or_else(default_keyring, Ok)?,
                username,
                password,
                repository_config: repositories
                    .repository_config
                    .map_or_else(default_repository_config, Ok)?,
                repository_cache: repositories
                    .repository_cache
                    .map_or_else(default_repository_cache, Ok)?,
                json,
            };
            commands::pull::run(options).await
        }

        Commands::Verify {
            archive,
            keyring,
            json,
        } => {
            let keyring = keyring.map_or_else(default_keyring, Ok)?;
            commands::verify::run(&archive, &keyring, json)
        }
    }
}

fn init_tracing(verbose: u8) -> Result<()> {
    let filter = if std::env::var_os("RUST_LOG").is_some() {
        EnvFilter::try_from_default_env().map_err(|e| CliError::internal(e.to_string()))?
    } else {
        let level = match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        EnvFilter::new(format!("warn,chartroom={level},chartroom_repo={level}"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| CliError::internal(e.to_string()))
}

fn config_home() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join("chartroom"))
        .ok_or_else(|| CliError::internal("could not determine the configuration directory"))
}

fn default_repository_config() -> Result<PathBuf> {
    Ok(config_home()?.join("repositories.yaml"))
}

fn default_keyring() -> Result<PathBuf> {
    Ok(config_home()?.join("keyring.pub"))
}

fn default_repository_cache() -> Result<PathBuf> {
    dirs::cache_dir()
        .map(|d| d.join("chartroom").join("repository"))
        .ok_or_else(|| CliError::internal("could not determine the cache directory"))
}
