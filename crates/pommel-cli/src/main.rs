//! # pommel
//!
//! Command-line front end for the Pommel descriptor resolution engine.
//!
//! Parses arguments, sets up logging, layers configuration and dispatches to
//! the command handlers. Results go to stdout; logs and diagnostics go to
//! stderr so `--json` output stays machine-readable.

use anyhow::Context;
use clap::{Parser, Subcommand};
use pommel_core::PommelError;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error};

mod commands;
mod output;

use commands::{CommandContext, GlobalOptions};
use output::errors::ErrorFormatter;

/// Maven descriptor resolution engine
#[derive(Parser, Debug)]
#[command(name = "pommel", version, about = "Resolve Maven project descriptors and dependency graphs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only consult the local repository
    #[arg(long, global = true)]
    pub offline: bool,

    /// Configuration file to use instead of the nearest pommel.toml
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Set a user property
    #[arg(short = 'D', global = true, value_name = "KEY=VALUE")]
    pub define: Vec<String>,

    /// Activate a profile, or deactivate it with a leading '!'
    #[arg(short = 'P', long = "profile", global = true, value_name = "ID", value_delimiter = ',')]
    pub profiles: Vec<String>,

    /// Add a remote repository after the configured ones
    #[arg(long = "repo", global = true, value_name = "URL")]
    pub repositories: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the effective descriptor
    Effective {
        #[arg(default_value = "pom.xml")]
        pom: PathBuf,
        /// Emit JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Resolve dependencies into scope buckets
    Resolve {
        #[arg(default_value = "pom.xml")]
        pom: PathBuf,
        /// Only print one bucket (compile, runtime, test, provided)
        #[arg(long)]
        scope: Option<String>,
        /// Emit JSON instead of a listing
        #[arg(long)]
        json: bool,
    },
    /// Print the dependency tree of one scope bucket
    Tree {
        #[arg(default_value = "pom.xml")]
        pom: PathBuf,
        #[arg(long, default_value = "compile")]
        scope: String,
    },
    /// List published versions of groupId:artifactId
    Versions {
        artifact: String,
        /// Version expression to evaluate against the listing
        #[arg(long)]
        select: Option<String>,
        /// Currently used version, for relative and downgrade checks
        #[arg(long)]
        current: Option<String>,
    },
    /// Inspect or maintain the local repository
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAction {
    /// Report size and entry counts
    Stats,
    /// Re-hash every indexed entry
    Verify,
    /// Remove everything under the local repository
    Clean,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose);
    setup_panic_handler();

    debug!("Starting Pommel v{}", env!("CARGO_PKG_VERSION"));

    match run_cli(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err);
            ExitCode::FAILURE
        }
    }
}

fn run_cli(cli: Cli) -> anyhow::Result<()> {
    let Cli {
        command,
        offline,
        config,
        define,
        profiles,
        repositories,
        ..
    } = cli;
    let options = GlobalOptions {
        offline,
        config,
        define,
        profiles,
        repositories,
    };

    let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
    rt.block_on(async {
        let ctx = CommandContext::new(options)?;
        commands::dispatch_command(command, &ctx).await
    })
}

fn report_error(err: &anyhow::Error) {
    let formatter = ErrorFormatter::new();
    match err.downcast_ref::<PommelError>() {
        Some(pommel) => eprintln!("{}", formatter.format_error(pommel)),
        None => eprintln!("{}", formatter.format_simple(&format!("{:#}", err))),
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let directives = [
        "pommel",
        "pommel_core",
        "pommel_pom",
        "pommel_registry",
        "pommel_resolver",
        "pommel_cache",
        "pommel_config",
    ]
    .iter()
    .map(|target| format!("{}={}", target, level))
    .collect::<Vec<_>>()
    .join(",");
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(directives));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        error!("Pommel encountered an unexpected error: {}", panic_info);
        eprintln!("Pommel crashed! This is a bug.");
        eprintln!("Please report this at: https://github.com/pommel-build/pommel/issues");
        eprintln!("Error: {}", panic_info);
    }));
}
