//! Command implementations and dispatch logic.
//!
//! Each command is an async function taking the shared [`CommandContext`],
//! which owns the working directory, the output handler and the global
//! flags that feed configuration layering.

use anyhow::Context;
use camino::Utf8PathBuf;
use pommel_config::{ConfigLayering, ConfigLoader, PommelToml};
use pommel_core::{PommelError, PommelResult, ResolutionFailure};
use pommel_resolver::ResolutionSession;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub mod cache;
pub mod effective;
pub mod resolve;
pub mod versions;


use crate::output::errors::ErrorFormatter;
use crate::{output::OutputHandler, Commands};

/// Flags that apply to every command
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub offline: bool,
    pub config: Option<PathBuf>,
    pub define: Vec<String>,
    pub profiles: Vec<String>,
    pub repositories: Vec<String>,
}

impl GlobalOptions {
    /// Command-line overrides in the keys understood by [`ConfigLayering`]
    pub fn overrides(&self) -> PommelResult<HashMap<String, String>> {
        let mut overrides = HashMap::new();
        if self.offline {
            overrides.insert("offline".to_string(), "true".to_string());
        }
        for definition in &self.define {
            let (key, value) = parse_define(definition)?;
            overrides.insert(format!("prop.{}", key), value);
        }
        if !self.profiles.is_empty() {
            overrides.insert("profiles".to_string(), self.profiles.join(","));
        }
        for (index, url) in self.repositories.iter().enumerate() {
            overrides.insert(format!("repository.cli-{}", index + 1), url.clone());
        }
        Ok(overrides)
    }
}

/// Split `key=value`; a bare key means `true`
pub fn parse_define(definition: &str) -> PommelResult<(String, String)> {
    let (key, value) = match definition.split_once('=') {
        Some((key, value)) => (key.trim(), value.to_string()),
        None => (definition.trim(), "true".to_string()),
    };
    if key.is_empty() {
        return Err(PommelError::ConfigValidation {
            field: "-D".to_string(),
            reason: format!("'{}' has no property name", definition),
        });
    }
    Ok((key.to_string(), value))
}

/// Shared context for all commands
pub struct CommandContext {
    pub cwd: PathBuf,
    pub output: OutputHandler,
    pub options: GlobalOptions,
}

impl CommandContext {
    /// Create a new command context rooted at the current directory
    pub fn new(options: GlobalOptions) -> PommelResult<Self> {
        let cwd = std::env::current_dir().map_err(|e| PommelError::Io {
            message: "Failed to get current directory".to_string(),
            source: e,
        })?;

        Ok(Self {
            cwd,
            output: OutputHandler::new(),
            options,
        })
    }

    /// Layer global, project, environment and command-line configuration
    pub async fn load_config(&self) -> PommelResult<PommelToml> {
        let loader = ConfigLoader::new(utf8(&self.cwd)?);
        let global = loader.load_global_config().await?.map(|(config, _)| config);

        let project = match &self.options.config {
            Some(path) => {
                let path = utf8(&self.resolve_path(path))?;
                let (config, source) = loader.load_explicit(&path).await?;
                debug!(?source, "loaded explicit configuration");
                Some(config)
            }
            None => loader.load_project_config().await?.map(|(config, source)| {
                debug!(?source, "loaded project configuration");
                config
            }),
        };

        ConfigLayering::merge_configs(
            global,
            project,
            ConfigLayering::collect_env_overrides(),
            self.options.overrides()?,
        )
    }

    /// Build a resolution session from the layered configuration
    pub async fn session(&self) -> anyhow::Result<ResolutionSession> {
        let config = self.load_config().await?;
        ResolutionSession::from_config(&config).context("Failed to set up the resolution session")
    }

    /// Interpret `path` relative to the working directory
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }

    /// Print collected failures to stderr
    pub fn report_failures(&self, failures: &[ResolutionFailure]) {
        if failures.is_empty() {
            return;
        }
        let formatter = ErrorFormatter::new();
        for failure in failures {
            eprintln!("{}", formatter.format_failure(failure));
        }
        self.output.warn(&format!(
            "{} problem{} recorded",
            failures.len(),
            if failures.len() == 1 { "" } else { "s" }
        ));
    }
}

fn utf8(path: &Path) -> PommelResult<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).map_err(|path| PommelError::ConfigValidation {
        field: "path".to_string(),
        reason: format!("{} is not valid UTF-8", path.display()),
    })
}

/// Persist the local repository index, if the session has one
pub fn flush_local_repository(session: &ResolutionSession) {
    if let Some(local) = session.fetcher().local_repository() {
        if let Err(e) = local.flush() {
            tracing::warn!("failed to save local repository index: {}", e);
        }
    }
}

/// Dispatch a command to its handler
pub async fn dispatch_command(command: Commands, ctx: &CommandContext) -> anyhow::Result<()> {
    match command {
        Commands::Effective { pom, json } => {
            info!("Building effective descriptor for {}", pom.display());
            effective::execute(pom, json, ctx).await
        }
        Commands::Resolve { pom, scope, json } => {
            info!("Resolving {} (scope: {:?})", pom.display(), scope);
            resolve::execute(pom, scope, json, ctx).await
        }
        Commands::Tree { pom, scope } => {
            info!("Rendering {} tree for {}", scope, pom.display());
            resolve::tree(pom, scope, ctx).await
        }
        Commands::Versions {
            artifact,
            select,
            current,
        } => {
            info!("Listing versions of {}", artifact);
            versions::execute(artifact, select, current, ctx).await
        }
        Commands::Cache { action } => cache::execute(action, ctx).await,
        Commands::Version => {
            show_version(ctx);
            Ok(())
        }
    }
}

fn show_version(ctx: &CommandContext) {
    let target = format!("{}-{}", std::env::consts::ARCH, std::env::consts::OS);

    ctx.output.print(&format!("Pommel v{}", env!("CARGO_PKG_VERSION")));
    ctx.output.info(&format!("Built: {} ({})", env!("BUILD_DATE"), env!("GIT_COMMIT")));
    ctx.output.info(&format!("Target: {}", target));
    ctx.output.info(&format!("Rust: {}", env!("RUSTC_VERSION")));
}
