//! Configuration layering, fallback logic, and environment overrides

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;

use pommel_core::error::PommelError;

use crate::settings::{PommelToml, RepositorySection};
use crate::ConfigResult;

/// Project configuration file name
pub const CONFIG_FILE_NAME: &str = "pommel.toml";

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "POMMEL_";

/// Environment prefix for user properties (`POMMEL_PROP_java.version=17`)
pub const ENV_PROPERTY_PREFIX: &str = "POMMEL_PROP_";

/// Main configuration loading interface
pub struct ConfigLoader {
    /// Current working directory
    cwd: Utf8PathBuf,
}

/// Configuration layering and merging
pub struct ConfigLayering;

/// Configuration source tracking
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// Global ~/.pommel/config.toml
    Global(Utf8PathBuf),
    /// Project pommel.toml found by walking up from the working directory
    Project(Utf8PathBuf),
    /// File passed with --config
    Explicit(Utf8PathBuf),
    /// Environment variable
    Environment(String),
    /// CLI flag
    CommandLine,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new(cwd: Utf8PathBuf) -> Self {
        Self { cwd }
    }

    /// Load the nearest project pommel.toml, if any
    pub async fn load_project_config(&self) -> ConfigResult<Option<(PommelToml, ConfigSource)>> {
        let path = self.resolve_config_path(CONFIG_FILE_NAME);
        if !path.exists() {
            tracing::debug!(cwd = %self.cwd, "no project configuration found");
            return Ok(None);
        }
        let config = crate::settings::load_from_file(&path).await?;
        tracing::debug!(path = %path, "loaded project configuration");
        Ok(Some((config, ConfigSource::Project(path))))
    }

    /// Load a configuration file named on the command line
    pub async fn load_explicit(&self, path: &Utf8Path) -> ConfigResult<(PommelToml, ConfigSource)> {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        };
        let config = crate::settings::load_from_file(&path).await?;
        Ok((config, ConfigSource::Explicit(path)))
    }

    /// Find configuration file in project (walks up directory tree)
    pub fn resolve_config_path(&self, filename: &str) -> Utf8PathBuf {
        let mut current = Some(self.cwd.as_path());
        while let Some(dir) = current {
            let candidate = dir.join(filename);
            if candidate.exists() {
                return candidate;
            }
            current = dir.parent();
        }

        // Path in the working directory even if it doesn't exist
        self.cwd.join(filename)
    }

    /// Load global configuration
    pub async fn load_global_config(&self) -> ConfigResult<Option<(PommelToml, ConfigSource)>> {
        let path = match global_config_path()? {
            Some(path) => path,
            None => return Ok(None),
        };
        if path.exists() {
            let config = crate::settings::load_from_file(&path).await?;
            Ok(Some((config, ConfigSource::Global(path))))
        } else {
            Ok(None)
        }
    }
}

/// `~/.pommel/config.toml`; `None` when there is no home directory
pub fn global_config_path() -> ConfigResult<Option<Utf8PathBuf>> {
    let home = match dirs::home_dir() {
        Some(home) => home,
        None => return Ok(None),
    };
    let home = Utf8PathBuf::try_from(home).map_err(|e| PommelError::ConfigValidation {
        field: "home_dir".to_string(),
        reason: format!("Invalid home directory path: {}", e),
    })?;
    Ok(Some(home.join(".pommel").join("config.toml")))
}

impl ConfigLayering {
    /// Merge multiple configuration layers.
    ///
    /// Project settings win over global ones; keyed lists keep project
    /// entries first and append global entries with new ids. Environment
    /// overrides apply next and command-line overrides last.
    pub fn merge_configs(
        global_config: Option<PommelToml>,
        project_config: Option<PommelToml>,
        env_overrides: HashMap<String, String>,
        cli_overrides: HashMap<String, String>,
    ) -> ConfigResult<PommelToml> {
        let mut merged = project_config.unwrap_or_default();

        if let Some(global) = global_config {
            merged.resolver = merged.resolver.or(global.resolver);

            for repo in global.repositories {
                if !merged.repositories.iter().any(|r| r.id == repo.id) {
                    merged.repositories.push(repo);
                }
            }
            for mirror in global.mirrors {
                if !merged.mirrors.iter().any(|m| m.id == mirror.id) {
                    merged.mirrors.push(mirror);
                }
            }
            for (key, value) in global.properties {
                merged.properties.entry(key).or_insert(value);
            }
            for id in global.profiles.active {
                if !merged.profiles.active.contains(&id) {
                    merged.profiles.active.push(id);
                }
            }
            for id in global.profiles.inactive {
                if !merged.profiles.inactive.contains(&id) {
                    merged.profiles.inactive.push(id);
                }
            }
            for (id, credentials) in global.credentials {
                merged.credentials.entry(id).or_insert(credentials);
            }
        }

        Self::apply_env_overrides(&mut merged, &env_overrides)?;

        // CLI flags have the highest priority
        Self::apply_cli_overrides(&mut merged, &cli_overrides)?;

        crate::settings::validate_config(&merged)?;
        Ok(merged)
    }

    fn apply_env_overrides(config: &mut PommelToml, overrides: &HashMap<String, String>) -> ConfigResult<()> {
        for (key, value) in overrides {
            match key.as_str() {
                "POMMEL_OFFLINE" => config.resolver.offline = Some(parse_bool(key, value)?),
                "POMMEL_LOCAL_REPOSITORY" => config.resolver.local_repository = Some(value.clone()),
                "POMMEL_TIMEOUT_SECS" => config.resolver.timeout_secs = Some(parse_number(key, value)?),
                "POMMEL_CONCURRENCY" => config.resolver.concurrency = Some(parse_number(key, value)?),
                "POMMEL_MAX_RETRIES" => config.resolver.max_retries = Some(parse_number(key, value)?),
                key if key.starts_with(ENV_PROPERTY_PREFIX) => {
                    let name = &key[ENV_PROPERTY_PREFIX.len()..];
                    if !name.is_empty() {
                        config.properties.insert(name.to_string(), value.clone());
                    }
                }
                _ => {
                    tracing::trace!(key = %key, "ignoring unknown environment override");
                }
            }
        }
        Ok(())
    }

    fn apply_cli_overrides(config: &mut PommelToml, overrides: &HashMap<String, String>) -> ConfigResult<()> {
        // Shorter keys first keeps `repository.cli-2` ahead of `repository.cli-10`
        let mut ordered: Vec<_> = overrides.iter().collect();
        ordered.sort_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

        for (key, value) in ordered {
            match key.as_str() {
                "offline" => config.resolver.offline = Some(parse_bool(key, value)?),
                "local_repository" => config.resolver.local_repository = Some(value.clone()),
                "timeout_secs" => config.resolver.timeout_secs = Some(parse_number(key, value)?),
                "concurrency" => config.resolver.concurrency = Some(parse_number(key, value)?),
                "max_retries" => config.resolver.max_retries = Some(parse_number(key, value)?),
                "profiles" => {
                    for id in value.split(',').map(str::trim).filter(|id| !id.is_empty()) {
                        match id.strip_prefix('!').or_else(|| id.strip_prefix('-')) {
                            Some(inactive) => config.profiles.inactive.push(inactive.to_string()),
                            None => config.profiles.active.push(id.to_string()),
                        }
                    }
                }
                key if key.starts_with("prop.") => {
                    config.properties.insert(key["prop.".len()..].to_string(), value.clone());
                }
                key if key.starts_with("repository.") => {
                    let id = &key["repository.".len()..];
                    match config.repositories.iter_mut().find(|r| r.id == id) {
                        Some(existing) => existing.url = value.clone(),
                        None => config.repositories.push(RepositorySection {
                            id: id.to_string(),
                            url: value.clone(),
                            releases: true,
                            snapshots: true,
                            checksum_policy: None,
                        }),
                    }
                }
                _ => {
                    tracing::trace!(key = %key, "ignoring unknown command-line override");
                }
            }
        }
        Ok(())
    }

    /// Collect environment variable overrides
    pub fn collect_env_overrides() -> HashMap<String, String> {
        std::env::vars().filter(|(key, _)| key.starts_with(ENV_PREFIX)).collect()
    }
}

fn parse_bool(field: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(PommelError::ConfigValidation {
            field: field.to_string(),
            reason: format!("expected a boolean, got '{}'", other),
        }),
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, value: &str) -> ConfigResult<T>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| PommelError::ConfigValidation {
        field: field.to_string(),
        reason: format!("invalid number '{}': {}", value, e),
    })
}
