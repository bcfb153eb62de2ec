//! pommel.toml configuration parsing and serialization

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use pommel_core::error::PommelError;
use pommel_core::types::{ChecksumPolicy, Mirror, RepositoryDescriptor};

use crate::ConfigResult;

/// Default number of concurrent descriptor fetches
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Default per-repository fetch timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default retry count for transient network errors
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Complete pommel.toml configuration.
///
/// Every section is optional so that partial files (a global file with only
/// mirrors, a project file with only repositories) layer cleanly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PommelToml {
    /// Resolver behaviour
    #[serde(default)]
    pub resolver: ResolverSection,

    /// Remote repositories, in search order
    #[serde(default)]
    pub repositories: Vec<RepositorySection>,

    /// Mirrors rewriting the repository list
    #[serde(default)]
    pub mirrors: Vec<MirrorSection>,

    /// User properties, highest interpolation precedence
    #[serde(default)]
    pub properties: IndexMap<String, String>,

    /// Profile selection
    #[serde(default)]
    pub profiles: ProfilesSection,

    /// Repository credentials keyed by repository id
    #[serde(default)]
    pub credentials: BTreeMap<String, CredentialSection>,
}

/// `[resolver]` section; unset fields fall through to lower layers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolverSection {
    /// Only consult the local repository
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offline: Option<bool>,

    /// Concurrent descriptor fetches
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    /// Per-repository fetch timeout in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Retries for transient network errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    /// Local repository directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_repository: Option<String>,

    /// Default checksum policy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum_policy: Option<ChecksumPolicy>,

    /// Append the central repository when it is not configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_central: Option<bool>,
}

/// `[[repositories]]` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositorySection {
    pub id: String,
    pub url: String,
    #[serde(default = "default_true")]
    pub releases: bool,
    #[serde(default = "default_true")]
    pub snapshots: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum_policy: Option<ChecksumPolicy>,
}

/// `[[mirrors]]` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorSection {
    pub id: String,
    pub url: String,
    pub mirror_of: String,
}

/// `[profiles]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfilesSection {
    #[serde(default)]
    pub active: Vec<String>,
    #[serde(default)]
    pub inactive: Vec<String>,
}

/// `[credentials.<id>]` entry. Values are used as given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Fully defaulted resolver settings
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverSettings {
    pub offline: bool,
    pub concurrency: usize,
    pub timeout: Duration,
    pub max_retries: u32,
    pub local_repository: Utf8PathBuf,
    pub checksum_policy: ChecksumPolicy,
    pub include_central: bool,
}

fn default_true() -> bool {
    true
}

impl ResolverSection {
    /// Fill unset fields from `base`
    pub fn or(self, base: ResolverSection) -> ResolverSection {
        ResolverSection {
            offline: self.offline.or(base.offline),
            concurrency: self.concurrency.or(base.concurrency),
            timeout_secs: self.timeout_secs.or(base.timeout_secs),
            max_retries: self.max_retries.or(base.max_retries),
            local_repository: self.local_repository.or(base.local_repository),
            checksum_policy: self.checksum_policy.or(base.checksum_policy),
            include_central: self.include_central.or(base.include_central),
        }
    }
}

impl RepositorySection {
    pub fn to_descriptor(&self) -> RepositoryDescriptor {
        let mut repo = RepositoryDescriptor::new(self.id.clone(), self.url.clone())
            .with_releases(self.releases)
            .with_snapshots(self.snapshots);
        if let Some(policy) = self.checksum_policy {
            repo = repo.with_checksum_policy(policy);
        }
        repo
    }
}

impl MirrorSection {
    pub fn to_mirror(&self) -> Mirror {
        Mirror {
            id: self.id.clone(),
            url: self.url.clone(),
            mirror_of: self.mirror_of.clone(),
        }
    }
}

impl PommelToml {
    /// Resolver settings with defaults applied
    pub fn settings(&self) -> ResolverSettings {
        let resolver = &self.resolver;
        ResolverSettings {
            offline: resolver.offline.unwrap_or(false),
            concurrency: resolver.concurrency.unwrap_or(DEFAULT_CONCURRENCY),
            timeout: Duration::from_secs(resolver.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            max_retries: resolver.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            local_repository: resolver
                .local_repository
                .as_deref()
                .map(expand_home)
                .unwrap_or_else(default_local_repository),
            checksum_policy: resolver.checksum_policy.unwrap_or_default(),
            include_central: resolver.include_central.unwrap_or(true),
        }
    }

    /// Configured repositories in order, plus central when enabled and
    /// not already present
    pub fn repository_descriptors(&self) -> Vec<RepositoryDescriptor> {
        let mut repos: Vec<RepositoryDescriptor> =
            self.repositories.iter().map(RepositorySection::to_descriptor).collect();
        if self.settings().include_central
            && !repos.iter().any(|r| r.id == pommel_core::types::repository::CENTRAL_ID)
        {
            repos.push(RepositoryDescriptor::central());
        }
        repos
    }

    pub fn mirror_list(&self) -> Vec<Mirror> {
        self.mirrors.iter().map(MirrorSection::to_mirror).collect()
    }
}

/// `~/.pommel/repository`, or a relative fallback without a home directory
pub fn default_local_repository() -> Utf8PathBuf {
    dirs::home_dir()
        .and_then(|home| Utf8PathBuf::try_from(home).ok())
        .map(|home| home.join(".pommel").join("repository"))
        .unwrap_or_else(|| Utf8PathBuf::from(".pommel/repository"))
}

fn expand_home(path: &str) -> Utf8PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .and_then(|home| Utf8PathBuf::try_from(home).ok())
            .map(|home| home.join(rest))
            .unwrap_or_else(|| Utf8PathBuf::from(path)),
        None => Utf8PathBuf::from(path),
    }
}

/// 1-based line and column of a byte offset
fn locate(content: &str, offset: usize) -> (usize, usize) {
    let before = &content[..offset.min(content.len())];
    let line = before.matches('\n').count() + 1;
    let column = before.rfind('\n').map(|nl| before.len() - nl).unwrap_or(before.len() + 1);
    (line, column)
}

/// Parse TOML string to PommelToml configuration
pub fn parse_pommel_toml(content: &str) -> ConfigResult<PommelToml> {
    // First try with toml_edit for better error reporting
    content.parse::<toml_edit::Document>().map_err(|e| {
        let (line, column) = e.span().map(|s| locate(content, s.start)).unwrap_or((0, 0));
        PommelError::TomlParse {
            message: format!("TOML syntax error: {}", e.message()),
            line,
            column,
        }
    })?;

    // Then parse with serde for type safety
    let config: PommelToml = toml::from_str(content).map_err(|e| {
        let (line, column) = e.span().map(|s| locate(content, s.start)).unwrap_or((0, 0));
        PommelError::TomlParse {
            message: e.message().to_string(),
            line,
            column,
        }
    })?;

    validate_config(&config)?;
    Ok(config)
}

/// Serialize PommelToml to TOML string
pub fn serialize_pommel_toml(config: &PommelToml) -> ConfigResult<String> {
    toml::to_string_pretty(config).map_err(|e| PommelError::TomlParse {
        message: format!("TOML serialization error: {}", e),
        line: 0,
        column: 0,
    })
}

/// Validate configuration consistency
pub fn validate_config(config: &PommelToml) -> ConfigResult<()> {
    if config.resolver.concurrency == Some(0) {
        return Err(PommelError::ConfigValidation {
            field: "resolver.concurrency".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    let mut seen = std::collections::HashSet::new();
    for repo in &config.repositories {
        if repo.id.trim().is_empty() {
            return Err(PommelError::ConfigValidation {
                field: "repositories.id".to_string(),
                reason: format!("repository {} has an empty id", repo.url),
            });
        }
        if !seen.insert(repo.id.as_str()) {
            return Err(PommelError::ConfigValidation {
                field: "repositories.id".to_string(),
                reason: format!("duplicate repository id '{}'", repo.id),
            });
        }
        validate_url(&format!("repositories.{}.url", repo.id), &repo.url)?;
    }

    for mirror in &config.mirrors {
        validate_url(&format!("mirrors.{}.url", mirror.id), &mirror.url)?;
        if mirror.mirror_of.trim().is_empty() {
            return Err(PommelError::ConfigValidation {
                field: format!("mirrors.{}.mirror_of", mirror.id),
                reason: "must name at least one repository or pattern".to_string(),
            });
        }
    }

    for (id, credentials) in &config.credentials {
        if credentials.token.is_none() && credentials.username.is_none() {
            return Err(PommelError::ConfigValidation {
                field: format!("credentials.{}", id),
                reason: "needs either a token or a username".to_string(),
            });
        }
    }

    Ok(())
}

fn validate_url(field: &str, value: &str) -> ConfigResult<()> {
    url::Url::parse(value).map(|_| ()).map_err(|e| PommelError::ConfigValidation {
        field: field.to_string(),
        reason: format!("invalid URL '{}': {}", value, e),
    })
}

/// Load and parse pommel.toml from file path
pub async fn load_from_file(path: &Utf8Path) -> ConfigResult<PommelToml> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| PommelError::io(format!("Failed to read {}", path), e))?;
    parse_pommel_toml(&content).map_err(|e| match e {
        PommelError::TomlParse { message, line, column } => PommelError::TomlParse {
            message: format!("In file {}: {}", path, message),
            line,
            column,
        },
        PommelError::ConfigValidation { field, reason } => PommelError::ConfigValidation {
            field,
            reason: format!("In file {}: {}", path, reason),
        },
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config() {
        let config = parse_pommel_toml("").unwrap();
        assert_eq!(config, PommelToml::default());
        let settings = config.settings();
        assert_eq!(settings.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(settings.timeout, Duration::from_secs(30));
        assert_eq!(settings.checksum_policy, ChecksumPolicy::Warn);
        assert!(settings.include_central);
        assert!(settings.local_repository.ends_with(".pommel/repository"));
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[resolver]
offline = true
concurrency = 4
timeout_secs = 5
checksum_policy = "fail"
local_repository = "/var/cache/pommel"

[[repositories]]
id = "corp"
url = "https://repo.corp.example/maven"
snapshots = false

[[mirrors]]
id = "proxy"
url = "https://proxy.example/maven"
mirror_of = "external:*,!corp"

[properties]
"java.version" = "17"

[profiles]
active = ["ci"]

[credentials.corp]
username = "deploy"
password = "secret"
"#;
        let config = parse_pommel_toml(toml).unwrap();
        let settings = config.settings();
        assert!(settings.offline);
        assert_eq!(settings.concurrency, 4);
        assert_eq!(settings.checksum_policy, ChecksumPolicy::Fail);
        assert_eq!(settings.local_repository, Utf8PathBuf::from("/var/cache/pommel"));

        let repos = config.repository_descriptors();
        assert_eq!(repos.len(), 2);
        assert_eq!(repos[0].id, "corp");
        assert!(!repos[0].allows(true));
        assert_eq!(repos[1].id, "central");

        assert_eq!(config.mirror_list()[0].mirror_of, "external:*,!corp");
        assert_eq!(config.properties["java.version"], "17");
        assert_eq!(config.profiles.active, vec!["ci"]);
        assert_eq!(config.credentials["corp"].username.as_deref(), Some("deploy"));
    }

    #[test]
    fn test_central_not_duplicated() {
        let toml = r#"
[[repositories]]
id = "central"
url = "https://mirror.example/central"
"#;
        let config = parse_pommel_toml(toml).unwrap();
        let repos = config.repository_descriptors();
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].url, "https://mirror.example/central");

        let no_central = parse_pommel_toml("[resolver]\ninclude_central = false").unwrap();
        assert!(no_central.repository_descriptors().is_empty());
    }

    #[test]
    fn test_syntax_error_location() {
        let err = parse_pommel_toml("[resolver]\noffline = \n").unwrap_err();
        match err {
            PommelError::TomlParse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validation_errors() {
        let dup = r#"
[[repositories]]
id = "a"
url = "https://a.example"
[[repositories]]
id = "a"
url = "https://b.example"
"#;
        assert!(matches!(
            parse_pommel_toml(dup),
            Err(PommelError::ConfigValidation { .. })
        ));

        let bad_url = "[[repositories]]\nid = \"a\"\nurl = \"not a url\"\n";
        assert!(parse_pommel_toml(bad_url).is_err());

        assert!(parse_pommel_toml("[resolver]\nconcurrency = 0").is_err());
        assert!(parse_pommel_toml("[resolver]\nchecksum_policy = \"maybe\"").is_err());
        assert!(parse_pommel_toml("[credentials.x]\npassword = \"p\"").is_err());
    }

    #[test]
    fn test_section_fallthrough() {
        let project = ResolverSection {
            concurrency: Some(2),
            ..ResolverSection::default()
        };
        let global = ResolverSection {
            concurrency: Some(16),
            offline: Some(true),
            ..ResolverSection::default()
        };
        let merged = project.or(global);
        assert_eq!(merged.concurrency, Some(2));
        assert_eq!(merged.offline, Some(true));
    }

    #[test]
    fn test_serialize_round_trip() {
        let config = parse_pommel_toml("[resolver]\nmax_retries = 1\n[properties]\na = \"b\"").unwrap();
        let text = serialize_pommel_toml(&config).unwrap();
        assert_eq!(parse_pommel_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_locate() {
        assert_eq!(locate("abc\ndef", 5), (2, 2));
        assert_eq!(locate("abc", 0), (1, 1));
    }
}
