//! Repository descriptors, per-kind policies and mirror rewriting.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PommelError;

/// Id of the default remote repository
pub const CENTRAL_ID: &str = "central";

/// URL of the default remote repository
pub const CENTRAL_URL: &str = "https://repo.maven.apache.org/maven2";

/// What to do when a downloaded file does not match its published checksum
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumPolicy {
    /// Treat the attempt as errored and continue with the next repository
    Fail,
    /// Accept the file and record a non-fatal failure
    #[default]
    Warn,
    /// Do not download checksums at all
    Ignore,
}

/// Enablement of one version kind (releases or snapshots)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryPolicy {
    pub enabled: bool,
    pub checksum_policy: Option<ChecksumPolicy>,
}

/// A remote (or file) repository. Order in a repository list is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryDescriptor {
    pub id: String,
    pub url: String,
    pub releases: RepositoryPolicy,
    pub snapshots: RepositoryPolicy,
}

/// A mirror replacing the repositories its `mirror_of` pattern matches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mirror {
    pub id: String,
    pub url: String,
    pub mirror_of: String,
}

impl ChecksumPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChecksumPolicy::Fail => "fail",
            ChecksumPolicy::Warn => "warn",
            ChecksumPolicy::Ignore => "ignore",
        }
    }
}

impl FromStr for ChecksumPolicy {
    type Err = PommelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(ChecksumPolicy::Fail),
            "warn" => Ok(ChecksumPolicy::Warn),
            "ignore" => Ok(ChecksumPolicy::Ignore),
            other => Err(PommelError::ConfigValidation {
                field: "checksum_policy".to_string(),
                reason: format!("unknown policy '{}', expected fail, warn or ignore", other),
            }),
        }
    }
}

impl fmt::Display for ChecksumPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for RepositoryPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            checksum_policy: None,
        }
    }
}

impl RepositoryPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            checksum_policy: None,
        }
    }
}

impl RepositoryDescriptor {
    /// Repository with releases and snapshots enabled
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into().trim_end_matches('/').to_string(),
            releases: RepositoryPolicy::default(),
            snapshots: RepositoryPolicy::default(),
        }
    }

    /// The default remote repository. Snapshots are disabled there.
    pub fn central() -> Self {
        Self {
            snapshots: RepositoryPolicy::disabled(),
            ..Self::new(CENTRAL_ID, CENTRAL_URL)
        }
    }

    pub fn with_releases(mut self, enabled: bool) -> Self {
        self.releases.enabled = enabled;
        self
    }

    pub fn with_snapshots(mut self, enabled: bool) -> Self {
        self.snapshots.enabled = enabled;
        self
    }

    pub fn with_checksum_policy(mut self, policy: ChecksumPolicy) -> Self {
        self.releases.checksum_policy = Some(policy);
        self.snapshots.checksum_policy = Some(policy);
        self
    }

    /// Whether this repository may serve the requested version kind
    pub fn allows(&self, snapshot: bool) -> bool {
        if snapshot {
            self.snapshots.enabled
        } else {
            self.releases.enabled
        }
    }

    /// Checksum policy for a version kind, falling back to `default`
    pub fn checksum_policy(&self, snapshot: bool, default: ChecksumPolicy) -> ChecksumPolicy {
        let policy = if snapshot { &self.snapshots } else { &self.releases };
        policy.checksum_policy.unwrap_or(default)
    }

    /// Absolute URI of a repository-relative path
    pub fn resolve(&self, relative: &str) -> String {
        format!("{}/{}", self.url.trim_end_matches('/'), relative.trim_start_matches('/'))
    }

    pub fn is_file(&self) -> bool {
        self.url.starts_with("file:")
    }

    /// Neither a file repository nor served from the local host
    pub fn is_external(&self) -> bool {
        if self.is_file() {
            return false;
        }
        match url::Url::parse(&self.url) {
            Ok(parsed) => !matches!(parsed.host_str(), Some("localhost") | Some("127.0.0.1")),
            Err(_) => true,
        }
    }
}

impl fmt::Display for RepositoryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.url)
    }
}

impl Mirror {
    /// Evaluate the `mirror_of` pattern against a repository.
    ///
    /// Supports `*`, `external:*`, comma-separated ids and `!id` exclusions.
    pub fn matches(&self, repository: &RepositoryDescriptor) -> bool {
        let mut matched = false;
        for pattern in self.mirror_of.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if let Some(excluded) = pattern.strip_prefix('!') {
                if excluded == repository.id {
                    return false;
                }
            } else if pattern == repository.id {
                return true;
            } else if pattern == "*" || (pattern == "external:*" && repository.is_external()) {
                matched = true;
            }
        }
        matched
    }
}

/// Rewrite a repository list through mirrors.
///
/// Each repository is replaced by the first matching mirror (keeping its
/// policies); repositories collapsing onto the same mirror are kept once,
/// at the position of the first.
pub fn apply_mirrors(
    repositories: &[RepositoryDescriptor],
    mirrors: &[Mirror],
) -> Vec<RepositoryDescriptor> {
    let mut result: Vec<RepositoryDescriptor> = Vec::with_capacity(repositories.len());
    for repository in repositories {
        let rewritten = match mirrors.iter().find(|m| m.matches(repository)) {
            Some(mirror) => RepositoryDescriptor {
                id: mirror.id.clone(),
                url: mirror.url.trim_end_matches('/').to_string(),
                ..repository.clone()
            },
            None => repository.clone(),
        };
        if !result.iter().any(|r| r.id == rewritten.id) {
            result.push(rewritten);
        }
    }
    result
}
