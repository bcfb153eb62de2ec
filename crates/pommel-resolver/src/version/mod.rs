//! Dynamic version selection
//!
//! A version expression is parsed once into a closed [`VersionSelector`]
//! and evaluated against the published versions of an artifact. Every kind
//! has one deterministic matching rule; the highest matching version wins.

use std::fmt;

use pommel_core::error::PommelError;
use pommel_core::{Version, VersionRange};

use crate::ResolverResult;

/// A parsed version expression
#[derive(Debug, Clone, PartialEq)]
pub enum VersionSelector {
    /// A plain version, used as is
    Exact(Version),
    /// Maven range syntax, `[1.0,2.0)` and unions of restrictions
    Range(VersionRange),
    /// `latest.release` / `RELEASE`: highest non-snapshot version
    LatestRelease,
    /// `latest.integration` / `latest` / `LATEST`: highest version
    LatestAny,
    /// `latest.patch`: highest release sharing major.minor with the base.
    /// Without a base, the current version is used.
    LatestPatchRelativeTo(Option<Version>),
    /// `latest.minor`: highest release sharing the major with the base
    LatestMinorRelativeTo(Option<Version>),
    /// `^1.2.3`: no change to the leftmost non-zero component
    Caret(Version),
    /// `~1.2`: patch-level changes, or minor-level for `~1`
    Tilde { base: Version, components: usize },
    /// `1.0 - 2.0`, both ends inclusive
    Hyphen { lower: Version, upper: Version },
    /// `1.x`, `1.2.+`, `*`: numeric prefix match
    XRange { prefix: Vec<u64> },
}

/// Why no version was selected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("no published version matches '{expression}'")]
    NoMatch { expression: String },

    #[error("'{expression}' selects {selected}, which is older than the current {current}")]
    WouldDowngrade {
        expression: String,
        selected: String,
        current: String,
    },
}

impl VersionSelector {
    /// Parse a version expression
    pub fn parse(expression: &str) -> ResolverResult<Self> {
        let text = expression.trim();
        if text.is_empty() {
            return Err(PommelError::InvalidVersion {
                input: expression.to_string(),
                reason: "version expression is empty".to_string(),
            });
        }

        match text {
            "latest.release" | "RELEASE" => return Ok(VersionSelector::LatestRelease),
            "latest.integration" | "latest" | "LATEST" => return Ok(VersionSelector::LatestAny),
            "latest.patch" => return Ok(VersionSelector::LatestPatchRelativeTo(None)),
            "latest.minor" => return Ok(VersionSelector::LatestMinorRelativeTo(None)),
            _ => {}
        }

        if VersionRange::is_range(text) {
            return VersionRange::parse(text).map(VersionSelector::Range);
        }
        if let Some(rest) = text.strip_prefix('^') {
            return Version::parse(rest).map(VersionSelector::Caret);
        }
        if let Some(rest) = text.strip_prefix('~') {
            let rest = rest.trim_start_matches('>').trim();
            let components = rest.split('.').count();
            return Ok(VersionSelector::Tilde {
                base: Version::parse(rest)?,
                components,
            });
        }
        if let Some((lower, upper)) = text.split_once(" - ") {
            return Ok(VersionSelector::Hyphen {
                lower: Version::parse(lower)?,
                upper: Version::parse(upper)?,
            });
        }
        if let Some(prefix) = x_range_prefix(text) {
            return Ok(VersionSelector::XRange { prefix });
        }
        Version::parse(text).map(VersionSelector::Exact)
    }

    /// Whether metadata is needed to evaluate this selector
    pub fn is_dynamic(&self) -> bool {
        !matches!(self, VersionSelector::Exact(_))
    }

    /// Fix the base of a relative selector
    pub fn relative_to(self, base: Version) -> Self {
        match self {
            VersionSelector::LatestPatchRelativeTo(None) => VersionSelector::LatestPatchRelativeTo(Some(base)),
            VersionSelector::LatestMinorRelativeTo(None) => VersionSelector::LatestMinorRelativeTo(Some(base)),
            other => other,
        }
    }

    /// Whether `candidate` satisfies the selector. `current` stands in for
    /// a missing relative base.
    pub fn matches(&self, candidate: &Version, current: Option<&Version>) -> bool {
        match self {
            VersionSelector::Exact(version) => candidate == version,
            VersionSelector::Range(range) => {
                range.contains(candidate) && (!candidate.is_snapshot() || range_mentions_snapshot(range))
            }
            VersionSelector::LatestRelease => !candidate.is_snapshot(),
            VersionSelector::LatestAny => true,
            VersionSelector::LatestPatchRelativeTo(base) => match base.as_ref().or(current) {
                Some(base) => {
                    !candidate.is_snapshot()
                        && candidate.major() == base.major()
                        && candidate.minor() == base.minor()
                        && candidate >= base
                }
                None => false,
            },
            VersionSelector::LatestMinorRelativeTo(base) => match base.as_ref().or(current) {
                Some(base) => !candidate.is_snapshot() && candidate.major() == base.major() && candidate >= base,
                None => false,
            },
            VersionSelector::Caret(base) => {
                if !stable_or_like(candidate, base) || candidate < base {
                    return false;
                }
                if base.major() > 0 {
                    candidate.major() == base.major()
                } else if base.minor() > 0 {
                    candidate.major() == 0 && candidate.minor() == base.minor()
                } else {
                    candidate.major() == 0 && candidate.minor() == 0 && candidate.patch() == base.patch()
                }
            }
            VersionSelector::Tilde { base, components } => {
                if !stable_or_like(candidate, base) || candidate < base {
                    return false;
                }
                if *components >= 2 {
                    candidate.major() == base.major() && candidate.minor() == base.minor()
                } else {
                    candidate.major() == base.major()
                }
            }
            VersionSelector::Hyphen { lower, upper } => {
                !candidate.is_prerelease() && candidate >= lower && candidate <= upper
            }
            VersionSelector::XRange { prefix } => {
                !candidate.is_prerelease()
                    && prefix
                        .iter()
                        .enumerate()
                        .all(|(index, wanted)| candidate.component(index) == *wanted)
            }
        }
    }

    /// Pick the highest candidate the selector accepts.
    ///
    /// Unless `allow_downgrade` is set, a selection below `current` is an
    /// error rather than a silent downgrade.
    pub fn select(
        &self,
        candidates: &[Version],
        current: Option<&Version>,
        allow_downgrade: bool,
    ) -> Result<Version, SelectionError> {
        let selected = candidates
            .iter()
            .filter(|candidate| self.matches(candidate, current))
            .max()
            .cloned()
            .ok_or_else(|| SelectionError::NoMatch {
                expression: self.to_string(),
            })?;

        match current {
            Some(current) if !allow_downgrade && selected < *current => Err(SelectionError::WouldDowngrade {
                expression: self.to_string(),
                selected: selected.to_string(),
                current: current.to_string(),
            }),
            _ => Ok(selected),
        }
    }
}

/// Snapshots and pre-releases only match semver-style constraints whose
/// base is itself one
fn stable_or_like(candidate: &Version, base: &Version) -> bool {
    !candidate.is_prerelease() || base.is_prerelease()
}

fn range_mentions_snapshot(range: &VersionRange) -> bool {
    range.restrictions().iter().any(|r| {
        r.lower.as_ref().map(Version::is_snapshot).unwrap_or(false)
            || r.upper.as_ref().map(Version::is_snapshot).unwrap_or(false)
    })
}

/// Numeric prefix of an x-range, `None` when `text` is not one
fn x_range_prefix(text: &str) -> Option<Vec<u64>> {
    let wildcard = |part: &str| matches!(part, "x" | "X" | "*" | "+");
    let parts: Vec<&str> = text.split('.').collect();
    let (last, head) = parts.split_last()?;
    if !wildcard(last) {
        return None;
    }
    head.iter().map(|part| part.parse::<u64>().ok()).collect()
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSelector::Exact(version) => write!(f, "{}", version),
            VersionSelector::Range(range) => write!(f, "{}", range),
            VersionSelector::LatestRelease => f.write_str("latest.release"),
            VersionSelector::LatestAny => f.write_str("latest.integration"),
            VersionSelector::LatestPatchRelativeTo(Some(base)) => write!(f, "latest.patch from {}", base),
            VersionSelector::LatestPatchRelativeTo(None) => f.write_str("latest.patch"),
            VersionSelector::LatestMinorRelativeTo(Some(base)) => write!(f, "latest.minor from {}", base),
            VersionSelector::LatestMinorRelativeTo(None) => f.write_str("latest.minor"),
            VersionSelector::Caret(base) => write!(f, "^{}", base),
            VersionSelector::Tilde { base, .. } => write!(f, "~{}", base),
            VersionSelector::Hyphen { lower, upper } => write!(f, "{} - {}", lower, upper),
            VersionSelector::XRange { prefix } => {
                for component in prefix {
                    write!(f, "{}.", component)?;
                }
                f.write_str("x")
            }
        }
    }
}
