//! Version range restrictions: `[1.0,2.0)`, `(,1.5]`, `[1.2,)`, `[1.0]`
//! and unions such as `(,1.0],[1.2,)`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PommelError;
use crate::types::version::Version;

/// One bracketed interval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restriction {
    pub lower: Option<Version>,
    pub lower_inclusive: bool,
    pub upper: Option<Version>,
    pub upper_inclusive: bool,
}

/// A union of restrictions; a version matches if any restriction holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRange {
    restrictions: Vec<Restriction>,
}

impl Restriction {
    pub fn contains(&self, version: &Version) -> bool {
        if let Some(lower) = &self.lower {
            let ok = if self.lower_inclusive {
                version >= lower
            } else {
                version > lower
            };
            if !ok {
                return false;
            }
        }
        if let Some(upper) = &self.upper {
            let ok = if self.upper_inclusive {
                version <= upper
            } else {
                version < upper
            };
            if !ok {
                return false;
            }
        }
        true
    }

    fn parse(spec: &str, whole: &str) -> Result<Self, PommelError> {
        let invalid = |reason: &str| PommelError::InvalidVersion {
            input: whole.to_string(),
            reason: reason.to_string(),
        };

        let lower_inclusive = spec.starts_with('[');
        let upper_inclusive = spec.ends_with(']');
        let inner = spec[1..spec.len() - 1].trim();

        match inner.split_once(',') {
            None => {
                // `[1.0]` pins one version
                if !lower_inclusive || !upper_inclusive {
                    return Err(invalid("single version restriction must use []"));
                }
                let version = Version::parse(inner).map_err(|_| invalid("empty restriction"))?;
                Ok(Restriction {
                    lower: Some(version.clone()),
                    lower_inclusive: true,
                    upper: Some(version),
                    upper_inclusive: true,
                })
            }
            Some((low, high)) => {
                if high.contains(',') {
                    return Err(invalid("restriction has more than two bounds"));
                }
                let lower = bound(low)?;
                let upper = bound(high)?;
                if let (Some(lower), Some(upper)) = (&lower, &upper) {
                    if upper < lower {
                        return Err(invalid("upper bound is below lower bound"));
                    }
                    if upper == lower && !(lower_inclusive && upper_inclusive) {
                        return Err(invalid("empty restriction"));
                    }
                }
                // an open side is never inclusive
                Ok(Restriction {
                    lower_inclusive: lower_inclusive && lower.is_some(),
                    upper_inclusive: upper_inclusive && upper.is_some(),
                    lower,
                    upper,
                })
            }
        }
    }
}

fn bound(text: &str) -> Result<Option<Version>, PommelError> {
    let text = text.trim();
    if text.is_empty() {
        Ok(None)
    } else {
        Version::parse(text).map(Some)
    }
}

impl VersionRange {
    /// Whether a version string uses range syntax
    pub fn is_range(spec: &str) -> bool {
        let spec = spec.trim();
        spec.starts_with('[') || spec.starts_with('(')
    }

    pub fn parse(spec: &str) -> Result<Self, PommelError> {
        let invalid = |reason: &str| PommelError::InvalidVersion {
            input: spec.to_string(),
            reason: reason.to_string(),
        };

        let mut rest = spec.trim();
        let mut restrictions = Vec::new();
        while !rest.is_empty() {
            if !(rest.starts_with('[') || rest.starts_with('(')) {
                return Err(invalid("expected '[' or '('"));
            }
            let end = rest
                .find(|c| c == ']' || c == ')')
                .ok_or_else(|| invalid("unbalanced range brackets"))?;
            restrictions.push(Restriction::parse(&rest[..=end], spec)?);
            rest = rest[end + 1..].trim_start();
            if let Some(next) = rest.strip_prefix(',') {
                rest = next.trim_start();
                if rest.is_empty() {
                    return Err(invalid("trailing ',' in range"));
                }
            }
        }

        if restrictions.is_empty() {
            return Err(invalid("range is empty"));
        }
        Ok(Self { restrictions })
    }

    pub fn restrictions(&self) -> &[Restriction] {
        &self.restrictions
    }

    pub fn contains(&self, version: &Version) -> bool {
        self.restrictions.iter().any(|r| r.contains(version))
    }

    /// The single pinned version of a `[x]` range
    pub fn pinned(&self) -> Option<&Version> {
        match self.restrictions.as_slice() {
            [Restriction {
                lower: Some(lower),
                upper: Some(upper),
                lower_inclusive: true,
                upper_inclusive: true,
            }] if lower == upper => Some(lower),
            _ => None,
        }
    }
}

impl FromStr for VersionRange {
    type Err = PommelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionRange::parse(s)
    }
}

impl fmt::Display for Restriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Some(lower), Some(upper)) = (&self.lower, &self.upper) {
            if lower == upper && self.lower_inclusive && self.upper_inclusive {
                return write!(f, "[{}]", lower);
            }
        }
        f.write_str(if self.lower_inclusive { "[" } else { "(" })?;
        if let Some(lower) = &self.lower {
            write!(f, "{}", lower)?;
        }
        f.write_str(",")?;
        if let Some(upper) = &self.upper {
            write!(f, "{}", upper)?;
        }
        f.write_str(if self.upper_inclusive { "]" } else { ")" })
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.restrictions.iter().map(|r| r.to_string()).collect();
        f.write_str(&parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_half_open_range() {
        let range = VersionRange::parse("[1.0,2.0)").unwrap();
        assert!(range.contains(&v("1.0")));
        assert!(range.contains(&v("1.9.9")));
        assert!(!range.contains(&v("2.0")));
        assert!(!range.contains(&v("0.9")));
        // pre-releases of the upper bound sort below it
        assert!(range.contains(&v("2.0-SNAPSHOT")));
    }

    #[test]
    fn test_unbounded_sides() {
        let upper_only = VersionRange::parse("(,1.5]").unwrap();
        assert!(upper_only.contains(&v("0.1")));
        assert!(upper_only.contains(&v("1.5")));
        assert!(!upper_only.contains(&v("1.5.1")));

        let lower_only = VersionRange::parse("[1.2,)").unwrap();
        assert!(lower_only.contains(&v("99")));
        assert!(!lower_only.contains(&v("1.1")));
    }

    #[test]
    fn test_pinned_and_union() {
        let pinned = VersionRange::parse("[1.0]").unwrap();
        assert_eq!(pinned.pinned(), Some(&v("1.0")));
        assert!(pinned.contains(&v("1.0.0")));
        assert!(!pinned.contains(&v("1.0.1")));

        let union = VersionRange::parse("(,1.0],[1.2,)").unwrap();
        assert_eq!(union.restrictions().len(), 2);
        assert!(union.contains(&v("0.5")));
        assert!(!union.contains(&v("1.1")));
        assert!(union.contains(&v("1.2")));
        assert_eq!(union.to_string(), "(,1.0],[1.2,)");
    }

    #[test]
    fn test_invalid_ranges() {
        assert!(VersionRange::parse("[2.0,1.0]").is_err());
        assert!(VersionRange::parse("[1.0,2.0").is_err());
        assert!(VersionRange::parse("(1.0)").is_err());
        assert!(VersionRange::parse("[1.0,2.0),").is_err());
        assert!(VersionRange::parse("1.0").is_err());
        assert!(VersionRange::parse("(1.0,1.0)").is_err());
    }

    #[test]
    fn test_is_range() {
        assert!(VersionRange::is_range("[1.0,)"));
        assert!(VersionRange::is_range(" (,2]"));
        assert!(!VersionRange::is_range("1.0"));
    }
}
