//! Non-fatal resolution failures.
//!
//! A resolution always completes; anything it could not resolve becomes a
//! [`ResolutionFailure`] appended to a shared [`FailureSink`] and attached
//! to the result.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::coordinate::{Coordinate, GroupArtifact};

/// Terminal outcome of asking one repository for one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Found,
    /// Authoritatively not there (`404`, missing file)
    Absent { status: Option<u16> },
    /// Unreachable, timed out, server error or unparseable response
    Errored { reason: String },
    /// Not asked: policy excludes the version kind, offline, or cancelled
    Skipped { reason: String },
    ChecksumMismatch { expected: String, actual: String },
}

/// One repository attempt with the URI that was requested
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryAttempt {
    pub repository_id: String,
    pub uri: String,
    pub outcome: AttemptOutcome,
}

/// Closed set of non-fatal failure categories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// `${key}` never found in any scope
    UnresolvedProperty { key: String },
    /// `${key}` is self-referential or nests deeper than the bound
    PropertyCycle { key: String },
    /// Parent descriptor could not be located locally or remotely
    MissingParent,
    /// Descriptor of a dependency could not be fetched
    UnresolvableDependency,
    /// Version listing could not be fetched from any repository
    MetadataUnavailable,
    /// No published version satisfies the expression
    NoMatchingVersion { expression: String },
    /// Found, but only after other repositories reported it absent
    RepositoryMiss,
    /// Accepted under the `warn` checksum policy despite a mismatch
    ChecksumMismatch,
    /// Scope text is not a known scope; treated as compile
    InvalidScope { scope: String },
    /// A fetched descriptor is structurally invalid
    InvalidDescriptor { reason: String },
    /// A BOM import chain refers back to itself
    ImportCycle,
    /// Relocation chain loops or exceeds the hop limit
    RelocationLoop,
}

/// A non-fatal failure for one coordinate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionFailure {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Option<String>,
    pub kind: FailureKind,
    pub attempts: Vec<RepositoryAttempt>,
    /// Where the failure was observed (descriptor path or requesting coordinate)
    pub context: Option<String>,
}

/// Append-only, merge-safe failure collection shared across workers
#[derive(Debug, Clone, Default)]
pub struct FailureSink {
    inner: Arc<Mutex<Vec<ResolutionFailure>>>,
}

impl AttemptOutcome {
    /// Definitive answers end the search for a coordinate in this repository
    pub fn is_definitive(&self) -> bool {
        matches!(self, AttemptOutcome::Found | AttemptOutcome::Absent { .. })
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptOutcome::Found => f.write_str("found"),
            AttemptOutcome::Absent { status: Some(status) } => write!(f, "not found (HTTP {})", status),
            AttemptOutcome::Absent { status: None } => f.write_str("not found"),
            AttemptOutcome::Errored { reason } => write!(f, "error: {}", reason),
            AttemptOutcome::Skipped { reason } => write!(f, "skipped: {}", reason),
            AttemptOutcome::ChecksumMismatch { expected, actual } => {
                write!(f, "checksum mismatch (expected {}, got {})", expected, actual)
            }
        }
    }
}

impl RepositoryAttempt {
    pub fn new(repository_id: impl Into<String>, uri: impl Into<String>, outcome: AttemptOutcome) -> Self {
        Self {
            repository_id: repository_id.into(),
            uri: uri.into(),
            outcome,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::UnresolvedProperty { key } => write!(f, "unresolved property ${{{}}}", key),
            FailureKind::PropertyCycle { key } => write!(f, "cyclic property ${{{}}}", key),
            FailureKind::MissingParent => f.write_str("parent descriptor not found"),
            FailureKind::UnresolvableDependency => f.write_str("descriptor could not be resolved"),
            FailureKind::MetadataUnavailable => f.write_str("version metadata unavailable"),
            FailureKind::NoMatchingVersion { expression } => {
                write!(f, "no published version matches '{}'", expression)
            }
            FailureKind::RepositoryMiss => f.write_str("missing from earlier repositories"),
            FailureKind::ChecksumMismatch => f.write_str("checksum mismatch accepted"),
            FailureKind::InvalidScope { scope } => write!(f, "unknown scope '{}', using compile", scope),
            FailureKind::InvalidDescriptor { reason } => write!(f, "invalid descriptor: {}", reason),
            FailureKind::ImportCycle => f.write_str("cyclic BOM import"),
            FailureKind::RelocationLoop => f.write_str("relocation loop"),
        }
    }
}

impl ResolutionFailure {
    pub fn for_coordinate(coordinate: &Coordinate, kind: FailureKind) -> Self {
        Self {
            group_id: coordinate.group_id.clone(),
            artifact_id: coordinate.artifact_id.clone(),
            version: Some(coordinate.version.clone()),
            kind,
            attempts: Vec::new(),
            context: None,
        }
    }

    pub fn for_artifact(ga: &GroupArtifact, kind: FailureKind) -> Self {
        Self {
            group_id: ga.group_id.clone(),
            artifact_id: ga.artifact_id.clone(),
            version: None,
            kind,
            attempts: Vec::new(),
            context: None,
        }
    }

    pub fn with_attempts(mut self, attempts: Vec<RepositoryAttempt>) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn group_artifact(&self) -> GroupArtifact {
        GroupArtifact::new(self.group_id.clone(), self.artifact_id.clone())
    }

    /// Coordinate text, `g:a` when no version is known
    pub fn subject(&self) -> String {
        match &self.version {
            Some(version) => format!("{}:{}:{}", self.group_id, self.artifact_id, version),
            None => format!("{}:{}", self.group_id, self.artifact_id),
        }
    }
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subject(), self.kind)?;
        if let Some(context) = &self.context {
            write!(f, " (in {})", context)?;
        }
        for attempt in &self.attempts {
            write!(f, "\n  - {} {}: {}", attempt.repository_id, attempt.uri, attempt.outcome)?;
        }
        Ok(())
    }
}

impl FailureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, failure: ResolutionFailure) {
        tracing::debug!("recorded failure: {}", failure);
        self.inner.lock().push(failure);
    }

    pub fn extend(&self, failures: impl IntoIterator<Item = ResolutionFailure>) {
        self.inner.lock().extend(failures);
    }

    /// Append everything another sink collected
    pub fn merge(&self, other: &FailureSink) {
        if Arc::ptr_eq(&self.inner, &other.inner) {
            return;
        }
        let theirs = other.snapshot();
        self.extend(theirs);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Copy of everything recorded so far, in recording order
    pub fn snapshot(&self) -> Vec<ResolutionFailure> {
        self.inner.lock().clone()
    }
}
