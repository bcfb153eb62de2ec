//! Dependency declarations, scopes and exclusions.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::coordinate::{Coordinate, GroupArtifact};

/// Dependency applicability classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Compile,
    Provided,
    Runtime,
    Test,
    System,
    Import,
}

/// A groupId/artifactId pattern removed from a dependency's subtree.
/// Either side may be the wildcard `*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Exclusion {
    pub group_id: String,
    pub artifact_id: String,
}

/// A declared dependency, exactly as written (after interpolation).
///
/// `version` may be absent (managed) or a dynamic selector; `scope` is kept
/// as text so that unknown values can be reported once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub classifier: Option<String>,
    pub scope: Option<String>,
    pub optional: bool,
    pub exclusions: Vec<Exclusion>,
    pub system_path: Option<String>,
}

impl Scope {
    pub const ALL: [Scope; 6] = [
        Scope::Compile,
        Scope::Provided,
        Scope::Runtime,
        Scope::Test,
        Scope::System,
        Scope::Import,
    ];

    /// The resolved-graph buckets, in output order
    pub const BUCKETS: [Scope; 4] = [Scope::Compile, Scope::Runtime, Scope::Test, Scope::Provided];

    /// Parse a scope name; `None` for unknown names
    pub fn parse(name: &str) -> Option<Scope> {
        match name.trim().to_ascii_lowercase().as_str() {
            "compile" => Some(Scope::Compile),
            "provided" => Some(Scope::Provided),
            "runtime" => Some(Scope::Runtime),
            "test" => Some(Scope::Test),
            "system" => Some(Scope::System),
            "import" => Some(Scope::Import),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Compile => "compile",
            Scope::Provided => "provided",
            Scope::Runtime => "runtime",
            Scope::Test => "test",
            Scope::System => "system",
            Scope::Import => "import",
        }
    }

    /// Scope of a transitive dependency declared with `declared` inside a
    /// dependency that is itself in scope `self`. `None` means the
    /// transitive dependency is dropped.
    pub fn transitive(self, declared: Scope) -> Option<Scope> {
        match declared {
            Scope::Compile => match self {
                Scope::Compile => Some(Scope::Compile),
                Scope::Provided => Some(Scope::Provided),
                Scope::Runtime => Some(Scope::Runtime),
                Scope::Test => Some(Scope::Test),
                Scope::System | Scope::Import => None,
            },
            Scope::Runtime => match self {
                Scope::Compile | Scope::Runtime => Some(Scope::Runtime),
                Scope::Provided => Some(Scope::Provided),
                Scope::Test => Some(Scope::Test),
                Scope::System | Scope::Import => None,
            },
            Scope::Provided | Scope::Test | Scope::System | Scope::Import => None,
        }
    }

    /// Whether an entry of this scope belongs to the given output bucket
    pub fn in_bucket(self, bucket: Scope) -> bool {
        match bucket {
            Scope::Compile => matches!(self, Scope::Compile | Scope::Provided | Scope::System),
            Scope::Runtime => matches!(self, Scope::Compile | Scope::Runtime),
            Scope::Test => self != Scope::Import,
            Scope::Provided => matches!(self, Scope::Provided | Scope::System),
            Scope::System | Scope::Import => false,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Exclusion {
    pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
        }
    }

    pub fn matches(&self, ga: &GroupArtifact) -> bool {
        (self.group_id == "*" || self.group_id == ga.group_id)
            && (self.artifact_id == "*" || self.artifact_id == ga.artifact_id)
    }
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group_id, self.artifact_id)
    }
}

impl Dependency {
    /// Create a plain jar dependency
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: Option<&str>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: version.map(str::to_string),
            kind: "jar".to_string(),
            classifier: None,
            scope: None,
            optional: false,
            exclusions: Vec::new(),
            system_path: None,
        }
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope.as_str().to_string());
        self
    }

    pub fn with_exclusion(mut self, exclusion: Exclusion) -> Self {
        self.exclusions.push(exclusion);
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn group_artifact(&self) -> GroupArtifact {
        GroupArtifact::new(self.group_id.clone(), self.artifact_id.clone())
    }

    /// Coordinate with the declared version, if there is one
    pub fn coordinate(&self) -> Option<Coordinate> {
        self.version
            .as_ref()
            .map(|v| Coordinate::new(self.group_id.clone(), self.artifact_id.clone(), v.clone()))
    }

    /// Parsed scope, `None` when undeclared or unknown
    pub fn declared_scope(&self) -> Option<Scope> {
        self.scope.as_deref().and_then(Scope::parse)
    }

    /// Declared scope with unknown or missing values treated as compile
    pub fn scope_or_default(&self) -> Scope {
        self.declared_scope().unwrap_or(Scope::Compile)
    }

    /// Whether a scope was written but is not a known scope name
    pub fn has_unknown_scope(&self) -> bool {
        matches!(&self.scope, Some(s) if Scope::parse(s).is_none())
    }

    /// `groupId:artifactId:type[:classifier]`, the key dependencyManagement
    /// entries and inherited dependencies are merged by
    pub fn management_key(&self) -> String {
        match &self.classifier {
            Some(classifier) => format!(
                "{}:{}:{}:{}",
                self.group_id, self.artifact_id, self.kind, classifier
            ),
            None => format!("{}:{}:{}", self.group_id, self.artifact_id, self.kind),
        }
    }

    pub fn is_bom_import(&self) -> bool {
        self.declared_scope() == Some(Scope::Import) && self.kind == "pom"
    }
}
