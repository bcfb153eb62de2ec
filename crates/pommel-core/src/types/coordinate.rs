//! Project coordinates and repository path layout.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PommelError;

/// The (groupId, artifactId) pair used as the mediation key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupArtifact {
    pub group_id: String,
    pub artifact_id: String,
}

/// The (groupId, artifactId, version) identity of a resolvable unit.
///
/// Equality is exact string equality on all three fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coordinate {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
}

/// What is being fetched for a coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// The project descriptor (`.pom`)
    Descriptor,
    /// Artifact-level version listing (`g/a/maven-metadata.xml`)
    Metadata,
    /// Version-level snapshot listing (`g/a/v/maven-metadata.xml`)
    SnapshotMetadata,
}

impl GroupArtifact {
    pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
        }
    }

    /// Attach a version, producing a full coordinate
    pub fn with_version(&self, version: impl Into<String>) -> Coordinate {
        Coordinate::new(self.group_id.clone(), self.artifact_id.clone(), version)
    }

    /// Repository-relative directory: `org/example/lib`
    pub fn base_path(&self) -> String {
        format!("{}/{}", self.group_id.replace('.', "/"), self.artifact_id)
    }

    /// Repository-relative path of the artifact-level metadata
    pub fn metadata_path(&self) -> String {
        format!("{}/maven-metadata.xml", self.base_path())
    }
}

impl fmt::Display for GroupArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group_id, self.artifact_id)
    }
}

impl FromStr for GroupArtifact {
    type Err = PommelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split(':').collect::<Vec<_>>().as_slice() {
            [group, artifact] if !group.is_empty() && !artifact.is_empty() => {
                Ok(GroupArtifact::new(*group, *artifact))
            }
            _ => Err(PommelError::InvalidCoordinate {
                input: s.to_string(),
                reason: "expected groupId:artifactId".to_string(),
            }),
        }
    }
}

impl Coordinate {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: version.into(),
        }
    }

    /// The mediation key of this coordinate
    pub fn group_artifact(&self) -> GroupArtifact {
        GroupArtifact::new(self.group_id.clone(), self.artifact_id.clone())
    }

    /// Whether this coordinate names a snapshot version
    pub fn is_snapshot(&self) -> bool {
        crate::types::version::is_snapshot_string(&self.version)
    }

    /// Repository-relative directory: `org/example/lib/1.0`
    pub fn version_path(&self) -> String {
        format!("{}/{}", self.group_artifact().base_path(), self.version)
    }

    /// Repository-relative descriptor path:
    /// `org/example/lib/1.0/lib-1.0.pom`
    pub fn descriptor_path(&self) -> String {
        self.file_path(&self.version, "pom")
    }

    /// Repository-relative path of a file under this version directory,
    /// where `file_version` may differ from the directory version for
    /// timestamped snapshots.
    pub fn file_path(&self, file_version: &str, extension: &str) -> String {
        format!(
            "{}/{}-{}.{}",
            self.version_path(),
            self.artifact_id,
            file_version,
            extension
        )
    }

    /// Repository-relative path of the version-level snapshot metadata
    pub fn snapshot_metadata_path(&self) -> String {
        format!("{}/maven-metadata.xml", self.version_path())
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)
    }
}

impl FromStr for Coordinate {
    type Err = PommelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split(':').collect::<Vec<_>>().as_slice() {
            [group, artifact, version]
                if !group.is_empty() && !artifact.is_empty() && !version.is_empty() =>
            {
                Ok(Coordinate::new(*group, *artifact, *version))
            },
            _ => Err(PommelError::InvalidCoordinate {
                input: s.to_string(),
                reason: "expected groupId:artifactId:version".to_string(),
            }),
        }
    }
}
