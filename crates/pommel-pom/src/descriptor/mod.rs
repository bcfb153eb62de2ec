//! Semantic project descriptor.
//!
//! Built from a [`RawDescriptor`] once per parsed document and never mutated
//! afterwards; inheritance, profile injection and interpolation all produce
//! new values.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use pommel_core::types::{ChecksumPolicy, RepositoryPolicy};
use pommel_core::utils::resolve_descriptor_path;
use pommel_core::{
    Coordinate, Dependency, Exclusion, PommelError, PommelResult, RepositoryDescriptor,
};

use crate::raw::{RawActivation, RawDependency, RawDescriptor, RawPlugin, RawProfile, RawRepository};

/// Default `relativePath` of a parent reference
pub const DEFAULT_RELATIVE_PATH: &str = "../pom.xml";

/// Group assumed for plugins that do not declare one
pub const DEFAULT_PLUGIN_GROUP: &str = "org.apache.maven.plugins";

/// Reference to a parent descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parent {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
    /// `None` means the default path; `Some("")` disables local lookup
    pub relative_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugin {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Option<String>,
    pub dependencies: Vec<Dependency>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsActivation {
    pub name: Option<String>,
    pub family: Option<String>,
    pub arch: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyActivation {
    /// May start with `!` to require absence
    pub name: String,
    /// May start with `!` to require a different value
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileActivation {
    pub exists: Option<String>,
    pub missing: Option<String>,
}

/// Activation conditions of a profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activation {
    pub active_by_default: bool,
    pub jdk: Option<String>,
    pub os: Option<OsActivation>,
    pub property: Option<PropertyActivation>,
    pub file: Option<FileActivation>,
}

/// Conditionally applied contributions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub activation: Option<Activation>,
    pub properties: IndexMap<String, String>,
    pub dependencies: Vec<Dependency>,
    pub dependency_management: Vec<Dependency>,
    pub plugins: Vec<Plugin>,
    pub repositories: Vec<RepositoryDescriptor>,
    pub plugin_repositories: Vec<RepositoryDescriptor>,
    pub modules: Vec<String>,
}

/// `distributionManagement/relocation`: the artifact moved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relocation {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
    pub message: Option<String>,
}

/// The semantic project model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    pub model_version: Option<String>,
    /// `None` means inherited from the parent
    pub group_id: Option<String>,
    pub artifact_id: String,
    /// `None` means inherited from the parent
    pub version: Option<String>,
    pub packaging: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub parent: Option<Parent>,
    pub properties: IndexMap<String, String>,
    pub dependencies: Vec<Dependency>,
    pub dependency_management: Vec<Dependency>,
    pub plugins: Vec<Plugin>,
    pub plugin_management: Vec<Plugin>,
    pub repositories: Vec<RepositoryDescriptor>,
    pub plugin_repositories: Vec<RepositoryDescriptor>,
    pub modules: Vec<String>,
    pub profiles: Vec<Profile>,
    pub relocation: Option<Relocation>,
    /// Where the document came from (path or URI), for diagnostics
    pub location: String,
    /// Directory of a file-backed descriptor
    pub base_dir: Option<PathBuf>,
}

impl Parent {
    /// The relative path to try locally, if local lookup is enabled
    pub fn local_path(&self) -> Option<&str> {
        match self.relative_path.as_deref() {
            None => Some(DEFAULT_RELATIVE_PATH),
            Some("") => None,
            Some(path) => Some(path),
        }
    }

    /// Repository coordinate; needs all three fields
    pub fn coordinate(&self) -> Option<Coordinate> {
        match (&self.group_id, &self.artifact_id, &self.version) {
            (Some(g), Some(a), Some(v)) => Some(Coordinate::new(g.clone(), a.clone(), v.clone())),
            _ => None,
        }
    }

    /// Whether a located descriptor is the one this reference names.
    /// Fields missing from the reference are not checked.
    pub fn matches(&self, descriptor: &Descriptor) -> bool {
        let same = |wanted: &Option<String>, actual: Option<&str>| match wanted {
            Some(w) => actual == Some(w.as_str()),
            None => true,
        };
        same(&self.group_id, descriptor.effective_group_id())
            && same(&self.artifact_id, Some(descriptor.artifact_id.as_str()))
            && same(&self.version, descriptor.effective_version())
    }

    pub fn display(&self) -> String {
        format!(
            "{}:{}:{}",
            self.group_id.as_deref().unwrap_or("?"),
            self.artifact_id.as_deref().unwrap_or("?"),
            self.version.as_deref().unwrap_or("?")
        )
    }
}

impl Plugin {
    /// `groupId:artifactId`, the merge key for plugins
    pub fn key(&self) -> String {
        format!("{}:{}", self.group_id, self.artifact_id)
    }
}

impl Descriptor {
    /// Parse a document into a descriptor
    pub fn parse(text: &str, location: &str) -> PommelResult<Self> {
        let raw = RawDescriptor::parse(text, location)?;
        Self::from_raw(raw)
    }

    /// Read and parse a descriptor file
    pub fn from_file(path: &Path) -> PommelResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| PommelError::io(format!("Failed to read {}", path.display()), e))?;
        let mut descriptor = Self::parse(&text, &path.display().to_string())?;
        descriptor.base_dir = path.parent().map(Path::to_path_buf);
        Ok(descriptor)
    }

    /// Validate a raw document. Only a missing artifactId (or a dependency
    /// without group/artifact) is fatal; missing groupId and version are
    /// inherited.
    pub fn from_raw(raw: RawDescriptor) -> PommelResult<Self> {
        let location = raw.location.clone();
        let artifact_id = raw.artifact_id.ok_or_else(|| PommelError::MissingField {
            location: location.clone(),
            field: "artifactId".to_string(),
        })?;

        let profiles = raw
            .profiles
            .into_iter()
            .enumerate()
            .map(|(index, profile)| convert_profile(profile, index, &location))
            .collect::<PommelResult<Vec<_>>>()?;

        Ok(Descriptor {
            model_version: raw.model_version,
            group_id: raw.group_id,
            artifact_id,
            version: raw.version,
            packaging: raw.packaging,
            name: raw.name,
            description: raw.description,
            parent: raw.parent.map(|p| Parent {
                group_id: p.group_id,
                artifact_id: p.artifact_id,
                version: p.version,
                relative_path: p.relative_path,
            }),
            properties: raw.properties.into_iter().collect(),
            dependencies: convert_dependencies(raw.dependencies, "dependencies", &location)?,
            dependency_management: convert_dependencies(
                raw.dependency_management,
                "dependencyManagement.dependencies",
                &location,
            )?,
            plugins: convert_plugins(raw.plugins, "build.plugins", &location)?,
            plugin_management: convert_plugins(
                raw.plugin_management,
                "build.pluginManagement.plugins",
                &location,
            )?,
            repositories: convert_repositories(raw.repositories),
            plugin_repositories: convert_repositories(raw.plugin_repositories),
            modules: raw.modules,
            profiles,
            relocation: raw.relocation.map(|r| Relocation {
                group_id: r.group_id,
                artifact_id: r.artifact_id,
                version: r.version,
                message: r.message,
            }),
            location,
            base_dir: None,
        })
    }

    /// Attach the directory used for relative lookups and `${basedir}`
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Own groupId, else the parent reference's
    pub fn effective_group_id(&self) -> Option<&str> {
        self.group_id
            .as_deref()
            .or_else(|| self.parent.as_ref().and_then(|p| p.group_id.as_deref()))
    }

    /// Own version, else the parent reference's
    pub fn effective_version(&self) -> Option<&str> {
        self.version
            .as_deref()
            .or_else(|| self.parent.as_ref().and_then(|p| p.version.as_deref()))
    }

    /// Packaging with the `jar` default applied
    pub fn packaging(&self) -> &str {
        self.packaging.as_deref().unwrap_or("jar")
    }

    /// Coordinate, once groupId and version are known
    pub fn coordinate(&self) -> Option<Coordinate> {
        Some(Coordinate::new(
            self.effective_group_id()?,
            self.artifact_id.clone(),
            self.effective_version()?,
        ))
    }

    /// `g:a:v` with `?` for unknown parts
    pub fn id(&self) -> String {
        format!(
            "{}:{}:{}",
            self.effective_group_id().unwrap_or("?"),
            self.artifact_id,
            self.effective_version().unwrap_or("?")
        )
    }

    /// Local file a parent reference points at, if local lookup applies
    pub fn parent_path(&self) -> Option<PathBuf> {
        let parent = self.parent.as_ref()?;
        let base = self.base_dir.as_ref()?;
        parent.local_path().map(|rel| resolve_descriptor_path(base, rel))
    }

    /// Managed dependency for a dependency's management key
    pub fn managed(&self, dependency: &Dependency) -> Option<&Dependency> {
        let key = dependency.management_key();
        self.dependency_management
            .iter()
            .find(|managed| managed.management_key() == key)
    }
}

fn convert_dependencies(
    raw: Vec<RawDependency>,
    path: &str,
    location: &str,
) -> PommelResult<Vec<Dependency>> {
    raw.into_iter()
        .map(|dep| convert_dependency(dep, path, location))
        .collect()
}

fn convert_dependency(raw: RawDependency, path: &str, location: &str) -> PommelResult<Dependency> {
    let missing = |field: &str| PommelError::MissingField {
        location: location.to_string(),
        field: format!("{}.dependency.{}", path, field),
    };
    let group_id = raw.group_id.ok_or_else(|| missing("groupId"))?;
    let artifact_id = raw.artifact_id.ok_or_else(|| missing("artifactId"))?;

    Ok(Dependency {
        group_id,
        artifact_id,
        version: raw.version,
        kind: raw.kind.unwrap_or_else(|| "jar".to_string()),
        classifier: raw.classifier,
        scope: raw.scope,
        optional: raw
            .optional
            .map(|o| o.eq_ignore_ascii_case("true"))
            .unwrap_or(false),
        exclusions: raw
            .exclusions
            .into_iter()
            .filter_map(|e| match (e.group_id, e.artifact_id) {
                (Some(g), Some(a)) => Some(Exclusion::new(g, a)),
                (Some(g), None) => Some(Exclusion::new(g, "*")),
                (None, Some(a)) => Some(Exclusion::new("*", a)),
                (None, None) => None,
            })
            .collect(),
        system_path: raw.system_path,
    })
}

fn convert_plugins(raw: Vec<RawPlugin>, path: &str, location: &str) -> PommelResult<Vec<Plugin>> {
    raw.into_iter()
        .map(|plugin| {
            let artifact_id = plugin.artifact_id.ok_or_else(|| PommelError::MissingField {
                location: location.to_string(),
                field: format!("{}.plugin.artifactId", path),
            })?;
            Ok(Plugin {
                group_id: plugin.group_id.unwrap_or_else(|| DEFAULT_PLUGIN_GROUP.to_string()),
                artifact_id,
                version: plugin.version,
                dependencies: convert_dependencies(
                    plugin.dependencies,
                    &format!("{}.plugin.dependencies", path),
                    location,
                )?,
            })
        })
        .collect()
}

fn convert_repositories(raw: Vec<RawRepository>) -> Vec<RepositoryDescriptor> {
    raw.into_iter()
        .filter_map(|repo| {
            let Some(url) = repo.url else {
                tracing::warn!("ignoring repository {:?} without <url>", repo.id);
                return None;
            };
            let policy = |enabled: Option<String>, checksum: Option<String>| RepositoryPolicy {
                enabled: enabled.map(|e| !e.eq_ignore_ascii_case("false")).unwrap_or(true),
                checksum_policy: checksum.and_then(|c| c.parse::<ChecksumPolicy>().ok()),
            };
            let mut descriptor = RepositoryDescriptor::new(repo.id.unwrap_or_else(|| url.clone()), url);
            descriptor.releases = policy(repo.releases_enabled, repo.releases_checksum);
            descriptor.snapshots = policy(repo.snapshots_enabled, repo.snapshots_checksum);
            Some(descriptor)
        })
        .collect()
}

fn convert_activation(raw: RawActivation) -> Activation {
    let os = if raw.os_name.is_some()
        || raw.os_family.is_some()
        || raw.os_arch.is_some()
        || raw.os_version.is_some()
    {
        Some(OsActivation {
            name: raw.os_name,
            family: raw.os_family,
            arch: raw.os_arch,
            version: raw.os_version,
        })
    } else {
        None
    };
    let file = if raw.file_exists.is_some() || raw.file_missing.is_some() {
        Some(FileActivation {
            exists: raw.file_exists,
            missing: raw.file_missing,
        })
    } else {
        None
    };

    Activation {
        active_by_default: raw
            .active_by_default
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false),
        jdk: raw.jdk,
        os,
        property: raw.property_name.map(|name| PropertyActivation {
            name,
            value: raw.property_value,
        }),
        file,
    }
}

fn convert_profile(raw: RawProfile, index: usize, location: &str) -> PommelResult<Profile> {
    Ok(Profile {
        id: raw.id.unwrap_or_else(|| format!("default-{}", index)),
        activation: raw.activation.map(convert_activation),
        properties: raw.properties.into_iter().collect(),
        dependencies: convert_dependencies(raw.dependencies, "profiles.profile.dependencies", location)?,
        dependency_management: convert_dependencies(
            raw.dependency_management,
            "profiles.profile.dependencyManagement.dependencies",
            location,
        )?,
        plugins: convert_plugins(raw.plugins, "profiles.profile.build.plugins", location)?,
        repositories: convert_repositories(raw.repositories),
        plugin_repositories: convert_repositories(raw.plugin_repositories),
        modules: raw.modules,
    })
}
