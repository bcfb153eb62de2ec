//! Dependency graph construction
//!
//! Each scope bucket is expanded breadth first. All candidates of one level
//! are located concurrently (version selection, descriptor fetch,
//! relocation) and then processed in document order, so nearest-wins
//! mediation with first-declaration tie-breaking stays deterministic no
//! matter which fetch finishes first.

use futures::future::join_all;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use pommel_core::{
    Coordinate, Dependency, Exclusion, FailureKind, GroupArtifact, PommelError, ResolutionFailure, Scope,
    Version,
};
use pommel_pom::interpolate::has_placeholder;
use pommel_pom::Descriptor;
use pommel_registry::FetchOutcome;

use crate::effective::EffectiveDescriptor;
use crate::graph::{DependencyEdge, DependencyGraph, DependencyNode, ResolvedDependencyGraph, ResolvedEntry};
use crate::session::ResolutionSession;
use crate::version::VersionSelector;
use crate::ResolverResult;

/// Everything one resolution request produced
#[derive(Debug)]
pub struct ResolutionResult {
    pub effective: Arc<EffectiveDescriptor>,
    pub graph: ResolvedDependencyGraph,
    /// Inclusion tree per bucket
    pub trees: IndexMap<Scope, DependencyGraph>,
    /// All non-fatal failures of the session
    pub failures: Vec<ResolutionFailure>,
    pub resolution_time_ms: u64,
}

impl ResolutionResult {
    pub fn tree(&self, bucket: Scope) -> Option<&DependencyGraph> {
        self.trees.get(&bucket)
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A dependency waiting to be located
#[derive(Debug, Clone)]
struct Pending {
    /// Declaration with management applied
    dependency: Dependency,
    /// Version text as written by the declaring descriptor
    declared_version: Option<String>,
    scope: Scope,
    depth: usize,
    /// Selected coordinate of the declaring node
    parent: Coordinate,
    /// Exclusions inherited from the path above this dependency
    exclusions: Vec<Exclusion>,
    /// Version `latest.patch` and `latest.minor` are relative to
    base: Option<Version>,
}

impl Pending {
    fn excludes(&self, ga: &GroupArtifact) -> bool {
        self.exclusions
            .iter()
            .chain(self.dependency.exclusions.iter())
            .any(|exclusion| exclusion.matches(ga))
    }
}

/// A located dependency. System-scoped dependencies carry no descriptor.
struct Located {
    coordinate: Coordinate,
    effective: Option<Arc<EffectiveDescriptor>>,
}

/// Resolves descriptors into per-scope dependency sets
#[derive(Debug, Clone)]
pub struct Resolver {
    session: Arc<ResolutionSession>,
}

impl Resolver {
    pub fn new(session: ResolutionSession) -> Self {
        Self {
            session: Arc::new(session),
        }
    }

    pub fn with_session(session: Arc<ResolutionSession>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<ResolutionSession> {
        &self.session
    }

    /// Resolve a descriptor file; its directory anchors local parents
    pub async fn resolve_file(&self, path: &Path) -> ResolverResult<ResolutionResult> {
        let descriptor = Descriptor::from_file(path)?;
        self.resolve_descriptor(descriptor).await
    }

    /// Resolve descriptor text read from `location`
    pub async fn resolve_text(&self, text: &str, location: &str) -> ResolverResult<ResolutionResult> {
        let descriptor = Descriptor::parse(text, location)?;
        self.resolve_descriptor(descriptor).await
    }

    pub async fn resolve_descriptor(&self, descriptor: Descriptor) -> ResolverResult<ResolutionResult> {
        let start = Instant::now();
        let location = descriptor.location.clone();
        let effective = self.session.effective_root(descriptor).await?;
        let root = root_coordinate(&effective);
        tracing::info!("resolving dependencies of {}", root);

        let mut graph = ResolvedDependencyGraph::new();
        let mut trees = IndexMap::new();
        for bucket in Scope::BUCKETS {
            let tree = self.resolve_bucket(bucket, &effective, &root, &mut graph).await?;
            trees.insert(bucket, tree);
        }

        if self.session.is_cancelled() {
            return Err(PommelError::Cancelled);
        }

        let failures = self.session.failures().snapshot();
        let resolution_time_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "resolved {} in {}ms: {} entries, {} failures",
            location,
            resolution_time_ms,
            graph.len(),
            failures.len()
        );

        Ok(ResolutionResult {
            effective,
            graph,
            trees,
            failures,
            resolution_time_ms,
        })
    }

    async fn resolve_bucket(
        &self,
        bucket: Scope,
        root_effective: &EffectiveDescriptor,
        root: &Coordinate,
        graph: &mut ResolvedDependencyGraph,
    ) -> ResolverResult<DependencyGraph> {
        let mut tree = DependencyGraph::new(root.clone());
        // Version that won mediation per groupId:artifactId. `None` blocks
        // the artifact: the project itself, or a nearest occurrence that
        // could not be located.
        let mut mediated: HashMap<GroupArtifact, Option<String>> = HashMap::from([(root.group_artifact(), None)]);
        let mut selected: HashSet<String> = HashSet::new();

        let mut level: Vec<Pending> = root_effective
            .dependencies()
            .iter()
            .filter_map(|dependency| direct(dependency, bucket, root_effective, root))
            .collect();

        while !level.is_empty() && !self.session.is_cancelled() {
            level.retain(|pending| {
                let blocked = matches!(mediated.get(&pending.dependency.group_artifact()), Some(None));
                !blocked && !selected.contains(&pending.dependency.management_key())
            });
            let located = join_all(level.iter().map(|pending| self.locate(pending))).await;

            let mut next = Vec::new();
            for (pending, located) in level.into_iter().zip(located) {
                let ga = pending.dependency.group_artifact();
                let winner = mediated.get(&ga).cloned();
                let Some(located) = located? else {
                    if winner.is_none() {
                        mediated.insert(ga, None);
                    }
                    continue;
                };
                match winner {
                    Some(Some(version)) if version != located.coordinate.version => continue,
                    Some(None) => continue,
                    _ => {}
                }
                if !selected.insert(pending.dependency.management_key()) {
                    continue;
                }
                mediated.insert(ga, Some(located.coordinate.version.clone()));

                let entry = ResolvedEntry {
                    coordinate: located.coordinate.clone(),
                    scope: pending.scope,
                    depth: pending.depth,
                    optional: pending.dependency.optional,
                    kind: pending.dependency.kind.clone(),
                    classifier: pending.dependency.classifier.clone(),
                };
                graph.insert(bucket, entry, pending.parent.clone());

                tree.add_node(DependencyNode {
                    coordinate: located.coordinate.clone(),
                    scope: Some(pending.scope),
                    depth: pending.depth,
                    optional: pending.dependency.optional,
                });
                let edge = DependencyEdge {
                    declared_version: pending.declared_version.clone(),
                    scope: pending.scope,
                };
                if let Err(e) = tree.add_dependency(&pending.parent, &located.coordinate, edge) {
                    tracing::debug!("{} tree: {}", bucket.as_str(), e);
                }

                if let Some(effective) = &located.effective {
                    next.extend(transitive(&pending, &located.coordinate, effective, bucket, root_effective));
                }
            }
            level = next;
        }

        tracing::debug!("{} bucket: {} entries", bucket.as_str(), graph.entries(bucket).len());
        Ok(tree)
    }

    /// Select a version and load the descriptor of one candidate
    async fn locate(&self, pending: &Pending) -> ResolverResult<Option<Located>> {
        let _permit = self
            .session
            .permits()
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| PommelError::Cancelled)?;

        let dependency = &pending.dependency;
        let ga = dependency.group_artifact();
        let expression = match dependency.version.as_deref() {
            Some(version) if !has_placeholder(version) => version,
            other => {
                let reason = match other {
                    Some(version) => format!("unresolved version {}", version),
                    None => "no version declared or managed".to_string(),
                };
                self.session.record_once(
                    format!("unversioned|{}", ga),
                    ResolutionFailure::for_artifact(&ga, FailureKind::UnresolvableDependency)
                        .with_context(format!("{}, required by {}", reason, pending.parent)),
                );
                return Ok(None);
            }
        };

        let Some(version) = self.select_version(&ga, expression, pending.base.as_ref()).await? else {
            return Ok(None);
        };
        let coordinate = Coordinate::new(ga.group_id, ga.artifact_id, version);

        if pending.scope == Scope::System {
            return Ok(Some(Located {
                coordinate,
                effective: None,
            }));
        }

        Ok(self
            .session
            .effective_relocated(&coordinate)
            .await?
            .map(|(coordinate, effective)| Located {
                coordinate,
                effective: Some(effective),
            }))
    }

    /// Turn a version expression into one concrete version, consulting
    /// repository metadata for dynamic selectors once per session
    async fn select_version(
        &self,
        ga: &GroupArtifact,
        expression: &str,
        base: Option<&Version>,
    ) -> ResolverResult<Option<String>> {
        let selector = match VersionSelector::parse(expression) {
            Ok(selector) => match base {
                Some(base) => selector.relative_to(base.clone()),
                None => selector,
            },
            Err(e) => {
                self.session.record_once(
                    format!("selector|{}|{}", ga, expression),
                    ResolutionFailure::for_artifact(ga, FailureKind::InvalidDescriptor { reason: e.to_string() }),
                );
                return Ok(None);
            }
        };
        if !selector.is_dynamic() {
            return Ok(Some(expression.to_string()));
        }

        let key = match base {
            Some(base) => format!("{}@{}", expression, base),
            None => expression.to_string(),
        };
        let cell = self
            .session
            .versions
            .entry((ga.clone(), key))
            .or_default()
            .clone();
        let selected = cell
            .get_or_try_init(|| async {
                let outcome = self
                    .session
                    .fetcher()
                    .fetch_metadata(ga, self.session.repositories())
                    .await?;
                let metadata = match outcome {
                    FetchOutcome::Found(metadata) => metadata,
                    FetchOutcome::Missing { attempts } => {
                        self.session.record(
                            ResolutionFailure::for_artifact(ga, FailureKind::MetadataUnavailable)
                                .with_attempts(attempts)
                                .with_context(expression.to_string()),
                        );
                        return Ok(None);
                    }
                };

                match selector.select(&metadata.sorted_versions(), None, true) {
                    Ok(version) => {
                        tracing::debug!("{} {} selected {}", ga, expression, version);
                        Ok(Some(version.to_string()))
                    }
                    Err(e) => {
                        tracing::warn!("{}: {}", ga, e);
                        self.session.record(ResolutionFailure::for_artifact(
                            ga,
                            FailureKind::NoMatchingVersion {
                                expression: expression.to_string(),
                            },
                        ));
                        Ok::<_, PommelError>(None)
                    }
                }
            })
            .await?;
        Ok(selected.clone())
    }
}

/// Coordinate of the project itself, with placeholders for unknown parts
fn root_coordinate(effective: &EffectiveDescriptor) -> Coordinate {
    effective.coordinate.clone().unwrap_or_else(|| {
        let descriptor = &effective.descriptor;
        Coordinate::new(
            descriptor.effective_group_id().unwrap_or("unknown"),
            descriptor.artifact_id.clone(),
            descriptor.effective_version().unwrap_or("unknown"),
        )
    })
}

/// Fill what a declaration leaves open from a managed entry
fn fill_from(dependency: &mut Dependency, managed: &Dependency) {
    if dependency.version.is_none() {
        dependency.version = managed.version.clone();
    }
    if dependency.scope.is_none() {
        dependency.scope = managed.scope.clone();
    }
    if dependency.exclusions.is_empty() {
        dependency.exclusions = managed.exclusions.clone();
    }
    if dependency.system_path.is_none() {
        dependency.system_path = managed.system_path.clone();
    }
}

/// The root's management wins over what a transitive descriptor declares
fn override_from(dependency: &mut Dependency, managed: &Dependency) {
    if managed.version.is_some() {
        dependency.version = managed.version.clone();
    }
    if managed.scope.is_some() {
        dependency.scope = managed.scope.clone();
    }
}

/// Concrete version the root manages for `dependency`, the base of
/// relative selectors
fn managed_base(root: &EffectiveDescriptor, dependency: &Dependency) -> Option<Version> {
    let version = root.managed(dependency)?.version.as_deref()?;
    match VersionSelector::parse(version) {
        Ok(VersionSelector::Exact(version)) if !has_placeholder(version.as_str()) => Some(version),
        _ => None,
    }
}

/// A direct dependency of the root, if it belongs to `bucket`
fn direct(dependency: &Dependency, bucket: Scope, root: &EffectiveDescriptor, at: &Coordinate) -> Option<Pending> {
    let mut managed = dependency.clone();
    if let Some(entry) = root.managed(dependency) {
        fill_from(&mut managed, entry);
    }
    let scope = managed.scope_or_default();
    if scope == Scope::Import || !scope.in_bucket(bucket) {
        return None;
    }
    Some(Pending {
        declared_version: dependency.version.clone(),
        base: managed_base(root, dependency),
        dependency: managed,
        scope,
        depth: 0,
        parent: at.clone(),
        exclusions: Vec::new(),
    })
}

/// Dependencies a selected node contributes to the next level
fn transitive(
    parent: &Pending,
    at: &Coordinate,
    effective: &EffectiveDescriptor,
    bucket: Scope,
    root: &EffectiveDescriptor,
) -> Vec<Pending> {
    let exclusions: Vec<Exclusion> = parent
        .exclusions
        .iter()
        .chain(parent.dependency.exclusions.iter())
        .cloned()
        .collect();

    effective
        .dependencies()
        .iter()
        .filter(|child| !child.optional)
        .filter(|child| !parent.excludes(&child.group_artifact()))
        .filter_map(|child| {
            let mut dependency = child.clone();
            if let Some(entry) = effective.managed(child) {
                fill_from(&mut dependency, entry);
            }
            if let Some(entry) = root.managed(&dependency) {
                override_from(&mut dependency, entry);
            }
            let scope = parent.scope.transitive(dependency.scope_or_default())?;
            if !scope.in_bucket(bucket) {
                return None;
            }
            Some(Pending {
                declared_version: child.version.clone(),
                base: managed_base(root, child),
                dependency,
                scope,
                depth: parent.depth + 1,
                parent: at.clone(),
                exclusions: exclusions.clone(),
            })
        })
        .collect()
}
