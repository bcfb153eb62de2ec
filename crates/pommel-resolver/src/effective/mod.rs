//! Effective descriptor construction
//!
//! An effective descriptor is a descriptor after profile injection,
//! inheritance from its parent chain, interpolation and BOM import. Each
//! step is a pure transformation; the only I/O is locating parents and
//! imported BOMs through the session.

use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use std::sync::Arc;

use pommel_core::utils::resolve_descriptor_path;
use pommel_core::{Coordinate, Dependency, FailureKind, GroupArtifact, PommelError, ResolutionFailure};
use pommel_pom::inherit::merge_chain;
use pommel_pom::interpolate::has_placeholder;
use pommel_pom::{implicit_properties, inject_profiles, Descriptor, Interpolator, Parent, PropertyScope};

use crate::session::{Lookup, NodeState, ResolutionSession};
use crate::ResolverResult;

/// Relocation hops followed before giving up
pub const MAX_RELOCATIONS: usize = 5;

/// A descriptor with inheritance, profiles, properties and imports applied
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveDescriptor {
    pub descriptor: Descriptor,
    pub coordinate: Option<Coordinate>,
    /// Ids of the parent chain, this descriptor first
    pub lineage: Vec<String>,
    pub active_profiles: Vec<String>,
    /// Placeholders left verbatim
    pub unresolved_properties: Vec<String>,
    pub imported_boms: Vec<Coordinate>,
    /// Non-fatal failures met while building this descriptor
    pub failures: Vec<ResolutionFailure>,
}

impl EffectiveDescriptor {
    pub fn dependencies(&self) -> &[Dependency] {
        &self.descriptor.dependencies
    }

    pub fn dependency_management(&self) -> &[Dependency] {
        &self.descriptor.dependency_management
    }

    /// Managed entry for a dependency, if any
    pub fn managed(&self, dependency: &Dependency) -> Option<&Dependency> {
        self.descriptor.managed(dependency)
    }

    pub fn id(&self) -> String {
        self.descriptor.id()
    }

    fn push_failure(&mut self, failure: ResolutionFailure) {
        if !self.failures.contains(&failure) {
            self.failures.push(failure);
        }
    }
}

/// Failure attributed to a descriptor, by coordinate when known
fn failure_for(descriptor: &Descriptor, kind: FailureKind) -> ResolutionFailure {
    let failure = match descriptor.coordinate() {
        Some(coordinate) => ResolutionFailure::for_coordinate(&coordinate, kind),
        None => ResolutionFailure::for_artifact(
            &GroupArtifact::new(
                descriptor.effective_group_id().unwrap_or_default(),
                descriptor.artifact_id.clone(),
            ),
            kind,
        ),
    };
    failure.with_context(descriptor.location.clone())
}

fn failure_key(failure: &ResolutionFailure) -> String {
    format!("{}|{}", failure, failure.context.as_deref().unwrap_or_default())
}

impl ResolutionSession {
    /// Build the effective form of a descriptor handed in by the caller.
    ///
    /// Structural problems of this document (a cyclic parent chain) are
    /// returned as errors; everything else is recorded in the session.
    pub async fn effective_root(&self, descriptor: Descriptor) -> ResolverResult<Arc<EffectiveDescriptor>> {
        let stack = descriptor.coordinate().into_iter().collect();
        let effective = self.build_effective(descriptor, stack).await?;
        self.publish(&effective);
        Ok(Arc::new(effective))
    }

    /// Effective descriptor of a dependency, built once per session.
    ///
    /// `None` means the coordinate is unusable in this session; the reason
    /// is already recorded.
    pub async fn effective(&self, coordinate: &Coordinate) -> ResolverResult<Option<Arc<EffectiveDescriptor>>> {
        let cell = self.effective.entry(coordinate.clone()).or_default().clone();
        let value = cell
            .get_or_try_init(|| async {
                let descriptor = match self.lookup(coordinate).await? {
                    Lookup::Found(descriptor) => descriptor,
                    Lookup::Missing { attempts } => {
                        self.record(
                            ResolutionFailure::for_coordinate(coordinate, FailureKind::UnresolvableDependency)
                                .with_attempts(attempts),
                        );
                        return Ok(None);
                    }
                    Lookup::Invalid { reason, uri } => {
                        self.record(
                            ResolutionFailure::for_coordinate(coordinate, FailureKind::InvalidDescriptor { reason })
                                .with_context(uri),
                        );
                        return Ok(None);
                    }
                };

                match self.build_effective((*descriptor).clone(), vec![coordinate.clone()]).await {
                    Ok(mut effective) => {
                        effective.coordinate = Some(coordinate.clone());
                        self.publish(&effective);
                        Ok(Some(Arc::new(effective)))
                    }
                    Err(e) if e.is_structural() => {
                        tracing::warn!("descriptor {} is invalid: {}", coordinate, e);
                        self.set_state(coordinate, NodeState::Errored);
                        self.record(
                            ResolutionFailure::for_coordinate(
                                coordinate,
                                FailureKind::InvalidDescriptor { reason: e.to_string() },
                            )
                            .with_context(descriptor.location.clone()),
                        );
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            })
            .await?;
        Ok(value.clone())
    }

    /// Effective descriptor of a dependency after following relocations.
    /// Returns the coordinate that was finally used.
    pub async fn effective_relocated(
        &self,
        coordinate: &Coordinate,
    ) -> ResolverResult<Option<(Coordinate, Arc<EffectiveDescriptor>)>> {
        let mut current = coordinate.clone();
        let mut effective = match self.effective(&current).await? {
            Some(effective) => effective,
            None => return Ok(None),
        };
        let mut seen = vec![current.clone()];

        for _ in 0..MAX_RELOCATIONS {
            let target = match &effective.descriptor.relocation {
                None => return Ok(Some((current, effective))),
                Some(relocation) => Coordinate::new(
                    relocation.group_id.clone().unwrap_or_else(|| current.group_id.clone()),
                    relocation.artifact_id.clone().unwrap_or_else(|| current.artifact_id.clone()),
                    relocation.version.clone().unwrap_or_else(|| current.version.clone()),
                ),
            };
            if target == current {
                return Ok(Some((current, effective)));
            }
            if seen.contains(&target) {
                self.relocation_loop(coordinate, &seen);
                return Ok(Some((current, effective)));
            }

            tracing::info!("{} relocated to {}", current, target);
            match self.effective(&target).await? {
                Some(next) => {
                    seen.push(target.clone());
                    current = target;
                    effective = next;
                }
                None => return Ok(None),
            }
        }

        if effective.descriptor.relocation.is_some() {
            self.relocation_loop(coordinate, &seen);
        }
        Ok(Some((current, effective)))
    }

    fn relocation_loop(&self, origin: &Coordinate, seen: &[Coordinate]) {
        let chain: Vec<String> = seen.iter().map(ToString::to_string).collect();
        self.record_once(
            format!("relocation|{}", origin),
            ResolutionFailure::for_coordinate(origin, FailureKind::RelocationLoop).with_context(chain.join(" -> ")),
        );
    }

    /// Record a descriptor's failures in the session sink, once each
    fn publish(&self, effective: &EffectiveDescriptor) {
        for failure in &effective.failures {
            self.record_once(failure_key(failure), failure.clone());
        }
    }

    /// `stack` holds the coordinates whose imports are being expanded, for
    /// BOM cycle detection
    pub(crate) fn build_effective(
        &self,
        descriptor: Descriptor,
        stack: Vec<Coordinate>,
    ) -> BoxFuture<'_, ResolverResult<EffectiveDescriptor>> {
        async move {
            let location = descriptor.location.clone();
            let mut failures = Vec::new();
            let chain = self.parent_chain(descriptor, &mut failures).await?;

            let mut active_profiles = Vec::new();
            let injected: Vec<Descriptor> = chain
                .iter()
                .map(|link| {
                    let (link, ids) = inject_profiles(link, self.activator(), self.activation());
                    active_profiles.extend(ids);
                    link
                })
                .collect();

            let merged = merge_chain(injected.iter().rev()).ok_or(PommelError::MissingField {
                location,
                field: "project".to_string(),
            })?;

            let mut scope = PropertyScope::new()
                .with_user(self.user_properties().clone())
                .with_implicit(implicit_properties(&merged, self.build_timestamp()))
                .with_env(self.env().clone());
            for link in &injected {
                scope = scope.with_declared(link.properties.clone());
            }
            let (interpolated, issues) = Interpolator::new(&scope).descriptor(&merged);

            let mut unresolved_properties = Vec::new();
            for issue in &issues {
                if unresolved_properties.iter().any(|k: &String| k == issue.key()) {
                    continue;
                }
                unresolved_properties.push(issue.key().to_string());
                failures.push(failure_for(&interpolated, issue.failure_kind()));
            }

            for dependency in interpolated
                .dependencies
                .iter()
                .chain(interpolated.dependency_management.iter())
                .filter(|d| d.has_unknown_scope())
            {
                let scope = dependency.scope.clone().unwrap_or_default();
                failures.push(
                    ResolutionFailure::for_artifact(&dependency.group_artifact(), FailureKind::InvalidScope { scope })
                        .with_context(interpolated.location.clone()),
                );
            }

            let mut effective = EffectiveDescriptor {
                coordinate: interpolated.coordinate(),
                lineage: chain.iter().map(Descriptor::id).collect(),
                descriptor: interpolated,
                active_profiles,
                unresolved_properties,
                imported_boms: Vec::new(),
                failures: Vec::new(),
            };
            for failure in failures {
                effective.push_failure(failure);
            }

            self.import_boms(&mut effective, &stack).await?;
            Ok(effective)
        }
        .boxed()
    }

    /// Replace `import` entries of dependency management with the
    /// management of the named BOMs. Entries already declared win; earlier
    /// imports win over later ones.
    async fn import_boms(&self, effective: &mut EffectiveDescriptor, stack: &[Coordinate]) -> ResolverResult<()> {
        let (imports, mut management): (Vec<Dependency>, Vec<Dependency>) = effective
            .descriptor
            .dependency_management
            .drain(..)
            .partition(Dependency::is_bom_import);
        let location = effective.descriptor.location.clone();

        for import in imports {
            let coordinate = match import.coordinate() {
                Some(c) if !has_placeholder(&c.version) => c,
                _ => {
                    effective.push_failure(
                        ResolutionFailure::for_artifact(&import.group_artifact(), FailureKind::UnresolvableDependency)
                            .with_context(location.clone()),
                    );
                    continue;
                }
            };
            if stack.contains(&coordinate) {
                tracing::warn!("cyclic BOM import of {} in {}", coordinate, location);
                effective.push_failure(
                    ResolutionFailure::for_coordinate(&coordinate, FailureKind::ImportCycle)
                        .with_context(location.clone()),
                );
                continue;
            }

            let bom = match self.bom(&coordinate, stack, &location).await? {
                Ok(bom) => bom,
                Err(failure) => {
                    effective.push_failure(failure);
                    continue;
                }
            };

            for entry in bom.dependency_management() {
                let key = entry.management_key();
                if !management.iter().any(|m| m.management_key() == key) {
                    management.push(entry.clone());
                }
            }
            for failure in &bom.failures {
                effective.push_failure(failure.clone());
            }
            effective.imported_boms.push(coordinate);
        }

        effective.descriptor.dependency_management = management;
        Ok(())
    }

    /// Effective BOM. These are cached outside the single-flight cells:
    /// import chains wait on each other and may not share one.
    async fn bom(
        &self,
        coordinate: &Coordinate,
        stack: &[Coordinate],
        location: &str,
    ) -> ResolverResult<Result<Arc<EffectiveDescriptor>, ResolutionFailure>> {
        if let Some(bom) = self.imports.get(coordinate) {
            return Ok(Ok(bom.clone()));
        }

        let descriptor = match self.lookup(coordinate).await? {
            Lookup::Found(descriptor) => descriptor,
            Lookup::Missing { attempts } => {
                return Ok(Err(ResolutionFailure::for_coordinate(
                    coordinate,
                    FailureKind::UnresolvableDependency,
                )
                .with_attempts(attempts)
                .with_context(location.to_string())))
            }
            Lookup::Invalid { reason, uri } => {
                return Ok(Err(ResolutionFailure::for_coordinate(
                    coordinate,
                    FailureKind::InvalidDescriptor { reason },
                )
                .with_context(uri)))
            }
        };

        let mut nested = stack.to_vec();
        nested.push(coordinate.clone());
        match self.build_effective((*descriptor).clone(), nested).await {
            Ok(bom) => {
                let bom = Arc::new(bom);
                self.imports.insert(coordinate.clone(), bom.clone());
                Ok(Ok(bom))
            }
            Err(e) if e.is_structural() => Ok(Err(ResolutionFailure::for_coordinate(
                coordinate,
                FailureKind::InvalidDescriptor { reason: e.to_string() },
            )
            .with_context(location.to_string()))),
            Err(e) => Err(e),
        }
    }

    /// Collect the parent chain, leaf first. A parent that cannot be
    /// located ends the chain; a parent met twice is a cycle.
    async fn parent_chain(
        &self,
        leaf: Descriptor,
        failures: &mut Vec<ResolutionFailure>,
    ) -> ResolverResult<Vec<Descriptor>> {
        let mut visited = vec![leaf.id()];
        let mut chain = vec![leaf];

        loop {
            let current = &chain[chain.len() - 1];
            let reference = match &current.parent {
                Some(parent) => self.interpolate_parent(current, parent),
                None => break,
            };

            let parent = match self.locate_parent(current, &reference, failures).await? {
                Some(parent) => parent,
                None => break,
            };

            let id = parent.id();
            if visited.contains(&id) {
                visited.push(id);
                return Err(PommelError::ParentCycle {
                    chain: visited.join(" -> "),
                });
            }
            visited.push(id);
            chain.push(parent);
        }

        Ok(chain)
    }

    /// Parent references may use the child's own properties
    fn interpolate_parent(&self, child: &Descriptor, parent: &Parent) -> Parent {
        let scope = PropertyScope::new()
            .with_user(self.user_properties().clone())
            .with_implicit(implicit_properties(child, self.build_timestamp()))
            .with_env(self.env().clone())
            .with_declared(child.properties.clone());
        let mut issues = Vec::new();
        Interpolator::new(&scope).parent(parent, &mut issues)
    }

    async fn locate_parent(
        &self,
        child: &Descriptor,
        reference: &Parent,
        failures: &mut Vec<ResolutionFailure>,
    ) -> ResolverResult<Option<Descriptor>> {
        if let (Some(base), Some(relative)) = (&child.base_dir, reference.local_path()) {
            let path = resolve_descriptor_path(base, relative);
            if path.is_file() {
                match Descriptor::from_file(&path) {
                    Ok(parent) if reference.matches(&parent) => {
                        tracing::debug!("parent {} found at {}", reference.display(), path.display());
                        return Ok(Some(parent));
                    }
                    Ok(other) => {
                        tracing::debug!(
                            "{} holds {}, not parent {}",
                            path.display(),
                            other.id(),
                            reference.display()
                        );
                    }
                    Err(e) => tracing::debug!("ignoring local parent candidate {}: {}", path.display(), e),
                }
            }
        }

        let coordinate = match reference.coordinate() {
            Some(coordinate) => coordinate,
            None => {
                failures.push(failure_for(child, FailureKind::MissingParent).with_context(format!(
                    "{}: incomplete parent reference {}",
                    child.location,
                    reference.display()
                )));
                return Ok(None);
            }
        };

        match self.lookup(&coordinate).await? {
            Lookup::Found(parent) => Ok(Some((*parent).clone())),
            Lookup::Missing { attempts } => {
                tracing::warn!("parent {} of {} not found", coordinate, child.id());
                failures.push(
                    ResolutionFailure::for_coordinate(&coordinate, FailureKind::MissingParent)
                        .with_attempts(attempts)
                        .with_context(child.location.clone()),
                );
                Ok(None)
            }
            Lookup::Invalid { reason, uri } => {
                failures.push(
                    ResolutionFailure::for_coordinate(&coordinate, FailureKind::InvalidDescriptor { reason })
                        .with_context(uri),
                );
                Ok(None)
            }
        }
    }
}
