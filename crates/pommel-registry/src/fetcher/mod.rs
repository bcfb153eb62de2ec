//! Ordered multi-repository fetcher
//!
//! Descriptors are looked up in the local repository first, then in each
//! configured repository in order. A well-formed "not found" and an error
//! are both remembered per URI for the lifetime of the fetcher (one
//! resolution session), but only a successful fetch ends the search.

use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pommel_cache::{CacheKey, LocalRepository};
use pommel_core::error::PommelError;
use pommel_core::types::{
    AttemptOutcome, ChecksumPolicy, Coordinate, FailureKind, FailureSink, GroupArtifact,
    RepositoryAttempt, RepositoryDescriptor, ResolutionFailure,
};

use crate::api::MavenMetadata;
use crate::cache::ResponseCache;
use crate::checksum::{ChecksumAlgorithm, ChecksumCheck};
use crate::client::{FetchResponse, RepositoryClient};
use crate::RegistryResult;

/// Cooperative cancellation shared by everything in one session
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop issuing new fetches; in-flight requests still complete
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Fetcher behaviour
#[derive(Debug, Clone, Default)]
pub struct FetcherOptions {
    /// Only consult the local repository
    pub offline: bool,
    /// Policy for repositories that do not set their own
    pub checksum_policy: ChecksumPolicy,
}

/// Bytes obtained for a request, with where they came from
#[derive(Debug, Clone)]
pub struct Fetched {
    pub bytes: Arc<[u8]>,
    /// `None` when served by the local repository
    pub repository_id: Option<String>,
    pub uri: String,
    /// Every repository asked, in order, ending with the one that answered
    pub attempts: Vec<RepositoryAttempt>,
}

/// Result of a search across repositories
#[derive(Debug, Clone)]
pub enum FetchOutcome<T> {
    Found(T),
    Missing { attempts: Vec<RepositoryAttempt> },
}

impl<T> FetchOutcome<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, FetchOutcome::Found(_))
    }

    pub fn found(self) -> Option<T> {
        match self {
            FetchOutcome::Found(value) => Some(value),
            FetchOutcome::Missing { .. } => None,
        }
    }

    /// True when at least one repository errored rather than answering
    pub fn is_errored(&self) -> bool {
        match self {
            FetchOutcome::Found(_) => false,
            FetchOutcome::Missing { attempts } => attempts.iter().any(|a| {
                matches!(
                    a.outcome,
                    AttemptOutcome::Errored { .. } | AttemptOutcome::ChecksumMismatch { .. }
                )
            }),
        }
    }
}

/// Session-scoped fetcher over an ordered repository list
#[derive(Debug)]
pub struct RepositoryFetcher {
    client: RepositoryClient,
    local: Option<Arc<LocalRepository>>,
    responses: Arc<ResponseCache>,
    /// Non-found outcomes per URI
    memo: DashMap<String, AttemptOutcome>,
    /// Coordinates already reported as repository misses
    reported_misses: DashSet<Coordinate>,
    options: FetcherOptions,
    failures: FailureSink,
    cancel: CancellationFlag,
}

impl RepositoryFetcher {
    pub fn new(client: RepositoryClient, options: FetcherOptions) -> Self {
        Self {
            client,
            local: None,
            responses: Arc::new(ResponseCache::new()),
            memo: DashMap::new(),
            reported_misses: DashSet::new(),
            options,
            failures: FailureSink::new(),
            cancel: CancellationFlag::new(),
        }
    }

    pub fn with_local_repository(mut self, local: Arc<LocalRepository>) -> Self {
        self.local = Some(local);
        self
    }

    /// Share a response cache across fetchers
    pub fn with_response_cache(mut self, responses: Arc<ResponseCache>) -> Self {
        self.responses = responses;
        self
    }

    pub fn with_failure_sink(mut self, failures: FailureSink) -> Self {
        self.failures = failures;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn failures(&self) -> &FailureSink {
        &self.failures
    }

    pub fn local_repository(&self) -> Option<&Arc<LocalRepository>> {
        self.local.as_ref()
    }

    pub fn is_offline(&self) -> bool {
        self.options.offline
    }

    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancel
    }

    /// Fetch the descriptor of `coordinate`
    pub async fn fetch_descriptor(
        &self,
        coordinate: &Coordinate,
        repositories: &[RepositoryDescriptor],
    ) -> RegistryResult<FetchOutcome<Fetched>> {
        let key = CacheKey::Descriptor(coordinate.clone());
        if let Some(local) = &self.local {
            if let Some(bytes) = local.get(&key)? {
                tracing::debug!(%coordinate, "descriptor served from local repository");
                return Ok(FetchOutcome::Found(Fetched {
                    bytes: bytes.into(),
                    repository_id: None,
                    uri: local.path_of(&key).to_string(),
                    attempts: Vec::new(),
                }));
            }
        }

        let snapshot = coordinate.is_snapshot();
        let mut attempts = Vec::with_capacity(repositories.len());

        for repository in repositories {
            if let Some(reason) = self.skip_reason(repository, snapshot) {
                attempts.push(RepositoryAttempt::new(
                    &repository.id,
                    repository.resolve(&coordinate.descriptor_path()),
                    AttemptOutcome::Skipped { reason },
                ));
                continue;
            }

            let relative = self.descriptor_relative_path(coordinate, repository).await?;
            let (attempt, body) = self.fetch_remote(repository, &relative).await?;
            let body = match body {
                Some(body) => body,
                None => {
                    attempts.push(attempt);
                    continue;
                }
            };

            let policy = repository.checksum_policy(snapshot, self.options.checksum_policy);
            if policy != ChecksumPolicy::Ignore {
                if let ChecksumCheck::Mismatch { expected, actual } =
                    self.verify_checksum(repository, &relative, &body).await?
                {
                    let outcome = AttemptOutcome::ChecksumMismatch { expected, actual };
                    tracing::warn!(%coordinate, repository = %repository.id, %outcome, "checksum mismatch");
                    if policy == ChecksumPolicy::Fail {
                        self.memo.insert(attempt.uri.clone(), outcome.clone());
                        attempts.push(RepositoryAttempt::new(&repository.id, attempt.uri, outcome));
                        continue;
                    }
                    self.failures.push(
                        ResolutionFailure::for_coordinate(coordinate, FailureKind::ChecksumMismatch)
                            .with_attempts(vec![RepositoryAttempt::new(&repository.id, &attempt.uri, outcome)]),
                    );
                }
            }

            if let Some(local) = &self.local {
                if let Err(e) = local.put(&key, &body) {
                    tracing::warn!(%coordinate, error = %e, "failed to write local repository");
                }
            }

            let missed = attempts.iter().any(|a: &RepositoryAttempt| {
                !matches!(a.outcome, AttemptOutcome::Skipped { .. } | AttemptOutcome::Found)
            });
            if missed && self.reported_misses.insert(coordinate.clone()) {
                self.failures.push(
                    ResolutionFailure::for_coordinate(coordinate, FailureKind::RepositoryMiss)
                        .with_attempts(attempts.clone())
                        .with_context(format!("resolved from {}", repository.id)),
                );
            }

            let uri = attempt.uri.clone();
            attempts.push(attempt);
            tracing::debug!(%coordinate, repository = %repository.id, "descriptor fetched");
            return Ok(FetchOutcome::Found(Fetched {
                bytes: body,
                repository_id: Some(repository.id.clone()),
                uri,
                attempts,
            }));
        }

        tracing::debug!(%coordinate, attempts = attempts.len(), "descriptor not found in any repository");
        Ok(FetchOutcome::Missing { attempts })
    }

    /// Fetch and merge the version listing of `artifact` from every
    /// eligible repository.
    ///
    /// Listings change over time, so remote repositories are preferred;
    /// cached listings are used offline or when no repository answered.
    pub async fn fetch_metadata(
        &self,
        artifact: &GroupArtifact,
        repositories: &[RepositoryDescriptor],
    ) -> RegistryResult<FetchOutcome<MavenMetadata>> {
        let relative = artifact.metadata_path();
        let mut attempts = Vec::with_capacity(repositories.len());
        let mut merged: Option<MavenMetadata> = None;

        for repository in repositories {
            let uri = repository.resolve(&relative);
            if self.options.offline {
                attempts.push(RepositoryAttempt::new(&repository.id, uri, skipped("offline")));
                continue;
            }
            if !repository.allows(false) && !repository.allows(true) {
                attempts.push(RepositoryAttempt::new(&repository.id, uri, skipped("repository disabled")));
                continue;
            }

            let (attempt, body) = self.fetch_remote(repository, &relative).await?;
            let body = match body {
                Some(body) => body,
                None => {
                    attempts.push(attempt);
                    continue;
                }
            };

            match MavenMetadata::parse(&body, &attempt.uri) {
                Ok(mut metadata) => {
                    metadata.versions.retain(|v| {
                        repository.allows(pommel_core::types::version::is_snapshot_string(v))
                    });
                    if let Some(local) = &self.local {
                        let key = CacheKey::Metadata {
                            artifact: artifact.clone(),
                            repository_id: repository.id.clone(),
                        };
                        if let Err(e) = local.put(&key, &body) {
                            tracing::warn!(%artifact, error = %e, "failed to cache metadata");
                        }
                    }
                    merge_into(&mut merged, metadata);
                    attempts.push(attempt);
                }
                Err(e) => {
                    let outcome = AttemptOutcome::Errored { reason: e.to_string() };
                    self.memo.insert(attempt.uri.clone(), outcome.clone());
                    attempts.push(RepositoryAttempt::new(&repository.id, attempt.uri, outcome));
                }
            }
        }

        if merged.is_none() {
            if let Some(local) = &self.local {
                for (repository_id, bytes) in local.cached_metadata(artifact)? {
                    match MavenMetadata::parse(&bytes, &format!("cached {} metadata", repository_id)) {
                        Ok(metadata) => merge_into(&mut merged, metadata),
                        Err(e) => {
                            tracing::warn!(%artifact, %repository_id, error = %e, "ignoring corrupt cached metadata")
                        }
                    }
                }
            }
        }

        Ok(match merged {
            Some(metadata) => FetchOutcome::Found(metadata),
            None => FetchOutcome::Missing { attempts },
        })
    }

    fn skip_reason(&self, repository: &RepositoryDescriptor, snapshot: bool) -> Option<String> {
        if self.options.offline {
            return Some("offline".to_string());
        }
        if !repository.allows(snapshot) {
            let kind = if snapshot { "snapshots" } else { "releases" };
            return Some(format!("{} disabled", kind));
        }
        None
    }

    /// Repository path of a descriptor, resolving `-SNAPSHOT` to the
    /// timestamped file named by the version-level metadata
    async fn descriptor_relative_path(
        &self,
        coordinate: &Coordinate,
        repository: &RepositoryDescriptor,
    ) -> RegistryResult<String> {
        if !coordinate.version.ends_with("SNAPSHOT") {
            return Ok(coordinate.descriptor_path());
        }
        let file_version = self
            .fetch_snapshot_metadata(coordinate, repository)
            .await?
            .and_then(|metadata| metadata.timestamped_version("pom"));
        Ok(match file_version {
            Some(file_version) => coordinate.file_path(&file_version, "pom"),
            None => coordinate.descriptor_path(),
        })
    }

    async fn fetch_snapshot_metadata(
        &self,
        coordinate: &Coordinate,
        repository: &RepositoryDescriptor,
    ) -> RegistryResult<Option<MavenMetadata>> {
        let (attempt, body) = self
            .fetch_remote(repository, &coordinate.snapshot_metadata_path())
            .await?;
        let body = match body {
            Some(body) => body,
            None => return Ok(None),
        };
        match MavenMetadata::parse(&body, &attempt.uri) {
            Ok(metadata) => {
                if let Some(local) = &self.local {
                    let key = CacheKey::SnapshotMetadata {
                        coordinate: coordinate.clone(),
                        repository_id: repository.id.clone(),
                    };
                    if let Err(e) = local.put(&key, &body) {
                        tracing::warn!(%coordinate, error = %e, "failed to cache snapshot metadata");
                    }
                }
                Ok(Some(metadata))
            }
            Err(e) => {
                tracing::debug!(%coordinate, error = %e, "unusable snapshot metadata");
                Ok(None)
            }
        }
    }

    /// Ask one repository for one path, consulting the attempt memo and
    /// the response cache first
    async fn fetch_remote(
        &self,
        repository: &RepositoryDescriptor,
        relative: &str,
    ) -> RegistryResult<(RepositoryAttempt, Option<Arc<[u8]>>)> {
        let uri = repository.resolve(relative);

        if let Some(outcome) = self.memo.get(&uri).map(|o| o.value().clone()) {
            tracing::trace!(%uri, %outcome, "attempt memo hit");
            return Ok((RepositoryAttempt::new(&repository.id, uri, outcome), None));
        }
        if let Some(body) = self.responses.get(&uri) {
            return Ok((RepositoryAttempt::new(&repository.id, uri, AttemptOutcome::Found), Some(body)));
        }
        if self.cancel.is_cancelled() {
            return Err(PommelError::Cancelled);
        }

        tracing::debug!(repository = %repository.id, %uri, "fetching");
        let outcome = match self.client.get(repository, relative).await {
            Ok(FetchResponse::Found(bytes)) => {
                let body: Arc<[u8]> = bytes.into();
                self.responses.insert(uri.clone(), Arc::clone(&body));
                return Ok((RepositoryAttempt::new(&repository.id, uri, AttemptOutcome::Found), Some(body)));
            }
            Ok(FetchResponse::NotFound { status }) => AttemptOutcome::Absent { status },
            Ok(FetchResponse::Rejected { status }) => AttemptOutcome::Errored {
                reason: format!("HTTP {}", status),
            },
            Err(e) => AttemptOutcome::Errored { reason: e.to_string() },
        };

        tracing::debug!(repository = %repository.id, %uri, %outcome, "attempt failed");
        self.memo.insert(uri.clone(), outcome.clone());
        Ok((RepositoryAttempt::new(&repository.id, uri, outcome), None))
    }

    /// Check `body` against the first checksum file the repository has
    async fn verify_checksum(
        &self,
        repository: &RepositoryDescriptor,
        relative: &str,
        body: &[u8],
    ) -> RegistryResult<ChecksumCheck> {
        for algorithm in ChecksumAlgorithm::ALL {
            let checksum_path = format!("{}.{}", relative, algorithm.extension());
            let (_, checksum) = self.fetch_remote(repository, &checksum_path).await?;
            if let Some(checksum) = checksum {
                match algorithm.check(body, &checksum) {
                    ChecksumCheck::Unavailable => continue,
                    check => return Ok(check),
                }
            }
        }
        Ok(ChecksumCheck::Unavailable)
    }
}

fn skipped(reason: &str) -> AttemptOutcome {
    AttemptOutcome::Skipped {
        reason: reason.to_string(),
    }
}

fn merge_into(merged: &mut Option<MavenMetadata>, metadata: MavenMetadata) {
    match merged {
        Some(existing) => existing.merge(&metadata),
        None => *merged = Some(metadata),
    }
}

#[cfg(test)]
mod tests;
