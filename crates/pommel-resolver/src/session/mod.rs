//! Resolution session
//!
//! A session is the unit of caching, failure aggregation and cancellation.
//! Every descriptor is fetched at most once per session: concurrent
//! requests for the same coordinate share one in-flight lookup. Nothing is
//! global; the cache and the failure sink live here and are handed to the
//! workers explicitly.

use dashmap::{DashMap, DashSet};
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{OnceCell, Semaphore};

use pommel_cache::LocalRepository;
use pommel_config::PommelToml;
use pommel_core::types::repository::apply_mirrors;
use pommel_core::types::{Mirror, RepositoryAttempt};
use pommel_core::{Coordinate, FailureSink, GroupArtifact, RepositoryDescriptor, ResolutionFailure};
use pommel_pom::{ActivationContext, DefaultActivator, Descriptor, ProfileActivator};
use pommel_registry::{
    CancellationFlag, ClientConfig, Credentials, FetchOutcome, FetcherOptions, RepositoryClient,
    RepositoryFetcher, RetryConfig, StaticCredentials,
};

use crate::effective::EffectiveDescriptor;
use crate::ResolverResult;

/// Default worker limit when none is configured
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Per-coordinate lifecycle within one session.
///
/// `Resolved` is cached for the session; `Absent` and `Errored` are final
/// for this session and retried by a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeState {
    Unvisited,
    Fetching,
    Resolved,
    Absent,
    Errored,
}

/// Outcome of looking up the raw descriptor of a coordinate
#[derive(Debug, Clone)]
pub(crate) enum Lookup {
    Found(Arc<Descriptor>),
    Missing { attempts: Vec<RepositoryAttempt> },
    Invalid { reason: String, uri: String },
}

type Cell<T> = Arc<OnceCell<T>>;

/// Shared state of one resolution request
pub struct ResolutionSession {
    repositories: Vec<RepositoryDescriptor>,
    fetcher: Arc<RepositoryFetcher>,
    /// Raw descriptors by coordinate (single flight)
    descriptors: DashMap<Coordinate, Cell<Lookup>>,
    /// Effective descriptors of dependencies (single flight)
    pub(crate) effective: DashMap<Coordinate, Cell<Option<Arc<EffectiveDescriptor>>>>,
    /// Effective BOMs, built outside the single-flight cells
    pub(crate) imports: DashMap<Coordinate, Arc<EffectiveDescriptor>>,
    /// Selected version per artifact and expression
    pub(crate) versions: DashMap<(GroupArtifact, String), Cell<Option<String>>>,
    states: DashMap<Coordinate, NodeState>,
    /// Keys of failures that must be reported once per session
    reported: DashSet<String>,
    failures: FailureSink,
    cancel: CancellationFlag,
    user_properties: IndexMap<String, String>,
    env: IndexMap<String, String>,
    activation: ActivationContext,
    activator: Arc<dyn ProfileActivator>,
    build_timestamp: String,
    permits: Arc<Semaphore>,
    concurrency: usize,
}

impl fmt::Debug for ResolutionSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionSession")
            .field("repositories", &self.repositories)
            .field("descriptors", &self.descriptors.len())
            .field("failures", &self.failures.len())
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl ResolutionSession {
    /// Create a session over `repositories`, sharing the fetcher's failure
    /// sink and cancellation flag
    pub fn new(fetcher: RepositoryFetcher, repositories: Vec<RepositoryDescriptor>) -> Self {
        let failures = fetcher.failures().clone();
        let cancel = fetcher.cancellation().clone();
        Self {
            repositories,
            fetcher: Arc::new(fetcher),
            descriptors: DashMap::new(),
            effective: DashMap::new(),
            imports: DashMap::new(),
            versions: DashMap::new(),
            states: DashMap::new(),
            reported: DashSet::new(),
            failures,
            cancel,
            user_properties: IndexMap::new(),
            env: IndexMap::new(),
            activation: ActivationContext::from_host(),
            activator: Arc::new(DefaultActivator),
            build_timestamp: chrono::Utc::now().format("%Y%m%d-%H%M").to_string(),
            permits: Arc::new(Semaphore::new(DEFAULT_CONCURRENCY)),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Build a session from resolved configuration: transport, credentials,
    /// local repository, repositories with mirrors applied, user
    /// properties, profile selection and the process environment
    pub fn from_config(config: &PommelToml) -> ResolverResult<Self> {
        let settings = config.settings();
        let mut client = RepositoryClient::with_config(ClientConfig {
            timeout: settings.timeout,
            retry: RetryConfig {
                max_retries: settings.max_retries,
                ..RetryConfig::default()
            },
            ..ClientConfig::default()
        })?;

        let credentials = credential_table(config);
        if !credentials.is_empty() {
            client = client.with_credentials(Arc::new(credentials));
        }

        let local = LocalRepository::open(&settings.local_repository)?;
        let fetcher = RepositoryFetcher::new(
            client,
            FetcherOptions {
                offline: settings.offline,
                checksum_policy: settings.checksum_policy,
            },
        )
        .with_local_repository(Arc::new(local));

        let inactive: Vec<String> = config.profiles.inactive.iter().map(|id| format!("!{}", id)).collect();
        let activation = ActivationContext::from_host()
            .with_profile_ids(config.profiles.active.iter().map(String::as_str))
            .with_profile_ids(inactive.iter().map(String::as_str))
            .with_properties(config.properties.clone());

        tracing::debug!(
            repositories = config.repositories.len(),
            offline = settings.offline,
            concurrency = settings.concurrency,
            "creating resolution session"
        );

        Ok(Self::new(fetcher, config.repository_descriptors())
            .with_mirrors(&config.mirror_list())
            .with_user_properties(config.properties.clone())
            .with_env(std::env::vars().collect())
            .with_activation(activation)
            .with_concurrency(settings.concurrency))
    }

    /// Rewrite the repository list through mirrors
    pub fn with_mirrors(mut self, mirrors: &[Mirror]) -> Self {
        if !mirrors.is_empty() {
            self.repositories = apply_mirrors(&self.repositories, mirrors);
        }
        self
    }

    /// Invocation properties; they shadow everything else
    pub fn with_user_properties(mut self, properties: IndexMap<String, String>) -> Self {
        self.user_properties = properties;
        self
    }

    /// Backing map for `${env.NAME}`
    pub fn with_env(mut self, env: IndexMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_activation(mut self, activation: ActivationContext) -> Self {
        self.activation = activation;
        self
    }

    /// Replace the profile activation predicate
    pub fn with_activator(mut self, activator: Arc<dyn ProfileActivator>) -> Self {
        self.activator = activator;
        self
    }

    /// Bound the number of concurrent descriptor resolutions
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        self.concurrency = concurrency;
        self.permits = Arc::new(Semaphore::new(concurrency));
        self
    }

    /// Fix `${maven.build.timestamp}`
    pub fn with_build_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.build_timestamp = timestamp.into();
        self
    }

    pub fn repositories(&self) -> &[RepositoryDescriptor] {
        &self.repositories
    }

    pub fn fetcher(&self) -> &RepositoryFetcher {
        &self.fetcher
    }

    pub fn failures(&self) -> &FailureSink {
        &self.failures
    }

    pub fn user_properties(&self) -> &IndexMap<String, String> {
        &self.user_properties
    }

    pub fn env(&self) -> &IndexMap<String, String> {
        &self.env
    }

    pub fn activation(&self) -> &ActivationContext {
        &self.activation
    }

    pub fn activator(&self) -> &dyn ProfileActivator {
        self.activator.as_ref()
    }

    pub fn build_timestamp(&self) -> &str {
        &self.build_timestamp
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub(crate) fn permits(&self) -> &Arc<Semaphore> {
        &self.permits
    }

    /// Stop issuing new fetches. Requests already in flight complete and
    /// populate the caches; the resolution then reports cancellation.
    pub fn cancel(&self) {
        tracing::info!("resolution session cancelled");
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancel
    }

    /// Lifecycle state of a coordinate in this session
    pub fn state(&self, coordinate: &Coordinate) -> NodeState {
        self.states
            .get(coordinate)
            .map(|state| *state)
            .unwrap_or(NodeState::Unvisited)
    }

    pub(crate) fn set_state(&self, coordinate: &Coordinate, state: NodeState) {
        self.states.insert(coordinate.clone(), state);
    }

    /// Append a failure to the session sink
    pub(crate) fn record(&self, failure: ResolutionFailure) {
        tracing::debug!(failure = %failure, "recorded resolution failure");
        self.failures.push(failure);
    }

    /// Record a failure unless one with the same key was already recorded
    pub(crate) fn record_once(&self, key: String, failure: ResolutionFailure) {
        if self.reported.insert(key) {
            self.record(failure);
        }
    }

    /// Fetch and parse the descriptor of `coordinate`, once per session
    pub(crate) async fn lookup(&self, coordinate: &Coordinate) -> ResolverResult<Lookup> {
        let cell = self.descriptors.entry(coordinate.clone()).or_default().clone();
        let lookup = cell
            .get_or_try_init(|| async {
                self.set_state(coordinate, NodeState::Fetching);
                let outcome = match self.fetcher.fetch_descriptor(coordinate, &self.repositories).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        self.set_state(coordinate, NodeState::Errored);
                        return Err(e);
                    }
                };
                let lookup = match outcome {
                    FetchOutcome::Found(fetched) => parse_fetched(&fetched.bytes, &fetched.uri),
                    FetchOutcome::Missing { attempts } => Lookup::Missing { attempts },
                };
                let state = match &lookup {
                    Lookup::Found(_) => NodeState::Resolved,
                    Lookup::Missing { attempts } if errored(attempts) => NodeState::Errored,
                    Lookup::Missing { .. } => NodeState::Absent,
                    Lookup::Invalid { .. } => NodeState::Errored,
                };
                self.set_state(coordinate, state);
                Ok(lookup)
            })
            .await?;
        Ok(lookup.clone())
    }
}

fn parse_fetched(bytes: &[u8], uri: &str) -> Lookup {
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            return Lookup::Invalid {
                reason: format!("not UTF-8: {}", e),
                uri: uri.to_string(),
            }
        }
    };
    match Descriptor::parse(text, uri) {
        Ok(descriptor) => Lookup::Found(Arc::new(descriptor)),
        Err(e) => Lookup::Invalid {
            reason: e.to_string(),
            uri: uri.to_string(),
        },
    }
}

fn errored(attempts: &[RepositoryAttempt]) -> bool {
    use pommel_core::AttemptOutcome;
    attempts.iter().any(|a| {
        matches!(
            a.outcome,
            AttemptOutcome::Errored { .. } | AttemptOutcome::ChecksumMismatch { .. }
        )
    })
}

/// Credential lookup table from `[credentials.<id>]` sections
fn credential_table(config: &PommelToml) -> StaticCredentials {
    let mut table = StaticCredentials::new();
    for (id, section) in &config.credentials {
        let credentials = match (&section.token, &section.username) {
            (Some(token), _) => Credentials::Bearer { token: token.clone() },
            (None, Some(username)) => Credentials::Basic {
                username: username.clone(),
                password: section.password.clone().unwrap_or_default(),
            },
            (None, None) => continue,
        };
        table.insert(id.clone(), credentials);
    }
    table
}
