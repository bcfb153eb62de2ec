//! Repository transport with retry logic
//!
//! `http(s)://` repositories go through a pooled `reqwest` client with a
//! per-request timeout; `file://` repositories are read with `tokio::fs`.

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Client, ClientBuilder, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use pommel_core::error::PommelError;
use pommel_core::types::RepositoryDescriptor;
use pommel_core::utils::file_url_to_path;

use crate::RegistryResult;

/// Configuration for exponential backoff retry logic
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

/// Transport configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Per-request timeout
    pub timeout: Duration,
    pub retry: RetryConfig,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            user_agent: concat!("pommel/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Repository credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Basic { username: String, password: String },
    Bearer { token: String },
}

impl Credentials {
    /// `Authorization` header value
    pub fn header_value(&self) -> RegistryResult<HeaderValue> {
        let raw = match self {
            Credentials::Basic { username, password } => {
                use base64::{engine::general_purpose, Engine as _};
                format!(
                    "Basic {}",
                    general_purpose::STANDARD.encode(format!("{}:{}", username, password))
                )
            }
            Credentials::Bearer { token } => format!("Bearer {}", token),
        };
        let mut value = HeaderValue::from_str(&raw)
            .map_err(|e| PommelError::network("Invalid authorization header".to_string(), e))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

/// Opaque credential lookup by repository id
pub trait CredentialSource: Send + Sync + std::fmt::Debug {
    fn credentials(&self, repository_id: &str) -> Option<Credentials>;
}

/// Fixed credential table
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    entries: HashMap<String, Credentials>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, repository_id: impl Into<String>, credentials: Credentials) -> Self {
        self.entries.insert(repository_id.into(), credentials);
        self
    }

    pub fn insert(&mut self, repository_id: impl Into<String>, credentials: Credentials) {
        self.entries.insert(repository_id.into(), credentials);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CredentialSource for StaticCredentials {
    fn credentials(&self, repository_id: &str) -> Option<Credentials> {
        self.entries.get(repository_id).cloned()
    }
}

/// A definitive answer from one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResponse {
    Found(Vec<u8>),
    /// Well-formed "not found" (HTTP 404/410 or a missing file)
    NotFound { status: Option<u16> },
    /// The repository refused the request (other 4xx); not retried
    Rejected { status: u16 },
}

/// Main transport for repository access
#[derive(Debug, Clone)]
pub struct RepositoryClient {
    /// Underlying HTTP client with connection pooling
    client: Client,
    retry_config: RetryConfig,
    credentials: Option<Arc<dyn CredentialSource>>,
}

impl RepositoryClient {
    /// Create new client with default configuration
    pub fn new() -> RegistryResult<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create client with custom configuration
    pub fn with_config(config: ClientConfig) -> RegistryResult<Self> {
        let client = ClientBuilder::new()
            .pool_max_idle_per_host(16)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(config.timeout)
            .gzip(true)
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| PommelError::network(format!("Failed to create HTTP client: {}", e), e))?;

        Ok(Self {
            client,
            retry_config: config.retry,
            credentials: None,
        })
    }

    /// Attach a credential lookup
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialSource>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry_config
    }

    /// Execute an operation with exponential backoff retry logic.
    ///
    /// Only errors are retried; a `NotFound` or `Rejected` response is an
    /// answer, not a failure.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> RegistryResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = RegistryResult<T>>,
    {
        let mut delay = self.retry_config.initial_delay;
        let mut last_error = None;

        for attempt in 0..=self.retry_config.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    let recoverable = error.is_recoverable();
                    last_error = Some(error);

                    if attempt == self.retry_config.max_retries || !recoverable {
                        break;
                    }

                    tracing::debug!(attempt = attempt + 1, delay_ms = delay.as_millis() as u64, "retrying request");
                    tokio::time::sleep(delay).await;

                    delay = std::cmp::min(
                        Duration::from_millis((delay.as_millis() as f64 * self.retry_config.multiplier) as u64),
                        self.retry_config.max_delay,
                    );
                }
            }
        }

        Err(last_error.unwrap_or_else(|| PommelError::Network {
            message: "Retry operation failed without error".to_string(),
            source: None,
        }))
    }

    /// Fetch `relative` from `repository`
    pub async fn get(&self, repository: &RepositoryDescriptor, relative: &str) -> RegistryResult<FetchResponse> {
        let uri = repository.resolve(relative);
        if repository.is_file() {
            return self.get_file(&uri).await;
        }
        self.get_http(repository, &uri).await
    }

    async fn get_file(&self, uri: &str) -> RegistryResult<FetchResponse> {
        let path = file_url_to_path(uri).ok_or_else(|| PommelError::Network {
            message: format!("Invalid file URL {}", uri),
            source: None,
        })?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(FetchResponse::Found(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FetchResponse::NotFound { status: None }),
            Err(e) => Err(PommelError::io(format!("Failed to read {}", path.display()), e)),
        }
    }

    async fn get_http(&self, repository: &RepositoryDescriptor, uri: &str) -> RegistryResult<FetchResponse> {
        let authorization = match self
            .credentials
            .as_ref()
            .and_then(|source| source.credentials(&repository.id))
        {
            Some(credentials) => Some(credentials.header_value()?),
            None => None,
        };

        self.with_retry(|| async {
            let mut request = self.client.get(uri);
            if let Some(value) = &authorization {
                request = request.header(AUTHORIZATION, value.clone());
            }

            let response = request
                .send()
                .await
                .map_err(|e| PommelError::network(format!("GET {} failed: {}", uri, e), e))?;

            match response.status() {
                status if status.is_success() => {
                    let bytes = response
                        .bytes()
                        .await
                        .map_err(|e| PommelError::network(format!("Failed to read body of {}: {}", uri, e), e))?;
                    Ok(FetchResponse::Found(bytes.to_vec()))
                }
                StatusCode::NOT_FOUND | StatusCode::GONE => Ok(FetchResponse::NotFound {
                    status: Some(response.status().as_u16()),
                }),
                status if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS => {
                    Ok(FetchResponse::Rejected { status: status.as_u16() })
                }
                status => Err(PommelError::Network {
                    message: format!("{} returned status {}", uri, status),
                    source: None,
                }),
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests;
