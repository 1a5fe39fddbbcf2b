//! Metadata fetching
//!
//! `MetadataFetcher` is the seam to the metadata service; `HttpFetcher`
//! talks to an orchestrator API server. `FetchDispatcher` runs fetches on
//! background tasks and resolves the cache tickets, so the filter itself
//! never waits on the network.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::cache::{FetchTicket, MetadataCache};
use super::document::MetadataDocument;
use super::key::MetadataKey;
use crate::util::RateLimitedLogger;
use crate::{FetchError, FilterError, FilterResult};

#[cfg(test)]
#[path = "fetch_test.rs"]
mod tests;

/// Upper bound for the delay between fetch attempts
const MAX_FETCH_BACKOFF: Duration = Duration::from_secs(5);

/// Boxed future returned by `MetadataFetcher::fetch`
pub type FetchFuture<'a> =
    Pin<Box<dyn Future<Output = Result<MetadataDocument, FetchError>> + Send + 'a>>;

/// Source of metadata documents
pub trait MetadataFetcher: Send + Sync {
    /// Fetch the document for `key`
    fn fetch<'a>(&'a self, key: &'a MetadataKey) -> FetchFuture<'a>;

    /// Name for logs
    fn name(&self) -> &'static str;
}

/// Fetches pod documents from an orchestrator API server
///
/// Issues `GET {base_url}/api/v1/namespaces/{namespace}/pods/{name}`, with
/// an optional bearer token.
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    timeout: Duration,
}

impl HttpFetcher {
    /// Create a fetcher
    ///
    /// # Errors
    /// Returns `FilterError::Config` if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> FilterResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FilterError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            timeout,
        })
    }

    /// URL of the document for `key`
    pub fn url(&self, key: &MetadataKey) -> String {
        format!(
            "{}/api/v1/namespaces/{}/pods/{}",
            self.base_url,
            key.namespace(),
            key.name()
        )
    }

    async fn fetch_document(&self, key: &MetadataKey) -> Result<MetadataDocument, FetchError> {
        let mut request = self.client.get(self.url(key));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| FetchError::decode(e.to_string()))?;

        MetadataDocument::from_json(&body)
    }

    fn request_error(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Request(e.to_string())
        }
    }
}

impl MetadataFetcher for HttpFetcher {
    fn fetch<'a>(&'a self, key: &'a MetadataKey) -> FetchFuture<'a> {
        Box::pin(self.fetch_document(key))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

impl std::fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Dispatcher settings
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Fetches allowed to run at once
    pub max_concurrent: usize,
    /// Bound on a single attempt
    pub timeout: Duration,
    /// Attempts per ticket (at least 1)
    pub attempts: u32,
    /// Delay before the second attempt, doubled for each one after
    pub backoff: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            timeout: Duration::from_secs(3),
            attempts: 3,
            backoff: Duration::from_millis(200),
        }
    }
}

impl DispatchConfig {
    /// Delay after failed attempt `attempt` (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff.saturating_mul(factor).min(MAX_FETCH_BACKOFF)
    }
}

/// Runs fetches in the background and resolves their tickets
///
/// Concurrency is bounded by a semaphore. Each attempt is bounded by a
/// timeout; retryable failures are retried with exponential backoff, and
/// the last failure is what the cache records.
pub struct FetchDispatcher {
    fetcher: Arc<dyn MetadataFetcher>,
    cache: MetadataCache,
    permits: Arc<Semaphore>,
    config: DispatchConfig,
    failures: Arc<RateLimitedLogger>,
    cancel: CancellationToken,
}

impl FetchDispatcher {
    pub fn new(
        fetcher: Arc<dyn MetadataFetcher>,
        cache: MetadataCache,
        config: DispatchConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            fetcher,
            cache,
            permits: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            config,
            failures: Arc::new(RateLimitedLogger::default()),
            cancel,
        }
    }

    /// Fetch in the background and complete `ticket`
    ///
    /// If the dispatcher is cancelled first, the ticket is dropped and the
    /// entry reverts to `Absent`.
    pub fn dispatch(&self, ticket: FetchTicket) -> JoinHandle<()> {
        let fetcher = Arc::clone(&self.fetcher);
        let cache = self.cache.clone();
        let permits = Arc::clone(&self.permits);
        let config = self.config.clone();
        let failures = Arc::clone(&self.failures);
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let outcome = tokio::select! {
                outcome = run_fetch(fetcher.as_ref(), ticket.key(), &permits, &config) => outcome,
                _ = cancel.cancelled() => {
                    debug!(key = %ticket.key(), "metadata fetch cancelled");
                    return;
                }
            };

            if let Err(e) = &outcome {
                failures.warn("metadata fetch failed", e);
            }
            cache.complete(ticket, outcome);
        })
    }

    /// Stop starting new attempts; in-flight tickets revert to `Absent`
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn fetcher_name(&self) -> &'static str {
        self.fetcher.name()
    }
}

impl std::fmt::Debug for FetchDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchDispatcher")
            .field("fetcher", &self.fetcher.name())
            .field("config", &self.config)
            .finish()
    }
}

async fn run_fetch(
    fetcher: &dyn MetadataFetcher,
    key: &MetadataKey,
    permits: &Semaphore,
    config: &DispatchConfig,
) -> Result<MetadataDocument, FetchError> {
    let attempts = config.attempts.max(1);
    let mut attempt = 1;

    loop {
        let result = {
            let _permit = permits
                .acquire()
                .await
                .map_err(|_| FetchError::Request("fetch dispatcher closed".into()))?;

            match tokio::time::timeout(config.timeout, fetcher.fetch(key)).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout(config.timeout)),
            }
        };

        match result {
            Ok(doc) => {
                trace!(key = %key, attempt, "metadata fetched");
                return Ok(doc);
            }
            Err(e) if attempt < attempts && e.is_retryable() => {
                let delay = config.delay_for_attempt(attempt);
                debug!(
                    key = %key,
                    attempt,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "retrying metadata fetch"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
