//! Rate-limited paginated fetcher.
//!
//! One `Fetcher` serves every stage. A `PageSource` adapts an endpoint: it
//! builds the URL for a cursor and parses a body into a `Page`. The fetcher
//! walks the cursor chain, retries each request with exponential backoff and
//! caps in-flight requests per host with a semaphore.
//!
//! A fetch is all-or-nothing: if any page exhausts its retries the items
//! already collected are dropped and the caller gets `FetchOutcome::Failed`.

use crate::config::{Config, HostLimits};
use crate::error::{PipelineError, Result};
use crate::http::{Host, Request, Transport};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Cursor value that starts a cursor-paginated listing
pub const INITIAL_CURSOR: &str = "*";

/// How an endpoint pages its results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    /// Follow `next_cursor` until it is absent or a page comes back empty
    Cursor,
    /// One request returns everything
    Single,
}

/// One parsed response page
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next_cursor: None }
    }
}

/// Response-shape adapter for one endpoint and one identifier
pub trait PageSource: Send + Sync {
    type Item: Send;

    fn host(&self) -> Host;

    fn pagination(&self) -> Pagination;

    /// URL of the page addressed by `cursor` (ignored for `Single`)
    fn url(&self, cursor: &str) -> Result<String>;

    fn parse(&self, body: &str) -> Result<Page<Self::Item>>;
}

/// Result of fetching everything for one identifier
#[derive(Debug)]
pub enum FetchOutcome<T> {
    /// Complete, ordered item sequence
    Items(Vec<T>),
    /// Well-formed response with zero items
    NoData,
    /// Gave up; no partial data
    Failed(PipelineError),
}

impl<T> FetchOutcome<T> {
    /// Items, with `NoData` flattened to an empty vector
    pub fn into_result(self) -> Result<Vec<T>> {
        match self {
            FetchOutcome::Items(items) => Ok(items),
            FetchOutcome::NoData => Ok(Vec::new()),
            FetchOutcome::Failed(e) => Err(e),
        }
    }
}

/// Retry budget and backoff curve
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts per request, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Pause after failed attempt number `attempt` (0-based): `base * 2^attempt`
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Shared HTTP fetcher with per-host concurrency limits
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    permits: HashMap<Host, Arc<Semaphore>>,
    policy: RetryPolicy,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>, limits: HostLimits, policy: RetryPolicy) -> Self {
        let permits = Host::ALL
            .iter()
            .map(|host| (*host, Arc::new(Semaphore::new(limits.for_host(*host)))))
            .collect();
        Self {
            transport,
            permits,
            policy,
        }
    }

    pub fn from_config(transport: Arc<dyn Transport>, config: &Config) -> Self {
        Self::new(
            transport,
            config.limits,
            RetryPolicy {
                max_attempts: config.max_attempts.max(1),
                base_delay: config.backoff_base,
            },
        )
    }

    /// Fetch every page `source` addresses, in cursor order.
    pub async fn fetch_all<S: PageSource>(&self, source: &S) -> FetchOutcome<S::Item> {
        let mut items = Vec::new();
        let mut cursor = INITIAL_CURSOR.to_string();
        let mut pages = 0usize;

        loop {
            let page = match self.fetch_page(source, &cursor).await {
                Ok(page) => page,
                Err(e) => {
                    debug!(host = %source.host(), pages, error = %e, "Fetch abandoned");
                    return FetchOutcome::Failed(e);
                }
            };
            pages += 1;

            let exhausted = page.items.is_empty();
            items.extend(page.items);

            if exhausted || source.pagination() == Pagination::Single {
                break;
            }
            match page.next_cursor {
                Some(next) if !next.is_empty() && next != cursor => cursor = next,
                _ => break,
            }
        }

        if items.is_empty() {
            FetchOutcome::NoData
        } else {
            FetchOutcome::Items(items)
        }
    }

    async fn fetch_page<S: PageSource>(&self, source: &S, cursor: &str) -> Result<Page<S::Item>> {
        let request = Request::new(source.host(), source.url(cursor)?);
        let body = self.get_with_retry(&request).await?;
        source.parse(&body)
    }

    /// GET one URL, retrying transient failures with exponential backoff.
    ///
    /// The host permit is held only while the request is open, never while
    /// sleeping.
    pub async fn get_with_retry(&self, request: &Request) -> Result<String> {
        let attempts = self.policy.max_attempts.max(1);
        let mut last = None;

        for attempt in 0..attempts {
            let result = {
                let _permit = self.acquire(request.host).await?;
                self.transport.get(request).await
            };

            let error = match result {
                Ok(response) if response.is_success() => return Ok(response.body),
                Ok(response) if response.status == 429 => PipelineError::RateLimited {
                    host: request.host.to_string(),
                    status: response.status,
                },
                Ok(response) => PipelineError::Api {
                    code: response.status,
                    message: format!("{} returned HTTP {}", request.host, response.status),
                },
                Err(e) => e,
            };

            if !error.is_transient() {
                debug!(url = %request.url, error = %error, "Permanent failure, not retrying");
                return Err(error);
            }

            if attempt + 1 < attempts {
                let backoff = self.policy.delay(attempt);
                warn!(
                    host = %request.host,
                    attempt = attempt + 1,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %error,
                    "Request failed, backing off"
                );
                tokio::time::sleep(backoff).await;
            }
            last = Some(error);
        }

        Err(PipelineError::RetriesExhausted {
            attempts,
            last: Box::new(last.unwrap_or_else(|| PipelineError::Transport("no attempt made".into()))),
        })
    }

    async fn acquire(&self, host: Host) -> Result<tokio::sync::OwnedSemaphorePermit> {
        let semaphore = self
            .permits
            .get(&host)
            .cloned()
            .ok_or_else(|| PipelineError::Config(format!("No concurrency limit for {}", host)))?;
        semaphore
            .acquire_owned()
            .await
            .map_err(|e| PipelineError::Config(format!("Semaphore closed: {}", e)))
    }
}
