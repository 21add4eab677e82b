//! HTTP transport seam.
//!
//! Sources build `Request`s, the fetcher sends them through a `Transport`.
//! Production code uses `HttpTransport` (reqwest); tests script responses with
//! `mock::MockTransport`.

use crate::config::Config;
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use std::fmt;
use tracing::debug;

/// External services the pipeline talks to. Concurrency is capped per host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Host {
    Crossref,
    OpenAlex,
    Orcid,
    OpenCitations,
}

impl Host {
    pub const ALL: [Host; 4] = [Host::Crossref, Host::OpenAlex, Host::Orcid, Host::OpenCitations];

    pub fn name(&self) -> &'static str {
        match self {
            Host::Crossref => "crossref",
            Host::OpenAlex => "openalex",
            Host::Orcid => "orcid",
            Host::OpenCitations => "opencitations",
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One GET request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub host: Host,
    pub url: String,
}

impl Request {
    pub fn new(host: Host, url: impl Into<String>) -> Self {
        Self { host, url: url.into() }
    }
}

/// Status and body of a completed exchange
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends GET requests. `Err` means no HTTP response was obtained at all.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, request: &Request) -> Result<Response>;
}

/// reqwest-backed transport with the contact header every service asks for
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .user_agent(format!("journalscope/{} (mailto:{})", env!("CARGO_PKG_VERSION"), config.mailto))
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| PipelineError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, request: &Request) -> Result<Response> {
        debug!(host = %request.host, url = %request.url, "GET");
        let response = self.client.get(&request.url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(Response { status, body })
    }
}
