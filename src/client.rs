//! Yuque REST API client
//!
//! Thin wrapper around `reqwest` for the handful of endpoints the backup
//! needs: repository listing, document listing, document bodies and binary
//! assets. All requests go through a per-second rate limiter so a large
//! backup does not trip the service's request quota.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;

const TOKEN_HEADER: &str = "X-Auth-Token";
// Yuque rejects requests without a browser-looking User-Agent
const USER_AGENT_VALUE: &str = "Mozilla/5.0 (compatible; yuback)";
const PAGE_SIZE: u32 = 100;
// Hard cap on pagination, mirrors the service-side listing limit
const MAX_OFFSET: u32 = 10_000;

/// A repository as reported by the API
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Repo {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub updated_at: DateTime<Utc>,
}

/// Document metadata from a repository listing; enough to decide whether the
/// document needs a new backup without fetching its body
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DocSummary {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub updated_at: DateTime<Utc>,
}

/// A full document, body included
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Doc {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub slug: String,
    pub title: String,
    pub book_id: i64,
    #[serde(default)]
    pub description: String,
    pub format: String,
    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub body_sheet: Option<String>,
    #[serde(default)]
    pub body_html: Option<String>,
    #[serde(default)]
    pub body_lake: Option<String>,
}

/// Every API response wraps its payload in a `data` envelope
#[derive(Deserialize)]
struct ResponseObj<T> {
    data: T,
}

/// Request budget of `budget` calls per one-second window
struct RateLimiter {
    budget: u32,
    used: u32,
    window: tokio::time::Instant,
}

impl RateLimiter {
    fn new(budget: u32) -> Self {
        Self {
            budget,
            used: 0,
            window: tokio::time::Instant::now(),
        }
    }

    async fn acquire(&mut self) {
        if self.used < self.budget {
            self.used += 1;
            return;
        }
        tokio::time::sleep_until(self.window + Duration::from_secs(1)).await;
        self.window = tokio::time::Instant::now();
        self.used = 1;
    }
}

/// Yuque API client bound to one host and one target user/group
pub struct YuqueClient {
    http: reqwest::Client,
    host: String,
    target_path: String,
    limiter: Mutex<RateLimiter>,
}

impl YuqueClient {
    /// Create a client from a validated configuration
    pub fn new(config: &Config) -> Result<Self> {
        let mut token_value = HeaderValue::try_from(&config.token)
            .context("Token is not a valid HTTP header value")?;
        token_value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(TOKEN_HEADER, token_value);
        headers.insert(
            reqwest::header::USER_AGENT,
            HeaderValue::from_static(USER_AGENT_VALUE),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            host: config.host.clone(),
            target_path: format!("{}/{}", config.target.kind, config.target.login),
            limiter: Mutex::new(RateLimiter::new(config.rate_limit)),
        })
    }

    /// Build a full URL from an API path suffix.
    ///
    /// Joined by string concatenation on purpose: `Url::join` would eat path
    /// segments, and a parsed host re-renders with a trailing slash.
    fn url(&self, suffix: &str) -> Result<Url> {
        Url::parse(&format!("{}{}", self.host, suffix))
            .with_context(|| format!("Invalid API URL: {}{}", self.host, suffix))
    }

    /// Issue one GET and unwrap the `data` envelope
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        suffix: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        self.limiter.lock().await.acquire().await;

        let url = self.url(suffix)?;
        let response = self
            .http
            .get(url.clone())
            .query(query)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            bail!("Authentication rejected by {} (HTTP {})", self.host, status);
        }
        if !status.is_success() {
            bail!("API request to {} failed with HTTP {}", url, status);
        }

        let envelope: ResponseObj<T> = response
            .json()
            .await
            .with_context(|| format!("Failed to decode API response from {}", url))?;
        Ok(envelope.data)
    }

    /// List all repositories of the configured user/group
    pub async fn list_repos(&self) -> Result<Vec<Repo>> {
        debug!("Fetching repositories for {}", self.target_path);

        let mut repos = Vec::new();
        let mut offset = 0u32;

        loop {
            let page: Vec<Repo> = self
                .get_json(
                    &format!("/api/v2/{}/repos", self.target_path),
                    &[
                        ("limit", PAGE_SIZE.to_string()),
                        ("offset", offset.to_string()),
                    ],
                )
                .await
                .with_context(|| format!("Failed to list repositories for {}", self.target_path))?;

            let count = page.len();
            repos.extend(page);

            if count < PAGE_SIZE as usize {
                break;
            }
            offset += PAGE_SIZE;
            if offset >= MAX_OFFSET {
                warn!("Reached maximum pagination offset ({})", MAX_OFFSET);
                break;
            }
        }

        info!("Found {} repositories for {}", repos.len(), self.target_path);
        Ok(repos)
    }

    /// List document metadata for one repository
    pub async fn list_docs(&self, repo: &Repo) -> Result<Vec<DocSummary>> {
        debug!("Fetching document list for repository: {}", repo.slug);

        let mut docs = Vec::new();
        let mut offset = 0u32;

        loop {
            let page: Vec<DocSummary> = self
                .get_json(
                    &format!("/api/v2/repos/{}/docs", repo.id),
                    &[
                        ("limit", PAGE_SIZE.to_string()),
                        ("offset", offset.to_string()),
                    ],
                )
                .await
                .with_context(|| format!("Failed to list documents for repository {}", repo.slug))?;

            let count = page.len();
            docs.extend(page);

            if count < PAGE_SIZE as usize {
                break;
            }
            offset += PAGE_SIZE;
            if offset >= MAX_OFFSET {
                warn!(
                    "Reached maximum pagination offset ({}) for repository {}",
                    MAX_OFFSET, repo.slug
                );
                break;
            }
        }

        info!("Found {} documents in repository {}", docs.len(), repo.slug);
        Ok(docs)
    }

    /// Fetch a full document, body included
    pub async fn get_doc(&self, repo: &Repo, doc_id: i64) -> Result<Doc> {
        self.get_json(&format!("/api/v2/repos/{}/docs/{}", repo.id, doc_id), &[])
            .await
            .with_context(|| {
                format!("Failed to fetch document {} from repository {}", doc_id, repo.slug)
            })
    }

    /// Stream a binary asset to the given path, overwriting any existing file
    pub async fn fetch_asset(&self, url: Url, path: &Path) -> Result<()> {
        self.limiter.lock().await.acquire().await;

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            bail!("Asset request to {} failed with HTTP {}", url, status);
        }

        let mut stream = response.bytes_stream();
        let mut file = tokio::fs::File::create(path)
            .await
            .with_context(|| format!("Failed to create asset file: {:?}", path))?;

        while let Some(chunk) = stream
            .try_next()
            .await
            .with_context(|| format!("Failed while streaming asset from {}", url))?
        {
            file.write_all(&chunk)
                .await
                .with_context(|| format!("Failed to write asset file: {:?}", path))?;
        }
        file.flush()
            .await
            .with_context(|| format!("Failed to flush asset file: {:?}", path))?;

        debug!("Downloaded asset {} -> {:?}", url, path);
        Ok(())
    }
}
