//! Sync engine - the incremental backup pipeline
//!
//! Orchestrates one backup run: resolve the configured repository slugs
//! against the remote listing, enumerate documents, decide per document
//! whether it changed, download and store what did, and keep the manifest
//! up to date. The pipeline is strictly sequential: one logical worker,
//! no parallelism across documents or repositories.

use anyhow::{Context, Result};
use regex::Regex;
use reqwest::Url;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::client::{Doc, DocSummary, Repo, YuqueClient};
use crate::config::Config;
use crate::manifest::{Decision, FetchReason, Manifest};
use crate::store::DocumentStore;

// Candidate URLs in document bodies; the host filter below decides which
// ones actually belong to the configured instance
const ASSET_URL_PATTERN: &str = r#"https?://[^\s)"'<>\]]+"#;

/// Per-document outcome of a run
#[derive(Debug, Clone)]
pub enum SyncOutcome {
    /// Document was downloaded and written to disk
    Downloaded {
        repo: String,
        doc_id: i64,
        title: String,
        reason: FetchReason,
        path: PathBuf,
    },
    /// Remote was not newer than the stored state
    Skipped { repo: String, doc_id: i64 },
}

/// Results from a complete backup run
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub repositories: usize,
    pub documents: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub assets: usize,
    pub duration: Duration,
    pub results: Vec<SyncOutcome>,
}

/// The backup engine for one destination directory
pub struct SyncEngine {
    config: Config,
    client: YuqueClient,
    store: DocumentStore,
    host_url: Url,
    asset_pattern: Regex,
}

impl SyncEngine {
    /// Create an engine from a validated configuration and a destination root
    pub fn new(config: Config, destination: PathBuf) -> Result<Self> {
        let client = YuqueClient::new(&config)?;
        let host_url = config.host_url()?;
        let asset_pattern =
            Regex::new(ASSET_URL_PATTERN).context("Failed to compile asset URL pattern")?;

        Ok(Self {
            config,
            client,
            store: DocumentStore::new(destination),
            host_url,
            asset_pattern,
        })
    }

    /// Run one complete incremental backup
    pub async fn run(&self) -> Result<SyncSummary> {
        let start = Instant::now();

        if self.config.repos.is_empty() {
            info!("No repositories configured, nothing to back up");
            return Ok(compile_summary(0, 0, 0, Vec::new(), start.elapsed()));
        }

        info!(
            "Starting incremental backup of {} repositories to {:?}",
            self.config.repos.len(),
            self.store.root()
        );

        tokio::fs::create_dir_all(self.store.root())
            .await
            .with_context(|| format!("Failed to create destination: {:?}", self.store.root()))?;

        let mut manifest = Manifest::load(self.store.root());

        let available = self
            .client
            .list_repos()
            .await
            .context("Failed to enumerate remote repositories")?;
        let selected = resolve_targets(&self.config.repos, available)?;

        let mut results = Vec::new();
        let mut documents = 0;
        let mut assets = 0;

        for repo in &selected {
            manifest.record_repo(repo);

            let docs = self.client.list_docs(repo).await?;
            documents += docs.len();

            for doc in &docs {
                match manifest.decision(doc) {
                    Decision::Skip => {
                        debug!("Unchanged, skipping: {}/{}", repo.slug, doc.slug);
                        results.push(SyncOutcome::Skipped {
                            repo: repo.slug.clone(),
                            doc_id: doc.id,
                        });
                    }
                    Decision::Fetch(reason) => {
                        let (path, fetched) = self.backup_document(repo, doc, reason).await?;
                        // Manifest paths are relative to the destination so
                        // the backup directory can be moved as a whole
                        let relative = path
                            .strip_prefix(self.store.root())
                            .unwrap_or(&path)
                            .to_path_buf();
                        manifest.track(doc, &relative);
                        assets += fetched;
                        results.push(SyncOutcome::Downloaded {
                            repo: repo.slug.clone(),
                            doc_id: doc.id,
                            title: doc.title.clone(),
                            reason,
                            path,
                        });
                    }
                }
            }

            // Persist after each repository so an aborted run loses at most
            // the in-flight repository's bookkeeping
            manifest
                .save(self.store.root())
                .context("Failed to persist manifest")?;
        }

        let summary = compile_summary(selected.len(), documents, assets, results, start.elapsed());

        info!(
            "Backup completed in {:.2}s: {} downloaded, {} skipped across {} repositories",
            summary.duration.as_secs_f64(),
            summary.downloaded,
            summary.skipped,
            summary.repositories
        );

        Ok(summary)
    }

    /// Download one document, write it to disk and back up its assets.
    /// Returns the path written and the number of assets fetched.
    async fn backup_document(
        &self,
        repo: &Repo,
        doc: &DocSummary,
        reason: FetchReason,
    ) -> Result<(PathBuf, usize)> {
        info!("Backing up {}/{} ({:?})", repo.slug, doc.slug, reason);

        let full = self.client.get_doc(repo, doc.id).await?;
        let path = self.store.write_doc(repo, &full).await?;
        let assets = self.backup_assets(&full).await?;

        Ok((path, assets))
    }

    /// Download host-local assets referenced from the document body.
    ///
    /// Asset failures are logged and skipped rather than aborting the run;
    /// the document itself is already safely on disk at this point.
    async fn backup_assets(&self, doc: &Doc) -> Result<usize> {
        let Some(body) = doc.body.as_deref() else {
            return Ok(0);
        };

        let urls = self.extract_asset_urls(body);
        if urls.is_empty() {
            return Ok(0);
        }

        self.store.ensure_asset_dir().await?;

        let mut fetched = 0;
        for url in urls {
            let Some(name) = url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|name| !name.is_empty())
            else {
                continue;
            };

            let path = self.store.asset_path(name);
            if path.exists() {
                debug!("Asset already present, skipping: {:?}", path);
                continue;
            }

            match self.client.fetch_asset(url.clone(), &path).await {
                Ok(()) => fetched += 1,
                Err(e) => warn!("Failed to download asset {}: {:#}", url, e),
            }
        }

        Ok(fetched)
    }

    /// URLs in the body that point at the configured host
    fn extract_asset_urls(&self, body: &str) -> Vec<Url> {
        self.asset_pattern
            .find_iter(body)
            .filter_map(|m| Url::parse(m.as_str()).ok())
            .filter(|url| url.host() == self.host_url.host())
            .collect()
    }
}

/// Resolve configured slugs against the remote listing, preserving config
/// order. An unknown slug is a configuration error.
fn resolve_targets(requested: &[String], available: Vec<Repo>) -> Result<Vec<Repo>> {
    let mut by_slug: HashMap<String, Repo> = available
        .into_iter()
        .map(|repo| (repo.slug.clone(), repo))
        .collect();

    requested
        .iter()
        .map(|slug| {
            by_slug.remove(slug).with_context(|| {
                format!(
                    "Repository {:?} not found on the remote (or listed twice)",
                    slug
                )
            })
        })
        .collect()
}

fn compile_summary(
    repositories: usize,
    documents: usize,
    assets: usize,
    results: Vec<SyncOutcome>,
    duration: Duration,
) -> SyncSummary {
    let mut downloaded = 0;
    let mut skipped = 0;

    for result in &results {
        match result {
            SyncOutcome::Downloaded { .. } => downloaded += 1,
            SyncOutcome::Skipped { .. } => skipped += 1,
        }
    }

    SyncSummary {
        repositories,
        documents,
        downloaded,
        skipped,
        assets,
        duration,
        results,
    }
}
