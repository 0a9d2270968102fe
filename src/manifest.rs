//! Local manifest - the state that makes the backup incremental
//!
//! The manifest records, for every document ever downloaded, the last
//! update timestamp seen from the remote side, the path the document was
//! written to, and the history of backup runs that touched it. It is
//! persisted as pretty JSON under the destination directory and is the only
//! state carried between runs.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::client::{DocSummary, Repo};

/// Manifest file name under the destination directory
pub const MANIFEST_FILE: &str = "manifest.json";

/// What to do with a remote document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Download the document body and write it to disk
    Fetch(FetchReason),
    /// Remote is not newer than what we already have
    Skip,
}

/// Why a document is being fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchReason {
    /// Never seen before
    New,
    /// Remote timestamp is strictly newer than the stored one
    Updated,
}

/// State for one downloaded document, keyed by document id
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ManifestEntry {
    /// Remote update timestamp at the time of the last download.
    /// Monotonically non-decreasing.
    pub last_synced: DateTime<Utc>,

    /// Where the document lives under the destination directory
    pub local_path: String,

    /// Remote timestamps of every backup that touched this document
    pub backups: Vec<DateTime<Utc>>,
}

/// Repository metadata recorded alongside the document entries
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RepoRecord {
    pub slug: String,
    pub name: String,
    pub updated_at: DateTime<Utc>,
}

impl From<&Repo> for RepoRecord {
    fn from(repo: &Repo) -> Self {
        Self {
            slug: repo.slug.clone(),
            name: repo.name.clone(),
            updated_at: repo.updated_at,
        }
    }
}

/// The persisted manifest. Entries are created on first download, updated on
/// re-download, and never deleted.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Manifest {
    #[serde(default)]
    pub entries: HashMap<i64, ManifestEntry>,

    #[serde(default)]
    pub repos: HashMap<i64, RepoRecord>,
}

impl Manifest {
    /// Path of the manifest file under a destination directory
    pub fn path_in(destination: &Path) -> PathBuf {
        destination.join(MANIFEST_FILE)
    }

    /// Load the manifest from the destination directory.
    ///
    /// A missing or unreadable file is treated as a first run and yields the
    /// empty manifest.
    pub fn load(destination: &Path) -> Self {
        let path = Self::path_in(destination);
        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(manifest) => {
                    debug!("Loaded manifest from {:?}", path);
                    manifest
                }
                Err(e) => {
                    warn!("Manifest at {:?} is unreadable, starting fresh: {}", path, e);
                    Self::default()
                }
            },
            Err(_) => {
                debug!("No manifest at {:?}, starting fresh", path);
                Self::default()
            }
        }
    }

    /// Persist the manifest to the destination directory
    pub fn save(&self, destination: &Path) -> Result<()> {
        let path = Self::path_in(destination);
        let content =
            serde_json::to_vec_pretty(self).context("Failed to serialize manifest")?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write manifest: {:?}", path))?;
        debug!("Saved manifest with {} entries to {:?}", self.entries.len(), path);
        Ok(())
    }

    /// Decide whether a remote document needs a new backup.
    ///
    /// Fetch if the document has no entry or the remote timestamp is strictly
    /// greater than the stored one. Equal timestamps skip.
    pub fn decision(&self, doc: &DocSummary) -> Decision {
        match self.entries.get(&doc.id) {
            None => Decision::Fetch(FetchReason::New),
            Some(entry) if doc.updated_at > entry.last_synced => {
                Decision::Fetch(FetchReason::Updated)
            }
            Some(_) => Decision::Skip,
        }
    }

    /// Record a successful download of `doc` to `local_path`.
    ///
    /// The stored timestamp never moves backwards, even if the remote reports
    /// an older timestamp than a previous run.
    pub fn track(&mut self, doc: &DocSummary, local_path: &Path) {
        let entry = self
            .entries
            .entry(doc.id)
            .or_insert_with(|| ManifestEntry {
                last_synced: doc.updated_at,
                local_path: local_path.display().to_string(),
                backups: Vec::new(),
            });

        if doc.updated_at > entry.last_synced {
            entry.last_synced = doc.updated_at;
        }
        entry.local_path = local_path.display().to_string();
        entry.backups.push(doc.updated_at);
    }

    /// Record the repository a document run belongs to
    pub fn record_repo(&mut self, repo: &Repo) {
        self.repos.insert(repo.id, RepoRecord::from(repo));
    }
}
