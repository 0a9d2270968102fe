//! Local store writer
//!
//! Writes documents and binary assets under the destination directory.
//! Paths are deterministic functions of repository/document identity, so a
//! re-downloaded document overwrites its previous version in place.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::client::{Doc, Repo};

/// Subdirectory for binary assets referenced from document bodies
const ASSET_DIR: &str = "files";

/// Filesystem layout under one destination directory
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic path for a document: `<root>/<repo_slug>/doc<id>.json`
    pub fn document_path(&self, repo: &Repo, doc_id: i64) -> PathBuf {
        self.root
            .join(sanitize(&repo.slug))
            .join(format!("doc{}.json", doc_id))
    }

    /// Path for a named asset: `<root>/files/<name>`
    pub fn asset_path(&self, name: &str) -> PathBuf {
        self.root.join(ASSET_DIR).join(sanitize(name))
    }

    /// Serialize a document as pretty JSON to its deterministic path,
    /// creating parent directories as needed. Returns the path written.
    pub async fn write_doc(&self, repo: &Repo, doc: &Doc) -> Result<PathBuf> {
        let path = self.document_path(repo, doc.id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }

        let content = serde_json::to_vec_pretty(doc)
            .with_context(|| format!("Failed to serialize document {}", doc.id))?;
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write document file: {:?}", path))?;

        debug!("Wrote document {} ({}) to {:?}", doc.id, doc.title, path);
        Ok(path)
    }

    /// Make sure the asset directory exists before streaming into it
    pub async fn ensure_asset_dir(&self) -> Result<PathBuf> {
        let dir = self.root.join(ASSET_DIR);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create asset directory: {:?}", dir))?;
        Ok(dir)
    }
}

/// Keep identifiers usable as single path components
fn sanitize(name: &str) -> String {
    name.replace(['/', '\\'], "_")
}
