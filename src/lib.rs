//! yuback - Incremental Yuque Knowledge-Base Backup
//!
//! yuback mirrors documents from a Yuque instance to local disk, downloading
//! only what changed since the last successful run.
//!
//! ## Core Features
//!
//! - **Incremental backups**: a local manifest records the last-seen update
//!   timestamp per document; unchanged documents are never re-downloaded
//! - **Deterministic layout**: documents live at stable paths derived from
//!   repository and document identity
//! - **Asset mirroring**: binary attachments referenced from document bodies
//!   are downloaded alongside the documents
//! - **Rate limiting**: API calls are budgeted per second
//!
//! ## Modules
//!
//! - [`config`]: JSON configuration loading and validation
//! - [`client`]: Yuque REST API client
//! - [`manifest`]: persisted sync state and change detection
//! - [`store`]: filesystem layout and document writing
//! - [`sync`]: the sequential backup pipeline

pub mod client;
pub mod config;
pub mod manifest;
pub mod store;
pub mod sync;

pub use client::{Doc, DocSummary, Repo, YuqueClient};
pub use config::{Config, Target, TargetKind, Token};
pub use manifest::{Decision, FetchReason, Manifest, ManifestEntry};
pub use store::DocumentStore;
pub use sync::{SyncEngine, SyncOutcome, SyncSummary};
