//! # pixshelf-sync
//!
//! Ingestion pipeline for pixshelf.
//!
//! This crate provides:
//! - [`Reconciler`]: merges one normalized artwork into the catalog
//! - [`RefreshOrchestrator`]: replays ingestion over a working set with
//!   bounded concurrency, jittered pacing and aggregated failure reporting
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use pixshelf_db::Database;
//! use pixshelf_sync::{Reconciler, RefreshConfig, RefreshOrchestrator, WorkingSet};
//! use pixshelf_upstream::{PixivClient, StaticCredential};
//!
//! let db = Arc::new(Database::connect("postgres://...").await?);
//! let client = PixivClient::from_env(Arc::new(StaticCredential::from_env()))?;
//! let reconciler = Arc::new(Reconciler::new(db.clone(), Arc::new(client)));
//!
//! let orchestrator = RefreshOrchestrator::new(reconciler, RefreshConfig::from_env())
//!     .with_job_store(Arc::new(db.refresh_jobs.clone()));
//!
//! let handle = orchestrator.spawn(WorkingSet::Unsynced);
//! println!("refresh {} accepted", handle.job_id());
//! let summary = handle.wait().await?;
//! ```

pub mod reconciler;
pub mod refresh;

// Re-export core types
pub use pixshelf_core::*;

pub use reconciler::{ReconcileOutcome, Reconciler};
pub use refresh::{failure_status, RefreshConfig, RefreshHandle, RefreshOrchestrator, RefreshProgress};
