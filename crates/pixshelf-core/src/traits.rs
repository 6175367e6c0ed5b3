//! Core traits for pixshelf abstractions.
//!
//! The sync pipeline is written against these traits so the PostgreSQL
//! gateway and the HTTP client can be swapped for in-memory fakes.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;
use crate::refresh::{ItemOutcome, RefreshJob, RefreshJobItem, RefreshStatus, RefreshSummary};

// =============================================================================
// CATALOG STORE
// =============================================================================

/// Storage operations used by ingestion and bulk refresh.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Resolve an author by uid (or by name when uid is empty), creating it
    /// on first reference. Returns the internal author id.
    async fn upsert_author(&self, author: &NewAuthor) -> Result<i64>;

    /// Resolve a tag by canonical name, creating it on first reference.
    /// A translation is recorded only when the tag has none yet.
    async fn upsert_tag(&self, name: &str, translation: Option<&str>) -> Result<i64>;

    async fn image_exists(&self, pid: i64) -> Result<bool>;

    /// Insert a new image row. Returns the internal image id.
    async fn create_image(&self, image: &ImageWrite) -> Result<i64>;

    /// Overwrite every mutable field of an existing image and mark it synced.
    async fn update_image(&self, image: &ImageWrite) -> Result<()>;

    /// Remove all tag links for a pid. Returns the number of links removed.
    async fn delete_image_tags(&self, pid: i64) -> Result<u64>;

    async fn insert_image_tag(&self, pid: i64, tag_id: i64) -> Result<()>;

    /// Record a page sub-asset. Returns false when the pair already existed.
    async fn insert_page(&self, pid: i64, ordinal: i32) -> Result<bool>;

    async fn list_all_pids(&self) -> Result<Vec<i64>>;

    /// Pids whose bookmark count lies within `[min, max]`.
    async fn list_pids_by_bookmark_range(&self, min: i64, max: i64) -> Result<Vec<i64>>;

    /// Pids whose sync status differs from `status`.
    async fn list_pids_by_sync_status_not(&self, status: SyncStatus) -> Result<Vec<i64>>;

    /// Set the sync status of an existing image. Returns false when no image
    /// exists for the pid.
    async fn mark_sync_status(&self, pid: i64, status: SyncStatus) -> Result<bool>;
}

// =============================================================================
// UPSTREAM SOURCE
// =============================================================================

/// Source of raw artwork documents.
#[async_trait]
pub trait ArtworkSource: Send + Sync {
    async fn fetch_artwork(&self, pid: i64) -> Result<RawArtwork>;
}

// =============================================================================
// CREDENTIAL STORE
// =============================================================================

/// Holder of the session credential sent to the upstream platform.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Current credential, or `None` when unset or empty.
    async fn get_credential(&self) -> Result<Option<String>>;

    async fn set_credential(&self, credential: &str) -> Result<()>;
}

// =============================================================================
// REFRESH JOB STORE
// =============================================================================

/// Persistence for refresh runs and their per-pid outcomes.
#[async_trait]
pub trait RefreshJobStore: Send + Sync {
    /// Record a new running job.
    async fn create_job(&self, id: Uuid, working_set: &str, concurrency: i32) -> Result<()>;

    async fn record_item(
        &self,
        job_id: Uuid,
        pid: i64,
        outcome: ItemOutcome,
        error: Option<&str>,
    ) -> Result<()>;

    /// Close a job with its final status and totals.
    async fn finish_job(
        &self,
        job_id: Uuid,
        status: RefreshStatus,
        summary: &RefreshSummary,
    ) -> Result<()>;

    async fn get_job(&self, job_id: Uuid) -> Result<Option<RefreshJob>>;

    async fn list_items(&self, job_id: Uuid) -> Result<Vec<RefreshJobItem>>;
}
