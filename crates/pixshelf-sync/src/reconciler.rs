//! Merges normalized artwork records into the catalog.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, instrument};

use pixshelf_core::{
    ArtworkRecord, ArtworkSource, CatalogStore, Error, ImageWrite, NewAuthor, ReconcileStage,
    Result,
};

/// What a reconciliation wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub pid: i64,
    /// True when the image row was inserted, false when an existing row was updated.
    pub created: bool,
    pub tags_written: usize,
    /// Page rows newly inserted; existing pairs are not counted.
    pub pages_written: usize,
}

/// Fetches, normalizes and merges single artworks.
pub struct Reconciler {
    store: Arc<dyn CatalogStore>,
    source: Arc<dyn ArtworkSource>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn CatalogStore>, source: Arc<dyn ArtworkSource>) -> Self {
        Self { store, source }
    }

    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.store
    }

    /// Ingest one pid: fetch from upstream, normalize, then reconcile.
    #[instrument(skip(self), fields(subsystem = "sync", component = "reconciler", op = "ingest"))]
    pub async fn ingest(&self, pid: i64) -> Result<ReconcileOutcome> {
        let raw = self.source.fetch_artwork(pid).await?;
        let record = pixshelf_upstream::normalize(raw.pid, &raw.body)?;
        self.reconcile(&record).await
    }

    /// Merge a normalized record into storage.
    ///
    /// Writes are applied stage by stage without a surrounding transaction.
    /// A failure is reported with the pid and stage it occurred at; writes
    /// from earlier stages stay in place and are overwritten by the next
    /// successful sync of the same pid.
    pub async fn reconcile(&self, record: &ArtworkRecord) -> Result<ReconcileOutcome> {
        let start = Instant::now();
        let pid = record.pid;
        let stage_err = move |stage: ReconcileStage| move |e: Error| Error::reconcile(pid, stage, e);

        let author_id = self
            .store
            .upsert_author(&NewAuthor {
                uid: record.author_uid.clone(),
                name: record.author_name.clone(),
            })
            .await
            .map_err(stage_err(ReconcileStage::Author))?;

        let write = ImageWrite {
            pid,
            author_id,
            name: record.title.clone(),
            bookmark_count: record.bookmark_count,
            is_bookmarked: record.is_bookmarked,
            urls: record.urls.clone(),
            page_count: record.page_count,
            synced_at: Utc::now(),
        };

        let exists = self
            .store
            .image_exists(pid)
            .await
            .map_err(stage_err(ReconcileStage::Image))?;

        if exists {
            self.store
                .update_image(&write)
                .await
                .map_err(stage_err(ReconcileStage::Image))?;
            let removed = self
                .store
                .delete_image_tags(pid)
                .await
                .map_err(stage_err(ReconcileStage::TagLinks))?;
            debug!(pid, removed, "Cleared previous tag links");
        } else {
            self.store
                .create_image(&write)
                .await
                .map_err(stage_err(ReconcileStage::Image))?;
        }

        for name in &record.tags {
            let translation = record.tag_translations.get(name).map(String::as_str);
            let tag_id = self
                .store
                .upsert_tag(name, translation)
                .await
                .map_err(stage_err(ReconcileStage::TagLinks))?;
            self.store
                .insert_image_tag(pid, tag_id)
                .await
                .map_err(stage_err(ReconcileStage::TagLinks))?;
        }

        let mut pages_written = 0;
        for ordinal in 0..record.page_count {
            if self
                .store
                .insert_page(pid, ordinal)
                .await
                .map_err(stage_err(ReconcileStage::Pages))?
            {
                pages_written += 1;
            }
        }

        debug!(
            subsystem = "sync",
            component = "reconciler",
            pid,
            created = !exists,
            tag_count = record.tags.len(),
            pages_written,
            duration_ms = start.elapsed().as_millis() as u64,
            "Artwork reconciled"
        );

        Ok(ReconcileOutcome {
            pid,
            created: !exists,
            tags_written: record.tags.len(),
            pages_written,
        })
    }
}
