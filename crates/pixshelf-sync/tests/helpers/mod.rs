//! In-memory collaborators for reconciler and refresh tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use pixshelf_sync::{
    ArtworkSource, CatalogStore, Error, ImageUrls, ImageWrite, ItemOutcome, NewAuthor,
    RawArtwork, Reconciler, RefreshJob, RefreshJobItem, RefreshJobStore, RefreshStatus,
    RefreshSummary, Result, SyncStatus,
};

// ============================================================================
// CATALOG
// ============================================================================

#[derive(Debug, Clone)]
pub struct StoredImage {
    pub write: ImageWrite,
    pub sync_status: SyncStatus,
}

#[derive(Debug, Default)]
struct CatalogState {
    authors: Vec<NewAuthor>,
    tags: Vec<(String, Option<String>)>,
    images: BTreeMap<i64, StoredImage>,
    links: BTreeSet<(i64, i64)>,
    pages: BTreeSet<(i64, i32)>,
    failing_ops: HashMap<&'static str, String>,
    panicking_ops: HashSet<&'static str>,
}

/// `CatalogStore` backed by in-process collections. Author and tag ids are
/// their 1-based insertion position.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    state: Mutex<CatalogState>,
}

impl MemoryCatalog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every call of the named operation fail with `Error::Internal`.
    pub fn fail_on(&self, op: &'static str, message: &str) {
        self.lock().failing_ops.insert(op, message.to_string());
    }

    /// Make every call of the named operation panic.
    pub fn panic_on(&self, op: &'static str) {
        self.lock().panicking_ops.insert(op);
    }

    /// Insert an image directly, bypassing reconciliation.
    pub fn seed(&self, pid: i64, bookmark_count: i64, sync_status: SyncStatus) {
        self.lock().images.insert(
            pid,
            StoredImage {
                write: ImageWrite {
                    pid,
                    author_id: 0,
                    name: format!("seed {}", pid),
                    bookmark_count,
                    is_bookmarked: false,
                    urls: ImageUrls::default(),
                    page_count: 0,
                    synced_at: Utc::now(),
                },
                sync_status,
            },
        );
    }

    pub fn image(&self, pid: i64) -> Option<StoredImage> {
        self.lock().images.get(&pid).cloned()
    }

    pub fn image_count(&self) -> usize {
        self.lock().images.len()
    }

    pub fn author_count(&self) -> usize {
        self.lock().authors.len()
    }

    pub fn author(&self, id: i64) -> Option<NewAuthor> {
        self.lock().authors.get((id - 1) as usize).cloned()
    }

    pub fn tag_count(&self) -> usize {
        self.lock().tags.len()
    }

    pub fn tag_translation(&self, name: &str) -> Option<String> {
        self.lock()
            .tags
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, t)| t.clone())
    }

    /// Tag names linked to a pid, sorted.
    pub fn tags_of(&self, pid: i64) -> Vec<String> {
        let state = self.lock();
        let mut names: Vec<String> = state
            .links
            .iter()
            .filter(|(p, _)| *p == pid)
            .map(|(_, tag_id)| state.tags[(*tag_id - 1) as usize].0.clone())
            .collect();
        names.sort();
        names
    }

    pub fn pages_of(&self, pid: i64) -> Vec<i32> {
        self.lock()
            .pages
            .iter()
            .filter(|(p, _)| *p == pid)
            .map(|(_, ordinal)| *ordinal)
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CatalogState> {
        self.state.lock().expect("catalog lock poisoned")
    }

    fn check(&self, op: &'static str) -> Result<std::sync::MutexGuard<'_, CatalogState>> {
        let state = self.lock();
        if state.panicking_ops.contains(op) {
            drop(state);
            panic!("{} panicked", op);
        }
        if let Some(message) = state.failing_ops.get(op).cloned() {
            return Err(Error::Internal(message));
        }
        Ok(state)
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn upsert_author(&self, author: &NewAuthor) -> Result<i64> {
        let mut state = self.check("upsert_author")?;
        let position = state.authors.iter().position(|a| {
            if author.uid.is_empty() {
                a.uid.is_empty() && a.name == author.name
            } else {
                a.uid == author.uid
            }
        });
        let id = match position {
            Some(i) => {
                state.authors[i].name = author.name.clone();
                i + 1
            }
            None => {
                state.authors.push(author.clone());
                state.authors.len()
            }
        };
        Ok(id as i64)
    }

    async fn upsert_tag(&self, name: &str, translation: Option<&str>) -> Result<i64> {
        let mut state = self.check("upsert_tag")?;
        let id = match state.tags.iter().position(|(n, _)| n == name) {
            Some(i) => {
                if state.tags[i].1.is_none() {
                    state.tags[i].1 = translation.map(String::from);
                }
                i + 1
            }
            None => {
                state
                    .tags
                    .push((name.to_string(), translation.map(String::from)));
                state.tags.len()
            }
        };
        Ok(id as i64)
    }

    async fn image_exists(&self, pid: i64) -> Result<bool> {
        Ok(self.check("image_exists")?.images.contains_key(&pid))
    }

    async fn create_image(&self, image: &ImageWrite) -> Result<i64> {
        let mut state = self.check("create_image")?;
        if state.images.contains_key(&image.pid) {
            return Err(Error::Conflict(format!("image {} exists", image.pid)));
        }
        state.images.insert(
            image.pid,
            StoredImage {
                write: image.clone(),
                sync_status: SyncStatus::Synced,
            },
        );
        Ok(state.images.len() as i64)
    }

    async fn update_image(&self, image: &ImageWrite) -> Result<()> {
        let mut state = self.check("update_image")?;
        match state.images.get_mut(&image.pid) {
            Some(stored) => {
                stored.write = image.clone();
                stored.sync_status = SyncStatus::Synced;
                Ok(())
            }
            None => Err(Error::NotFound(format!("image {}", image.pid))),
        }
    }

    async fn delete_image_tags(&self, pid: i64) -> Result<u64> {
        let mut state = self.check("delete_image_tags")?;
        let before = state.links.len();
        state.links.retain(|(p, _)| *p != pid);
        Ok((before - state.links.len()) as u64)
    }

    async fn insert_image_tag(&self, pid: i64, tag_id: i64) -> Result<()> {
        self.check("insert_image_tag")?.links.insert((pid, tag_id));
        Ok(())
    }

    async fn insert_page(&self, pid: i64, ordinal: i32) -> Result<bool> {
        Ok(self.check("insert_page")?.pages.insert((pid, ordinal)))
    }

    async fn list_all_pids(&self) -> Result<Vec<i64>> {
        Ok(self.check("list_all_pids")?.images.keys().copied().collect())
    }

    async fn list_pids_by_bookmark_range(&self, min: i64, max: i64) -> Result<Vec<i64>> {
        Ok(self
            .check("list_pids_by_bookmark_range")?
            .images
            .values()
            .filter(|i| (min..=max).contains(&i.write.bookmark_count))
            .map(|i| i.write.pid)
            .collect())
    }

    async fn list_pids_by_sync_status_not(&self, status: SyncStatus) -> Result<Vec<i64>> {
        Ok(self
            .check("list_pids_by_sync_status_not")?
            .images
            .values()
            .filter(|i| i.sync_status != status)
            .map(|i| i.write.pid)
            .collect())
    }

    async fn mark_sync_status(&self, pid: i64, status: SyncStatus) -> Result<bool> {
        let mut state = self.check("mark_sync_status")?;
        match state.images.get_mut(&pid) {
            Some(stored) => {
                stored.sync_status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ============================================================================
// UPSTREAM
// ============================================================================

/// Scripted upstream answer for one pid.
#[derive(Debug, Clone)]
pub enum Scripted {
    Body(Value),
    NotFound,
    EmptyBody,
    Transient,
    Panic,
}

/// `ArtworkSource` answering from a script. Unscripted pids get a valid
/// artwork body with one page and no tags.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    script: Mutex<HashMap<i64, Scripted>>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold each fetch open for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn script(&self, pid: i64, answer: Scripted) {
        self.script
            .lock()
            .expect("script lock poisoned")
            .insert(pid, answer);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtworkSource for ScriptedSource {
    async fn fetch_artwork(&self, pid: i64) -> Result<RawArtwork> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let answer = self
            .script
            .lock()
            .expect("script lock poisoned")
            .get(&pid)
            .cloned();
        match answer {
            Some(Scripted::Body(body)) => Ok(RawArtwork { pid, body }),
            Some(Scripted::NotFound) => Err(Error::NotFound(format!("pid {}", pid))),
            Some(Scripted::EmptyBody) => Err(Error::EmptyBody(pid)),
            Some(Scripted::Transient) => Err(Error::Transient("connection reset".to_string())),
            Some(Scripted::Panic) => panic!("fetch of pid {} panicked", pid),
            None => Ok(RawArtwork {
                pid,
                body: artwork_body("untitled", "1", &[], 0, 1),
            }),
        }
    }
}

/// Upstream `body` object with the given fields.
pub fn artwork_body(
    title: &str,
    user_id: &str,
    tags: &[&str],
    bookmark_count: i64,
    page_count: i32,
) -> Value {
    let tags: Vec<Value> = tags.iter().map(|t| json!({ "tag": t })).collect();
    json!({
        "illustTitle": title,
        "userId": user_id,
        "userName": format!("user {}", user_id),
        "bookmarkCount": bookmark_count,
        "bookmarkData": null,
        "pageCount": page_count,
        "tags": { "tags": tags },
        "urls": { "original": format!("https://i.example/{}.png", title) }
    })
}

// ============================================================================
// REFRESH JOBS
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryJobs {
    jobs: Mutex<HashMap<Uuid, RefreshJob>>,
    items: Mutex<Vec<RefreshJobItem>>,
}

impl MemoryJobs {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn job_ids(&self) -> Vec<Uuid> {
        self.jobs
            .lock()
            .expect("jobs lock poisoned")
            .keys()
            .copied()
            .collect()
    }
}

#[async_trait]
impl RefreshJobStore for MemoryJobs {
    async fn create_job(&self, id: Uuid, working_set: &str, concurrency: i32) -> Result<()> {
        self.jobs.lock().expect("jobs lock poisoned").insert(
            id,
            RefreshJob {
                id,
                working_set: working_set.to_string(),
                status: RefreshStatus::Running,
                concurrency,
                total: 0,
                succeeded: 0,
                failed: 0,
                skipped: 0,
                error_summary: None,
                started_at: Utc::now(),
                finished_at: None,
            },
        );
        Ok(())
    }

    async fn record_item(
        &self,
        job_id: Uuid,
        pid: i64,
        outcome: ItemOutcome,
        error: Option<&str>,
    ) -> Result<()> {
        self.items
            .lock()
            .expect("items lock poisoned")
            .push(RefreshJobItem {
                job_id,
                pid,
                outcome,
                error: error.map(String::from),
                recorded_at: Utc::now(),
            });
        Ok(())
    }

    async fn finish_job(
        &self,
        job_id: Uuid,
        status: RefreshStatus,
        summary: &RefreshSummary,
    ) -> Result<()> {
        let mut jobs = self.jobs.lock().expect("jobs lock poisoned");
        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| Error::NotFound(format!("refresh job {}", job_id)))?;
        job.status = status;
        job.total = summary.total as i64;
        job.succeeded = summary.succeeded as i64;
        job.failed = summary.failed as i64;
        job.skipped = summary.skipped as i64;
        job.error_summary = (summary.failed > 0).then(|| summary.to_string());
        job.finished_at = Some(Utc::now());
        Ok(())
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<RefreshJob>> {
        Ok(self
            .jobs
            .lock()
            .expect("jobs lock poisoned")
            .get(&job_id)
            .cloned())
    }

    async fn list_items(&self, job_id: Uuid) -> Result<Vec<RefreshJobItem>> {
        let mut items: Vec<RefreshJobItem> = self
            .items
            .lock()
            .expect("items lock poisoned")
            .iter()
            .filter(|i| i.job_id == job_id)
            .cloned()
            .collect();
        items.sort_by_key(|i| i.pid);
        Ok(items)
    }
}

/// Reconciler over the given fakes.
pub fn reconciler(catalog: &Arc<MemoryCatalog>, source: ScriptedSource) -> Arc<Reconciler> {
    Arc::new(Reconciler::new(catalog.clone(), Arc::new(source)))
}

/// Reconciler plus a handle on the source for call assertions.
pub fn reconciler_with_source(
    catalog: &Arc<MemoryCatalog>,
    source: ScriptedSource,
) -> (Arc<Reconciler>, Arc<ScriptedSource>) {
    let source = Arc::new(source);
    (
        Arc::new(Reconciler::new(catalog.clone(), source.clone())),
        source,
    )
}

/// Route log output to the test harness. Honors `RUST_LOG`.
pub fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pixshelf_sync=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_test_writer()
        .try_init();
}
