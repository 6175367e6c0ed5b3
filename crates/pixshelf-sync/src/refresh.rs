//! Bulk refresh orchestrator.
//!
//! Replays ingestion over a working set of pids. At most `concurrency`
//! workers run at once; each waits a random jitter before calling upstream.
//! A failing pid never aborts the run: every dispatched worker is awaited
//! and failures are aggregated into a [`RefreshSummary`].

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{mpsc, watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{error, field, info, info_span, warn, Instrument};
use uuid::Uuid;

use pixshelf_core::defaults::{
    REFRESH_CONCURRENCY, REFRESH_JITTER_MAX_MS, REFRESH_JITTER_MIN_MS,
    REFRESH_MAX_REPORTED_ERRORS,
};
use pixshelf_core::{
    logging, CatalogStore, Error, ItemOutcome, PidFailure, RefreshJobStore, RefreshStatus,
    RefreshSummary, Result, SyncStatus, WorkingSet,
};

use crate::reconciler::Reconciler;

/// Configuration for refresh runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshConfig {
    /// Maximum number of pids processed at once.
    pub concurrency: usize,
    /// Lower bound of the per-pid delay before fetching.
    pub jitter_min_ms: u64,
    /// Upper bound of the per-pid delay before fetching.
    pub jitter_max_ms: u64,
    /// Number of individual failures kept in the summary.
    pub max_reported_errors: usize,
    /// Stop dispatching new pids after this long.
    pub deadline: Option<Duration>,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            concurrency: REFRESH_CONCURRENCY,
            jitter_min_ms: REFRESH_JITTER_MIN_MS,
            jitter_max_ms: REFRESH_JITTER_MAX_MS,
            max_reported_errors: REFRESH_MAX_REPORTED_ERRORS,
            deadline: None,
        }
    }
}

impl RefreshConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `REFRESH_CONCURRENCY` | `1` | Max concurrent workers |
    /// | `REFRESH_JITTER_MIN_MS` | `200` | Minimum per-pid delay |
    /// | `REFRESH_JITTER_MAX_MS` | `1000` | Maximum per-pid delay |
    /// | `REFRESH_MAX_REPORTED_ERRORS` | `10` | Failures kept in the summary |
    /// | `REFRESH_DEADLINE_SECS` | unset | Overall dispatch deadline |
    pub fn from_env() -> Self {
        fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
            std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
        }

        let defaults = Self::default();
        Self {
            concurrency: parsed("REFRESH_CONCURRENCY")
                .unwrap_or(defaults.concurrency)
                .max(1),
            jitter_min_ms: parsed("REFRESH_JITTER_MIN_MS").unwrap_or(defaults.jitter_min_ms),
            jitter_max_ms: parsed("REFRESH_JITTER_MAX_MS").unwrap_or(defaults.jitter_max_ms),
            max_reported_errors: parsed("REFRESH_MAX_REPORTED_ERRORS")
                .unwrap_or(defaults.max_reported_errors),
            deadline: parsed::<u64>("REFRESH_DEADLINE_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        }
    }

    /// Set maximum concurrent workers (at least 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set the jitter window. Bounds are swapped when given in reverse.
    pub fn with_jitter(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.jitter_min_ms = min_ms.min(max_ms);
        self.jitter_max_ms = min_ms.max(max_ms);
        self
    }

    /// Disable jitter entirely.
    pub fn without_jitter(self) -> Self {
        self.with_jitter(0, 0)
    }

    pub fn with_max_reported_errors(mut self, max: usize) -> Self {
        self.max_reported_errors = max;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    fn jitter(&self) -> Duration {
        let lo = self.jitter_min_ms.min(self.jitter_max_ms);
        let hi = self.jitter_min_ms.max(self.jitter_max_ms);
        if hi == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
    }
}

/// Live counters of a running refresh.
#[derive(Debug, Default)]
pub struct RefreshProgress {
    total: AtomicUsize,
    processed: AtomicUsize,
    failed: AtomicUsize,
}

impl RefreshProgress {
    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Sync status recorded for a pid whose ingestion failed.
pub fn failure_status(err: &Error) -> SyncStatus {
    match err.root() {
        Error::NotFound(_) => SyncStatus::NotFound,
        Error::EmptyBody(_) => SyncStatus::Withdrawn,
        _ => SyncStatus::Failed,
    }
}

/// Handle for a refresh running in the background.
pub struct RefreshHandle {
    job_id: Uuid,
    cancel_tx: watch::Sender<bool>,
    status_rx: watch::Receiver<RefreshStatus>,
    progress: Arc<RefreshProgress>,
    task: JoinHandle<Result<RefreshSummary>>,
}

impl RefreshHandle {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn status(&self) -> RefreshStatus {
        *self.status_rx.borrow()
    }

    pub fn progress(&self) -> &RefreshProgress {
        &self.progress
    }

    /// Stop dispatching further pids. Workers already running finish normally.
    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }

    /// Wait for the run to finish.
    pub async fn wait(self) -> Result<RefreshSummary> {
        self.task
            .await
            .map_err(|e| Error::Internal(format!("Refresh task failed: {}", e)))?
    }
}

/// Runs ingestion over working sets of pids.
#[derive(Clone)]
pub struct RefreshOrchestrator {
    reconciler: Arc<Reconciler>,
    jobs: Option<Arc<dyn RefreshJobStore>>,
    config: RefreshConfig,
}

impl RefreshOrchestrator {
    pub fn new(reconciler: Arc<Reconciler>, config: RefreshConfig) -> Self {
        Self {
            reconciler,
            jobs: None,
            config,
        }
    }

    /// Persist each run and its per-pid outcomes.
    pub fn with_job_store(mut self, jobs: Arc<dyn RefreshJobStore>) -> Self {
        self.jobs = Some(jobs);
        self
    }

    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    /// Run a refresh to completion.
    ///
    /// Returns `Error::RefreshFailed` carrying the summary when at least one
    /// pid failed.
    pub async fn run(&self, working_set: WorkingSet) -> Result<RefreshSummary> {
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        self.execute(
            Uuid::now_v7(),
            working_set,
            cancel_rx,
            Arc::new(RefreshProgress::default()),
        )
        .await
    }

    /// Start a refresh in the background and return immediately.
    pub fn spawn(&self, working_set: WorkingSet) -> RefreshHandle {
        let job_id = Uuid::now_v7();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(RefreshStatus::Running);
        let progress = Arc::new(RefreshProgress::default());

        let orchestrator = self.clone();
        let task_progress = progress.clone();
        let run = tokio::spawn(async move {
            orchestrator
                .execute(job_id, working_set, cancel_rx, task_progress)
                .await
        });

        let recorder = JobRecorder {
            jobs: self.jobs.clone(),
            job_id,
        };
        let task = tokio::spawn(async move {
            let result = match run.await {
                Ok(result) => result,
                Err(e) => {
                    error!(%job_id, error = %e, "Refresh task panicked");
                    recorder
                        .finish(RefreshStatus::Failed, &RefreshSummary::empty())
                        .await;
                    Err(Error::Internal(format!("Refresh task failed: {}", e)))
                }
            };
            let status = match &result {
                Ok(summary) | Err(Error::RefreshFailed(summary)) => summary.status(),
                Err(_) => RefreshStatus::Failed,
            };
            status_tx.send_replace(status);
            result
        });

        RefreshHandle {
            job_id,
            cancel_tx,
            status_rx,
            progress,
            task,
        }
    }

    async fn execute(
        &self,
        job_id: Uuid,
        working_set: WorkingSet,
        cancel_rx: watch::Receiver<bool>,
        progress: Arc<RefreshProgress>,
    ) -> Result<RefreshSummary> {
        let span = info_span!(
            "refresh",
            subsystem = "sync",
            component = "refresh",
            %working_set,
            job_id = field::Empty,
            pid_count = field::Empty,
        );
        span.record(logging::JOB_ID, &field::display(job_id));

        self.execute_in_span(job_id, working_set, cancel_rx, progress, span.clone())
            .instrument(span)
            .await
    }

    async fn execute_in_span(
        &self,
        job_id: Uuid,
        working_set: WorkingSet,
        mut cancel_rx: watch::Receiver<bool>,
        progress: Arc<RefreshProgress>,
        span: tracing::Span,
    ) -> Result<RefreshSummary> {
        let start = Instant::now();
        let recorder = JobRecorder {
            jobs: self.jobs.clone(),
            job_id,
        };
        recorder
            .create(&working_set.to_string(), self.config.concurrency)
            .await;

        let pids = match load_pids(self.reconciler.store().as_ref(), working_set).await {
            Ok(pids) => pids,
            Err(e) => {
                error!(error = %e, "Failed to load refresh working set");
                let mut summary = RefreshSummary::empty();
                summary.duration = start.elapsed();
                recorder.finish(RefreshStatus::Failed, &summary).await;
                return Err(e);
            }
        };

        let total = pids.len();
        span.record(logging::PID_COUNT, &(total as u64));
        progress.total.store(total, Ordering::Relaxed);
        info!(
            concurrency = self.config.concurrency,
            deadline = ?self.config.deadline,
            "Refresh started"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let (outcome_tx, mut outcome_rx) = mpsc::channel::<PidOutcome>(total.max(1));
        let deadline = self.config.deadline.map(|d| start + d);
        let mut tasks = JoinSet::new();
        let mut dispatched = HashSet::with_capacity(total);
        let mut cancelled = false;
        let mut deadline_exceeded = false;

        for pid in pids {
            let permit = match admit(&semaphore, &mut cancel_rx, deadline).await {
                Admission::Permit(permit) => permit,
                Admission::Cancelled => {
                    cancelled = true;
                    break;
                }
                Admission::DeadlineExceeded => {
                    deadline_exceeded = true;
                    break;
                }
            };

            dispatched.insert(pid);
            let worker = RefreshWorker {
                reconciler: self.reconciler.clone(),
                recorder: recorder.clone(),
                progress: progress.clone(),
                outcome_tx: outcome_tx.clone(),
            };
            let jitter = self.config.jitter();
            tasks.spawn(
                async move {
                    let _permit = permit;
                    worker.process(pid, jitter).await;
                }
                .in_current_span(),
            );
        }
        drop(outcome_tx);

        if cancelled || deadline_exceeded {
            warn!(
                dispatched = dispatched.len(),
                skipped = total - dispatched.len(),
                cancelled,
                deadline_exceeded,
                "Refresh stopped dispatching early"
            );
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!(error = ?e, "Refresh worker panicked");
            }
        }

        let mut summary = RefreshSummary::empty();
        summary.total = total;
        summary.skipped = total - dispatched.len();
        summary.cancelled = cancelled;
        summary.deadline_exceeded = deadline_exceeded;

        while let Some(outcome) = outcome_rx.recv().await {
            dispatched.remove(&outcome.pid);
            summary.processed += 1;
            match outcome.error {
                None => summary.succeeded += 1,
                Some(failure) => {
                    summary.failed += 1;
                    if summary.errors.len() < self.config.max_reported_errors {
                        summary.errors.push(failure);
                    }
                }
            }
        }

        // Whatever is left was dispatched but never reported an outcome.
        for pid in dispatched {
            summary.processed += 1;
            summary.failed += 1;
            progress.processed.fetch_add(1, Ordering::Relaxed);
            progress.failed.fetch_add(1, Ordering::Relaxed);

            let store = self.reconciler.store();
            if let Err(e) = store.mark_sync_status(pid, SyncStatus::Failed).await {
                warn!(pid, error = %e, "Failed to record sync status");
            }
            recorder
                .item(pid, ItemOutcome::Failed, Some(WORKER_PANICKED))
                .await;
            if summary.errors.len() < self.config.max_reported_errors {
                summary.errors.push(PidFailure {
                    pid,
                    error: WORKER_PANICKED.to_string(),
                    retryable: true,
                });
            }
        }

        summary.duration = start.elapsed();
        recorder.finish(summary.status(), &summary).await;

        if summary.failed > 0 {
            warn!(
                succeeded = summary.succeeded,
                failed = summary.failed,
                skipped = summary.skipped,
                duration_ms = summary.duration.as_millis() as u64,
                "Refresh finished with failures"
            );
            return Err(Error::RefreshFailed(summary));
        }

        info!(
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            duration_ms = summary.duration.as_millis() as u64,
            "Refresh finished"
        );
        Ok(summary)
    }
}

async fn load_pids(store: &dyn CatalogStore, working_set: WorkingSet) -> Result<Vec<i64>> {
    match working_set {
        WorkingSet::All => store.list_all_pids().await,
        WorkingSet::BookmarkRange { min, max } => {
            store.list_pids_by_bookmark_range(min, max).await
        }
        WorkingSet::Unsynced => store.list_pids_by_sync_status_not(SyncStatus::Synced).await,
    }
}

enum Admission {
    Permit(OwnedSemaphorePermit),
    Cancelled,
    DeadlineExceeded,
}

/// Wait for a worker slot, giving up on cancellation or at the deadline.
async fn admit(
    semaphore: &Arc<Semaphore>,
    cancel_rx: &mut watch::Receiver<bool>,
    deadline: Option<Instant>,
) -> Admission {
    tokio::select! {
        biased;
        _ = cancel_requested(cancel_rx) => Admission::Cancelled,
        _ = deadline_reached(deadline) => Admission::DeadlineExceeded,
        permit = semaphore.clone().acquire_owned() => match permit {
            Ok(permit) => Admission::Permit(permit),
            Err(_) => Admission::Cancelled,
        },
    }
}

async fn cancel_requested(cancel_rx: &mut watch::Receiver<bool>) {
    if cancel_rx.wait_for(|cancelled| *cancelled).await.is_err() {
        // Sender gone: cancellation can no longer be requested.
        std::future::pending::<()>().await;
    }
}

async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

const WORKER_PANICKED: &str = "worker panicked";

struct PidOutcome {
    pid: i64,
    error: Option<PidFailure>,
}

/// Records job progress when a job store is attached. Persistence failures
/// are logged and never affect the run.
#[derive(Clone)]
struct JobRecorder {
    jobs: Option<Arc<dyn RefreshJobStore>>,
    job_id: Uuid,
}

impl JobRecorder {
    async fn create(&self, working_set: &str, concurrency: usize) {
        let Some(jobs) = &self.jobs else { return };
        let concurrency = i32::try_from(concurrency).unwrap_or(i32::MAX);
        if let Err(e) = jobs.create_job(self.job_id, working_set, concurrency).await {
            warn!(error = %e, "Failed to persist refresh job");
        }
    }

    async fn item(&self, pid: i64, outcome: ItemOutcome, error: Option<&str>) {
        let Some(jobs) = &self.jobs else { return };
        if let Err(e) = jobs.record_item(self.job_id, pid, outcome, error).await {
            warn!(pid, error = %e, "Failed to persist refresh job item");
        }
    }

    async fn finish(&self, status: RefreshStatus, summary: &RefreshSummary) {
        let Some(jobs) = &self.jobs else { return };
        if let Err(e) = jobs.finish_job(self.job_id, status, summary).await {
            warn!(error = %e, "Failed to close refresh job");
        }
    }
}

/// Everything one spawned worker needs.
struct RefreshWorker {
    reconciler: Arc<Reconciler>,
    recorder: JobRecorder,
    progress: Arc<RefreshProgress>,
    outcome_tx: mpsc::Sender<PidOutcome>,
}

impl RefreshWorker {
    async fn process(self, pid: i64, jitter: Duration) {
        if !jitter.is_zero() {
            sleep(jitter).await;
        }

        let start = Instant::now();
        let result = self.reconciler.ingest(pid).await;

        let error = match result {
            Ok(_) => {
                self.recorder.item(pid, ItemOutcome::Succeeded, None).await;
                None
            }
            Err(e) => {
                let message = e.to_string();
                warn!(
                    pid,
                    error = %message,
                    retryable = e.is_retryable(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Refresh of pid failed"
                );

                let status = failure_status(&e);
                if let Err(mark_err) = self.reconciler.store().mark_sync_status(pid, status).await
                {
                    warn!(pid, error = %mark_err, "Failed to record sync status");
                }
                self.recorder
                    .item(pid, ItemOutcome::Failed, Some(&message))
                    .await;

                Some(PidFailure {
                    pid,
                    error: message,
                    retryable: e.is_retryable(),
                })
            }
        };

        // Counted only once an outcome exists; a worker that dies earlier is
        // accounted for by the orchestrator.
        self.progress.processed.fetch_add(1, Ordering::Relaxed);
        if error.is_some() {
            self.progress.failed.fetch_add(1, Ordering::Relaxed);
        }

        // Capacity equals the working set size, so this never waits.
        let _ = self.outcome_tx.send(PidOutcome { pid, error }).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RefreshConfig::default();
        assert_eq!(config.concurrency, REFRESH_CONCURRENCY);
        assert_eq!(config.jitter_min_ms, REFRESH_JITTER_MIN_MS);
        assert_eq!(config.jitter_max_ms, REFRESH_JITTER_MAX_MS);
        assert_eq!(config.max_reported_errors, 10);
        assert!(config.deadline.is_none());
    }

    #[test]
    fn test_builders() {
        let config = RefreshConfig::default()
            .with_concurrency(0)
            .with_jitter(900, 100)
            .with_max_reported_errors(3)
            .with_deadline(Duration::from_secs(60));
        assert_eq!(config.concurrency, 1);
        assert_eq!((config.jitter_min_ms, config.jitter_max_ms), (100, 900));
        assert_eq!(config.max_reported_errors, 3);
        assert_eq!(config.deadline, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_jitter_within_window() {
        let config = RefreshConfig::default().with_jitter(5, 15);
        for _ in 0..100 {
            let jitter = config.jitter();
            assert!(jitter >= Duration::from_millis(5));
            assert!(jitter <= Duration::from_millis(15));
        }
        assert_eq!(RefreshConfig::default().without_jitter().jitter(), Duration::ZERO);
    }

    #[test]
    fn test_failure_status_mapping() {
        use pixshelf_core::ReconcileStage;

        assert_eq!(
            failure_status(&Error::NotFound("pid 1".into())),
            SyncStatus::NotFound
        );
        assert_eq!(failure_status(&Error::EmptyBody(1)), SyncStatus::Withdrawn);
        assert_eq!(
            failure_status(&Error::Transient("timeout".into())),
            SyncStatus::Failed
        );
        assert_eq!(
            failure_status(&Error::reconcile(
                1,
                ReconcileStage::Author,
                Error::Conflict("uid".into())
            )),
            SyncStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_admit_prefers_cancellation() {
        let semaphore = Arc::new(Semaphore::new(1));
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        assert!(matches!(
            admit(&semaphore, &mut cancel_rx, None).await,
            Admission::Permit(_)
        ));

        cancel_tx.send_replace(true);
        assert!(matches!(
            admit(&semaphore, &mut cancel_rx, None).await,
            Admission::Cancelled
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_admit_times_out_at_deadline() {
        let semaphore = Arc::new(Semaphore::new(0));
        let (_cancel_tx, mut cancel_rx) = watch::channel(false);
        let deadline = Instant::now() + Duration::from_secs(5);
        assert!(matches!(
            admit(&semaphore, &mut cancel_rx, Some(deadline)).await,
            Admission::DeadlineExceeded
        ));
    }
}
