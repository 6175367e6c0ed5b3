//! Bulk refresh types: working sets, run summaries, and persisted job records.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which pids a refresh run replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkingSet {
    /// Every known pid.
    All,
    /// Pids whose bookmark count is within `[min, max]`.
    BookmarkRange { min: i64, max: i64 },
    /// Pids whose last sync did not succeed.
    Unsynced,
}

impl fmt::Display for WorkingSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::BookmarkRange { min, max } => write!(f, "bookmark_range[{},{}]", min, max),
            Self::Unsynced => f.write_str("unsynced"),
        }
    }
}

/// Lifecycle state of a refresh run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshStatus {
    Running,
    /// Every dispatched pid succeeded.
    Completed,
    /// The run finished but at least one pid failed.
    CompletedWithErrors,
    /// The run stopped dispatching early (cancel signal or deadline).
    Cancelled,
    /// The run could not start (e.g. the working set could not be loaded).
    Failed,
}

impl RefreshStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::CompletedWithErrors => "completed_with_errors",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for RefreshStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefreshStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "completed_with_errors" => Ok(Self::CompletedWithErrors),
            "cancelled" => Ok(Self::Cancelled),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown refresh status: {}", other)),
        }
    }
}

/// One pid that failed during a refresh run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PidFailure {
    pub pid: i64,
    pub error: String,
    pub retryable: bool,
}

/// Aggregate outcome of a refresh run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshSummary {
    /// Size of the working set.
    pub total: usize,
    /// Pids whose worker ran to completion (success or failure).
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Pids never dispatched because the run was cancelled or timed out.
    pub skipped: usize,
    pub duration: Duration,
    /// First few failures, in completion order.
    pub errors: Vec<PidFailure>,
    pub cancelled: bool,
    pub deadline_exceeded: bool,
}

impl RefreshSummary {
    /// Summary of a run over an empty working set.
    pub fn empty() -> Self {
        Self {
            total: 0,
            processed: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            duration: Duration::ZERO,
            errors: Vec::new(),
            cancelled: false,
            deadline_exceeded: false,
        }
    }

    pub fn status(&self) -> RefreshStatus {
        if self.cancelled || self.deadline_exceeded {
            RefreshStatus::Cancelled
        } else if self.failed > 0 {
            RefreshStatus::CompletedWithErrors
        } else {
            RefreshStatus::Completed
        }
    }
}

impl fmt::Display for RefreshSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "refresh of {} pids finished with {} failed ({} succeeded, {} skipped) in {}ms",
            self.total,
            self.failed,
            self.succeeded,
            self.skipped,
            self.duration.as_millis()
        )?;
        for failure in &self.errors {
            write!(f, "\n - pid {}: {}", failure.pid, failure.error)?;
        }
        if self.failed > self.errors.len() {
            write!(
                f,
                "\n - ... ({} more errors logged)",
                self.failed - self.errors.len()
            )?;
        }
        Ok(())
    }
}

/// Per-pid outcome recorded against a refresh job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemOutcome {
    Succeeded,
    Failed,
}

impl ItemOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for ItemOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown item outcome: {}", other)),
        }
    }
}

/// Persisted refresh run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshJob {
    pub id: Uuid,
    pub working_set: String,
    pub status: RefreshStatus,
    pub concurrency: i32,
    pub total: i64,
    pub succeeded: i64,
    pub failed: i64,
    pub skipped: i64,
    pub error_summary: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Persisted per-pid outcome within a refresh run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshJobItem {
    pub job_id: Uuid,
    pub pid: i64,
    pub outcome: ItemOutcome,
    pub error: Option<String>,
    pub recorded_at: DateTime<Utc>,
}
