//! Persisted refresh run history.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use pixshelf_core::{
    Error, ItemOutcome, RefreshJob, RefreshJobItem, RefreshJobStore, RefreshStatus,
    RefreshSummary, Result,
};

fn job_from_row(row: &PgRow) -> Result<RefreshJob> {
    let status: String = row.get("status");
    Ok(RefreshJob {
        id: row.get("id"),
        working_set: row.get("working_set"),
        status: status.parse().map_err(Error::Internal)?,
        concurrency: row.get("concurrency"),
        total: row.get("total"),
        succeeded: row.get("succeeded"),
        failed: row.get("failed"),
        skipped: row.get("skipped"),
        error_summary: row.get("error_summary"),
        started_at: row.get("started_at"),
        finished_at: row.get("finished_at"),
    })
}

/// PostgreSQL `RefreshJobStore`.
#[derive(Clone)]
pub struct PgRefreshJobRepository {
    pool: Pool<Postgres>,
}

impl PgRefreshJobRepository {
    /// Create a new PgRefreshJobRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Most recent jobs first.
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<RefreshJob>> {
        let rows = sqlx::query("SELECT * FROM refresh_job ORDER BY started_at DESC LIMIT $1")
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        rows.iter().map(job_from_row).collect()
    }
}

#[async_trait]
impl RefreshJobStore for PgRefreshJobRepository {
    async fn create_job(&self, id: Uuid, working_set: &str, concurrency: i32) -> Result<()> {
        sqlx::query(
            "INSERT INTO refresh_job (id, working_set, status, concurrency, started_at)
             VALUES ($1, $2, 'running', $3, $4)",
        )
        .bind(id)
        .bind(working_set)
        .bind(concurrency)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn record_item(
        &self,
        job_id: Uuid,
        pid: i64,
        outcome: ItemOutcome,
        error: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO refresh_job_item (job_id, pid, outcome, error, recorded_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(job_id)
        .bind(pid)
        .bind(outcome.as_str())
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn finish_job(
        &self,
        job_id: Uuid,
        status: RefreshStatus,
        summary: &RefreshSummary,
    ) -> Result<()> {
        let error_summary = (summary.failed > 0).then(|| summary.to_string());

        let result = sqlx::query(
            r#"
            UPDATE refresh_job SET
                status = $2,
                total = $3,
                succeeded = $4,
                failed = $5,
                skipped = $6,
                error_summary = $7,
                finished_at = $8
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(status.as_str())
        .bind(summary.total as i64)
        .bind(summary.succeeded as i64)
        .bind(summary.failed as i64)
        .bind(summary.skipped as i64)
        .bind(error_summary)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("refresh job {}", job_id)));
        }
        Ok(())
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<RefreshJob>> {
        let row = sqlx::query("SELECT * FROM refresh_job WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.as_ref().map(job_from_row).transpose()
    }

    async fn list_items(&self, job_id: Uuid) -> Result<Vec<RefreshJobItem>> {
        let rows = sqlx::query(
            "SELECT job_id, pid, outcome, error, recorded_at
             FROM refresh_job_item WHERE job_id = $1 ORDER BY id",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter()
            .map(|row| {
                let outcome: String = row.get("outcome");
                Ok(RefreshJobItem {
                    job_id: row.get("job_id"),
                    pid: row.get("pid"),
                    outcome: outcome.parse().map_err(Error::Internal)?,
                    error: row.get("error"),
                    recorded_at: row.get("recorded_at"),
                })
            })
            .collect()
    }
}
