//! `scan_jobs` CRUD. The executor that created a row is its only writer.

use dupe_manager_core::{JobId, JobStatus, ScanJob};
use tracing::debug;

use super::{from_db_count, map_unique_violation, to_db_count};
use crate::{Database, DbError, DbResult};

type JobRow = (
    String,
    String,
    String,
    Option<String>,
    String,
    i64,
    i64,
    Option<String>,
);

const JOB_COLUMNS: &str =
    "id, created_at, root_path, extensions, status, total_files, scanned_files, message";

fn job_from_row(row: JobRow) -> DbResult<ScanJob> {
    let (id, created_at, root_path, extensions, status, total, scanned, message) = row;
    let status: JobStatus = status
        .parse()
        .map_err(|e| DbError::Corrupt(format!("scan_jobs.{id}: {e}")))?;
    let extensions = match extensions {
        Some(raw) => Some(serde_json::from_str::<Vec<String>>(&raw)?),
        None => None,
    };
    Ok(ScanJob {
        id,
        created_at,
        root_path,
        extensions,
        status,
        total_files: from_db_count(total),
        scanned_files: from_db_count(scanned),
        message,
    })
}

impl Database {
    /// Insert a new job row. Fails with `AlreadyExists` if the id is taken.
    pub async fn create_job(&self, job: &ScanJob) -> DbResult<()> {
        let extensions = job
            .extensions
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        sqlx::query(
            "INSERT INTO scan_jobs (id, created_at, root_path, extensions, status, total_files, scanned_files, message)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&job.id)
        .bind(&job.created_at)
        .bind(&job.root_path)
        .bind(extensions)
        .bind(job.status.as_str())
        .bind(to_db_count(job.total_files))
        .bind(to_db_count(job.scanned_files))
        .bind(&job.message)
        .execute(self.pool())
        .await
        .map_err(|e| map_unique_violation(e, &job.id))?;
        debug!(job_id = %job.id, "Created scan job");
        Ok(())
    }

    /// Record progress for a running job.
    ///
    /// Returns `false` (and writes nothing) when the id is unknown or the job
    /// is already terminal. `scanned_files` never goes down.
    pub async fn update_job_progress(&self, id: &str, scanned_files: u64) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE scan_jobs SET scanned_files = MAX(scanned_files, ?)
             WHERE id = ? AND status = 'running'",
        )
        .bind(to_db_count(scanned_files))
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record the total item count once the walk has finished.
    /// Same no-op rules as [`Database::update_job_progress`].
    pub async fn set_job_totals(&self, id: &str, total_files: u64) -> DbResult<bool> {
        let total = to_db_count(total_files);
        let result = sqlx::query(
            "UPDATE scan_jobs SET total_files = ?, scanned_files = MIN(scanned_files, ?)
             WHERE id = ? AND status = 'running'",
        )
        .bind(total)
        .bind(total)
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move a running job to a terminal status. Succeeds exactly once per job.
    ///
    /// With `total_files`, both counts are set to it (the walk was consumed
    /// in full). Without it, the last checkpointed counts are kept.
    pub async fn finalize_job(
        &self,
        id: &str,
        status: JobStatus,
        message: Option<&str>,
        total_files: Option<u64>,
    ) -> DbResult<ScanJob> {
        if !status.is_terminal() {
            return Err(DbError::NotTerminal(id.to_string()));
        }
        let result = match total_files {
            Some(total) => {
                let total = to_db_count(total);
                sqlx::query(
                    "UPDATE scan_jobs SET status = ?, message = ?, total_files = ?, scanned_files = ?
                     WHERE id = ? AND status = 'running'",
                )
                .bind(status.as_str())
                .bind(message)
                .bind(total)
                .bind(total)
                .bind(id)
                .execute(self.pool())
                .await?
            }
            None => {
                sqlx::query(
                    "UPDATE scan_jobs SET status = ?, message = ?
                     WHERE id = ? AND status = 'running'",
                )
                .bind(status.as_str())
                .bind(message)
                .bind(id)
                .execute(self.pool())
                .await?
            }
        };

        if result.rows_affected() == 0 {
            return Err(if self.job_exists(id).await? {
                DbError::AlreadyTerminal(id.to_string())
            } else {
                DbError::NotFound(id.to_string())
            });
        }
        debug!(job_id = %id, status = %status, "Finalized scan job");
        self.get_job(id).await
    }

    /// Fetch one job. Fails with `NotFound` if absent.
    pub async fn get_job(&self, id: &str) -> DbResult<ScanJob> {
        let row: Option<JobRow> =
            sqlx::query_as(&format!("SELECT {JOB_COLUMNS} FROM scan_jobs WHERE id = ?"))
                .bind(id)
                .fetch_optional(self.pool())
                .await?;
        match row {
            Some(row) => job_from_row(row),
            None => Err(DbError::NotFound(id.to_string())),
        }
    }

    pub async fn job_exists(&self, id: &str) -> DbResult<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM scan_jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.is_some())
    }

    /// Job history, newest first.
    pub async fn list_jobs(&self, limit: i64, offset: i64) -> DbResult<Vec<ScanJob>> {
        let rows: Vec<JobRow> = sqlx::query_as(&format!(
            "SELECT {JOB_COLUMNS} FROM scan_jobs ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(job_from_row).collect()
    }
}

/// Fresh `running` record with zero counts, as the executor creates it.
pub fn new_running_job(id: JobId, root_path: &str, extensions: Option<Vec<String>>) -> ScanJob {
    ScanJob {
        id,
        created_at: dupe_manager_core::utc_now_rfc3339(),
        root_path: root_path.to_string(),
        extensions,
        status: JobStatus::Running,
        total_files: 0,
        scanned_files: 0,
        message: Some("scan started".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dupe_manager_core::new_job_id;

    #[tokio::test]
    async fn test_progress_never_decreases() {
        let db = Database::new_in_memory().await.unwrap();
        let job = new_running_job(new_job_id(), "/tmp", None);
        db.create_job(&job).await.unwrap();

        assert!(db.update_job_progress(&job.id, 500).await.unwrap());
        db.update_job_progress(&job.id, 250).await.unwrap();
        assert_eq!(db.get_job(&job.id).await.unwrap().scanned_files, 500);
    }

    #[tokio::test]
    async fn test_progress_on_unknown_job_is_noop() {
        let db = Database::new_in_memory().await.unwrap();
        assert!(!db.update_job_progress("nope", 10).await.unwrap());
        assert!(!db.set_job_totals("nope", 10).await.unwrap());
    }

    #[tokio::test]
    async fn test_finalize_rejects_running() {
        let db = Database::new_in_memory().await.unwrap();
        let job = new_running_job(new_job_id(), "/tmp", None);
        db.create_job(&job).await.unwrap();
        let err = db
            .finalize_job(&job.id, JobStatus::Running, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotTerminal(_)));
    }

    #[tokio::test]
    async fn test_extensions_round_trip_as_json() {
        let db = Database::new_in_memory().await.unwrap();
        let exts = vec![".jpg".to_string(), ".png".to_string()];
        let job = new_running_job(new_job_id(), "/photos", Some(exts.clone()));
        db.create_job(&job).await.unwrap();
        assert_eq!(db.get_job(&job.id).await.unwrap().extensions, Some(exts));
    }
}
