//! `action_records`: append-only audit of user decisions.

use dupe_manager_core::{ActionRecord, ActionResult};

use super::{from_db_count, to_db_count};
use crate::{Database, DbError, DbResult};

impl Database {
    pub async fn insert_action_record(&self, record: &ActionRecord) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO action_records (job_id, recorded_at, path, file_name, size_bytes, result, message)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.job_id)
        .bind(&record.recorded_at)
        .bind(&record.path)
        .bind(&record.file_name)
        .bind(to_db_count(record.size_bytes))
        .bind(record.result.as_str())
        .bind(&record.message)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Action records of a job in insertion order.
    pub async fn list_action_records(&self, job_id: &str) -> DbResult<Vec<ActionRecord>> {
        let rows: Vec<(String, String, String, i64, String, Option<String>)> = sqlx::query_as(
            "SELECT recorded_at, path, file_name, size_bytes, result, message
             FROM action_records WHERE job_id = ? ORDER BY id",
        )
        .bind(job_id)
        .fetch_all(self.pool())
        .await?;

        rows.into_iter()
            .map(|(recorded_at, path, file_name, size, result, message)| {
                let result: ActionResult = result
                    .parse()
                    .map_err(|e| DbError::Corrupt(format!("action_records: {e}")))?;
                Ok(ActionRecord {
                    job_id: job_id.to_string(),
                    recorded_at,
                    path,
                    file_name,
                    size_bytes: from_db_count(size),
                    result,
                    message,
                })
            })
            .collect()
    }
}
