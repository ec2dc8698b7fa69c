//! `result_groups`: written once per completed job, one row per member.

use std::collections::BTreeMap;

use dupe_manager_core::{GroupItem, ResultGroup};

use super::{from_db_count, map_unique_violation, to_db_count};
use crate::{Database, DbResult};

impl Database {
    /// Persist every group of a job in a single transaction.
    pub async fn insert_result_groups(&self, job_id: &str, groups: &[ResultGroup]) -> DbResult<usize> {
        let mut tx = self.pool().begin().await?;
        let mut rows = 0usize;
        for group in groups {
            for item in &group.items {
                sqlx::query(
                    "INSERT INTO result_groups (job_id, found_at, group_key, file_name, size_bytes, path)
                     VALUES (?, ?, ?, ?, ?, ?)",
                )
                .bind(job_id)
                .bind(&group.found_at)
                .bind(&group.group_key)
                .bind(&item.file_name)
                .bind(to_db_count(item.size_bytes))
                .bind(&item.path)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_unique_violation(e, &item.path))?;
                rows += 1;
            }
        }
        tx.commit().await?;
        Ok(rows)
    }

    /// All groups of a job ordered by group key. Empty for unknown ids.
    pub async fn list_result_groups(&self, job_id: &str) -> DbResult<Vec<ResultGroup>> {
        let rows: Vec<(String, String, String, i64, String)> = sqlx::query_as(
            "SELECT found_at, group_key, file_name, size_bytes, path
             FROM result_groups WHERE job_id = ? ORDER BY group_key, id",
        )
        .bind(job_id)
        .fetch_all(self.pool())
        .await?;

        let mut groups: BTreeMap<String, ResultGroup> = BTreeMap::new();
        for (found_at, group_key, file_name, size, path) in rows {
            let size_bytes = from_db_count(size);
            let group = groups
                .entry(group_key.clone())
                .or_insert_with(|| ResultGroup {
                    job_id: job_id.to_string(),
                    found_at,
                    group_key,
                    file_name: file_name.clone(),
                    size_bytes,
                    items: Vec::new(),
                });
            group.items.push(GroupItem {
                file_name,
                size_bytes,
                path,
            });
        }
        Ok(groups.into_values().collect())
    }
}
