// crates/server/src/decisions.rs
//! Applies user decisions (delete / skip) to the files of a finished scan.

use std::path::{Path, PathBuf};

use dupe_manager_core::{
    delete_file, file_size_if_regular, utc_now_rfc3339, ActionOutcome, ActionRecord, ActionResult,
    Decision, DecisionAction, DeleteOutcome,
};
use dupe_manager_db::{Database, DbError, DbResult};
use tracing::info;

use crate::metrics::record_decision;

/// Apply every decision in order, one outcome and one action record each.
///
/// A failed deletion is an outcome like any other; only store errors
/// abort the batch.
pub async fn apply_decisions(
    db: &Database,
    job_id: &str,
    decisions: &[Decision],
) -> DbResult<Vec<ActionOutcome>> {
    if !db.job_exists(job_id).await? {
        return Err(DbError::NotFound(job_id.to_string()));
    }

    let mut outcomes = Vec::with_capacity(decisions.len());
    for decision in decisions {
        let path = PathBuf::from(&decision.path);
        let (size_bytes, result, message) = apply_blocking(path.clone(), decision.action).await;

        db.insert_action_record(&ActionRecord {
            job_id: job_id.to_string(),
            recorded_at: utc_now_rfc3339(),
            path: decision.path.clone(),
            file_name: display_name(&path),
            size_bytes,
            result,
            message: message.clone(),
        })
        .await?;
        record_decision(result);

        outcomes.push(ActionOutcome {
            path: decision.path.clone(),
            result,
            message,
        });
    }

    info!(job_id, decisions = outcomes.len(), "Applied decisions");
    Ok(outcomes)
}

/// Stat the file, then delete or skip it, off the async threads.
async fn apply_blocking(
    path: PathBuf,
    action: DecisionAction,
) -> (u64, ActionResult, Option<String>) {
    let joined = tokio::task::spawn_blocking(move || {
        let size = file_size_if_regular(&path);
        match action {
            DecisionAction::Skip => (size, ActionResult::Skipped, Some("user skipped".to_string())),
            DecisionAction::Delete => match delete_file(&path) {
                DeleteOutcome::Deleted => (size, ActionResult::Deleted, None),
                DeleteOutcome::Failed(reason) => (size, ActionResult::Failed, Some(reason)),
            },
        }
    })
    .await;
    joined.unwrap_or_else(|err| (0, ActionResult::Failed, Some(err.to_string())))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
