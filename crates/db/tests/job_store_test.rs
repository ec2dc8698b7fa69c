//! Integration tests for the job store lifecycle rules.

use dupe_manager_core::{new_job_id, ActionRecord, ActionResult, JobStatus};
use dupe_manager_db::{new_running_job, Database, DbError};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_create_and_get_running_job() {
    let db = Database::new_in_memory().await.unwrap();
    let job = new_running_job(new_job_id(), "/data", None);
    db.create_job(&job).await.unwrap();

    let stored = db.get_job(&job.id).await.unwrap();
    assert_eq!(stored, job);
    assert_eq!(stored.status, JobStatus::Running);
    assert_eq!(stored.scanned_files, 0);
    assert!(db.job_exists(&job.id).await.unwrap());
}

#[tokio::test]
async fn test_duplicate_id_is_rejected() {
    let db = Database::new_in_memory().await.unwrap();
    let job = new_running_job(new_job_id(), "/data", None);
    db.create_job(&job).await.unwrap();

    let err = db.create_job(&job).await.unwrap_err();
    assert!(matches!(err, DbError::AlreadyExists(ref id) if id == &job.id));
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let db = Database::new_in_memory().await.unwrap();
    assert!(matches!(
        db.get_job("missing").await.unwrap_err(),
        DbError::NotFound(_)
    ));
    assert!(matches!(
        db.finalize_job("missing", JobStatus::Failed, Some("boom"), None)
            .await
            .unwrap_err(),
        DbError::NotFound(_)
    ));
    assert!(!db.job_exists("missing").await.unwrap());
}

#[tokio::test]
async fn test_finalize_happens_exactly_once() {
    let db = Database::new_in_memory().await.unwrap();
    let job = new_running_job(new_job_id(), "/data", None);
    db.create_job(&job).await.unwrap();
    db.update_job_progress(&job.id, 250).await.unwrap();

    let done = db
        .finalize_job(&job.id, JobStatus::Completed, Some("scan completed: 0 duplicate groups found"), Some(300))
        .await
        .unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.total_files, 300);
    assert_eq!(done.scanned_files, 300);

    let err = db
        .finalize_job(&job.id, JobStatus::Failed, Some("late"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::AlreadyTerminal(_)));
    assert_eq!(db.get_job(&job.id).await.unwrap().status, JobStatus::Completed);
}

#[tokio::test]
async fn test_terminal_job_ignores_progress() {
    let db = Database::new_in_memory().await.unwrap();
    let job = new_running_job(new_job_id(), "/data", None);
    db.create_job(&job).await.unwrap();
    db.update_job_progress(&job.id, 10).await.unwrap();
    db.finalize_job(&job.id, JobStatus::Failed, Some("disk gone"), None)
        .await
        .unwrap();

    assert!(!db.update_job_progress(&job.id, 9999).await.unwrap());
    assert!(!db.set_job_totals(&job.id, 9999).await.unwrap());

    let stored = db.get_job(&job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.scanned_files, 10);
    assert_eq!(stored.message.as_deref(), Some("disk gone"));
}

#[tokio::test]
async fn test_terminal_row_rejects_direct_update() {
    let db = Database::new_in_memory().await.unwrap();
    let job = new_running_job(new_job_id(), "/data", None);
    db.create_job(&job).await.unwrap();
    db.finalize_job(&job.id, JobStatus::Completed, None, Some(0))
        .await
        .unwrap();

    let res = sqlx::query("UPDATE scan_jobs SET status = 'running' WHERE id = ?")
        .bind(&job.id)
        .execute(db.pool())
        .await;
    assert!(res.is_err(), "terminal guard trigger should abort the update");
}

#[tokio::test]
async fn test_action_records_are_listed_in_insertion_order() {
    let db = Database::new_in_memory().await.unwrap();
    let job = new_running_job(new_job_id(), "/data", None);
    db.create_job(&job).await.unwrap();

    for (path, result, message) in [
        ("/data/a.txt", ActionResult::Deleted, None),
        ("/data/missing.txt", ActionResult::Failed, Some("file not found")),
        ("/data/b.txt", ActionResult::Skipped, Some("user skipped")),
    ] {
        db.insert_action_record(&ActionRecord {
            job_id: job.id.clone(),
            recorded_at: dupe_manager_core::utc_now_rfc3339(),
            path: path.to_string(),
            file_name: path.rsplit('/').next().unwrap().to_string(),
            size_bytes: 10,
            result,
            message: message.map(str::to_string),
        })
        .await
        .unwrap();
    }

    let records = db.list_action_records(&job.id).await.unwrap();
    let results: Vec<_> = records.iter().map(|r| r.result).collect();
    assert_eq!(
        results,
        vec![ActionResult::Deleted, ActionResult::Failed, ActionResult::Skipped]
    );
    assert_eq!(records[1].message.as_deref(), Some("file not found"));
}

#[tokio::test]
async fn test_list_jobs_newest_first_with_paging() {
    let db = Database::new_in_memory().await.unwrap();
    let mut ids = Vec::new();
    for i in 0..3 {
        let mut job = new_running_job(new_job_id(), "/data", None);
        job.created_at = format!("2026-01-0{}T00:00:00Z", i + 1);
        db.create_job(&job).await.unwrap();
        ids.push(job.id);
    }

    let page = db.list_jobs(2, 0).await.unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].id, ids[2]);
    assert_eq!(page[1].id, ids[1]);

    let rest = db.list_jobs(2, 2).await.unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].id, ids[0]);
}

#[tokio::test]
async fn test_writes_survive_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("dupes.db");
    let job = new_running_job(new_job_id(), "/data", None);

    {
        let db = Database::new(&path).await.unwrap();
        db.create_job(&job).await.unwrap();
        db.update_job_progress(&job.id, 500).await.unwrap();
        db.pool().close().await;
    }

    let db = Database::new(&path).await.unwrap();
    let stored = db.get_job(&job.id).await.unwrap();
    assert_eq!(stored.scanned_files, 500);
    assert_eq!(stored.status, JobStatus::Running);
}
