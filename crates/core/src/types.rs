// crates/core/src/types.rs
//! Records shared by the job store, the executor and the HTTP surface.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseEnumError;

/// Opaque job identifier (UUID v4, hyphenated).
pub type JobId = String;

/// Generate a fresh job id. Never reused.
pub fn new_job_id() -> JobId {
    uuid::Uuid::new_v4().to_string()
}

/// Lifecycle status of a scan job.
///
/// There is no queued state: a job is created in `Running` by the executor
/// that will drive it, and only moves forward to one terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(ParseEnumError {
                kind: "job status",
                value: other.to_string(),
            }),
        }
    }
}

/// One regular file yielded by a producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    pub file_name: String,
    pub size_bytes: u64,
}

/// Durable record of a scan job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanJob {
    pub id: JobId,
    pub created_at: String,
    pub root_path: String,
    /// Normalized extension filter, sorted. `None` means every file.
    pub extensions: Option<Vec<String>>,
    pub status: JobStatus,
    /// Zero until the walk has finished.
    pub total_files: u64,
    pub scanned_files: u64,
    pub message: Option<String>,
}

/// A member of a result group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupItem {
    pub file_name: String,
    pub size_bytes: u64,
    pub path: String,
}

impl From<&FileEntry> for GroupItem {
    fn from(entry: &FileEntry) -> Self {
        Self {
            file_name: entry.file_name.clone(),
            size_bytes: entry.size_bytes,
            path: entry.path.to_string_lossy().into_owned(),
        }
    }
}

/// Files sharing one grouping key, persisted once per completed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultGroup {
    pub job_id: JobId,
    pub found_at: String,
    pub group_key: String,
    pub file_name: String,
    pub size_bytes: u64,
    pub items: Vec<GroupItem>,
}

/// Outcome recorded for one user decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionResult {
    Deleted,
    Skipped,
    Failed,
}

impl ActionResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionResult::Deleted => "deleted",
            ActionResult::Skipped => "skipped",
            ActionResult::Failed => "failed",
        }
    }
}

impl FromStr for ActionResult {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deleted" => Ok(ActionResult::Deleted),
            "skipped" => Ok(ActionResult::Skipped),
            "failed" => Ok(ActionResult::Failed),
            other => Err(ParseEnumError {
                kind: "action result",
                value: other.to_string(),
            }),
        }
    }
}

/// Append-only audit entry for a decision on one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub job_id: JobId,
    pub recorded_at: String,
    pub path: String,
    pub file_name: String,
    pub size_bytes: u64,
    pub result: ActionResult,
    pub message: Option<String>,
}

/// What the user asked to do with a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionAction {
    Delete,
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub path: String,
    pub action: DecisionAction,
}

/// Per-item answer to a decision batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub path: String,
    pub result: ActionResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Ephemeral projection of a job, kept in the live state cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveSnapshot {
    pub job_id: JobId,
    pub status: JobStatus,
    pub total_files: u64,
    pub scanned_files: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<&ScanJob> for LiveSnapshot {
    fn from(job: &ScanJob) -> Self {
        Self {
            job_id: job.id.clone(),
            status: job.status,
            total_files: job.total_files,
            scanned_files: job.scanned_files,
            message: job.message.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Status,
    Progress,
    Error,
}

/// Message broadcast on a job's topic. Serialized flat:
/// `{"type":"progress","job_id":"…","status":"running",…}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(flatten)]
    pub snapshot: LiveSnapshot,
}

impl JobEvent {
    pub fn status(snapshot: LiveSnapshot) -> Self {
        Self {
            kind: EventKind::Status,
            snapshot,
        }
    }

    pub fn progress(snapshot: LiveSnapshot) -> Self {
        Self {
            kind: EventKind::Progress,
            snapshot,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.snapshot.job_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_roundtrip_and_terminal() {
        for status in [JobStatus::Running, JobStatus::Completed, JobStatus::Failed] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!("queued".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_job_event_serializes_flat() {
        let event = JobEvent::progress(LiveSnapshot {
            job_id: "abc".into(),
            status: JobStatus::Running,
            total_files: 0,
            scanned_files: 250,
            message: None,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["job_id"], "abc");
        assert_eq!(json["status"], "running");
        assert_eq!(json["scanned_files"], 250);
        assert!(json.get("message").is_none());

        let back: JobEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_new_job_ids_are_unique() {
        let a = new_job_id();
        let b = new_job_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }

    #[test]
    fn test_decision_deserializes_lowercase_action() {
        let d: Decision = serde_json::from_str(r#"{"path":"/a.txt","action":"skip"}"#).unwrap();
        assert_eq!(d.action, DecisionAction::Skip);
        assert!(serde_json::from_str::<Decision>(r#"{"path":"/a","action":"nuke"}"#).is_err());
    }
}
