// crates/server/src/jobs/executor.rs
//! Runs one scan job from creation to its terminal status.
//!
//! The job is driven inside the caller's task: the walk, the checkpoints,
//! grouping and persistence happen in order, and only this executor writes
//! the job's row. The producer iterates on a blocking thread and hands
//! entries over through a bounded queue, so the async side stays the single
//! sequential writer.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dupe_manager_core::{
    new_job_id, normalize_extensions, utc_now_rfc3339, validate_root, ClassifyError, Classifier,
    FileEntry, FileProducer, GroupItem, JobEvent, JobStatus, LiveSnapshot, NameSizeClassifier,
    ResultGroup, ScanError, ScanJob, WalkdirProducer,
};
use dupe_manager_db::{new_running_job, Database, DbError};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::live::{EventChannel, LiveServices, LiveStateCache, DEFAULT_SNAPSHOT_TTL};
use crate::metrics::{record_job_finished, record_job_started};

/// Default number of items between two checkpoints.
pub const DEFAULT_CHECKPOINT_INTERVAL: u64 = 250;

/// Entries buffered between the walking thread and the executor.
const PRODUCER_QUEUE: usize = 1024;

/// Errors that prevent a job from being run at all.
///
/// Anything that goes wrong after the job record exists is captured in the
/// job's `failed` status instead.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ScanError),

    #[error("job store error: {0}")]
    Store(#[from] DbError),
}

/// A failure inside a running job. Its text becomes the job's message.
#[derive(Debug, Error)]
enum StepError {
    #[error("{0}")]
    Scan(#[from] ScanError),

    #[error("{0}")]
    Classify(#[from] ClassifyError),

    #[error("{0}")]
    Store(#[from] DbError),

    #[error("worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSettings {
    pub checkpoint_interval: u64,
    pub snapshot_ttl: Duration,
}

impl JobSettings {
    pub fn new(checkpoint_interval: u64, snapshot_ttl: Duration) -> Self {
        Self {
            checkpoint_interval: checkpoint_interval.max(1),
            snapshot_ttl,
        }
    }
}

impl Default for JobSettings {
    fn default() -> Self {
        Self::new(DEFAULT_CHECKPOINT_INTERVAL, DEFAULT_SNAPSHOT_TTL)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub root_path: String,
    pub extensions: Option<Vec<String>>,
}

/// Terminal state of a job that was run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub job: ScanJob,
    pub group_count: usize,
}

pub struct JobExecutor {
    db: Database,
    producer: Arc<dyn FileProducer>,
    classifier: Arc<dyn Classifier>,
    cache: Option<Arc<dyn LiveStateCache>>,
    channel: Option<Arc<dyn EventChannel>>,
    settings: JobSettings,
}

impl JobExecutor {
    pub fn new(
        db: Database,
        producer: Arc<dyn FileProducer>,
        classifier: Arc<dyn Classifier>,
        live: &LiveServices,
        settings: JobSettings,
    ) -> Self {
        Self {
            db,
            producer,
            classifier,
            cache: live.cache.clone(),
            channel: live.channel.clone(),
            settings,
        }
    }

    /// Walkdir producer and name+size classifier.
    pub fn with_defaults(db: Database, live: &LiveServices, settings: JobSettings) -> Self {
        Self::new(
            db,
            Arc::new(WalkdirProducer),
            Arc::new(NameSizeClassifier),
            live,
            settings,
        )
    }

    pub fn settings(&self) -> JobSettings {
        self.settings
    }

    /// Run a scan to completion.
    ///
    /// Returns `Err` only when the root is invalid (nothing was created) or
    /// the job record could not be written at all. Every other failure is
    /// reported as a job finalized with status `failed`.
    pub async fn run(&self, request: ScanRequest) -> Result<JobOutcome, ExecutorError> {
        let root = validate_root(&request.root_path)?;
        let filter = normalize_extensions(request.extensions.as_deref());
        let stored_filter = filter.as_ref().map(|set| set.iter().cloned().collect());

        let mut job = new_running_job(new_job_id(), &root.to_string_lossy(), stored_filter);
        self.db.create_job(&job).await?;
        record_job_started();
        let started = Instant::now();
        info!(job_id = %job.id, root = %job.root_path, "Scan started");
        self.broadcast(JobEvent::status(LiveSnapshot::from(&job))).await;

        let result = self.drive(&mut job, root, filter).await;

        let (status, message, total) = match &result {
            Ok((total, groups)) => (
                JobStatus::Completed,
                format!("scan completed: {groups} duplicate groups found"),
                Some(*total),
            ),
            Err(err) => {
                warn!(job_id = %job.id, error = %err, "Scan failed");
                (JobStatus::Failed, err.to_string(), None)
            }
        };

        let finalized = self
            .db
            .finalize_job(&job.id, status, Some(&message), total)
            .await;
        let job = match finalized {
            Ok(job) => job,
            Err(err) => {
                error!(job_id = %job.id, error = %err, "Could not finalize scan job");
                job.status = JobStatus::Failed;
                job.message = Some(format!("could not record job result: {err}"));
                // The row is still `running`, so the cached snapshot must not
                // claim otherwise. Listeners are told the job is over.
                self.publish(&JobEvent::status(LiveSnapshot::from(&job))).await;
                self.close_topic(&job.id).await;
                record_job_finished(JobStatus::Failed, started.elapsed());
                return Err(ExecutorError::Store(err));
            }
        };

        self.broadcast(JobEvent::status(LiveSnapshot::from(&job))).await;
        self.close_topic(&job.id).await;
        record_job_finished(job.status, started.elapsed());
        info!(
            job_id = %job.id,
            status = %job.status,
            total_files = job.total_files,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Scan finished"
        );

        let group_count = result.map(|(_, groups)| groups).unwrap_or(0);
        Ok(JobOutcome { job, group_count })
    }

    /// Walk, checkpoint, classify and persist. Returns `(total_files, groups)`.
    async fn drive(
        &self,
        job: &mut ScanJob,
        root: PathBuf,
        filter: Option<BTreeSet<String>>,
    ) -> Result<(u64, usize), StepError> {
        let (tx, mut rx) = mpsc::channel::<Result<FileEntry, ScanError>>(PRODUCER_QUEUE);
        let producer = Arc::clone(&self.producer);
        let walker = tokio::task::spawn_blocking(move || {
            for item in producer.produce(&root, filter.as_ref()) {
                let fatal = item.is_err();
                if tx.blocking_send(item).is_err() || fatal {
                    break;
                }
            }
        });

        let mut files = Vec::new();
        while let Some(item) = rx.recv().await {
            files.push(item?);
            let scanned = files.len() as u64;
            if scanned % self.settings.checkpoint_interval == 0 {
                self.checkpoint(job, scanned).await?;
            }
        }
        walker.await?;

        let total = files.len() as u64;
        self.db.set_job_totals(&job.id, total).await?;
        job.total_files = total;

        let classifier = Arc::clone(&self.classifier);
        let buckets = tokio::task::spawn_blocking(move || classifier.classify(&files)).await??;

        let found_at = utc_now_rfc3339();
        let groups: Vec<ResultGroup> = buckets
            .into_iter()
            .filter_map(|(group_key, members)| {
                let first = members.first()?;
                Some(ResultGroup {
                    job_id: job.id.clone(),
                    found_at: found_at.clone(),
                    group_key,
                    file_name: first.file_name.clone(),
                    size_bytes: first.size_bytes,
                    items: members.iter().map(GroupItem::from).collect(),
                })
            })
            .collect();
        self.db.insert_result_groups(&job.id, &groups).await?;

        Ok((total, groups.len()))
    }

    async fn checkpoint(&self, job: &mut ScanJob, scanned: u64) -> Result<(), DbError> {
        self.db.update_job_progress(&job.id, scanned).await?;
        job.scanned_files = scanned;
        self.broadcast(JobEvent::progress(LiveSnapshot::from(&*job))).await;
        Ok(())
    }

    /// Refresh the live snapshot and publish the event. Neither is fatal.
    async fn broadcast(&self, event: JobEvent) {
        if let Some(cache) = &self.cache {
            if let Err(err) = cache.put(&event.snapshot, self.settings.snapshot_ttl).await {
                warn!(job_id = %event.job_id(), error = %err, "Live cache write failed");
            }
        }
        self.publish(&event).await;
    }

    async fn publish(&self, event: &JobEvent) {
        if let Some(channel) = &self.channel {
            if let Err(err) = channel.publish(event.job_id(), event).await {
                warn!(job_id = %event.job_id(), error = %err, "Event publish failed");
            }
        }
    }

    async fn close_topic(&self, job_id: &str) {
        if let Some(channel) = &self.channel {
            if let Err(err) = channel.close(job_id).await {
                warn!(job_id, error = %err, "Closing event topic failed");
            }
        }
    }
}
