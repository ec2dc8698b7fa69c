// crates/server/src/live/resolver.rs
//! Cache-first job status lookup.

use std::sync::Arc;

use dupe_manager_core::{JobStatus, LiveSnapshot, ScanJob};
use dupe_manager_db::{Database, DbError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::LiveStateCache;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("job not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(DbError),
}

impl From<DbError> for ResolveError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(id) => ResolveError::NotFound(id),
            other => ResolveError::Store(other),
        }
    }
}

/// Where a resolved status came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedStatus {
    /// Latest snapshot in the live state cache.
    Live(LiveSnapshot),
    /// Durable job record; counts may lag the running job by one checkpoint.
    Durable(ScanJob),
}

/// Wire tag of [`ResolvedStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusSource {
    Live,
    Durable,
}

impl ResolvedStatus {
    pub fn source(&self) -> StatusSource {
        match self {
            ResolvedStatus::Live(_) => StatusSource::Live,
            ResolvedStatus::Durable(_) => StatusSource::Durable,
        }
    }

    pub fn snapshot(&self) -> LiveSnapshot {
        match self {
            ResolvedStatus::Live(snapshot) => snapshot.clone(),
            ResolvedStatus::Durable(job) => LiveSnapshot::from(job),
        }
    }

    pub fn status(&self) -> JobStatus {
        match self {
            ResolvedStatus::Live(snapshot) => snapshot.status,
            ResolvedStatus::Durable(job) => job.status,
        }
    }
}

#[derive(Clone)]
pub struct StatusResolver {
    db: Database,
    cache: Option<Arc<dyn LiveStateCache>>,
}

impl StatusResolver {
    pub fn new(db: Database, cache: Option<Arc<dyn LiveStateCache>>) -> Self {
        Self { db, cache }
    }

    /// Live snapshot if the cache has one, otherwise the job store record.
    /// A failing cache counts as an empty one.
    pub async fn resolve(&self, job_id: &str) -> Result<ResolvedStatus, ResolveError> {
        if let Some(cache) = &self.cache {
            match cache.get(job_id).await {
                Ok(Some(snapshot)) => return Ok(ResolvedStatus::Live(snapshot)),
                Ok(None) => {}
                Err(error) => {
                    warn!(job_id, error = %error, "Live cache read failed, using job store");
                }
            }
        }
        let job = self.db.get_job(job_id).await?;
        Ok(ResolvedStatus::Durable(job))
    }
}
