// crates/server/src/live/cache.rs
//! In-process live state cache.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dupe_manager_core::LiveSnapshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::{LiveError, LiveStateCache};

#[derive(Debug, Clone)]
struct CachedSnapshot {
    snapshot: LiveSnapshot,
    expires_at: Instant,
}

/// Snapshots keyed by job id, each with its own deadline.
///
/// Expired entries are invisible to `get` immediately and physically
/// removed by [`MemoryLiveCache::purge_expired`].
#[derive(Debug, Default)]
pub struct MemoryLiveCache {
    entries: DashMap<String, CachedSnapshot>,
}

impl MemoryLiveCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl LiveStateCache for MemoryLiveCache {
    async fn put(&self, snapshot: &LiveSnapshot, ttl: Duration) -> Result<(), LiveError> {
        self.entries.insert(
            snapshot.job_id.clone(),
            CachedSnapshot {
                snapshot: snapshot.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<Option<LiveSnapshot>, LiveError> {
        let now = Instant::now();
        Ok(self
            .entries
            .get(job_id)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.snapshot.clone()))
    }
}

/// Background loop purging expired snapshots every `period`.
pub fn spawn_sweeper(cache: Arc<MemoryLiveCache>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let purged = cache.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, remaining = cache.len(), "Purged expired live snapshots");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dupe_manager_core::JobStatus;

    fn snapshot(job_id: &str, scanned: u64) -> LiveSnapshot {
        LiveSnapshot {
            job_id: job_id.to_string(),
            status: JobStatus::Running,
            total_files: 0,
            scanned_files: scanned,
            message: None,
        }
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let cache = MemoryLiveCache::new();
        cache.put(&snapshot("a", 1), Duration::from_secs(60)).await.unwrap();
        cache.put(&snapshot("a", 2), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("a").await.unwrap().unwrap().scanned_files, 2);
        assert!(cache.get("b").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let cache = MemoryLiveCache::new();
        cache.put(&snapshot("a", 1), Duration::from_secs(10)).await.unwrap();

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(cache.get("a").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("a").await.unwrap().is_none());
        assert_eq!(cache.len(), 1, "expired entry stays until purged");
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_resets_countdown() {
        let cache = MemoryLiveCache::new();
        cache.put(&snapshot("a", 1), Duration::from_secs(10)).await.unwrap();
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.put(&snapshot("a", 2), Duration::from_secs(10)).await.unwrap();
        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cache.get("a").await.unwrap().unwrap().scanned_files, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_purges_in_background() {
        let cache = Arc::new(MemoryLiveCache::new());
        cache.put(&snapshot("a", 1), Duration::from_secs(5)).await.unwrap();
        let sweeper = spawn_sweeper(cache.clone(), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(cache.is_empty());
        sweeper.abort();
    }
}
