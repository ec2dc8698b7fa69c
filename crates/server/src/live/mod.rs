// crates/server/src/live/mod.rs
//! Ephemeral side of a job: the live state cache, the per-job event
//! channel, and the two readers built on them (status resolver, event relay).
//!
//! Both stores are optional and injected. A deployment without them still
//! works; status reads fall back to the job store and live attachments are
//! refused with an explicit error.

pub mod cache;
pub mod channel;
pub mod relay;
pub mod resolver;
#[cfg(feature = "valkey")]
pub mod valkey;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dupe_manager_core::{JobEvent, LiveSnapshot};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub use cache::MemoryLiveCache;
pub use channel::BroadcastChannel;
pub use relay::{EventRelay, RelayError, RelayMessage, RelayStream};
pub use resolver::{ResolveError, ResolvedStatus, StatusResolver, StatusSource};

/// Default retention of a live snapshot after its last refresh.
pub const DEFAULT_SNAPSHOT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Capacity of the per-connection queue between a topic and one subscriber.
pub const SUBSCRIPTION_QUEUE: usize = 64;

#[derive(Debug, Error)]
pub enum LiveError {
    #[error("failed to encode live payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[cfg(feature = "valkey")]
    #[error("valkey error: {0}")]
    Valkey(#[from] redis::RedisError),

    #[error("live backend unavailable: {0}")]
    Unavailable(String),
}

/// Most recent snapshot per job, expiring after a TTL.
#[async_trait]
pub trait LiveStateCache: Send + Sync {
    /// Overwrite the snapshot for `snapshot.job_id` and restart its TTL.
    async fn put(&self, snapshot: &LiveSnapshot, ttl: Duration) -> Result<(), LiveError>;

    /// `None` covers both "never written" and "expired".
    async fn get(&self, job_id: &str) -> Result<Option<LiveSnapshot>, LiveError>;
}

/// Per-job fire-and-forget broadcast. Topics are job ids.
#[async_trait]
pub trait EventChannel: Send + Sync {
    /// Deliver to whoever is subscribed right now; otherwise drop the event.
    async fn publish(&self, topic: &str, event: &JobEvent) -> Result<(), LiveError>;

    async fn subscribe(&self, topic: &str) -> Result<Subscription, LiveError>;

    /// Tear the topic down. Current subscribers see the end of their stream.
    async fn close(&self, topic: &str) -> Result<(), LiveError>;
}

/// One listener's view of a topic.
///
/// Backed by a bounded queue that a forwarding task fills from the
/// underlying transport. Dropping the handle closes the queue, which stops
/// the forwarder and releases the transport subscription.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::Receiver<JobEvent>,
}

impl Subscription {
    /// Queue plus the sender a channel implementation feeds.
    pub(crate) fn channel() -> (mpsc::Sender<JobEvent>, Self) {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_QUEUE);
        (tx, Self { rx })
    }

    /// Next event, or `None` once the topic is torn down.
    pub async fn recv(&mut self) -> Option<JobEvent> {
        self.rx.recv().await
    }
}

/// Which live backend the process was started with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LiveBackend {
    /// In-process cache and broadcast channel.
    Memory,
    /// Shared Valkey/Redis instance.
    Valkey,
    /// No cache and no channel: durable polling only.
    None,
}

impl LiveBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            LiveBackend::Memory => "memory",
            LiveBackend::Valkey => "valkey",
            LiveBackend::None => "none",
        }
    }
}

impl fmt::Display for LiveBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The injected cache/channel pair and the backend they came from.
#[derive(Clone)]
pub struct LiveServices {
    pub backend: LiveBackend,
    pub cache: Option<Arc<dyn LiveStateCache>>,
    pub channel: Option<Arc<dyn EventChannel>>,
    memory_cache: Option<Arc<MemoryLiveCache>>,
}

impl LiveServices {
    pub fn memory() -> Self {
        let cache = Arc::new(MemoryLiveCache::new());
        Self {
            backend: LiveBackend::Memory,
            cache: Some(cache.clone()),
            channel: Some(Arc::new(BroadcastChannel::new())),
            memory_cache: Some(cache),
        }
    }

    pub fn none() -> Self {
        Self {
            backend: LiveBackend::None,
            cache: None,
            channel: None,
            memory_cache: None,
        }
    }

    /// Custom pair, mostly for tests that need a failing or partial backend.
    pub fn custom(
        backend: LiveBackend,
        cache: Option<Arc<dyn LiveStateCache>>,
        channel: Option<Arc<dyn EventChannel>>,
    ) -> Self {
        Self {
            backend,
            cache,
            channel,
            memory_cache: None,
        }
    }

    /// Build the services for `backend`. `valkey_url` is only read for `Valkey`.
    pub async fn connect(backend: LiveBackend, valkey_url: Option<&str>) -> Result<Self, LiveError> {
        match backend {
            LiveBackend::Memory => Ok(Self::memory()),
            LiveBackend::None => Ok(Self::none()),
            LiveBackend::Valkey => Self::connect_valkey(valkey_url).await,
        }
    }

    #[cfg(feature = "valkey")]
    async fn connect_valkey(valkey_url: Option<&str>) -> Result<Self, LiveError> {
        let url = valkey_url.ok_or_else(|| {
            LiveError::Unavailable("valkey backend selected without a URL".to_string())
        })?;
        let client = valkey::ValkeyClient::open(url).await?;
        Ok(Self {
            backend: LiveBackend::Valkey,
            cache: Some(Arc::new(valkey::ValkeyLiveCache::new(client.clone()))),
            channel: Some(Arc::new(valkey::ValkeyEventChannel::new(client))),
            memory_cache: None,
        })
    }

    #[cfg(not(feature = "valkey"))]
    async fn connect_valkey(_valkey_url: Option<&str>) -> Result<Self, LiveError> {
        Err(LiveError::Unavailable(
            "built without the `valkey` feature".to_string(),
        ))
    }

    /// Periodically purge expired entries of the in-process cache.
    /// Returns `None` for backends that expire entries themselves.
    pub fn spawn_sweeper(&self, period: Duration) -> Option<JoinHandle<()>> {
        self.memory_cache
            .as_ref()
            .map(|cache| cache::spawn_sweeper(Arc::clone(cache), period))
    }
}

impl fmt::Debug for LiveServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveServices")
            .field("backend", &self.backend)
            .field("cache", &self.cache.is_some())
            .field("channel", &self.channel.is_some())
            .finish()
    }
}
