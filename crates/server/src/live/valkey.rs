// crates/server/src/live/valkey.rs
//! Valkey/Redis live backend.
//!
//! Key layout: snapshots under `job:{id}` (`SET … EX ttl`), events on the
//! pub/sub channel `job-events:{id}`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dupe_manager_core::{JobEvent, LiveSnapshot};
use futures_util::StreamExt;
use redis::FromRedisValue;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{EventChannel, LiveError, LiveStateCache, Subscription};

fn snapshot_key(job_id: &str) -> String {
    format!("job:{job_id}")
}

fn event_channel(job_id: &str) -> String {
    format!("job-events:{job_id}")
}

/// Shared client with one lazily (re)opened multiplexed connection.
#[derive(Clone)]
pub struct ValkeyClient {
    client: redis::Client,
    connection: Arc<Mutex<Option<redis::aio::MultiplexedConnection>>>,
}

impl ValkeyClient {
    /// Open the client and verify the server answers `PING`.
    pub async fn open(url: &str) -> Result<Self, LiveError> {
        let client = redis::Client::open(url)?;
        let this = Self {
            client,
            connection: Arc::new(Mutex::new(None)),
        };
        let _: String = this.run("PING", redis::cmd("PING")).await?;
        Ok(this)
    }

    async fn run<T>(&self, operation: &'static str, cmd: redis::Cmd) -> Result<T, LiveError>
    where
        T: FromRedisValue + Send,
    {
        // Clone the multiplexed handle out so commands pipeline concurrently.
        let mut conn = {
            let mut guard = self.connection.lock().await;
            match guard.as_ref() {
                Some(conn) => conn.clone(),
                None => {
                    let conn = self.client.get_multiplexed_async_connection().await?;
                    *guard = Some(conn.clone());
                    conn
                }
            }
        };
        match cmd.query_async(&mut conn).await {
            Ok(value) => Ok(value),
            Err(error) => {
                warn!(operation, error = %error, "Valkey command failed, dropping connection");
                *self.connection.lock().await = None;
                Err(LiveError::Valkey(error))
            }
        }
    }
}

pub struct ValkeyLiveCache {
    client: ValkeyClient,
}

impl ValkeyLiveCache {
    pub fn new(client: ValkeyClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LiveStateCache for ValkeyLiveCache {
    async fn put(&self, snapshot: &LiveSnapshot, ttl: Duration) -> Result<(), LiveError> {
        let payload = serde_json::to_string(snapshot)?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(snapshot_key(&snapshot.job_id))
            .arg(payload)
            .arg("EX")
            .arg(ttl.as_secs().max(1));
        let _: () = self.client.run("SET", cmd).await?;
        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<Option<LiveSnapshot>, LiveError> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(snapshot_key(job_id));
        let raw: Option<String> = self.client.run("GET", cmd).await?;
        Ok(raw.map(|payload| serde_json::from_str(&payload)).transpose()?)
    }
}

pub struct ValkeyEventChannel {
    client: ValkeyClient,
}

impl ValkeyEventChannel {
    pub fn new(client: ValkeyClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventChannel for ValkeyEventChannel {
    async fn publish(&self, topic: &str, event: &JobEvent) -> Result<(), LiveError> {
        let payload = serde_json::to_string(event)?;
        let mut cmd = redis::cmd("PUBLISH");
        cmd.arg(event_channel(topic)).arg(payload);
        let _: i64 = self.client.run("PUBLISH", cmd).await?;
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, LiveError> {
        let mut pubsub = self.client.client.get_async_pubsub().await?;
        pubsub.subscribe(event_channel(topic)).await?;
        let (tx, subscription) = Subscription::channel();

        let topic = topic.to_string();
        tokio::spawn(async move {
            let mut messages = pubsub.into_on_message();
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    message = messages.next() => {
                        let Some(message) = message else { break };
                        let payload: String = match message.get_payload() {
                            Ok(payload) => payload,
                            Err(error) => {
                                warn!(topic = %topic, error = %error, "Unreadable pub/sub payload");
                                continue;
                            }
                        };
                        match serde_json::from_str::<JobEvent>(&payload) {
                            Ok(event) => {
                                if tx.send(event).await.is_err() {
                                    break;
                                }
                            }
                            Err(error) => warn!(topic = %topic, error = %error, "Undecodable job event"),
                        }
                    }
                }
            }
            debug!(topic = %topic, "Valkey subscription ended");
        });

        Ok(subscription)
    }

    /// Pub/sub topics have no server-side lifetime; subscribers stop on the
    /// terminal event instead.
    async fn close(&self, _topic: &str) -> Result<(), LiveError> {
        Ok(())
    }
}
