// crates/server/src/live/channel.rs
//! In-process event channel: one `broadcast` sender per job topic.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dupe_manager_core::JobEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use super::{EventChannel, LiveError, Subscription};

/// Buffer of each topic's broadcast ring. A subscriber that falls further
/// behind skips ahead to the newest events.
const TOPIC_CAPACITY: usize = 64;

#[derive(Debug, Default, Clone)]
pub struct BroadcastChannel {
    topics: Arc<DashMap<String, broadcast::Sender<JobEvent>>>,
}

impl BroadcastChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of topics that currently have a sender.
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .get(topic)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl EventChannel for BroadcastChannel {
    async fn publish(&self, topic: &str, event: &JobEvent) -> Result<(), LiveError> {
        if let Some(tx) = self.topics.get(topic) {
            // No receivers is fine.
            let _ = tx.send(event.clone());
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, LiveError> {
        let mut rx = self
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe();
        let (tx, subscription) = Subscription::channel();

        let topics = Arc::clone(&self.topics);
        let topic = topic.to_string();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    received = rx.recv() => match received {
                        Ok(event) => {
                            if tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(topic = %topic, skipped, "Subscriber lagged, skipping to newest events");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            drop(rx);
            topics.remove_if(&topic, |_, sender| sender.receiver_count() == 0);
            debug!(topic = %topic, "Subscription ended");
        });

        Ok(subscription)
    }

    async fn close(&self, topic: &str) -> Result<(), LiveError> {
        self.topics.remove(topic);
        Ok(())
    }
}
