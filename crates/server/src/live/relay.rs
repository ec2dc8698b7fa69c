// crates/server/src/live/relay.rs
//! Bridges one live connection to one job's event topic.

use std::sync::Arc;

use dupe_manager_core::{EventKind, JobEvent, JobStatus, LiveSnapshot};
use dupe_manager_db::DbError;
use serde::Serialize;
use thiserror::Error;

use super::{EventChannel, LiveError, ResolveError, StatusResolver, Subscription};

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("live updates unavailable")]
    ChannelUnavailable,

    #[error("subscribe failed: {0}")]
    Live(#[from] LiveError),

    #[error(transparent)]
    Store(#[from] DbError),
}

/// One message delivered to a live connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RelayMessage {
    Event(JobEvent),
    Error {
        #[serde(rename = "type")]
        kind: EventKind,
        job_id: String,
        message: String,
    },
}

impl RelayMessage {
    fn not_found(job_id: &str) -> Self {
        RelayMessage::Error {
            kind: EventKind::Error,
            job_id: job_id.to_string(),
            message: "job not found".to_string(),
        }
    }

    /// `status`, `progress` or `error`; used as the SSE event name.
    pub fn kind(&self) -> EventKind {
        match self {
            RelayMessage::Event(event) => event.kind,
            RelayMessage::Error { kind, .. } => *kind,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Clone)]
pub struct EventRelay {
    resolver: StatusResolver,
    channel: Option<Arc<dyn EventChannel>>,
}

impl EventRelay {
    pub fn new(resolver: StatusResolver, channel: Option<Arc<dyn EventChannel>>) -> Self {
        Self { resolver, channel }
    }

    pub fn is_available(&self) -> bool {
        self.channel.is_some()
    }

    /// Attach to `job_id`.
    ///
    /// The subscription is taken before the status lookup so nothing
    /// published in between is lost. The first message is always a
    /// synthetic `status` carrying the resolved state, or an `error` for an
    /// unknown job.
    pub async fn attach(&self, job_id: &str) -> Result<RelayStream, RelayError> {
        let channel = self.channel.as_ref().ok_or(RelayError::ChannelUnavailable)?;
        let subscription = channel.subscribe(job_id).await?;

        match self.resolver.resolve(job_id).await {
            Ok(resolved) => Ok(RelayStream::new(
                RelayMessage::Event(JobEvent::status(resolved.snapshot())),
                Some(subscription),
            )),
            Err(ResolveError::NotFound(_)) => {
                Ok(RelayStream::new(RelayMessage::not_found(job_id), None))
            }
            Err(ResolveError::Store(err)) => Err(RelayError::Store(err)),
        }
    }
}

/// Ordered message sequence for one connection.
///
/// Ends after a terminal status has been delivered, when the topic is torn
/// down, or after the not-found error. Dropping it unsubscribes.
#[derive(Debug)]
pub struct RelayStream {
    first: Option<RelayMessage>,
    subscription: Option<Subscription>,
    last: Option<LiveSnapshot>,
}

impl RelayStream {
    fn new(first: RelayMessage, subscription: Option<Subscription>) -> Self {
        Self {
            first: Some(first),
            subscription,
            last: None,
        }
    }

    /// Wait for the next message. `None` means the stream is over.
    pub async fn next(&mut self) -> Option<RelayMessage> {
        if let Some(first) = self.first.take() {
            self.observe(&first);
            return Some(first);
        }
        loop {
            let event = self.subscription.as_mut()?.recv().await;
            let Some(event) = event else {
                self.subscription = None;
                return None;
            };
            if self.is_stale(&event.snapshot) {
                continue;
            }
            let message = RelayMessage::Event(event);
            self.observe(&message);
            return Some(message);
        }
    }

    /// Events queued before the synthetic status can be older than it.
    fn is_stale(&self, incoming: &LiveSnapshot) -> bool {
        match &self.last {
            Some(last) => {
                incoming.status == JobStatus::Running && incoming.scanned_files < last.scanned_files
            }
            None => false,
        }
    }

    fn observe(&mut self, message: &RelayMessage) {
        match message {
            RelayMessage::Event(event) => {
                if event.snapshot.status.is_terminal() {
                    self.subscription = None;
                }
                self.last = Some(event.snapshot.clone());
            }
            RelayMessage::Error { .. } => self.subscription = None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::{BroadcastChannel, MemoryLiveCache};
    use dupe_manager_core::new_job_id;
    use dupe_manager_db::{new_running_job, Database};

    async fn relay_with_job() -> (EventRelay, Arc<BroadcastChannel>, Database, String) {
        let db = Database::new_in_memory().await.unwrap();
        let job = new_running_job(new_job_id(), "/tmp", None);
        db.create_job(&job).await.unwrap();
        let channel = Arc::new(BroadcastChannel::new());
        let resolver = StatusResolver::new(db.clone(), Some(Arc::new(MemoryLiveCache::new())));
        let relay = EventRelay::new(resolver, Some(channel.clone()));
        (relay, channel, db, job.id)
    }

    fn progress(job_id: &str, scanned: u64) -> JobEvent {
        JobEvent::progress(LiveSnapshot {
            job_id: job_id.to_string(),
            status: JobStatus::Running,
            total_files: 0,
            scanned_files: scanned,
            message: None,
        })
    }

    #[tokio::test]
    async fn test_no_channel_is_unavailable() {
        let db = Database::new_in_memory().await.unwrap();
        let relay = EventRelay::new(StatusResolver::new(db, None), None);
        assert!(!relay.is_available());
        assert!(matches!(
            relay.attach("any").await,
            Err(RelayError::ChannelUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_first_message_is_synthetic_status() {
        let (relay, channel, _db, id) = relay_with_job().await;
        let mut stream = relay.attach(&id).await.unwrap();

        channel.publish(&id, &progress(&id, 250)).await.unwrap();

        let first = stream.next().await.unwrap();
        assert_eq!(first.kind(), EventKind::Status);
        let second = stream.next().await.unwrap();
        assert_eq!(second, RelayMessage::Event(progress(&id, 250)));
    }

    #[tokio::test]
    async fn test_unknown_job_yields_error_then_ends() {
        let (relay, _channel, _db, _id) = relay_with_job().await;
        let mut stream = relay.attach("missing").await.unwrap();
        let first = stream.next().await.unwrap();
        assert_eq!(first.kind(), EventKind::Error);
        assert!(first.to_json().contains("job not found"));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_stream_ends_after_terminal_status() {
        let (relay, channel, db, id) = relay_with_job().await;
        let mut stream = relay.attach(&id).await.unwrap();
        let job = db
            .finalize_job(&id, JobStatus::Completed, Some("done"), Some(3))
            .await
            .unwrap();

        channel
            .publish(&id, &JobEvent::status(LiveSnapshot::from(&job)))
            .await
            .unwrap();
        channel.publish(&id, &progress(&id, 9)).await.unwrap();

        assert_eq!(stream.next().await.unwrap().kind(), EventKind::Status);
        let terminal = stream.next().await.unwrap();
        assert!(terminal.to_json().contains("\"completed\""));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_stale_progress_is_skipped() {
        let (relay, channel, _db, id) = relay_with_job().await;
        let mut stream = relay.attach(&id).await.unwrap();
        channel.publish(&id, &progress(&id, 500)).await.unwrap();
        channel.publish(&id, &progress(&id, 250)).await.unwrap();
        channel.publish(&id, &progress(&id, 750)).await.unwrap();

        stream.next().await.unwrap();
        let seen: Vec<u64> = [stream.next().await, stream.next().await]
            .into_iter()
            .flatten()
            .filter_map(|m| match m {
                RelayMessage::Event(e) => Some(e.snapshot.scanned_files),
                _ => None,
            })
            .collect();
        assert_eq!(seen, vec![500, 750]);
    }
}
