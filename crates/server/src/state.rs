// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Instant;

use dupe_manager_db::Database;

use crate::jobs::{JobExecutor, JobSettings};
use crate::live::{EventRelay, LiveServices, StatusResolver};

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// Durable job store.
    pub db: Database,
    /// Injected live cache and event channel (either may be absent).
    pub live: LiveServices,
    pub executor: Arc<JobExecutor>,
    pub resolver: StatusResolver,
    pub relay: EventRelay,
    /// Reject new scans when no event channel is configured.
    pub require_live_events: bool,
}

impl AppState {
    /// State with the default producer and classifier.
    pub fn new(
        db: Database,
        live: LiveServices,
        settings: JobSettings,
        require_live_events: bool,
    ) -> Arc<Self> {
        let executor = JobExecutor::with_defaults(db.clone(), &live, settings);
        Self::with_executor(db, live, executor, require_live_events)
    }

    pub fn with_executor(
        db: Database,
        live: LiveServices,
        executor: JobExecutor,
        require_live_events: bool,
    ) -> Arc<Self> {
        let resolver = StatusResolver::new(db.clone(), live.cache.clone());
        let relay = EventRelay::new(resolver.clone(), live.channel.clone());
        Arc::new(Self {
            start_time: Instant::now(),
            db,
            live,
            executor: Arc::new(executor),
            resolver,
            relay,
            require_live_events,
        })
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
