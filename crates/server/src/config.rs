// crates/server/src/config.rs
//! Command line and environment configuration.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use dupe_manager_db::{default_db_path, DbResult};

use crate::jobs::executor::DEFAULT_CHECKPOINT_INTERVAL;
use crate::jobs::JobSettings;
use crate::live::LiveBackend;

/// Default port for the server.
pub const DEFAULT_PORT: u16 = 47900;

#[derive(Debug, Parser)]
#[command(name = "dupe-manager", version, about = "Find and clean up duplicate files")]
pub struct Cli {
    #[command(flatten)]
    pub serve: ServeArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Scan a directory offline and print duplicate groups.
    Scan(ScanArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    #[arg(long, env = "DUPE_MANAGER_HOST", default_value = "127.0.0.1", global = true)]
    pub host: IpAddr,

    /// Falls back to `PORT`, then 47900.
    #[arg(long, env = "DUPE_MANAGER_PORT", global = true)]
    pub port: Option<u16>,

    /// SQLite file; defaults to `~/.cache/dupe-manager/dupes.db`.
    #[arg(long, env = "DUPE_MANAGER_DB", global = true)]
    pub db: Option<PathBuf>,

    #[arg(long, env = "DUPE_MANAGER_LIVE_BACKEND", value_enum, default_value_t = LiveBackend::Memory, global = true)]
    pub live_backend: LiveBackend,

    #[arg(long, env = "DUPE_MANAGER_VALKEY_URL", global = true)]
    pub valkey_url: Option<String>,

    /// Retention of a live snapshot after its last refresh.
    #[arg(long, env = "DUPE_MANAGER_JOB_TTL_SECS", default_value_t = 86_400, global = true)]
    pub job_ttl_secs: u64,

    #[arg(long, env = "DUPE_MANAGER_CHECKPOINT_INTERVAL", default_value_t = DEFAULT_CHECKPOINT_INTERVAL, global = true)]
    pub checkpoint_interval: u64,

    /// Refuse to start scans when no live event channel is configured.
    #[arg(long, env = "DUPE_MANAGER_REQUIRE_LIVE_EVENTS", global = true)]
    pub require_live_events: bool,

    /// Frontend assets served at `/`.
    #[arg(long, env = "STATIC_DIR", global = true)]
    pub static_dir: Option<PathBuf>,
}

impl ServeArgs {
    pub fn port(&self) -> u16 {
        self.port
            .or_else(|| std::env::var("PORT").ok().and_then(|p| p.parse().ok()))
            .unwrap_or(DEFAULT_PORT)
    }

    pub fn db_path(&self) -> DbResult<PathBuf> {
        match &self.db {
            Some(path) => Ok(path.clone()),
            None => default_db_path(),
        }
    }

    pub fn job_settings(&self) -> JobSettings {
        JobSettings::new(
            self.checkpoint_interval,
            Duration::from_secs(self.job_ttl_secs),
        )
    }
}

#[derive(Debug, Clone, Args)]
pub struct ScanArgs {
    /// Directory to scan.
    pub root: String,

    /// Only consider these extensions (repeatable, e.g. `--ext jpg --ext .png`).
    #[arg(long = "ext")]
    pub extensions: Vec<String>,

    /// Print groups as JSON instead of text.
    #[arg(long)]
    pub json: bool,
}
