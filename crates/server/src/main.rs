// crates/server/src/main.rs
//! dupe-manager binary: HTTP server by default, `scan` for offline use.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use dupe_manager_core::{
    normalize_extensions, validate_root, Classifier, FileProducer, GroupItem, NameSizeClassifier,
    WalkdirProducer,
};
use dupe_manager_db::Database;
use dupe_manager_server::config::{Cli, Command, ScanArgs, ServeArgs};
use dupe_manager_server::live::LiveServices;
use dupe_manager_server::{create_app_with_static, init_metrics, AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// How often expired in-process live snapshots are purged.
const SWEEP_PERIOD: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,dupe_manager_server=info,dupe_manager_db=info".into()),
        )
        .compact()
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Command::Scan(args)) => run_scan(args),
        Some(Command::Serve) | None => serve(cli.serve).await,
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    init_metrics();

    let db_path = args.db_path().context("resolving database path")?;
    let db = Database::new(&db_path)
        .await
        .with_context(|| format!("opening database at {}", db_path.display()))?;

    let live = LiveServices::connect(args.live_backend, args.valkey_url.as_deref())
        .await
        .with_context(|| format!("starting live backend `{}`", args.live_backend))?;
    if live.channel.is_none() {
        tracing::warn!(
            require_live_events = args.require_live_events,
            "No live event channel configured; clients can only poll status"
        );
    }
    let _sweeper = live.spawn_sweeper(SWEEP_PERIOD);

    let state = AppState::new(db, live, args.job_settings(), args.require_live_events);
    let app = create_app_with_static(state, args.static_dir.as_deref());

    let addr = SocketAddr::new(args.host, args.port());
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, backend = %args.live_backend, "dupe-manager listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

/// Offline scan: walk, group and print, without a database.
fn run_scan(args: ScanArgs) -> Result<()> {
    let root = validate_root(&args.root)?;
    let filter = normalize_extensions(Some(args.extensions.as_slice()));

    let files = WalkdirProducer
        .produce(&root, filter.as_ref())
        .collect::<Result<Vec<_>, _>>()?;
    let groups = NameSizeClassifier.classify(&files)?;

    if args.json {
        let out: Vec<_> = groups
            .iter()
            .map(|(key, members)| {
                serde_json::json!({
                    "dup_key": key,
                    "items": members.iter().map(GroupItem::from).collect::<Vec<_>>(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!(
        "Scanned {} files under {}: {} duplicate groups",
        files.len(),
        display(&root),
        groups.len()
    );
    for (key, members) in &groups {
        println!("\n{key}");
        for member in members {
            println!("  {}", display(&member.path));
        }
    }
    Ok(())
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
