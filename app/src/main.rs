//! Logdeck headless shell
//!
//! ```bash
//! logdeck --search ERROR app.log trace.log
//! LOGDECK_DATA_DIR=/tmp/logdeck logdeck --log debug
//! ```
//!
//! Opens one session per file (a built-in sample when no file is given), runs
//! the search in every session and prints a JSON summary.

use anyhow::Context;
use clap::Parser;
use futures_util::future::join_all;
use logdeck_core::{Config, Notification, NotificationLevel, SearchSettings, Workspace};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

const SAMPLE: &[&str] = &[
    "00:00:01.000 INFO  boot sequence started",
    "00:00:01.250 WARN  sensor 3 slow to respond",
    "00:00:02.010 ERROR link down on eth1",
    "00:00:02.900 INFO  link up on eth1",
];

#[derive(Parser)]
#[command(name = "logdeck")]
#[command(version)]
#[command(about = "Open log files as sessions and search them")]
struct Cli {
    /// Log files to open, one session each (a built-in sample when empty)
    files: Vec<String>,

    /// Search every session for this text
    #[arg(long, short)]
    search: Option<String>,

    /// Directory holding settings.json and window.json
    #[arg(long, env = logdeck_core::DATA_DIR_ENV)]
    data_dir: Option<PathBuf>,

    /// Log filter directive, used when RUST_LOG is not set
    #[arg(long)]
    log: Option<String>,
}

async fn load(path: &str) -> anyhow::Result<(String, Vec<String>)> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("cannot read {path}"))?;
    let title = Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string());
    Ok((title, content.lines().map(str::to_string).collect()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let mut config = match args.data_dir.clone() {
        Some(dir) => Config::new(dir),
        None => Config::default(),
    };
    if args.log.is_some() {
        config.log_filter = args.log.clone();
    }
    logdeck_core::init_logging(config.log_filter.as_deref())?;

    let mut sources = Vec::new();
    if args.files.is_empty() {
        sources.push((
            "sample.log".to_string(),
            SAMPLE.iter().map(|row| row.to_string()).collect::<Vec<_>>(),
        ));
    }
    for file in &args.files {
        sources.push(load(file).await?);
    }

    let workspace = Workspace::open(config).await?;
    tracing::info!(sources = sources.len(), "Opening sessions");

    let report = report(&workspace, &sources, args.search.as_deref()).await;
    workspace.shutdown().await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Open one session per source, search it and describe the outcome.
/// A source that fails is logged and left out.
async fn report(workspace: &Workspace, sources: &[(String, Vec<String>)], search: Option<&str>) -> Value {
    let opened = join_all(
        sources
            .iter()
            .map(|(title, rows)| workspace.open_source(title, rows.clone())),
    )
    .await;

    let plugin = workspace.registry().plugin_capabilities(0);
    let mut summary = Vec::new();
    for ((title, rows), session) in sources.iter().zip(opened) {
        let session = match session {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(title = %title, error = %e, "Fail to open session");
                continue;
            }
        };

        let matches = match search {
            Some(query) => {
                let settings = SearchSettings {
                    query: query.to_string(),
                    ..SearchSettings::default()
                };
                let found = match workspace.search(session.id(), settings).await {
                    Ok(found) => found,
                    Err(e) => {
                        tracing::warn!(session_id = %session.id(), error = %e, "Search failed");
                        continue;
                    }
                };
                let mut notification = Notification::new(
                    NotificationLevel::Info,
                    "Search",
                    format!("{found} matches for {query:?} in {title}"),
                );
                notification.session_id = Some(session.id().to_string());
                plugin.add_notification(notification);
                Some(found)
            }
            None => None,
        };

        summary.push(json!({
            "session": session.id(),
            "title": title,
            "rows": rows.len(),
            "matches": matches,
        }));
    }

    json!({
        "active": workspace.registry().active_id(),
        "sessions": summary,
        "notifications": workspace.notifications().len(),
    })
}
