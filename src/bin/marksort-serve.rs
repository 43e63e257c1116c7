// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! marksort control server
//!
//! Serves the control API over a tree snapshot, auto-classifies entries
//! created through it and writes the snapshot back after every change.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use marksort::config::{AppConfig, ConfigFile};
use marksort::oracle::HttpOracleFactory;
use marksort::tree::MemoryTree;
use marksort::watcher::TreeWatcher;
use marksort::web::{self, AppState};

#[derive(Parser, Debug)]
#[command(name = "marksort-serve")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "marksort control server")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Bookmark tree snapshot (overrides config)
    #[arg(short, long)]
    tree: Option<PathBuf>,

    /// Host to bind to
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("marksort control server v{}", env!("CARGO_PKG_VERSION"));

    // Load config
    let mut config = AppConfig::load(&args.config).context("loading configuration")?;

    // Apply CLI overrides
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let tree_path = args.tree.unwrap_or_else(|| PathBuf::from(&config.tree.path));
    let tree = MemoryTree::load(&tree_path)
        .with_context(|| format!("loading tree snapshot {:?}", tree_path))?;
    info!("Tree snapshot: {:?}", tree_path);

    // Persist after every change
    let mut changes = TreeWatcher::new(tree.subscribe());
    let persisted = tree.clone();
    let persist_path = tree_path.clone();
    tokio::spawn(async move {
        while changes.recv().await.is_some() {
            if let Err(e) = persisted.save(&persist_path) {
                error!("Failed to save tree snapshot: {}", e);
            }
        }
    });

    let state = Arc::new(AppState::new(
        Arc::new(tree.clone()),
        Arc::new(ConfigFile::new(&args.config)),
        Arc::new(HttpOracleFactory),
    ));

    tokio::spawn(Arc::clone(&state.classifier).run(TreeWatcher::new(tree.subscribe())));

    tokio::select! {
        result = web::start_server(state, &config.server.host, config.server.port) => {
            result.context("control server failed")?;
        }
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
    }

    tree.save(&tree_path).context("saving tree snapshot")?;
    Ok(())
}
