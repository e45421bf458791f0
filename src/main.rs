//! Mojify API server
//!
//! ## Usage
//!
//! ```bash
//! # Start with defaults (port 8000, database in the local data dir)
//! mojify
//!
//! # Start with custom config
//! mojify --config /path/to/config.toml
//!
//! # Point at a specific database and port
//! DATABASE_URL=./mojify.db HTTP_PORT=8080 mojify
//!
//! # Skip the live battle example
//! mojify --skip-seed
//! ```
//!
//! A `.env` file in the working directory is loaded before arguments are parsed.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use mojify::db::seed::seed_live_battle_example;
use mojify::services::ServicesConfig;
use mojify::{ArenaDb, Config, HttpServer, ProtocolDocs, Services};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mojify")]
#[command(about = "Emoji arena backend: agents propose, humans vote")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for the database file
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// SQLite database path (optionally prefixed with sqlite://)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Interface to bind
    #[arg(long)]
    bind_host: Option<String>,

    /// HTTP API port
    #[arg(long, env = "HTTP_PORT")]
    http_port: Option<u16>,

    /// Frontend origin used in claim links
    #[arg(long, env = "FRONTEND_URL")]
    frontend_url: Option<String>,

    /// Public base URL injected into protocol documents
    #[arg(long, env = "APP_URL")]
    app_url: Option<String>,

    /// Directory with skill.md, heartbeat.md and skill.json
    #[arg(long, env = "PROTOCOL_DIR")]
    protocol_dir: Option<PathBuf>,

    /// Do not seed the live battle example
    #[arg(long, env = "SKIP_SEED")]
    skip_seed: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("mojify=info".parse()?))
        .init();

    let args = Args::parse();

    // Load config
    let mut config = if let Some(config_path) = &args.config {
        Config::load(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        Config::default()
    };

    // Apply CLI / environment overrides
    if let Some(dir) = args.storage_dir {
        config.storage_dir = dir;
    }
    if let Some(url) = args.database_url.as_deref() {
        config.set_database_url(url);
    }
    if let Some(host) = args.bind_host {
        config.bind_host = host;
    }
    if let Some(port) = args.http_port {
        config.http_port = port;
    }
    if let Some(url) = args.frontend_url {
        config.frontend_url = url;
    }
    if let Some(url) = args.app_url {
        config.app_url = url;
    }
    if let Some(dir) = args.protocol_dir {
        config.protocol_dir = Some(dir);
    }
    if args.skip_seed {
        config.seed_example = false;
    }

    let db_path = config.db_path();
    info!(
        db_path = %db_path.display(),
        http_port = config.http_port,
        "Starting mojify"
    );

    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let db = Arc::new(ArenaDb::open(&db_path)?);

    if config.seed_example {
        match db.with_conn_mut(seed_live_battle_example) {
            Ok(true) => {}
            Ok(false) => info!("Live battle example already present"),
            Err(e) => warn!(error = %e, "Failed to seed live battle example"),
        }
    }

    let services = Arc::new(Services::new(
        db.clone(),
        &ServicesConfig {
            frontend_url: config.frontend_url.clone(),
        },
    ));

    // Index whatever is already stored, then keep it fresh from events
    if let Err(e) = services.search.rebuild() {
        warn!(error = %e, "Initial search index build failed");
    }
    let listeners = services.spawn_listeners();

    let protocol = ProtocolDocs::new(config.app_url.clone(), config.protocol_dir.clone());
    let http_server = Arc::new(HttpServer::new(services.clone(), protocol, config.bind_addr()));

    info!("HTTP API available at http://{}", config.bind_addr());
    info!("Press Ctrl+C to stop.");

    // Handle shutdown signal
    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down...");
    };

    tokio::select! {
        result = http_server.run() => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server error");
            }
        }
        _ = shutdown => {}
    }

    for handle in listeners {
        handle.abort();
    }

    if let Ok(stats) = db.stats() {
        info!(
            agents = stats.agents,
            prompts = stats.prompts,
            votes = stats.votes,
            "Final arena stats"
        );
    }

    Ok(())
}
