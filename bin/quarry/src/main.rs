//! Quarry - Ethereum chain importer.
//!
//! # Usage
//!
//! ```bash
//! # Start with default config
//! quarry
//!
//! # Start with environment overrides
//! DATABASE_URL=postgres://localhost DATABASE_NAME=chain_explorer RPC_URL=http://localhost:8545 quarry
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal;
use tokio::sync::watch;
use tracing::{debug, error, info, info_span, warn};
use tracing_subscriber::{EnvFilter, fmt};
use url::Url;

use quarry_core::metrics::init_metrics;
use quarry_core::services::{ImportCoordinator, ImporterState};
use quarry_node::{EventMux, RpcBlockFeed, RpcFeedConfig};
use quarry_storage::{Database, DatabaseConfig, PgGateway};

/// Quarry CLI - Ethereum chain importer.
#[derive(Parser, Debug)]
#[command(name = "quarry")]
#[command(about = "Quarry - imports Ethereum blocks and transactions into PostgreSQL")]
#[command(version)]
struct Cli {
    /// PostgreSQL database URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost/chain_explorer"
    )]
    database_url: String,

    /// Database name. Overrides the database in the URL when set.
    #[arg(long, env = "DATABASE_NAME")]
    database_name: Option<String>,

    /// Ethereum node HTTP JSON-RPC URL.
    #[arg(long, env = "RPC_URL", default_value = "http://127.0.0.1:8545")]
    rpc_url: Url,

    /// Delay between chain head polls, in milliseconds.
    #[arg(long, env = "POLL_INTERVAL_MS", default_value = "2000")]
    poll_interval_ms: u64,

    /// Events buffered between the block feed and the importer.
    #[arg(long, env = "CHANNEL_CAPACITY", default_value = "64")]
    channel_capacity: usize,

    /// Prometheus metrics port.
    #[arg(long, env = "METRICS_PORT", default_value = "9090")]
    metrics_port: u16,

    /// Enable JSON log output.
    #[arg(long, env = "JSON_LOGS")]
    json_logs: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Run database migrations and exit.
    #[arg(long)]
    migrate_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);

    // Prometheus metrics exporter (optional - failures don't crash the app)
    let metrics_addr = SocketAddr::from(([0, 0, 0, 0], cli.metrics_port));
    let metrics_enabled = match PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
    {
        Ok(()) => {
            init_metrics();
            true
        }
        Err(e) => {
            warn!("⚠️  Failed to start metrics exporter: {}. Continuing without metrics.", e);
            false
        }
    };

    // ─────────────────────────────────────────────────────────────────────────
    // 🚀 STARTUP
    // ─────────────────────────────────────────────────────────────────────────
    info!("🚀 Starting Quarry importer");
    debug!(rpc_url = %cli.rpc_url, "Node endpoint");
    debug!(
        database_url = %mask_password(&cli.database_url),
        database = ?cli.database_name,
        "Database endpoint"
    );

    // ─────────────────────────────────────────────────────────────────────────
    // 🗄️ DATABASE
    // ─────────────────────────────────────────────────────────────────────────
    let db_config = DatabaseConfig::for_importer(&cli.database_url, cli.database_name.as_deref());

    info!("🗄️  Connecting to database...");
    let db = Database::connect(&db_config)
        .await
        .context("Failed to connect to database")?;

    db.migrate().await.context("Failed to run migrations")?;
    info!("🗄️  Database ready (migrations applied)");

    if cli.migrate_only {
        info!("🛑 --migrate-only flag set, exiting");
        db.close().await;
        return Ok(());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // ⛓️ IMPORTER
    // ─────────────────────────────────────────────────────────────────────────
    let mux = Arc::new(EventMux::with_capacity(cli.channel_capacity));
    let importer = ImportCoordinator::new(mux.clone(), PgGateway::new(&db), info_span!("importer"));
    let mut importer_state = importer.watch_state();
    let mut importer_handle = tokio::spawn(async move { importer.run().await });

    // The mux drops events while nobody is subscribed; wait for the importer
    // before the feed starts posting.
    tokio::select! {
        biased;
        joined = &mut importer_handle => {
            db.close().await;
            return match joined {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e).context("Importer failed to start"),
                Err(e) => Err(e).context("Importer task failed"),
            };
        }
        ready = importer_state.wait_for(|state| *state == ImporterState::Running) => {
            ready.map_err(|_| anyhow!("Importer stopped before subscribing"))?;
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 📡 BLOCK FEED
    // ─────────────────────────────────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let feed_config = RpcFeedConfig::new(cli.rpc_url.clone())
        .with_poll_interval(Duration::from_millis(cli.poll_interval_ms));
    let feed = RpcBlockFeed::new(feed_config, mux.clone());
    let feed_handle = tokio::spawn(feed.run(shutdown_rx));

    // ─────────────────────────────────────────────────────────────────────────
    // ✅ READY
    // ─────────────────────────────────────────────────────────────────────────
    info!("✅ Quarry ready");
    info!("   📡 Node:     {}", cli.rpc_url);
    if metrics_enabled {
        info!(
            "   📊 Metrics:  http://localhost:{}/metrics",
            cli.metrics_port
        );
    } else {
        info!("   📊 Metrics:  disabled");
    }
    info!("   Press Ctrl+C to stop");

    let halted = tokio::select! {
        joined = &mut importer_handle => Some(joined),
        _ = shutdown_signal() => None,
    };

    let joined = match halted {
        Some(joined) => joined,
        None => {
            // ─────────────────────────────────────────────────────────────────
            // 🛑 SHUTDOWN
            // ─────────────────────────────────────────────────────────────────
            info!("🛑 Shutting down...");
            let _ = shutdown_tx.send(true);

            match tokio::time::timeout(Duration::from_secs(30), &mut importer_handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!("⚠️  Importer shutdown timed out");
                    importer_handle.abort();
                    Ok(Ok(()))
                }
            }
        }
    };

    // The feed may still be running when the importer halted on its own.
    let _ = shutdown_tx.send(true);
    match tokio::time::timeout(Duration::from_secs(10), feed_handle).await {
        Ok(_) => debug!("Block feed stopped"),
        Err(_) => warn!("⚠️  Block feed shutdown timed out"),
    }

    db.close().await;

    match joined {
        Ok(Ok(())) => {
            info!("🛑 Shutdown complete");
            Ok(())
        }
        Ok(Err(e)) => {
            error!(error = %e, "❌ Importer stopped on a fatal error");
            Err(e).context("Importer halted")
        }
        Err(e) => Err(e).context("Importer task failed"),
    }
}

/// Initialize tracing subscriber.
fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .init();
    }
}

/// Mask password in database URL for logging.
fn mask_password(url_str: &str) -> String {
    match Url::parse(url_str) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("****"));
            }
            url.to_string()
        }
        Err(_) => url_str.to_string(),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_password_hides_secret() {
        let masked = mask_password("postgres://quarry:hunter2@db:5432/chain_explorer");
        assert!(!masked.contains("hunter2"));
        assert!(masked.contains("quarry:****@db"));
    }

    #[test]
    fn test_mask_password_leaves_other_urls() {
        assert_eq!(
            mask_password("postgres://localhost/chain_explorer"),
            "postgres://localhost/chain_explorer"
        );
        assert_eq!(mask_password("not a url"), "not a url");
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "quarry",
            "--database-url",
            "postgres://db/other",
            "--database-name",
            "chain_explorer",
            "--rpc-url",
            "http://node:8545",
            "--poll-interval-ms",
            "500",
            "--channel-capacity",
            "8",
            "--migrate-only",
        ])
        .unwrap();

        assert_eq!(cli.database_name.as_deref(), Some("chain_explorer"));
        assert_eq!(cli.rpc_url.as_str(), "http://node:8545/");
        assert_eq!(cli.poll_interval_ms, 500);
        assert_eq!(cli.channel_capacity, 8);
        assert!(cli.migrate_only);
    }
}
