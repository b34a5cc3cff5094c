//! rifa-daemon - reservation expiry sweeper.
//!
//! Opens the shared store and runs the expiry sweep on a fixed interval,
//! reclaiming reserved orders whose deadline passed before a receipt
//! arrived. The deadline is advisory data; this loop is what actually
//! releases the tickets, so reclamation is at-least-once rather than
//! real-time.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use rifa_core::config::DaemonConfig;
use rifa_core::notify::LogNotifier;
use rifa_core::order::OrderEngine;
use rifa_core::store::Store;
use rifa_core::sweeper::ExpirySweeper;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// rifa daemon - raffle reservation sweeper
#[derive(Parser, Debug)]
#[command(name = "rifa-daemon")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "rifa.toml")]
    config: PathBuf,

    /// Path to the SQLite database (overrides the config file)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Seconds between sweep passes (overrides the config file)
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Run a single sweep pass and exit
    #[arg(long)]
    once: bool,
}

fn load_config(args: &Args) -> Result<DaemonConfig> {
    let mut config = if args.config.exists() {
        DaemonConfig::from_file(&args.config)
            .with_context(|| format!("loading config from {}", args.config.display()))?
    } else if let Some(db) = &args.db {
        // No config file needed when the database is given on the
        // command line.
        DaemonConfig {
            db_path: db.clone(),
            sweep_interval_secs: rifa_core::config::DEFAULT_SWEEP_INTERVAL_SECS,
            log_filter: "info".to_string(),
        }
    } else {
        anyhow::bail!(
            "config file {} not found and no --db given",
            args.config.display()
        );
    };

    if let Some(db) = &args.db {
        config.db_path.clone_from(db);
    }
    if let Some(interval) = args.interval_secs {
        config.sweep_interval_secs = interval;
    }
    // CLI overrides bypass the constructor's checks; re-validate before
    // the interval reaches the timer.
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let store = Arc::new(
        Store::open(&config.db_path)
            .with_context(|| format!("opening store at {}", config.db_path.display()))?,
    );
    let engine = OrderEngine::new(store, Arc::new(LogNotifier));
    let sweeper = ExpirySweeper::new(engine);

    if args.once {
        let report = sweeper.sweep(Utc::now().timestamp())?;
        info!(?report, "single sweep pass done");
        return Ok(());
    }

    info!(
        db = %config.db_path.display(),
        interval_secs = config.sweep_interval_secs,
        "sweeper started"
    );

    let mut ticker = tokio::time::interval(config.sweep_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // One failure must not stop the loop; the next tick
                // retries the whole scan.
                if let Err(err) = sweeper.sweep(Utc::now().timestamp()) {
                    error!(%err, "sweep pass failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    Ok(())
}
