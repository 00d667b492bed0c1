//! Surge Tracker Service
//!
//! Main entry point for the surge tracker.
//! - `serve` runs the scheduler (daily collection, weekly ticker sync) until Ctrl+C
//! - the other subcommands trigger one job and print the admin response
//! - `--dry-run` swaps Postgres for an in-memory store; provider calls still happen

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use surge_tracker::database::{create_pool, run_migrations};
use surge_tracker::market_data::PolygonClient;
use surge_tracker::rate_limiter::TokenBucket;
use surge_tracker::services::AdminResponse;
use surge_tracker::store::{MarketStore, MemoryStore, PgMarketStore};
use surge_tracker::{AppConfig, AppState};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "surge-tracker",
    about = "Daily US equity surge detection and post-surge tracking"
)]
struct Cli {
    /// Keep everything in memory instead of Postgres. Nothing is persisted.
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler until interrupted.
    Serve,
    /// Detect surges for one day and update post-surge tracking.
    Collect {
        /// Trading date (YYYY-MM-DD). Defaults to today (UTC).
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Detect surges for every weekday in a range.
    Backfill {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
    /// Store grouped daily bars for every weekday in a range, skipping stored dates.
    BulkDownload {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
    /// Page through the provider's ticker directory.
    SyncTickers,
    /// Fetch details for tickers never enriched.
    EnrichTickers,
    /// Download dividends.
    Dividends,
    /// Download stock splits.
    Splits,
    /// Print the latest ledger row and table totals.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables first
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let config = AppConfig::from_env()
        .map_err(anyhow::Error::msg)
        .context("Configuration error")?;

    // Initialize tracing/logging with config
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("surge_tracker={},sqlx=warn", config.log_level).into());
    if config.is_production() {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Environment: {}", config.environment);

    // =========================================================================
    // DATABASE SETUP
    // =========================================================================
    let pool = if cli.dry_run {
        info!("Dry run: using the in-memory store, no database connection");
        None
    } else {
        let pool = create_pool(&config.database)
            .await
            .context("Failed to create database pool")?;
        info!(
            "Database pool ready (max connections: {})",
            config.database.max_connections
        );

        run_migrations(&pool)
            .await
            .context("Database migration failed")?;
        Some(pool)
    };

    // =========================================================================
    // PROVIDER + SERVICES
    // =========================================================================
    // One limiter per process: every job shares the provider's request budget
    let limiter = Arc::new(
        TokenBucket::new(config.provider.max_tokens, config.provider.refill_rate())
            .context("Invalid rate limiter settings")?,
    );
    let source = Arc::new(PolygonClient::new(&config.provider, limiter)?);
    let store: Arc<dyn MarketStore> = match &pool {
        Some(pool) => Arc::new(PgMarketStore::new(pool.clone())),
        None => Arc::new(MemoryStore::new()),
    };
    let state = AppState::new(&config, source, store);
    info!(
        "Provider client ready ({} requests/minute, burst {})",
        config.provider.requests_per_minute, config.provider.max_tokens
    );

    let admin = state.admin.clone();
    match cli.command {
        Commands::Serve => {
            let scheduler = state.scheduler(&config);
            let handle = tokio::spawn(scheduler.start());

            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for shutdown signal")?;
            info!("Shutdown signal received, stopping scheduler");
            handle.abort();
        }
        Commands::Collect { date } => report(admin.collect(date).await),
        Commands::Backfill { from, to } => report(admin.backfill(from, to).await),
        Commands::BulkDownload { from, to } => report(admin.bulk_download(from, to).await),
        Commands::SyncTickers => report(admin.sync_tickers().await),
        Commands::EnrichTickers => report(admin.enrich_tickers().await),
        Commands::Dividends => report(admin.download_dividends().await),
        Commands::Splits => report(admin.download_splits().await),
        Commands::Status => {
            let status = admin.status().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    if let Some(pool) = pool {
        pool.close().await;
    }
    Ok(())
}

fn report(response: AdminResponse) {
    if let Some(log_id) = response.log_id {
        info!("Ledger row {}", log_id);
    }
    println!("{}", response.message);
}
