//! # Ofertas Bot
//!
//! A batch job that collects the weekly promotional flyers of four
//! supermarkets around Salto (SP), forwards the new ones to a Telegram
//! channel and tells the administrator which markets published anything
//! during the week.
//!
//! ## Usage
//!
//! ```sh
//! ofertas_bot --staging-dir /var/tmp/ofertas
//! ```
//!
//! ## Architecture
//!
//! 1. **Discovery**: site adapters find flyer URLs ([`scrapers`])
//! 2. **Ingestion**: bytes are fingerprinted and deduplicated against Postgres ([`ingest`])
//! 3. **Rasterization**: new PDFs become page images via `pdftoppm` ([`rasterize`])
//! 4. **Delivery**: staged images go to the channel in groups of ten ([`notify`])
//! 5. **Housekeeping**: old fingerprints are pruned and the weekly report is sent

use chrono::Duration;
use clap::Parser;
use std::process::ExitCode;
use std::time::{Duration as StdDuration, Instant};
use tracing::{error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod error;
mod fetch;
mod ingest;
mod models;
mod notify;
mod rasterize;
mod retry;
mod runner;
mod scrapers;
mod staging;
mod store;
mod utils;

use cli::Cli;
use error::Result;
use fetch::HttpFetcher;
use notify::telegram::TelegramBot;
use rasterize::Pdftoppm;
use retry::Backoff;
use runner::{RunConfig, Runner};
use staging::StagingArea;
use store::postgres::PgStore;
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> ExitCode {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let args = Cli::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, kind = e.kind(), "Run aborted");
            ExitCode::FAILURE
        }
    }
}

#[instrument(level = "info", skip_all)]
async fn run(args: Cli) -> Result<()> {
    let start_time = Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "Starting bot");

    let staging = StagingArea::new(&args.staging_dir);
    ensure_writable_dir(staging.root()).await?;
    staging.reset().await?;

    let policy = Backoff::new(
        args.db_max_attempts,
        StdDuration::from_secs(args.db_retry_base_secs),
    );
    let store = PgStore::connect_with_backoff(&args.database_url, &policy).await?;

    let bot = TelegramBot::new(&args.telegram_api_url, &args.telegram_bot_token)?;
    let username = bot.verify().await?;
    info!(bot = %username, "Telegram credential accepted");

    let fetcher = HttpFetcher::new()?;
    let rasterizer = Pdftoppm::new(args.pdftoppm.clone(), args.resolution);

    let runner = Runner {
        fetcher: &fetcher,
        store: &store,
        staging: &staging,
        rasterizer: &rasterizer,
        messenger: &bot,
        config: RunConfig {
            channel_id: args.channel_id,
            admin_chat_id: args.admin_chat_id,
            retention: Duration::days(i64::from(args.retention_days)),
            markets: args.markets(),
            send_report: !args.skip_report,
        },
    };

    let summary = runner.run().await?;

    for (market, outcome) in &summary.sources {
        for failure in &outcome.failures {
            warn!(%market, %failure, "Market had failures");
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        new_flyers = summary.total_new(),
        failed_markets = summary.failed_sources(),
        pruned = summary.pruned,
        report_sent = summary.report_sent,
        "Execution complete"
    );
    Ok(())
}
