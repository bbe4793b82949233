use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use prospect_common::Config;
use prospect_scout::fetcher::{build_http_client, HttpCandidateFetcher};
use prospect_scout::refresh::ScheduledRefresh;
use prospect_scout::scheduling::{RefreshScheduler, TimeBudget};
use prospect_scout::store::PgStore;
use prospect_scout::traits::{ProspectReader, RefreshLogStore};

#[derive(Parser)]
#[command(name = "scout", about = "Scheduled prospect intelligence refresh")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one scheduled refresh batch and print the summary.
    Run,
    /// Show which prospects the next run would pick, without fetching.
    Plan,
    /// Apply database migrations.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("prospect=info".parse()?))
        .init();

    let cli = Cli::parse();

    let config = Config::from_env();
    config.log_redacted();

    let store = Arc::new(PgStore::connect(&config.database_url).await?);

    match cli.command {
        Command::Migrate => {
            store.migrate().await?;
            info!("Migrations applied");
        }
        Command::Plan => {
            let roster = store.active_prospects().await?;
            let log = store.load_all().await?;
            let capacity = TimeBudget::start(&config.refresh).batch_capacity();
            let scheduler = RefreshScheduler::from_settings(&config.refresh)
                .with_batch_size(capacity.min(config.refresh.batch_size));
            let plan = scheduler.plan(roster, &log, Utc::now());

            println!(
                "{} prospects, {} eligible, {} recently refreshed",
                plan.total, plan.eligible, plan.fresh
            );
            for (i, s) in plan.selected.iter().enumerate() {
                let last = s
                    .last_refresh
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "{:>3}. {} [{}] last refreshed {}",
                    i + 1,
                    s.prospect.company,
                    s.prospect.status,
                    last
                );
            }
        }
        Command::Run => {
            let client = build_http_client(Duration::from_secs(config.fetcher_timeout_secs))?;
            let fetcher = HttpCandidateFetcher::new(
                client,
                config.require_fetcher_url()?,
                Some(config.fetcher_api_key.as_str()),
            );
            let refresh = ScheduledRefresh::builder()
                .prospects(store.clone())
                .items(store.clone())
                .run_log(store.clone())
                .fetcher(Arc::new(fetcher))
                .settings(config.refresh.clone())
                .build();

            // Ctrl-C stops the batch before the next prospect; finished work stays logged.
            let cancel = refresh.cancel_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, stopping after the current prospect");
                    cancel.store(true, Ordering::Relaxed);
                }
            });

            let summary = refresh.run().await?;
            info!("Scheduled refresh finished. {summary}");
        }
    }

    Ok(())
}
