use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use op_stock_monitor::config::{self, Config};
use op_stock_monitor::fetcher::PageFetcher;
use op_stock_monitor::{AdapterRegistry, Database, StockMonitor};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("op_stock_monitor=info,warn")),
        )
        .init();

    info!("Starting OP Stock Monitor v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    let database = Database::new(&config.database_url).await?;
    database.seed_sources(&config::default_sources()).await?;

    let fetcher = PageFetcher::new(&config.fetch)?;
    let registry = AdapterRegistry::with_defaults(&fetcher)?;
    info!("Adapters registered: {}", registry.slugs().join(", "));

    let monitor = StockMonitor::new(database, registry, config.scan.clone());

    // Run once immediately
    if monitor.run_scan().await.is_none() {
        error!("Initial scan did not start");
    }

    let sched = JobScheduler::new().await?;

    let job_monitor = monitor.clone();
    sched
        .add(Job::new_repeated_async(config.scan_interval(), move |_uuid, _l| {
            let monitor = job_monitor.clone();
            Box::pin(async move {
                monitor.run_scan().await;
            })
        })?)
        .await?;

    info!(
        "Scheduler started - scanning every {} minutes",
        config.scan_interval().as_secs() / 60
    );
    sched.start().await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    Ok(())
}
