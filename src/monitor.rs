//! Scan orchestration: one pass over every enabled storefront.
//!
//! A scan moves `Idle → Running → Completed | Aborted`. The running flag is
//! only flipped under the status mutex, so at most one scan runs at a time.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::ScanSettings;
use crate::database::Database;
use crate::models::{Observation, ScanPhase, ScanStatus, Source, SourceResult, SourceStatus};
use crate::normalize::fits_category;
use crate::scrapers::AdapterRegistry;

/// Why a scan request was declined. Neither case is a failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TriggerError {
    #[error("a scan is already running")]
    AlreadyRunning,
    #[error("last scan finished too recently, retry in {remaining_secs}s")]
    CoolingDown { remaining_secs: u64 },
}

#[derive(Clone)]
pub struct StockMonitor {
    database: Database,
    registry: AdapterRegistry,
    settings: ScanSettings,
    status: Arc<Mutex<ScanStatus>>,
}

impl StockMonitor {
    pub fn new(database: Database, registry: AdapterRegistry, settings: ScanSettings) -> Self {
        Self {
            database,
            registry,
            settings,
            status: Arc::new(Mutex::new(ScanStatus::default())),
        }
    }

    /// Copy of the current scan status
    pub async fn status(&self) -> ScanStatus {
        self.status.lock().await.clone()
    }

    /// Scheduled entry point: run a scan to completion unless one is in progress.
    ///
    /// Returns the final status, or `None` when another scan was already running.
    /// The scan runs in its own task: dropping this future does not abandon it.
    pub async fn run_scan(&self) -> Option<ScanStatus> {
        if let Err(e) = self.begin(None).await {
            warn!("Skipping scheduled scan: {e}");
            return None;
        }

        let monitor = self.clone();
        match tokio::spawn(async move { monitor.execute().await }).await {
            Ok(status) => Some(status),
            Err(e) => {
                error!("Scan task failed: {e}");
                Some(self.status().await)
            }
        }
    }

    /// Manual entry point: start a scan in the background.
    ///
    /// Declined while a scan is running or within the cooldown after the last one.
    pub async fn trigger_scan(&self) -> Result<JoinHandle<ScanStatus>, TriggerError> {
        self.begin(Some(self.settings.cooldown)).await?;

        let monitor = self.clone();
        Ok(tokio::spawn(async move { monitor.execute().await }))
    }

    /// Idle → Running, atomically
    async fn begin(&self, cooldown: Option<Duration>) -> Result<(), TriggerError> {
        let mut status = self.status.lock().await;

        if status.running {
            return Err(TriggerError::AlreadyRunning);
        }
        if let Some(cooldown) = cooldown
            && let Some(finished_at) = status.finished_at
        {
            let elapsed = (Utc::now() - finished_at).to_std().unwrap_or_default();
            if elapsed < cooldown {
                let remaining = cooldown - elapsed;
                return Err(TriggerError::CoolingDown {
                    remaining_secs: remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0),
                });
            }
        }

        status.running = true;
        status.phase = ScanPhase::Running;
        status.started_at = Some(Utc::now());
        status.finished_at = None;
        status.results.clear();
        Ok(())
    }

    /// Run the scan body, record the run, then release the running flag.
    async fn execute(&self) -> ScanStatus {
        let started_at = self.status.lock().await.started_at.unwrap_or_else(Utc::now);
        info!("=== Scan started ===");

        // The body runs in its own task so that even a panic lands here
        let monitor = self.clone();
        let phase = match tokio::spawn(async move { monitor.scan_sources().await }).await {
            Ok(Ok(())) => ScanPhase::Completed,
            Ok(Err(e)) => {
                error!("Scan aborted: {e:#}");
                ScanPhase::Aborted
            }
            Err(e) => {
                error!("Scan aborted, task failed: {e}");
                ScanPhase::Aborted
            }
        };

        let finished_at = Utc::now();
        let results = self.status.lock().await.results.clone();
        if let Err(e) = self
            .database
            .record_scan_run(started_at, finished_at, phase, &results)
            .await
        {
            error!("Failed to record scan run: {e:#}");
        }

        let snapshot = {
            let mut status = self.status.lock().await;
            status.phase = phase;
            status.finished_at = Some(finished_at);
            status.running = false;
            status.clone()
        };

        self.log_summary(&snapshot, started_at, finished_at).await;
        snapshot
    }

    async fn scan_sources(&self) -> Result<()> {
        let sources = self.database.enabled_sources().await?;
        info!("Scanning {} enabled sources", sources.len());

        for source in sources {
            let result = self.scan_source(&source).await;
            self.status.lock().await.results.insert(source.slug, result);
        }

        Ok(())
    }

    async fn scan_source(&self, source: &Source) -> SourceResult {
        let Some(adapter) = self.registry.get(&source.slug) else {
            warn!(source = %source.slug, "No adapter registered");
            return SourceResult::no_adapter();
        };

        info!("Scanning {}...", source.name);
        let mut found: Vec<Observation> = Vec::new();

        for url in &source.search_urls {
            let task_adapter = Arc::clone(&adapter);
            let task_url = url.clone();
            match tokio::spawn(async move { task_adapter.scrape(&task_url).await }).await {
                Ok(Ok(observations)) => {
                    info!(source = %source.slug, "  {url} -> {} products", observations.len());
                    found.extend(observations);
                }
                Ok(Err(e)) => error!(source = %source.slug, "  Error on {url}: {e:#}"),
                Err(e) => error!(source = %source.slug, "  Adapter failed on {url}: {e}"),
            }

            tokio::time::sleep(self.settings.pause).await;
        }

        let total_found = found.len();
        let passing: Vec<Observation> = found
            .into_iter()
            .filter(|observation| fits_category(&observation.name))
            .collect();

        let mut saved = 0;
        for observation in &passing {
            match self
                .database
                .save_observation(source.id, observation, Utc::now())
                .await
            {
                Ok(_) => saved += 1,
                Err(e) => error!(source = %source.slug, "  Failed to save {:?}: {e:#}", observation.name),
            }
        }

        info!(
            "  {}: {saved}/{} saved ({total_found} found)",
            source.name,
            passing.len()
        );

        SourceResult {
            status: SourceStatus::Ok,
            saved,
            found: total_found,
            passed_filter: passing.len(),
        }
    }

    async fn log_summary(
        &self,
        status: &ScanStatus,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) {
        let saved: usize = status.results.values().map(|r| r.saved).sum();
        info!(
            "=== Scan {} in {}s: {saved} observations saved across {} sources ===",
            status.phase.as_str(),
            (finished_at - started_at).num_seconds(),
            status.results.len()
        );

        match self.database.stats().await {
            Ok(stats) => info!(
                "{} products tracked, {} in stock, best price {:?}",
                stats.total_products, stats.in_stock, stats.best_price
            ),
            Err(e) => warn!("Could not compute stats: {e:#}"),
        }
    }
}
