//! Data models for storefronts, scraped observations, and the price-history store

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A monitored storefront, read from the `sites` table at the start of each scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub base_url: String,
    /// Query URLs polled in order during a scan
    pub search_urls: Vec<String>,
    pub enabled: bool,
}

/// A storefront to provision into an empty store
#[derive(Debug, Clone)]
pub struct NewSource {
    pub name: String,
    pub slug: String,
    pub base_url: String,
    pub search_urls: Vec<String>,
    pub enabled: bool,
}

/// One candidate listing extracted from a page. Never persisted as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub name: String,
    pub price: Option<f64>,
    pub in_stock: bool,
    /// Absolute product URL, the deduplication key once persisted
    pub url: String,
    pub image_url: Option<String>,
    /// Release code such as `OP05`, detected from the name
    pub release_code: Option<String>,
}

/// A persisted product, one row per canonical URL
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub site_id: i64,
    pub name: String,
    #[sqlx(rename = "set_code")]
    pub release_code: Option<String>,
    pub url: String,
    /// Empty until some observation carries an image
    pub image_url: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// One immutable price/stock sample for a product
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PriceHistoryEntry {
    pub id: i64,
    pub product_id: i64,
    pub price: Option<f64>,
    pub in_stock: bool,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    #[default]
    Idle,
    Running,
    Completed,
    Aborted,
}

impl ScanPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }
}

impl FromStr for ScanPhase {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "aborted" => Ok(Self::Aborted),
            other => Err(anyhow::anyhow!("unknown scan phase {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Ok,
    NoAdapter,
}

/// Outcome of scanning one source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceResult {
    pub status: SourceStatus,
    /// Observations persisted successfully
    pub saved: usize,
    /// Observations returned by the adapter before the category filter
    pub found: usize,
    /// Observations that passed the category filter
    pub passed_filter: usize,
}

impl SourceResult {
    pub fn no_adapter() -> Self {
        Self {
            status: SourceStatus::NoAdapter,
            saved: 0,
            found: 0,
            passed_filter: 0,
        }
    }
}

/// In-memory status of the current or last scan, handed out as a copy
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanStatus {
    pub phase: ScanPhase,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub results: BTreeMap<String, SourceResult>,
    pub running: bool,
}

/// A recorded scan cycle from the `scan_log` table
#[derive(Debug, Clone, Serialize)]
pub struct ScanRun {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub phase: ScanPhase,
    pub results: BTreeMap<String, SourceResult>,
}

/// Dashboard figures computed over each product's latest sample
#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub total_products: i64,
    pub in_stock: i64,
    pub out_of_stock: i64,
    pub enabled_sources: i64,
    pub avg_price: Option<f64>,
    pub best_price: Option<f64>,
}
