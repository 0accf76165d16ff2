//! Traits and interfaces for source-agnostic scraping

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Observation;

/// Static description of a storefront adapter
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Display name for the storefront
    pub name: String,
    /// Origin prefixed to relative links, without trailing slash
    pub base_url: String,
    /// Lowercase terms a listing name must contain to be kept by the adapter
    pub franchise_keywords: Vec<String>,
}

/// Translates one storefront page into canonical observations
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    /// Get the configuration for this adapter
    fn config(&self) -> &AdapterConfig;

    /// Fetch `query_url` and extract every listing on it
    ///
    /// # Returns
    /// * `Result<Vec<Observation>>` - Listings found; an unreachable page yields an empty list
    async fn scrape(&self, query_url: &str) -> Result<Vec<Observation>>;

    /// Resolve a possibly relative link against the storefront origin
    fn absolute_url(&self, href: &str) -> String {
        let href = href.trim();
        if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else if let Some(rest) = href.strip_prefix("//") {
            format!("https://{rest}")
        } else if href.starts_with('/') {
            format!("{}{}", self.config().base_url, href)
        } else {
            format!("{}/{}", self.config().base_url, href)
        }
    }

    /// Whether a listing name belongs to the monitored franchise
    fn matches_franchise(&self, name: &str) -> bool {
        let lowered = name.to_lowercase();
        self.config()
            .franchise_keywords
            .iter()
            .any(|kw| lowered.contains(kw.as_str()))
    }
}
