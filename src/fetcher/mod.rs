//! Page fetcher: one bounded GET per URL with a fixed browser identity.
//!
//! Failures never escape this layer. Transport errors, timeouts and non-success
//! statuses are logged and surface as `None`.

use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use tracing::{debug, warn};

use crate::config::{self, FetchSettings};

/// What the caller expects back, used to pick the `Accept` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Json,
}

impl ContentKind {
    fn accept(self) -> &'static str {
        match self {
            Self::Html => "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            Self::Json => "application/json,text/javascript;q=0.9,*/*;q=0.8",
        }
    }
}

pub struct PageFetcher {
    client: Client,
    retries: u32,
    backoff: Duration,
}

impl PageFetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static(config::ACCEPT_LANGUAGE),
        );

        let client = Client::builder()
            .user_agent(config::USER_AGENT)
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()?;

        Ok(Self {
            client,
            retries: settings.retries,
            backoff: settings.backoff,
        })
    }

    /// Fetch the body at `url`, or `None` on any failure
    pub async fn fetch(&self, url: &str, kind: ContentKind) -> Option<String> {
        let mut attempt = 0u32;

        loop {
            match self.fetch_once(url, kind).await {
                Ok(body) => return Some(body),
                Err(e) if attempt < self.retries => {
                    let delay = self.backoff.saturating_mul(1u32 << attempt.min(16));
                    warn!(url = %url, attempt, error = %e, "fetch failed, retrying in {delay:?}");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "fetch failed");
                    return None;
                }
            }
        }
    }

    pub async fn fetch_html(&self, url: &str) -> Option<String> {
        self.fetch(url, ContentKind::Html).await
    }

    /// Fetch and decode a JSON document. A body that is not JSON counts as no content.
    pub async fn fetch_json(&self, url: &str) -> Option<serde_json::Value> {
        let body = self.fetch(url, ContentKind::Json).await?;
        match serde_json::from_str(&body) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(url = %url, error = %e, "response is not valid JSON");
                None
            }
        }
    }

    async fn fetch_once(&self, url: &str, kind: ContentKind) -> Result<String> {
        debug!(url = %url, "fetching");

        let response = self
            .client
            .get(url)
            .header(ACCEPT, kind.accept())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Failed to fetch {}: {}",
                url,
                response.status()
            ));
        }

        Ok(response.text().await?)
    }
}

impl Clone for PageFetcher {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            retries: self.retries,
            backoff: self.backoff,
        }
    }
}
