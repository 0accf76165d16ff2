//! Runtime configuration, read from the environment after `.env` is loaded

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::models::NewSource;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const ACCEPT_LANGUAGE: &str = "fr-FR,fr;q=0.9,en;q=0.5";

/// HTTP policy for the page fetcher
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub timeout: Duration,
    /// Extra attempts after a failed fetch. Zero keeps a single request per URL.
    pub retries: u32,
    pub backoff: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retries: 0,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Scan pacing
#[derive(Debug, Clone)]
pub struct ScanSettings {
    /// Pause after each query URL
    pub pause: Duration,
    /// Minimum gap between the end of a scan and the next manual trigger
    pub cooldown: Duration,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            pause: Duration::from_secs(2),
            cooldown: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub scan_interval_minutes: u32,
    pub fetch: FetchSettings,
    pub scan: ScanSettings,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:data/app.db".to_string());

        Ok(Self {
            database_url,
            scan_interval_minutes: env_or("SCAN_INTERVAL", 15)?,
            fetch: FetchSettings {
                timeout: Duration::from_secs(env_or("REQUEST_TIMEOUT", 30)?),
                retries: env_or("FETCH_RETRIES", 0)?,
                backoff: Duration::from_millis(env_or("FETCH_BACKOFF_MS", 500)?),
            },
            scan: ScanSettings {
                pause: Duration::from_millis(env_or("SCAN_PAUSE_MS", 2000)?),
                cooldown: Duration::from_secs(env_or("SCAN_COOLDOWN_SECS", 60)?),
            },
        })
    }

    /// Gap between scheduled scans, at least one minute
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.scan_interval_minutes.max(1)) * 60)
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        Err(_) => Ok(default),
    }
}

/// Storefronts provisioned into an empty store
pub fn default_sources() -> Vec<NewSource> {
    let source = |name: &str, slug: &str, base_url: &str, search_url: &str| NewSource {
        name: name.to_string(),
        slug: slug.to_string(),
        base_url: base_url.to_string(),
        search_urls: vec![search_url.to_string()],
        enabled: true,
    };

    vec![
        source(
            "Cardmarket",
            "cardmarket",
            "https://www.cardmarket.com",
            "https://www.cardmarket.com/fr/OnePiece/Products/Booster-Boxes",
        ),
        source(
            "Pokecardex",
            "pokecardex",
            "https://www.pokecardex.com",
            "https://www.pokecardex.com/catalogsearch/result/?q=display+one+piece",
        ),
        source(
            "UltraJeux",
            "ultrajeux",
            "https://www.ultrajeux.com",
            "https://www.ultrajeux.com/recherche.php?search=display+one+piece",
        ),
        source(
            "Philibert",
            "philibert",
            "https://www.philibert.net",
            "https://www.philibert.net/fr/recherche?controller=search&s=display+one+piece",
        ),
        source(
            "LudiCorner",
            "ludicorner",
            "https://www.ludicorner.com",
            "https://www.ludicorner.com/recherche?controller=search&s=display+one+piece",
        ),
        source(
            "Dernier Bastion",
            "dernier-bastion",
            "https://www.dernierbastion.fr",
            "https://www.dernierbastion.fr/recherche?controller=search&s=display+one+piece",
        ),
        source(
            "TCG Corner",
            "tcg-corner",
            "https://www.tcg-corner.fr",
            "https://www.tcg-corner.fr/collections/one-piece/products.json?limit=250",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_interval(minutes: u32) -> Config {
        Config {
            database_url: "sqlite::memory:".to_string(),
            scan_interval_minutes: minutes,
            fetch: FetchSettings::default(),
            scan: ScanSettings::default(),
        }
    }

    #[test]
    fn scan_interval_is_exact_in_minutes() {
        assert_eq!(with_interval(15).scan_interval(), Duration::from_secs(15 * 60));
        assert_eq!(with_interval(45).scan_interval(), Duration::from_secs(45 * 60));
        assert_eq!(with_interval(60).scan_interval(), Duration::from_secs(3600));
        assert_eq!(with_interval(120).scan_interval(), Duration::from_secs(7200));
    }

    #[test]
    fn zero_interval_is_raised_to_one_minute() {
        assert_eq!(with_interval(0).scan_interval(), Duration::from_secs(60));
    }

    #[test]
    fn default_sources_have_unique_slugs() {
        let sources = default_sources();
        let mut slugs: Vec<_> = sources.iter().map(|s| s.slug.as_str()).collect();
        slugs.sort_unstable();
        slugs.dedup();
        assert_eq!(slugs.len(), sources.len());
    }
}
