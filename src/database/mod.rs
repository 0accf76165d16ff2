use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, Sqlite, SqlitePool, migrate::MigrateDatabase};
use tracing::{info, warn};

use crate::models::{
    NewSource, Observation, PriceHistoryEntry, Product, ScanPhase, ScanRun, Source, SourceResult,
    Stats,
};

/// Joins each product to its most recent price sample
const LATEST_SAMPLE_JOIN: &str = r"
    JOIN price_history ph ON ph.id = (
        SELECT id FROM price_history
        WHERE product_id = p.id
        ORDER BY checked_at DESC, id DESC
        LIMIT 1
    )";

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        // Create database file if it doesn't exist
        if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            if let Some(parent) = sqlite_file_path(db_url).and_then(Path::parent)
                && !parent.as_os_str().is_empty()
            {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            info!("Creating database file");
            Sqlite::create_database(db_url).await?;
        }

        let pool = SqlitePool::connect(db_url).await?;
        Self::migrate(pool).await
    }

    /// Private store living as long as the returned handle, for tests
    pub async fn in_memory() -> Result<Self> {
        // A single, never-recycled connection: each new connection would get a fresh database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::migrate(pool).await
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(pool: SqlitePool) -> Result<Self> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("Database initialized successfully");
        Ok(Self { pool })
    }

    /// Provision `sources` when no storefront is configured yet.
    /// Returns how many were inserted.
    pub async fn seed_sources(&self, sources: &[NewSource]) -> Result<usize> {
        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sites")
            .fetch_one(&self.pool)
            .await?;
        if existing > 0 {
            return Ok(0);
        }

        for source in sources {
            self.insert_source(source).await?;
        }
        info!("Seeded {} sources", sources.len());
        Ok(sources.len())
    }

    pub async fn insert_source(&self, source: &NewSource) -> Result<i64> {
        let search_urls = serde_json::to_string(&source.search_urls)?;

        let id = sqlx::query(
            r"
            INSERT INTO sites (name, slug, url, search_urls, enabled)
            VALUES (?, ?, ?, ?, ?)
            ",
        )
        .bind(&source.name)
        .bind(&source.slug)
        .bind(&source.base_url)
        .bind(search_urls)
        .bind(source.enabled)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(id)
    }

    /// Enabled storefronts in provisioning order
    pub async fn enabled_sources(&self) -> Result<Vec<Source>> {
        let rows = sqlx::query(
            "SELECT id, name, slug, url, search_urls, enabled FROM sites WHERE enabled = 1 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let sources = rows
            .into_iter()
            .map(|row| {
                let slug = row.get::<String, _>("slug");
                let raw_urls = row.get::<Option<String>, _>("search_urls").unwrap_or_default();
                let search_urls = if raw_urls.trim().is_empty() {
                    Vec::new()
                } else {
                    serde_json::from_str(&raw_urls).unwrap_or_else(|e| {
                        warn!(source = %slug, error = %e, "unreadable search_urls, skipping them");
                        Vec::new()
                    })
                };

                Source {
                    id: row.get("id"),
                    name: row.get("name"),
                    base_url: row.get("url"),
                    enabled: row.get("enabled"),
                    slug,
                    search_urls,
                }
            })
            .collect();

        Ok(sources)
    }

    /// Upsert the product behind `observation` by URL and append one price sample.
    ///
    /// Both writes share one transaction. An empty release code or image never
    /// replaces a stored one.
    pub async fn save_observation(
        &self,
        site_id: i64,
        observation: &Observation,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        let url = observation.url.trim();
        if url.is_empty() {
            bail!("observation {:?} has no URL", observation.name);
        }
        let release_code = observation.release_code.as_deref().unwrap_or("");
        let image_url = observation.image_url.as_deref().unwrap_or("");

        let mut tx = self.pool.begin().await?;

        let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM products WHERE url = ?")
            .bind(url)
            .fetch_optional(&mut *tx)
            .await?;

        let product_id = if let Some(id) = existing {
            sqlx::query(
                r"
                UPDATE products
                SET name = ?,
                    set_code = COALESCE(NULLIF(?, ''), set_code),
                    image_url = COALESCE(NULLIF(?, ''), image_url),
                    last_seen = ?
                WHERE id = ?
                ",
            )
            .bind(&observation.name)
            .bind(release_code)
            .bind(image_url)
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?;
            id
        } else {
            sqlx::query(
                r"
                INSERT INTO products (site_id, name, set_code, url, image_url, first_seen, last_seen)
                VALUES (?, ?, NULLIF(?, ''), ?, ?, ?, ?)
                ",
            )
            .bind(site_id)
            .bind(&observation.name)
            .bind(release_code)
            .bind(url)
            .bind(image_url)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid()
        };

        sqlx::query("INSERT INTO price_history (product_id, price, in_stock, checked_at) VALUES (?, ?, ?, ?)")
            .bind(product_id)
            .bind(observation.price)
            .bind(observation.in_stock)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(product_id)
    }

    pub async fn record_scan_run(
        &self,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        phase: ScanPhase,
        results: &BTreeMap<String, SourceResult>,
    ) -> Result<i64> {
        let id = sqlx::query(
            "INSERT INTO scan_log (started_at, finished_at, phase, results) VALUES (?, ?, ?, ?)",
        )
        .bind(started_at)
        .bind(finished_at)
        .bind(phase.as_str())
        .bind(serde_json::to_string(results)?)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(id)
    }

    pub async fn scan_runs(&self) -> Result<Vec<ScanRun>> {
        let rows = sqlx::query("SELECT id, started_at, finished_at, phase, results FROM scan_log ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| -> Result<ScanRun> {
                Ok(ScanRun {
                    id: row.get("id"),
                    started_at: row.get("started_at"),
                    finished_at: row.get("finished_at"),
                    phase: row.get::<String, _>("phase").parse()?,
                    results: serde_json::from_str(&row.get::<String, _>("results"))?,
                })
            })
            .collect()
    }

    pub async fn product_by_url(&self, url: &str) -> Result<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    pub async fn products(&self) -> Result<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>("SELECT * FROM products ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    /// Every sample for a product, oldest first
    pub async fn price_history(&self, product_id: i64) -> Result<Vec<PriceHistoryEntry>> {
        let history = sqlx::query_as::<_, PriceHistoryEntry>(
            "SELECT * FROM price_history WHERE product_id = ? ORDER BY checked_at, id",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(history)
    }

    /// Current price and stock of a product: its most recent sample
    pub async fn latest_snapshot(&self, product_id: i64) -> Result<Option<PriceHistoryEntry>> {
        let latest = sqlx::query_as::<_, PriceHistoryEntry>(
            "SELECT * FROM price_history WHERE product_id = ? ORDER BY checked_at DESC, id DESC LIMIT 1",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(latest)
    }

    /// Distinct release codes seen so far
    pub async fn release_codes(&self) -> Result<Vec<String>> {
        let codes = sqlx::query_scalar(
            "SELECT DISTINCT set_code FROM products WHERE set_code IS NOT NULL ORDER BY set_code",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(codes)
    }

    pub async fn stats(&self) -> Result<Stats> {
        let total_products: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        let in_stock: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(DISTINCT p.id) FROM products p {LATEST_SAMPLE_JOIN} WHERE ph.in_stock = 1"
        ))
        .fetch_one(&self.pool)
        .await?;

        let enabled_sources: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sites WHERE enabled = 1")
            .fetch_one(&self.pool)
            .await?;

        let row = sqlx::query(&format!(
            "SELECT AVG(ph.price) AS avg_price, MIN(ph.price) AS best_price FROM products p {LATEST_SAMPLE_JOIN}
             WHERE ph.in_stock = 1 AND ph.price IS NOT NULL"
        ))
        .fetch_one(&self.pool)
        .await?;

        Ok(Stats {
            total_products,
            in_stock,
            out_of_stock: total_products - in_stock,
            enabled_sources,
            avg_price: row
                .get::<Option<f64>, _>("avg_price")
                .map(|avg| (avg * 100.0).round() / 100.0),
            best_price: row.get("best_price"),
        })
    }
}

/// Filesystem path behind a `sqlite:` URL, if it names a file
fn sqlite_file_path(db_url: &str) -> Option<&Path> {
    let rest = db_url
        .strip_prefix("sqlite://")
        .or_else(|| db_url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path.starts_with(":memory:") {
        None
    } else {
        Some(Path::new(path))
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn store_with_source() -> (Database, i64) {
        let db = Database::in_memory().await.unwrap();
        let site_id = db
            .insert_source(&NewSource {
                name: "Philibert".to_string(),
                slug: "philibert".to_string(),
                base_url: "https://www.philibert.net".to_string(),
                search_urls: vec!["https://www.philibert.net/search".to_string()],
                enabled: true,
            })
            .await
            .unwrap();
        (db, site_id)
    }

    fn observation(url: &str) -> Observation {
        Observation {
            name: "Display One Piece OP-10 Royal Blood".to_string(),
            price: Some(119.9),
            in_stock: true,
            url: url.to_string(),
            image_url: Some("https://cdn.example/op10.jpg".to_string()),
            release_code: Some("OP10".to_string()),
        }
    }

    #[test]
    fn sqlite_paths() {
        assert_eq!(sqlite_file_path("sqlite:data/app.db"), Some(Path::new("data/app.db")));
        assert_eq!(
            sqlite_file_path("sqlite://data/app.db?mode=rwc"),
            Some(Path::new("data/app.db"))
        );
        assert_eq!(sqlite_file_path("sqlite::memory:"), None);
        assert_eq!(sqlite_file_path("postgres://x"), None);
    }

    #[tokio::test]
    async fn enabled_sources_decode_search_urls() {
        let (db, site_id) = store_with_source().await;
        db.insert_source(&NewSource {
            name: "Off".to_string(),
            slug: "off".to_string(),
            base_url: "https://off.example".to_string(),
            search_urls: Vec::new(),
            enabled: false,
        })
        .await
        .unwrap();

        let sources = db.enabled_sources().await.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].id, site_id);
        assert_eq!(sources[0].slug, "philibert");
        assert_eq!(sources[0].search_urls, vec!["https://www.philibert.net/search"]);
    }

    #[tokio::test]
    async fn seeding_only_fills_an_empty_store() {
        let db = Database::in_memory().await.unwrap();
        let defaults = crate::config::default_sources();

        assert_eq!(db.seed_sources(&defaults).await.unwrap(), defaults.len());
        assert_eq!(db.seed_sources(&defaults).await.unwrap(), 0);
        assert_eq!(db.enabled_sources().await.unwrap().len(), defaults.len());
    }

    #[tokio::test]
    async fn upsert_keeps_one_product_per_url_and_appends_history() {
        let (db, site_id) = store_with_source().await;
        let t0 = Utc::now();
        let t1 = t0 + Duration::minutes(15);

        let first = db.save_observation(site_id, &observation("https://x/op10"), t0).await.unwrap();
        let mut again = observation("https://x/op10");
        again.name = "Display OP10".to_string();
        again.in_stock = false;
        let second = db.save_observation(site_id, &again, t1).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(db.products().await.unwrap().len(), 1);

        let product = db.product_by_url("https://x/op10").await.unwrap().unwrap();
        assert_eq!(product.name, "Display OP10");
        assert_eq!(product.first_seen, t0);
        assert_eq!(product.last_seen, t1);

        let history = db.price_history(product.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].in_stock);
        assert!(!history[1].in_stock);

        let latest = db.latest_snapshot(product.id).await.unwrap().unwrap();
        assert_eq!(latest.checked_at, t1);
        assert!(!latest.in_stock);
    }

    #[tokio::test]
    async fn empty_code_and_image_do_not_erase_stored_values() {
        let (db, site_id) = store_with_source().await;
        let now = Utc::now();
        db.save_observation(site_id, &observation("https://x/a"), now).await.unwrap();

        let mut bare = observation("https://x/a");
        bare.release_code = None;
        bare.image_url = Some(String::new());
        db.save_observation(site_id, &bare, now).await.unwrap();

        let product = db.product_by_url("https://x/a").await.unwrap().unwrap();
        assert_eq!(product.release_code.as_deref(), Some("OP10"));
        assert_eq!(product.image_url, "https://cdn.example/op10.jpg");
    }

    #[tokio::test]
    async fn non_empty_code_and_image_overwrite() {
        let (db, site_id) = store_with_source().await;
        let now = Utc::now();
        db.save_observation(site_id, &observation("https://x/b"), now).await.unwrap();

        let mut updated = observation("https://x/b");
        updated.release_code = Some("OP09".to_string());
        updated.image_url = Some("https://cdn.example/new.jpg".to_string());
        db.save_observation(site_id, &updated, now).await.unwrap();

        let product = db.product_by_url("https://x/b").await.unwrap().unwrap();
        assert_eq!(product.release_code.as_deref(), Some("OP09"));
        assert_eq!(product.image_url, "https://cdn.example/new.jpg");
    }

    #[tokio::test]
    async fn observation_without_url_is_rejected() {
        let (db, site_id) = store_with_source().await;
        let result = db.save_observation(site_id, &observation("  "), Utc::now()).await;
        assert!(result.is_err());
        assert!(db.products().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stats_use_latest_sample() {
        let (db, site_id) = store_with_source().await;
        let t0 = Utc::now();
        let t1 = t0 + Duration::minutes(15);

        let mut cheap = observation("https://x/cheap");
        cheap.price = Some(100.0);
        db.save_observation(site_id, &cheap, t0).await.unwrap();
        cheap.in_stock = false;
        db.save_observation(site_id, &cheap, t1).await.unwrap();

        let mut pricey = observation("https://x/pricey");
        pricey.price = Some(130.0);
        db.save_observation(site_id, &pricey, t1).await.unwrap();

        let mut other = observation("https://x/other");
        other.price = Some(120.0);
        other.release_code = None;
        db.save_observation(site_id, &other, t1).await.unwrap();

        let stats = db.stats().await.unwrap();
        assert_eq!(stats.total_products, 3);
        assert_eq!(stats.in_stock, 2);
        assert_eq!(stats.out_of_stock, 1);
        assert_eq!(stats.enabled_sources, 1);
        assert_eq!(stats.best_price, Some(120.0));
        assert_eq!(stats.avg_price, Some(125.0));

        assert_eq!(db.release_codes().await.unwrap(), vec!["OP10".to_string()]);
    }

    #[tokio::test]
    async fn scan_runs_round_trip_results() {
        let db = Database::in_memory().await.unwrap();
        let started = Utc::now();
        let mut results = BTreeMap::new();
        results.insert("ultrajeux".to_string(), SourceResult::no_adapter());

        db.record_scan_run(started, started + Duration::seconds(5), ScanPhase::Completed, &results)
            .await
            .unwrap();

        let runs = db.scan_runs().await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].phase, ScanPhase::Completed);
        assert_eq!(runs[0].results, results);
    }
}
