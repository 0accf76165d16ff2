//! Cardmarket booster box listings

use anyhow::Result;
use async_trait::async_trait;
use scraper::Html;

use crate::fetcher::PageFetcher;
use crate::models::Observation;
use crate::scrapers::build_observations;
use crate::scrapers::html::{CompiledSelectors, SiteSelectors, extract_listings};
use crate::traits::{AdapterConfig, SiteAdapter};

const SELECTORS: SiteSelectors = SiteSelectors {
    item: ".table-body .row, .col-12.col-md-8, .product-card",
    name: "a[href*=\"/Products/\"], a.name",
    price: ".price-container span, .col-price span, .price",
    image: "img",
    stock_label: None,
    out_of_stock: None,
    add_to_cart: None,
};

/// Marketplace rows carry no availability markup: a row with a positive
/// price has at least one seller offering it.
pub struct CardmarketAdapter {
    fetcher: PageFetcher,
    config: AdapterConfig,
    selectors: CompiledSelectors,
}

impl CardmarketAdapter {
    pub fn new(fetcher: PageFetcher) -> Result<Self> {
        let config = AdapterConfig {
            name: "Cardmarket".to_string(),
            base_url: "https://www.cardmarket.com".to_string(),
            franchise_keywords: vec!["one piece".into(), "op-".into(), "op0".into()],
        };

        Ok(Self {
            fetcher,
            config,
            selectors: CompiledSelectors::compile(&SELECTORS)?,
        })
    }

    pub fn parse_page(&self, html: &str) -> Vec<Observation> {
        let document = Html::parse_document(html);
        let listings = extract_listings(&document, &self.selectors);
        build_observations(self, listings, |_, price| price.is_some_and(|p| p > 0.0))
    }
}

#[async_trait]
impl SiteAdapter for CardmarketAdapter {
    fn config(&self) -> &AdapterConfig {
        &self.config
    }

    async fn scrape(&self, query_url: &str) -> Result<Vec<Observation>> {
        let Some(html) = self.fetcher.fetch_html(query_url).await else {
            return Ok(Vec::new());
        };
        Ok(self.parse_page(&html))
    }
}
