//! UltraJeux search results.
//!
//! The listing grid is parsed first. Some result pages render the grid
//! client-side and only ship the products as JSON-LD, so that blob is read
//! when the grid yields nothing.

use anyhow::Result;
use async_trait::async_trait;
use scraper::Html;
use tracing::debug;

use crate::fetcher::PageFetcher;
use crate::models::Observation;
use crate::normalize::detect_release_code;
use crate::scrapers::build_observations;
use crate::scrapers::html::{CompiledSelectors, SiteSelectors, extract_listings, stock_from_label};
use crate::scrapers::jsonld;
use crate::traits::{AdapterConfig, SiteAdapter};

const SELECTORS: SiteSelectors = SiteSelectors {
    item: ".product-block, .product-item, .recherche_produit, .product_list_item",
    name: "a.product-name, h3 a, .name a, a[title]",
    price: ".price, .product-price, .prix",
    image: "img",
    stock_label: Some(".availability, .stock"),
    out_of_stock: None,
    add_to_cart: None,
};

pub struct UltraJeuxAdapter {
    fetcher: PageFetcher,
    config: AdapterConfig,
    selectors: CompiledSelectors,
}

impl UltraJeuxAdapter {
    pub fn new(fetcher: PageFetcher) -> Result<Self> {
        let config = AdapterConfig {
            name: "UltraJeux".to_string(),
            base_url: "https://www.ultrajeux.com".to_string(),
            franchise_keywords: vec![
                "one piece".into(),
                "op-".into(),
                "op0".into(),
                "display".into(),
            ],
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
        let observations = build_observations(self, listings, |listing, price| {
            stock_from_label(listing.stock_label.as_deref(), price)
        });
        if !observations.is_empty() {
            return observations;
        }

        debug!("no listing grid on {} page, reading JSON-LD", self.config.name);
        self.parse_structured_data(&document)
    }

    fn parse_structured_data(&self, document: &Html) -> Vec<Observation> {
        jsonld::extract_products(document)
            .into_iter()
            .filter(|product| self.matches_franchise(&product.name))
            .map(|product| Observation {
                url: self.absolute_url(&product.url),
                image_url: product.image.as_deref().map(|src| self.absolute_url(src)),
                release_code: detect_release_code(&product.name),
                in_stock: product.in_stock.unwrap_or(product.price.is_some()),
                price: product.price,
                name: product.name,
            })
            .collect()
    }
}

#[async_trait]
impl SiteAdapter for UltraJeuxAdapter {
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
