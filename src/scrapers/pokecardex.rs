//! Pokecardex catalogue search (Magento storefront)

use anyhow::Result;
use async_trait::async_trait;
use scraper::Html;

use crate::fetcher::PageFetcher;
use crate::models::Observation;
use crate::scrapers::build_observations;
use crate::scrapers::html::{CompiledSelectors, SiteSelectors, extract_listings, stock_from_label};
use crate::traits::{AdapterConfig, SiteAdapter};

const SELECTORS: SiteSelectors = SiteSelectors {
    item: ".product-item, .item.product, .product-miniature, li.item",
    name: ".product-item-name a, .product-name a, h2 a, .name a",
    price: "span[data-price-amount], .price, .product-price",
    image: "img.product-image-photo, img",
    stock_label: Some(".stock, .availability"),
    out_of_stock: None,
    add_to_cart: None,
};

pub struct PokecardexAdapter {
    fetcher: PageFetcher,
    config: AdapterConfig,
    selectors: CompiledSelectors,
}

impl PokecardexAdapter {
    pub fn new(fetcher: PageFetcher) -> Result<Self> {
        let config = AdapterConfig {
            name: "Pokecardex".to_string(),
            base_url: "https://www.pokecardex.com".to_string(),
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
        build_observations(self, listings, |listing, price| {
            stock_from_label(listing.stock_label.as_deref(), price)
        })
    }
}

#[async_trait]
impl SiteAdapter for PokecardexAdapter {
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
