//! Generic PrestaShop storefront (Philibert, LudiCorner, Dernier Bastion).
//!
//! PrestaShop 1.7 themes serialize the product presenter into a `data-product`
//! attribute on each miniature. That payload is read first; themes that do not
//! expose it are parsed from their HTML.

use anyhow::Result;
use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::fetcher::PageFetcher;
use crate::models::Observation;
use crate::normalize::{detect_release_code, parse_price};
use crate::scrapers::build_observations;
use crate::scrapers::html::{CompiledSelectors, RawListing, SiteSelectors, extract_listings, stock_from_label};
use crate::traits::{AdapterConfig, SiteAdapter};

const SELECTORS: SiteSelectors = SiteSelectors {
    item: ".product-miniature, .product-container, .product_list_item, .product-item",
    name: ".product-title a, h3 a, .name a, a.product-name",
    price: "span[itemprop=\"price\"], .price, .product-price",
    image: "img",
    stock_label: Some(".availability, .stock, .product-availability"),
    out_of_stock: Some(".out-of-stock, .unavailable, .rupture"),
    add_to_cart: Some(".add-to-cart, [data-button-action=\"add-to-cart\"]"),
};

const DATA_PRODUCT: &str = "[data-product]";

/// The subset of the PrestaShop product presenter we rely on
#[derive(Debug, Deserialize)]
struct PresentedProduct {
    name: String,
    /// PrestaShop sends both; `url` is canonical
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    price_amount: Option<f64>,
    #[serde(default)]
    price: Option<Value>,
    #[serde(default)]
    cover: Option<Value>,
    #[serde(default)]
    availability: Option<String>,
    #[serde(default)]
    add_to_cart_url: Option<String>,
}

pub struct PrestashopAdapter {
    fetcher: PageFetcher,
    config: AdapterConfig,
    selectors: CompiledSelectors,
    data_product: Selector,
}

impl PrestashopAdapter {
    pub fn new(fetcher: PageFetcher, name: &str, base_url: &str) -> Result<Self> {
        let config = AdapterConfig {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            franchise_keywords: vec![
                "one piece".into(),
                "op-".into(),
                "op0".into(),
                "display".into(),
            ],
        };
        let data_product = Selector::parse(DATA_PRODUCT)
            .map_err(|e| anyhow::anyhow!("Failed to parse data-product selector: {e:?}"))?;

        Ok(Self {
            fetcher,
            config,
            selectors: CompiledSelectors::compile(&SELECTORS)?,
            data_product,
        })
    }

    pub fn parse_page(&self, html: &str) -> Vec<Observation> {
        let document = Html::parse_document(html);

        let structured = self.parse_data_attributes(&document);
        if !structured.is_empty() {
            return structured;
        }

        let listings = extract_listings(&document, &self.selectors);
        build_observations(self, listings, classify_listing)
    }

    fn parse_data_attributes(&self, document: &Html) -> Vec<Observation> {
        let mut observations = Vec::new();

        for element in document.select(&self.data_product) {
            let Some(raw) = element.value().attr("data-product") else {
                continue;
            };
            let product: PresentedProduct = match serde_json::from_str(raw) {
                Ok(product) => product,
                Err(e) => {
                    warn!(source = %self.config.name, error = %e, "skipping unreadable data-product payload");
                    continue;
                }
            };
            let Some(url) = product
                .url
                .iter()
                .chain(product.link.iter())
                .map(|u| u.trim())
                .find(|u| !u.is_empty())
                .map(str::to_string)
            else {
                continue;
            };
            if !self.matches_franchise(&product.name) {
                continue;
            }

            let price = product.price_amount.or_else(|| match &product.price {
                Some(Value::Number(n)) => n.as_f64(),
                Some(Value::String(s)) => parse_price(s),
                _ => None,
            });
            let in_stock = match product.availability.as_deref() {
                Some("unavailable") => false,
                Some("available" | "last_remaining_items") => true,
                _ if product.add_to_cart_url.is_some() => true,
                _ => price.is_some(),
            };

            observations.push(Observation {
                url: self.absolute_url(&url),
                image_url: product
                    .cover
                    .as_ref()
                    .and_then(cover_url)
                    .map(|src| self.absolute_url(&src)),
                release_code: detect_release_code(&product.name),
                name: product.name,
                price,
                in_stock,
            });
        }

        observations
    }
}

/// Explicit out-of-stock markup, then the purchase button, then the label,
/// then whether a price is shown at all.
fn classify_listing(listing: &RawListing, price: Option<f64>) -> bool {
    if listing.out_of_stock_marker {
        return false;
    }
    if let Some(enabled) = listing.add_to_cart {
        return enabled;
    }
    stock_from_label(listing.stock_label.as_deref(), price)
}

/// `cover` is either `{"large": {"url": ..}}`, `{"bySize": {..}}` or `{"url": ..}`
fn cover_url(cover: &Value) -> Option<String> {
    ["large", "medium", "home_default"]
        .into_iter()
        .find_map(|size| cover.get(size).and_then(|s| s.get("url")))
        .or_else(|| cover.get("bySize").and_then(|sizes| {
            sizes
                .get("home_default")
                .or_else(|| sizes.get("large_default"))
                .and_then(|s| s.get("url"))
        }))
        .or_else(|| cover.get("url"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl SiteAdapter for PrestashopAdapter {
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
