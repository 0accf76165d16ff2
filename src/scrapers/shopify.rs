//! Shopify storefronts, read from the public `products.json` collection feed

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::fetcher::PageFetcher;
use crate::models::Observation;
use crate::normalize::{detect_release_code, parse_price};
use crate::traits::{AdapterConfig, SiteAdapter};

/// Top-level response from `GET /collections/<handle>/products.json`
#[derive(Debug, Deserialize)]
pub struct ShopifyProductsResponse {
    pub products: Vec<ShopifyProduct>,
}

#[derive(Debug, Deserialize)]
pub struct ShopifyProduct {
    pub title: String,
    /// URL slug, the product page lives at `/products/<handle>`
    pub handle: String,
    #[serde(default)]
    pub images: Vec<ShopifyImage>,
    #[serde(default)]
    pub variants: Vec<ShopifyVariant>,
}

#[derive(Debug, Deserialize)]
pub struct ShopifyImage {
    pub src: String,
}

#[derive(Debug, Deserialize)]
pub struct ShopifyVariant {
    /// Decimal string such as `"119.90"`
    pub price: String,
    /// Absent on some older themes; treated as available
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

pub struct ShopifyAdapter {
    fetcher: PageFetcher,
    config: AdapterConfig,
}

impl ShopifyAdapter {
    pub fn new(fetcher: PageFetcher, name: &str, base_url: &str) -> Self {
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

        Self { fetcher, config }
    }

    /// Map a decoded feed to observations. Products that do not match the
    /// expected shape are skipped one by one.
    pub fn parse_feed(&self, feed: &serde_json::Value) -> Vec<Observation> {
        let Some(products) = feed.get("products").and_then(serde_json::Value::as_array) else {
            warn!(source = %self.config.name, "feed has no products array");
            return Vec::new();
        };

        products
            .iter()
            .filter_map(|raw| match ShopifyProduct::deserialize(raw) {
                Ok(product) => Some(product),
                Err(e) => {
                    warn!(source = %self.config.name, error = %e, "skipping malformed product");
                    None
                }
            })
            .filter(|product| !product.handle.is_empty() && self.matches_franchise(&product.title))
            .map(|product| self.to_observation(product))
            .collect()
    }

    fn to_observation(&self, product: ShopifyProduct) -> Observation {
        let in_stock = product.variants.iter().any(|v| v.available);
        let variant = product
            .variants
            .iter()
            .find(|v| v.available)
            .or_else(|| product.variants.first());

        Observation {
            url: self.absolute_url(&format!("/products/{}", product.handle)),
            price: variant.and_then(|v| parse_price(&v.price)),
            image_url: product.images.first().map(|img| self.absolute_url(&img.src)),
            release_code: detect_release_code(&product.title),
            name: product.title,
            in_stock,
        }
    }
}

#[async_trait]
impl SiteAdapter for ShopifyAdapter {
    fn config(&self) -> &AdapterConfig {
        &self.config
    }

    async fn scrape(&self, query_url: &str) -> Result<Vec<Observation>> {
        let Some(feed) = self.fetcher.fetch_json(query_url).await else {
            return Ok(Vec::new());
        };
        Ok(self.parse_feed(&feed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchSettings;
    use serde_json::json;

    fn adapter() -> ShopifyAdapter {
        let fetcher = PageFetcher::new(&FetchSettings::default()).unwrap();
        ShopifyAdapter::new(fetcher, "TCG Corner", "https://www.tcg-corner.fr")
    }

    #[test]
    fn maps_products_and_variants() {
        let feed = json!({
            "products": [
                {
                    "title": "Display One Piece OP-07 500 Years in the Future",
                    "handle": "display-op07",
                    "images": [{"src": "//cdn.shopify.com/op07.jpg"}],
                    "variants": [
                        {"price": "139.90", "available": false},
                        {"price": "129.90", "available": true}
                    ]
                },
                {
                    "title": "Display One Piece OP-06",
                    "handle": "display-op06",
                    "images": [],
                    "variants": [{"price": "99.00", "available": false}]
                },
                {
                    "title": "Sleeves Dragon Shield",
                    "handle": "sleeves",
                    "variants": [{"price": "9.90", "available": true}]
                }
            ]
        });

        let found = adapter().parse_feed(&feed);
        assert_eq!(found.len(), 2);

        assert_eq!(found[0].url, "https://www.tcg-corner.fr/products/display-op07");
        assert_eq!(found[0].price, Some(129.90));
        assert!(found[0].in_stock);
        assert_eq!(
            found[0].image_url.as_deref(),
            Some("https://cdn.shopify.com/op07.jpg")
        );
        assert_eq!(found[0].release_code.as_deref(), Some("OP07"));

        assert_eq!(found[1].price, Some(99.0));
        assert!(!found[1].in_stock);
        assert_eq!(found[1].image_url, None);
    }

    #[test]
    fn malformed_products_are_skipped_individually() {
        let feed = json!({
            "products": [
                {"handle": "no-title"},
                {"title": "Display One Piece OP-05", "handle": "display-op05",
                 "variants": [{"price": "89.90"}]}
            ]
        });

        let found = adapter().parse_feed(&feed);
        assert_eq!(found.len(), 1);
        assert!(found[0].in_stock);
    }

    #[test]
    fn feed_without_products_is_empty() {
        assert!(adapter().parse_feed(&json!({"errors": "Not Found"})).is_empty());
    }
}
