//! Storefront adapters and the slug → adapter registry

pub mod cardmarket;
pub mod html;
pub mod jsonld;
pub mod pokecardex;
pub mod prestashop;
pub mod shopify;
pub mod ultrajeux;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tracing::warn;

use crate::fetcher::PageFetcher;
use crate::models::Observation;
use crate::normalize::{detect_release_code, parse_price};
use crate::traits::SiteAdapter;

use cardmarket::CardmarketAdapter;
use html::RawListing;
use pokecardex::PokecardexAdapter;
use prestashop::PrestashopAdapter;
use shopify::ShopifyAdapter;
use ultrajeux::UltraJeuxAdapter;

/// Adapters keyed by source slug
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn SiteAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with an adapter for every storefront we know how to read
    pub fn with_defaults(fetcher: &PageFetcher) -> Result<Self> {
        let mut registry = Self::new();

        registry.register("cardmarket", Arc::new(CardmarketAdapter::new(fetcher.clone())?));
        registry.register("pokecardex", Arc::new(PokecardexAdapter::new(fetcher.clone())?));
        registry.register("ultrajeux", Arc::new(UltraJeuxAdapter::new(fetcher.clone())?));

        for (slug, name, origin) in [
            ("philibert", "Philibert", "https://www.philibert.net"),
            ("ludicorner", "LudiCorner", "https://www.ludicorner.com"),
            ("dernier-bastion", "Dernier Bastion", "https://www.dernierbastion.fr"),
        ] {
            registry.register(
                slug,
                Arc::new(PrestashopAdapter::new(fetcher.clone(), name, origin)?),
            );
        }

        registry.register(
            "tcg-corner",
            Arc::new(ShopifyAdapter::new(
                fetcher.clone(),
                "TCG Corner",
                "https://www.tcg-corner.fr",
            )),
        );

        Ok(registry)
    }

    pub fn register(&mut self, slug: &str, adapter: Arc<dyn SiteAdapter>) {
        self.adapters.insert(slug.to_string(), adapter);
    }

    pub fn get(&self, slug: &str) -> Option<Arc<dyn SiteAdapter>> {
        self.adapters.get(slug).cloned()
    }

    pub fn slugs(&self) -> Vec<&str> {
        let mut slugs: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        slugs.sort_unstable();
        slugs
    }
}

/// Turn extracted listings into observations.
///
/// Malformed listings are logged and skipped, listings outside the franchise
/// are dropped, and `classify` decides stock from the listing and its price.
pub(crate) fn build_observations<A, F>(
    adapter: &A,
    listings: Vec<Result<RawListing>>,
    classify: F,
) -> Vec<Observation>
where
    A: SiteAdapter + ?Sized,
    F: Fn(&RawListing, Option<f64>) -> bool,
{
    let mut observations = Vec::new();

    for listing in listings {
        let listing = match listing {
            Ok(listing) => listing,
            Err(e) => {
                warn!(source = %adapter.config().name, error = %e, "skipping malformed listing");
                continue;
            }
        };
        if !adapter.matches_franchise(&listing.name) {
            continue;
        }

        let price = listing.price_text.as_deref().and_then(parse_price);
        let in_stock = classify(&listing, price);

        observations.push(Observation {
            url: adapter.absolute_url(&listing.href),
            image_url: listing.image.as_deref().map(|src| adapter.absolute_url(src)),
            release_code: detect_release_code(&listing.name),
            name: listing.name,
            price,
            in_stock,
        });
    }

    observations
}
