//! Selector-driven listing extraction shared by the HTML adapters

use anyhow::{Result, anyhow};
use scraper::{ElementRef, Html, Selector};

/// CSS selectors for the parts of a product listing
#[derive(Debug, Clone)]
pub struct SiteSelectors {
    /// Container selector for one listing
    pub item: &'static str,
    /// Link carrying the product name and URL, within the item
    pub name: &'static str,
    pub price: &'static str,
    pub image: &'static str,
    /// Free-text availability label (optional)
    pub stock_label: Option<&'static str>,
    /// Markup only present on unavailable listings (optional)
    pub out_of_stock: Option<&'static str>,
    /// Purchase button (optional)
    pub add_to_cart: Option<&'static str>,
}

pub struct CompiledSelectors {
    item: Selector,
    name: Selector,
    price: Selector,
    image: Selector,
    stock_label: Option<Selector>,
    out_of_stock: Option<Selector>,
    add_to_cart: Option<Selector>,
}

impl CompiledSelectors {
    pub fn compile(selectors: &SiteSelectors) -> Result<Self> {
        Ok(Self {
            item: parse_selector(selectors.item)?,
            name: parse_selector(selectors.name)?,
            price: parse_selector(selectors.price)?,
            image: parse_selector(selectors.image)?,
            stock_label: selectors.stock_label.map(parse_selector).transpose()?,
            out_of_stock: selectors.out_of_stock.map(parse_selector).transpose()?,
            add_to_cart: selectors.add_to_cart.map(parse_selector).transpose()?,
        })
    }
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Failed to parse selector {css:?}: {e:?}"))
}

/// Raw fields of one listing before any normalization
#[derive(Debug, Clone, Default)]
pub struct RawListing {
    pub name: String,
    pub href: String,
    pub price_text: Option<String>,
    pub image: Option<String>,
    pub stock_label: Option<String>,
    pub out_of_stock_marker: bool,
    /// `Some(enabled)` when a purchase button is present
    pub add_to_cart: Option<bool>,
}

/// Split a document into listings.
///
/// Items without a name link are not listings and are dropped silently; items
/// whose name link is unusable come back as `Err` so callers can log and skip them.
pub fn extract_listings(document: &Html, selectors: &CompiledSelectors) -> Vec<Result<RawListing>> {
    document
        .select(&selectors.item)
        .filter_map(|item| parse_listing(item, selectors).transpose())
        .collect()
}

fn parse_listing(item: ElementRef<'_>, selectors: &CompiledSelectors) -> Result<Option<RawListing>> {
    let Some(name_el) = item.select(&selectors.name).next() else {
        return Ok(None);
    };

    let name = element_text(name_el);
    if name.is_empty() {
        return Err(anyhow!("listing link has no text"));
    }
    let href = name_el
        .value()
        .attr("href")
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or_else(|| anyhow!("listing {name:?} has no link"))?
        .to_string();

    let price_text = item
        .select(&selectors.price)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty());

    let image = item
        .select(&selectors.image)
        .next()
        .and_then(lazy_image_src)
        .map(str::to_string);

    let stock_label = selectors
        .stock_label
        .as_ref()
        .and_then(|sel| item.select(sel).next())
        .map(element_text);

    let out_of_stock_marker = selectors
        .out_of_stock
        .as_ref()
        .is_some_and(|sel| item.select(sel).next().is_some());

    let add_to_cart = selectors
        .add_to_cart
        .as_ref()
        .and_then(|sel| item.select(sel).next())
        .map(|button| {
            let el = button.value();
            el.attr("disabled").is_none() && !el.classes().any(|c| c == "disabled")
        });

    Ok(Some(RawListing {
        name,
        href,
        price_text,
        image,
        stock_label,
        out_of_stock_marker,
        add_to_cart,
    }))
}

/// Visible text of an element with whitespace collapsed
pub fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Image source, preferring lazy-load attributes over `src`.
/// Inline `data:` placeholders are ignored.
pub fn lazy_image_src(img: ElementRef<'_>) -> Option<&str> {
    let el = img.value();
    ["data-src", "data-lazy-src", "data-original", "src"]
        .into_iter()
        .filter_map(|attr| el.attr(attr))
        .map(str::trim)
        .find(|src| !src.is_empty() && !src.starts_with("data:"))
}

const OUT_OF_STOCK_TERMS: &[&str] = &[
    "rupture",
    "indisponible",
    "épuisé",
    "epuise",
    "plus disponible",
    "out of stock",
    "sold out",
    "sur commande",
];

const IN_STOCK_TERMS: &[&str] = &[
    "en stock",
    "disponible",
    "précommande",
    "precommande",
    "in stock",
    "available",
];

/// Read an availability label. `None` when the label carries no known term.
pub fn label_in_stock(label: &str) -> Option<bool> {
    let lowered = label.to_lowercase();
    if OUT_OF_STOCK_TERMS.iter().any(|t| lowered.contains(t)) {
        Some(false)
    } else if IN_STOCK_TERMS.iter().any(|t| lowered.contains(t)) {
        Some(true)
    } else {
        None
    }
}

/// Stock from an availability label, falling back to whether a price is shown.
/// A label with no out-of-stock term counts as in stock.
pub fn stock_from_label(label: Option<&str>, price: Option<f64>) -> bool {
    match label {
        Some(label) => label_in_stock(label).unwrap_or(true),
        None => price.is_some(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SELECTORS: SiteSelectors = SiteSelectors {
        item: ".product",
        name: "a.name",
        price: ".price",
        image: "img",
        stock_label: Some(".stock"),
        out_of_stock: Some(".out-of-stock"),
        add_to_cart: Some("button.add"),
    };

    fn listings(html: &str) -> Vec<Result<RawListing>> {
        let compiled = CompiledSelectors::compile(&SELECTORS).unwrap();
        extract_listings(&Html::parse_document(html), &compiled)
    }

    #[test]
    fn extracts_all_fields() {
        let html = r#"
            <div class="product">
              <a class="name" href="/p/1">  Display   OP05 </a>
              <span class="price">109,90 €</span>
              <img src="/placeholder.gif" data-src="/img/op05.jpg">
              <p class="stock">En stock</p>
              <button class="add" disabled>Ajouter</button>
            </div>"#;
        let found = listings(html);
        assert_eq!(found.len(), 1);
        let listing = found[0].as_ref().unwrap();
        assert_eq!(listing.name, "Display OP05");
        assert_eq!(listing.href, "/p/1");
        assert_eq!(listing.price_text.as_deref(), Some("109,90 €"));
        assert_eq!(listing.image.as_deref(), Some("/img/op05.jpg"));
        assert_eq!(listing.stock_label.as_deref(), Some("En stock"));
        assert!(!listing.out_of_stock_marker);
        assert_eq!(listing.add_to_cart, Some(false));
    }

    #[test]
    fn items_without_name_are_dropped_and_broken_items_reported() {
        let html = r#"
            <div class="product"><span>ad slot</span></div>
            <div class="product"><a class="name">No link</a></div>
            <div class="product"><a class="name" href="/ok">Display OP01</a></div>"#;
        let found = listings(html);
        assert_eq!(found.len(), 2);
        assert!(found[0].is_err());
        assert_eq!(found[1].as_ref().unwrap().href, "/ok");
    }

    #[test]
    fn data_uri_placeholders_are_skipped() {
        let html = r#"
            <div class="product">
              <a class="name" href="/p">Display</a>
              <img data-src="data:image/gif;base64,AAAA" src="/real.jpg">
            </div>"#;
        let found = listings(html);
        assert_eq!(found[0].as_ref().unwrap().image.as_deref(), Some("/real.jpg"));
    }

    #[test]
    fn stock_labels() {
        assert_eq!(label_in_stock("Rupture de stock"), Some(false));
        assert_eq!(label_in_stock("Produit indisponible"), Some(false));
        assert_eq!(label_in_stock("Épuisé"), Some(false));
        assert_eq!(label_in_stock("En stock"), Some(true));
        assert_eq!(label_in_stock("Précommande"), Some(true));
        assert_eq!(label_in_stock("Livraison 48h"), None);
    }

    #[test]
    fn unknown_label_counts_as_in_stock() {
        assert!(stock_from_label(Some("Livraison 48h"), None));
        assert!(!stock_from_label(Some("Rupture"), Some(99.9)));
        assert!(stock_from_label(None, Some(99.9)));
        assert!(!stock_from_label(None, None));
    }
}
