//! schema.org `Product` extraction from `application/ld+json` script blobs

use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde_json::Value;

static SCRIPT_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("valid script selector")
});

/// A product as declared in structured data
#[derive(Debug, Clone, PartialEq)]
pub struct JsonLdProduct {
    pub name: String,
    pub url: String,
    pub image: Option<String>,
    pub price: Option<f64>,
    /// `Some` when the offer declares an availability
    pub in_stock: Option<bool>,
}

/// Collect every `Product` from the page's JSON-LD blocks.
///
/// Accepts top-level objects, arrays, `@graph` containers and `ItemList`
/// wrappers. Blocks that fail to parse are skipped.
pub fn extract_products(document: &Html) -> Vec<JsonLdProduct> {
    let mut products = Vec::new();

    for script in document.select(&SCRIPT_SELECTOR) {
        let text = script.text().collect::<String>();
        let Ok(value) = serde_json::from_str::<Value>(text.trim()) else {
            continue;
        };
        collect(&value, &mut products);
    }

    products
}

fn collect(value: &Value, out: &mut Vec<JsonLdProduct>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| collect(item, out)),
        Value::Object(map) => {
            if let Some(graph) = map.get("@graph") {
                collect(graph, out);
            }
            if let Some(elements) = map.get("itemListElement") {
                collect(elements, out);
            }
            // ListItem wrappers carry the product under `item`
            if let Some(item) = map.get("item") {
                collect(item, out);
            }
            if has_type(value, "Product")
                && let Some(product) = to_product(value)
            {
                out.push(product);
            }
        }
        _ => {}
    }
}

fn has_type(value: &Value, wanted: &str) -> bool {
    match value.get("@type") {
        Some(Value::String(s)) => s.eq_ignore_ascii_case(wanted),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .any(|s| s.eq_ignore_ascii_case(wanted)),
        _ => false,
    }
}

fn to_product(value: &Value) -> Option<JsonLdProduct> {
    let name = value.get("name")?.as_str()?.trim().to_string();
    let url = value
        .get("url")
        .or_else(|| value.get("@id"))?
        .as_str()?
        .trim()
        .to_string();
    if name.is_empty() || url.is_empty() {
        return None;
    }

    let image = value.get("image").and_then(image_url);

    // `offers` may be one Offer, a list, or an AggregateOffer
    let offer = match value.get("offers") {
        Some(Value::Array(offers)) => offers.first(),
        other => other,
    };
    let price = offer.and_then(|o| {
        o.get("price")
            .or_else(|| o.get("lowPrice"))
            .and_then(number_or_string)
    });
    let in_stock = offer
        .and_then(|o| o.get("availability"))
        .and_then(Value::as_str)
        .map(availability_in_stock);

    Some(JsonLdProduct {
        name,
        url,
        image,
        price,
        in_stock,
    })
}

fn image_url(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(image_url),
        Value::Object(map) => map.get("url").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn number_or_string(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(crate::normalize::parse_price))
}

fn availability_in_stock(availability: &str) -> bool {
    let kind = availability.rsplit('/').next().unwrap_or(availability);
    matches!(
        kind,
        "InStock" | "InStoreOnly" | "OnlineOnly" | "LimitedAvailability" | "PreOrder" | "PreSale"
    )
}
