use std::sync::LazyLock;

use regex::Regex;

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*)").expect("valid price regex"));

/// Parse a storefront price label into euros.
///
/// Currency markers and every kind of space are dropped, a decimal comma
/// becomes a dot and the first numeric token wins. When a label carries both
/// separators, the last one is the decimal mark (`1.234,50`, `1,234.50`).
/// Returns `None` when no digits are present.
pub fn parse_price(text: &str) -> Option<f64> {
    let mut cleaned: String = text
        .replace('€', "")
        .replace("EUR", "")
        .replace("eur", "")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}' && *c != '\u{202f}')
        .collect();

    if let (Some(comma), Some(dot)) = (cleaned.rfind(','), cleaned.rfind('.')) {
        let thousands = if comma > dot { '.' } else { ',' };
        cleaned.retain(|c| c != thousands);
    }
    let cleaned = cleaned.replace(',', ".");

    NUMBER_RE
        .captures(&cleaned)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_price(input: &str, expected: f64) {
        let parsed = parse_price(input).unwrap_or_else(|| panic!("no price in {input:?}"));
        assert!(
            (parsed - expected).abs() < 1e-9,
            "{input:?} parsed to {parsed}, expected {expected}"
        );
    }

    #[test]
    fn decimal_comma_with_euro_sign() {
        assert_price("29,90 €", 29.90);
    }

    #[test]
    fn thousands_space_and_currency_code() {
        assert_price("EUR 1 234,50", 1234.50);
    }

    #[test]
    fn non_breaking_spaces_are_ignored() {
        assert_price("1\u{a0}099,00\u{a0}€", 1099.0);
        assert_price("159,99\u{202f}€", 159.99);
    }

    #[test]
    fn dotted_thousands_with_decimal_comma() {
        assert_price("1.234,50 €", 1234.50);
    }

    #[test]
    fn comma_thousands_with_decimal_dot() {
        assert_price("1,234.50", 1234.50);
        assert_price("€1,099.00", 1099.0);
    }

    #[test]
    fn plain_dot_decimal() {
        assert_price("€119.95", 119.95);
    }

    #[test]
    fn first_numeric_token_wins() {
        assert_price("Prix: 89,90 € au lieu de 99,90 €", 89.90);
    }

    #[test]
    fn empty_and_garbled_input_is_unknown() {
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price("   "), None);
        assert_eq!(parse_price("Prix sur demande"), None);
        assert_eq!(parse_price("€,."), None);
    }
}
