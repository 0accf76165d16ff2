use std::sync::LazyLock;

use regex::Regex;

/// At least one of these must appear for a listing to be a sealed booster box.
const CATEGORY_KEYWORDS: &[&str] = &[
    "display",
    "booster box",
    "boite de booster",
    "boîte de booster",
];

/// Non-French editions: `(EN)`, `[JP]`, `- ENG`, trailing `EN`, or spelled out.
static FOREIGN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)[(\[]\s*(en|eng|us|uk|jp|jap|jpn|cn|kr|de|it|es)\s*[)\]]|[-–/|]\s*(en|eng|us|uk|jp|jap|jpn|cn|kr)\s*$|\s(en|eng|jp|jpn)\s*$|\b(anglais|anglaise|english|japonais|japonaise|japanese|chinois|chinese|coréen|korean|allemand|italien|espagnol)\b",
    )
    .expect("valid language regex")
});

/// Sealed multi-display cases and cartons.
static CASE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(case|carton|caisse)\b|\b\d+\s*x\s*display|\blot\s+de\s+\d+")
        .expect("valid case regex")
});

/// Several products sold together.
static BUNDLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\+|\bbundle\b").expect("valid bundle regex"));

/// Decide whether a listing name is a single French booster display.
///
/// A category keyword is required; any foreign-language marker, case or
/// bundle marker then rejects the listing.
pub fn fits_category(name: &str) -> bool {
    let lowered = name.to_lowercase();
    if !CATEGORY_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
        return false;
    }

    !(FOREIGN_RE.is_match(name) || CASE_RE.is_match(name) || BUNDLE_RE.is_match(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn french_display_fits() {
        assert!(fits_category("Display One Piece OP10 FR"));
        assert!(fits_category("One Piece Card Game - Booster Box OP-07 - Français"));
        assert!(fits_category("Boîte de boosters Romance Dawn"));
    }

    #[test]
    fn missing_keyword_is_rejected() {
        assert!(!fits_category("Booster One Piece OP10 FR"));
        assert!(!fits_category("Starter Deck ST-10"));
        assert!(!fits_category(""));
    }

    #[test]
    fn language_markers_are_rejected() {
        assert!(!fits_category("Display One Piece OP10 (EN)"));
        assert!(!fits_category("Display One Piece OP10 [JP]"));
        assert!(!fits_category("Display One Piece OP09 - ENG"));
        assert!(!fits_category("Display One Piece OP08 JP"));
        assert!(!fits_category("Display One Piece OP06 Japonais"));
        assert!(!fits_category("Display One Piece OP05 English version"));
    }

    #[test]
    fn words_containing_language_codes_are_kept() {
        assert!(fits_category("Display One Piece Awakening of the New Era"));
        assert!(fits_category("Display OP04 Kingdoms of Intrigue"));
    }

    #[test]
    fn cases_are_rejected() {
        assert!(!fits_category("Case de 12 Displays OP10"));
        assert!(!fits_category("Carton 12 displays One Piece OP09"));
        assert!(!fits_category("2x Display One Piece OP08"));
        assert!(!fits_category("Lot de 3 display OP07"));
    }

    #[test]
    fn bundles_are_rejected() {
        assert!(!fits_category("Display OP10 + Display OP09 Bundle"));
        assert!(!fits_category("Display OP10+OP09"));
        assert!(!fits_category("Display One Piece Bundle"));
    }
}
