use std::sync::LazyLock;

use regex::Regex;

/// Family prefixes, tried in order: main boosters, extra boosters,
/// premium boosters, then starter decks.
static CODE_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    ["OP", "EB", "PRB", "ST"]
        .into_iter()
        .map(|family| {
            let pattern = format!(r"(?i)\b{family}[-\s_]?(\d{{2}})");
            (family, Regex::new(&pattern).expect("valid release code regex"))
        })
        .collect()
});

/// Edition names mapped to their codes, scanned in declaration order.
/// The first name found in the listing wins.
const EDITION_NAMES: &[(&str, &str)] = &[
    ("romance dawn", "OP01"),
    ("paramount war", "OP02"),
    ("guerre au sommet", "OP02"),
    ("pillars of strength", "OP03"),
    ("piliers de la force", "OP03"),
    ("kingdoms of intrigue", "OP04"),
    ("royaumes de l'intrigue", "OP04"),
    ("awakening of the new era", "OP05"),
    ("eveil de la nouvelle ere", "OP05"),
    ("éveil de la nouvelle ère", "OP05"),
    ("wings of the captain", "OP06"),
    ("ailes du capitaine", "OP06"),
    ("500 years in the future", "OP07"),
    ("500 ans dans le futur", "OP07"),
    ("two legends", "OP08"),
    ("deux légendes", "OP08"),
    ("deux legendes", "OP08"),
    ("the four emperors", "OP09"),
    ("emperors in the new world", "OP09"),
    ("quatre empereurs", "OP09"),
    ("royal blood", "OP10"),
    ("sang royal", "OP10"),
    ("memorial collection", "EB01"),
];

/// Detect the release code of a listing from its name.
///
/// Explicit codes (`OP-05`, `op05`, `EB 01`) take precedence over edition
/// names. Returns `None` when neither is present.
pub fn detect_release_code(name: &str) -> Option<String> {
    for (family, re) in CODE_PATTERNS.iter() {
        if let Some(digits) = re.captures(name).and_then(|caps| caps.get(1)) {
            return Some(format!("{family}{}", digits.as_str()));
        }
    }

    let lowered = name.to_lowercase();
    EDITION_NAMES
        .iter()
        .find(|(edition, _)| lowered.contains(edition))
        .map(|(_, code)| (*code).to_string())
}
