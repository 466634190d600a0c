//! Static keyword heuristics for economics and risk features.
//!
//! Matching is substring-based on lower-cased text, so multi-word entries
//! such as `"nail polish"` work and `"toy"` also hits `"toys"`.

pub(crate) const SHIPPING_RISK: &[&str] = &["fragile", "large", "heavy", "bulk", "oversized"];

pub(crate) const RETURN: &[&str] = &[
    "broke",
    "broken",
    "leak",
    "leaked",
    "doesn't work",
    "stopped working",
    "defective",
    "returned",
    "refund",
];

pub(crate) const NEGATIVE: &[&str] = &["terrible", "awful", "worst", "disappointed", "waste"];

/// Regulatory exposure per keyword, in `[0, 1]`.
pub(crate) const REGULATORY_SEVERITY: &[(&str, f64)] = &[
    ("battery", 0.3),
    ("lithium", 0.5),
    ("supplement", 0.8),
    ("vitamin", 0.7),
    ("medical", 0.9),
    ("health", 0.4),
    ("kids", 0.6),
    ("children", 0.6),
    ("toy", 0.5),
    ("skincare", 0.7),
    ("cosmetic", 0.6),
    ("food", 0.8),
];

pub(crate) const GENERIC: &[&str] = &["generic", "unbranded", "no name", "basic", "simple"];

pub(crate) const DISTINCTIVE: &[&str] = &["patented", "unique", "exclusive", "design", "branded"];

pub(crate) const HAZMAT: &[&str] = &[
    "battery",
    "lithium",
    "chemical",
    "flammable",
    "aerosol",
    "perfume",
    "nail polish",
    "paint",
    "solvent",
];

pub(crate) const SEASONAL: &[&str] = &[
    "christmas",
    "holiday",
    "valentine",
    "halloween",
    "summer",
    "winter",
    "beach",
    "snow",
];

/// Amazon referral fee and COGS share by category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CategoryRates {
    pub referral: f64,
    pub cogs: f64,
}

const ELECTRONICS: CategoryRates = CategoryRates {
    referral: 0.08,
    cogs: 0.50,
};
const HOME_KITCHEN: CategoryRates = CategoryRates {
    referral: 0.15,
    cogs: 0.25,
};
const DEFAULT_RATES: CategoryRates = CategoryRates {
    referral: 0.15,
    cogs: 0.30,
};

/// Rates for a listing category, matched by case-insensitive substring.
/// Unknown or missing categories get the default.
pub(crate) fn category_rates(category: Option<&str>) -> CategoryRates {
    let Some(category) = category.map(str::to_lowercase) else {
        return DEFAULT_RATES;
    };
    if category.contains("electronics") {
        ELECTRONICS
    } else if category.contains("home") || category.contains("kitchen") {
        HOME_KITCHEN
    } else {
        DEFAULT_RATES
    }
}

/// Flat FBA fulfillment fee by price tier.
pub(crate) fn fulfillment_fee(price: f64) -> f64 {
    if price < 10.0 {
        2.50
    } else if price < 20.0 {
        3.50
    } else {
        4.50
    }
}

/// Number of distinct `keywords` that occur in `text`.
pub(crate) fn count_present(text: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|k| text.contains(*k)).count()
}

pub(crate) fn any_present(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

/// Highest severity among the table entries found in `text`; `0.0` for none.
pub(crate) fn max_severity(text: &str, table: &[(&str, f64)]) -> f64 {
    table
        .iter()
        .filter(|(k, _)| text.contains(k))
        .map(|&(_, w)| w)
        .fold(0.0, f64::max)
}
