//! Daily marketplace fact rows. The engine only ever reads these.

use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// One Amazon listing as observed on day `dt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmazonListing {
    pub dt: NaiveDate,
    pub asin: String,
    pub title: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub price_usd: Option<f64>,
    /// Best-Seller-Rank; lower is better.
    pub bsr: Option<i64>,
    pub rating: Option<f64>,
    pub review_count: Option<i64>,
    pub image_count: Option<i32>,
    pub video_flag: bool,
    pub first_seen_date: Option<NaiveDate>,
    pub last_seen_date: Option<NaiveDate>,
}

impl AmazonListing {
    /// A listing belongs to an alias set when its ASIN equals an alias, its
    /// brand equals an alias, or its title contains an alias. Brand and title
    /// comparisons ignore case.
    #[must_use]
    pub fn matches_any_alias(&self, aliases: &[String]) -> bool {
        let title = self.title.as_deref().map(str::to_lowercase);
        let brand = self.brand.as_deref().map(str::to_lowercase);

        aliases.iter().any(|alias| {
            if alias.is_empty() {
                return false;
            }
            if self.asin.eq_ignore_ascii_case(alias) {
                return true;
            }
            let needle = alias.to_lowercase();
            brand.as_deref() == Some(needle.as_str())
                || title.as_deref().is_some_and(|t| t.contains(&needle))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmazonReview {
    pub dt: NaiveDate,
    pub asin: String,
    pub review_text: Option<String>,
    pub rating: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Hashtag,
    Keyword,
}

impl QueryType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QueryType::Hashtag => "hashtag",
            QueryType::Keyword => "keyword",
        }
    }
}

impl FromStr for QueryType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hashtag" => Ok(QueryType::Hashtag),
            "keyword" => Ok(QueryType::Keyword),
            other => Err(CoreError::InvalidQueryType(other.to_string())),
        }
    }
}

/// Daily TikTok engagement for one hashtag or keyword query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TikTokMetric {
    pub dt: NaiveDate,
    pub query: String,
    pub query_type: QueryType,
    pub views: Option<i64>,
    pub videos: Option<i64>,
    pub likes: Option<i64>,
    pub comments: Option<i64>,
    pub shares: Option<i64>,
    pub creator_count: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(asin: &str, title: Option<&str>, brand: Option<&str>) -> AmazonListing {
        AmazonListing {
            dt: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            asin: asin.to_string(),
            title: title.map(str::to_string),
            brand: brand.map(str::to_string),
            category: None,
            price_usd: None,
            bsr: None,
            rating: None,
            review_count: None,
            image_count: None,
            video_flag: false,
            first_seen_date: None,
            last_seen_date: None,
        }
    }

    #[test]
    fn matches_title_substring_case_insensitive() {
        let l = listing("B000000001", Some("Galaxy SUNSET LAMP 16 colors"), None);
        assert!(l.matches_any_alias(&["sunset lamp".to_string()]));
    }

    #[test]
    fn matches_brand_exactly() {
        let l = listing("B000000001", Some("Desk light"), Some("Glowco"));
        assert!(l.matches_any_alias(&["glowco".to_string()]));
        assert!(!l.matches_any_alias(&["glow".to_string()]));
    }

    #[test]
    fn matches_asin() {
        let l = listing("B0C1234XYZ", None, None);
        assert!(l.matches_any_alias(&["B0C1234XYZ".to_string()]));
    }

    #[test]
    fn empty_alias_never_matches() {
        let l = listing("B000000001", Some("anything"), Some("brand"));
        assert!(!l.matches_any_alias(&[String::new()]));
        assert!(!l.matches_any_alias(&[]));
    }
}
