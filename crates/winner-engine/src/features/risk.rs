use chrono::NaiveDate;
use winner_core::{AmazonListing, AmazonReview, FeatureMap, Source};

use super::names::{
    HAZMAT_PROXY, IP_COPYABILITY_PROXY, REGULATORY_PROXY, RETURN_PROXY, SEASONALITY_SPIKE_PROXY,
};
use super::{put, FeatureConfig};
use crate::error::EngineError;
use crate::keywords::{
    self, DISTINCTIVE, GENERIC, HAZMAT, NEGATIVE, REGULATORY_SEVERITY, RETURN, SEASONAL,
};
use crate::resolver::AliasSet;
use crate::store::Store;
use crate::window::{top_k_ranked_first, Aggregator};

const REVIEW_LOOKBACK_DAYS: i64 = 28;
const REVIEW_SCAN_LIMIT: usize = 100;
/// Reviews at or below this rating count as negative.
const NEGATIVE_RATING: f64 = 2.0;

#[must_use]
pub fn risk_defaults() -> FeatureMap {
    let mut map = FeatureMap::new();
    put(&mut map, RETURN_PROXY, 0.0);
    put(&mut map, REGULATORY_PROXY, 0.0);
    put(&mut map, IP_COPYABILITY_PROXY, 0.0);
    put(&mut map, HAZMAT_PROXY, 0.0);
    put(&mut map, SEASONALITY_SPIKE_PROXY, 0.0);
    map
}

/// Keyword risk proxies over listing text plus a return-rate proxy over
/// recent reviews.
#[must_use]
pub fn risk_from(listings: &[AmazonListing], reviews: &[AmazonReview]) -> FeatureMap {
    let mut map = risk_defaults();
    if listings.is_empty() {
        return map;
    }

    put(&mut map, RETURN_PROXY, return_proxy(reviews));

    let titles = listings
        .iter()
        .filter_map(|l| l.title.as_deref())
        .collect::<Vec<_>>()
        .join(" ");
    let categories = listings
        .iter()
        .filter_map(|l| l.category.as_deref())
        .collect::<Vec<_>>()
        .join(" ");
    let text = format!("{titles} {categories}").to_lowercase();

    put(
        &mut map,
        REGULATORY_PROXY,
        keywords::max_severity(&text, REGULATORY_SEVERITY),
    );

    let generic = keywords::count_present(&text, GENERIC);
    let distinctive = keywords::count_present(&text, DISTINCTIVE);
    let copyability = match generic.cmp(&distinctive) {
        std::cmp::Ordering::Greater => 0.8,
        std::cmp::Ordering::Less => 0.2,
        std::cmp::Ordering::Equal => 0.5,
    };
    put(&mut map, IP_COPYABILITY_PROXY, copyability);

    #[allow(clippy::cast_precision_loss)]
    let hazmat = (keywords::count_present(&text, HAZMAT) as f64 * 0.3).min(1.0);
    put(&mut map, HAZMAT_PROXY, hazmat);

    #[allow(clippy::cast_precision_loss)]
    let seasonal = (keywords::count_present(&text, SEASONAL) as f64 * 0.4).min(1.0);
    put(&mut map, SEASONALITY_SPIKE_PROXY, seasonal);

    map
}

/// Scans the top-K matching listings, unranked ones included after the
/// ranked ones.
///
/// # Errors
///
/// Returns [`EngineError::Storage`] if the snapshot or review read fails.
pub async fn risk_features<S: Store>(
    agg: &Aggregator<'_, S>,
    aliases: &AliasSet,
    as_of: NaiveDate,
    config: &FeatureConfig,
) -> Result<FeatureMap, EngineError> {
    let snapshot = agg
        .amazon_snapshot(aliases.texts(Source::Amazon), as_of)
        .await?;
    let current = top_k_ranked_first(&snapshot, config.top_k);
    let asins: Vec<String> = current.iter().map(|l| l.asin.clone()).collect();
    let reviews = agg
        .review_window(&asins, as_of, REVIEW_LOOKBACK_DAYS, REVIEW_SCAN_LIMIT)
        .await?;
    Ok(risk_from(&current, &reviews))
}

/// `(returns + 0.5 * negatives) / scanned`, capped at 1. A review without a
/// rating is not negative on rating alone.
fn return_proxy(reviews: &[AmazonReview]) -> f64 {
    if reviews.is_empty() {
        return 0.0;
    }
    let mut returns = 0_u32;
    let mut negatives = 0_u32;
    for review in reviews {
        let text = review
            .review_text
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();
        if keywords::any_present(&text, RETURN) {
            returns += 1;
        }
        let low_rating = review.rating.is_some_and(|r| r <= NEGATIVE_RATING);
        if low_rating || keywords::any_present(&text, NEGATIVE) {
            negatives += 1;
        }
    }
    #[allow(clippy::cast_precision_loss)]
    let scanned = reviews.len() as f64;
    ((f64::from(returns) + 0.5 * f64::from(negatives)) / scanned).min(1.0)
}
