use chrono::{Duration, NaiveDate};
use winner_core::{AmazonListing, FeatureMap, Source};

use super::names::{
    CONCENTRATION_HHI, LISTING_QUALITY_GAP, NEW_ENTRANT_RATE_4W, PRICE_COMPRESSION_4W,
    PRICE_DISPERSION, REVIEW_MEDIAN_TOP10, REVIEW_P90_TOP10,
};
use super::{put, FeatureConfig, Snapshots, PRIOR_OFFSET_DAYS};
use crate::error::EngineError;
use crate::resolver::AliasSet;
use crate::stats;
use crate::store::Store;
use crate::window::Aggregator;

/// Listings counted as the "top" tier for the quality gap.
const QUALITY_TOP_TIER: usize = 3;

#[must_use]
pub fn competition_defaults() -> FeatureMap {
    let mut map = FeatureMap::new();
    put(&mut map, REVIEW_MEDIAN_TOP10, 0.0);
    put(&mut map, REVIEW_P90_TOP10, 0.0);
    put(&mut map, CONCENTRATION_HHI, 1.0);
    put(&mut map, NEW_ENTRANT_RATE_4W, 0.0);
    put(&mut map, PRICE_DISPERSION, 0.0);
    put(&mut map, PRICE_COMPRESSION_4W, 0.0);
    put(&mut map, LISTING_QUALITY_GAP, 0.0);
    map
}

/// Competition features over a BSR-ordered top-K snapshot.
#[must_use]
pub fn competition_from(
    current: &[AmazonListing],
    prior: &[AmazonListing],
    as_of: NaiveDate,
    config: &FeatureConfig,
) -> FeatureMap {
    let mut map = competition_defaults();
    if current.is_empty() {
        return map;
    }

    #[allow(clippy::cast_precision_loss)]
    let reviews: Vec<f64> = current
        .iter()
        .map(|l| l.review_count.unwrap_or(0) as f64)
        .collect();
    put(
        &mut map,
        REVIEW_MEDIAN_TOP10,
        stats::median(&reviews).unwrap_or(0.0),
    );
    put(
        &mut map,
        REVIEW_P90_TOP10,
        stats::percentile_index(&reviews, 0.9).unwrap_or(0.0),
    );
    put(&mut map, CONCENTRATION_HHI, stats::hhi(&reviews));

    let entrant_cutoff = as_of - Duration::days(PRIOR_OFFSET_DAYS);
    let entrants = current
        .iter()
        .filter(|l| l.first_seen_date.is_some_and(|d| d >= entrant_cutoff))
        .count();
    #[allow(clippy::cast_precision_loss)]
    let rate = entrants as f64 / config.top_k.max(1) as f64;
    put(&mut map, NEW_ENTRANT_RATE_4W, rate);

    let current_prices = prices(current);
    put(&mut map, PRICE_DISPERSION, stats::sample_stdev(&current_prices));

    let compression = match (stats::mean(&prices(prior)), stats::mean(&current_prices)) {
        (Some(old), Some(new)) => stats::relative_drop(old, new).unwrap_or(0.0),
        _ => 0.0,
    };
    put(&mut map, PRICE_COMPRESSION_4W, compression);

    put(&mut map, LISTING_QUALITY_GAP, quality_gap(current));
    map
}

/// # Errors
///
/// Returns [`EngineError::Storage`] if a snapshot read fails.
pub async fn competition_features<S: Store>(
    agg: &Aggregator<'_, S>,
    aliases: &AliasSet,
    as_of: NaiveDate,
    config: &FeatureConfig,
) -> Result<FeatureMap, EngineError> {
    let snapshots =
        Snapshots::ranked(agg, aliases.texts(Source::Amazon), as_of, config.top_k).await?;
    Ok(competition_from(
        &snapshots.current,
        &snapshots.prior,
        as_of,
        config,
    ))
}

fn prices(listings: &[AmazonListing]) -> Vec<f64> {
    listings
        .iter()
        .filter_map(|l| l.price_usd)
        .filter(|p| p.is_finite() && *p > 0.0)
        .collect()
}

/// Mean image count of the top tier minus that of the rest.
fn quality_gap(listings: &[AmazonListing]) -> f64 {
    if listings.len() <= QUALITY_TOP_TIER {
        return 0.0;
    }
    let images: Vec<f64> = listings
        .iter()
        .map(|l| f64::from(l.image_count.unwrap_or(0)))
        .collect();
    let (top, rest) = images.split_at(QUALITY_TOP_TIER);
    stats::mean(top).unwrap_or(0.0) - stats::mean(rest).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn listing(asin: &str, reviews: i64, price: f64, images: i32) -> AmazonListing {
        AmazonListing {
            dt: date(2026, 1, 9),
            asin: asin.to_string(),
            title: None,
            brand: None,
            category: None,
            price_usd: Some(price),
            bsr: Some(100),
            rating: None,
            review_count: Some(reviews),
            image_count: Some(images),
            video_flag: false,
            first_seen_date: None,
            last_seen_date: None,
        }
    }

    fn value(map: &FeatureMap, name: &str) -> f64 {
        map.get(name).copied().flatten().unwrap()
    }

    #[test]
    fn empty_snapshot_equals_defaults() {
        let map = competition_from(&[], &[], date(2026, 1, 12), &FeatureConfig::default());
        assert_eq!(map, competition_defaults());
        assert_eq!(value(&map, CONCENTRATION_HHI), 1.0);
    }

    #[test]
    fn review_median_and_p90_over_ten_listings() {
        let counts = [2000, 1250, 800, 600, 500, 400, 300, 200, 150, 100];
        let current: Vec<AmazonListing> = counts
            .iter()
            .enumerate()
            .map(|(i, &c)| listing(&format!("B{i}"), c, 20.0, 5))
            .collect();
        let map = competition_from(&current, &[], date(2026, 1, 12), &FeatureConfig::default());
        assert_eq!(value(&map, REVIEW_MEDIAN_TOP10), 450.0);
        assert_eq!(value(&map, REVIEW_P90_TOP10), 2000.0);
    }

    #[test]
    fn new_entrants_are_counted_against_top_k() {
        let as_of = date(2026, 1, 12);
        let mut fresh = listing("B1", 10, 20.0, 5);
        fresh.first_seen_date = Some(date(2025, 12, 20));
        let mut old = listing("B2", 10, 20.0, 5);
        old.first_seen_date = Some(date(2025, 6, 1));
        let map = competition_from(&[fresh, old], &[], as_of, &FeatureConfig::default());
        assert!((value(&map, NEW_ENTRANT_RATE_4W) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn price_compression_compares_mean_prices() {
        let current = vec![listing("B1", 10, 18.0, 5), listing("B2", 10, 22.0, 5)];
        let prior = vec![listing("B1", 10, 25.0, 5), listing("B2", 10, 25.0, 5)];
        let map = competition_from(&current, &prior, date(2026, 1, 12), &FeatureConfig::default());
        assert!((value(&map, PRICE_COMPRESSION_4W) - 0.2).abs() < 1e-9);
        assert!(value(&map, PRICE_DISPERSION) > 0.0);
    }

    #[test]
    fn quality_gap_needs_more_than_three_listings() {
        let three: Vec<AmazonListing> = (0..3)
            .map(|i| listing(&format!("B{i}"), 1, 10.0, 9))
            .collect();
        assert_eq!(quality_gap(&three), 0.0);

        let mut five = three.clone();
        five.push(listing("B3", 1, 10.0, 3));
        five.push(listing("B4", 1, 10.0, 5));
        assert!((quality_gap(&five) - 5.0).abs() < 1e-9);
    }
}
