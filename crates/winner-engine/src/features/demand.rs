use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use winner_core::{AmazonListing, FeatureMap, QueryType, Source, TikTokMetric};

use super::names::{
    AMAZON_BSR_IMPROVEMENT_4W, AMAZON_BSR_MEDIAN_TOP10, AMAZON_REVIEW_VELOCITY_4W,
    CROSS_CHANNEL_ALIGNMENT, TIKTOK_VIEWS_14D, TIKTOK_VIEWS_28D, TIKTOK_VIEWS_7D,
    TIKTOK_VIEWS_SLOPE_4W,
};
use super::{put, FeatureConfig, Snapshots};
use crate::error::EngineError;
use crate::resolver::AliasSet;
use crate::stats;
use crate::store::Store;
use crate::window::Aggregator;

const TIKTOK_LOOKBACK_DAYS: i64 = 28;

#[must_use]
pub fn demand_defaults() -> FeatureMap {
    let mut map = FeatureMap::new();
    put(&mut map, TIKTOK_VIEWS_7D, 0.0);
    put(&mut map, TIKTOK_VIEWS_14D, 0.0);
    put(&mut map, TIKTOK_VIEWS_28D, 0.0);
    put(&mut map, TIKTOK_VIEWS_SLOPE_4W, 0.0);
    map.insert(AMAZON_BSR_MEDIAN_TOP10.to_string(), None);
    put(&mut map, AMAZON_BSR_IMPROVEMENT_4W, 0.0);
    put(&mut map, AMAZON_REVIEW_VELOCITY_4W, 0.0);
    put(&mut map, CROSS_CHANNEL_ALIGNMENT, 0.0);
    map
}

/// Demand features from already-windowed inputs.
///
/// `hashtag_rows` cover the 28 days before `as_of`; `current` and `prior`
/// are top-K snapshots four weeks apart.
#[must_use]
pub fn demand_from(
    hashtag_rows: &[TikTokMetric],
    current: &[AmazonListing],
    prior: &[AmazonListing],
    as_of: NaiveDate,
    config: &FeatureConfig,
) -> FeatureMap {
    let mut map = demand_defaults();

    let views_since = |days: i64| -> f64 {
        let from = as_of - Duration::days(days);
        hashtag_rows
            .iter()
            .filter(|r| r.dt >= from && r.dt < as_of)
            .map(views)
            .sum()
    };
    let views_7d = views_since(7);
    put(&mut map, TIKTOK_VIEWS_7D, views_7d);
    put(&mut map, TIKTOK_VIEWS_14D, views_since(14));
    put(&mut map, TIKTOK_VIEWS_28D, views_since(TIKTOK_LOOKBACK_DAYS));
    put(
        &mut map,
        TIKTOK_VIEWS_SLOPE_4W,
        daily_views_slope(hashtag_rows, as_of - Duration::days(TIKTOK_LOOKBACK_DAYS)),
    );

    let median_now = median_bsr(current);
    let median_then = median_bsr(prior);
    map.insert(AMAZON_BSR_MEDIAN_TOP10.to_string(), median_now);

    let improvement = match (median_then, median_now) {
        (Some(old), Some(new)) => stats::relative_drop(old, new).unwrap_or(0.0),
        _ => 0.0,
    };
    put(&mut map, AMAZON_BSR_IMPROVEMENT_4W, improvement);

    let velocity = if current.is_empty() || prior.is_empty() {
        0.0
    } else {
        review_sum(current) - review_sum(prior)
    };
    put(&mut map, AMAZON_REVIEW_VELOCITY_4W, velocity);

    let aligned = views_7d > 0.0
        && median_now.is_some()
        && improvement > config.alignment_min_bsr_improvement;
    put(
        &mut map,
        CROSS_CHANNEL_ALIGNMENT,
        if aligned { 1.0 } else { 0.0 },
    );

    map
}

/// Read the entity's hashtag metrics and Amazon snapshots, then compute.
///
/// # Errors
///
/// Returns [`EngineError::Storage`] if any read fails.
pub async fn demand_features<S: Store>(
    agg: &Aggregator<'_, S>,
    aliases: &AliasSet,
    as_of: NaiveDate,
    config: &FeatureConfig,
) -> Result<FeatureMap, EngineError> {
    let hashtag_rows = agg
        .tiktok_window(
            aliases.texts(Source::Tiktok),
            Some(QueryType::Hashtag),
            as_of,
            TIKTOK_LOOKBACK_DAYS,
        )
        .await?;
    let snapshots =
        Snapshots::ranked(agg, aliases.texts(Source::Amazon), as_of, config.top_k).await?;

    Ok(demand_from(
        &hashtag_rows,
        &snapshots.current,
        &snapshots.prior,
        as_of,
        config,
    ))
}

#[allow(clippy::cast_precision_loss)]
fn views(row: &TikTokMetric) -> f64 {
    row.views.unwrap_or(0) as f64
}

/// OLS slope of per-day summed views against the day offset from `start`.
fn daily_views_slope(rows: &[TikTokMetric], start: NaiveDate) -> f64 {
    let mut per_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for row in rows {
        *per_day.entry(row.dt).or_default() += views(row);
    }
    #[allow(clippy::cast_precision_loss)]
    let points: Vec<(f64, f64)> = per_day
        .into_iter()
        .map(|(dt, v)| ((dt - start).num_days() as f64, v))
        .collect();
    stats::slope(&points)
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn median_bsr(listings: &[AmazonListing]) -> Option<f64> {
    let bsrs: Vec<f64> = listings.iter().filter_map(|l| l.bsr).map(|b| b as f64).collect();
    stats::median(&bsrs)
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn review_sum(listings: &[AmazonListing]) -> f64 {
    listings
        .iter()
        .map(|l| l.review_count.unwrap_or(0) as f64)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tiktok(dt: NaiveDate, views: i64) -> TikTokMetric {
        TikTokMetric {
            dt,
            query: "sunsetlamp".to_string(),
            query_type: QueryType::Hashtag,
            views: Some(views),
            videos: None,
            likes: None,
            comments: None,
            shares: None,
            creator_count: None,
        }
    }

    fn listing(asin: &str, bsr: i64, reviews: i64) -> AmazonListing {
        AmazonListing {
            dt: date(2026, 1, 8),
            asin: asin.to_string(),
            title: Some("sunset lamp".to_string()),
            brand: None,
            category: None,
            price_usd: Some(20.0),
            bsr: Some(bsr),
            rating: None,
            review_count: Some(reviews),
            image_count: None,
            video_flag: false,
            first_seen_date: None,
            last_seen_date: None,
        }
    }

    fn value(map: &FeatureMap, name: &str) -> Option<f64> {
        map.get(name).copied().flatten()
    }

    #[test]
    fn empty_inputs_equal_defaults() {
        let map = demand_from(&[], &[], &[], date(2026, 1, 12), &FeatureConfig::default());
        assert_eq!(map, demand_defaults());
    }

    #[test]
    fn views_are_bucketed_by_trailing_window() {
        let as_of = date(2026, 1, 12);
        let rows = vec![
            tiktok(date(2026, 1, 11), 100),
            tiktok(date(2026, 1, 5), 200),
            tiktok(date(2026, 1, 4), 400),
            tiktok(date(2025, 12, 15), 800),
        ];
        let map = demand_from(&rows, &[], &[], as_of, &FeatureConfig::default());
        assert_eq!(value(&map, TIKTOK_VIEWS_7D), Some(300.0));
        assert_eq!(value(&map, TIKTOK_VIEWS_14D), Some(700.0));
        assert_eq!(value(&map, TIKTOK_VIEWS_28D), Some(1500.0));
    }

    #[test]
    fn slope_uses_daily_sums() {
        let as_of = date(2026, 1, 12);
        let mut rows = Vec::new();
        for i in 0..5_i64 {
            let dt = as_of - Duration::days(5 - i);
            // two queries on the same day sum to 10 * i
            rows.push(tiktok(dt, 4 * i));
            rows.push(tiktok(dt, 6 * i));
        }
        let map = demand_from(&rows, &[], &[], as_of, &FeatureConfig::default());
        let slope = value(&map, TIKTOK_VIEWS_SLOPE_4W).unwrap();
        assert!((slope - 10.0).abs() < 1e-9);
    }

    #[test]
    fn bsr_improvement_and_alignment() {
        let as_of = date(2026, 1, 12);
        let current = vec![listing("B1", 700, 300), listing("B2", 700, 200)];
        let prior = vec![listing("B1", 1000, 150), listing("B2", 1000, 100)];
        let rows = vec![tiktok(date(2026, 1, 10), 5_000)];
        let map = demand_from(&rows, &current, &prior, as_of, &FeatureConfig::default());

        assert_eq!(value(&map, AMAZON_BSR_MEDIAN_TOP10), Some(700.0));
        assert!((value(&map, AMAZON_BSR_IMPROVEMENT_4W).unwrap() - 0.3).abs() < 1e-9);
        assert_eq!(value(&map, AMAZON_REVIEW_VELOCITY_4W), Some(250.0));
        assert_eq!(value(&map, CROSS_CHANNEL_ALIGNMENT), Some(1.0));
    }

    #[test]
    fn alignment_respects_configured_threshold() {
        let as_of = date(2026, 1, 12);
        let current = vec![listing("B1", 900, 10)];
        let prior = vec![listing("B1", 1000, 10)];
        let rows = vec![tiktok(date(2026, 1, 10), 5_000)];
        let config = FeatureConfig {
            alignment_min_bsr_improvement: 0.2,
            ..FeatureConfig::default()
        };
        let map = demand_from(&rows, &current, &prior, as_of, &config);
        assert_eq!(value(&map, CROSS_CHANNEL_ALIGNMENT), Some(0.0));
    }

    #[test]
    fn missing_prior_snapshot_means_no_velocity_or_improvement() {
        let as_of = date(2026, 1, 12);
        let current = vec![listing("B1", 500, 900)];
        let map = demand_from(&[], &current, &[], as_of, &FeatureConfig::default());
        assert_eq!(value(&map, AMAZON_BSR_MEDIAN_TOP10), Some(500.0));
        assert_eq!(value(&map, AMAZON_BSR_IMPROVEMENT_4W), Some(0.0));
        assert_eq!(value(&map, AMAZON_REVIEW_VELOCITY_4W), Some(0.0));
    }
}
