use chrono::NaiveDate;
use winner_core::{AmazonListing, FeatureMap, Source};

use super::names::{
    COGS_PROXY, FBA_FEE_PROXY, MARGIN_PROXY, PRICE_MEDIAN, PRICE_TREND_4W, SHIPPING_RISK_PROXY,
};
use super::{put, FeatureConfig, Snapshots};
use crate::error::EngineError;
use crate::keywords::{self, SHIPPING_RISK};
use crate::resolver::AliasSet;
use crate::stats;
use crate::store::Store;
use crate::window::Aggregator;

#[must_use]
pub fn economics_defaults() -> FeatureMap {
    let mut map = FeatureMap::new();
    put(&mut map, PRICE_MEDIAN, 0.0);
    put(&mut map, PRICE_TREND_4W, 0.0);
    put(&mut map, FBA_FEE_PROXY, 0.0);
    put(&mut map, COGS_PROXY, 0.0);
    put(&mut map, MARGIN_PROXY, 0.0);
    put(&mut map, SHIPPING_RISK_PROXY, 0.0);
    map
}

/// Unit economics over the priced top-K snapshot. The first listing is the
/// best ranked and supplies the category.
#[must_use]
pub fn economics_from(current: &[AmazonListing], prior: &[AmazonListing]) -> FeatureMap {
    let mut map = economics_defaults();
    let Some(best) = current.first() else {
        return map;
    };

    let prices: Vec<f64> = current.iter().filter_map(|l| l.price_usd).collect();
    let price = stats::median(&prices).unwrap_or(0.0);
    put(&mut map, PRICE_MEDIAN, price);

    let old_prices: Vec<f64> = prior.iter().filter_map(|l| l.price_usd).collect();
    let trend = match (stats::mean(&old_prices), stats::mean(&prices)) {
        (Some(old), Some(new)) if old > 0.0 => (new - old) / old,
        _ => 0.0,
    };
    put(&mut map, PRICE_TREND_4W, trend);

    let rates = keywords::category_rates(best.category.as_deref());
    let fee = if price > 0.0 {
        round_cents(price * rates.referral + keywords::fulfillment_fee(price))
    } else {
        0.0
    };
    let cogs = price * rates.cogs;
    put(&mut map, FBA_FEE_PROXY, fee);
    put(&mut map, COGS_PROXY, cogs);
    put(&mut map, MARGIN_PROXY, (price - fee - cogs).max(0.0));

    let titles = current
        .iter()
        .filter_map(|l| l.title.as_deref())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    #[allow(clippy::cast_precision_loss)]
    let shipping =
        keywords::count_present(&titles, SHIPPING_RISK) as f64 / SHIPPING_RISK.len() as f64;
    put(&mut map, SHIPPING_RISK_PROXY, shipping);

    map
}

/// # Errors
///
/// Returns [`EngineError::Storage`] if a snapshot read fails.
pub async fn economics_features<S: Store>(
    agg: &Aggregator<'_, S>,
    aliases: &AliasSet,
    as_of: NaiveDate,
    config: &FeatureConfig,
) -> Result<FeatureMap, EngineError> {
    let snapshots =
        Snapshots::priced(agg, aliases.texts(Source::Amazon), as_of, config.top_k).await?;
    Ok(economics_from(&snapshots.current, &snapshots.prior))
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(asin: &str, price: f64, category: &str, title: &str) -> AmazonListing {
        AmazonListing {
            dt: NaiveDate::from_ymd_opt(2026, 1, 9).unwrap(),
            asin: asin.to_string(),
            title: Some(title.to_string()),
            brand: None,
            category: Some(category.to_string()),
            price_usd: Some(price),
            bsr: Some(100),
            rating: None,
            review_count: None,
            image_count: None,
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
        assert_eq!(economics_from(&[], &[]), economics_defaults());
    }

    #[test]
    fn default_category_fee_cogs_and_margin() {
        let current = vec![listing("B1", 29.99, "Lighting", "Sunset lamp")];
        let map = economics_from(&current, &[]);
        // 29.99 * 0.15 + 4.50 = 8.9985 -> 9.00
        assert!((value(&map, FBA_FEE_PROXY) - 9.0).abs() < 1e-9);
        assert!((value(&map, COGS_PROXY) - 8.997).abs() < 1e-9);
        assert!((value(&map, MARGIN_PROXY) - 11.993).abs() < 1e-9);
        assert_eq!(value(&map, PRICE_TREND_4W), 0.0);
    }

    #[test]
    fn electronics_rates_apply() {
        let current = vec![listing("B1", 15.0, "Electronics", "Neck fan")];
        let map = economics_from(&current, &[]);
        // 15 * 0.08 + 3.50 = 4.70; cogs 7.50; margin 2.80
        assert!((value(&map, FBA_FEE_PROXY) - 4.7).abs() < 1e-9);
        assert!((value(&map, MARGIN_PROXY) - 2.8).abs() < 1e-9);
    }

    #[test]
    fn margin_is_floored_at_zero() {
        let current = vec![listing("B1", 5.0, "Electronics", "cheap fan")];
        let map = economics_from(&current, &[]);
        assert_eq!(value(&map, MARGIN_PROXY), 0.0);
    }

    #[test]
    fn price_trend_and_shipping_risk() {
        let current = vec![
            listing("B1", 22.0, "Home & Kitchen", "Large heavy ice roller"),
            listing("B2", 22.0, "Home & Kitchen", "Fragile glass roller"),
        ];
        let prior = vec![listing("B1", 20.0, "Home & Kitchen", "Ice roller")];
        let map = economics_from(&current, &prior);
        assert!((value(&map, PRICE_TREND_4W) - 0.1).abs() < 1e-9);
        assert!((value(&map, SHIPPING_RISK_PROXY) - 0.6).abs() < 1e-9);
    }
}
