//! Weekly as-of feature groups.
//!
//! Each group reads only observations strictly before `as_of` and has a
//! default mapping it falls back to when its aliases are missing or its
//! reads fail. [`build_entity_features`] merges every group into one flat map.

mod competition;
mod demand;
mod economics;
mod risk;
mod stubs;

use chrono::NaiveDate;
use winner_core::{AmazonListing, FeatureMap};

use crate::error::EngineError;
use crate::resolver::AliasSet;
use crate::store::Store;
use crate::window::{top_k_by_bsr, top_k_priced, Aggregator};

pub use competition::{competition_defaults, competition_from, competition_features};
pub use demand::{demand_defaults, demand_from, demand_features};
pub use economics::{economics_defaults, economics_from, economics_features};
pub use risk::{risk_defaults, risk_from, risk_features};
pub use stubs::{dtc_features, nlp_features};

/// Feature names written by v1.0.
pub mod names {
    pub const TIKTOK_VIEWS_7D: &str = "demand_tiktok_views_7d";
    pub const TIKTOK_VIEWS_14D: &str = "demand_tiktok_views_14d";
    pub const TIKTOK_VIEWS_28D: &str = "demand_tiktok_views_28d";
    pub const TIKTOK_VIEWS_SLOPE_4W: &str = "demand_tiktok_views_slope_4w";
    pub const AMAZON_BSR_MEDIAN_TOP10: &str = "demand_amazon_bsr_median_top10";
    pub const AMAZON_BSR_IMPROVEMENT_4W: &str = "demand_amazon_bsr_improvement_4w";
    pub const AMAZON_REVIEW_VELOCITY_4W: &str = "demand_amazon_review_velocity_4w";
    pub const CROSS_CHANNEL_ALIGNMENT: &str = "demand_cross_channel_alignment";

    pub const REVIEW_MEDIAN_TOP10: &str = "comp_amazon_top10_review_median";
    pub const REVIEW_P90_TOP10: &str = "comp_amazon_top10_review_p90";
    pub const CONCENTRATION_HHI: &str = "comp_amazon_concentration_hhi";
    pub const NEW_ENTRANT_RATE_4W: &str = "comp_amazon_new_entrant_rate_4w";
    pub const PRICE_DISPERSION: &str = "comp_price_dispersion";
    pub const PRICE_COMPRESSION_4W: &str = "comp_price_compression_4w";
    pub const LISTING_QUALITY_GAP: &str = "comp_listing_quality_gap";

    pub const PRICE_MEDIAN: &str = "econ_price_median";
    pub const PRICE_TREND_4W: &str = "econ_price_trend_4w";
    pub const FBA_FEE_PROXY: &str = "econ_estimated_fba_fee_proxy";
    pub const COGS_PROXY: &str = "econ_cogs_proxy";
    pub const MARGIN_PROXY: &str = "econ_margin_proxy";
    pub const SHIPPING_RISK_PROXY: &str = "econ_shipping_risk_proxy";

    pub const RETURN_PROXY: &str = "risk_return_proxy";
    pub const REGULATORY_PROXY: &str = "risk_regulatory_proxy";
    pub const IP_COPYABILITY_PROXY: &str = "risk_ip_copyability_proxy";
    pub const HAZMAT_PROXY: &str = "risk_hazmat_proxy";
    pub const SEASONALITY_SPIKE_PROXY: &str = "risk_seasonality_spike_proxy";

    pub const NLP_NEG_SENTIMENT_RATE: &str = "nlp_neg_sentiment_rate";
    pub const NLP_FIXABILITY_SCORE: &str = "nlp_fixability_score";
    pub const NLP_FEATURE_REQUEST_RATE: &str = "nlp_feature_request_rate";
    pub const NLP_TOP_PAIN_POINT_SCORE: &str = "nlp_top_pain_point_score";

    pub const DTC_NEW_PRODUCT_COUNT_4W: &str = "dtc_new_product_count_4w";
    pub const DTC_SOLD_OUT_RATE_4W: &str = "dtc_sold_out_rate_4w";
    pub const DTC_PRICE_PREMIUM_VS_AMAZON: &str = "dtc_price_premium_vs_amazon";
}

/// Knobs shared by every feature group.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureConfig {
    /// Listings per snapshot that count as "top".
    pub top_k: usize,
    /// Cross-channel alignment requires a BSR improvement strictly above this.
    pub alignment_min_bsr_improvement: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            alignment_min_bsr_improvement: 0.0,
        }
    }
}

/// Days between the current and prior Amazon snapshots.
pub(crate) const PRIOR_OFFSET_DAYS: i64 = 28;

/// Current and four-weeks-earlier top-K snapshots of an entity's listings.
#[derive(Debug, Clone)]
pub(crate) struct Snapshots {
    pub current: Vec<AmazonListing>,
    pub prior: Vec<AmazonListing>,
}

impl Snapshots {
    async fn ranked<S: Store>(
        agg: &Aggregator<'_, S>,
        aliases: &[String],
        as_of: NaiveDate,
        top_k: usize,
    ) -> Result<Self, EngineError> {
        let current = agg.amazon_snapshot(aliases, as_of).await?;
        let prior = agg
            .amazon_snapshot(aliases, as_of - chrono::Duration::days(PRIOR_OFFSET_DAYS))
            .await?;
        Ok(Self {
            current: top_k_by_bsr(&current, top_k),
            prior: top_k_by_bsr(&prior, top_k),
        })
    }

    async fn priced<S: Store>(
        agg: &Aggregator<'_, S>,
        aliases: &[String],
        as_of: NaiveDate,
        top_k: usize,
    ) -> Result<Self, EngineError> {
        let current = agg.amazon_snapshot(aliases, as_of).await?;
        let prior = agg
            .amazon_snapshot(aliases, as_of - chrono::Duration::days(PRIOR_OFFSET_DAYS))
            .await?;
        Ok(Self {
            current: top_k_priced(&current, top_k),
            prior: top_k_priced(&prior, top_k),
        })
    }
}

/// Compute every feature group for one entity and merge them.
///
/// A group whose reads fail is logged and replaced by its defaults; this
/// function itself never fails.
pub async fn build_entity_features<S: Store>(
    agg: &Aggregator<'_, S>,
    aliases: &AliasSet,
    as_of: NaiveDate,
    config: &FeatureConfig,
) -> FeatureMap {
    let mut features = FeatureMap::new();

    let groups = [
        (
            "demand",
            demand_features(agg, aliases, as_of, config).await,
            demand_defaults as fn() -> FeatureMap,
        ),
        (
            "competition",
            competition_features(agg, aliases, as_of, config).await,
            competition_defaults,
        ),
        (
            "economics",
            economics_features(agg, aliases, as_of, config).await,
            economics_defaults,
        ),
        (
            "risk",
            risk_features(agg, aliases, as_of, config).await,
            risk_defaults,
        ),
    ];

    for (group, result, defaults) in groups {
        match result {
            Ok(map) => features.extend(map),
            Err(e) => {
                tracing::warn!(
                    group,
                    as_of = %as_of,
                    error = %e,
                    "feature group failed, using defaults"
                );
                features.extend(defaults());
            }
        }
    }

    features.extend(nlp_features());
    features.extend(dtc_features());
    features
}

pub(crate) fn put(map: &mut FeatureMap, name: &str, value: f64) {
    map.insert(name.to_string(), Some(value));
}
