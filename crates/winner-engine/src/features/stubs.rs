//! Extension points with fixed zero values until review NLP and storefront
//! crawls feed them.

use winner_core::FeatureMap;

use super::names::{
    DTC_NEW_PRODUCT_COUNT_4W, DTC_PRICE_PREMIUM_VS_AMAZON, DTC_SOLD_OUT_RATE_4W,
    NLP_FEATURE_REQUEST_RATE, NLP_FIXABILITY_SCORE, NLP_NEG_SENTIMENT_RATE,
    NLP_TOP_PAIN_POINT_SCORE,
};
use super::put;

#[must_use]
pub fn nlp_features() -> FeatureMap {
    let mut map = FeatureMap::new();
    for name in [
        NLP_NEG_SENTIMENT_RATE,
        NLP_FIXABILITY_SCORE,
        NLP_FEATURE_REQUEST_RATE,
        NLP_TOP_PAIN_POINT_SCORE,
    ] {
        put(&mut map, name, 0.0);
    }
    map
}

#[must_use]
pub fn dtc_features() -> FeatureMap {
    let mut map = FeatureMap::new();
    for name in [
        DTC_NEW_PRODUCT_COUNT_4W,
        DTC_SOLD_OUT_RATE_4W,
        DTC_PRICE_PREMIUM_VS_AMAZON,
    ] {
        put(&mut map, name, 0.0);
    }
    map
}
