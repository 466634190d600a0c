//! Feature builds end to end against the in-memory store.

mod common;

use common::{alias, day, entity, hashtag, listing, review, seed_entity, week};
use winner_core::{ConfigError, FeatureMap, Source, WeeklyFeatureSet};
use winner_engine::features::{
    competition_defaults, demand_defaults, dtc_features, economics_defaults, names, nlp_features,
    risk_defaults,
};
use winner_engine::{build_features_for_week, EngineError, EngineSettings, MemoryStore, Store};

const REVIEW_COUNTS: [i64; 10] = [2000, 1250, 800, 600, 500, 400, 300, 200, 150, 100];

fn populate_history(store: &MemoryStore, brand: &str, tag: &str) {
    let current = (0_i64..).zip(REVIEW_COUNTS).map(|(i, reviews)| {
        let mut row = listing(day(-2), &format!("B00000000{i}"), brand, 100 * (i + 1));
        row.review_count = Some(reviews);
        row
    });
    let prior = (0_i64..10).map(|i| {
        let mut row = listing(day(-30), &format!("B00000000{i}"), brand, 200 * (i + 1));
        row.review_count = Some(50);
        row.price_usd = Some(22.0);
        row
    });
    store.add_listings(current.chain(prior)).unwrap();
    store
        .add_reviews([
            review(day(-4), "B000000000", "Great lamp, love it", 5.0),
            review(day(-6), "B000000001", "It broke after a week", 1.0),
        ])
        .unwrap();
    store
        .add_tiktok((1..=28).map(|d| hashtag(day(-d), tag, 10_000 * (29 - d), 5)))
        .unwrap();
}

async fn stored_features(store: &MemoryStore, id: uuid::Uuid) -> FeatureMap {
    store
        .get_feature_set(week(), id, "v1.0")
        .await
        .unwrap()
        .expect("feature set stored")
        .features
}

#[tokio::test]
async fn zero_aliases_yield_group_defaults_without_reads() {
    let store = MemoryStore::new();
    let e = entity("Unmapped concept");
    let id = e.id;
    store.add_entity(e, &[]).unwrap();

    let summary = build_features_for_week(&store, week(), None, &EngineSettings::default())
        .await
        .unwrap();
    assert_eq!(summary.processed, 1);
    assert_eq!(store.observation_reads(), 0);

    let mut expected = demand_defaults();
    expected.extend(competition_defaults());
    expected.extend(economics_defaults());
    expected.extend(risk_defaults());
    expected.extend(nlp_features());
    expected.extend(dtc_features());
    assert_eq!(stored_features(&store, id).await, expected);
}

#[tokio::test]
async fn review_median_and_p90_over_top_ten() {
    let store = MemoryStore::new();
    let id = seed_entity(&store, "Sunset lamp", "Glowco", "sunsetlamp");
    populate_history(&store, "Glowco", "sunsetlamp");

    build_features_for_week(&store, week(), None, &EngineSettings::default())
        .await
        .unwrap();

    let features = stored_features(&store, id).await;
    assert_eq!(features[names::REVIEW_MEDIAN_TOP10], Some(450.0));
    assert_eq!(features[names::REVIEW_P90_TOP10], Some(2000.0));
    assert_eq!(features[names::PRICE_MEDIAN], Some(20.0));
    assert_eq!(features[names::AMAZON_BSR_MEDIAN_TOP10], Some(550.0));
    assert_eq!(features[names::AMAZON_BSR_IMPROVEMENT_4W], Some(0.5));
    assert!(features[names::TIKTOK_VIEWS_7D].is_some_and(|v| v > 0.0));
}

#[tokio::test]
async fn future_rows_never_reach_features() {
    let e = entity("Sunset lamp");
    let aliases = [
        alias(e.id, Source::Amazon, "Glowco"),
        alias(e.id, Source::Tiktok, "sunsetlamp"),
    ];

    let clean = MemoryStore::new();
    clean.add_entity(e.clone(), &aliases).unwrap();
    populate_history(&clean, "Glowco", "sunsetlamp");

    let leaky = MemoryStore::new();
    leaky.add_entity(e.clone(), &aliases).unwrap();
    populate_history(&leaky, "Glowco", "sunsetlamp");
    leaky.ignore_date_ranges(true).unwrap();
    for offset in [0, 3, 20] {
        let mut future = listing(day(offset), "B0FUTURE01", "Glowco", 1);
        future.review_count = Some(99_999);
        future.price_usd = Some(2.0);
        leaky.add_listings([future]).unwrap();
        leaky
            .add_reviews([review(day(offset), "B000000000", "defective, refund", 1.0)])
            .unwrap();
        leaky
            .add_tiktok([hashtag(day(offset), "sunsetlamp", 1_000_000_000, 900)])
            .unwrap();
    }

    let settings = EngineSettings::default();
    build_features_for_week(&clean, week(), None, &settings)
        .await
        .unwrap();
    build_features_for_week(&leaky, week(), None, &settings)
        .await
        .unwrap();

    assert_eq!(
        stored_features(&clean, e.id).await,
        stored_features(&leaky, e.id).await
    );
}

#[tokio::test]
async fn failing_entity_does_not_abort_the_run() {
    let store = MemoryStore::new();
    let good = seed_entity(&store, "Sunset lamp", "Glowco", "sunsetlamp");
    let bad = seed_entity(&store, "Neck fan", "Breezio", "neckfan");
    populate_history(&store, "Glowco", "sunsetlamp");
    store.fail_entity(bad).unwrap();

    let settings = EngineSettings {
        max_concurrent_entities: 4,
        ..EngineSettings::default()
    };
    let summary = build_features_for_week(&store, week(), None, &settings)
        .await
        .unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 1);
    assert!(store
        .get_feature_set(week(), good, "v1.0")
        .await
        .unwrap()
        .is_some());
    assert!(store
        .get_feature_set(week(), bad, "v1.0")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn entity_filter_limits_the_run() {
    let store = MemoryStore::new();
    let picked = seed_entity(&store, "Sunset lamp", "Glowco", "sunsetlamp");
    let other = seed_entity(&store, "Neck fan", "Breezio", "neckfan");

    let settings = EngineSettings::default();
    let summary = build_features_for_week(&store, week(), Some(&[picked]), &settings)
        .await
        .unwrap();

    assert_eq!(summary.total(), 1);
    assert!(store
        .get_feature_set(week(), other, "v1.0")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn non_monday_week_is_rejected_before_any_work() {
    let store = MemoryStore::new();
    seed_entity(&store, "Sunset lamp", "Glowco", "sunsetlamp");

    let err = build_features_for_week(&store, day(2), None, &EngineSettings::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::Config(ConfigError::InvalidWeekStart(_))
    ));
    assert_eq!(store.observation_reads(), 0);
}

#[tokio::test]
async fn stored_feature_set_survives_json_round_trip() {
    let store = MemoryStore::new();
    let id = seed_entity(&store, "Sunset lamp", "Glowco", "sunsetlamp");
    populate_history(&store, "Glowco", "sunsetlamp");
    build_features_for_week(&store, week(), None, &EngineSettings::default())
        .await
        .unwrap();

    let set = store
        .get_feature_set(week(), id, "v1.0")
        .await
        .unwrap()
        .unwrap();
    let json = serde_json::to_string(&set).unwrap();
    let back: WeeklyFeatureSet = serde_json::from_str(&json).unwrap();
    assert_eq!(back, set);
}

#[tokio::test]
async fn rebuilding_a_week_overwrites_in_place() {
    let store = MemoryStore::new();
    let id = seed_entity(&store, "Sunset lamp", "Glowco", "sunsetlamp");
    let settings = EngineSettings::default();

    build_features_for_week(&store, week(), None, &settings)
        .await
        .unwrap();
    populate_history(&store, "Glowco", "sunsetlamp");
    build_features_for_week(&store, week(), None, &settings)
        .await
        .unwrap();

    let sets = store.list_feature_sets(week(), "v1.0").await.unwrap();
    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].entity_id, id);
    assert_eq!(sets[0].features[names::PRICE_MEDIAN], Some(20.0));
}

#[tokio::test]
async fn unranked_listings_still_feed_risk_proxies() {
    let store = MemoryStore::new();
    let id = seed_entity(&store, "Camp lantern", "Brightco", "camplantern");
    let mut unranked = listing(day(-2), "B0UNRANKED", "Brightco", 1);
    unranked.bsr = None;
    unranked.title = Some("Brightco lithium battery lantern".to_string());
    store.add_listings([unranked]).unwrap();

    build_features_for_week(&store, week(), None, &EngineSettings::default())
        .await
        .unwrap();

    let features = stored_features(&store, id).await;
    assert_eq!(features[names::HAZMAT_PROXY], Some(0.6));
}
