//! Horizon labels, trending merge and backfill against the in-memory store.

mod common;

use chrono::Duration;
use common::{day, hashtag, listing, seed_entity, week};
use uuid::Uuid;
use winner_core::{ConfigError, WeeklyLabelSet};
use winner_engine::labels::compute_horizon_label;
use winner_engine::{
    backfill_labels, build_labels_for_week, Aggregator, EngineError, EngineSettings,
    LabelOutcome, LabelThresholds, MemoryStore, Resolver, Store,
};

const ASIN: &str = "B0LAMP0001";

/// Baseline snapshot in the week before `week()`, then one row per horizon
/// week with the given BSRs and a review count growing by 25 per week.
fn add_weekly_bsr(store: &MemoryStore, baseline: i64, weekly: &[i64]) {
    let mut rows = vec![listing(day(-3), ASIN, "Glowco", baseline)];
    for (i, bsr) in (0_i64..).zip(weekly) {
        let mut row = listing(day(7 * i + 3), ASIN, "Glowco", *bsr);
        row.review_count = Some(100 + 25 * (i + 1));
        rows.push(row);
    }
    store.add_listings(rows).unwrap();
}

/// `flat` steady queries plus a fast-growing `sunsetlamp`.
fn add_trend_window(store: &MemoryStore, flat: usize) {
    let mut rows = Vec::new();
    for q in 0..flat {
        for d in 0..14 {
            rows.push(hashtag(day(d), &format!("flat{q}"), 1_000, 10));
        }
    }
    for d in 0..14 {
        rows.push(hashtag(day(d), "sunsetlamp", 1_000 + d * 5_000, 10 + d));
    }
    store.add_tiktok(rows).unwrap();
}

fn settings() -> EngineSettings {
    EngineSettings::default()
}

async fn labels_of(store: &MemoryStore, id: Uuid) -> WeeklyLabelSet {
    store
        .get_label_set(week(), id)
        .await
        .unwrap()
        .expect("label set stored")
}

#[tokio::test]
async fn eight_week_label_is_pending_before_its_horizon() {
    let store = MemoryStore::new();
    let id = seed_entity(&store, "Sunset lamp", "Glowco", "sunsetlamp");
    add_weekly_bsr(&store, 1000, &[900, 800, 700, 600, 500, 400, 300, 200]);
    let aliases = Resolver::new(&store).aliases(id).await.unwrap();
    let agg = Aggregator::new(&store);

    let outcome = compute_horizon_label(
        &agg,
        &aliases,
        week(),
        8,
        day(55),
        10,
        &LabelThresholds::default(),
    )
    .await
    .unwrap();

    assert_eq!(
        outcome,
        LabelOutcome::Pending {
            ready_on: week() + Duration::weeks(8)
        }
    );
}

#[tokio::test]
async fn untracked_horizon_is_a_config_error() {
    let store = MemoryStore::new();
    let id = seed_entity(&store, "Sunset lamp", "Glowco", "sunsetlamp");
    let aliases = Resolver::new(&store).aliases(id).await.unwrap();

    let err = compute_horizon_label(
        &Aggregator::new(&store),
        &aliases,
        week(),
        6,
        day(200),
        10,
        &LabelThresholds::default(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, EngineError::Config(ConfigError::InvalidHorizon(6))));
}

#[tokio::test]
async fn elapsed_horizons_are_labelled_and_later_ones_stay_unset() {
    let store = MemoryStore::new();
    let id = seed_entity(&store, "Sunset lamp", "Glowco", "sunsetlamp");
    add_weekly_bsr(&store, 1000, &[900, 800, 700, 500]);
    add_trend_window(&store, 10);

    let summary = build_labels_for_week(&store, week(), day(35), None, &settings())
        .await
        .unwrap();

    assert_eq!(summary.processed, 1);
    let labels = labels_of(&store, id).await;
    assert_eq!(labels.winner_4w, Some(true));
    assert_eq!(labels.winner_8w, None);
    assert_eq!(labels.winner_12w, None);
    assert_eq!(labels.durable, None);
    assert_eq!(labels.trending, Some(true));
}

#[tokio::test]
async fn pending_horizons_never_clear_stored_labels() {
    let store = MemoryStore::new();
    let id = seed_entity(&store, "Sunset lamp", "Glowco", "sunsetlamp");
    let mut earlier = WeeklyLabelSet::new(week(), id);
    earlier.winner_8w = Some(true);
    earlier.trending = Some(true);
    store.upsert_label_set(&earlier).await.unwrap();

    build_labels_for_week(&store, week(), day(35), None, &settings())
        .await
        .unwrap();

    let labels = labels_of(&store, id).await;
    assert_eq!(labels.winner_4w, Some(false));
    assert_eq!(labels.winner_8w, Some(true));
    assert_eq!(labels.trending, Some(true));
}

#[tokio::test]
async fn steady_climb_is_a_durable_eight_week_winner() {
    let store = MemoryStore::new();
    let id = seed_entity(&store, "Sunset lamp", "Glowco", "sunsetlamp");
    add_weekly_bsr(&store, 1000, &[900, 800, 700, 600, 500, 400, 300, 200]);

    build_labels_for_week(&store, week(), day(56), None, &settings())
        .await
        .unwrap();

    let labels = labels_of(&store, id).await;
    assert_eq!(labels.winner_4w, Some(true));
    assert_eq!(labels.winner_8w, Some(true));
    assert_eq!(labels.winner_12w, None);
    assert_eq!(labels.durable, Some(true));
    assert_eq!(labels.trend_spike, Some(false));
    assert_eq!(labels.trending, Some(false));
}

#[tokio::test]
async fn early_spike_that_fades_is_a_trend_spike() {
    let store = MemoryStore::new();
    let id = seed_entity(&store, "Neck fan", "Glowco", "neckfan");
    add_weekly_bsr(&store, 1000, &[300, 350, 500, 600, 700, 800, 850, 900]);

    build_labels_for_week(&store, week(), day(56), None, &settings())
        .await
        .unwrap();

    let labels = labels_of(&store, id).await;
    assert_eq!(labels.trend_spike, Some(true));
    assert_eq!(labels.durable, Some(false));
    assert_eq!(labels.winner_8w, Some(false));
}

#[tokio::test]
async fn missing_observations_label_false_not_error() {
    let store = MemoryStore::new();
    let id = seed_entity(&store, "Sunset lamp", "Glowco", "sunsetlamp");

    let summary = build_labels_for_week(&store, week(), day(120), None, &settings())
        .await
        .unwrap();

    assert_eq!(summary.failed, 0);
    let labels = labels_of(&store, id).await;
    assert_eq!(labels.winner_4w, Some(false));
    assert_eq!(labels.winner_8w, Some(false));
    assert_eq!(labels.winner_12w, Some(false));
    assert_eq!(labels.durable, Some(false));
    assert_eq!(labels.trend_spike, Some(false));
}

#[tokio::test]
async fn backfill_skips_weeks_not_yet_labelable() {
    let store = MemoryStore::new();
    let id = seed_entity(&store, "Sunset lamp", "Glowco", "sunsetlamp");

    let summary = backfill_labels(
        &store,
        week(),
        week() + Duration::weeks(3),
        day(21),
        &settings(),
    )
    .await
    .unwrap();

    assert_eq!(summary.processed, 2);
    for offset in [0, 1] {
        let ws = week() + Duration::weeks(offset);
        let labels = store.get_label_set(ws, id).await.unwrap().unwrap();
        assert_eq!(labels.winner_4w, None);
        assert_eq!(labels.trending, Some(false));
    }
    for offset in [2, 3] {
        let ws = week() + Duration::weeks(offset);
        assert!(store.get_label_set(ws, id).await.unwrap().is_none());
    }
}

#[tokio::test]
async fn backfill_rejects_inverted_range() {
    let store = MemoryStore::new();

    let err = backfill_labels(
        &store,
        week() + Duration::weeks(2),
        week(),
        day(200),
        &settings(),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        EngineError::Config(ConfigError::InvalidDateRange { .. })
    ));
}

#[tokio::test]
async fn fast_grower_trends_among_few_queries() {
    for flat in [1, 4, 9] {
        let store = MemoryStore::new();
        let lamp = seed_entity(&store, "Sunset lamp", "Glowco", "sunsetlamp");
        let other = seed_entity(&store, "Neck fan", "Coolio", "flat0");
        add_trend_window(&store, flat);

        build_labels_for_week(&store, week(), day(14), None, &settings())
            .await
            .unwrap();

        assert_eq!(labels_of(&store, lamp).await.trending, Some(true), "{flat} flat");
        assert_eq!(labels_of(&store, other).await.trending, Some(false), "{flat} flat");
    }
}

#[tokio::test]
async fn trend_read_failure_keeps_horizon_labels() {
    let store = MemoryStore::new();
    let id = seed_entity(&store, "Sunset lamp", "Glowco", "sunsetlamp");
    add_weekly_bsr(&store, 1000, &[900, 800, 700, 500]);
    add_trend_window(&store, 10);
    store.fail_tiktok_reads().unwrap();

    let summary = build_labels_for_week(&store, week(), day(35), None, &settings())
        .await
        .unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 0);
    let labels = labels_of(&store, id).await;
    assert_eq!(labels.winner_4w, Some(true));
    assert_eq!(labels.trending, None);
}

#[tokio::test]
async fn backfill_continues_past_trend_read_failures() {
    let store = MemoryStore::new();
    let id = seed_entity(&store, "Sunset lamp", "Glowco", "sunsetlamp");
    add_weekly_bsr(&store, 1000, &[900, 800, 700, 500, 450, 400, 350, 300]);
    store.fail_tiktok_reads().unwrap();

    let summary = backfill_labels(
        &store,
        week(),
        week() + Duration::weeks(1),
        day(42),
        &settings(),
    )
    .await
    .unwrap();

    assert_eq!(summary.processed, 2);
    for offset in [0, 1] {
        let ws = week() + Duration::weeks(offset);
        let labels = store.get_label_set(ws, id).await.unwrap().unwrap();
        assert!(labels.winner_4w.is_some());
        assert_eq!(labels.trending, None);
    }
}
