//! Weekly batch orchestration: features, scores and label backfill.
//!
//! Each orchestrator validates its inputs up front, then processes entities
//! independently with at most `max_concurrent_entities` in flight. A failing
//! entity is logged, counted and skipped; it never aborts the run.

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate};
use futures::stream::{self, StreamExt};
use uuid::Uuid;
use winner_core::{
    validate_model_version, validate_week_range, validate_week_start, AppConfig, ConfigError,
    Source, WeeklyFeatureSet, WeeklyLabelSet, WeeklyScore, LABEL_HORIZONS_WEEKS,
};

use crate::error::EngineError;
use crate::features::{build_entity_features, FeatureConfig};
use crate::labels::{
    compute_horizon_label, compute_trending, LabelOutcome, LabelThresholds, TRENDING_WINDOW_DAYS,
};
use crate::resolver::Resolver;
use crate::scoring::{score, sort_by_rank};
use crate::store::Store;
use crate::window::Aggregator;

/// Everything a batch run needs besides the store.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub feature_version: String,
    pub model_version: String,
    pub features: FeatureConfig,
    pub thresholds: LabelThresholds,
    pub max_concurrent_entities: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            feature_version: winner_core::DEFAULT_FEATURE_VERSION.to_string(),
            model_version: winner_core::BASELINE_MODEL_VERSION.to_string(),
            features: FeatureConfig::default(),
            thresholds: LabelThresholds::default(),
            max_concurrent_entities: 1,
        }
    }
}

impl EngineSettings {
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configured versions or sizes are unusable.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let settings = Self {
            feature_version: config.feature_version.clone(),
            model_version: config.model_version.clone(),
            features: FeatureConfig {
                top_k: config.top_k,
                alignment_min_bsr_improvement: config.alignment_min_bsr_improvement,
            },
            thresholds: LabelThresholds::default(),
            max_concurrent_entities: config.max_concurrent_entities,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError`] for an unknown model version, an empty
    /// feature version, or a zero top-K.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_model_version(&self.model_version)?;
        if self.feature_version.trim().is_empty() {
            return Err(ConfigError::InvalidEnvVar {
                var: "WINNER_FEATURE_VERSION".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.features.top_k == 0 {
            return Err(ConfigError::InvalidEnvVar {
                var: "WINNER_TOP_K".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    fn concurrency(&self) -> usize {
        self.max_concurrent_entities.max(1)
    }
}

/// Per-entity tally of one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Entities whose results were written.
    pub processed: usize,
    /// Entities with nothing to write yet (e.g. every label horizon pending).
    pub skipped: usize,
    /// Entities that failed and were logged.
    pub failed: usize,
}

impl RunSummary {
    #[must_use]
    pub fn total(&self) -> usize {
        self.processed + self.skipped + self.failed
    }

    fn absorb(&mut self, other: RunSummary) {
        self.processed += other.processed;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Scores for one week, best first, with the run tally.
#[derive(Debug, Clone, PartialEq)]
pub struct WeekScores {
    pub scores: Vec<WeeklyScore>,
    pub summary: RunSummary,
}

enum EntityOutcome {
    Written,
    Skipped,
    Failed(EngineError),
}

fn tally(
    stage: &'static str,
    week_start: NaiveDate,
    results: Vec<(Uuid, EntityOutcome)>,
) -> RunSummary {
    let mut summary = RunSummary::default();
    for (entity_id, outcome) in results {
        match outcome {
            EntityOutcome::Written => summary.processed += 1,
            EntityOutcome::Skipped => summary.skipped += 1,
            EntityOutcome::Failed(e) => {
                tracing::error!(
                    entity = %entity_id,
                    week_start = %week_start,
                    error = %e,
                    "{stage} failed for entity"
                );
                summary.failed += 1;
            }
        }
    }
    if summary.failed > 0 {
        tracing::warn!(
            stage,
            failed = summary.failed,
            total = summary.total(),
            "some entities failed"
        );
    }
    summary
}

/// Compute and persist feature sets for every entity (or the filtered ones)
/// for `week_start`, using only observations strictly before it.
///
/// # Errors
///
/// Returns [`EngineError::Config`] for invalid inputs, or
/// [`EngineError::Storage`] if the entity list cannot be read. Per-entity
/// failures are reported in the summary.
pub async fn build_features_for_week<S: Store>(
    store: &S,
    week_start: NaiveDate,
    entity_filter: Option<&[Uuid]>,
    settings: &EngineSettings,
) -> Result<RunSummary, EngineError> {
    validate_week_start(week_start)?;
    settings.validate()?;

    let ids = store
        .list_entity_ids(entity_filter)
        .await
        .map_err(EngineError::storage)?;
    tracing::info!(week_start = %week_start, entities = ids.len(), "building features");

    let resolver = Resolver::new(store);
    let agg = Aggregator::new(store);

    let results: Vec<(Uuid, EntityOutcome)> = stream::iter(ids)
        .map(|entity_id| {
            let resolver = &resolver;
            let agg = &agg;
            async move {
                let outcome = async {
                    let aliases = resolver.aliases(entity_id).await?;
                    let features =
                        build_entity_features(agg, &aliases, week_start, &settings.features).await;
                    let set = WeeklyFeatureSet {
                        week_start,
                        entity_id,
                        feature_version: settings.feature_version.clone(),
                        features,
                    };
                    store
                        .upsert_feature_set(&set)
                        .await
                        .map_err(EngineError::storage)?;
                    tracing::debug!(entity = %entity_id, "stored features");
                    Ok::<_, EngineError>(())
                }
                .await;
                match outcome {
                    Ok(()) => (entity_id, EntityOutcome::Written),
                    Err(e) => (entity_id, EntityOutcome::Failed(e)),
                }
            }
        })
        .buffer_unordered(settings.concurrency())
        .collect()
        .await;

    let summary = tally("features", week_start, results);
    tracing::info!(
        week_start = %week_start,
        processed = summary.processed,
        failed = summary.failed,
        "feature build complete"
    );
    Ok(summary)
}

/// Score every stored feature set of `week_start`, persist the scores, and
/// return them ordered by rank descending (ties by entity id).
///
/// # Errors
///
/// Returns [`EngineError::Config`] for an invalid week or model version, or
/// [`EngineError::Storage`] if the feature sets cannot be listed.
pub async fn score_week<S: Store>(
    store: &S,
    week_start: NaiveDate,
    settings: &EngineSettings,
) -> Result<WeekScores, EngineError> {
    validate_week_start(week_start)?;
    settings.validate()?;

    let sets = store
        .list_feature_sets(week_start, &settings.feature_version)
        .await
        .map_err(EngineError::storage)?;
    if sets.is_empty() {
        tracing::warn!(
            week_start = %week_start,
            feature_version = %settings.feature_version,
            "no feature sets found for week"
        );
        return Ok(WeekScores {
            scores: Vec::new(),
            summary: RunSummary::default(),
        });
    }

    let model_version = settings.model_version.as_str();
    let results: Vec<(Uuid, Result<WeeklyScore, EngineError>)> = stream::iter(sets)
        .map(|set| async move {
            let weekly = score(&set.features).into_weekly(week_start, set.entity_id, model_version);
            let stored = store
                .upsert_score(&weekly)
                .await
                .map(|()| weekly)
                .map_err(EngineError::storage);
            (set.entity_id, stored)
        })
        .buffer_unordered(settings.concurrency())
        .collect()
        .await;

    let mut scores = Vec::with_capacity(results.len());
    let mut outcomes = Vec::with_capacity(results.len());
    for (entity_id, result) in results {
        match result {
            Ok(weekly) => {
                scores.push(weekly);
                outcomes.push((entity_id, EntityOutcome::Written));
            }
            Err(e) => outcomes.push((entity_id, EntityOutcome::Failed(e))),
        }
    }
    sort_by_rank(&mut scores);

    let summary = tally("scoring", week_start, outcomes);
    tracing::info!(
        week_start = %week_start,
        model_version,
        scored = scores.len(),
        "scoring complete"
    );
    Ok(WeekScores { scores, summary })
}

/// Compute and persist every label of `week_start` whose horizon has
/// elapsed by `today`. Pending horizons stay unset and never clear a stored
/// value; `trending` is OR-merged once its two-week window has elapsed.
///
/// A failed trend-window read is logged and skips only the `trending` merge.
///
/// # Errors
///
/// Returns [`EngineError::Config`] for an invalid week, or
/// [`EngineError::Storage`] if the entity list cannot be read.
pub async fn build_labels_for_week<S: Store>(
    store: &S,
    week_start: NaiveDate,
    today: NaiveDate,
    entity_filter: Option<&[Uuid]>,
    settings: &EngineSettings,
) -> Result<RunSummary, EngineError> {
    validate_week_start(week_start)?;
    settings.validate()?;

    let ids = store
        .list_entity_ids(entity_filter)
        .await
        .map_err(EngineError::storage)?;
    tracing::info!(
        week_start = %week_start,
        today = %today,
        entities = ids.len(),
        "building labels"
    );

    let resolver = Resolver::new(store);
    let agg = Aggregator::new(store);
    let trending = match compute_trending(&agg, week_start, today).await {
        Ok(trending) => trending,
        Err(e) => {
            tracing::error!(
                week_start = %week_start,
                error = %e,
                "trend pass failed, keeping horizon labels only"
            );
            None
        }
    };

    let results: Vec<(Uuid, EntityOutcome)> = stream::iter(ids)
        .map(|entity_id| {
            let resolver = &resolver;
            let agg = &agg;
            let trending = trending.as_ref();
            async move {
                let labelled = label_entity(
                    store, resolver, agg, entity_id, week_start, today, trending, settings,
                )
                .await;
                match labelled {
                    Ok(true) => (entity_id, EntityOutcome::Written),
                    Ok(false) => (entity_id, EntityOutcome::Skipped),
                    Err(e) => (entity_id, EntityOutcome::Failed(e)),
                }
            }
        })
        .buffer_unordered(settings.concurrency())
        .collect()
        .await;

    Ok(tally("labels", week_start, results))
}

/// Returns whether anything was written for the entity.
#[allow(clippy::too_many_arguments)]
async fn label_entity<S: Store>(
    store: &S,
    resolver: &Resolver<'_, S>,
    agg: &Aggregator<'_, S>,
    entity_id: Uuid,
    week_start: NaiveDate,
    today: NaiveDate,
    trending: Option<&BTreeSet<String>>,
    settings: &EngineSettings,
) -> Result<bool, EngineError> {
    let aliases = resolver.aliases(entity_id).await?;

    let mut labels = WeeklyLabelSet::new(week_start, entity_id);
    for horizon in LABEL_HORIZONS_WEEKS {
        let outcome = compute_horizon_label(
            agg,
            &aliases,
            week_start,
            horizon,
            today,
            settings.features.top_k,
            &settings.thresholds,
        )
        .await?;
        if let LabelOutcome::Computed(computed) = outcome {
            labels.set_winner(horizon, computed.winner);
            if let Some(durable) = computed.durable {
                labels.durable = Some(durable);
            }
            if let Some(spike) = computed.trend_spike {
                labels.trend_spike = Some(spike);
            }
        }
    }

    let mut wrote = false;
    if !labels.is_empty() {
        store
            .upsert_label_set(&labels)
            .await
            .map_err(EngineError::storage)?;
        wrote = true;
    }

    if let Some(trending) = trending {
        let is_trending = aliases
            .texts(Source::Tiktok)
            .iter()
            .any(|q| trending.contains(q));
        store
            .merge_trending_label(week_start, entity_id, is_trending)
            .await
            .map_err(EngineError::storage)?;
        wrote = true;
    }

    Ok(wrote)
}

/// Build labels for every Monday in `[from, to]`. Weeks with nothing
/// computable by `today` are skipped, not treated as errors. A week that
/// fails is logged and the backfill moves on to the next one.
///
/// # Errors
///
/// Returns [`EngineError::Config`] for an invalid range or settings, or the
/// last week-level error when every attempted week failed.
pub async fn backfill_labels<S: Store>(
    store: &S,
    from: NaiveDate,
    to: NaiveDate,
    today: NaiveDate,
    settings: &EngineSettings,
) -> Result<RunSummary, EngineError> {
    validate_week_range(from, to)?;
    settings.validate()?;

    let mut summary = RunSummary::default();
    let mut attempted = 0usize;
    let mut failed_weeks = 0usize;
    let mut last_error = None;
    let mut week_start = from;
    while week_start <= to {
        if today < week_start + Duration::days(TRENDING_WINDOW_DAYS) {
            tracing::info!(
                week_start = %week_start,
                today = %today,
                "week not labelable yet, skipping"
            );
        } else {
            attempted += 1;
            match build_labels_for_week(store, week_start, today, None, settings).await {
                Ok(week) => summary.absorb(week),
                Err(e) => {
                    tracing::error!(
                        week_start = %week_start,
                        error = %e,
                        "label build failed for week"
                    );
                    failed_weeks += 1;
                    last_error = Some(e);
                }
            }
        }
        week_start += Duration::weeks(1);
    }

    if let Some(e) = last_error {
        if failed_weeks == attempted {
            return Err(e);
        }
    }

    tracing::info!(
        from = %from,
        to = %to,
        processed = summary.processed,
        skipped = summary.skipped,
        failed = summary.failed,
        "label backfill complete"
    );
    Ok(summary)
}
