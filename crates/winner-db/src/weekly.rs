//! Database operations for the weekly feature, label and score tables.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;
use winner_core::{
    Explanations, FeatureMap, PillarScores, WeeklyFeatureSet, WeeklyLabelSet, WeeklyScore,
};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, sqlx::FromRow)]
struct FeatureSetRow {
    week_start: NaiveDate,
    entity_id: Uuid,
    feature_version: String,
    features: Json<FeatureMap>,
}

impl From<FeatureSetRow> for WeeklyFeatureSet {
    fn from(row: FeatureSetRow) -> Self {
        WeeklyFeatureSet {
            week_start: row.week_start,
            entity_id: row.entity_id,
            feature_version: row.feature_version,
            features: row.features.0,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct LabelSetRow {
    week_start: NaiveDate,
    entity_id: Uuid,
    label_winner_4w: Option<bool>,
    label_winner_8w: Option<bool>,
    label_winner_12w: Option<bool>,
    label_trend_spike: Option<bool>,
    label_durable: Option<bool>,
    label_trending: Option<bool>,
}

impl From<LabelSetRow> for WeeklyLabelSet {
    fn from(row: LabelSetRow) -> Self {
        WeeklyLabelSet {
            week_start: row.week_start,
            entity_id: row.entity_id,
            winner_4w: row.label_winner_4w,
            winner_8w: row.label_winner_8w,
            winner_12w: row.label_winner_12w,
            trend_spike: row.label_trend_spike,
            durable: row.label_durable,
            trending: row.label_trending,
        }
    }
}

/// A row from `entity_weekly_scores`, joined with the entity name for reports.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScoreRow {
    pub week_start: NaiveDate,
    pub entity_id: Uuid,
    pub canonical_name: String,
    pub model_version: String,
    pub score_winner_prob: f64,
    pub score_rank: f64,
    pub score_demand: f64,
    pub score_competition: f64,
    pub score_margin: f64,
    pub score_risk: f64,
    pub explanations: Json<Explanations>,
    pub updated_at: DateTime<Utc>,
}

impl From<ScoreRow> for WeeklyScore {
    fn from(row: ScoreRow) -> Self {
        WeeklyScore {
            week_start: row.week_start,
            entity_id: row.entity_id,
            model_version: row.model_version,
            pillars: PillarScores {
                demand: row.score_demand,
                competition: row.score_competition,
                margin: row.score_margin,
                risk: row.score_risk,
            },
            winner_prob: row.score_winner_prob,
            rank: row.score_rank,
            explanations: row.explanations.0,
        }
    }
}

// ---------------------------------------------------------------------------
// entity_weekly_features
// ---------------------------------------------------------------------------

/// Inserts or replaces the feature set for `(week_start, entity_id, feature_version)`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_feature_set(pool: &PgPool, set: &WeeklyFeatureSet) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO entity_weekly_features (week_start, entity_id, feature_version, features) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (week_start, entity_id, feature_version) DO UPDATE SET \
             features   = EXCLUDED.features, \
             updated_at = NOW()",
    )
    .bind(set.week_start)
    .bind(set.entity_id)
    .bind(&set.feature_version)
    .bind(Json(&set.features))
    .execute(pool)
    .await?;
    Ok(())
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query or JSON decode fails.
pub async fn get_feature_set(
    pool: &PgPool,
    week_start: NaiveDate,
    entity_id: Uuid,
    feature_version: &str,
) -> Result<Option<WeeklyFeatureSet>, DbError> {
    let row = sqlx::query_as::<_, FeatureSetRow>(
        "SELECT week_start, entity_id, feature_version, features \
         FROM entity_weekly_features \
         WHERE week_start = $1 AND entity_id = $2 AND feature_version = $3",
    )
    .bind(week_start)
    .bind(entity_id)
    .bind(feature_version)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(WeeklyFeatureSet::from))
}

/// Every feature set of one week and version, ordered by entity id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query or JSON decode fails.
pub async fn list_feature_sets(
    pool: &PgPool,
    week_start: NaiveDate,
    feature_version: &str,
) -> Result<Vec<WeeklyFeatureSet>, DbError> {
    let rows = sqlx::query_as::<_, FeatureSetRow>(
        "SELECT week_start, entity_id, feature_version, features \
         FROM entity_weekly_features \
         WHERE week_start = $1 AND feature_version = $2 \
         ORDER BY entity_id",
    )
    .bind(week_start)
    .bind(feature_version)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(WeeklyFeatureSet::from).collect())
}

// ---------------------------------------------------------------------------
// entity_weekly_labels
// ---------------------------------------------------------------------------

/// Inserts or merges a label set. Non-null fields overwrite; null fields
/// keep whatever is stored, so a pending horizon never clears a label.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_label_set(pool: &PgPool, labels: &WeeklyLabelSet) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO entity_weekly_labels \
             (week_start, entity_id, label_winner_4w, label_winner_8w, label_winner_12w, \
              label_trend_spike, label_durable, label_trending) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (week_start, entity_id) DO UPDATE SET \
             label_winner_4w   = COALESCE(EXCLUDED.label_winner_4w, entity_weekly_labels.label_winner_4w), \
             label_winner_8w   = COALESCE(EXCLUDED.label_winner_8w, entity_weekly_labels.label_winner_8w), \
             label_winner_12w  = COALESCE(EXCLUDED.label_winner_12w, entity_weekly_labels.label_winner_12w), \
             label_trend_spike = COALESCE(EXCLUDED.label_trend_spike, entity_weekly_labels.label_trend_spike), \
             label_durable     = COALESCE(EXCLUDED.label_durable, entity_weekly_labels.label_durable), \
             label_trending    = COALESCE(EXCLUDED.label_trending, entity_weekly_labels.label_trending), \
             updated_at        = NOW()",
    )
    .bind(labels.week_start)
    .bind(labels.entity_id)
    .bind(labels.winner_4w)
    .bind(labels.winner_8w)
    .bind(labels.winner_12w)
    .bind(labels.trend_spike)
    .bind(labels.durable)
    .bind(labels.trending)
    .execute(pool)
    .await?;
    Ok(())
}

/// ORs `trending` into the stored flag, creating the row if needed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn merge_trending_label(
    pool: &PgPool,
    week_start: NaiveDate,
    entity_id: Uuid,
    trending: bool,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO entity_weekly_labels (week_start, entity_id, label_trending) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (week_start, entity_id) DO UPDATE SET \
             label_trending = COALESCE(entity_weekly_labels.label_trending, false) \
                              OR EXCLUDED.label_trending, \
             updated_at     = NOW()",
    )
    .bind(week_start)
    .bind(entity_id)
    .bind(trending)
    .execute(pool)
    .await?;
    Ok(())
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_label_set(
    pool: &PgPool,
    week_start: NaiveDate,
    entity_id: Uuid,
) -> Result<Option<WeeklyLabelSet>, DbError> {
    let row = sqlx::query_as::<_, LabelSetRow>(
        "SELECT week_start, entity_id, label_winner_4w, label_winner_8w, label_winner_12w, \
                label_trend_spike, label_durable, label_trending \
         FROM entity_weekly_labels \
         WHERE week_start = $1 AND entity_id = $2",
    )
    .bind(week_start)
    .bind(entity_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(WeeklyLabelSet::from))
}

// ---------------------------------------------------------------------------
// entity_weekly_scores
// ---------------------------------------------------------------------------

/// Inserts or replaces the score for `(week_start, entity_id, model_version)`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_score(pool: &PgPool, score: &WeeklyScore) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO entity_weekly_scores \
             (week_start, entity_id, model_version, score_winner_prob, score_rank, \
              score_demand, score_competition, score_margin, score_risk, explanations) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         ON CONFLICT (week_start, entity_id, model_version) DO UPDATE SET \
             score_winner_prob = EXCLUDED.score_winner_prob, \
             score_rank        = EXCLUDED.score_rank, \
             score_demand      = EXCLUDED.score_demand, \
             score_competition = EXCLUDED.score_competition, \
             score_margin      = EXCLUDED.score_margin, \
             score_risk        = EXCLUDED.score_risk, \
             explanations      = EXCLUDED.explanations, \
             updated_at        = NOW()",
    )
    .bind(score.week_start)
    .bind(score.entity_id)
    .bind(&score.model_version)
    .bind(score.winner_prob)
    .bind(score.rank)
    .bind(score.pillars.demand)
    .bind(score.pillars.competition)
    .bind(score.pillars.margin)
    .bind(score.pillars.risk)
    .bind(Json(&score.explanations))
    .execute(pool)
    .await?;
    Ok(())
}

/// The best `limit` scores of a week, rank descending, ties by entity id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query or JSON decode fails.
pub async fn list_scores(
    pool: &PgPool,
    week_start: NaiveDate,
    model_version: &str,
    limit: i64,
) -> Result<Vec<ScoreRow>, DbError> {
    let rows = sqlx::query_as::<_, ScoreRow>(
        "SELECT s.week_start, s.entity_id, e.canonical_name, s.model_version, \
                s.score_winner_prob, s.score_rank, s.score_demand, s.score_competition, \
                s.score_margin, s.score_risk, s.explanations, s.updated_at \
         FROM entity_weekly_scores s \
         JOIN entities e ON e.entity_id = s.entity_id \
         WHERE s.week_start = $1 AND s.model_version = $2 \
         ORDER BY s.score_rank DESC, s.entity_id \
         LIMIT $3",
    )
    .bind(week_start)
    .bind(model_version)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
