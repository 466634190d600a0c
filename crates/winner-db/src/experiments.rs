//! Database operations for the `experiments` table.
//!
//! Experiments are created when started and concluded exactly once. They
//! are never deleted and never read by scoring.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;
use winner_core::{Experiment, ExperimentChannel, ExperimentOutcome, NewExperiment};

use crate::DbError;

/// A row from the `experiments` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ExperimentRow {
    pub experiment_id: Uuid,
    pub week_start: NaiveDate,
    pub entity_id: Uuid,
    pub channel: String,
    pub hypothesis: String,
    pub setup_json: Json<Value>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub outcome: Option<String>,
    pub metrics_json: Option<Json<Value>>,
    pub notes: Option<String>,
}

impl TryFrom<ExperimentRow> for Experiment {
    type Error = DbError;

    fn try_from(row: ExperimentRow) -> Result<Self, Self::Error> {
        Ok(Experiment {
            id: row.experiment_id,
            week_start: row.week_start,
            entity_id: row.entity_id,
            channel: row
                .channel
                .parse::<ExperimentChannel>()
                .map_err(|e| DbError::invalid("experiments.channel", e))?,
            hypothesis: row.hypothesis,
            setup: row.setup_json.0,
            started_at: row.started_at,
            ended_at: row.ended_at,
            outcome: row
                .outcome
                .map(|o| o.parse::<ExperimentOutcome>())
                .transpose()
                .map_err(|e| DbError::invalid("experiments.outcome", e))?,
            metrics: row.metrics_json.map(|m| m.0),
            notes: row.notes,
        })
    }
}

const COLUMNS: &str = "experiment_id, week_start, entity_id, channel, hypothesis, setup_json, \
                       started_at, ended_at, outcome, metrics_json, notes";

/// Starts an experiment now and returns it.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (e.g. unknown entity).
pub async fn create_experiment(pool: &PgPool, new: &NewExperiment) -> Result<Experiment, DbError> {
    let row = sqlx::query_as::<_, ExperimentRow>(&format!(
        "INSERT INTO experiments (experiment_id, week_start, entity_id, channel, hypothesis, setup_json) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING {COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(new.week_start)
    .bind(new.entity_id)
    .bind(new.channel.as_str())
    .bind(&new.hypothesis)
    .bind(Json(&new.setup))
    .fetch_one(pool)
    .await?;

    Experiment::try_from(row)
}

/// Records the outcome of a running experiment and stamps `ended_at`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] for an unknown id,
/// [`DbError::ExperimentAlreadyConcluded`] if it already has an outcome, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn conclude_experiment(
    pool: &PgPool,
    experiment_id: Uuid,
    outcome: ExperimentOutcome,
    metrics: Option<&Value>,
    notes: Option<&str>,
) -> Result<Experiment, DbError> {
    let row = sqlx::query_as::<_, ExperimentRow>(&format!(
        "UPDATE experiments \
         SET outcome = $1, metrics_json = $2, notes = COALESCE($3, notes), ended_at = NOW() \
         WHERE experiment_id = $4 AND outcome IS NULL \
         RETURNING {COLUMNS}"
    ))
    .bind(outcome.as_str())
    .bind(metrics.map(Json))
    .bind(notes)
    .bind(experiment_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Experiment::try_from(row),
        None => match get_experiment(pool, experiment_id).await? {
            Some(_) => Err(DbError::ExperimentAlreadyConcluded(experiment_id)),
            None => Err(DbError::NotFound),
        },
    }
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_experiment(
    pool: &PgPool,
    experiment_id: Uuid,
) -> Result<Option<Experiment>, DbError> {
    let row = sqlx::query_as::<_, ExperimentRow>(&format!(
        "SELECT {COLUMNS} FROM experiments WHERE experiment_id = $1"
    ))
    .bind(experiment_id)
    .fetch_optional(pool)
    .await?;

    row.map(Experiment::try_from).transpose()
}

/// Experiments newest first, optionally for one entity.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_experiments(
    pool: &PgPool,
    entity_id: Option<Uuid>,
    limit: i64,
) -> Result<Vec<Experiment>, DbError> {
    let rows = sqlx::query_as::<_, ExperimentRow>(&format!(
        "SELECT {COLUMNS} FROM experiments \
         WHERE ($1::UUID IS NULL OR entity_id = $1) \
         ORDER BY started_at DESC, experiment_id \
         LIMIT $2"
    ))
    .bind(entity_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Experiment::try_from).collect()
}
