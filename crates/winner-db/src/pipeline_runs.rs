//! Database operations for `pipeline_runs`: one row per CLI batch job.
//!
//! Status moves `queued` → `running` → `succeeded` | `failed`; every
//! transition is guarded by the expected current status.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `pipeline_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PipelineRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub run_type: String,
    pub week_start: Option<NaiveDate>,
    pub trigger_source: String,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub records_processed: i32,
    pub records_failed: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

const COLUMNS: &str = "id, public_id, run_type, week_start, trigger_source, status, started_at, \
                       completed_at, records_processed, records_failed, error_message, created_at";

/// Creates a new run in `queued` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails, including for a
/// `run_type` other than `features`, `labels` or `scores`.
pub async fn create_pipeline_run(
    pool: &PgPool,
    run_type: &str,
    week_start: Option<NaiveDate>,
    trigger_source: &str,
) -> Result<PipelineRunRow, DbError> {
    let row = sqlx::query_as::<_, PipelineRunRow>(&format!(
        "INSERT INTO pipeline_runs (public_id, run_type, week_start, trigger_source, status) \
         VALUES ($1, $2, $3, $4, 'queued') \
         RETURNING {COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(run_type)
    .bind(week_start)
    .bind(trigger_source)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a queued run as `running` and sets `started_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::InvalidPipelineRunTransition`] if the run is not
/// queued, or [`DbError::Sqlx`] if the update fails.
pub async fn start_pipeline_run(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE pipeline_runs \
         SET status = 'running', started_at = NOW() \
         WHERE id = $1 AND status = 'queued'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidPipelineRunTransition {
            id,
            expected_status: "queued",
        });
    }
    Ok(())
}

/// Marks a running run as `succeeded` with its entity tallies.
///
/// # Errors
///
/// Returns [`DbError::InvalidPipelineRunTransition`] if the run is not
/// running, or [`DbError::Sqlx`] if the update fails.
pub async fn complete_pipeline_run(
    pool: &PgPool,
    id: i64,
    records_processed: i32,
    records_failed: i32,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE pipeline_runs \
         SET status = 'succeeded', completed_at = NOW(), \
             records_processed = $1, records_failed = $2 \
         WHERE id = $3 AND status = 'running'",
    )
    .bind(records_processed)
    .bind(records_failed)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidPipelineRunTransition {
            id,
            expected_status: "running",
        });
    }
    Ok(())
}

/// Marks a running run as `failed` with an error message.
///
/// # Errors
///
/// Returns [`DbError::InvalidPipelineRunTransition`] if the run is not
/// running, or [`DbError::Sqlx`] if the update fails.
pub async fn fail_pipeline_run(pool: &PgPool, id: i64, error_message: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE pipeline_runs \
         SET status = 'failed', completed_at = NOW(), error_message = $1 \
         WHERE id = $2 AND status = 'running'",
    )
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidPipelineRunTransition {
            id,
            expected_status: "running",
        });
    }
    Ok(())
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no run has `id`, or [`DbError::Sqlx`].
pub async fn get_pipeline_run(pool: &PgPool, id: i64) -> Result<PipelineRunRow, DbError> {
    sqlx::query_as::<_, PipelineRunRow>(&format!(
        "SELECT {COLUMNS} FROM pipeline_runs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// The most recent `limit` runs, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_pipeline_runs(pool: &PgPool, limit: i64) -> Result<Vec<PipelineRunRow>, DbError> {
    let rows = sqlx::query_as::<_, PipelineRunRow>(&format!(
        "SELECT {COLUMNS} FROM pipeline_runs \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
