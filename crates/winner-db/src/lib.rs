use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;
use winner_core::AppConfig;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

// Path relative to crates/winner-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("record not found")]
    NotFound,
    #[error("pipeline run {id} is not in expected status '{expected_status}'")]
    InvalidPipelineRunTransition {
        id: i64,
        expected_status: &'static str,
    },
    #[error("experiment {0} is already concluded")]
    ExperimentAlreadyConcluded(uuid::Uuid),
    #[error("invalid stored value in {column}: {reason}")]
    InvalidValue { column: &'static str, reason: String },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl DbError {
    pub(crate) fn invalid(column: &'static str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidValue {
            column,
            reason: reason.to_string(),
        }
    }
}

/// Open a pool sized by `config`.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Apply pending migrations and return how many were new to this database.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::migrate::MigrateError> {
    // A fresh database has no bookkeeping table yet.
    let applied: Vec<i64> =
        sqlx::query_scalar::<_, i64>("SELECT version FROM _sqlx_migrations WHERE success")
            .fetch_all(pool)
            .await
            .unwrap_or_default();

    MIGRATOR.run(pool).await?;

    Ok(MIGRATOR
        .iter()
        .filter(|m| !m.migration_type.is_down_migration() && !applied.contains(&m.version))
        .count())
}

/// Round-trip a trivial query to prove a connection can be acquired.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}


pub mod entities;
pub mod experiments;
pub mod observations;
pub mod pipeline_runs;
pub mod seed;
pub mod store;
pub mod weekly;

pub use entities::{
    find_entity_by_alias, get_entity, insert_entity, list_aliases, list_entities,
    list_entity_ids, update_entity, upsert_alias, AliasRow, EntityRow,
};
pub use experiments::{
    conclude_experiment, create_experiment, get_experiment, list_experiments, ExperimentRow,
};
pub use observations::{
    list_amazon_listings, list_amazon_reviews, list_tiktok_metrics, AmazonListingRow,
    AmazonReviewRow, TikTokMetricRow,
};
pub use pipeline_runs::{
    complete_pipeline_run, create_pipeline_run, fail_pipeline_run, get_pipeline_run,
    list_pipeline_runs, start_pipeline_run, PipelineRunRow,
};
pub use seed::seed_entities;
pub use store::PgStore;
pub use weekly::{
    get_feature_set, get_label_set, list_feature_sets, list_scores, merge_trending_label,
    upsert_feature_set, upsert_label_set, upsert_score, ScoreRow,
};
