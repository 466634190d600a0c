//! Domain types and configuration shared by every Winner Engine crate.

pub mod app_config;
pub mod config;
pub mod entities;
pub mod experiments;
pub mod observations;
pub mod weekly;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use entities::{
    load_entities, normalize_alias, Alias, AliasSeed, EntitiesFile, Entity, EntitySeed,
    EntityType, Source,
};
pub use experiments::{Experiment, ExperimentChannel, ExperimentOutcome, NewExperiment};
pub use observations::{AmazonListing, AmazonReview, QueryType, TikTokMetric};
pub use weekly::{
    validate_horizon, validate_model_version, validate_week_range, validate_week_start,
    DemandBreakdown, Explanations, FeatureMap, FeatureVersion, ModelVersion, PillarScores,
    WeeklyFeatureSet, WeeklyLabelSet, WeeklyScore, BASELINE_MODEL_VERSION,
    DEFAULT_FEATURE_VERSION, LABEL_HORIZONS_WEEKS,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read entities file {path}: {source}")]
    EntitiesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse entities file: {0}")]
    EntitiesFileParse(#[from] serde_yaml::Error),

    #[error("entities validation failed: {0}")]
    Validation(String),

    #[error("week_start {0} is not a Monday")]
    InvalidWeekStart(chrono::NaiveDate),

    #[error("unsupported label horizon {0} weeks; expected one of 4, 8, 12")]
    InvalidHorizon(u32),

    #[error("unknown model version '{0}'")]
    UnknownModelVersion(String),

    #[error("invalid date range: {from} is after {to}")]
    InvalidDateRange {
        from: chrono::NaiveDate,
        to: chrono::NaiveDate,
    },
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid entity type: {0}")]
    InvalidEntityType(String),

    #[error("invalid alias source: {0}")]
    InvalidSource(String),

    #[error("invalid query type: {0}")]
    InvalidQueryType(String),

    #[error("invalid experiment channel: {0}")]
    InvalidChannel(String),

    #[error("invalid experiment outcome: {0}")]
    InvalidOutcome(String),

    #[error("alias confidence {0} is outside [0, 1]")]
    InvalidConfidence(f64),
}
