use std::str::FromStr;

use crate::app_config::{AppConfig, Environment};
use crate::weekly::validate_model_version;
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can feed a `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("WINNER_ENV", "development"))?;
    let log_level = or_default("WINNER_LOG_LEVEL", "info");
    let entities_path = PathBuf::from(or_default(
        "WINNER_ENTITIES_PATH",
        "./config/entities.yaml",
    ));

    let db_max_connections: u32 = parse_var(&or_default, "WINNER_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections: u32 = parse_var(&or_default, "WINNER_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs: u64 =
        parse_var(&or_default, "WINNER_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let feature_version = or_default("WINNER_FEATURE_VERSION", crate::DEFAULT_FEATURE_VERSION);
    if feature_version.trim().is_empty() {
        return Err(ConfigError::InvalidEnvVar {
            var: "WINNER_FEATURE_VERSION".to_string(),
            reason: "must be non-empty".to_string(),
        });
    }

    let model_version = or_default("WINNER_MODEL_VERSION", crate::BASELINE_MODEL_VERSION);
    validate_model_version(&model_version)?;

    let top_k: usize = parse_var(&or_default, "WINNER_TOP_K", "10")?;
    if top_k == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "WINNER_TOP_K".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    let alignment_min_bsr_improvement: f64 =
        parse_var(&or_default, "WINNER_ALIGNMENT_MIN_BSR_IMPROVEMENT", "0.0")?;
    if !alignment_min_bsr_improvement.is_finite() {
        return Err(ConfigError::InvalidEnvVar {
            var: "WINNER_ALIGNMENT_MIN_BSR_IMPROVEMENT".to_string(),
            reason: "must be a finite number".to_string(),
        });
    }

    let max_concurrent_entities: usize =
        parse_var(&or_default, "WINNER_MAX_CONCURRENT_ENTITIES", "1")?;

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        entities_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        feature_version,
        model_version,
        top_k,
        alignment_min_bsr_improvement,
        max_concurrent_entities,
    })
}

fn parse_var<T, D>(or_default: &D, var: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    D: Fn(&str, &str) -> String,
{
    let raw = or_default(var, default);
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "WINNER_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
