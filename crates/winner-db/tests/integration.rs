//! Offline tests for winner-db pool configuration and row types.
//! These tests do not require a live database connection.

use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use serde_json::json;
use sqlx::types::Json;
use uuid::Uuid;
use winner_core::{AppConfig, Entity, Environment, Experiment, ExperimentOutcome};
use winner_db::{EntityRow, ExperimentRow, PipelineRunRow, PoolConfig};

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let app_config = AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        log_level: "info".to_string(),
        entities_path: PathBuf::from("./config/entities.yaml"),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        feature_version: "v1.0".to_string(),
        model_version: "baseline".to_string(),
        top_k: 10,
        alignment_min_bsr_improvement: 0.0,
        max_concurrent_entities: 1,
    };

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

#[test]
fn entity_row_converts_to_domain_entity() {
    let id = Uuid::new_v4();
    let row = EntityRow {
        entity_id: id,
        entity_type: "keyword_cluster".to_string(),
        canonical_name: "Sunset lamp".to_string(),
        category_primary: Some("Home & Kitchen".to_string()),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    let entity = Entity::try_from(row).unwrap();
    assert_eq!(entity.id, id);
    assert_eq!(entity.entity_type, winner_core::EntityType::KeywordCluster);
}

#[test]
fn entity_row_with_unknown_type_is_rejected() {
    let row = EntityRow {
        entity_id: Uuid::new_v4(),
        entity_type: "gadget".to_string(),
        canonical_name: "Sunset lamp".to_string(),
        category_primary: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    assert!(matches!(
        Entity::try_from(row),
        Err(winner_db::DbError::InvalidValue { .. })
    ));
}

#[test]
fn experiment_row_maps_outcome_and_blobs() {
    let row = ExperimentRow {
        experiment_id: Uuid::new_v4(),
        week_start: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
        entity_id: Uuid::new_v4(),
        channel: "shopify_fake_door".to_string(),
        hypothesis: "People click through at 3%".to_string(),
        setup_json: Json(json!({ "budget_usd": 50 })),
        started_at: Utc::now(),
        ended_at: Some(Utc::now()),
        outcome: Some("pass".to_string()),
        metrics_json: Some(Json(json!({ "ctr": 0.041 }))),
        notes: None,
    };

    let experiment = Experiment::try_from(row).unwrap();
    assert_eq!(experiment.outcome, Some(ExperimentOutcome::Pass));
    assert!(experiment.is_concluded());
    assert_eq!(experiment.setup["budget_usd"], 50);
}

/// Compile-time smoke test: confirm that [`PipelineRunRow`] has all expected
/// fields with the correct types. No database required.
#[test]
fn pipeline_run_row_has_expected_fields() {
    let row = PipelineRunRow {
        id: 1_i64,
        public_id: Uuid::new_v4(),
        run_type: "features".to_string(),
        week_start: NaiveDate::from_ymd_opt(2026, 3, 2),
        trigger_source: "cli".to_string(),
        status: "queued".to_string(),
        started_at: None,
        completed_at: None,
        records_processed: 0_i32,
        records_failed: 0_i32,
        error_message: None,
        created_at: Utc::now(),
    };

    assert_eq!(row.run_type, "features");
    assert_eq!(row.status, "queued");
    assert!(row.started_at.is_none());
    assert_eq!(row.records_processed, 0);
}
