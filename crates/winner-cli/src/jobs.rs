//! Batch job handlers: features, labels, scores and the combined pipeline.
//!
//! Every job records a `pipeline_runs` row (queued → running → succeeded or
//! failed). Per-entity failures are logged by the engine and counted; a job
//! only fails outright when its inputs are invalid, storage is unreachable,
//! or every entity failed.

use std::future::Future;

use chrono::{Datelike, Duration, NaiveDate, Utc};
use uuid::Uuid;
use winner_core::AppConfig;
use winner_db::PgStore;
use winner_engine::{EngineError, EngineSettings, RunSummary, WeekScores};

use crate::fail_run_best_effort;

/// Results of an engine job that carry a per-entity tally.
pub(crate) trait Tallied {
    fn summary(&self) -> RunSummary;
}

impl Tallied for RunSummary {
    fn summary(&self) -> RunSummary {
        *self
    }
}

impl Tallied for WeekScores {
    fn summary(&self) -> RunSummary {
        self.summary
    }
}

/// Run `job` inside a tracked pipeline run (create → start → complete/fail).
///
/// # Errors
///
/// Returns an error if the run row cannot be created or transitioned, the
/// job itself fails, or every entity the job touched failed.
pub(crate) async fn run_tracked<T, Fut>(
    pool: &sqlx::PgPool,
    run_type: &'static str,
    week_start: Option<NaiveDate>,
    job: Fut,
) -> anyhow::Result<T>
where
    T: Tallied,
    Fut: Future<Output = Result<T, EngineError>>,
{
    let run = winner_db::create_pipeline_run(pool, run_type, week_start, "cli").await?;
    if let Err(e) = winner_db::start_pipeline_run(pool, run.id).await {
        fail_run_best_effort(pool, run.id, run_type, format!("{e:#}")).await;
        return Err(e.into());
    }

    let output = match job.await {
        Ok(output) => output,
        Err(e) => {
            fail_run_best_effort(pool, run.id, run_type, format!("{e:#}")).await;
            return Err(e.into());
        }
    };

    let summary = output.summary();
    if summary.failed > 0 && summary.failed == summary.total() {
        let message = format!("all {} entities failed {run_type}", summary.failed);
        fail_run_best_effort(pool, run.id, run_type, message.clone()).await;
        anyhow::bail!("{message}");
    }

    let processed = i32::try_from(summary.processed).unwrap_or(i32::MAX);
    let failed = i32::try_from(summary.failed).unwrap_or(i32::MAX);
    if let Err(err) = winner_db::complete_pipeline_run(pool, run.id, processed, failed).await {
        fail_run_best_effort(pool, run.id, run_type, format!("{err:#}")).await;
        return Err(err.into());
    }

    tracing::info!(
        run_id = run.id,
        run_type,
        processed = summary.processed,
        skipped = summary.skipped,
        failed = summary.failed,
        "pipeline run complete"
    );
    Ok(output)
}

fn print_summary(stage: &str, week_start: NaiveDate, summary: RunSummary) {
    println!(
        "{stage} {week_start}: {} processed, {} skipped, {} failed",
        summary.processed, summary.skipped, summary.failed
    );
}

/// Monday of the week containing `day`.
pub(crate) fn monday_of(day: NaiveDate) -> NaiveDate {
    day - Duration::days(i64::from(day.weekday().num_days_from_monday()))
}

pub(crate) async fn run_features(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    week_start: NaiveDate,
    entity_filter: Option<&[Uuid]>,
) -> anyhow::Result<()> {
    let settings = EngineSettings::from_app_config(config)?;
    let store = PgStore::new(pool.clone());
    let summary = run_tracked(
        pool,
        "features",
        Some(week_start),
        winner_engine::build_features_for_week(&store, week_start, entity_filter, &settings),
    )
    .await?;
    print_summary("features", week_start, summary);
    Ok(())
}

pub(crate) async fn run_labels(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    week_start: NaiveDate,
    until: Option<NaiveDate>,
    backfill: bool,
    today: Option<NaiveDate>,
) -> anyhow::Result<()> {
    let settings = EngineSettings::from_app_config(config)?;
    let store = PgStore::new(pool.clone());
    let today = today.unwrap_or_else(|| Utc::now().date_naive());

    let summary = if backfill {
        let to = until.unwrap_or_else(|| monday_of(today));
        run_tracked(
            pool,
            "labels",
            Some(week_start),
            winner_engine::backfill_labels(&store, week_start, to, today, &settings),
        )
        .await?
    } else {
        run_tracked(
            pool,
            "labels",
            Some(week_start),
            winner_engine::build_labels_for_week(&store, week_start, today, None, &settings),
        )
        .await?
    };
    print_summary("labels", week_start, summary);
    Ok(())
}

pub(crate) async fn run_score(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    week_start: NaiveDate,
    model_version: Option<&str>,
) -> anyhow::Result<()> {
    let mut settings = EngineSettings::from_app_config(config)?;
    if let Some(version) = model_version {
        settings.model_version = version.to_string();
    }
    let store = PgStore::new(pool.clone());
    let scored = run_tracked(
        pool,
        "scores",
        Some(week_start),
        winner_engine::score_week(&store, week_start, &settings),
    )
    .await?;
    print_summary("scores", week_start, scored.summary);
    Ok(())
}

/// Build features, score them, then print the best-ranked entities.
pub(crate) async fn run_pipeline(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    week_start: NaiveDate,
    top: i64,
) -> anyhow::Result<()> {
    let settings = EngineSettings::from_app_config(config)?;
    let store = PgStore::new(pool.clone());

    let features = run_tracked(
        pool,
        "features",
        Some(week_start),
        winner_engine::build_features_for_week(&store, week_start, None, &settings),
    )
    .await?;
    print_summary("features", week_start, features);

    let scored = run_tracked(
        pool,
        "scores",
        Some(week_start),
        winner_engine::score_week(&store, week_start, &settings),
    )
    .await?;
    print_summary("scores", week_start, scored.summary);

    let rows = winner_db::list_scores(pool, week_start, &settings.model_version, top).await?;
    if rows.is_empty() {
        println!("no scores for week {week_start}");
        return Ok(());
    }

    println!();
    println!(
        "{:<6}{:<32}{:>8}{:>8}{:>8}{:>8}{:>8}",
        "RANK", "ENTITY", "PROB", "DEMAND", "COMP", "MARGIN", "RISK"
    );
    for (position, row) in rows.iter().enumerate() {
        let name = if row.canonical_name.chars().count() > 30 {
            format!("{}...", row.canonical_name.chars().take(27).collect::<String>())
        } else {
            row.canonical_name.clone()
        };
        println!(
            "{:<6}{:<32}{:>8.4}{:>8.1}{:>8.1}{:>8.1}{:>8.1}",
            position + 1,
            name,
            row.score_winner_prob,
            row.score_demand,
            row.score_competition,
            row.score_margin,
            row.score_risk
        );
        for signal in &row.explanations.0.top_signals {
            println!("{:<6}  {signal}", "");
        }
    }
    Ok(())
}
