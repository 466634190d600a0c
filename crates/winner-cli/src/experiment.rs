//! Validation experiment bookkeeping.

use chrono::NaiveDate;
use clap::Subcommand;
use serde_json::Value;
use uuid::Uuid;
use winner_core::{ExperimentChannel, ExperimentOutcome, NewExperiment};

#[derive(Debug, Subcommand)]
pub enum ExperimentCommands {
    /// Start an experiment for an entity
    Create {
        #[arg(long)]
        entity: Uuid,
        /// Monday of the scoring week that prompted the experiment
        #[arg(long)]
        week_start: NaiveDate,
        /// shopify_fake_door, tiktok_creative or amazon_feasibility
        #[arg(long)]
        channel: ExperimentChannel,
        #[arg(long)]
        hypothesis: String,
        /// Setup details as a JSON object
        #[arg(long, default_value = "{}")]
        setup: String,
    },
    /// Record the outcome of a running experiment
    Conclude {
        #[arg(long)]
        id: Uuid,
        /// pass, fail or inconclusive
        #[arg(long)]
        outcome: ExperimentOutcome,
        /// Observed metrics as a JSON object
        #[arg(long)]
        metrics: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List experiments, newest first
    List {
        #[arg(long)]
        entity: Option<Uuid>,
        #[arg(long, default_value = "20")]
        limit: i64,
    },
}

fn parse_json(flag: &str, raw: &str) -> anyhow::Result<Value> {
    serde_json::from_str(raw).map_err(|e| anyhow::anyhow!("--{flag} is not valid JSON: {e}"))
}

pub(crate) async fn run(pool: &sqlx::PgPool, command: ExperimentCommands) -> anyhow::Result<()> {
    match command {
        ExperimentCommands::Create {
            entity,
            week_start,
            channel,
            hypothesis,
            setup,
        } => {
            winner_core::validate_week_start(week_start)?;
            if hypothesis.trim().is_empty() {
                anyhow::bail!("--hypothesis must not be empty");
            }
            let new = NewExperiment {
                week_start,
                entity_id: entity,
                channel,
                hypothesis,
                setup: parse_json("setup", &setup)?,
            };
            let experiment = winner_db::create_experiment(pool, &new).await?;
            println!("started experiment {} ({channel})", experiment.id);
        }
        ExperimentCommands::Conclude {
            id,
            outcome,
            metrics,
            notes,
        } => {
            let metrics = metrics
                .as_deref()
                .map(|raw| parse_json("metrics", raw))
                .transpose()?;
            let experiment = winner_db::conclude_experiment(
                pool,
                id,
                outcome,
                metrics.as_ref(),
                notes.as_deref(),
            )
            .await?;
            println!("experiment {} concluded: {outcome}", experiment.id);
        }
        ExperimentCommands::List { entity, limit } => {
            let experiments = winner_db::list_experiments(pool, entity, limit).await?;
            if experiments.is_empty() {
                println!("no experiments found");
                return Ok(());
            }
            println!(
                "{:<38}{:<12}{:<20}{:<14}HYPOTHESIS",
                "ID", "WEEK", "CHANNEL", "OUTCOME"
            );
            for e in &experiments {
                let outcome = e
                    .outcome
                    .map_or_else(|| "running".to_string(), |o| o.to_string());
                println!(
                    "{:<38}{:<12}{:<20}{:<14}{}",
                    e.id, e.week_start, e.channel, outcome, e.hypothesis
                );
            }
        }
    }
    Ok(())
}
