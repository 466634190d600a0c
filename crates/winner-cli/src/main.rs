mod entity;
mod experiment;
mod jobs;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::entity::EntityCommands;
use crate::experiment::ExperimentCommands;

#[derive(Debug, Parser)]
#[command(name = "winner-cli")]
#[command(about = "Weekly winner scoring for product concepts")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Build weekly feature sets from observations before the week start
    Features {
        /// Monday of the week to build (YYYY-MM-DD)
        #[arg(long)]
        week_start: NaiveDate,
        /// Restrict the run to these entity ids (repeatable)
        #[arg(long = "entity")]
        entities: Vec<Uuid>,
    },
    /// Build forward-looking labels once their horizons have elapsed
    Labels {
        /// Monday of the (first) week to label
        #[arg(long)]
        week_start: NaiveDate,
        /// Last week of a backfill range; defaults to the current week
        #[arg(long, requires = "backfill")]
        until: Option<NaiveDate>,
        /// Label every week from `--week-start` through `--until`
        #[arg(long)]
        backfill: bool,
        /// Evaluate horizons as of this date instead of today
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// Score every entity with features for the week
    Score {
        /// Monday of the week to score
        #[arg(long)]
        week_start: NaiveDate,
        /// Scoring model; defaults to `WINNER_MODEL_VERSION`
        #[arg(long)]
        model_version: Option<String>,
    },
    /// Build features, score, and print the top-ranked entities
    Pipeline {
        /// Monday of the week to run
        #[arg(long)]
        week_start: NaiveDate,
        /// Number of ranked entities to print
        #[arg(long, default_value = "20")]
        top: i64,
    },
    /// Manage canonical entities and their aliases
    Entity {
        #[command(subcommand)]
        command: EntityCommands,
    },
    /// Record validation experiments
    Experiment {
        #[command(subcommand)]
        command: ExperimentCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
    /// Load entities and aliases from the entities YAML file
    Seed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("winner-cli ready; run with --help to list commands");
        return Ok(());
    };

    let config = winner_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = winner_db::PoolConfig::from_app_config(&config);
    let pool = winner_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db { command } => run_db(&pool, &config, command).await,
        Commands::Features {
            week_start,
            entities,
        } => {
            let filter = (!entities.is_empty()).then_some(entities.as_slice());
            jobs::run_features(&pool, &config, week_start, filter).await
        }
        Commands::Labels {
            week_start,
            until,
            backfill,
            today,
        } => jobs::run_labels(&pool, &config, week_start, until, backfill, today).await,
        Commands::Score {
            week_start,
            model_version,
        } => jobs::run_score(&pool, &config, week_start, model_version.as_deref()).await,
        Commands::Pipeline { week_start, top } => {
            jobs::run_pipeline(&pool, &config, week_start, top).await
        }
        Commands::Entity { command } => entity::run(&pool, command).await,
        Commands::Experiment { command } => experiment::run(&pool, command).await,
    }
}

async fn run_db(
    pool: &sqlx::PgPool,
    config: &winner_core::AppConfig,
    command: DbCommands,
) -> anyhow::Result<()> {
    match command {
        DbCommands::Ping => {
            winner_db::ping(pool).await?;
            println!("database reachable");
        }
        DbCommands::Migrate => {
            let applied = winner_db::run_migrations(pool).await?;
            println!("applied {applied} migrations");
        }
        DbCommands::Seed => {
            let file = winner_core::load_entities(&config.entities_path)?;
            let count = winner_db::seed_entities(pool, &file.entities).await?;
            println!(
                "seeded {count} entities from {}",
                config.entities_path.display()
            );
        }
    }
    Ok(())
}

/// Attempt to mark a pipeline run as failed, logging any secondary error.
async fn fail_run_best_effort(
    pool: &sqlx::PgPool,
    run_id: i64,
    context: &'static str,
    message: String,
) {
    if let Err(mark_err) = winner_db::fail_pipeline_run(pool, run_id, &message).await {
        tracing::error!(
            run_id,
            error = %mark_err,
            "failed to mark {context} run as failed"
        );
    }
}
