//! Entity and alias management.
//!
//! Writes go through the engine's [`Resolver`] so alias ownership and
//! confidence rules match the batch jobs.

use clap::Subcommand;
use uuid::Uuid;
use winner_core::{EntityType, Source};
use winner_db::PgStore;
use winner_engine::Resolver;

#[derive(Debug, Subcommand)]
pub enum EntityCommands {
    /// Create a canonical entity
    Add {
        /// concept, keyword_cluster, brand or store
        #[arg(long = "type", default_value = "concept")]
        entity_type: EntityType,
        #[arg(long)]
        name: String,
        #[arg(long)]
        category: Option<String>,
    },
    /// Attach a per-source alias to an entity
    Alias {
        #[arg(long)]
        entity: Uuid,
        /// amazon, tiktok, shopify or manual
        #[arg(long)]
        source: Source,
        /// Raw alias text; normalized before storage
        #[arg(long)]
        text: String,
        #[arg(long, default_value = "1.0")]
        confidence: f64,
    },
    /// Correct an entity's display name or category
    Rename {
        #[arg(long)]
        entity: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
    /// List entities with their aliases
    List {
        #[arg(long = "type")]
        entity_type: Option<EntityType>,
        #[arg(long, default_value = "50")]
        limit: i64,
    },
}

pub(crate) async fn run(pool: &sqlx::PgPool, command: EntityCommands) -> anyhow::Result<()> {
    let store = PgStore::new(pool.clone());
    let resolver = Resolver::new(&store);

    match command {
        EntityCommands::Add {
            entity_type,
            name,
            category,
        } => {
            let entity = resolver
                .create_entity(entity_type, &name, category.as_deref())
                .await?;
            println!("created {} {} ({})", entity.entity_type, entity.canonical_name, entity.id);
        }
        EntityCommands::Alias {
            entity,
            source,
            text,
            confidence,
        } => {
            let alias = resolver
                .register_alias(entity, source, &text, confidence)
                .await?;
            println!(
                "{}:{} -> {} (confidence {:.2})",
                alias.source, alias.alias_text, alias.entity_id, alias.confidence
            );
        }
        EntityCommands::Rename {
            entity,
            name,
            category,
        } => {
            if name.is_none() && category.is_none() {
                anyhow::bail!("nothing to change; pass --name and/or --category");
            }
            let updated = resolver
                .correct_entity(entity, name.as_deref(), category.as_deref())
                .await?;
            println!("updated {} ({})", updated.canonical_name, updated.id);
        }
        EntityCommands::List { entity_type, limit } => {
            list_entities(pool, entity_type, limit).await?;
        }
    }
    Ok(())
}

async fn list_entities(
    pool: &sqlx::PgPool,
    entity_type: Option<EntityType>,
    limit: i64,
) -> anyhow::Result<()> {
    let rows = winner_db::list_entities(pool, entity_type, limit).await?;
    if rows.is_empty() {
        println!("no entities found; run `db seed` or `entity add` first");
        return Ok(());
    }

    println!("{:<38}{:<17}{:<32}CATEGORY", "ID", "TYPE", "NAME");
    for row in &rows {
        println!(
            "{:<38}{:<17}{:<32}{}",
            row.entity_id,
            row.entity_type,
            row.canonical_name,
            row.category_primary.as_deref().unwrap_or("\u{2014}")
        );
        for alias in winner_db::list_aliases(pool, row.entity_id).await? {
            println!(
                "{:<38}  {}:{} ({:.2})",
                "", alias.source, alias.alias_text, alias.confidence
            );
        }
    }
    Ok(())
}
