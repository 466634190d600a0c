use sqlx::PgPool;
use uuid::Uuid;
use winner_core::{normalize_alias, EntitySeed};

use crate::DbError;

/// Upsert entities and their aliases from the seed file.
///
/// Entities are matched on `(type, lower(name))`, so re-seeding keeps ids
/// stable and only refreshes the category. Aliases keep their owner and
/// take the higher confidence. Everything runs in one transaction.
///
/// Returns the number of entities processed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails; nothing is
/// written in that case.
pub async fn seed_entities(pool: &PgPool, entities: &[EntitySeed]) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;
    let mut count = 0usize;

    for entity in entities {
        let entity_id: Uuid = sqlx::query_scalar(
            "INSERT INTO entities (entity_id, entity_type, canonical_name, category_primary) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (entity_type, lower(canonical_name)) DO UPDATE SET \
                 category_primary = COALESCE(EXCLUDED.category_primary, entities.category_primary), \
                 updated_at = NOW() \
             RETURNING entity_id",
        )
        .bind(Uuid::new_v4())
        .bind(entity.entity_type.as_str())
        .bind(entity.name.trim())
        .bind(&entity.category)
        .fetch_one(&mut *tx)
        .await?;

        for alias in &entity.aliases {
            sqlx::query(
                "INSERT INTO entity_aliases (entity_id, source, alias_text, confidence) \
                 VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (source, alias_text) DO UPDATE SET \
                     confidence = GREATEST(entity_aliases.confidence, EXCLUDED.confidence), \
                     updated_at = NOW()",
            )
            .bind(entity_id)
            .bind(alias.source.as_str())
            .bind(normalize_alias(alias.source, &alias.text))
            .bind(alias.confidence)
            .execute(&mut *tx)
            .await?;
        }

        count += 1;
    }

    tx.commit().await?;
    tracing::info!(count, "seeded entities");
    Ok(count)
}
