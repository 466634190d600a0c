//! Database operations for `entities` and `entity_aliases`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use winner_core::{Alias, Entity, EntityType, Source};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `entities` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EntityRow {
    pub entity_id: Uuid,
    pub entity_type: String,
    pub canonical_name: String,
    pub category_primary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<EntityRow> for Entity {
    type Error = DbError;

    fn try_from(row: EntityRow) -> Result<Self, Self::Error> {
        Ok(Entity {
            id: row.entity_id,
            entity_type: row
                .entity_type
                .parse::<EntityType>()
                .map_err(|e| DbError::invalid("entities.entity_type", e))?,
            canonical_name: row.canonical_name,
            category_primary: row.category_primary,
        })
    }
}

/// A row from the `entity_aliases` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AliasRow {
    pub id: i64,
    pub entity_id: Uuid,
    pub source: String,
    pub alias_text: String,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AliasRow> for Alias {
    type Error = DbError;

    fn try_from(row: AliasRow) -> Result<Self, Self::Error> {
        Ok(Alias {
            entity_id: row.entity_id,
            source: row
                .source
                .parse::<Source>()
                .map_err(|e| DbError::invalid("entity_aliases.source", e))?,
            alias_text: row.alias_text,
            confidence: row.confidence,
        })
    }
}

// ---------------------------------------------------------------------------
// entities
// ---------------------------------------------------------------------------

/// Inserts a new entity with the id chosen by the caller.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails, including on a duplicate
/// id or a duplicate `(entity_type, canonical_name)`.
pub async fn insert_entity(pool: &PgPool, entity: &Entity) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO entities (entity_id, entity_type, canonical_name, category_primary) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(entity.id)
    .bind(entity.entity_type.as_str())
    .bind(&entity.canonical_name)
    .bind(&entity.category_primary)
    .execute(pool)
    .await?;
    Ok(())
}

/// Corrects an entity's name and category. The id and type never change.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no entity has `entity.id`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_entity(pool: &PgPool, entity: &Entity) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE entities \
         SET canonical_name = $1, category_primary = $2, updated_at = NOW() \
         WHERE entity_id = $3",
    )
    .bind(&entity.canonical_name)
    .bind(&entity.category_primary)
    .bind(entity.id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Returns a single entity, or `None` if not found.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or
/// [`DbError::InvalidValue`] for an unknown stored entity type.
pub async fn get_entity(pool: &PgPool, entity_id: Uuid) -> Result<Option<Entity>, DbError> {
    let row = sqlx::query_as::<_, EntityRow>(
        "SELECT entity_id, entity_type, canonical_name, category_primary, created_at, updated_at \
         FROM entities \
         WHERE entity_id = $1",
    )
    .bind(entity_id)
    .fetch_optional(pool)
    .await?;

    row.map(Entity::try_from).transpose()
}

/// Returns entities ordered by name, optionally of one type.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_entities(
    pool: &PgPool,
    entity_type: Option<EntityType>,
    limit: i64,
) -> Result<Vec<EntityRow>, DbError> {
    let rows = sqlx::query_as::<_, EntityRow>(
        "SELECT entity_id, entity_type, canonical_name, category_primary, created_at, updated_at \
         FROM entities \
         WHERE ($1::TEXT IS NULL OR entity_type = $1) \
         ORDER BY canonical_name, entity_id \
         LIMIT $2",
    )
    .bind(entity_type.map(EntityType::as_str))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns entity ids in ascending order, restricted to `filter` when given.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_entity_ids(pool: &PgPool, filter: Option<&[Uuid]>) -> Result<Vec<Uuid>, DbError> {
    let ids = sqlx::query_scalar::<_, Uuid>(
        "SELECT entity_id FROM entities \
         WHERE ($1::UUID[] IS NULL OR entity_id = ANY($1)) \
         ORDER BY entity_id",
    )
    .bind(filter)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

// ---------------------------------------------------------------------------
// entity_aliases
// ---------------------------------------------------------------------------

/// Returns the entity owning `(source, alias_text)`, if any. `alias_text`
/// must already be normalized.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_entity_by_alias(
    pool: &PgPool,
    source: Source,
    alias_text: &str,
) -> Result<Option<Uuid>, DbError> {
    let id = sqlx::query_scalar::<_, Uuid>(
        "SELECT entity_id FROM entity_aliases \
         WHERE source = $1 AND alias_text = $2",
    )
    .bind(source.as_str())
    .bind(alias_text)
    .fetch_optional(pool)
    .await?;

    Ok(id)
}

/// Inserts an alias. On a `(source, alias_text)` conflict the stored
/// confidence becomes the larger of the two; the owner never changes.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_alias(pool: &PgPool, alias: &Alias) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO entity_aliases (entity_id, source, alias_text, confidence) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (source, alias_text) DO UPDATE SET \
             confidence = GREATEST(entity_aliases.confidence, EXCLUDED.confidence), \
             updated_at = NOW()",
    )
    .bind(alias.entity_id)
    .bind(alias.source.as_str())
    .bind(&alias.alias_text)
    .bind(alias.confidence)
    .execute(pool)
    .await?;
    Ok(())
}

/// Returns every alias of an entity, ordered by source then text.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or
/// [`DbError::InvalidValue`] for an unknown stored source.
pub async fn list_aliases(pool: &PgPool, entity_id: Uuid) -> Result<Vec<Alias>, DbError> {
    let rows = sqlx::query_as::<_, AliasRow>(
        "SELECT id, entity_id, source, alias_text, confidence, created_at \
         FROM entity_aliases \
         WHERE entity_id = $1 \
         ORDER BY source, alias_text",
    )
    .bind(entity_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Alias::try_from).collect()
}
