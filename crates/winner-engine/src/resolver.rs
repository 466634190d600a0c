//! Canonical entity identity across marketplaces.

use std::collections::BTreeMap;

use uuid::Uuid;
use winner_core::{normalize_alias, Alias, Entity, EntityType, Source};

use crate::error::EngineError;
use crate::store::Store;

/// Alias confidence used when an alias creates its own entity.
pub const DEFAULT_DISCOVERED_CONFIDENCE: f64 = 0.8;

/// An entity's aliases grouped by source. Texts within a source are sorted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AliasSet {
    by_source: BTreeMap<Source, Vec<String>>,
}

impl AliasSet {
    #[must_use]
    pub fn from_aliases(aliases: &[Alias]) -> Self {
        let mut by_source: BTreeMap<Source, Vec<String>> = BTreeMap::new();
        for alias in aliases {
            by_source
                .entry(alias.source)
                .or_default()
                .push(alias.alias_text.clone());
        }
        for texts in by_source.values_mut() {
            texts.sort();
            texts.dedup();
        }
        Self { by_source }
    }

    /// Alias texts for `source`; empty when the entity has none there.
    #[must_use]
    pub fn texts(&self, source: Source) -> &[String] {
        self.by_source.get(&source).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_source.values().all(Vec::is_empty)
    }
}

/// Maps per-source identifiers to canonical entity ids through a [`Store`].
pub struct Resolver<'a, S: Store> {
    store: &'a S,
}

impl<'a, S: Store> Resolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// # Errors
    ///
    /// Returns [`EngineError::Storage`] if the alias read fails.
    pub async fn aliases(&self, entity_id: Uuid) -> Result<AliasSet, EngineError> {
        let aliases = self
            .store
            .resolve_aliases(entity_id)
            .await
            .map_err(EngineError::storage)?;
        Ok(AliasSet::from_aliases(&aliases))
    }

    /// Entity owning the normalized form of `raw` for `source`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Storage`] if the lookup fails.
    pub async fn find_entity(
        &self,
        source: Source,
        raw: &str,
    ) -> Result<Option<Uuid>, EngineError> {
        let text = normalize_alias(source, raw);
        self.store
            .find_entity_by_alias(source, &text)
            .await
            .map_err(EngineError::storage)
    }

    /// Create an entity with a fresh id.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Storage`] if the insert fails.
    pub async fn create_entity(
        &self,
        entity_type: EntityType,
        canonical_name: &str,
        category_primary: Option<&str>,
    ) -> Result<Entity, EngineError> {
        let entity = Entity {
            id: Uuid::new_v4(),
            entity_type,
            canonical_name: canonical_name.trim().to_string(),
            category_primary: category_primary.map(str::to_string),
        };
        self.store
            .insert_entity(&entity)
            .await
            .map_err(EngineError::storage)?;
        tracing::debug!(entity = %entity.id, name = %entity.canonical_name, "created entity");
        Ok(entity)
    }

    /// Correct an entity's display name or category. The id is immutable.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EntityNotFound`] for an unknown id, or
    /// [`EngineError::Storage`] on a store failure.
    pub async fn correct_entity(
        &self,
        entity_id: Uuid,
        canonical_name: Option<&str>,
        category_primary: Option<&str>,
    ) -> Result<Entity, EngineError> {
        let mut entity = self
            .store
            .get_entity(entity_id)
            .await
            .map_err(EngineError::storage)?
            .ok_or(EngineError::EntityNotFound(entity_id))?;
        if let Some(name) = canonical_name {
            entity.canonical_name = name.trim().to_string();
        }
        if let Some(category) = category_primary {
            entity.category_primary = Some(category.to_string());
        }
        self.store
            .update_entity(&entity)
            .await
            .map_err(EngineError::storage)?;
        Ok(entity)
    }

    /// Attach an alias to an existing entity.
    ///
    /// Re-registering an alias the entity already owns keeps the higher
    /// confidence. An alias owned by a different entity is refused.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Core`] for a confidence outside `[0, 1]`,
    /// [`EngineError::EntityNotFound`], [`EngineError::AliasOwnedElsewhere`],
    /// or [`EngineError::Storage`].
    pub async fn register_alias(
        &self,
        entity_id: Uuid,
        source: Source,
        raw: &str,
        confidence: f64,
    ) -> Result<Alias, EngineError> {
        let alias = Alias::new(entity_id, source, raw, confidence)?;

        if self
            .store
            .get_entity(entity_id)
            .await
            .map_err(EngineError::storage)?
            .is_none()
        {
            return Err(EngineError::EntityNotFound(entity_id));
        }

        if let Some(owner) = self
            .store
            .find_entity_by_alias(source, &alias.alias_text)
            .await
            .map_err(EngineError::storage)?
        {
            if owner != entity_id {
                return Err(EngineError::AliasOwnedElsewhere {
                    alias: alias.alias_text,
                    owner,
                });
            }
        }

        self.store
            .upsert_alias(&alias)
            .await
            .map_err(EngineError::storage)?;
        Ok(alias)
    }

    /// Return the entity owning `raw`, creating one named after the alias
    /// when none does.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Storage`] on a store failure.
    pub async fn get_or_create_entity_for_alias(
        &self,
        source: Source,
        raw: &str,
        entity_type: EntityType,
        category_primary: Option<&str>,
    ) -> Result<Uuid, EngineError> {
        if let Some(id) = self.find_entity(source, raw).await? {
            return Ok(id);
        }
        let entity = self
            .create_entity(entity_type, raw, category_primary)
            .await?;
        self.register_alias(entity.id, source, raw, DEFAULT_DISCOVERED_CONFIDENCE)
            .await?;
        Ok(entity.id)
    }
}
