//! Postgres implementation of the engine's [`Store`].

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;
use winner_core::{
    Alias, AmazonListing, AmazonReview, Entity, QueryType, Source, TikTokMetric,
    WeeklyFeatureSet, WeeklyLabelSet, WeeklyScore,
};
use winner_engine::{DateRange, Store};

use crate::{entities, observations, weekly, DbError};

/// A [`Store`] backed by a connection pool. Cheap to clone.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    type Error = DbError;

    async fn list_entity_ids(&self, filter: Option<&[Uuid]>) -> Result<Vec<Uuid>, DbError> {
        entities::list_entity_ids(&self.pool, filter).await
    }

    async fn get_entity(&self, entity_id: Uuid) -> Result<Option<Entity>, DbError> {
        entities::get_entity(&self.pool, entity_id).await
    }

    async fn insert_entity(&self, entity: &Entity) -> Result<(), DbError> {
        entities::insert_entity(&self.pool, entity).await
    }

    async fn update_entity(&self, entity: &Entity) -> Result<(), DbError> {
        entities::update_entity(&self.pool, entity).await
    }

    async fn find_entity_by_alias(
        &self,
        source: Source,
        alias_text: &str,
    ) -> Result<Option<Uuid>, DbError> {
        entities::find_entity_by_alias(&self.pool, source, alias_text).await
    }

    async fn upsert_alias(&self, alias: &Alias) -> Result<(), DbError> {
        entities::upsert_alias(&self.pool, alias).await
    }

    async fn resolve_aliases(&self, entity_id: Uuid) -> Result<Vec<Alias>, DbError> {
        entities::list_aliases(&self.pool, entity_id).await
    }

    async fn amazon_listings(
        &self,
        aliases: &[String],
        range: DateRange,
    ) -> Result<Vec<AmazonListing>, DbError> {
        observations::list_amazon_listings(&self.pool, aliases, range.start(), range.end()).await
    }

    async fn amazon_reviews(
        &self,
        asins: &[String],
        range: DateRange,
        limit: usize,
    ) -> Result<Vec<AmazonReview>, DbError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        observations::list_amazon_reviews(&self.pool, asins, range.start(), range.end(), limit)
            .await
    }

    async fn tiktok_metrics(
        &self,
        queries: Option<&[String]>,
        query_type: Option<QueryType>,
        range: DateRange,
    ) -> Result<Vec<TikTokMetric>, DbError> {
        observations::list_tiktok_metrics(
            &self.pool,
            queries,
            query_type,
            range.start(),
            range.end(),
        )
        .await
    }

    async fn upsert_feature_set(&self, set: &WeeklyFeatureSet) -> Result<(), DbError> {
        weekly::upsert_feature_set(&self.pool, set).await
    }

    async fn get_feature_set(
        &self,
        week_start: NaiveDate,
        entity_id: Uuid,
        feature_version: &str,
    ) -> Result<Option<WeeklyFeatureSet>, DbError> {
        weekly::get_feature_set(&self.pool, week_start, entity_id, feature_version).await
    }

    async fn list_feature_sets(
        &self,
        week_start: NaiveDate,
        feature_version: &str,
    ) -> Result<Vec<WeeklyFeatureSet>, DbError> {
        weekly::list_feature_sets(&self.pool, week_start, feature_version).await
    }

    async fn upsert_label_set(&self, labels: &WeeklyLabelSet) -> Result<(), DbError> {
        weekly::upsert_label_set(&self.pool, labels).await
    }

    async fn merge_trending_label(
        &self,
        week_start: NaiveDate,
        entity_id: Uuid,
        trending: bool,
    ) -> Result<(), DbError> {
        weekly::merge_trending_label(&self.pool, week_start, entity_id, trending).await
    }

    async fn get_label_set(
        &self,
        week_start: NaiveDate,
        entity_id: Uuid,
    ) -> Result<Option<WeeklyLabelSet>, DbError> {
        weekly::get_label_set(&self.pool, week_start, entity_id).await
    }

    async fn upsert_score(&self, score: &WeeklyScore) -> Result<(), DbError> {
        weekly::upsert_score(&self.pool, score).await
    }
}
