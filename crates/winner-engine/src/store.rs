//! The storage collaborator the engine reads observations from and writes
//! weekly aggregates to.
//!
//! Implementations own dialect details. They must provide upsert semantics
//! per key; the engine does no locking of its own.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;
use winner_core::{
    Alias, AmazonListing, AmazonReview, Entity, QueryType, Source, TikTokMetric,
    WeeklyFeatureSet, WeeklyLabelSet, WeeklyScore,
};

use crate::window::DateRange;

#[async_trait]
pub trait Store: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    // -- entities & aliases -------------------------------------------------

    /// All entity ids, or only those in `filter` that exist. Sorted.
    async fn list_entity_ids(&self, filter: Option<&[Uuid]>) -> Result<Vec<Uuid>, Self::Error>;

    async fn get_entity(&self, entity_id: Uuid) -> Result<Option<Entity>, Self::Error>;

    async fn insert_entity(&self, entity: &Entity) -> Result<(), Self::Error>;

    /// Correct an entity's name or category. The id never changes.
    async fn update_entity(&self, entity: &Entity) -> Result<(), Self::Error>;

    async fn find_entity_by_alias(
        &self,
        source: Source,
        alias_text: &str,
    ) -> Result<Option<Uuid>, Self::Error>;

    /// Insert an alias. On a `(source, alias_text)` conflict the stored
    /// confidence becomes the maximum of old and new; ownership is unchanged.
    async fn upsert_alias(&self, alias: &Alias) -> Result<(), Self::Error>;

    async fn resolve_aliases(&self, entity_id: Uuid) -> Result<Vec<Alias>, Self::Error>;

    // -- observations (read-only) -------------------------------------------

    /// Listings in `range` matching any alias, ordered by `dt` then `asin`.
    async fn amazon_listings(
        &self,
        aliases: &[String],
        range: DateRange,
    ) -> Result<Vec<AmazonListing>, Self::Error>;

    /// Reviews in `range` for `asins` with non-null text, newest first, at most `limit`.
    async fn amazon_reviews(
        &self,
        asins: &[String],
        range: DateRange,
        limit: usize,
    ) -> Result<Vec<AmazonReview>, Self::Error>;

    /// TikTok rows in `range`, ordered by `dt` then `query`. `queries: None`
    /// returns every query; `query_type: None` returns every type.
    async fn tiktok_metrics(
        &self,
        queries: Option<&[String]>,
        query_type: Option<QueryType>,
        range: DateRange,
    ) -> Result<Vec<TikTokMetric>, Self::Error>;

    // -- weekly aggregates --------------------------------------------------

    async fn upsert_feature_set(&self, set: &WeeklyFeatureSet) -> Result<(), Self::Error>;

    async fn get_feature_set(
        &self,
        week_start: NaiveDate,
        entity_id: Uuid,
        feature_version: &str,
    ) -> Result<Option<WeeklyFeatureSet>, Self::Error>;

    async fn list_feature_sets(
        &self,
        week_start: NaiveDate,
        feature_version: &str,
    ) -> Result<Vec<WeeklyFeatureSet>, Self::Error>;

    /// Upsert a label row. `Some` fields overwrite; `None` fields keep what is stored.
    async fn upsert_label_set(&self, labels: &WeeklyLabelSet) -> Result<(), Self::Error>;

    /// OR `trending` into the stored row, creating it if absent.
    async fn merge_trending_label(
        &self,
        week_start: NaiveDate,
        entity_id: Uuid,
        trending: bool,
    ) -> Result<(), Self::Error>;

    async fn get_label_set(
        &self,
        week_start: NaiveDate,
        entity_id: Uuid,
    ) -> Result<Option<WeeklyLabelSet>, Self::Error>;

    async fn upsert_score(&self, score: &WeeklyScore) -> Result<(), Self::Error>;
}
