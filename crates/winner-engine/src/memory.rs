//! In-process [`Store`] for tests and dry runs.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;
use winner_core::{
    Alias, AmazonListing, AmazonReview, Entity, QueryType, Source, TikTokMetric,
    WeeklyFeatureSet, WeeklyLabelSet, WeeklyScore,
};

use crate::store::Store;
use crate::window::DateRange;

#[derive(Debug, Error)]
pub enum MemoryStoreError {
    #[error("memory store lock poisoned")]
    Poisoned,

    #[error("entity {0} already exists")]
    DuplicateEntity(Uuid),

    #[error("entity {0} not found")]
    UnknownEntity(Uuid),

    #[error("injected failure for entity {0}")]
    Injected(Uuid),

    #[error("injected TikTok read failure")]
    TikTokUnavailable,
}

#[derive(Default)]
struct Inner {
    entities: BTreeMap<Uuid, Entity>,
    aliases: BTreeMap<(Source, String), Alias>,
    listings: Vec<AmazonListing>,
    reviews: Vec<AmazonReview>,
    tiktok: Vec<TikTokMetric>,
    features: BTreeMap<(NaiveDate, Uuid, String), WeeklyFeatureSet>,
    labels: BTreeMap<(NaiveDate, Uuid), WeeklyLabelSet>,
    scores: BTreeMap<(NaiveDate, Uuid, String), WeeklyScore>,
    failing: BTreeSet<Uuid>,
    tiktok_unavailable: bool,
    ignore_ranges: bool,
}

/// Everything lives behind one mutex; observation reads are counted.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    observation_reads: AtomicUsize,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, MemoryStoreError> {
        self.inner.lock().map_err(|_| MemoryStoreError::Poisoned)
    }

    /// Insert an entity with its aliases, bypassing resolver checks.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryStoreError::Poisoned`] if the lock is poisoned.
    pub fn add_entity(&self, entity: Entity, aliases: &[Alias]) -> Result<(), MemoryStoreError> {
        let mut inner = self.lock()?;
        for alias in aliases {
            inner
                .aliases
                .insert((alias.source, alias.alias_text.clone()), alias.clone());
        }
        inner.entities.insert(entity.id, entity);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`MemoryStoreError::Poisoned`] if the lock is poisoned.
    pub fn add_listings(
        &self,
        rows: impl IntoIterator<Item = AmazonListing>,
    ) -> Result<(), MemoryStoreError> {
        self.lock()?.listings.extend(rows);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`MemoryStoreError::Poisoned`] if the lock is poisoned.
    pub fn add_reviews(
        &self,
        rows: impl IntoIterator<Item = AmazonReview>,
    ) -> Result<(), MemoryStoreError> {
        self.lock()?.reviews.extend(rows);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`MemoryStoreError::Poisoned`] if the lock is poisoned.
    pub fn add_tiktok(
        &self,
        rows: impl IntoIterator<Item = TikTokMetric>,
    ) -> Result<(), MemoryStoreError> {
        self.lock()?.tiktok.extend(rows);
        Ok(())
    }

    /// Make every TikTok metrics read fail.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryStoreError::Poisoned`] if the lock is poisoned.
    pub fn fail_tiktok_reads(&self) -> Result<(), MemoryStoreError> {
        self.lock()?.tiktok_unavailable = true;
        Ok(())
    }

    /// Make every per-entity read and write for `entity_id` fail.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryStoreError::Poisoned`] if the lock is poisoned.
    pub fn fail_entity(&self, entity_id: Uuid) -> Result<(), MemoryStoreError> {
        self.lock()?.failing.insert(entity_id);
        Ok(())
    }

    /// Return observations regardless of the requested date range, like a
    /// careless backend would.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryStoreError::Poisoned`] if the lock is poisoned.
    pub fn ignore_date_ranges(&self, ignore: bool) -> Result<(), MemoryStoreError> {
        self.lock()?.ignore_ranges = ignore;
        Ok(())
    }

    /// Number of observation reads served so far.
    #[must_use]
    pub fn observation_reads(&self) -> usize {
        self.observation_reads.load(Ordering::Relaxed)
    }

    /// Stored scores for `week_start` and `model_version`, in key order.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryStoreError::Poisoned`] if the lock is poisoned.
    pub fn scores(
        &self,
        week_start: NaiveDate,
        model_version: &str,
    ) -> Result<Vec<WeeklyScore>, MemoryStoreError> {
        Ok(self
            .lock()?
            .scores
            .values()
            .filter(|s| s.week_start == week_start && s.model_version == model_version)
            .cloned()
            .collect())
    }

    fn check(inner: &Inner, entity_id: Uuid) -> Result<(), MemoryStoreError> {
        if inner.failing.contains(&entity_id) {
            Err(MemoryStoreError::Injected(entity_id))
        } else {
            Ok(())
        }
    }

    fn in_range(inner: &Inner, range: DateRange, dt: NaiveDate) -> bool {
        inner.ignore_ranges || range.contains(dt)
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Error = MemoryStoreError;

    async fn list_entity_ids(&self, filter: Option<&[Uuid]>) -> Result<Vec<Uuid>, Self::Error> {
        let inner = self.lock()?;
        Ok(inner
            .entities
            .keys()
            .filter(|id| filter.is_none_or(|f| f.contains(*id)))
            .copied()
            .collect())
    }

    async fn get_entity(&self, entity_id: Uuid) -> Result<Option<Entity>, Self::Error> {
        Ok(self.lock()?.entities.get(&entity_id).cloned())
    }

    async fn insert_entity(&self, entity: &Entity) -> Result<(), Self::Error> {
        let mut inner = self.lock()?;
        if inner.entities.contains_key(&entity.id) {
            return Err(MemoryStoreError::DuplicateEntity(entity.id));
        }
        inner.entities.insert(entity.id, entity.clone());
        Ok(())
    }

    async fn update_entity(&self, entity: &Entity) -> Result<(), Self::Error> {
        let mut inner = self.lock()?;
        match inner.entities.get_mut(&entity.id) {
            Some(stored) => {
                stored.canonical_name.clone_from(&entity.canonical_name);
                stored.category_primary.clone_from(&entity.category_primary);
                Ok(())
            }
            None => Err(MemoryStoreError::UnknownEntity(entity.id)),
        }
    }

    async fn find_entity_by_alias(
        &self,
        source: Source,
        alias_text: &str,
    ) -> Result<Option<Uuid>, Self::Error> {
        Ok(self
            .lock()?
            .aliases
            .get(&(source, alias_text.to_string()))
            .map(|a| a.entity_id))
    }

    async fn upsert_alias(&self, alias: &Alias) -> Result<(), Self::Error> {
        let mut inner = self.lock()?;
        inner
            .aliases
            .entry((alias.source, alias.alias_text.clone()))
            .and_modify(|stored| stored.confidence = stored.confidence.max(alias.confidence))
            .or_insert_with(|| alias.clone());
        Ok(())
    }

    async fn resolve_aliases(&self, entity_id: Uuid) -> Result<Vec<Alias>, Self::Error> {
        let inner = self.lock()?;
        Self::check(&inner, entity_id)?;
        Ok(inner
            .aliases
            .values()
            .filter(|a| a.entity_id == entity_id)
            .cloned()
            .collect())
    }

    async fn amazon_listings(
        &self,
        aliases: &[String],
        range: DateRange,
    ) -> Result<Vec<AmazonListing>, Self::Error> {
        self.observation_reads.fetch_add(1, Ordering::Relaxed);
        let inner = self.lock()?;
        let mut rows: Vec<AmazonListing> = inner
            .listings
            .iter()
            .filter(|r| Self::in_range(&inner, range, r.dt) && r.matches_any_alias(aliases))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.dt.cmp(&b.dt).then_with(|| a.asin.cmp(&b.asin)));
        Ok(rows)
    }

    async fn amazon_reviews(
        &self,
        asins: &[String],
        range: DateRange,
        limit: usize,
    ) -> Result<Vec<AmazonReview>, Self::Error> {
        self.observation_reads.fetch_add(1, Ordering::Relaxed);
        let inner = self.lock()?;
        let mut rows: Vec<AmazonReview> = inner
            .reviews
            .iter()
            .filter(|r| {
                Self::in_range(&inner, range, r.dt)
                    && r.review_text.is_some()
                    && asins.contains(&r.asin)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.dt.cmp(&a.dt).then_with(|| a.asin.cmp(&b.asin)));
        if !inner.ignore_ranges {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn tiktok_metrics(
        &self,
        queries: Option<&[String]>,
        query_type: Option<QueryType>,
        range: DateRange,
    ) -> Result<Vec<TikTokMetric>, Self::Error> {
        self.observation_reads.fetch_add(1, Ordering::Relaxed);
        let inner = self.lock()?;
        if inner.tiktok_unavailable {
            return Err(MemoryStoreError::TikTokUnavailable);
        }
        let mut rows: Vec<TikTokMetric> = inner
            .tiktok
            .iter()
            .filter(|r| {
                Self::in_range(&inner, range, r.dt)
                    && query_type.is_none_or(|t| r.query_type == t)
                    && queries.is_none_or(|qs| qs.contains(&r.query))
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.dt.cmp(&b.dt).then_with(|| a.query.cmp(&b.query)));
        Ok(rows)
    }

    async fn upsert_feature_set(&self, set: &WeeklyFeatureSet) -> Result<(), Self::Error> {
        let mut inner = self.lock()?;
        Self::check(&inner, set.entity_id)?;
        inner.features.insert(
            (set.week_start, set.entity_id, set.feature_version.clone()),
            set.clone(),
        );
        Ok(())
    }

    async fn get_feature_set(
        &self,
        week_start: NaiveDate,
        entity_id: Uuid,
        feature_version: &str,
    ) -> Result<Option<WeeklyFeatureSet>, Self::Error> {
        Ok(self
            .lock()?
            .features
            .get(&(week_start, entity_id, feature_version.to_string()))
            .cloned())
    }

    async fn list_feature_sets(
        &self,
        week_start: NaiveDate,
        feature_version: &str,
    ) -> Result<Vec<WeeklyFeatureSet>, Self::Error> {
        Ok(self
            .lock()?
            .features
            .values()
            .filter(|s| s.week_start == week_start && s.feature_version == feature_version)
            .cloned()
            .collect())
    }

    async fn upsert_label_set(&self, labels: &WeeklyLabelSet) -> Result<(), Self::Error> {
        let mut inner = self.lock()?;
        Self::check(&inner, labels.entity_id)?;
        let stored = inner
            .labels
            .entry((labels.week_start, labels.entity_id))
            .or_insert_with(|| WeeklyLabelSet::new(labels.week_start, labels.entity_id));
        stored.winner_4w = labels.winner_4w.or(stored.winner_4w);
        stored.winner_8w = labels.winner_8w.or(stored.winner_8w);
        stored.winner_12w = labels.winner_12w.or(stored.winner_12w);
        stored.trend_spike = labels.trend_spike.or(stored.trend_spike);
        stored.durable = labels.durable.or(stored.durable);
        stored.trending = labels.trending.or(stored.trending);
        Ok(())
    }

    async fn merge_trending_label(
        &self,
        week_start: NaiveDate,
        entity_id: Uuid,
        trending: bool,
    ) -> Result<(), Self::Error> {
        let mut inner = self.lock()?;
        Self::check(&inner, entity_id)?;
        let stored = inner
            .labels
            .entry((week_start, entity_id))
            .or_insert_with(|| WeeklyLabelSet::new(week_start, entity_id));
        stored.trending = Some(stored.trending.unwrap_or(false) || trending);
        Ok(())
    }

    async fn get_label_set(
        &self,
        week_start: NaiveDate,
        entity_id: Uuid,
    ) -> Result<Option<WeeklyLabelSet>, Self::Error> {
        Ok(self.lock()?.labels.get(&(week_start, entity_id)).cloned())
    }

    async fn upsert_score(&self, score: &WeeklyScore) -> Result<(), Self::Error> {
        let mut inner = self.lock()?;
        Self::check(&inner, score.entity_id)?;
        inner.scores.insert(
            (score.week_start, score.entity_id, score.model_version.clone()),
            score.clone(),
        );
        Ok(())
    }
}
