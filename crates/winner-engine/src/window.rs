//! As-of date windows over daily observations.
//!
//! Every public window is trailing and half-open: `[as_of - lookback, as_of)`.
//! Forward windows exist only for the label engine.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use winner_core::{AmazonListing, AmazonReview, QueryType, TikTokMetric};

use crate::error::EngineError;
use crate::store::Store;

/// Half-open date range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// `[as_of - lookback_days, as_of)`. Never includes `as_of`.
    #[must_use]
    pub fn trailing(as_of: NaiveDate, lookback_days: i64) -> Self {
        Self {
            start: as_of - Duration::days(lookback_days),
            end: as_of,
        }
    }

    /// `[start, start + days)`. Reads observations after the week being labelled.
    pub(crate) fn forward(start: NaiveDate, days: i64) -> Self {
        Self {
            start,
            end: start + Duration::days(days),
        }
    }

    #[must_use]
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Exclusive upper bound.
    #[must_use]
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    #[must_use]
    pub fn contains(&self, dt: NaiveDate) -> bool {
        self.start <= dt && dt < self.end
    }

    #[must_use]
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

/// Reads observation windows through a [`Store`] and re-filters them so a
/// store that ignores the range still cannot leak rows from outside it.
pub struct Aggregator<'a, S: Store> {
    store: &'a S,
}

impl<'a, S: Store> Aggregator<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Amazon listings matching `aliases` in the trailing window, ordered by
    /// `dt` then `asin`. No aliases means no rows and no store call.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Storage`] if the store read fails.
    pub async fn amazon_window(
        &self,
        aliases: &[String],
        as_of: NaiveDate,
        lookback_days: i64,
    ) -> Result<Vec<AmazonListing>, EngineError> {
        self.amazon_in(aliases, DateRange::trailing(as_of, lookback_days))
            .await
    }

    /// Latest row per ASIN over the 7 days before `as_of`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Storage`] if the store read fails.
    pub async fn amazon_snapshot(
        &self,
        aliases: &[String],
        as_of: NaiveDate,
    ) -> Result<Vec<AmazonListing>, EngineError> {
        let rows = self.amazon_window(aliases, as_of, 7).await?;
        Ok(latest_per_asin(&rows))
    }

    pub(crate) async fn amazon_in(
        &self,
        aliases: &[String],
        range: DateRange,
    ) -> Result<Vec<AmazonListing>, EngineError> {
        if aliases.is_empty() {
            return Ok(Vec::new());
        }
        let mut rows = self
            .store
            .amazon_listings(aliases, range)
            .await
            .map_err(EngineError::storage)?;
        rows.retain(|r| range.contains(r.dt) && r.matches_any_alias(aliases));
        rows.sort_by(|a, b| a.dt.cmp(&b.dt).then_with(|| a.asin.cmp(&b.asin)));
        Ok(rows)
    }

    /// TikTok rows for `queries` in the trailing window, ordered by `dt`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Storage`] if the store read fails.
    pub async fn tiktok_window(
        &self,
        queries: &[String],
        query_type: Option<QueryType>,
        as_of: NaiveDate,
        lookback_days: i64,
    ) -> Result<Vec<TikTokMetric>, EngineError> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }
        self.tiktok_in(
            Some(queries),
            query_type,
            DateRange::trailing(as_of, lookback_days),
        )
        .await
    }

    /// `queries: None` reads every query in the range.
    pub(crate) async fn tiktok_in(
        &self,
        queries: Option<&[String]>,
        query_type: Option<QueryType>,
        range: DateRange,
    ) -> Result<Vec<TikTokMetric>, EngineError> {
        let mut rows = self
            .store
            .tiktok_metrics(queries, query_type, range)
            .await
            .map_err(EngineError::storage)?;
        rows.retain(|r| {
            range.contains(r.dt)
                && query_type.is_none_or(|t| r.query_type == t)
                && queries.is_none_or(|qs| qs.iter().any(|q| q == &r.query))
        });
        rows.sort_by(|a, b| a.dt.cmp(&b.dt).then_with(|| a.query.cmp(&b.query)));
        Ok(rows)
    }

    /// Reviews with text for `asins` in the trailing window, newest first,
    /// at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Storage`] if the store read fails.
    pub async fn review_window(
        &self,
        asins: &[String],
        as_of: NaiveDate,
        lookback_days: i64,
        limit: usize,
    ) -> Result<Vec<AmazonReview>, EngineError> {
        if asins.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let range = DateRange::trailing(as_of, lookback_days);
        let mut rows = self
            .store
            .amazon_reviews(asins, range, limit)
            .await
            .map_err(EngineError::storage)?;
        rows.retain(|r| {
            range.contains(r.dt) && r.review_text.is_some() && asins.contains(&r.asin)
        });
        rows.sort_by(|a, b| b.dt.cmp(&a.dt).then_with(|| a.asin.cmp(&b.asin)));
        rows.truncate(limit);
        Ok(rows)
    }
}

/// Keep the most recent row for each ASIN. Output is ordered by ASIN.
#[must_use]
pub fn latest_per_asin(rows: &[AmazonListing]) -> Vec<AmazonListing> {
    let mut latest: BTreeMap<&str, &AmazonListing> = BTreeMap::new();
    for row in rows {
        match latest.get(row.asin.as_str()) {
            Some(seen) if seen.dt >= row.dt => {}
            _ => {
                latest.insert(row.asin.as_str(), row);
            }
        }
    }
    latest.into_values().cloned().collect()
}

/// The `k` best-ranked listings: BSR ascending, ties by ASIN. Listings
/// without a BSR are excluded.
#[must_use]
pub fn top_k_by_bsr(snapshot: &[AmazonListing], k: usize) -> Vec<AmazonListing> {
    let mut ranked: Vec<&AmazonListing> = snapshot.iter().filter(|l| l.bsr.is_some()).collect();
    ranked.sort_by(|a, b| a.bsr.cmp(&b.bsr).then_with(|| a.asin.cmp(&b.asin)));
    ranked.into_iter().take(k).cloned().collect()
}

/// The `k` best-ranked listings that carry a price. Unranked listings sort
/// after ranked ones.
#[must_use]
pub fn top_k_priced(snapshot: &[AmazonListing], k: usize) -> Vec<AmazonListing> {
    let mut priced: Vec<&AmazonListing> = snapshot
        .iter()
        .filter(|l| l.price_usd.is_some_and(f64::is_finite))
        .collect();
    priced.sort_by(|a, b| ranked_first(a, b));
    priced.into_iter().take(k).cloned().collect()
}

/// The first `k` listings of the snapshot, ranked ones by BSR ahead of
/// unranked ones.
#[must_use]
pub fn top_k_ranked_first(snapshot: &[AmazonListing], k: usize) -> Vec<AmazonListing> {
    let mut ordered: Vec<&AmazonListing> = snapshot.iter().collect();
    ordered.sort_by(|a, b| ranked_first(a, b));
    ordered.into_iter().take(k).cloned().collect()
}

fn ranked_first(a: &AmazonListing, b: &AmazonListing) -> Ordering {
    let key = |l: &AmazonListing| (l.bsr.is_none(), l.bsr.unwrap_or(i64::MAX));
    key(a).cmp(&key(b)).then_with(|| a.asin.cmp(&b.asin))
}
