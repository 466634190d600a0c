//! Read-only queries over the daily observation tables.
//!
//! Every query takes a half-open `[start, end)` date range. Prices and
//! ratings are stored as `NUMERIC` and converted to `f64` on the way out.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::PgPool;
use winner_core::{AmazonListing, AmazonReview, QueryType, TikTokMetric};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from `amazon_listings_daily`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AmazonListingRow {
    pub dt: NaiveDate,
    pub asin: String,
    pub title: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub price_usd: Option<Decimal>,
    pub bsr: Option<i64>,
    pub rating: Option<Decimal>,
    pub review_count: Option<i64>,
    pub image_count: Option<i32>,
    pub video_flag: bool,
    pub first_seen_date: Option<NaiveDate>,
    pub last_seen_date: Option<NaiveDate>,
}

impl From<AmazonListingRow> for AmazonListing {
    fn from(row: AmazonListingRow) -> Self {
        AmazonListing {
            dt: row.dt,
            asin: row.asin,
            title: row.title,
            brand: row.brand,
            category: row.category,
            price_usd: row.price_usd.and_then(|p| p.to_f64()),
            bsr: row.bsr,
            rating: row.rating.and_then(|r| r.to_f64()),
            review_count: row.review_count,
            image_count: row.image_count,
            video_flag: row.video_flag,
            first_seen_date: row.first_seen_date,
            last_seen_date: row.last_seen_date,
        }
    }
}

/// A row from `amazon_reviews_daily`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AmazonReviewRow {
    pub dt: NaiveDate,
    pub asin: String,
    pub review_text: Option<String>,
    pub rating: Option<Decimal>,
}

impl From<AmazonReviewRow> for AmazonReview {
    fn from(row: AmazonReviewRow) -> Self {
        AmazonReview {
            dt: row.dt,
            asin: row.asin,
            review_text: row.review_text,
            rating: row.rating.and_then(|r| r.to_f64()),
        }
    }
}

/// A row from `tiktok_metrics_daily`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TikTokMetricRow {
    pub dt: NaiveDate,
    pub query: String,
    pub query_type: String,
    pub views: Option<i64>,
    pub videos: Option<i64>,
    pub likes: Option<i64>,
    pub comments: Option<i64>,
    pub shares: Option<i64>,
    pub creator_count: Option<i64>,
}

impl TryFrom<TikTokMetricRow> for TikTokMetric {
    type Error = DbError;

    fn try_from(row: TikTokMetricRow) -> Result<Self, Self::Error> {
        Ok(TikTokMetric {
            dt: row.dt,
            query: row.query,
            query_type: row
                .query_type
                .parse::<QueryType>()
                .map_err(|e| DbError::invalid("tiktok_metrics_daily.query_type", e))?,
            views: row.views,
            videos: row.videos,
            likes: row.likes,
            comments: row.comments,
            shares: row.shares,
            creator_count: row.creator_count,
        })
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Listings in `[start, end)` whose ASIN equals an alias, whose brand equals
/// an alias ignoring case, or whose title contains an alias ignoring case.
/// Ordered by `dt`, then `asin`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_amazon_listings(
    pool: &PgPool,
    aliases: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<AmazonListing>, DbError> {
    if aliases.is_empty() {
        return Ok(Vec::new());
    }
    let lowered: Vec<String> = aliases.iter().map(|a| a.to_lowercase()).collect();
    let patterns: Vec<String> = lowered
        .iter()
        .map(|a| format!("%{}%", escape_like(a)))
        .collect();

    let rows = sqlx::query_as::<_, AmazonListingRow>(
        "SELECT dt, asin, title, brand, category, price_usd, bsr, rating, review_count, \
                image_count, video_flag, first_seen_date, last_seen_date \
         FROM amazon_listings_daily \
         WHERE dt >= $1 AND dt < $2 \
           AND (upper(asin) = ANY($3) \
                OR lower(brand) = ANY($4) \
                OR lower(title) LIKE ANY($5)) \
         ORDER BY dt, asin",
    )
    .bind(start)
    .bind(end)
    .bind(aliases.iter().map(|a| a.to_uppercase()).collect::<Vec<_>>())
    .bind(&lowered)
    .bind(&patterns)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(AmazonListing::from).collect())
}

/// Reviews with text for `asins` in `[start, end)`, newest first, at most `limit`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_amazon_reviews(
    pool: &PgPool,
    asins: &[String],
    start: NaiveDate,
    end: NaiveDate,
    limit: i64,
) -> Result<Vec<AmazonReview>, DbError> {
    if asins.is_empty() {
        return Ok(Vec::new());
    }
    let rows = sqlx::query_as::<_, AmazonReviewRow>(
        "SELECT dt, asin, review_text, rating \
         FROM amazon_reviews_daily \
         WHERE dt >= $1 AND dt < $2 \
           AND asin = ANY($3) \
           AND review_text IS NOT NULL \
         ORDER BY dt DESC, asin, id \
         LIMIT $4",
    )
    .bind(start)
    .bind(end)
    .bind(asins)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(AmazonReview::from).collect())
}

/// TikTok rows in `[start, end)`, ordered by `dt`, then `query`. `queries:
/// None` returns every query; `query_type: None` returns both types.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or
/// [`DbError::InvalidValue`] for an unknown stored query type.
pub async fn list_tiktok_metrics(
    pool: &PgPool,
    queries: Option<&[String]>,
    query_type: Option<QueryType>,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<TikTokMetric>, DbError> {
    let rows = sqlx::query_as::<_, TikTokMetricRow>(
        "SELECT dt, query, query_type, views, videos, likes, comments, shares, creator_count \
         FROM tiktok_metrics_daily \
         WHERE dt >= $1 AND dt < $2 \
           AND ($3::TEXT[] IS NULL OR query = ANY($3)) \
           AND ($4::TEXT IS NULL OR query_type = $4) \
         ORDER BY dt, query, query_type",
    )
    .bind(start)
    .bind(end)
    .bind(queries)
    .bind(query_type.map(QueryType::as_str))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(TikTokMetric::try_from).collect()
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_patterns_escape_wildcards() {
        assert_eq!(escape_like("100%_cotton"), "100\\%\\_cotton");
        assert_eq!(escape_like("lamp"), "lamp");
    }

    #[test]
    fn listing_row_converts_numeric_columns() {
        let row = AmazonListingRow {
            dt: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            asin: "B0LAMP0001".to_string(),
            title: None,
            brand: None,
            category: None,
            price_usd: Some(Decimal::new(2999, 2)),
            bsr: Some(1200),
            rating: Some(Decimal::new(45, 1)),
            review_count: None,
            image_count: None,
            video_flag: true,
            first_seen_date: None,
            last_seen_date: None,
        };
        let listing = AmazonListing::from(row);
        assert_eq!(listing.price_usd, Some(29.99));
        assert_eq!(listing.rating, Some(4.5));
        assert!(listing.video_flag);
    }

    #[test]
    fn unknown_query_type_is_rejected() {
        let row = TikTokMetricRow {
            dt: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            query: "sunsetlamp".to_string(),
            query_type: "sound".to_string(),
            views: None,
            videos: None,
            likes: None,
            comments: None,
            shares: None,
            creator_count: None,
        };
        assert!(matches!(
            TikTokMetric::try_from(row),
            Err(DbError::InvalidValue { .. })
        ));
    }
}
