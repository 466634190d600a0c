use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, NaiveDate};
use winner_core::TikTokMetric;

use crate::error::EngineError;
use crate::stats;
use crate::store::Store;
use crate::window::{Aggregator, DateRange};

/// Days after `week_start` the trend pass observes.
pub const TRENDING_WINDOW_DAYS: i64 = 14;

const TOP_SLOPE_FRACTION: f64 = 0.1;

/// Top-decile size for `n` queries, never below one.
fn top_slope_count(n: usize) -> usize {
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    let k = (n as f64 * TOP_SLOPE_FRACTION).ceil() as usize;
    k.clamp(1, n.max(1))
}

/// Queries in the top decile of daily-views slope (at least the single
/// steepest one, ties included) whose slope is positive and whose creator
/// count grew across the window.
///
/// Slopes use the day offset from `start` as x.
#[must_use]
pub fn trending_queries(rows: &[TikTokMetric], start: NaiveDate) -> BTreeSet<String> {
    let mut per_query: BTreeMap<&str, BTreeMap<NaiveDate, (f64, Option<i64>)>> = BTreeMap::new();
    for row in rows {
        let day = per_query
            .entry(row.query.as_str())
            .or_default()
            .entry(row.dt)
            .or_insert((0.0, None));
        #[allow(clippy::cast_precision_loss)]
        let views = row.views.unwrap_or(0) as f64;
        day.0 += views;
        if let Some(creators) = row.creator_count {
            day.1 = Some(day.1.unwrap_or(0) + creators);
        }
    }

    let trends: Vec<(&str, f64, i64)> = per_query
        .iter()
        .map(|(query, days)| {
            #[allow(clippy::cast_precision_loss)]
            let points: Vec<(f64, f64)> = days
                .iter()
                .map(|(dt, (views, _))| ((*dt - start).num_days() as f64, *views))
                .collect();
            let creators: Vec<i64> = days.values().filter_map(|(_, c)| *c).collect();
            let growth = match (creators.first(), creators.last()) {
                (Some(first), Some(last)) => last - first,
                _ => 0,
            };
            (*query, stats::slope(&points), growth)
        })
        .collect();

    if trends.is_empty() {
        return BTreeSet::new();
    }
    let mut slopes: Vec<f64> = trends.iter().map(|(_, slope, _)| *slope).collect();
    slopes.sort_by(|a, b| b.total_cmp(a));
    let cutoff = slopes[top_slope_count(slopes.len()) - 1];

    trends
        .into_iter()
        .filter(|(_, slope, growth)| *slope >= cutoff && *slope > 0.0 && *growth > 0)
        .map(|(query, _, _)| query.to_string())
        .collect()
}

/// Trending queries for the two weeks starting at `week_start`, or `None`
/// while that window has not fully elapsed.
///
/// # Errors
///
/// Returns [`EngineError::Storage`] if the TikTok read fails.
pub async fn compute_trending<S: Store>(
    agg: &Aggregator<'_, S>,
    week_start: NaiveDate,
    today: NaiveDate,
) -> Result<Option<BTreeSet<String>>, EngineError> {
    let ready = week_start + Duration::days(TRENDING_WINDOW_DAYS);
    if today < ready {
        tracing::info!(
            week_start = %week_start,
            ready_on = %ready,
            "trend window not elapsed, skipping"
        );
        return Ok(None);
    }
    let range = DateRange::forward(week_start, TRENDING_WINDOW_DAYS);
    let rows = agg.tiktok_in(None, None, range).await?;
    Ok(Some(trending_queries(&rows, week_start)))
}
