//! Backward-looking outcome labels used only as training targets.
//!
//! A label for week `W` reads observations from `[W - 7d, W + horizon)`, so it
//! can only be computed once `today >= W + horizon`. Feature code never
//! reaches this module's forward windows.

mod trending;

use chrono::{Duration, NaiveDate};
use winner_core::{validate_horizon, AmazonListing, Source};

use crate::error::EngineError;
use crate::resolver::AliasSet;
use crate::stats;
use crate::store::Store;
use crate::window::{latest_per_asin, top_k_by_bsr, Aggregator, DateRange};

pub use trending::{compute_trending, trending_queries, TRENDING_WINDOW_DAYS};

/// Horizon whose weekly samples also drive `durable` and `trend_spike`.
pub const SHAPE_HORIZON_WEEKS: u32 = 8;

/// Thresholds that turn horizon metrics into boolean labels.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelThresholds {
    /// Minimum `(base - end) / base` rank improvement for a winner.
    pub min_rank_improvement: f64,
    /// Review growth must be strictly above this.
    pub min_review_velocity: f64,
    /// Largest tolerated relative price drop for a winner.
    pub max_price_drop: f64,
    /// Share of weekly samples that must improve on the previous one.
    pub durable_fraction: f64,
    /// Best first-half improvement over baseline needed for a spike.
    pub spike_min_improvement: f64,
    /// Relative fall-back from the best rank by the final sample.
    pub spike_min_revert: f64,
}

impl Default for LabelThresholds {
    fn default() -> Self {
        Self {
            min_rank_improvement: 0.30,
            min_review_velocity: 0.0,
            max_price_drop: 0.10,
            durable_fraction: 0.75,
            spike_min_improvement: 0.5,
            spike_min_revert: 0.2,
        }
    }
}

/// Reductions of one top-K Amazon snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotStats {
    pub median_bsr: Option<f64>,
    /// `None` for an empty snapshot.
    pub review_sum: Option<f64>,
    pub mean_price: Option<f64>,
}

impl SnapshotStats {
    #[must_use]
    pub fn from_top_k(top: &[AmazonListing]) -> Self {
        if top.is_empty() {
            return Self::default();
        }
        #[allow(clippy::cast_precision_loss)]
        let bsrs: Vec<f64> = top.iter().filter_map(|l| l.bsr).map(|b| b as f64).collect();
        #[allow(clippy::cast_precision_loss)]
        let reviews: f64 = top
            .iter()
            .map(|l| l.review_count.unwrap_or(0) as f64)
            .sum();
        let prices: Vec<f64> = top
            .iter()
            .filter_map(|l| l.price_usd)
            .filter(|p| p.is_finite())
            .collect();
        Self {
            median_bsr: stats::median(&bsrs),
            review_sum: Some(reviews),
            mean_price: stats::mean(&prices),
        }
    }
}

/// Raw horizon metrics behind the boolean labels. `None` when either end is missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HorizonMetrics {
    pub rank_improvement: Option<f64>,
    pub review_velocity: Option<f64>,
    pub price_drop: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HorizonLabels {
    pub horizon_weeks: u32,
    pub winner: bool,
    /// Only set on the shape horizon.
    pub durable: Option<bool>,
    /// Only set on the shape horizon.
    pub trend_spike: Option<bool>,
    pub metrics: HorizonMetrics,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LabelOutcome {
    /// The horizon has not fully elapsed; nothing may be computed before `ready_on`.
    Pending { ready_on: NaiveDate },
    Computed(HorizonLabels),
}

/// First day on which a `horizon_weeks` label for `week_start` may be computed.
#[must_use]
pub fn ready_on(week_start: NaiveDate, horizon_weeks: u32) -> NaiveDate {
    week_start + Duration::weeks(i64::from(horizon_weeks))
}

/// Evaluate one horizon from its baseline and its weekly samples.
///
/// `samples[i]` covers week `i` of the horizon; the last sample is the end
/// snapshot. Missing data on either end makes every label `false`.
#[must_use]
pub fn evaluate_horizon(
    baseline: &SnapshotStats,
    samples: &[SnapshotStats],
    thresholds: &LabelThresholds,
) -> HorizonLabels {
    #[allow(clippy::cast_possible_truncation)]
    let horizon_weeks = samples.len() as u32;
    let end = samples.last().cloned().unwrap_or_default();

    let rank_improvement = match (baseline.median_bsr, end.median_bsr) {
        (Some(base), Some(last)) => stats::relative_drop(base, last),
        _ => None,
    };
    let review_velocity = match (baseline.review_sum, end.review_sum) {
        (Some(base), Some(last)) => Some(last - base),
        _ => None,
    };
    let price_drop = match (baseline.mean_price, end.mean_price) {
        (Some(base), Some(last)) => stats::relative_drop(base, last),
        _ => None,
    };

    let winner = matches!(
        (rank_improvement, review_velocity, price_drop),
        (Some(r), Some(v), Some(p))
            if r >= thresholds.min_rank_improvement
                && v > thresholds.min_review_velocity
                && p <= thresholds.max_price_drop
    );

    let (durable, trend_spike) = if horizon_weeks == SHAPE_HORIZON_WEEKS {
        (
            Some(is_durable(baseline.median_bsr, samples, thresholds)),
            Some(is_trend_spike(baseline.median_bsr, samples, thresholds)),
        )
    } else {
        (None, None)
    };

    HorizonLabels {
        horizon_weeks,
        winner,
        durable,
        trend_spike,
        metrics: HorizonMetrics {
            rank_improvement,
            review_velocity,
            price_drop,
        },
    }
}

/// Rank improved week over week, starting from the baseline, often enough.
fn is_durable(
    base: Option<f64>,
    samples: &[SnapshotStats],
    thresholds: &LabelThresholds,
) -> bool {
    let Some(mut previous) = base else {
        return false;
    };
    if samples.is_empty() {
        return false;
    }
    let mut improved = 0_u32;
    for sample in samples {
        if let Some(bsr) = sample.median_bsr {
            if bsr < previous {
                improved += 1;
            }
            previous = bsr;
        }
    }
    #[allow(clippy::cast_precision_loss)]
    let fraction = f64::from(improved) / samples.len() as f64;
    fraction >= thresholds.durable_fraction
}

/// Large early improvement that mostly reverted by the final sample.
fn is_trend_spike(
    base: Option<f64>,
    samples: &[SnapshotStats],
    thresholds: &LabelThresholds,
) -> bool {
    let Some(base) = base else {
        return false;
    };
    let half = samples.len() / 2;
    let best = samples[..half]
        .iter()
        .filter_map(|s| s.median_bsr)
        .fold(None, |acc: Option<f64>, bsr| {
            Some(acc.map_or(bsr, |a| a.min(bsr)))
        });
    let (Some(best), Some(last)) = (best, samples.last().and_then(|s| s.median_bsr)) else {
        return false;
    };
    let spiked =
        stats::relative_drop(base, best).is_some_and(|i| i > thresholds.spike_min_improvement);
    let reverted = best > 0.0 && (last - best) / best > thresholds.spike_min_revert;
    spiked && reverted
}

/// Snapshot stats of the top-K listings in `range`.
async fn snapshot_in<S: Store>(
    agg: &Aggregator<'_, S>,
    aliases: &[String],
    range: DateRange,
    top_k: usize,
) -> Result<SnapshotStats, EngineError> {
    let rows = agg.amazon_in(aliases, range).await?;
    let top = top_k_by_bsr(&latest_per_asin(&rows), top_k);
    Ok(SnapshotStats::from_top_k(&top))
}

/// Compute the labels of one horizon for one entity, or report it pending.
///
/// # Errors
///
/// Returns [`EngineError::Config`] for an untracked horizon, or
/// [`EngineError::Storage`] if a read fails.
pub async fn compute_horizon_label<S: Store>(
    agg: &Aggregator<'_, S>,
    aliases: &AliasSet,
    week_start: NaiveDate,
    horizon_weeks: u32,
    today: NaiveDate,
    top_k: usize,
    thresholds: &LabelThresholds,
) -> Result<LabelOutcome, EngineError> {
    validate_horizon(horizon_weeks)?;

    let ready = ready_on(week_start, horizon_weeks);
    if today < ready {
        tracing::info!(
            week_start = %week_start,
            horizon_weeks,
            ready_on = %ready,
            "label horizon not elapsed, skipping"
        );
        return Ok(LabelOutcome::Pending { ready_on: ready });
    }

    let amazon = aliases.texts(Source::Amazon);
    let baseline = snapshot_in(agg, amazon, DateRange::trailing(week_start, 7), top_k).await?;
    let mut samples = Vec::with_capacity(horizon_weeks as usize);
    for week in 0..i64::from(horizon_weeks) {
        let range = DateRange::forward(week_start + Duration::weeks(week), 7);
        samples.push(snapshot_in(agg, amazon, range, top_k).await?);
    }

    Ok(LabelOutcome::Computed(evaluate_horizon(
        &baseline, &samples, thresholds,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(bsr: Option<f64>, reviews: f64, price: f64) -> SnapshotStats {
        SnapshotStats {
            median_bsr: bsr,
            review_sum: Some(reviews),
            mean_price: Some(price),
        }
    }

    fn bsr_path(base: f64, path: &[f64]) -> (SnapshotStats, Vec<SnapshotStats>) {
        let baseline = sample(Some(base), 100.0, 20.0);
        let samples = path.iter().map(|&b| sample(Some(b), 200.0, 20.0)).collect();
        (baseline, samples)
    }

    #[test]
    fn ready_on_adds_whole_weeks() {
        let ws = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        assert_eq!(ready_on(ws, 8), NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
    }

    #[test]
    fn winner_requires_rank_reviews_and_stable_price() {
        let (baseline, samples) = bsr_path(1000.0, &[900.0, 800.0, 750.0, 700.0]);
        let labels = evaluate_horizon(&baseline, &samples, &LabelThresholds::default());
        assert!(labels.winner);
        assert_eq!(labels.horizon_weeks, 4);
        assert_eq!(labels.durable, None);
        assert!((labels.metrics.rank_improvement.unwrap() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn price_collapse_blocks_winner() {
        let baseline = sample(Some(1000.0), 100.0, 20.0);
        let samples = vec![sample(Some(500.0), 300.0, 15.0); 4];
        let labels = evaluate_horizon(&baseline, &samples, &LabelThresholds::default());
        assert!(!labels.winner);
        assert!((labels.metrics.price_drop.unwrap() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn flat_reviews_block_winner() {
        let baseline = sample(Some(1000.0), 100.0, 20.0);
        let samples = vec![sample(Some(500.0), 100.0, 20.0); 4];
        assert!(!evaluate_horizon(&baseline, &samples, &LabelThresholds::default()).winner);
    }

    #[test]
    fn missing_data_is_not_a_winner() {
        let baseline = SnapshotStats::default();
        let samples = vec![sample(Some(100.0), 500.0, 20.0); 8];
        let labels = evaluate_horizon(&baseline, &samples, &LabelThresholds::default());
        assert!(!labels.winner);
        assert_eq!(labels.durable, Some(false));
        assert_eq!(labels.trend_spike, Some(false));
        assert_eq!(labels.metrics.rank_improvement, None);
    }

    #[test]
    fn durable_needs_six_of_eight_improvements() {
        let thresholds = LabelThresholds::default();
        let (b, s) = bsr_path(
            1000.0,
            &[950.0, 900.0, 920.0, 850.0, 800.0, 810.0, 750.0, 700.0],
        );
        assert_eq!(evaluate_horizon(&b, &s, &thresholds).durable, Some(true));

        let (b, s) = bsr_path(
            1000.0,
            &[950.0, 960.0, 920.0, 930.0, 800.0, 810.0, 750.0, 700.0],
        );
        assert_eq!(evaluate_horizon(&b, &s, &thresholds).durable, Some(false));
    }

    #[test]
    fn spike_then_revert_is_a_trend_spike() {
        let (b, s) = bsr_path(
            1000.0,
            &[700.0, 400.0, 450.0, 500.0, 600.0, 700.0, 800.0, 900.0],
        );
        let labels = evaluate_horizon(&b, &s, &LabelThresholds::default());
        assert_eq!(labels.trend_spike, Some(true));
        assert!(!labels.winner);
    }

    #[test]
    fn sustained_gain_is_not_a_spike() {
        let (b, s) = bsr_path(
            1000.0,
            &[700.0, 400.0, 380.0, 370.0, 360.0, 350.0, 340.0, 330.0],
        );
        let labels = evaluate_horizon(&b, &s, &LabelThresholds::default());
        assert_eq!(labels.trend_spike, Some(false));
        assert!(labels.winner);
        assert_eq!(labels.durable, Some(true));
    }
}
