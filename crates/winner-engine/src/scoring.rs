//! Baseline heuristic scorer.
//!
//! Maps one feature map to four pillar scores in `[0, 100]`, a composite
//! winner probability in `[0, 1]`, a rank, and an explanation payload. Pure:
//! the same features always yield the same card.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use uuid::Uuid;
use winner_core::{DemandBreakdown, Explanations, FeatureMap, PillarScores, WeeklyScore};

use crate::features::names::{
    AMAZON_BSR_IMPROVEMENT_4W, AMAZON_REVIEW_VELOCITY_4W, CONCENTRATION_HHI,
    CROSS_CHANNEL_ALIGNMENT, HAZMAT_PROXY, MARGIN_PROXY, NEW_ENTRANT_RATE_4W, PRICE_MEDIAN,
    REGULATORY_PROXY, RETURN_PROXY, REVIEW_MEDIAN_TOP10, TIKTOK_VIEWS_7D,
};

const WEIGHT_DEMAND: f64 = 0.35;
const WEIGHT_COMPETITION: f64 = 0.25;
const WEIGHT_MARGIN: f64 = 0.25;
const WEIGHT_RISK: f64 = 0.15;

/// Result of scoring one feature map.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreCard {
    pub pillars: PillarScores,
    pub winner_prob: f64,
    pub rank: f64,
    pub explanations: Explanations,
}

impl ScoreCard {
    #[must_use]
    pub fn into_weekly(
        self,
        week_start: NaiveDate,
        entity_id: Uuid,
        model_version: &str,
    ) -> WeeklyScore {
        WeeklyScore {
            week_start,
            entity_id,
            model_version: model_version.to_string(),
            pillars: self.pillars,
            winner_prob: self.winner_prob,
            rank: self.rank,
            explanations: self.explanations,
        }
    }
}

/// Score a feature map with the baseline weights.
///
/// Missing, `None` and non-finite inputs take their defaults: HHI `1.0`,
/// everything else `0.0`. The composite is computed from unrounded pillars
/// and then rounded to 4 decimals; pillars round to 1 and rank to 2.
#[must_use]
pub fn score(features: &FeatureMap) -> ScoreCard {
    let views = input(features, TIKTOK_VIEWS_7D, 0.0);
    let bsr_improvement = input(features, AMAZON_BSR_IMPROVEMENT_4W, 0.0);
    let review_velocity = input(features, AMAZON_REVIEW_VELOCITY_4W, 0.0);
    let cross_channel = input(features, CROSS_CHANNEL_ALIGNMENT, 0.0);

    let hhi = input(features, CONCENTRATION_HHI, 1.0);
    let new_entrants = input(features, NEW_ENTRANT_RATE_4W, 0.0);
    let review_median = input(features, REVIEW_MEDIAN_TOP10, 0.0);

    let price = input(features, PRICE_MEDIAN, 0.0);
    let margin = input(features, MARGIN_PROXY, 0.0);

    let returns = input(features, RETURN_PROXY, 0.0);
    let regulatory = input(features, REGULATORY_PROXY, 0.0);
    let hazmat = input(features, HAZMAT_PROXY, 0.0);

    let demand = pillar(
        (views / 1_000_000.0 * 50.0).min(50.0)
            + (bsr_improvement * 30.0).max(0.0)
            + (review_velocity / 100.0 * 20.0).min(20.0)
            + cross_channel * 20.0,
    );

    let competition = pillar(
        (1.0 - hhi.min(1.0)) * 40.0
            + ((1.0 - new_entrants) * 30.0).max(0.0)
            + (review_median / 1000.0 * 30.0).min(30.0),
    );

    let margin_pct = if price > 0.0 {
        (margin / price * 50.0).max(0.0)
    } else {
        0.0
    };
    let margin_score = pillar((price / 100.0 * 50.0).min(50.0) + margin_pct);

    let risk = pillar(
        (1.0 - returns.min(1.0)) * 40.0
            + (1.0 - regulatory.min(1.0)) * 30.0
            + (1.0 - hazmat.min(1.0)) * 30.0,
    );

    let composite = ((demand * WEIGHT_DEMAND
        + competition * WEIGHT_COMPETITION
        + margin_score * WEIGHT_MARGIN
        + risk * WEIGHT_RISK)
        / 100.0)
        .clamp(0.0, 1.0);

    let pillar_inputs = BTreeMap::from([
        (
            "demand".to_string(),
            inputs(&[
                (TIKTOK_VIEWS_7D, views),
                (AMAZON_BSR_IMPROVEMENT_4W, bsr_improvement),
                (AMAZON_REVIEW_VELOCITY_4W, review_velocity),
                (CROSS_CHANNEL_ALIGNMENT, cross_channel),
            ]),
        ),
        (
            "competition".to_string(),
            inputs(&[
                (CONCENTRATION_HHI, hhi),
                (NEW_ENTRANT_RATE_4W, new_entrants),
                (REVIEW_MEDIAN_TOP10, review_median),
            ]),
        ),
        (
            "margin".to_string(),
            inputs(&[(PRICE_MEDIAN, price), (MARGIN_PROXY, margin)]),
        ),
        (
            "risk".to_string(),
            inputs(&[
                (RETURN_PROXY, returns),
                (REGULATORY_PROXY, regulatory),
                (HAZMAT_PROXY, hazmat),
            ]),
        ),
    ]);

    ScoreCard {
        pillars: PillarScores {
            demand: round_to(demand, 1),
            competition: round_to(competition, 1),
            margin: round_to(margin_score, 1),
            risk: round_to(risk, 1),
        },
        winner_prob: round_to(composite, 4),
        rank: round_to(composite * 100.0, 2),
        explanations: Explanations {
            top_signals: vec![
                format!("TikTok views: {}", group_thousands(views)),
                format!("BSR improvement: {:.1}%", bsr_improvement * 100.0),
                format!("Review velocity: {}", plain_number(review_velocity)),
            ],
            demand_breakdown: DemandBreakdown {
                tiktok_views: views,
                bsr_improvement,
            },
            pillar_inputs,
        },
    }
}

/// Order scores by rank descending, ties by entity id ascending.
pub fn sort_by_rank(scores: &mut [WeeklyScore]) {
    scores.sort_by(|a, b| {
        b.rank
            .total_cmp(&a.rank)
            .then_with(|| a.entity_id.cmp(&b.entity_id))
    });
}

fn input(features: &FeatureMap, name: &str, default: f64) -> f64 {
    features
        .get(name)
        .copied()
        .flatten()
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

fn pillar(raw: f64) -> f64 {
    raw.clamp(0.0, 100.0)
}

fn inputs(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
    pairs
        .iter()
        .map(|&(name, value)| (name.to_string(), value))
        .collect()
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}

/// `500000.0` -> `"500,000"`. Fractions are rounded away.
fn group_thousands(value: f64) -> String {
    #[allow(clippy::cast_possible_truncation)]
    let whole = value.round() as i64;
    let digits = whole.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if whole < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Whole numbers print without a fractional part.
fn plain_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}
