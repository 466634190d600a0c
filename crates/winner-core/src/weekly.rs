//! Weekly aggregate shapes persisted by the engine: feature sets, label sets
//! and scores, plus the input validators every batch command runs first.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ConfigError;

pub const DEFAULT_FEATURE_VERSION: &str = "v1.0";
pub const BASELINE_MODEL_VERSION: &str = "baseline";
pub const LABEL_HORIZONS_WEEKS: [u32; 3] = [4, 8, 12];

/// Feature schema tag, e.g. `"v1.0"`.
pub type FeatureVersion = String;
/// Scoring model tag, e.g. `"baseline"`.
pub type ModelVersion = String;

/// Flat feature name → value mapping. `None` means "not computable".
///
/// A `BTreeMap` keeps serialization order stable so equality and JSON output
/// do not depend on insertion order.
pub type FeatureMap = BTreeMap<String, Option<f64>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyFeatureSet {
    pub week_start: NaiveDate,
    pub entity_id: Uuid,
    pub feature_version: FeatureVersion,
    pub features: FeatureMap,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyLabelSet {
    pub week_start: NaiveDate,
    pub entity_id: Uuid,
    pub winner_4w: Option<bool>,
    pub winner_8w: Option<bool>,
    pub winner_12w: Option<bool>,
    pub trend_spike: Option<bool>,
    pub durable: Option<bool>,
    pub trending: Option<bool>,
}

impl WeeklyLabelSet {
    #[must_use]
    pub fn new(week_start: NaiveDate, entity_id: Uuid) -> Self {
        Self {
            week_start,
            entity_id,
            ..Self::default()
        }
    }

    /// The winner label for `horizon_weeks`, if that horizon is tracked.
    #[must_use]
    pub fn winner(&self, horizon_weeks: u32) -> Option<bool> {
        match horizon_weeks {
            4 => self.winner_4w,
            8 => self.winner_8w,
            12 => self.winner_12w,
            _ => None,
        }
    }

    /// Set the winner label for a tracked horizon. Untracked horizons are ignored.
    pub fn set_winner(&mut self, horizon_weeks: u32, value: bool) {
        match horizon_weeks {
            4 => self.winner_4w = Some(value),
            8 => self.winner_8w = Some(value),
            12 => self.winner_12w = Some(value),
            _ => {}
        }
    }

    /// `true` when no label field has been computed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.winner_4w.is_none()
            && self.winner_8w.is_none()
            && self.winner_12w.is_none()
            && self.trend_spike.is_none()
            && self.durable.is_none()
            && self.trending.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PillarScores {
    pub demand: f64,
    pub competition: f64,
    pub margin: f64,
    pub risk: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandBreakdown {
    pub tiktok_views: f64,
    pub bsr_improvement: f64,
}

/// Audit payload stored with each score: a fixed selection of raw signals,
/// the demand breakdown, and the raw inputs each pillar consumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanations {
    pub top_signals: Vec<String>,
    pub demand_breakdown: DemandBreakdown,
    pub pillar_inputs: BTreeMap<String, BTreeMap<String, f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyScore {
    pub week_start: NaiveDate,
    pub entity_id: Uuid,
    pub model_version: ModelVersion,
    pub pillars: PillarScores,
    /// Composite winner probability in `[0, 1]`.
    pub winner_prob: f64,
    /// `winner_prob * 100`, used for ordering reports.
    pub rank: f64,
    pub explanations: Explanations,
}

/// Weeks start on Monday.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidWeekStart`] for any other weekday.
pub fn validate_week_start(week_start: NaiveDate) -> Result<(), ConfigError> {
    if week_start.weekday() == Weekday::Mon {
        Ok(())
    } else {
        Err(ConfigError::InvalidWeekStart(week_start))
    }
}

/// # Errors
///
/// Returns [`ConfigError::InvalidHorizon`] unless `weeks` is 4, 8 or 12.
pub fn validate_horizon(weeks: u32) -> Result<(), ConfigError> {
    if LABEL_HORIZONS_WEEKS.contains(&weeks) {
        Ok(())
    } else {
        Err(ConfigError::InvalidHorizon(weeks))
    }
}

/// Only the heuristic baseline is implemented.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownModelVersion`] for anything else.
pub fn validate_model_version(version: &str) -> Result<(), ConfigError> {
    if version == BASELINE_MODEL_VERSION {
        Ok(())
    } else {
        Err(ConfigError::UnknownModelVersion(version.to_string()))
    }
}

/// Both ends must be Mondays and `from <= to`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidWeekStart`] or [`ConfigError::InvalidDateRange`].
pub fn validate_week_range(from: NaiveDate, to: NaiveDate) -> Result<(), ConfigError> {
    validate_week_start(from)?;
    validate_week_start(to)?;
    if from > to {
        return Err(ConfigError::InvalidDateRange { from, to });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn monday_is_valid_week_start() {
        assert!(validate_week_start(date(2026, 1, 12)).is_ok());
    }

    #[test]
    fn tuesday_is_rejected() {
        assert!(matches!(
            validate_week_start(date(2026, 1, 13)),
            Err(ConfigError::InvalidWeekStart(_))
        ));
    }

    #[test]
    fn only_tracked_horizons_validate() {
        assert!(validate_horizon(4).is_ok());
        assert!(validate_horizon(8).is_ok());
        assert!(validate_horizon(12).is_ok());
        assert!(matches!(
            validate_horizon(6),
            Err(ConfigError::InvalidHorizon(6))
        ));
    }

    #[test]
    fn reversed_range_is_rejected() {
        let err = validate_week_range(date(2026, 2, 2), date(2026, 1, 5)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDateRange { .. }));
    }

    #[test]
    fn label_set_winner_accessors() {
        let mut labels = WeeklyLabelSet::new(date(2026, 1, 12), Uuid::nil());
        assert!(labels.is_empty());
        labels.set_winner(8, true);
        labels.set_winner(5, true);
        assert_eq!(labels.winner(8), Some(true));
        assert_eq!(labels.winner(4), None);
        assert_eq!(labels.winner(5), None);
        assert!(!labels.is_empty());
    }

    #[test]
    fn feature_set_json_round_trip_is_exact() {
        let mut features = FeatureMap::new();
        features.insert("econ_price_median".to_string(), Some(29.99));
        features.insert("comp_amazon_concentration_hhi".to_string(), Some(0.1));
        features.insert("demand_amazon_bsr_median_top10".to_string(), None);
        features.insert("demand_tiktok_views_slope_4w".to_string(), Some(1.0 / 3.0));
        let set = WeeklyFeatureSet {
            week_start: date(2026, 1, 12),
            entity_id: Uuid::new_v4(),
            feature_version: DEFAULT_FEATURE_VERSION.to_string(),
            features,
        };

        let json = serde_json::to_string(&set).unwrap();
        let back: WeeklyFeatureSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }
}
