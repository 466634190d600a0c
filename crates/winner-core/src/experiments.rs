//! Real-world validation experiments (fake storefronts, ad creatives,
//! feasibility checks). Recorded for later use as a label source.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentChannel {
    ShopifyFakeDoor,
    TiktokCreative,
    AmazonFeasibility,
}

impl ExperimentChannel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ExperimentChannel::ShopifyFakeDoor => "shopify_fake_door",
            ExperimentChannel::TiktokCreative => "tiktok_creative",
            ExperimentChannel::AmazonFeasibility => "amazon_feasibility",
        }
    }
}

impl std::fmt::Display for ExperimentChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExperimentChannel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shopify_fake_door" => Ok(ExperimentChannel::ShopifyFakeDoor),
            "tiktok_creative" => Ok(ExperimentChannel::TiktokCreative),
            "amazon_feasibility" => Ok(ExperimentChannel::AmazonFeasibility),
            other => Err(CoreError::InvalidChannel(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentOutcome {
    Pass,
    Fail,
    Inconclusive,
}

impl ExperimentOutcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ExperimentOutcome::Pass => "pass",
            ExperimentOutcome::Fail => "fail",
            ExperimentOutcome::Inconclusive => "inconclusive",
        }
    }
}

impl std::fmt::Display for ExperimentOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExperimentOutcome {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pass" => Ok(ExperimentOutcome::Pass),
            "fail" => Ok(ExperimentOutcome::Fail),
            "inconclusive" => Ok(ExperimentOutcome::Inconclusive),
            other => Err(CoreError::InvalidOutcome(other.to_string())),
        }
    }
}

/// Input for starting an experiment.
#[derive(Debug, Clone)]
pub struct NewExperiment {
    pub week_start: NaiveDate,
    pub entity_id: Uuid,
    pub channel: ExperimentChannel,
    pub hypothesis: String,
    /// Free-form setup: landing page URL, creative angles, budget, ...
    pub setup: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub id: Uuid,
    pub week_start: NaiveDate,
    pub entity_id: Uuid,
    pub channel: ExperimentChannel,
    pub hypothesis: String,
    pub setup: Value,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// `None` while the experiment is still running.
    pub outcome: Option<ExperimentOutcome>,
    pub metrics: Option<Value>,
    pub notes: Option<String>,
}

impl Experiment {
    #[must_use]
    pub fn is_concluded(&self) -> bool {
        self.outcome.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_parses_all_variants() {
        for c in [
            ExperimentChannel::ShopifyFakeDoor,
            ExperimentChannel::TiktokCreative,
            ExperimentChannel::AmazonFeasibility,
        ] {
            assert_eq!(c.as_str().parse::<ExperimentChannel>().unwrap(), c);
        }
    }

    #[test]
    fn outcome_rejects_unknown() {
        assert!(matches!(
            "maybe".parse::<ExperimentOutcome>(),
            Err(CoreError::InvalidOutcome(_))
        ));
    }

    #[test]
    fn outcome_serializes_lowercase() {
        let json = serde_json::to_string(&ExperimentOutcome::Inconclusive).unwrap();
        assert_eq!(json, "\"inconclusive\"");
    }
}
