//! Feature, label and scoring core for the Winner Engine.
//!
//! Computes weekly, as-of features for each entity from marketplace
//! observations, combines them into a deterministic baseline score, and
//! backfills horizon labels for past weeks. All storage access goes through
//! the [`Store`] trait.

pub mod error;
pub mod features;
pub mod keywords;
pub mod labels;
pub mod memory;
pub mod pipeline;
pub mod resolver;
pub mod scoring;
pub mod stats;
pub mod store;
pub mod window;

pub use error::EngineError;
pub use features::{build_entity_features, FeatureConfig};
pub use labels::{LabelOutcome, LabelThresholds};
pub use memory::MemoryStore;
pub use pipeline::{
    backfill_labels, build_features_for_week, build_labels_for_week, score_week, EngineSettings,
    RunSummary, WeekScores,
};
pub use resolver::{AliasSet, Resolver};
pub use scoring::{score, ScoreCard};
pub use store::Store;
pub use window::{Aggregator, DateRange};
