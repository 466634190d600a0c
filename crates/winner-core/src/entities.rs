use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ConfigError, CoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Concept,
    KeywordCluster,
    Brand,
    Store,
}

impl EntityType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Concept => "concept",
            EntityType::KeywordCluster => "keyword_cluster",
            EntityType::Brand => "brand",
            EntityType::Store => "store",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "concept" => Ok(EntityType::Concept),
            "keyword_cluster" => Ok(EntityType::KeywordCluster),
            "brand" => Ok(EntityType::Brand),
            "store" => Ok(EntityType::Store),
            other => Err(CoreError::InvalidEntityType(other.to_string())),
        }
    }
}

/// Where an alias was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Amazon,
    Tiktok,
    Shopify,
    Manual,
}

impl Source {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Amazon => "amazon",
            Source::Tiktok => "tiktok",
            Source::Shopify => "shopify",
            Source::Manual => "manual",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "amazon" => Ok(Source::Amazon),
            "tiktok" => Ok(Source::Tiktok),
            "shopify" => Ok(Source::Shopify),
            "manual" => Ok(Source::Manual),
            other => Err(CoreError::InvalidSource(other.to_string())),
        }
    }
}

/// Canonical product concept tracked across marketplaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: Uuid,
    pub entity_type: EntityType,
    pub canonical_name: String,
    pub category_primary: Option<String>,
}

/// A per-source identifier mapped to one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alias {
    pub entity_id: Uuid,
    pub source: Source,
    pub alias_text: String,
    pub confidence: f64,
}

impl Alias {
    /// Build an alias with normalized text.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfidence`] when `confidence` is not in `[0, 1]`.
    pub fn new(
        entity_id: Uuid,
        source: Source,
        alias_text: &str,
        confidence: f64,
    ) -> Result<Self, CoreError> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(CoreError::InvalidConfidence(confidence));
        }
        Ok(Self {
            entity_id,
            source,
            alias_text: normalize_alias(source, alias_text),
            confidence,
        })
    }
}

/// Normalize an external identifier into the form stored in `entity_aliases`.
///
/// - Amazon: ASINs are upper-cased; free-text aliases are trimmed only.
/// - TikTok: leading `#` is dropped and the hashtag lower-cased.
/// - Shopify: scheme, `www.` and any path are stripped from store domains.
/// - Manual: trimmed.
#[must_use]
pub fn normalize_alias(source: Source, raw: &str) -> String {
    let trimmed = raw.trim();
    match source {
        Source::Amazon => {
            if looks_like_asin(trimmed) {
                trimmed.to_ascii_uppercase()
            } else {
                trimmed.to_string()
            }
        }
        Source::Tiktok => trimmed.trim_start_matches('#').to_lowercase(),
        Source::Shopify => {
            let lower = trimmed.to_lowercase();
            let without_scheme = lower
                .strip_prefix("https://")
                .or_else(|| lower.strip_prefix("http://"))
                .unwrap_or(&lower);
            let without_www = without_scheme
                .strip_prefix("www.")
                .unwrap_or(without_scheme);
            without_www
                .split('/')
                .next()
                .unwrap_or(without_www)
                .to_string()
        }
        Source::Manual => trimmed.to_string(),
    }
}

fn looks_like_asin(s: &str) -> bool {
    s.len() == 10 && s.starts_with(['B', 'b']) && s.chars().all(|c| c.is_ascii_alphanumeric())
}

// ---------------------------------------------------------------------------
// Seed file
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasSeed {
    pub source: Source,
    pub text: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySeed {
    pub name: String,
    #[serde(rename = "type", default = "default_entity_type")]
    pub entity_type: EntityType,
    pub category: Option<String>,
    #[serde(default)]
    pub aliases: Vec<AliasSeed>,
}

fn default_entity_type() -> EntityType {
    EntityType::Concept
}

#[derive(Debug, Deserialize)]
pub struct EntitiesFile {
    pub entities: Vec<EntitySeed>,
}

/// Load and validate the entity seed file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_entities(path: &Path) -> Result<EntitiesFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::EntitiesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let file: EntitiesFile = serde_yaml::from_str(&content)?;
    validate_entities(&file)?;
    Ok(file)
}

fn validate_entities(file: &EntitiesFile) -> Result<(), ConfigError> {
    let mut seen_names = HashSet::new();
    let mut seen_aliases = HashSet::new();

    for entity in &file.entities {
        if entity.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "entity name must be non-empty".to_string(),
            ));
        }

        if !seen_names.insert((entity.entity_type, entity.name.to_lowercase())) {
            return Err(ConfigError::Validation(format!(
                "duplicate {} entity: '{}'",
                entity.entity_type, entity.name
            )));
        }

        for alias in &entity.aliases {
            if !(0.0..=1.0).contains(&alias.confidence) {
                return Err(ConfigError::Validation(format!(
                    "alias '{}' on '{}' has confidence {} outside [0, 1]",
                    alias.text, entity.name, alias.confidence
                )));
            }

            let normalized = normalize_alias(alias.source, &alias.text);
            if normalized.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "empty {} alias on '{}'",
                    alias.source, entity.name
                )));
            }
            if !seen_aliases.insert((alias.source, normalized.clone())) {
                return Err(ConfigError::Validation(format!(
                    "{} alias '{normalized}' is mapped to more than one entity",
                    alias.source
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "entities_test.rs"]
mod tests;
