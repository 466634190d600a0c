use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub entities_path: PathBuf,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    /// Schema tag written alongside every feature set.
    pub feature_version: String,
    /// Scoring model used when a command does not name one.
    pub model_version: String,
    /// Number of best-ranked Amazon listings considered per snapshot.
    pub top_k: usize,
    /// Minimum BSR improvement before cross-channel alignment fires.
    pub alignment_min_bsr_improvement: f64,
    pub max_concurrent_entities: usize,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("entities_path", &self.entities_path)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("feature_version", &self.feature_version)
            .field("model_version", &self.model_version)
            .field("top_k", &self.top_k)
            .field(
                "alignment_min_bsr_improvement",
                &self.alignment_min_bsr_improvement,
            )
            .field("max_concurrent_entities", &self.max_concurrent_entities)
            .finish()
    }
}
