use thiserror::Error;
use uuid::Uuid;
use winner_core::{ConfigError, CoreError};

#[derive(Debug, Error)]
pub enum EngineError {
    /// The storage collaborator failed. Surfaced per entity; the run continues.
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Invalid run input. Fatal before any per-entity work starts.
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("entity {0} not found")]
    EntityNotFound(Uuid),

    #[error("alias '{alias}' already belongs to entity {owner}")]
    AliasOwnedElsewhere { alias: String, owner: Uuid },
}

impl EngineError {
    pub(crate) fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage(Box::new(err))
    }
}
