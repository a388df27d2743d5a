//! Port traits for the engine's external collaborators.
//!
//! These are the only abstractions in the engine. Ports exist for:
//! - the read-only option catalog (could be files, a database, a service)
//! - character persistence (must support all-or-nothing application)
//! - finalize notifications (display is the host's concern)

mod types;

pub use types::{LevelUpSummary, MutationSet};

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use sagaforge_domain::{Catalog, CharacterId, CharacterRecord};

/// Failure at a port boundary.
#[derive(Debug, Error, Clone)]
pub enum PortError {
    /// The catalog collaborator could not supply data. The affected step
    /// must block on this; it never degrades to an empty option set.
    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// The persistence collaborator failed.
    #[error("Store error: {0}")]
    Store(String),

    /// The character does not exist in the store.
    #[error("Character not found: {0}")]
    CharacterNotFound(CharacterId),

    /// The notification collaborator failed. Non-fatal for the engine.
    #[error("Notification error: {0}")]
    Notification(String),
}

/// Supplies the validated, read-only option catalog.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogPort: Send + Sync {
    async fn load(&self) -> Result<Arc<Catalog>, PortError>;
}

/// Character persistence. `apply` must be all-or-nothing; the in-memory
/// snapshot/rollback in the transaction manager exists so the engine can
/// compensate even if the backing store cannot guarantee that itself.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CharacterStore: Send + Sync {
    async fn get(&self, id: CharacterId) -> Result<Option<CharacterRecord>, PortError>;
    async fn apply(&self, mutations: &MutationSet) -> Result<(), PortError>;
}

/// Receives a summary of what changed after a successful finalize.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationPort: Send + Sync {
    async fn level_up_completed(&self, summary: &LevelUpSummary) -> Result<(), PortError>;
}
