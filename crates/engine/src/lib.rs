//! SagaForge progression engine.
//!
//! Drives single-character level-advancement sessions over the pure domain
//! layer: a wizard-style state machine, the dual-currency talent allocator,
//! advisory suggestions, and a transactional finalize with exact rollback.
//! External collaborators (catalog, persistence, notifications) sit behind
//! async port traits; everything else is synchronous.

pub mod allocator;
pub mod catalog_cache;
pub mod config;
pub mod ports;
pub mod registry;
pub mod staging;
pub mod suggestion;
pub mod transaction;
pub mod use_cases;

#[cfg(test)]
mod test_fixtures;

pub use allocator::DualTalentAllocator;
pub use catalog_cache::CatalogCache;
pub use config::{AbilityAllocationRule, ProgressionConfig, TalentPairing};
pub use ports::{
    CatalogPort, CharacterStore, LevelUpSummary, MutationSet, NotificationPort, PortError,
};
pub use registry::SessionRegistry;
pub use staging::{PendingSelections, StagedTalent};
pub use suggestion::{RankedOption, SuggestionEngine};
pub use transaction::{FinalizeProbe, FinalizeStep, NoopProbe, TransactionManager};
pub use use_cases::progression::{
    ProgressionEngine, ProgressionError, ProgressionSession, ProgressionState, SessionMode,
};
