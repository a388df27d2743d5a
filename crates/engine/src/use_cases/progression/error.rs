//! Progression session errors.

use sagaforge_domain::{
    CharacterId, DomainError, OptionKey, OptionKind, SlotType, TreeName, UnmetRequirement,
};

use crate::ports::PortError;
use crate::transaction::FinalizeStep;

use super::ProgressionState;

/// Everything a progression command can fail with.
///
/// The recoverable kinds (`PrerequisiteNotMet`, `DuplicateSelection`,
/// `InvalidAllocation`, `TreeNotUnlocked`, `SlotAlreadyConsumed`) reject a
/// single `confirm_*` call and leave the session intact for the user to
/// retry. `CatalogUnavailable` blocks the affected step. `FinalizationFailure`
/// ends the session and is only ever surfaced after the automatic rollback
/// has already restored the character.
#[derive(Debug, thiserror::Error)]
pub enum ProgressionError {
    #[error("Prerequisites not met for {option}: {}", format_failures(.failures))]
    PrerequisiteNotMet {
        option: OptionKey,
        failures: Vec<UnmetRequirement>,
    },

    #[error("Already owned and not repeatable: {option}")]
    DuplicateSelection { option: OptionKey },

    #[error("Invalid allocation: {0}")]
    InvalidAllocation(String),

    #[error("Tree {tree} is not unlocked for the {slot} slot (talent {talent})")]
    TreeNotUnlocked {
        talent: OptionKey,
        tree: TreeName,
        slot: SlotType,
    },

    #[error("The {slot} slot has no remaining grant at this level")]
    SlotAlreadyConsumed { slot: SlotType },

    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("Finalize failed at step {step}: {reason}")]
    FinalizationFailure { step: FinalizeStep, reason: String },

    #[error("Character {0} already has an active progression session")]
    SessionAlreadyActive(CharacterId),

    #[error("Command {command} is not valid in state {state}")]
    InvalidStateTransition {
        command: &'static str,
        state: ProgressionState,
    },

    #[error("Unknown {kind}: {key}")]
    UnknownOption { kind: OptionKind, key: OptionKey },

    #[error("Character not found: {0}")]
    CharacterNotFound(CharacterId),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Port error: {0}")]
    Port(#[from] PortError),
}

fn format_failures(failures: &[UnmetRequirement]) -> String {
    failures
        .iter()
        .map(|f| f.description.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}
