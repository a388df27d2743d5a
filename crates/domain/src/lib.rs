//! SagaForge domain layer.
//!
//! Pure domain types and rules for tabletop-RPG character advancement:
//! character records, the read-only option catalog, structured prerequisite
//! expressions and their evaluator, and the derived-totals recompute. No
//! I/O, no async - that lives in `sagaforge-engine`.

pub mod derived;
pub mod entities;
pub mod error;
pub mod evaluation;
pub mod ids;
pub mod prerequisite;
pub mod value_objects;

pub use entities::{
    BabProgression, Catalog, CatalogOption, CharacterRecord, ClassDefinition, ClassRole,
    FeatDefinition, ForceOptionDefinition, OptionKind, OwnedFeat, OwnedForceOption, OwnedTalent,
    TalentDefinition,
};

pub use derived::{derived_totals, DerivedTotals};
pub use error::{CatalogError, DomainError};
pub use evaluation::{evaluate, CharacterView, Evaluation, UnmetRequirement};
pub use ids::{CharacterId, SessionId};
pub use prerequisite::PrerequisiteExpression;
pub use value_objects::{
    Ability, AbilityScores, DefenseTotals, OpenSlot, OptionKey, SkillName, SlotType,
    TalentProvenance, TalentSlot, TalentSlotState, TreeName,
};
