//! Value objects - small immutable types with no identity of their own.

mod abilities;
mod defense;
mod keys;
mod talent_slot;

pub use abilities::{Ability, AbilityScores};
pub use defense::DefenseTotals;
pub use keys::{OptionKey, SkillName, TreeName};
pub use talent_slot::{OpenSlot, SlotType, TalentProvenance, TalentSlot, TalentSlotState};
