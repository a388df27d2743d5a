//! Domain entities.

mod catalog;
mod character;

pub use catalog::{
    BabProgression, Catalog, CatalogOption, ClassDefinition, ClassRole, FeatDefinition,
    ForceOptionDefinition, OptionKind, TalentDefinition,
};
pub use character::{CharacterRecord, OwnedFeat, OwnedForceOption, OwnedTalent};
