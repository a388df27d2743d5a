//! Talent slot value objects.
//!
//! Slots are derived, never persisted: they are recomputed from the
//! character's owned class levels each time, and consumption is determined
//! by matching owned talents' provenance tags against slot identity. This
//! keeps slot accounting idempotent - there is no separately stored
//! "points remaining" counter to drift.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::keys::{OptionKey, TreeName};

/// Which currency a talent slot spends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotType {
    /// Granted at every odd cumulative character level; may draw from any
    /// tree unlocked by any of the character's classes.
    Heroic,
    /// Granted at every odd level within one class's own track; may draw
    /// only from that class's trees.
    Class,
}

impl fmt::Display for SlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Heroic => write!(f, "heroic"),
            Self::Class => write!(f, "class"),
        }
    }
}

/// Records which slot a talent was bought with, at acquisition time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TalentProvenance {
    /// Bought with a heroic slot at the given cumulative level.
    Heroic { at_level: u8 },
    /// Bought with a class slot at the given level within that class.
    Class { class: OptionKey, at_class_level: u8 },
}

impl TalentProvenance {
    pub fn slot_type(&self) -> SlotType {
        match self {
            Self::Heroic { .. } => SlotType::Heroic,
            Self::Class { .. } => SlotType::Class,
        }
    }
}

/// A single derived talent grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TalentSlot {
    pub slot_type: SlotType,
    /// Set for class slots; `None` for heroic slots.
    pub class: Option<OptionKey>,
    /// The cumulative level (heroic slots) or class level (class slots)
    /// this grant belongs to.
    pub at_level: u8,
    pub consumed: bool,
}

/// The current slot picture for an in-progress level-up, as exposed to the
/// host UI: at most one heroic and one class slot can be open at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TalentSlotState {
    pub heroic: Option<OpenSlot>,
    pub class: Option<OpenSlot>,
}

impl TalentSlotState {
    /// Slots that exist at this level and still have their grant.
    pub fn open_count(&self) -> usize {
        [&self.heroic, &self.class]
            .into_iter()
            .flatten()
            .filter(|open| !open.slot.consumed)
            .count()
    }
}

/// An unconsumed slot together with the trees it may legally draw from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSlot {
    pub slot: TalentSlot,
    /// Sorted for deterministic presentation.
    pub legal_trees: Vec<TreeName>,
}
