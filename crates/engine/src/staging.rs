//! The staging area: selections pending within one progression session.
//!
//! Nothing here is persisted. The staging area is discarded on cancel and
//! merged into the character record only by the transaction manager on
//! finalize. A failed confirmation must leave its slot of the staging area
//! untouched.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use sagaforge_domain::{Ability, OptionKey, SkillName, TalentProvenance};

/// A talent staged against a specific slot, already expanded through any
/// house-rule pairing by the allocator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedTalent {
    pub key: OptionKey,
    pub provenance: TalentProvenance,
}

/// All selections staged during a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSelections {
    pub class: Option<OptionKey>,
    pub ability_deltas: BTreeMap<Ability, i32>,
    pub feats: Vec<OptionKey>,
    pub talents: Vec<StagedTalent>,
    pub force_options: Vec<OptionKey>,
    pub trained_skills: BTreeSet<SkillName>,
}

impl PendingSelections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.class.is_none()
            && self.ability_deltas.is_empty()
            && self.feats.is_empty()
            && self.talents.is_empty()
            && self.force_options.is_empty()
            && self.trained_skills.is_empty()
    }

    /// Discard everything. Used on cancel and after a successful finalize.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Whether an option key is staged anywhere (for same-session duplicate
    /// checks).
    pub fn contains_option(&self, key: &OptionKey) -> bool {
        self.class.as_ref() == Some(key)
            || self.feats.contains(key)
            || self.talents.iter().any(|t| &t.key == key)
            || self.force_options.contains(key)
    }
}
