//! Plain data types crossing the port boundaries.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use sagaforge_domain::{
    Ability, AbilityScores, CharacterId, DerivedTotals, OptionKey, OwnedFeat, OwnedForceOption,
    OwnedTalent, SkillName,
};

/// Everything a successful finalize changes, as one all-or-nothing unit for
/// the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationSet {
    pub character_id: CharacterId,
    pub new_level: u8,
    /// The class taken this level and the class level reached in it.
    pub class: OptionKey,
    pub class_level: u8,
    pub ability_scores: AbilityScores,
    pub new_feats: Vec<OwnedFeat>,
    pub new_talents: Vec<OwnedTalent>,
    pub new_force_options: Vec<OwnedForceOption>,
    pub new_trained_skills: BTreeSet<SkillName>,
    pub derived: DerivedTotals,
}

/// What changed, as plain structured data for the notification collaborator.
/// The engine never renders this; display is the host's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelUpSummary {
    pub character_id: CharacterId,
    pub character_name: String,
    pub level_before: u8,
    pub level_after: u8,
    pub class: OptionKey,
    pub hit_points_delta: i32,
    pub ability_increases: BTreeMap<Ability, i32>,
    pub new_feats: Vec<OptionKey>,
    pub new_talents: Vec<OptionKey>,
    pub new_force_options: Vec<OptionKey>,
    pub new_trained_skills: Vec<SkillName>,
}
