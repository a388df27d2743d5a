//! Character record entity.
//!
//! Owned feats, talents, classes, and Force options are immutable historical
//! facts: nothing in the engine mutates them except the transaction manager,
//! which appends to them during a successful finalize.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::CharacterId;
use crate::value_objects::{
    AbilityScores, DefenseTotals, OptionKey, SkillName, TalentProvenance,
};

/// A feat the character owns, with the level it was acquired at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnedFeat {
    pub key: OptionKey,
    pub acquired_at_level: u8,
}

/// A talent the character owns. The provenance tag records which slot paid
/// for it, which is what makes slot consumption derivable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnedTalent {
    pub key: OptionKey,
    pub acquired_at_level: u8,
    pub provenance: TalentProvenance,
}

/// A Force option the character owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnedForceOption {
    pub key: OptionKey,
    pub acquired_at_level: u8,
}

/// A character as persisted between progression sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterRecord {
    pub id: CharacterId,
    pub name: String,

    pub ability_scores: AbilityScores,
    /// Cumulative level across all classes. 0 for a character that has not
    /// yet finished character generation.
    pub level: u8,
    /// Level attained in each class. Values are always >= 1.
    pub class_levels: BTreeMap<OptionKey, u8>,

    pub feats: Vec<OwnedFeat>,
    pub talents: Vec<OwnedTalent>,
    pub force_options: Vec<OwnedForceOption>,
    pub trained_skills: BTreeSet<SkillName>,

    // Derived totals, recomputed from class levels at every finalize.
    pub base_attack_bonus: i32,
    pub defense: DefenseTotals,
    pub hit_points: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CharacterRecord {
    /// Create a fresh, level-0 character ready for character generation.
    pub fn new(name: impl Into<String>, ability_scores: AbilityScores) -> Self {
        let now = Utc::now();
        Self {
            id: CharacterId::new(),
            name: name.into(),
            ability_scores,
            level: 0,
            class_levels: BTreeMap::new(),
            feats: Vec::new(),
            talents: Vec::new(),
            force_options: Vec::new(),
            trained_skills: BTreeSet::new(),
            base_attack_bonus: 0,
            defense: DefenseTotals::default(),
            hit_points: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Level attained in one class, 0 if the character has none.
    pub fn class_level(&self, class: &OptionKey) -> u8 {
        self.class_levels.get(class).copied().unwrap_or(0)
    }

    pub fn has_feat(&self, key: &OptionKey) -> bool {
        self.feats.iter().any(|f| &f.key == key)
    }

    /// How many times a (repeatable) feat is owned.
    pub fn feat_count(&self, key: &OptionKey) -> usize {
        self.feats.iter().filter(|f| &f.key == key).count()
    }

    pub fn has_talent(&self, key: &OptionKey) -> bool {
        self.talents.iter().any(|t| &t.key == key)
    }

    pub fn has_force_option(&self, key: &OptionKey) -> bool {
        self.force_options.iter().any(|f| &f.key == key)
    }

    /// Owned talents bought with a heroic slot.
    pub fn heroic_talents(&self) -> impl Iterator<Item = &OwnedTalent> {
        self.talents
            .iter()
            .filter(|t| matches!(t.provenance, TalentProvenance::Heroic { .. }))
    }

    /// Owned talents bought with the given class's slots.
    pub fn class_talents<'a>(
        &'a self,
        class: &'a OptionKey,
    ) -> impl Iterator<Item = &'a OwnedTalent> {
        self.talents.iter().filter(move |t| {
            matches!(&t.provenance, TalentProvenance::Class { class: c, .. } if c == class)
        })
    }

    /// Update the modification timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Structural sanity check: class levels positive and summing to the
    /// cumulative level.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Character name cannot be empty".to_string());
        }
        if self.class_levels.values().any(|&l| l == 0) {
            return Err("Class levels must be positive".to_string());
        }
        let sum: u32 = self.class_levels.values().map(|&l| u32::from(l)).sum();
        if sum != u32::from(self.level) {
            return Err(format!(
                "Class levels sum to {} but cumulative level is {}",
                sum, self.level
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> OptionKey {
        OptionKey::new(s).unwrap()
    }

    #[test]
    fn fresh_character_is_level_zero() {
        let record = CharacterRecord::new("Kira", AbilityScores::default());
        assert_eq!(record.level, 0);
        assert!(record.class_levels.is_empty());
        assert!(record.validate().is_ok());
    }

    #[test]
    fn validate_rejects_mismatched_level_sum() {
        let mut record = CharacterRecord::new("Kira", AbilityScores::default());
        record.class_levels.insert(key("soldier"), 2);
        record.level = 3;
        assert!(record.validate().is_err());
        record.level = 2;
        assert!(record.validate().is_ok());
    }

    #[test]
    fn talent_provenance_filters() {
        let mut record = CharacterRecord::new("Kira", AbilityScores::default());
        record.talents.push(OwnedTalent {
            key: key("devastating_attack"),
            acquired_at_level: 1,
            provenance: TalentProvenance::Heroic { at_level: 1 },
        });
        record.talents.push(OwnedTalent {
            key: key("armored_defense"),
            acquired_at_level: 1,
            provenance: TalentProvenance::Class {
                class: key("soldier"),
                at_class_level: 1,
            },
        });

        assert_eq!(record.heroic_talents().count(), 1);
        assert_eq!(record.class_talents(&key("soldier")).count(), 1);
        assert_eq!(record.class_talents(&key("scout")).count(), 0);
    }

    #[test]
    fn feat_count_tracks_repeats() {
        let mut record = CharacterRecord::new("Kira", AbilityScores::default());
        record.feats.push(OwnedFeat {
            key: key("skill_training"),
            acquired_at_level: 1,
        });
        record.feats.push(OwnedFeat {
            key: key("skill_training"),
            acquired_at_level: 3,
        });
        assert_eq!(record.feat_count(&key("skill_training")), 2);
        assert!(record.has_feat(&key("skill_training")));
        assert!(!record.has_feat(&key("toughness")));
    }
}
