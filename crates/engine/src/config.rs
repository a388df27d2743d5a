//! Progression configuration.
//!
//! House rules and table-level knobs, owned by the host and handed to the
//! engine at construction. Serde derives are intentional: configuration is
//! stored and transmitted across infrastructure boundaries.

use serde::{Deserialize, Serialize};

use sagaforge_domain::OptionKey;

/// How ability increase points may be spread at qualifying levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbilityAllocationRule {
    /// One point each to two distinct abilities.
    TwoDistinctSingles,
    /// Up to two points total, at most two on a single ability (so +2 to
    /// one ability or +1 to each of two).
    FlexibleTwoPoints,
}

impl Default for AbilityAllocationRule {
    fn default() -> Self {
        Self::TwoDistinctSingles
    }
}

/// An optional house rule declaring two normally-distinct talents a single
/// grantable unit: selecting either stages both against one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TalentPairing {
    pub first: OptionKey,
    pub second: OptionKey,
}

impl TalentPairing {
    /// The other member of the pair, if `key` is a member.
    pub fn partner_of<'a>(&'a self, key: &OptionKey) -> Option<&'a OptionKey> {
        if &self.first == key {
            Some(&self.second)
        } else if &self.second == key {
            Some(&self.first)
        } else {
            None
        }
    }
}

/// Table-level progression settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressionConfig {
    /// The allocation rule for ability increases.
    pub ability_rule: AbilityAllocationRule,
    /// Points granted at each qualifying level.
    pub ability_points_per_increase: u32,
    /// Ability increases happen at levels divisible by this.
    pub ability_increase_every: u8,
    /// How many Force options a Force-sensitive character may pick per level.
    pub force_options_per_level: usize,
    /// House-rule talent pairings, resolved inside the allocator.
    pub talent_pairings: Vec<TalentPairing>,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            ability_rule: AbilityAllocationRule::default(),
            ability_points_per_increase: 2,
            ability_increase_every: 4,
            force_options_per_level: 1,
            talent_pairings: Vec::new(),
        }
    }
}

impl ProgressionConfig {
    /// Whether reaching `new_level` grants an ability increase.
    pub fn grants_ability_increase(&self, new_level: u8) -> bool {
        self.ability_increase_every > 0 && new_level % self.ability_increase_every == 0
    }

    /// The paired partner of a talent, if a pairing names it.
    pub fn talent_partner<'a>(&'a self, key: &OptionKey) -> Option<&'a OptionKey> {
        self.talent_pairings
            .iter()
            .find_map(|p| p.partner_of(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> OptionKey {
        OptionKey::new(s).unwrap()
    }

    #[test]
    fn ability_increase_at_multiples_of_four() {
        let config = ProgressionConfig::default();
        assert!(!config.grants_ability_increase(1));
        assert!(!config.grants_ability_increase(3));
        assert!(config.grants_ability_increase(4));
        assert!(config.grants_ability_increase(8));
    }

    #[test]
    fn pairing_is_symmetric() {
        let config = ProgressionConfig {
            talent_pairings: vec![TalentPairing {
                first: key("deflect"),
                second: key("block"),
            }],
            ..Default::default()
        };
        assert_eq!(config.talent_partner(&key("deflect")), Some(&key("block")));
        assert_eq!(config.talent_partner(&key("block")), Some(&key("deflect")));
        assert_eq!(config.talent_partner(&key("evasion")), None);
    }
}
