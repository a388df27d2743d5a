//! Prerequisite expressions for catalog options.
//!
//! Requirements are a structured boolean tree, never free text: atoms check
//! one mechanical fact each, and combinators join them with all-of, any-of,
//! or n-of-m semantics. Free-text rendering, if a host wants it, is derived
//! from this tree; the tree is the source of truth.

use serde::{Deserialize, Serialize};

use crate::value_objects::{Ability, OptionKey, SkillName};

/// A requirement for acquiring a catalog option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PrerequisiteExpression {
    /// Minimum cumulative character level
    MinLevel {
        /// Minimum level required
        level: u8,
    },
    /// Minimum ability base score
    MinAbilityScore {
        /// The ability checked
        ability: Ability,
        /// Minimum base score required
        score: i32,
    },
    /// Minimum derived ability modifier
    MinAbilityModifier {
        /// The ability checked
        ability: Ability,
        /// Minimum modifier required
        modifier: i32,
    },
    /// Minimum base attack bonus
    MinBaseAttackBonus {
        /// Minimum BAB required
        bonus: i32,
    },
    /// Must have a skill trained
    SkillTrained {
        /// The required skill
        skill: SkillName,
    },
    /// Must own another feat
    HasFeat {
        /// Key of the required feat
        key: OptionKey,
    },
    /// Must own another talent
    HasTalent {
        /// Key of the required talent
        key: OptionKey,
    },
    /// Must have levels in a specific class
    HasClassLevel {
        /// Key of the required class
        class: OptionKey,
        /// Minimum levels in that class
        #[serde(default = "default_min_level")]
        min_level: u8,
    },
    /// Must be Force-sensitive (via any owned Force-sensitive class)
    ForceSensitive,
    /// Narrative or organizational requirement a machine cannot verify
    /// (e.g., "must be accepted into the Antarian Rangers"). Never blocks
    /// automated validity; surfaced to the user as an advisory note.
    Narrative {
        /// Description of the requirement, for display
        description: String,
    },
    /// All of the listed requirements
    AllOf {
        /// List of required expressions
        requirements: Vec<PrerequisiteExpression>,
    },
    /// Any one of the listed requirements
    AnyOf {
        /// List of alternative expressions
        options: Vec<PrerequisiteExpression>,
    },
    /// At least `required` of the listed requirements
    NOf {
        /// How many options must be satisfied
        required: usize,
        /// The options counted
        options: Vec<PrerequisiteExpression>,
    },
}

fn default_min_level() -> u8 {
    1
}

impl PrerequisiteExpression {
    /// The trivially-true expression (an empty all-of).
    pub fn none() -> Self {
        Self::AllOf {
            requirements: Vec::new(),
        }
    }

    /// Whether this expression imposes no requirement at all.
    pub fn is_trivial(&self) -> bool {
        matches!(self, Self::AllOf { requirements } if requirements.is_empty())
    }

    /// Create a minimum level prerequisite.
    pub fn min_level(level: u8) -> Self {
        Self::MinLevel { level }
    }

    /// Create a minimum ability score prerequisite.
    pub fn min_ability(ability: Ability, score: i32) -> Self {
        Self::MinAbilityScore { ability, score }
    }

    /// Create a minimum base attack bonus prerequisite.
    pub fn min_bab(bonus: i32) -> Self {
        Self::MinBaseAttackBonus { bonus }
    }

    /// Create a has-feat prerequisite.
    pub fn has_feat(key: OptionKey) -> Self {
        Self::HasFeat { key }
    }

    /// Create a has-talent prerequisite.
    pub fn has_talent(key: OptionKey) -> Self {
        Self::HasTalent { key }
    }

    /// Create a trained-skill prerequisite.
    pub fn skill_trained(skill: SkillName) -> Self {
        Self::SkillTrained { skill }
    }

    /// Create a narrative (unverifiable) prerequisite.
    pub fn narrative(description: impl Into<String>) -> Self {
        Self::Narrative {
            description: description.into(),
        }
    }

    /// Create an all-of combinator.
    pub fn all_of(requirements: Vec<PrerequisiteExpression>) -> Self {
        Self::AllOf { requirements }
    }

    /// Create an any-of combinator.
    pub fn any_of(options: Vec<PrerequisiteExpression>) -> Self {
        Self::AnyOf { options }
    }

    /// Keys of feats and talents referenced anywhere in this tree.
    ///
    /// Used by catalog validation to build the dependency graph for the
    /// acyclicity check.
    pub fn referenced_options(&self) -> Vec<&OptionKey> {
        let mut keys = Vec::new();
        self.collect_referenced(&mut keys);
        keys
    }

    fn collect_referenced<'a>(&'a self, out: &mut Vec<&'a OptionKey>) {
        match self {
            Self::HasFeat { key } | Self::HasTalent { key } => out.push(key),
            Self::HasClassLevel { class, .. } => out.push(class),
            Self::AllOf { requirements } => {
                for r in requirements {
                    r.collect_referenced(out);
                }
            }
            Self::AnyOf { options } | Self::NOf { options, .. } => {
                for o in options {
                    o.collect_referenced(out);
                }
            }
            _ => {}
        }
    }
}
