//! Advisory recommendation tiers for eligible options.
//!
//! Suggestions annotate, never gate: a tier of 0 is still selectable. The
//! ordering is a deterministic total order so recomputing on identical
//! input yields an identical list.

use sagaforge_domain::{CatalogOption, CharacterView};

/// An eligible option with its advisory tier and the reason it earned it.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedOption {
    pub option: CatalogOption,
    /// Higher is more strongly recommended. 0 means no signal matched.
    pub tier: u8,
    pub reason: Option<String>,
    /// Whether this option continues a prerequisite chain the character
    /// has already started. Used as the in-tier tie-break.
    pub continues_chain: bool,
}

const TIER_CHAIN: u8 = 4;
const TIER_SKILL_TAG: u8 = 3;
const TIER_ABILITY_TAG: u8 = 2;
const TIER_CLASS_THEME: u8 = 1;

/// Scores options from the character's play-style signals.
#[derive(Debug, Default)]
pub struct SuggestionEngine;

impl SuggestionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Rank already-eligible options. Exactly one tier per option, from the
    /// highest-precedence signal that applies.
    ///
    /// Order: tier descending, chain-continuers before fresh picks within a
    /// tier, then name ascending. No randomness and no dependence on
    /// unordered-collection iteration.
    pub fn rank(&self, eligible: Vec<CatalogOption>, view: &CharacterView<'_>) -> Vec<RankedOption> {
        let emphasis = view.ability_scores.highest();
        let emphasis_tags = [
            emphasis.as_str().to_lowercase(),
            emphasis.display_name().to_lowercase(),
        ];

        let mut ranked: Vec<RankedOption> = eligible
            .into_iter()
            .map(|option| {
                let continues_chain = option
                    .prerequisites()
                    .referenced_options()
                    .into_iter()
                    .any(|key| view.feats.contains(key) || view.talents.contains(key));

                let skill_tag = option.tags().iter().find(|tag| {
                    view.trained_skills
                        .iter()
                        .any(|skill| skill.as_str().eq_ignore_ascii_case(tag))
                });
                let ability_tag = option
                    .tags()
                    .iter()
                    .find(|tag| emphasis_tags.iter().any(|e| e.eq_ignore_ascii_case(tag)));
                let class_tag = option.tags().iter().find(|tag| {
                    view.class_levels
                        .keys()
                        .any(|class| class.as_str().eq_ignore_ascii_case(tag))
                });

                let (tier, reason) = if continues_chain {
                    (
                        TIER_CHAIN,
                        Some(format!("Continues a chain you have started: {}", option.name())),
                    )
                } else if let Some(tag) = skill_tag {
                    (TIER_SKILL_TAG, Some(format!("Matches your trained skill: {tag}")))
                } else if ability_tag.is_some() {
                    (
                        TIER_ABILITY_TAG,
                        Some(format!(
                            "Plays to your {} emphasis",
                            emphasis.display_name()
                        )),
                    )
                } else if let Some(tag) = class_tag {
                    (TIER_CLASS_THEME, Some(format!("Fits your {tag} background")))
                } else {
                    (0, None)
                };

                RankedOption {
                    option,
                    tier,
                    reason,
                    continues_chain,
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.tier
                .cmp(&a.tier)
                .then_with(|| b.continues_chain.cmp(&a.continues_chain))
                .then_with(|| a.option.name().cmp(b.option.name()))
        });
        ranked
    }
}
