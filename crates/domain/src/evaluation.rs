//! Prerequisite evaluation.
//!
//! A pure function from (expression, character view) to a structured
//! verdict. The view is the union of the persisted character record and the
//! session's pending selections, so an option confirmed earlier in the same
//! session counts as owned for anything confirmed later.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::entities::{Catalog, CharacterRecord};
use crate::prerequisite::PrerequisiteExpression;
use crate::value_objects::{AbilityScores, OptionKey, SkillName};

/// A single failed requirement atom, with a human-readable description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmetRequirement {
    /// The failing atom itself, for structured rendering.
    pub atom: PrerequisiteExpression,
    pub description: String,
}

/// Verdict of evaluating a prerequisite expression.
///
/// Narrative atoms never affect `satisfied`; they land in `advisory` so the
/// host can surface them without mechanically gating on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub satisfied: bool,
    pub failures: Vec<UnmetRequirement>,
    pub advisory: Vec<String>,
}

impl Evaluation {
    fn satisfied() -> Self {
        Self {
            satisfied: true,
            failures: Vec::new(),
            advisory: Vec::new(),
        }
    }

    fn failed(atom: PrerequisiteExpression, description: String) -> Self {
        Self {
            satisfied: false,
            failures: vec![UnmetRequirement { atom, description }],
            advisory: Vec::new(),
        }
    }
}

/// The character as the evaluator sees it: persisted record plus any
/// same-session pending selections merged in.
#[derive(Debug, Clone)]
pub struct CharacterView<'a> {
    catalog: &'a Catalog,
    pub level: u8,
    pub ability_scores: AbilityScores,
    pub base_attack_bonus: i32,
    pub class_levels: BTreeMap<OptionKey, u8>,
    pub feats: BTreeSet<OptionKey>,
    pub talents: BTreeSet<OptionKey>,
    pub force_options: BTreeSet<OptionKey>,
    pub trained_skills: BTreeSet<SkillName>,
}

impl<'a> CharacterView<'a> {
    /// A view over the persisted record only, with nothing pending.
    pub fn of_record(record: &CharacterRecord, catalog: &'a Catalog) -> Self {
        Self {
            catalog,
            level: record.level,
            ability_scores: record.ability_scores,
            base_attack_bonus: record.base_attack_bonus,
            class_levels: record.class_levels.clone(),
            feats: record.feats.iter().map(|f| f.key.clone()).collect(),
            talents: record.talents.iter().map(|t| t.key.clone()).collect(),
            force_options: record.force_options.iter().map(|f| f.key.clone()).collect(),
            trained_skills: record.trained_skills.clone(),
        }
    }

    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    /// Whether any class the view has levels in is Force-sensitive.
    pub fn is_force_sensitive(&self) -> bool {
        self.class_levels
            .keys()
            .filter_map(|key| self.catalog.class(key))
            .any(|class| class.force_sensitive)
    }
}

/// Evaluate a prerequisite expression against a character view.
pub fn evaluate(expr: &PrerequisiteExpression, view: &CharacterView<'_>) -> Evaluation {
    match expr {
        PrerequisiteExpression::MinLevel { level } => {
            if view.level >= *level {
                Evaluation::satisfied()
            } else {
                Evaluation::failed(
                    expr.clone(),
                    format!("Character level {} is below required {}", view.level, level),
                )
            }
        }
        PrerequisiteExpression::MinAbilityScore { ability, score } => {
            let actual = view.ability_scores.score(*ability);
            if actual >= *score {
                Evaluation::satisfied()
            } else {
                Evaluation::failed(
                    expr.clone(),
                    format!("{} {} is below required {}", ability, actual, score),
                )
            }
        }
        PrerequisiteExpression::MinAbilityModifier { ability, modifier } => {
            let actual = view.ability_scores.modifier(*ability);
            if actual >= *modifier {
                Evaluation::satisfied()
            } else {
                Evaluation::failed(
                    expr.clone(),
                    format!(
                        "{} modifier {} is below required {}",
                        ability, actual, modifier
                    ),
                )
            }
        }
        PrerequisiteExpression::MinBaseAttackBonus { bonus } => {
            if view.base_attack_bonus >= *bonus {
                Evaluation::satisfied()
            } else {
                Evaluation::failed(
                    expr.clone(),
                    format!(
                        "Base attack bonus {} is below required {}",
                        view.base_attack_bonus, bonus
                    ),
                )
            }
        }
        PrerequisiteExpression::SkillTrained { skill } => {
            if view.trained_skills.contains(skill) {
                Evaluation::satisfied()
            } else {
                Evaluation::failed(expr.clone(), format!("Skill not trained: {}", skill))
            }
        }
        PrerequisiteExpression::HasFeat { key } => {
            if view.feats.contains(key) {
                Evaluation::satisfied()
            } else {
                Evaluation::failed(expr.clone(), format!("Missing feat: {}", display_name(view, key)))
            }
        }
        PrerequisiteExpression::HasTalent { key } => {
            if view.talents.contains(key) {
                Evaluation::satisfied()
            } else {
                Evaluation::failed(
                    expr.clone(),
                    format!("Missing talent: {}", display_name(view, key)),
                )
            }
        }
        PrerequisiteExpression::HasClassLevel { class, min_level } => {
            let actual = view.class_levels.get(class).copied().unwrap_or(0);
            if actual >= *min_level {
                Evaluation::satisfied()
            } else {
                Evaluation::failed(
                    expr.clone(),
                    format!(
                        "Requires {} level {} (has {})",
                        display_name(view, class),
                        min_level,
                        actual
                    ),
                )
            }
        }
        PrerequisiteExpression::ForceSensitive => {
            if view.is_force_sensitive() {
                Evaluation::satisfied()
            } else {
                Evaluation::failed(expr.clone(), "Character is not Force-sensitive".to_string())
            }
        }
        PrerequisiteExpression::Narrative { description } => {
            // Advisory only: a machine cannot adjudicate this, so it must
            // neither block nor be silently dropped.
            Evaluation {
                satisfied: true,
                failures: Vec::new(),
                advisory: vec![description.clone()],
            }
        }
        PrerequisiteExpression::AllOf { requirements } => {
            let mut result = Evaluation::satisfied();
            for child in requirements {
                let eval = evaluate(child, view);
                result.satisfied &= eval.satisfied;
                result.failures.extend(eval.failures);
                result.advisory.extend(eval.advisory);
            }
            result
        }
        PrerequisiteExpression::AnyOf { options } => evaluate_n_of(1, options, view),
        PrerequisiteExpression::NOf { required, options } => {
            evaluate_n_of(*required, options, view)
        }
    }
}

/// Shared n-of-m logic. When unsatisfied, reports only the closest unmet
/// branches (fewest missing atoms) rather than every impossible alternative.
fn evaluate_n_of(
    required: usize,
    options: &[PrerequisiteExpression],
    view: &CharacterView<'_>,
) -> Evaluation {
    let evals: Vec<Evaluation> = options.iter().map(|o| evaluate(o, view)).collect();
    let satisfied_count = evals.iter().filter(|e| e.satisfied).count();

    let mut advisory: Vec<String> = evals.iter().flat_map(|e| e.advisory.clone()).collect();
    advisory.dedup();

    if satisfied_count >= required {
        return Evaluation {
            satisfied: true,
            failures: Vec::new(),
            advisory,
        };
    }

    let missing = required - satisfied_count;
    let mut unmet: Vec<&Evaluation> = evals.iter().filter(|e| !e.satisfied).collect();
    // Stable sort keeps branch order as the tie-break, so the primary reason
    // is deterministic.
    unmet.sort_by_key(|e| e.failures.len());

    let failures = unmet
        .into_iter()
        .take(missing)
        .flat_map(|e| e.failures.clone())
        .collect();

    Evaluation {
        satisfied: false,
        failures,
        advisory,
    }
}

fn display_name(view: &CharacterView<'_>, key: &OptionKey) -> String {
    let catalog = view.catalog();
    catalog
        .feat(key)
        .map(|f| f.name.clone())
        .or_else(|| catalog.talent(key).map(|t| t.name.clone()))
        .or_else(|| catalog.class(key).map(|c| c.name.clone()))
        .or_else(|| catalog.force_option(key).map(|f| f.name.clone()))
        .unwrap_or_else(|| key.to_string())
}
