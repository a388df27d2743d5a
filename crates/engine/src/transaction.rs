//! Transactional finalize and rollback.
//!
//! Finalize takes a snapshot, applies every staged mutation in a fixed
//! order, and either commits the whole set or restores the snapshot. No
//! partial state is ever observable to callers.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use sagaforge_domain::{
    derived_totals, Ability, Catalog, CharacterRecord, OwnedFeat, OwnedForceOption, OwnedTalent,
    TalentProvenance,
};

use crate::config::TalentPairing;
use crate::ports::{LevelUpSummary, MutationSet};
use crate::staging::PendingSelections;
use crate::use_cases::progression::ProgressionError;

/// The fixed application order. Failure reports carry the step name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeStep {
    Class,
    Abilities,
    Feats,
    Talents,
    ForceOptions,
    Skills,
    DerivedTotals,
}

impl fmt::Display for FinalizeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class => write!(f, "class"),
            Self::Abilities => write!(f, "abilities"),
            Self::Feats => write!(f, "feats"),
            Self::Talents => write!(f, "talents"),
            Self::ForceOptions => write!(f, "force_options"),
            Self::Skills => write!(f, "skills"),
            Self::DerivedTotals => write!(f, "derived_totals"),
        }
    }
}

/// Test seam: checked before each finalize step, in the manner of an
/// injectable clock. The default passes everything through.
pub trait FinalizeProbe: Send + Sync {
    fn check(&self, step: FinalizeStep) -> Result<(), String> {
        let _ = step;
        Ok(())
    }
}

/// Probe that never interferes.
#[derive(Debug, Default)]
pub struct NoopProbe;

impl FinalizeProbe for NoopProbe {}

fn fail(step: FinalizeStep, reason: impl Into<String>) -> ProgressionError {
    ProgressionError::FinalizationFailure {
        step,
        reason: reason.into(),
    }
}

/// Owns the snapshot taken at the start of a finalize.
pub struct TransactionManager {
    snapshot: Option<CharacterRecord>,
    probe: Arc<dyn FinalizeProbe>,
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionManager {
    pub fn new() -> Self {
        Self {
            snapshot: None,
            probe: Arc::new(NoopProbe),
        }
    }

    pub fn with_probe(probe: Arc<dyn FinalizeProbe>) -> Self {
        Self {
            snapshot: None,
            probe,
        }
    }

    /// Apply every staged mutation to `record` as one unit.
    ///
    /// On any step failure the snapshot is restored before the error
    /// propagates; `record` is then byte-for-byte what it was on entry.
    pub fn finalize(
        &mut self,
        record: &mut CharacterRecord,
        staging: &PendingSelections,
        catalog: &Catalog,
        pairings: &[TalentPairing],
    ) -> Result<(MutationSet, LevelUpSummary), ProgressionError> {
        let snapshot = record.clone();
        self.snapshot = Some(snapshot.clone());

        match self.apply_all(record, staging, catalog, pairings) {
            Ok(result) => {
                self.snapshot = None;
                Ok(result)
            }
            Err(error) => {
                *record = snapshot;
                self.snapshot = None;
                Err(error)
            }
        }
    }

    /// Restore the most recent snapshot verbatim. A no-op, not an error,
    /// when there is nothing to roll back.
    pub fn rollback(&mut self, record: &mut CharacterRecord) -> bool {
        match self.snapshot.take() {
            Some(snapshot) => {
                *record = snapshot;
                true
            }
            None => false,
        }
    }

    pub fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    fn apply_all(
        &self,
        record: &mut CharacterRecord,
        staging: &PendingSelections,
        catalog: &Catalog,
        pairings: &[TalentPairing],
    ) -> Result<(MutationSet, LevelUpSummary), ProgressionError> {
        let level_before = record.level;
        let hit_points_before = record.hit_points;

        // Class: exactly one class gains exactly one level per finalize.
        self.probe
            .check(FinalizeStep::Class)
            .map_err(|r| fail(FinalizeStep::Class, r))?;
        let class_key = staging
            .class
            .clone()
            .ok_or_else(|| fail(FinalizeStep::Class, "no class staged"))?;
        if catalog.class(&class_key).is_none() {
            return Err(fail(
                FinalizeStep::Class,
                format!("unknown class: {}", class_key),
            ));
        }
        let class_level = record.class_level(&class_key) + 1;
        record.class_levels.insert(class_key.clone(), class_level);
        record.level += 1;

        // Abilities.
        self.probe
            .check(FinalizeStep::Abilities)
            .map_err(|r| fail(FinalizeStep::Abilities, r))?;
        for (&ability, &delta) in &staging.ability_deltas {
            let score = record.ability_scores.score(ability);
            record.ability_scores.set_score(ability, score + delta);
        }

        // Feats.
        self.probe
            .check(FinalizeStep::Feats)
            .map_err(|r| fail(FinalizeStep::Feats, r))?;
        let mut new_feats = Vec::new();
        for key in &staging.feats {
            let feat = catalog
                .feat(key)
                .ok_or_else(|| fail(FinalizeStep::Feats, format!("unknown feat: {}", key)))?;
            if !feat.repeatable && record.has_feat(key) {
                return Err(fail(
                    FinalizeStep::Feats,
                    format!("duplicate non-repeatable feat: {}", key),
                ));
            }
            let owned = OwnedFeat {
                key: key.clone(),
                acquired_at_level: record.level,
            };
            record.feats.push(owned.clone());
            new_feats.push(owned);
        }

        // Talents: slot conservation is re-checked here so the committed
        // record can never own more talents than its levels granted.
        self.probe
            .check(FinalizeStep::Talents)
            .map_err(|r| fail(FinalizeStep::Talents, r))?;
        let mut new_talents = Vec::new();
        for staged in &staging.talents {
            if catalog.talent(&staged.key).is_none() {
                return Err(fail(
                    FinalizeStep::Talents,
                    format!("unknown talent: {}", staged.key),
                ));
            }
            record.talents.push(OwnedTalent {
                key: staged.key.clone(),
                acquired_at_level: record.level,
                provenance: staged.provenance.clone(),
            });
            new_talents.push(record.talents[record.talents.len() - 1].clone());
        }
        check_slot_conservation(record, pairings)
            .map_err(|reason| fail(FinalizeStep::Talents, reason))?;

        // Force options.
        self.probe
            .check(FinalizeStep::ForceOptions)
            .map_err(|r| fail(FinalizeStep::ForceOptions, r))?;
        let mut new_force_options = Vec::new();
        for key in &staging.force_options {
            let option = catalog.force_option(key).ok_or_else(|| {
                fail(
                    FinalizeStep::ForceOptions,
                    format!("unknown force option: {}", key),
                )
            })?;
            if !option.repeatable && record.has_force_option(key) {
                return Err(fail(
                    FinalizeStep::ForceOptions,
                    format!("duplicate non-repeatable force option: {}", key),
                ));
            }
            let owned = OwnedForceOption {
                key: key.clone(),
                acquired_at_level: record.level,
            };
            record.force_options.push(owned.clone());
            new_force_options.push(owned);
        }

        // Skills.
        self.probe
            .check(FinalizeStep::Skills)
            .map_err(|r| fail(FinalizeStep::Skills, r))?;
        for skill in &staging.trained_skills {
            if !record.trained_skills.insert(skill.clone()) {
                return Err(fail(
                    FinalizeStep::Skills,
                    format!("skill already trained: {}", skill),
                ));
            }
        }

        // Derived totals: pure function of the now-committed class levels.
        self.probe
            .check(FinalizeStep::DerivedTotals)
            .map_err(|r| fail(FinalizeStep::DerivedTotals, r))?;
        let con_modifier = record.ability_scores.modifier(Ability::Con);
        let derived = derived_totals(&record.class_levels, catalog, con_modifier)
            .map_err(|e| fail(FinalizeStep::DerivedTotals, e.to_string()))?;
        record.base_attack_bonus = derived.base_attack_bonus;
        record.defense = derived.defense;
        record.hit_points = derived.hit_points;
        record.touch();

        let mutations = MutationSet {
            character_id: record.id,
            new_level: record.level,
            class: class_key.clone(),
            class_level,
            ability_scores: record.ability_scores,
            new_feats: new_feats.clone(),
            new_talents: new_talents.clone(),
            new_force_options: new_force_options.clone(),
            new_trained_skills: staging.trained_skills.clone(),
            derived,
        };
        let summary = LevelUpSummary {
            character_id: record.id,
            character_name: record.name.clone(),
            level_before,
            level_after: record.level,
            class: class_key,
            hit_points_delta: record.hit_points - hit_points_before,
            ability_increases: staging.ability_deltas.clone(),
            new_feats: new_feats.into_iter().map(|f| f.key).collect(),
            new_talents: new_talents.into_iter().map(|t| t.key).collect(),
            new_force_options: new_force_options.into_iter().map(|f| f.key).collect(),
            new_trained_skills: staging.trained_skills.iter().cloned().collect(),
        };
        Ok((mutations, summary))
    }
}

/// Slot conservation backstop.
///
/// Slots consumed are distinct provenance tags, not talent counts, because a
/// house-rule pairing grants two talents against one tag. Per tag: at most
/// two talents, and a second one only if a configured pairing joins them.
/// Consumed heroic tags may never outnumber the odd cumulative levels
/// reached; consumed class tags may never outnumber the odd levels reached
/// within their class.
fn check_slot_conservation(
    record: &CharacterRecord,
    pairings: &[TalentPairing],
) -> Result<(), String> {
    let mut by_tag: BTreeMap<&TalentProvenance, Vec<&sagaforge_domain::OptionKey>> =
        BTreeMap::new();
    for talent in &record.talents {
        by_tag.entry(&talent.provenance).or_default().push(&talent.key);
    }

    let mut heroic_consumed = 0usize;
    let mut class_consumed: BTreeMap<&sagaforge_domain::OptionKey, usize> = BTreeMap::new();
    for (tag, keys) in &by_tag {
        match keys.as_slice() {
            [_] => {}
            [a, b] => {
                let paired = pairings
                    .iter()
                    .any(|p| p.partner_of(a).is_some_and(|partner| partner == *b));
                if !paired {
                    return Err(format!(
                        "talents {} and {} share one slot but are not a paired unit",
                        a, b
                    ));
                }
            }
            _ => {
                return Err("more than two talents share one slot grant".to_string());
            }
        }
        match tag {
            TalentProvenance::Heroic { .. } => heroic_consumed += 1,
            TalentProvenance::Class { class, .. } => {
                *class_consumed.entry(class).or_default() += 1;
            }
        }
    }

    let heroic_granted = usize::from(record.level).div_ceil(2);
    if heroic_consumed > heroic_granted {
        return Err(format!(
            "{} heroic slots consumed but only {} granted by level {}",
            heroic_consumed, heroic_granted, record.level
        ));
    }
    for (class, consumed) in class_consumed {
        let granted = usize::from(record.class_level(class)).div_ceil(2);
        if consumed > granted {
            return Err(format!(
                "{} slots consumed from class {} but only {} granted",
                consumed, class, granted
            ));
        }
    }
    Ok(())
}
