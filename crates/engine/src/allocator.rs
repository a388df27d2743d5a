//! Dual-currency talent allocation.
//!
//! Two slot kinds coexist: the heroic slot, granted by overall advancement
//! and spendable in any tree the character has unlocked through any class,
//! and the class slot, granted by one class's own track and spendable only
//! in that class's trees. Slots are recomputed from the record every time;
//! there is no stored counter to drift.

use std::collections::BTreeSet;

use sagaforge_domain::{
    evaluate, Catalog, CharacterRecord, CharacterView, OpenSlot, OptionKey, OptionKind, SlotType,
    TalentProvenance, TalentSlot, TalentSlotState, TreeName,
};

use crate::config::ProgressionConfig;
use crate::staging::StagedTalent;
use crate::use_cases::progression::ProgressionError;

/// Resolves slot availability, tree legality, and house-rule pairings.
pub struct DualTalentAllocator<'a> {
    catalog: &'a Catalog,
    config: &'a ProgressionConfig,
}

impl<'a> DualTalentAllocator<'a> {
    pub fn new(catalog: &'a Catalog, config: &'a ProgressionConfig) -> Self {
        Self { catalog, config }
    }

    /// The slot picture for leveling `staged_class` on top of `record`,
    /// with `staged_talents` already counted as consuming.
    ///
    /// A slot appears only at odd levels of its own track: cumulative level
    /// for heroic, the staged class's track for class slots.
    pub fn slot_state(
        &self,
        record: &CharacterRecord,
        staged_class: &OptionKey,
        staged_talents: &[StagedTalent],
    ) -> Result<TalentSlotState, ProgressionError> {
        let class = self
            .catalog
            .class(staged_class)
            .ok_or_else(|| ProgressionError::UnknownOption {
                kind: OptionKind::Class,
                key: staged_class.clone(),
            })?;

        let new_level = record.level + 1;
        let new_class_level = record.class_level(staged_class) + 1;
        let mut state = TalentSlotState::default();

        if new_level % 2 == 1 {
            let tag = TalentProvenance::Heroic {
                at_level: new_level,
            };
            let consumed = record
                .talents
                .iter()
                .any(|t| t.provenance == tag)
                || staged_talents.iter().any(|t| t.provenance == tag);
            state.heroic = Some(OpenSlot {
                slot: TalentSlot {
                    slot_type: SlotType::Heroic,
                    class: None,
                    at_level: new_level,
                    consumed,
                },
                legal_trees: self.heroic_trees(record, staged_class),
            });
        }

        if new_class_level % 2 == 1 {
            let tag = TalentProvenance::Class {
                class: staged_class.clone(),
                at_class_level: new_class_level,
            };
            let consumed = record
                .talents
                .iter()
                .any(|t| t.provenance == tag)
                || staged_talents.iter().any(|t| t.provenance == tag);
            state.class = Some(OpenSlot {
                slot: TalentSlot {
                    slot_type: SlotType::Class,
                    class: Some(staged_class.clone()),
                    at_level: new_class_level,
                    consumed,
                },
                legal_trees: class.talent_trees.iter().cloned().collect(),
            });
        }

        Ok(state)
    }

    /// The heroic slot draws from the union of every tree unlocked by any
    /// class the character has levels in, the class being staged, and the
    /// Force trees when any of those classes is Force-sensitive.
    fn heroic_trees(&self, record: &CharacterRecord, staged_class: &OptionKey) -> Vec<TreeName> {
        let mut trees: BTreeSet<TreeName> = BTreeSet::new();
        let mut force_sensitive = false;
        let class_keys = record
            .class_levels
            .keys()
            .chain(std::iter::once(staged_class));
        for key in class_keys {
            if let Some(class) = self.catalog.class(key) {
                trees.extend(class.talent_trees.iter().cloned());
                force_sensitive |= class.force_sensitive;
            }
        }
        if force_sensitive {
            trees.extend(self.catalog.force_trees().into_iter().cloned());
        }
        trees.into_iter().collect()
    }

    /// Validate a proposed batch of talent picks and expand any house-rule
    /// pairings into the canonical staged list.
    ///
    /// Downstream code (finalize) only ever sees the expanded list; the
    /// expansion is resolved here and nowhere else.
    pub fn validate_selection(
        &self,
        record: &CharacterRecord,
        staged_class: &OptionKey,
        already_staged: &[StagedTalent],
        selections: &[(OptionKey, SlotType)],
        view: &CharacterView<'_>,
    ) -> Result<Vec<StagedTalent>, ProgressionError> {
        let state = self.slot_state(record, staged_class, already_staged)?;
        let mut heroic_open = state
            .heroic
            .as_ref()
            .is_some_and(|open| !open.slot.consumed);
        let mut class_open = state
            .class
            .as_ref()
            .is_some_and(|open| !open.slot.consumed);

        let mut accepted: Vec<StagedTalent> = Vec::new();
        let mut chained_view = view.clone();

        for (key, slot_type) in selections {
            let talent = self
                .catalog
                .talent(key)
                .ok_or_else(|| ProgressionError::UnknownOption {
                    kind: OptionKind::Talent,
                    key: key.clone(),
                })?;

            if chained_view.talents.contains(key) {
                return Err(ProgressionError::DuplicateSelection { option: key.clone() });
            }

            let open = match slot_type {
                SlotType::Heroic => state.heroic.as_ref().filter(|_| heroic_open),
                SlotType::Class => state.class.as_ref().filter(|_| class_open),
            }
            .ok_or(ProgressionError::SlotAlreadyConsumed { slot: *slot_type })?;

            if !open.legal_trees.contains(&talent.tree) {
                return Err(ProgressionError::TreeNotUnlocked {
                    talent: key.clone(),
                    tree: talent.tree.clone(),
                    slot: *slot_type,
                });
            }

            let eval = evaluate(&talent.prerequisites, &chained_view);
            if !eval.satisfied {
                return Err(ProgressionError::PrerequisiteNotMet {
                    option: key.clone(),
                    failures: eval.failures,
                });
            }

            let provenance = open.slot.clone();
            let provenance = match provenance.slot_type {
                SlotType::Heroic => TalentProvenance::Heroic {
                    at_level: provenance.at_level,
                },
                SlotType::Class => TalentProvenance::Class {
                    class: staged_class.clone(),
                    at_class_level: provenance.at_level,
                },
            };
            match slot_type {
                SlotType::Heroic => heroic_open = false,
                SlotType::Class => class_open = false,
            }
            chained_view.talents.insert(key.clone());
            accepted.push(StagedTalent {
                key: key.clone(),
                provenance: provenance.clone(),
            });

            // House-rule pairing: the partner rides along on the same slot
            // grant, as one canonical unit.
            if let Some(partner) = self.config.talent_partner(key) {
                if !chained_view.talents.contains(partner) {
                    let partner_def = self.catalog.talent(partner).ok_or_else(|| {
                        ProgressionError::UnknownOption {
                            kind: OptionKind::Talent,
                            key: partner.clone(),
                        }
                    })?;
                    if !open.legal_trees.contains(&partner_def.tree) {
                        return Err(ProgressionError::TreeNotUnlocked {
                            talent: partner.clone(),
                            tree: partner_def.tree.clone(),
                            slot: *slot_type,
                        });
                    }
                    let eval = evaluate(&partner_def.prerequisites, &chained_view);
                    if !eval.satisfied {
                        return Err(ProgressionError::PrerequisiteNotMet {
                            option: partner.clone(),
                            failures: eval.failures,
                        });
                    }
                    chained_view.talents.insert(partner.clone());
                    accepted.push(StagedTalent {
                        key: partner.clone(),
                        provenance,
                    });
                }
            }
        }

        Ok(accepted)
    }
}
