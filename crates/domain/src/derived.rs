//! Derived totals recompute.
//!
//! Base attack bonus, class defense bonuses, and hit points are pure
//! functions of the owned class levels (plus the Constitution modifier for
//! HP). The transaction manager recomputes them as the last finalize step;
//! nothing else writes them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entities::Catalog;
use crate::error::DomainError;
use crate::value_objects::{DefenseTotals, OptionKey};

/// The recomputed totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedTotals {
    pub base_attack_bonus: i32,
    pub defense: DefenseTotals,
    pub hit_points: i32,
}

/// Recompute all derived totals from owned class levels.
///
/// BAB is additive: each class contributes per its own progression rate at
/// its own level. Class defense bonuses are flat and combine by per-category
/// maximum, never by sum. HP sums each class's per-level grant, plus the
/// Constitution modifier once per cumulative level.
pub fn derived_totals(
    class_levels: &BTreeMap<OptionKey, u8>,
    catalog: &Catalog,
    con_modifier: i32,
) -> Result<DerivedTotals, DomainError> {
    let mut bab = 0;
    let mut defense = DefenseTotals::default();
    let mut class_hp = 0;
    let mut cumulative_level: i32 = 0;

    for (key, &level) in class_levels {
        let class = catalog
            .class(key)
            .ok_or_else(|| DomainError::not_found("class", key.as_str()))?;
        bab += class.bab_progression.bab_at(level);
        defense = defense.max(class.defense_bonuses);
        class_hp += class.hit_points_per_level * i32::from(level);
        cumulative_level += i32::from(level);
    }

    Ok(DerivedTotals {
        base_attack_bonus: bab,
        defense,
        hit_points: class_hp + con_modifier * cumulative_level,
    })
}
