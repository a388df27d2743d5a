//! Defense totals - the three class defense bonus categories.

use serde::{Deserialize, Serialize};

/// Flat class defense bonuses (fortitude, reflex, will).
///
/// Classes grant these as flat values that do not scale with class level.
/// When a character has levels in several classes, each category takes the
/// maximum contribution, never the sum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefenseTotals {
    pub fortitude: i32,
    pub reflex: i32,
    pub will: i32,
}

impl DefenseTotals {
    pub fn new(fortitude: i32, reflex: i32, will: i32) -> Self {
        Self {
            fortitude,
            reflex,
            will,
        }
    }

    /// Per-category maximum of two contributions.
    pub fn max(self, other: Self) -> Self {
        Self {
            fortitude: self.fortitude.max(other.fortitude),
            reflex: self.reflex.max(other.reflex),
            will: self.will.max(other.will),
        }
    }
}
