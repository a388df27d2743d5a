//! Catalog option entities.
//!
//! The catalog is the read-only universe of everything a character could
//! ever pick: classes, feats, talents, and Force options. It is supplied by
//! an external collaborator and validated once at load time; the runtime
//! evaluator assumes it only ever sees a validated, acyclic catalog.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::prerequisite::PrerequisiteExpression;
use crate::value_objects::{DefenseTotals, OptionKey, TreeName};

/// Which kind of catalog option an operation is asking about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    Class,
    Feat,
    Talent,
    ForceOption,
}

impl std::fmt::Display for OptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Class => write!(f, "class"),
            Self::Feat => write!(f, "feat"),
            Self::Talent => write!(f, "talent"),
            Self::ForceOption => write!(f, "force_option"),
        }
    }
}

/// Whether a class is open from level 1 or gated behind prerequisites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassRole {
    Base,
    Prestige,
}

/// Base attack bonus progression rate for a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BabProgression {
    /// +1 per class level
    Full,
    /// floor(3 * level / 4)
    ThreeQuarters,
    /// floor(level / 2)
    Half,
}

impl BabProgression {
    /// BAB contributed by this class at the given class level.
    pub fn bab_at(&self, class_level: u8) -> i32 {
        let level = i32::from(class_level);
        match self {
            Self::Full => level,
            Self::ThreeQuarters => (level * 3) / 4,
            Self::Half => level / 2,
        }
    }
}

/// A playable class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDefinition {
    pub key: OptionKey,
    pub name: String,
    pub description: String,
    pub role: ClassRole,
    /// Entry requirements; prestige classes carry a non-trivial expression.
    #[serde(default = "PrerequisiteExpression::none")]
    pub prerequisites: PrerequisiteExpression,
    /// Talent trees this class unlocks.
    #[serde(default)]
    pub talent_trees: Vec<TreeName>,
    pub bab_progression: BabProgression,
    /// Flat defense bonuses, not scaled by class level.
    #[serde(default)]
    pub defense_bonuses: DefenseTotals,
    /// Class levels at which a bonus feat is granted.
    #[serde(default)]
    pub feat_grant_levels: Vec<u8>,
    /// The feats a bonus-feat grant may draw from. Empty means the grant is
    /// unrestricted.
    #[serde(default)]
    pub bonus_feat_pool: Vec<OptionKey>,
    pub hit_points_per_level: i32,
    /// Force-sensitive classes unlock Force talent trees and Force options.
    #[serde(default)]
    pub force_sensitive: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ClassDefinition {
    pub fn new(
        key: OptionKey,
        name: impl Into<String>,
        role: ClassRole,
        bab_progression: BabProgression,
        hit_points_per_level: i32,
    ) -> Self {
        Self {
            key,
            name: name.into(),
            description: String::new(),
            role,
            prerequisites: PrerequisiteExpression::none(),
            talent_trees: Vec::new(),
            bab_progression,
            defense_bonuses: DefenseTotals::default(),
            feat_grant_levels: Vec::new(),
            bonus_feat_pool: Vec::new(),
            hit_points_per_level,
            force_sensitive: false,
            tags: Vec::new(),
        }
    }

    pub fn with_prerequisites(mut self, prerequisites: PrerequisiteExpression) -> Self {
        self.prerequisites = prerequisites;
        self
    }

    pub fn with_talent_trees(mut self, trees: Vec<TreeName>) -> Self {
        self.talent_trees = trees;
        self
    }

    pub fn with_defense_bonuses(mut self, bonuses: DefenseTotals) -> Self {
        self.defense_bonuses = bonuses;
        self
    }

    pub fn with_feat_grants(mut self, levels: Vec<u8>, pool: Vec<OptionKey>) -> Self {
        self.feat_grant_levels = levels;
        self.bonus_feat_pool = pool;
        self
    }

    pub fn force_sensitive(mut self) -> Self {
        self.force_sensitive = true;
        self
    }

    /// Whether this class grants a bonus feat at the given class level.
    pub fn grants_feat_at(&self, class_level: u8) -> bool {
        self.feat_grant_levels.contains(&class_level)
    }
}

/// A feat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatDefinition {
    pub key: OptionKey,
    pub name: String,
    pub description: String,
    #[serde(default = "PrerequisiteExpression::none")]
    pub prerequisites: PrerequisiteExpression,
    /// Whether this feat can be taken multiple times.
    #[serde(default)]
    pub repeatable: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl FeatDefinition {
    pub fn new(key: OptionKey, name: impl Into<String>) -> Self {
        Self {
            key,
            name: name.into(),
            description: String::new(),
            prerequisites: PrerequisiteExpression::none(),
            repeatable: false,
            tags: Vec::new(),
        }
    }

    pub fn with_prerequisites(mut self, prerequisites: PrerequisiteExpression) -> Self {
        self.prerequisites = prerequisites;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn repeatable(mut self) -> Self {
        self.repeatable = true;
        self
    }
}

/// A talent. Every talent belongs to exactly one tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TalentDefinition {
    pub key: OptionKey,
    pub name: String,
    pub description: String,
    pub tree: TreeName,
    #[serde(default = "PrerequisiteExpression::none")]
    pub prerequisites: PrerequisiteExpression,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TalentDefinition {
    pub fn new(key: OptionKey, name: impl Into<String>, tree: TreeName) -> Self {
        Self {
            key,
            name: name.into(),
            description: String::new(),
            tree,
            prerequisites: PrerequisiteExpression::none(),
            tags: Vec::new(),
        }
    }

    pub fn with_prerequisites(mut self, prerequisites: PrerequisiteExpression) -> Self {
        self.prerequisites = prerequisites;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// A Force power, technique, or secret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForceOptionDefinition {
    pub key: OptionKey,
    pub name: String,
    pub description: String,
    #[serde(default = "PrerequisiteExpression::none")]
    pub prerequisites: PrerequisiteExpression,
    /// Some Force powers can be taken multiple times.
    #[serde(default)]
    pub repeatable: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ForceOptionDefinition {
    pub fn new(key: OptionKey, name: impl Into<String>) -> Self {
        Self {
            key,
            name: name.into(),
            description: String::new(),
            prerequisites: PrerequisiteExpression::none(),
            repeatable: false,
            tags: Vec::new(),
        }
    }

    pub fn with_prerequisites(mut self, prerequisites: PrerequisiteExpression) -> Self {
        self.prerequisites = prerequisites;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn repeatable(mut self) -> Self {
        self.repeatable = true;
        self
    }
}

/// Closed tagged variant over everything the catalog can hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CatalogOption {
    Class(ClassDefinition),
    Feat(FeatDefinition),
    Talent(TalentDefinition),
    ForceOption(ForceOptionDefinition),
}

impl CatalogOption {
    pub fn kind(&self) -> OptionKind {
        match self {
            Self::Class(_) => OptionKind::Class,
            Self::Feat(_) => OptionKind::Feat,
            Self::Talent(_) => OptionKind::Talent,
            Self::ForceOption(_) => OptionKind::ForceOption,
        }
    }

    pub fn key(&self) -> &OptionKey {
        match self {
            Self::Class(c) => &c.key,
            Self::Feat(f) => &f.key,
            Self::Talent(t) => &t.key,
            Self::ForceOption(f) => &f.key,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Class(c) => &c.name,
            Self::Feat(f) => &f.name,
            Self::Talent(t) => &t.name,
            Self::ForceOption(f) => &f.name,
        }
    }

    pub fn prerequisites(&self) -> &PrerequisiteExpression {
        match self {
            Self::Class(c) => &c.prerequisites,
            Self::Feat(f) => &f.prerequisites,
            Self::Talent(t) => &t.prerequisites,
            Self::ForceOption(f) => &f.prerequisites,
        }
    }

    pub fn tags(&self) -> &[String] {
        match self {
            Self::Class(c) => &c.tags,
            Self::Feat(f) => &f.tags,
            Self::Talent(t) => &t.tags,
            Self::ForceOption(f) => &f.tags,
        }
    }

    /// Whether the option may be owned more than once. Classes and talents
    /// never are; feats and Force options opt in.
    pub fn is_repeatable(&self) -> bool {
        match self {
            Self::Class(_) | Self::Talent(_) => false,
            Self::Feat(f) => f.repeatable,
            Self::ForceOption(f) => f.repeatable,
        }
    }
}

/// The validated, read-only option catalog.
///
/// Lookup maps use `BTreeMap` so every iteration order is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    classes: BTreeMap<OptionKey, ClassDefinition>,
    feats: BTreeMap<OptionKey, FeatDefinition>,
    talents: BTreeMap<OptionKey, TalentDefinition>,
    force_options: BTreeMap<OptionKey, ForceOptionDefinition>,
}

impl Catalog {
    /// Build and validate a catalog from a flat option list.
    ///
    /// Rejects duplicate keys, dangling prerequisite references, an empty
    /// class list, and cycles in the prerequisite graph.
    pub fn new(options: Vec<CatalogOption>) -> Result<Self, CatalogError> {
        let mut catalog = Self {
            classes: BTreeMap::new(),
            feats: BTreeMap::new(),
            talents: BTreeMap::new(),
            force_options: BTreeMap::new(),
        };

        for option in options {
            let key = option.key().clone();
            let duplicate = match option {
                CatalogOption::Class(c) => catalog.classes.insert(key.clone(), c).is_some(),
                CatalogOption::Feat(f) => catalog.feats.insert(key.clone(), f).is_some(),
                CatalogOption::Talent(t) => catalog.talents.insert(key.clone(), t).is_some(),
                CatalogOption::ForceOption(f) => {
                    catalog.force_options.insert(key.clone(), f).is_some()
                }
            };
            if duplicate {
                return Err(CatalogError::DuplicateKey(key.to_string()));
            }
        }

        catalog.validate()?;
        Ok(catalog)
    }

    pub fn class(&self, key: &OptionKey) -> Option<&ClassDefinition> {
        self.classes.get(key)
    }

    pub fn feat(&self, key: &OptionKey) -> Option<&FeatDefinition> {
        self.feats.get(key)
    }

    pub fn talent(&self, key: &OptionKey) -> Option<&TalentDefinition> {
        self.talents.get(key)
    }

    pub fn force_option(&self, key: &OptionKey) -> Option<&ForceOptionDefinition> {
        self.force_options.get(key)
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassDefinition> {
        self.classes.values()
    }

    pub fn feats(&self) -> impl Iterator<Item = &FeatDefinition> {
        self.feats.values()
    }

    pub fn talents(&self) -> impl Iterator<Item = &TalentDefinition> {
        self.talents.values()
    }

    pub fn force_options(&self) -> impl Iterator<Item = &ForceOptionDefinition> {
        self.force_options.values()
    }

    /// Talent trees that are Force trees: unlocked only by Force-sensitive
    /// classes.
    pub fn force_trees(&self) -> BTreeSet<&TreeName> {
        let ordinary: BTreeSet<&TreeName> = self
            .classes
            .values()
            .filter(|c| !c.force_sensitive)
            .flat_map(|c| c.talent_trees.iter())
            .collect();
        self.classes
            .values()
            .filter(|c| c.force_sensitive)
            .flat_map(|c| c.talent_trees.iter())
            .filter(|tree| !ordinary.contains(*tree))
            .collect()
    }

    /// Generic lookup across kinds.
    pub fn option(&self, kind: OptionKind, key: &OptionKey) -> Option<CatalogOption> {
        match kind {
            OptionKind::Class => self.class(key).cloned().map(CatalogOption::Class),
            OptionKind::Feat => self.feat(key).cloned().map(CatalogOption::Feat),
            OptionKind::Talent => self.talent(key).cloned().map(CatalogOption::Talent),
            OptionKind::ForceOption => self
                .force_option(key)
                .cloned()
                .map(CatalogOption::ForceOption),
        }
    }

    fn prerequisites_of(&self, key: &OptionKey) -> Option<&PrerequisiteExpression> {
        self.classes
            .get(key)
            .map(|c| &c.prerequisites)
            .or_else(|| self.feats.get(key).map(|f| &f.prerequisites))
            .or_else(|| self.talents.get(key).map(|t| &t.prerequisites))
            .or_else(|| self.force_options.get(key).map(|f| &f.prerequisites))
    }

    fn validate(&self) -> Result<(), CatalogError> {
        if self.classes.is_empty() {
            return Err(CatalogError::Empty("classes"));
        }

        // Every key referenced by any prerequisite must resolve.
        let all_keys: BTreeSet<&OptionKey> = self
            .classes
            .keys()
            .chain(self.feats.keys())
            .chain(self.talents.keys())
            .chain(self.force_options.keys())
            .collect();
        for (key, expr) in self.iter_prerequisites() {
            for referenced in expr.referenced_options() {
                if !all_keys.contains(referenced) {
                    return Err(CatalogError::UnknownReference {
                        referrer: key.to_string(),
                        referenced: referenced.to_string(),
                    });
                }
            }
        }

        // Topological check: the option -> referenced-option graph must be
        // acyclic, otherwise runtime evaluation could recurse forever.
        self.check_acyclic()?;
        Ok(())
    }

    fn iter_prerequisites(&self) -> impl Iterator<Item = (&OptionKey, &PrerequisiteExpression)> {
        self.classes
            .iter()
            .map(|(k, c)| (k, &c.prerequisites))
            .chain(self.feats.iter().map(|(k, f)| (k, &f.prerequisites)))
            .chain(self.talents.iter().map(|(k, t)| (k, &t.prerequisites)))
            .chain(
                self.force_options
                    .iter()
                    .map(|(k, f)| (k, &f.prerequisites)),
            )
    }

    fn check_acyclic(&self) -> Result<(), CatalogError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit<'a>(
            key: &'a OptionKey,
            catalog: &'a Catalog,
            marks: &mut BTreeMap<&'a OptionKey, Mark>,
        ) -> Result<(), CatalogError> {
            match marks.get(key) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => {
                    return Err(CatalogError::PrerequisiteCycle(key.to_string()));
                }
                None => {}
            }
            marks.insert(key, Mark::Visiting);
            if let Some(expr) = catalog.prerequisites_of(key) {
                for referenced in expr.referenced_options() {
                    visit(referenced, catalog, marks)?;
                }
            }
            marks.insert(key, Mark::Done);
            Ok(())
        }

        let mut marks = BTreeMap::new();
        let roots: Vec<&OptionKey> = self
            .classes
            .keys()
            .chain(self.feats.keys())
            .chain(self.talents.keys())
            .chain(self.force_options.keys())
            .collect();
        for key in roots {
            visit(key, self, &mut marks)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prerequisite::PrerequisiteExpression;

    fn key(s: &str) -> OptionKey {
        OptionKey::new(s).unwrap()
    }

    fn soldier() -> CatalogOption {
        CatalogOption::Class(ClassDefinition::new(
            key("soldier"),
            "Soldier",
            ClassRole::Base,
            BabProgression::Full,
            10,
        ))
    }

    #[test]
    fn bab_progression_rates() {
        assert_eq!(BabProgression::Full.bab_at(7), 7);
        assert_eq!(BabProgression::ThreeQuarters.bab_at(7), 5);
        assert_eq!(BabProgression::ThreeQuarters.bab_at(4), 3);
        assert_eq!(BabProgression::Half.bab_at(7), 3);
        assert_eq!(BabProgression::Half.bab_at(1), 0);
    }

    #[test]
    fn repeatable_builders_flip_the_flag() {
        let feat = FeatDefinition::new(key("skill_training"), "Skill Training").repeatable();
        assert!(feat.repeatable);
        let power = ForceOptionDefinition::new(key("surge"), "Surge").repeatable();
        assert!(power.repeatable);
    }

    #[test]
    fn duplicate_keys_rejected() {
        let result = Catalog::new(vec![soldier(), soldier()]);
        assert!(matches!(result, Err(CatalogError::DuplicateKey(_))));
    }

    #[test]
    fn empty_class_list_rejected() {
        let result = Catalog::new(vec![CatalogOption::Feat(FeatDefinition::new(
            key("toughness"),
            "Toughness",
        ))]);
        assert!(matches!(result, Err(CatalogError::Empty("classes"))));
    }

    #[test]
    fn dangling_reference_rejected() {
        let feat = FeatDefinition::new(key("weapon_specialization"), "Weapon Specialization")
            .with_prerequisites(PrerequisiteExpression::has_feat(key("weapon_focus")));
        let result = Catalog::new(vec![soldier(), CatalogOption::Feat(feat)]);
        assert!(matches!(
            result,
            Err(CatalogError::UnknownReference { .. })
        ));
    }

    #[test]
    fn prerequisite_cycle_rejected() {
        let a = FeatDefinition::new(key("feat_a"), "Feat A")
            .with_prerequisites(PrerequisiteExpression::has_feat(key("feat_b")));
        let b = FeatDefinition::new(key("feat_b"), "Feat B")
            .with_prerequisites(PrerequisiteExpression::has_feat(key("feat_a")));
        let result = Catalog::new(vec![
            soldier(),
            CatalogOption::Feat(a),
            CatalogOption::Feat(b),
        ]);
        assert!(matches!(result, Err(CatalogError::PrerequisiteCycle(_))));
    }

    #[test]
    fn acyclic_chain_accepted() {
        let focus = FeatDefinition::new(key("weapon_focus"), "Weapon Focus");
        let spec = FeatDefinition::new(key("weapon_specialization"), "Weapon Specialization")
            .with_prerequisites(PrerequisiteExpression::has_feat(key("weapon_focus")));
        let catalog = Catalog::new(vec![
            soldier(),
            CatalogOption::Feat(focus),
            CatalogOption::Feat(spec),
        ])
        .unwrap();
        assert!(catalog.feat(&key("weapon_specialization")).is_some());
    }

    #[test]
    fn force_trees_are_those_only_force_classes_unlock() {
        let mut jedi = ClassDefinition::new(
            key("jedi"),
            "Jedi",
            ClassRole::Base,
            BabProgression::Full,
            10,
        )
        .force_sensitive();
        jedi.talent_trees = vec![
            TreeName::new("lightsaber_combat").unwrap(),
            TreeName::new("awareness").unwrap(),
        ];
        let mut scout = ClassDefinition::new(
            key("scout"),
            "Scout",
            ClassRole::Base,
            BabProgression::ThreeQuarters,
            8,
        );
        scout.talent_trees = vec![TreeName::new("awareness").unwrap()];

        let catalog =
            Catalog::new(vec![CatalogOption::Class(jedi), CatalogOption::Class(scout)]).unwrap();
        let force_trees: Vec<&str> = catalog.force_trees().iter().map(|t| t.as_str()).collect();
        assert_eq!(force_trees, vec!["lightsaber_combat"]);
    }
}
