//! Shared catalog and record fixtures for engine tests.

use sagaforge_domain::{
    derived_totals, Ability, AbilityScores, BabProgression, Catalog, CatalogOption,
    CharacterRecord, ClassDefinition, ClassRole, DefenseTotals, FeatDefinition,
    ForceOptionDefinition, OptionKey, PrerequisiteExpression, TalentDefinition, TreeName,
};

fn key(s: &str) -> OptionKey {
    OptionKey::new(s).unwrap()
}

fn tree(s: &str) -> TreeName {
    TreeName::new(s).unwrap()
}

/// A small but complete catalog: three base classes, one prestige class,
/// feat chains, talent trees, and Force options.
pub fn sample_catalog() -> Catalog {
    let soldier = ClassDefinition::new(
        key("soldier"),
        "Soldier",
        ClassRole::Base,
        BabProgression::Full,
        10,
    )
    .with_talent_trees(vec![tree("weapon_master"), tree("armor_specialist")])
    .with_defense_bonuses(DefenseTotals::new(2, 1, 1))
    .with_feat_grants(
        vec![1, 3],
        vec![
            key("toughness"),
            key("weapon_focus_pistols"),
            key("point_blank_shot"),
        ],
    );

    let scoundrel = ClassDefinition::new(
        key("scoundrel"),
        "Scoundrel",
        ClassRole::Base,
        BabProgression::ThreeQuarters,
        6,
    )
    .with_talent_trees(vec![tree("fortune")])
    .with_defense_bonuses(DefenseTotals::new(1, 2, 0));

    let jedi = ClassDefinition::new(
        key("jedi"),
        "Jedi",
        ClassRole::Base,
        BabProgression::Full,
        10,
    )
    .with_talent_trees(vec![tree("lightsaber_combat")])
    .with_defense_bonuses(DefenseTotals::new(1, 1, 1))
    .force_sensitive();

    let elite_trooper = ClassDefinition::new(
        key("elite_trooper"),
        "Elite Trooper",
        ClassRole::Prestige,
        BabProgression::Full,
        10,
    )
    .with_talent_trees(vec![tree("weapon_master")])
    .with_defense_bonuses(DefenseTotals::new(2, 1, 1))
    .with_prerequisites(PrerequisiteExpression::all_of(vec![
        PrerequisiteExpression::min_bab(5),
        PrerequisiteExpression::skill_trained(
            sagaforge_domain::SkillName::new("endurance").unwrap(),
        ),
        PrerequisiteExpression::narrative("Must have served in a military unit"),
    ]));

    let weapon_focus = FeatDefinition::new(key("weapon_focus_pistols"), "Weapon Focus (Pistols)")
        .with_tags(vec!["dexterity".to_string()]);
    let weapon_spec = FeatDefinition::new(
        key("weapon_specialization_pistols"),
        "Weapon Specialization (Pistols)",
    )
    .with_prerequisites(PrerequisiteExpression::all_of(vec![
        PrerequisiteExpression::has_feat(key("weapon_focus_pistols")),
        PrerequisiteExpression::min_bab(4),
    ]))
    .with_tags(vec!["dexterity".to_string()]);
    let toughness =
        FeatDefinition::new(key("toughness"), "Toughness").with_tags(vec!["constitution".to_string()]);
    let point_blank =
        FeatDefinition::new(key("point_blank_shot"), "Point-Blank Shot");
    let skill_training =
        FeatDefinition::new(key("skill_training"), "Skill Training").repeatable();
    let force_training = FeatDefinition::new(key("force_training"), "Force Training")
        .with_prerequisites(PrerequisiteExpression::ForceSensitive);

    let devastating = TalentDefinition::new(
        key("devastating_attack"),
        "Devastating Attack",
        tree("weapon_master"),
    );
    let penetrating = TalentDefinition::new(
        key("penetrating_attack"),
        "Penetrating Attack",
        tree("weapon_master"),
    )
    .with_prerequisites(PrerequisiteExpression::has_talent(key("devastating_attack")));
    let armored = TalentDefinition::new(
        key("armored_defense"),
        "Armored Defense",
        tree("armor_specialist"),
    );
    let second_skin = TalentDefinition::new(
        key("second_skin"),
        "Second Skin",
        tree("armor_specialist"),
    )
    .with_prerequisites(PrerequisiteExpression::has_talent(key("armored_defense")));
    let knack = TalentDefinition::new(key("knack"), "Knack", tree("fortune"));
    let deflect = TalentDefinition::new(key("deflect"), "Deflect", tree("lightsaber_combat"));
    let block = TalentDefinition::new(key("block"), "Block", tree("lightsaber_combat"));

    let move_object = ForceOptionDefinition::new(key("move_object"), "Move Object")
        .with_prerequisites(PrerequisiteExpression::ForceSensitive);
    let surge = ForceOptionDefinition::new(key("surge"), "Surge")
        .with_prerequisites(PrerequisiteExpression::ForceSensitive)
        .repeatable();

    let options = vec![
        CatalogOption::Class(soldier),
        CatalogOption::Class(scoundrel),
        CatalogOption::Class(jedi),
        CatalogOption::Class(elite_trooper),
        CatalogOption::Feat(weapon_focus),
        CatalogOption::Feat(weapon_spec),
        CatalogOption::Feat(toughness),
        CatalogOption::Feat(point_blank),
        CatalogOption::Feat(skill_training),
        CatalogOption::Feat(force_training),
        CatalogOption::Talent(devastating),
        CatalogOption::Talent(penetrating),
        CatalogOption::Talent(armored),
        CatalogOption::Talent(second_skin),
        CatalogOption::Talent(knack),
        CatalogOption::Talent(deflect),
        CatalogOption::Talent(block),
        CatalogOption::ForceOption(move_object),
        CatalogOption::ForceOption(surge),
    ];
    match Catalog::new(options) {
        Ok(catalog) => catalog,
        Err(error) => panic!("fixture catalog must validate: {error}"),
    }
}

/// A pure soldier at the given level, with derived totals consistent with
/// the catalog and no trained skills.
pub fn soldier_record(level: u8, catalog: &Catalog) -> CharacterRecord {
    let mut record = CharacterRecord::new("Dex Marr", AbilityScores::uniform(10));
    record.level = level;
    record.class_levels.insert(key("soldier"), level);
    refresh_derived(&mut record, catalog);
    record
}

/// Soldier 2 / scoundrel 2, for multiclass slot and tree scenarios.
pub fn multiclass_record(catalog: &Catalog) -> CharacterRecord {
    let mut record = CharacterRecord::new("Vala Reys", AbilityScores::uniform(10));
    record.level = 4;
    record.class_levels.insert(key("soldier"), 2);
    record.class_levels.insert(key("scoundrel"), 2);
    refresh_derived(&mut record, catalog);
    record
}

fn refresh_derived(record: &mut CharacterRecord, catalog: &Catalog) {
    let con = record.ability_scores.modifier(Ability::Con);
    match derived_totals(&record.class_levels, catalog, con) {
        Ok(derived) => {
            record.base_attack_bonus = derived.base_attack_bonus;
            record.defense = derived.defense;
            record.hit_points = derived.hit_points;
        }
        Err(error) => panic!("fixture record must derive: {error}"),
    }
}
