//! The progression session state machine.
//!
//! One session advances one character by exactly one level. The engine
//! sequences the wizard steps, keeps all pending choices in a staging area,
//! and hands the whole batch to the transaction manager on finalize. Steps
//! whose gating condition is false are skipped automatically.

mod error;

pub use error::ProgressionError;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use sagaforge_domain::{
    derived_totals, evaluate, Ability, Catalog, CatalogOption, CharacterId, CharacterRecord,
    CharacterView, OptionKey, OptionKind, SessionId, SkillName, SlotType, TalentSlotState,
    TreeName,
};

use crate::allocator::DualTalentAllocator;
use crate::config::{AbilityAllocationRule, ProgressionConfig};
use crate::ports::{CatalogPort, CharacterStore, NotificationPort};
use crate::registry::SessionRegistry;
use crate::staging::PendingSelections;
use crate::suggestion::{RankedOption, SuggestionEngine};
use crate::transaction::TransactionManager;

/// Where a session currently is in the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressionState {
    ClassSelection,
    AbilityIncrease,
    FeatSelection,
    ForceOptionSelection,
    TalentSelection,
    Summary,
    Finalized,
}

impl fmt::Display for ProgressionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClassSelection => write!(f, "class_selection"),
            Self::AbilityIncrease => write!(f, "ability_increase"),
            Self::FeatSelection => write!(f, "feat_selection"),
            Self::ForceOptionSelection => write!(f, "force_option_selection"),
            Self::TalentSelection => write!(f, "talent_selection"),
            Self::Summary => write!(f, "summary"),
            Self::Finalized => write!(f, "finalized"),
        }
    }
}

/// Whether the session is building a fresh character or advancing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Chargen,
    Levelup,
}

/// Constructs progression sessions. Owns the ports and the exclusivity
/// registry; each session borrows them via `Arc`.
pub struct ProgressionEngine {
    catalog: Arc<dyn CatalogPort>,
    store: Arc<dyn CharacterStore>,
    notifier: Arc<dyn NotificationPort>,
    registry: Arc<SessionRegistry>,
    config: ProgressionConfig,
}

impl ProgressionEngine {
    pub fn new(
        catalog: Arc<dyn CatalogPort>,
        store: Arc<dyn CharacterStore>,
        notifier: Arc<dyn NotificationPort>,
        config: ProgressionConfig,
    ) -> Self {
        Self {
            catalog,
            store,
            notifier,
            registry: Arc::new(SessionRegistry::new()),
            config,
        }
    }

    /// Open a session for a character, taking the exclusive lock.
    ///
    /// Fails with `SessionAlreadyActive` if another session owns the
    /// character, and with `CatalogUnavailable` if the catalog collaborator
    /// cannot supply data; a session never starts with an empty option set.
    pub async fn start_session(
        &self,
        character_id: CharacterId,
        mode: SessionMode,
    ) -> Result<ProgressionSession, ProgressionError> {
        let session_id = SessionId::new();
        if !self.registry.acquire(character_id, session_id) {
            return Err(ProgressionError::SessionAlreadyActive(character_id));
        }

        let mut guard = ReleaseOnError {
            registry: &self.registry,
            character_id,
            session_id,
            armed: true,
        };

        let catalog = self
            .catalog
            .load()
            .await
            .map_err(|e| ProgressionError::CatalogUnavailable(e.to_string()))?;

        let record = self
            .store
            .get(character_id)
            .await?
            .ok_or(ProgressionError::CharacterNotFound(character_id))?;

        match mode {
            SessionMode::Chargen if record.level != 0 => {
                return Err(ProgressionError::InvalidAllocation(format!(
                    "chargen requires a fresh character, record is level {}",
                    record.level
                )));
            }
            SessionMode::Levelup if record.level == 0 => {
                return Err(ProgressionError::InvalidAllocation(
                    "levelup requires an existing character, record is level 0".to_string(),
                ));
            }
            _ => {}
        }

        guard.armed = false;

        tracing::info!(
            character_id = %character_id,
            session_id = %session_id,
            mode = ?mode,
            level = record.level,
            "progression session started"
        );

        Ok(ProgressionSession {
            id: session_id,
            character_id,
            mode,
            state: ProgressionState::ClassSelection,
            catalog,
            record,
            staging: PendingSelections::new(),
            tx: TransactionManager::new(),
            config: self.config.clone(),
            store: Arc::clone(&self.store),
            notifier: Arc::clone(&self.notifier),
            registry: Arc::clone(&self.registry),
            released: false,
        })
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }
}

/// Releases the character lock if session construction bails early.
struct ReleaseOnError<'a> {
    registry: &'a SessionRegistry,
    character_id: CharacterId,
    session_id: SessionId,
    armed: bool,
}

impl Drop for ReleaseOnError<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.registry.release(self.character_id, self.session_id);
        }
    }
}

/// One in-flight level advancement for one character.
///
/// Every `confirm_*` either stages the whole batch or rejects it and leaves
/// the staging area untouched; nothing persists before `finalize`.
pub struct ProgressionSession {
    id: SessionId,
    character_id: CharacterId,
    mode: SessionMode,
    state: ProgressionState,
    catalog: Arc<Catalog>,
    record: CharacterRecord,
    staging: PendingSelections,
    tx: TransactionManager,
    config: ProgressionConfig,
    store: Arc<dyn CharacterStore>,
    notifier: Arc<dyn NotificationPort>,
    registry: Arc<SessionRegistry>,
    released: bool,
}

impl ProgressionSession {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn state(&self) -> ProgressionState {
        self.state
    }

    pub fn record(&self) -> &CharacterRecord {
        &self.record
    }

    /// Stage the class taken this level and advance to the first applicable
    /// optional step.
    pub fn confirm_class(&mut self, class_key: OptionKey) -> Result<ProgressionState, ProgressionError> {
        self.require_state(ProgressionState::ClassSelection, "confirm_class")?;

        let class = self
            .catalog
            .class(&class_key)
            .ok_or_else(|| ProgressionError::UnknownOption {
                kind: OptionKind::Class,
                key: class_key.clone(),
            })?;

        // Entry requirements are checked against the character as it stands,
        // before the new level is counted.
        let view = CharacterView::of_record(&self.record, &self.catalog);
        let eval = evaluate(&class.prerequisites, &view);
        if !eval.satisfied {
            return Err(ProgressionError::PrerequisiteNotMet {
                option: class_key,
                failures: eval.failures,
            });
        }

        self.staging.class = Some(class_key.clone());
        self.state = self.next_state_after(ProgressionState::ClassSelection);
        tracing::debug!(session_id = %self.id, class = %class_key, next = %self.state, "class staged");
        Ok(self.state)
    }

    /// Stage ability increases. The configured rule and the level's grant
    /// must both be matched exactly.
    pub fn confirm_abilities(
        &mut self,
        deltas: BTreeMap<Ability, i32>,
    ) -> Result<ProgressionState, ProgressionError> {
        self.require_state(ProgressionState::AbilityIncrease, "confirm_abilities")?;
        self.validate_ability_deltas(&deltas)?;

        self.staging.ability_deltas = deltas;
        self.state = self.next_state_after(ProgressionState::AbilityIncrease);
        Ok(self.state)
    }

    /// Stage the bonus feat for this class level.
    ///
    /// Selections are validated against the record plus everything already
    /// staged, so a feat confirmed here can satisfy a later prerequisite in
    /// the same session.
    pub fn confirm_feats(
        &mut self,
        feat_keys: Vec<OptionKey>,
    ) -> Result<ProgressionState, ProgressionError> {
        self.require_state(ProgressionState::FeatSelection, "confirm_feats")?;

        if feat_keys.len() != 1 {
            return Err(ProgressionError::InvalidAllocation(format!(
                "this level grants exactly 1 feat, got {}",
                feat_keys.len()
            )));
        }

        let pool = self
            .staged_class()?
            .bonus_feat_pool
            .clone();

        let mut view = self.merged_view();
        let mut accepted = Vec::with_capacity(feat_keys.len());
        for key in feat_keys {
            let feat = self
                .catalog
                .feat(&key)
                .ok_or_else(|| ProgressionError::UnknownOption {
                    kind: OptionKind::Feat,
                    key: key.clone(),
                })?;

            if !pool.is_empty() && !pool.contains(&key) {
                return Err(ProgressionError::InvalidAllocation(format!(
                    "{key} is not in this class's bonus feat pool"
                )));
            }
            if !feat.repeatable && view.feats.contains(&key) {
                return Err(ProgressionError::DuplicateSelection { option: key });
            }

            let eval = evaluate(&feat.prerequisites, &view);
            if !eval.satisfied {
                return Err(ProgressionError::PrerequisiteNotMet {
                    option: key,
                    failures: eval.failures,
                });
            }
            view.feats.insert(key.clone());
            accepted.push(key);
        }

        self.staging.feats = accepted;
        self.state = self.next_state_after(ProgressionState::FeatSelection);
        Ok(self.state)
    }

    /// Stage Force options, up to the per-level budget. An empty selection
    /// declines the step.
    pub fn confirm_force_options(
        &mut self,
        keys: Vec<OptionKey>,
    ) -> Result<ProgressionState, ProgressionError> {
        self.require_state(ProgressionState::ForceOptionSelection, "confirm_force_options")?;

        if keys.len() > self.config.force_options_per_level {
            return Err(ProgressionError::InvalidAllocation(format!(
                "at most {} Force options per level, got {}",
                self.config.force_options_per_level,
                keys.len()
            )));
        }

        let mut view = self.merged_view();
        let mut accepted = Vec::with_capacity(keys.len());
        for key in keys {
            let option = self.catalog.force_option(&key).ok_or_else(|| {
                ProgressionError::UnknownOption {
                    kind: OptionKind::ForceOption,
                    key: key.clone(),
                }
            })?;

            if !option.repeatable && view.force_options.contains(&key) {
                return Err(ProgressionError::DuplicateSelection { option: key });
            }
            let eval = evaluate(&option.prerequisites, &view);
            if !eval.satisfied {
                return Err(ProgressionError::PrerequisiteNotMet {
                    option: key,
                    failures: eval.failures,
                });
            }
            view.force_options.insert(key.clone());
            accepted.push(key);
        }

        self.staging.force_options = accepted;
        self.state = self.next_state_after(ProgressionState::ForceOptionSelection);
        Ok(self.state)
    }

    /// Stage talents against their slots. An empty selection leaves the
    /// level's slots unspent, which is allowed.
    ///
    /// The allocator resolves slot and tree legality and expands any
    /// house-rule pairing before staging, so finalize only ever sees the
    /// canonical list.
    pub fn confirm_talents(
        &mut self,
        selections: Vec<(OptionKey, SlotType)>,
    ) -> Result<ProgressionState, ProgressionError> {
        self.require_state(ProgressionState::TalentSelection, "confirm_talents")?;

        let class_key = self.staged_class()?.key.clone();
        let view = self.merged_view_without_talents();
        let allocator = DualTalentAllocator::new(&self.catalog, &self.config);
        let accepted =
            allocator.validate_selection(&self.record, &class_key, &[], &selections, &view)?;

        self.staging.talents = accepted;
        self.state = self.next_state_after(ProgressionState::TalentSelection);
        Ok(self.state)
    }

    /// Stage newly trained skills. Allowed in any state before finalize.
    pub fn confirm_skills(
        &mut self,
        skills: Vec<SkillName>,
    ) -> Result<ProgressionState, ProgressionError> {
        if self.state == ProgressionState::Finalized {
            return Err(ProgressionError::InvalidStateTransition {
                command: "confirm_skills",
                state: self.state,
            });
        }

        for skill in &skills {
            if self.record.trained_skills.contains(skill) {
                return Err(ProgressionError::InvalidAllocation(format!(
                    "skill already trained: {skill}"
                )));
            }
        }
        self.staging.trained_skills = skills.into_iter().collect();
        Ok(self.state)
    }

    /// Commit everything staged as one unit and release the character lock.
    ///
    /// The in-memory apply is atomic via the transaction manager; if the
    /// store then fails to persist, the record is restored to its
    /// pre-finalize state before the error propagates.
    pub async fn finalize(&mut self) -> Result<crate::ports::LevelUpSummary, ProgressionError> {
        self.require_state(ProgressionState::Summary, "finalize")?;

        let before = self.record.clone();
        let (mutations, summary) = self.tx.finalize(
            &mut self.record,
            &self.staging,
            &self.catalog,
            &self.config.talent_pairings,
        )?;

        if let Err(error) = self.store.apply(&mutations).await {
            self.record = before;
            tracing::error!(session_id = %self.id, %error, "store rejected mutation set");
            return Err(error.into());
        }

        if let Err(error) = self.notifier.level_up_completed(&summary).await {
            // Display is advisory; the level-up itself already committed.
            tracing::warn!(session_id = %self.id, %error, "level-up notification failed");
        }

        self.staging.clear();
        self.state = ProgressionState::Finalized;
        self.release();
        tracing::info!(
            session_id = %self.id,
            character_id = %self.character_id,
            level = self.record.level,
            "level-up finalized"
        );
        Ok(summary)
    }

    /// Restore the last snapshot, if any. A no-op without one.
    pub fn rollback(&mut self) -> bool {
        self.tx.rollback(&mut self.record)
    }

    /// Abandon the session: discard staging and release the lock. Nothing
    /// was persisted, so there is nothing to undo.
    pub fn cancel(mut self) {
        self.staging.clear();
        self.release();
        tracing::info!(session_id = %self.id, character_id = %self.character_id, "session cancelled");
    }

    /// Catalog options of a kind that are currently eligible, annotated with
    /// advisory suggestion tiers.
    pub fn eligible_options(&self, kind: OptionKind) -> Vec<RankedOption> {
        let view = self.merged_view();
        let options: Vec<CatalogOption> = match kind {
            OptionKind::Class => self
                .catalog
                .classes()
                .cloned()
                .map(CatalogOption::Class)
                .collect(),
            OptionKind::Feat => self
                .catalog
                .feats()
                .cloned()
                .map(CatalogOption::Feat)
                .collect(),
            OptionKind::Talent => self
                .catalog
                .talents()
                .cloned()
                .map(CatalogOption::Talent)
                .collect(),
            OptionKind::ForceOption => self
                .catalog
                .force_options()
                .cloned()
                .map(CatalogOption::ForceOption)
                .collect(),
        };

        // Talents are only eligible if some open slot may legally draw from
        // their tree; the query must agree with what confirm_talents accepts.
        let legal_trees: Option<BTreeSet<TreeName>> = if kind == OptionKind::Talent {
            Some(self.open_slot_trees())
        } else {
            None
        };

        let eligible: Vec<CatalogOption> = options
            .into_iter()
            .filter(|option| {
                let duplicate = !option.is_repeatable()
                    && kind != OptionKind::Class
                    && (view.feats.contains(option.key())
                        || view.talents.contains(option.key())
                        || view.force_options.contains(option.key()));
                let tree_reachable = match (&legal_trees, option) {
                    (Some(trees), CatalogOption::Talent(talent)) => trees.contains(&talent.tree),
                    _ => true,
                };
                !duplicate && tree_reachable && evaluate(option.prerequisites(), &view).satisfied
            })
            .collect();

        SuggestionEngine::new().rank(eligible, &view)
    }

    /// The slot picture for the staged class level.
    pub fn talent_slot_state(&self) -> Result<TalentSlotState, ProgressionError> {
        let class_key = self.staged_class()?.key.clone();
        let allocator = DualTalentAllocator::new(&self.catalog, &self.config);
        allocator.slot_state(&self.record, &class_key, &self.staging.talents)
    }

    /// Union of the trees the still-open slots may draw from. Empty when no
    /// class is staged or every slot is spent.
    fn open_slot_trees(&self) -> BTreeSet<TreeName> {
        let mut trees = BTreeSet::new();
        if let Ok(state) = self.talent_slot_state() {
            for open in [state.heroic.as_ref(), state.class.as_ref()]
                .into_iter()
                .flatten()
            {
                if !open.slot.consumed {
                    trees.extend(open.legal_trees.iter().cloned());
                }
            }
        }
        trees
    }

    fn require_state(
        &self,
        expected: ProgressionState,
        command: &'static str,
    ) -> Result<(), ProgressionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ProgressionError::InvalidStateTransition {
                command,
                state: self.state,
            })
        }
    }

    fn staged_class(&self) -> Result<&sagaforge_domain::ClassDefinition, ProgressionError> {
        let key = self
            .staging
            .class
            .as_ref()
            .ok_or(ProgressionError::InvalidStateTransition {
                command: "staged_class",
                state: self.state,
            })?;
        self.catalog
            .class(key)
            .ok_or_else(|| ProgressionError::UnknownOption {
                kind: OptionKind::Class,
                key: key.clone(),
            })
    }

    /// The ordered wizard steps after `current`, skipping those whose
    /// gating condition is false.
    fn next_state_after(&self, current: ProgressionState) -> ProgressionState {
        use ProgressionState::*;
        let order = [
            AbilityIncrease,
            FeatSelection,
            ForceOptionSelection,
            TalentSelection,
            Summary,
        ];
        let start = order
            .iter()
            .position(|s| *s == current)
            .map_or(0, |i| i + 1);
        for state in &order[start..] {
            if self.state_applies(*state) {
                return *state;
            }
        }
        Summary
    }

    fn state_applies(&self, state: ProgressionState) -> bool {
        let new_level = self.record.level + 1;
        match state {
            ProgressionState::AbilityIncrease => self.config.grants_ability_increase(new_level),
            ProgressionState::FeatSelection => self
                .staged_class()
                .map(|class| {
                    let new_class_level = self.record.class_level(&class.key) + 1;
                    class.grants_feat_at(new_class_level)
                })
                .unwrap_or(false),
            ProgressionState::ForceOptionSelection => {
                self.config.force_options_per_level > 0 && self.merged_view().is_force_sensitive()
            }
            ProgressionState::TalentSelection => self
                .talent_slot_state()
                .map(|state| state.open_count() > 0)
                .unwrap_or(false),
            ProgressionState::Summary => true,
            _ => false,
        }
    }

    /// The character as validation sees it: persisted record plus every
    /// staged selection, with base attack bonus recomputed for the staged
    /// class level.
    fn merged_view(&self) -> CharacterView<'_> {
        let mut view = self.merged_view_without_talents();
        for talent in &self.staging.talents {
            view.talents.insert(talent.key.clone());
        }
        view
    }

    fn merged_view_without_talents(&self) -> CharacterView<'_> {
        let mut view = CharacterView::of_record(&self.record, &self.catalog);
        if let Some(class) = &self.staging.class {
            view.level += 1;
            *view.class_levels.entry(class.clone()).or_insert(0) += 1;
            if let Ok(derived) = derived_totals(&view.class_levels, &self.catalog, 0) {
                view.base_attack_bonus = derived.base_attack_bonus;
            }
        }
        for (ability, delta) in &self.staging.ability_deltas {
            let score = view.ability_scores.score(*ability);
            view.ability_scores.set_score(*ability, score + delta);
        }
        for feat in &self.staging.feats {
            view.feats.insert(feat.clone());
        }
        for option in &self.staging.force_options {
            view.force_options.insert(option.clone());
        }
        for skill in &self.staging.trained_skills {
            view.trained_skills.insert(skill.clone());
        }
        view
    }

    fn validate_ability_deltas(
        &self,
        deltas: &BTreeMap<Ability, i32>,
    ) -> Result<(), ProgressionError> {
        if deltas.values().any(|d| *d <= 0) {
            return Err(ProgressionError::InvalidAllocation(
                "ability deltas must be positive".to_string(),
            ));
        }
        let grant = self.config.ability_points_per_increase as i32;
        let total: i32 = deltas.values().sum();
        if total != grant {
            return Err(ProgressionError::InvalidAllocation(format!(
                "must allocate exactly {grant} ability points, got {total}"
            )));
        }
        match self.config.ability_rule {
            AbilityAllocationRule::TwoDistinctSingles => {
                if deltas.len() != 2 || deltas.values().any(|d| *d != 1) {
                    return Err(ProgressionError::InvalidAllocation(
                        "this table spreads one point to each of two distinct abilities"
                            .to_string(),
                    ));
                }
            }
            AbilityAllocationRule::FlexibleTwoPoints => {
                if deltas.values().any(|d| *d > 2) {
                    return Err(ProgressionError::InvalidAllocation(
                        "at most two points on a single ability".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn release(&mut self) {
        if !self.released {
            self.registry.release(self.character_id, self.id);
            self.released = true;
        }
    }
}

impl Drop for ProgressionSession {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{
        MockCatalogPort, MockCharacterStore, MockNotificationPort, PortError,
    };
    use crate::test_fixtures::{sample_catalog, soldier_record};
    use sagaforge_domain::{AbilityScores, DefenseTotals, PrerequisiteExpression, TalentProvenance};

    fn key(s: &str) -> OptionKey {
        OptionKey::new(s).unwrap()
    }

    fn catalog_port() -> MockCatalogPort {
        let catalog = Arc::new(sample_catalog());
        let mut port = MockCatalogPort::new();
        port.expect_load()
            .returning(move || Ok(Arc::clone(&catalog)));
        port
    }

    fn store_with(record: CharacterRecord) -> MockCharacterStore {
        let mut store = MockCharacterStore::new();
        store
            .expect_get()
            .returning(move |_| Ok(Some(record.clone())));
        store.expect_apply().returning(|_| Ok(()));
        store
    }

    fn quiet_notifier() -> MockNotificationPort {
        let mut notifier = MockNotificationPort::new();
        notifier
            .expect_level_up_completed()
            .returning(|_| Ok(()));
        notifier
    }

    fn engine_for(record: CharacterRecord) -> ProgressionEngine {
        ProgressionEngine::new(
            Arc::new(catalog_port()),
            Arc::new(store_with(record)),
            Arc::new(quiet_notifier()),
            ProgressionConfig::default(),
        )
    }

    #[tokio::test]
    async fn soldier_level_up_walks_every_applicable_step() {
        let catalog = sample_catalog();
        let record = soldier_record(2, &catalog);
        let id = record.id;
        let engine = engine_for(record);

        let mut session = engine.start_session(id, SessionMode::Levelup).await.unwrap();
        assert_eq!(session.state(), ProgressionState::ClassSelection);

        // Level 3: no ability increase, soldier grants a feat at class
        // level 3, not Force-sensitive, both talent slots open.
        let state = session.confirm_class(key("soldier")).unwrap();
        assert_eq!(state, ProgressionState::FeatSelection);

        let state = session.confirm_feats(vec![key("toughness")]).unwrap();
        assert_eq!(state, ProgressionState::TalentSelection);

        let slots = session.talent_slot_state().unwrap();
        assert_eq!(slots.open_count(), 2);

        let state = session
            .confirm_talents(vec![
                (key("devastating_attack"), SlotType::Heroic),
                (key("armored_defense"), SlotType::Class),
            ])
            .unwrap();
        assert_eq!(state, ProgressionState::Summary);

        let summary = session.finalize().await.unwrap();
        assert_eq!(summary.level_before, 2);
        assert_eq!(summary.level_after, 3);
        assert_eq!(summary.new_feats, vec![key("toughness")]);

        let record = session.record();
        assert_eq!(record.level, 3);
        assert_eq!(record.base_attack_bonus, 3);
        assert!(record.has_feat(&key("toughness")));
        let provenance: Vec<&TalentProvenance> =
            record.talents.iter().map(|t| &t.provenance).collect();
        assert!(provenance.contains(&&TalentProvenance::Heroic { at_level: 3 }));
        assert!(provenance.contains(&&TalentProvenance::Class {
            class: key("soldier"),
            at_class_level: 3
        }));
        assert_eq!(session.state(), ProgressionState::Finalized);
        assert!(!engine.registry().is_active(id));
    }

    #[tokio::test]
    async fn feat_outside_bonus_pool_is_rejected() {
        let catalog = sample_catalog();
        let record = soldier_record(2, &catalog);
        let id = record.id;
        let engine = engine_for(record);

        let mut session = engine.start_session(id, SessionMode::Levelup).await.unwrap();
        session.confirm_class(key("soldier")).unwrap();

        let error = session.confirm_feats(vec![key("skill_training")]).unwrap_err();
        assert!(matches!(error, ProgressionError::InvalidAllocation(_)));
        // The failed confirm left the staging slot untouched.
        assert!(session.staging.feats.is_empty());
        assert_eq!(session.state(), ProgressionState::FeatSelection);
    }

    #[tokio::test]
    async fn talent_rejection_names_the_missing_link_and_leaves_session_intact() {
        let catalog = sample_catalog();
        let record = soldier_record(2, &catalog);
        let id = record.id;
        let engine = engine_for(record);

        let mut session = engine.start_session(id, SessionMode::Levelup).await.unwrap();
        session.confirm_class(key("soldier")).unwrap();
        session.confirm_feats(vec![key("toughness")]).unwrap();

        let error = session
            .confirm_talents(vec![(key("penetrating_attack"), SlotType::Class)])
            .unwrap_err();
        match error {
            ProgressionError::PrerequisiteNotMet { option, failures } => {
                assert_eq!(option, key("penetrating_attack"));
                assert_eq!(failures.len(), 1);
                assert!(matches!(
                    &failures[0].atom,
                    PrerequisiteExpression::HasTalent { key: k } if k == &key("devastating_attack")
                ));
            }
            other => panic!("unexpected error: {other}"),
        }

        // Staging retained nothing; the user retries within the same batch
        // and the earlier pick now satisfies the later one.
        assert!(session.staging.talents.is_empty());
        let state = session
            .confirm_talents(vec![
                (key("devastating_attack"), SlotType::Heroic),
                (key("penetrating_attack"), SlotType::Class),
            ])
            .unwrap();
        assert_eq!(state, ProgressionState::Summary);
    }

    #[tokio::test]
    async fn fourth_level_enforces_the_ability_rule() {
        let catalog = sample_catalog();
        let record = soldier_record(3, &catalog);
        let id = record.id;
        let engine = engine_for(record);

        let mut session = engine.start_session(id, SessionMode::Levelup).await.unwrap();
        let state = session.confirm_class(key("soldier")).unwrap();
        assert_eq!(state, ProgressionState::AbilityIncrease);

        let error = session
            .confirm_abilities(BTreeMap::from([(Ability::Str, 2)]))
            .unwrap_err();
        assert!(matches!(error, ProgressionError::InvalidAllocation(_)));

        // Level 4: no feat grant, no odd slot, so straight to summary.
        let state = session
            .confirm_abilities(BTreeMap::from([(Ability::Str, 1), (Ability::Con, 1)]))
            .unwrap();
        assert_eq!(state, ProgressionState::Summary);

        let summary = session.finalize().await.unwrap();
        assert_eq!(
            summary.ability_increases,
            BTreeMap::from([(Ability::Str, 1), (Ability::Con, 1)])
        );
        assert_eq!(session.record().ability_scores.score(Ability::Str), 11);
        assert_eq!(session.record().ability_scores.score(Ability::Con), 11);
    }

    #[tokio::test]
    async fn force_step_appears_only_for_force_sensitive_characters() {
        let catalog = sample_catalog();
        let mut record = CharacterRecord::new("Asha", AbilityScores::uniform(10));
        record.level = 1;
        record.class_levels.insert(key("jedi"), 1);
        let id = record.id;
        let engine = engine_for(record);

        let mut session = engine.start_session(id, SessionMode::Levelup).await.unwrap();
        // Level 2: even on both tracks, so Force options are the only
        // applicable step.
        let state = session.confirm_class(key("jedi")).unwrap();
        assert_eq!(state, ProgressionState::ForceOptionSelection);

        let state = session.confirm_force_options(vec![key("surge")]).unwrap();
        assert_eq!(state, ProgressionState::Summary);

        session.finalize().await.unwrap();
        assert!(session.record().has_force_option(&key("surge")));
    }

    #[tokio::test]
    async fn second_session_on_the_same_character_is_refused() {
        let catalog = sample_catalog();
        let record = soldier_record(2, &catalog);
        let id = record.id;
        let engine = engine_for(record);

        let first = engine.start_session(id, SessionMode::Levelup).await.unwrap();
        let error = match engine.start_session(id, SessionMode::Levelup).await {
            Ok(_) => panic!("second session should be refused"),
            Err(error) => error,
        };
        assert!(matches!(error, ProgressionError::SessionAlreadyActive(c) if c == id));

        first.cancel();
        assert!(!engine.registry().is_active(id));
        engine.start_session(id, SessionMode::Levelup).await.unwrap();
    }

    #[tokio::test]
    async fn cancel_discards_staging_without_persisting() {
        let catalog = sample_catalog();
        let record = soldier_record(2, &catalog);
        let pristine = record.clone();
        let id = record.id;

        let mut store = MockCharacterStore::new();
        let for_get = record.clone();
        store
            .expect_get()
            .returning(move |_| Ok(Some(for_get.clone())));
        // A cancelled session must never call apply.
        store.expect_apply().times(0);
        let engine = ProgressionEngine::new(
            Arc::new(catalog_port()),
            Arc::new(store),
            Arc::new(quiet_notifier()),
            ProgressionConfig::default(),
        );

        let mut session = engine.start_session(id, SessionMode::Levelup).await.unwrap();
        session.confirm_class(key("soldier")).unwrap();
        assert_eq!(session.record(), &pristine);
        session.cancel();
        assert!(!engine.registry().is_active(id));
    }

    #[tokio::test]
    async fn store_failure_restores_the_record() {
        let catalog = sample_catalog();
        let record = soldier_record(2, &catalog);
        let pristine = record.clone();
        let id = record.id;

        let mut store = MockCharacterStore::new();
        let for_get = record.clone();
        store
            .expect_get()
            .returning(move |_| Ok(Some(for_get.clone())));
        store
            .expect_apply()
            .returning(|_| Err(PortError::Store("connection reset".to_string())));
        let engine = ProgressionEngine::new(
            Arc::new(catalog_port()),
            Arc::new(store),
            Arc::new(quiet_notifier()),
            ProgressionConfig::default(),
        );

        let mut session = engine.start_session(id, SessionMode::Levelup).await.unwrap();
        session.confirm_class(key("soldier")).unwrap();
        session.confirm_feats(vec![key("toughness")]).unwrap();
        session.confirm_talents(vec![]).unwrap();

        let error = session.finalize().await.unwrap_err();
        assert!(matches!(error, ProgressionError::Port(_)));
        assert_eq!(session.record(), &pristine);
    }

    #[tokio::test]
    async fn catalog_failure_blocks_the_session_and_frees_the_lock() {
        let catalog = sample_catalog();
        let record = soldier_record(2, &catalog);
        let id = record.id;

        let mut port = MockCatalogPort::new();
        port.expect_load()
            .returning(|| Err(PortError::CatalogUnavailable("offline".to_string())));
        let engine = ProgressionEngine::new(
            Arc::new(port),
            Arc::new(store_with(record)),
            Arc::new(quiet_notifier()),
            ProgressionConfig::default(),
        );

        let error = match engine.start_session(id, SessionMode::Levelup).await {
            Ok(_) => panic!("session should not start without a catalog"),
            Err(error) => error,
        };
        assert!(matches!(error, ProgressionError::CatalogUnavailable(_)));
        assert!(!engine.registry().is_active(id));
    }

    #[tokio::test]
    async fn commands_out_of_order_are_rejected() {
        let catalog = sample_catalog();
        let record = soldier_record(2, &catalog);
        let id = record.id;
        let engine = engine_for(record);

        let mut session = engine.start_session(id, SessionMode::Levelup).await.unwrap();
        let error = session
            .confirm_talents(vec![(key("knack"), SlotType::Heroic)])
            .unwrap_err();
        assert!(matches!(
            error,
            ProgressionError::InvalidStateTransition {
                command: "confirm_talents",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn eligible_feats_respect_prerequisites_and_duplicates() {
        let catalog = sample_catalog();
        let mut record = soldier_record(2, &catalog);
        record.feats.push(sagaforge_domain::OwnedFeat {
            key: key("toughness"),
            acquired_at_level: 1,
        });
        let id = record.id;
        let engine = engine_for(record);

        let mut session = engine.start_session(id, SessionMode::Levelup).await.unwrap();
        session.confirm_class(key("soldier")).unwrap();

        let ranked = session.eligible_options(OptionKind::Feat);
        let keys: Vec<&OptionKey> = ranked.iter().map(|r| r.option.key()).collect();
        // BAB 3 after the staged level: specialization (BAB 4) is out.
        assert!(!keys.contains(&&key("weapon_specialization_pistols")));
        // Owned and not repeatable: out.
        assert!(!keys.contains(&&key("toughness")));
        // Not Force-sensitive: out.
        assert!(!keys.contains(&&key("force_training")));
        assert!(keys.contains(&&key("point_blank_shot")));
    }

    #[tokio::test]
    async fn eligible_talents_are_limited_to_open_slot_trees() {
        let catalog = sample_catalog();
        let record = soldier_record(2, &catalog);
        let id = record.id;
        let engine = engine_for(record);

        let mut session = engine.start_session(id, SessionMode::Levelup).await.unwrap();
        session.confirm_class(key("soldier")).unwrap();
        session.confirm_feats(vec![key("toughness")]).unwrap();

        let ranked = session.eligible_options(OptionKind::Talent);
        let keys: Vec<&OptionKey> = ranked.iter().map(|r| r.option.key()).collect();
        // A pure soldier's slots never reach scoundrel's fortune tree, so
        // the query must agree with what confirm_talents would accept.
        assert!(!keys.contains(&&key("knack")));
        assert!(keys.contains(&&key("devastating_attack")));
        assert!(keys.contains(&&key("armored_defense")));

        // Once both slots are spent nothing is eligible.
        session
            .confirm_talents(vec![
                (key("devastating_attack"), SlotType::Heroic),
                (key("armored_defense"), SlotType::Class),
            ])
            .unwrap();
        assert!(session.eligible_options(OptionKind::Talent).is_empty());
    }

    #[tokio::test]
    async fn chargen_builds_a_first_level_soldier_from_scratch() {
        let record = CharacterRecord::new("Rook Tannen", AbilityScores::uniform(10));
        let id = record.id;
        let engine = engine_for(record);

        let mut session = engine.start_session(id, SessionMode::Chargen).await.unwrap();
        assert_eq!(session.state(), ProgressionState::ClassSelection);

        // Level 0 -> 1: ability step skipped, soldier grants a feat at
        // class level 1, both first-level slots open.
        let state = session.confirm_class(key("soldier")).unwrap();
        assert_eq!(state, ProgressionState::FeatSelection);

        let state = session
            .confirm_feats(vec![key("weapon_focus_pistols")])
            .unwrap();
        assert_eq!(state, ProgressionState::TalentSelection);
        assert_eq!(session.talent_slot_state().unwrap().open_count(), 2);

        let state = session
            .confirm_talents(vec![
                (key("devastating_attack"), SlotType::Heroic),
                (key("armored_defense"), SlotType::Class),
            ])
            .unwrap();
        assert_eq!(state, ProgressionState::Summary);

        let summary = session.finalize().await.unwrap();
        assert_eq!(summary.level_before, 0);
        assert_eq!(summary.level_after, 1);
        assert_eq!(summary.hit_points_delta, 10);
        assert_eq!(summary.new_feats, vec![key("weapon_focus_pistols")]);

        let record = session.record();
        assert_eq!(record.level, 1);
        assert_eq!(record.class_level(&key("soldier")), 1);
        assert_eq!(record.base_attack_bonus, 1);
        assert_eq!(record.hit_points, 10);
        assert_eq!(record.defense, DefenseTotals::new(2, 1, 1));
        assert_eq!(
            record.talents[0].provenance,
            TalentProvenance::Heroic { at_level: 1 }
        );
        assert!(!engine.registry().is_active(id));
    }

    #[tokio::test]
    async fn chargen_mode_requires_a_level_zero_record() {
        let catalog = sample_catalog();
        let record = soldier_record(2, &catalog);
        let id = record.id;
        let engine = engine_for(record);

        let error = match engine.start_session(id, SessionMode::Chargen).await {
            Ok(_) => panic!("chargen should require a fresh record"),
            Err(error) => error,
        };
        assert!(matches!(error, ProgressionError::InvalidAllocation(_)));
        assert!(!engine.registry().is_active(id));
    }
}
