//! Testing utilities for combat scenarios.
//!
//! Provides stock stat blocks, a harness that builds encounters with
//! scripted dice, and assertion helpers.

use crate::attack::BaseAttack;
use crate::config::CombatConfig;
use crate::damage::DamageType;
use crate::dice::{Dice, DiceExpression, DieType};
use crate::encounter::{EncounterBlueprint, EntityTemplate, Spawn};
use crate::entity::{Entity, EntityId, Faction};
use crate::grid::Position;
use crate::state::GameState;
use crate::step::{Step, StepRecord, StepType};

// ============================================================================
// Stat blocks
// ============================================================================

/// HP 30, AC 15, +5 with a 1d8+3 longsword. No shield.
pub fn warrior() -> EntityTemplate {
    EntityTemplate::new("Warrior", Faction::Allied, 30, 15)
        .with_attack_bonus(5)
        .with_strike(BaseAttack::new("Longsword").with_damage(
            DiceExpression::single(1, DieType::D8, 3),
            DamageType::Slashing,
        ))
}

/// HP 20, AC 13, +3 with a 1d6+2 shortsword.
pub fn goblin() -> EntityTemplate {
    EntityTemplate::new("Goblin", Faction::Hostile, 20, 13)
        .with_attack_bonus(3)
        .with_strike(BaseAttack::new("Shortsword").with_damage(
            DiceExpression::single(1, DieType::D6, 2),
            DamageType::Piercing,
        ))
}

// ============================================================================
// Harness
// ============================================================================

/// A built encounter plus handles to its first two spawns.
pub struct TestHarness {
    /// The game state under test.
    pub state: GameState,
    /// Id of the first spawn in the blueprint.
    pub first: EntityId,
    /// Id of the second spawn, or the first again for one-entity blueprints.
    pub second: EntityId,
}

impl TestHarness {
    /// Two combatants on a 10x10 grid; `a` wins initiative and holds the
    /// first turn.
    pub fn duel(a: EntityTemplate, at: Position, b: EntityTemplate, bt: Position) -> Self {
        let blueprint = EncounterBlueprint::new(10, 10)
            .with_spawn(Spawn::new(a, at))
            .with_spawn(Spawn::new(b, bt));
        Self::from_blueprint(&blueprint, [20, 1])
    }

    /// Build `blueprint`, feeding `initiative` to the initiative rolls in
    /// spawn order.
    pub fn from_blueprint(
        blueprint: &EncounterBlueprint,
        initiative: impl IntoIterator<Item = u32>,
    ) -> Self {
        Self::with_config(blueprint, CombatConfig::new(), initiative)
    }

    /// As [`from_blueprint`](Self::from_blueprint) with a custom config.
    #[track_caller]
    pub fn with_config(
        blueprint: &EncounterBlueprint,
        config: CombatConfig,
        initiative: impl IntoIterator<Item = u32>,
    ) -> Self {
        let state = match blueprint.build_with(&config, Dice::scripted(initiative), None) {
            Ok(state) => state,
            Err(err) => panic!("failed to build test encounter: {err}"),
        };
        let first = blueprint.spawns[0].template.id;
        let second = blueprint.spawns.get(1).map_or(first, |s| s.template.id);
        Self {
            state,
            first,
            second,
        }
    }

    /// Queue exact die faces for the next rolls.
    pub fn script(&mut self, faces: impl IntoIterator<Item = u32>) -> &mut Self {
        self.state.dice_mut().push_faces(faces);
        self
    }

    /// Look up an entity that must exist.
    #[track_caller]
    pub fn entity(&self, id: EntityId) -> &Entity {
        match self.state.entity(id) {
            Some(entity) => entity,
            None => panic!("no entity {id} in the harness"),
        }
    }

    #[track_caller]
    pub fn entity_mut(&mut self, id: EntityId) -> &mut Entity {
        match self.state.entity_mut(id) {
            Some(entity) => entity,
            None => panic!("no entity {id} in the harness"),
        }
    }

    /// Every recorded step, oldest first.
    pub fn records(&self) -> Vec<StepRecord> {
        self.state.history().records()
    }

    /// Every recorded step type, oldest first.
    pub fn step_types(&self) -> Vec<StepType> {
        self.state
            .history()
            .records()
            .into_iter()
            .map(|r| r.step_type)
            .collect()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert an entity's current HP.
#[track_caller]
pub fn assert_hp(harness: &TestHarness, id: EntityId, expected: i32) {
    let entity = harness.entity(id);
    assert_eq!(
        entity.hp, expected,
        "Expected {} to have {expected} HP, got {}",
        entity.name, entity.hp
    );
}

/// Assert a recorded history is well formed: combat starts first, turns
/// and actions open and close in pairs, every attack is closed by an
/// AfterAttack inside its action, a hit deals damage exactly once between
/// the two, a miss deals none, and nothing follows CombatOver.
#[track_caller]
pub fn assert_well_formed(records: &[StepRecord]) {
    assert_eq!(
        records.first().map(|r| r.step_type),
        Some(StepType::CombatStarted),
        "history must open with CombatStarted"
    );

    let mut in_turn = false;
    let mut in_action = false;
    // Some(hit) while an attack is open.
    let mut attack: Option<bool> = None;
    let mut in_damage = false;
    let mut damage_dealt = false;

    for (i, record) in records.iter().enumerate() {
        let step = record.step_type;
        match &record.step {
            Step::StartTurn { .. } => {
                assert!(!in_turn, "step {i}: turn started twice");
                in_turn = true;
            }
            Step::EndTurn { .. } => {
                assert!(in_turn && !in_action, "step {i}: unbalanced EndTurn");
                in_turn = false;
            }
            Step::StartAction { .. } => {
                assert!(in_turn && !in_action, "step {i}: action outside a turn");
                in_action = true;
            }
            Step::EndAction { .. } => {
                assert!(in_action, "step {i}: unbalanced EndAction");
                assert!(attack.is_none(), "step {i}: action ended inside an attack");
                in_action = false;
            }
            Step::BeforeAttack(a) => {
                assert!(in_action, "step {i}: {step} outside an action");
                assert!(attack.is_none(), "step {i}: attack inside an attack");
                attack = Some(a.degree.is_success());
                damage_dealt = false;
            }
            Step::BeforeDamage(_) => {
                assert_eq!(attack, Some(true), "step {i}: damage without a hit");
                assert!(!in_damage && !damage_dealt, "step {i}: damage dealt twice");
                in_damage = true;
            }
            Step::AfterDamage(_) => {
                assert!(in_damage, "step {i}: AfterDamage without BeforeDamage");
                in_damage = false;
                damage_dealt = true;
            }
            Step::AfterAttack(a) => {
                let Some(hit) = attack else {
                    panic!("step {i}: AfterAttack without BeforeAttack");
                };
                assert_eq!(hit, a.degree.is_success(), "step {i}: degree changed mid-attack");
                assert!(!in_damage, "step {i}: attack closed inside damage");
                assert_eq!(damage_dealt, hit, "step {i}: hit and damage disagree");
                attack = None;
            }
            Step::Moved { .. } => {
                assert!(
                    in_action && attack.is_none(),
                    "step {i}: {step} outside an action"
                );
            }
            Step::CombatOver { .. } => {
                assert_eq!(i, records.len() - 1, "steps recorded after CombatOver");
            }
            Step::CombatStarted { .. }
            | Step::InitiativeRolled { .. }
            | Step::InitiativeOrder { .. } => {}
        }
    }
    assert!(attack.is_none() && !in_damage, "history ends inside an attack");
    assert!(!in_action, "history ends inside an action");
}
