//! Game state: the aggregate root of one encounter.
//!
//! `GameState` owns the grid, the initiative-ordered entities, the dice, the
//! trigger registry and the step history. Every mutation goes through it, and
//! every mutation it performs is announced with [`GameState::emit`].

use crate::action::{Action, ActionEffect};
use crate::dice::Dice;
use crate::entity::{Entity, EntityId, EntityRef, Faction};
use crate::grid::{Grid, Position};
use crate::step::{Step, StepFeed, StepHistory, StepType};
use crate::trigger::{Trigger, TriggerContext, TriggerRegistry};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Reverse;
use std::fmt;
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// Invariant violations. Any of these aborts the encounter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CombatError {
    #[error("entity {0} is not part of this encounter")]
    UnknownEntity(EntityId),
    #[error("{0} is not on the grid")]
    NotOnGrid(String),
    #[error("no combatants in the initiative order")]
    EmptyInitiative,
    #[error("cannot place {name} at {position}")]
    Placement { name: String, position: Position },
    #[error("a trigger replaced a {expected} step with {found}")]
    StepReplaced { expected: StepType, found: StepType },
    #[error("combat is already over")]
    CombatOver,
}

// ============================================================================
// Log
// ============================================================================

/// One human-readable line of the combat log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub message: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl LogEntry {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            metadata: Map::new(),
        }
    }

    /// Non-object `metadata` values are dropped.
    pub fn with_metadata(message: impl Into<String>, metadata: Value) -> Self {
        Self {
            message: message.into(),
            metadata: match metadata {
                Value::Object(map) => map,
                _ => Map::new(),
            },
        }
    }

    pub fn json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// How an encounter ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CombatOutcome {
    /// Only one faction has living members.
    Victory {
        faction: Faction,
        survivors: Vec<EntityRef>,
    },
    /// Nobody is left standing.
    Annihilation,
    /// The round limit ran out with both sides still standing.
    RoundLimit {
        round: u32,
        survivors: Vec<EntityRef>,
    },
}

impl CombatOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CombatOutcome::Victory { .. } => "victory",
            CombatOutcome::Annihilation => "annihilation",
            CombatOutcome::RoundLimit { .. } => "round_limit",
        }
    }

    pub fn survivors(&self) -> &[EntityRef] {
        match self {
            CombatOutcome::Victory { survivors, .. }
            | CombatOutcome::RoundLimit { survivors, .. } => survivors,
            CombatOutcome::Annihilation => &[],
        }
    }

    pub fn winning_faction(&self) -> Option<Faction> {
        match self {
            CombatOutcome::Victory { faction, .. } => Some(*faction),
            _ => None,
        }
    }
}

impl fmt::Display for CombatOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = || {
            self.survivors()
                .iter()
                .map(|e| e.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        match self {
            CombatOutcome::Victory { faction, .. } => {
                write!(f, "Combat is over! {faction} victory: {}", names())
            }
            CombatOutcome::Annihilation => write!(f, "Combat is over! No one is left standing"),
            CombatOutcome::RoundLimit { round, .. } => write!(
                f,
                "Combat stopped after {round} rounds. Still standing: {}",
                names()
            ),
        }
    }
}

// ============================================================================
// GameState
// ============================================================================

#[derive(Debug)]
pub struct GameState {
    grid: Grid,
    /// Initiative order once rolled.
    entities: Vec<Entity>,
    current_turn: usize,
    round: u32,
    logs: Vec<LogEntry>,
    history: StepHistory,
    triggers: TriggerRegistry,
    dice: Dice,
    outcome: Option<CombatOutcome>,
    max_rounds: Option<u32>,
}

impl GameState {
    pub fn new(grid: Grid, dice: Dice) -> Self {
        Self {
            grid,
            entities: Vec::new(),
            current_turn: 0,
            round: 1,
            logs: Vec::new(),
            history: StepHistory::default(),
            triggers: TriggerRegistry::new(),
            dice,
            outcome: None,
            max_rounds: None,
        }
    }

    pub fn with_history(mut self, history: StepHistory) -> Self {
        self.history = history;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: Option<u32>) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Add a combatant and place it on the grid.
    pub fn spawn(&mut self, entity: Entity, position: Position) -> Result<EntityId, CombatError> {
        if !self.grid.place(position, entity.id) {
            return Err(CombatError::Placement {
                name: entity.name,
                position,
            });
        }
        let id = entity.id;
        self.entities.push(entity);
        Ok(id)
    }

    pub fn register_trigger(&mut self, trigger: impl Trigger + 'static, step_type: StepType) {
        self.triggers.register(trigger, step_type);
    }

    pub fn triggers(&self) -> &TriggerRegistry {
        &self.triggers
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.id == id)
    }

    pub(crate) fn require(&self, id: EntityId) -> Result<&Entity, CombatError> {
        self.entity(id).ok_or(CombatError::UnknownEntity(id))
    }

    pub(crate) fn require_mut(&mut self, id: EntityId) -> Result<&mut Entity, CombatError> {
        self.entity_mut(id).ok_or(CombatError::UnknownEntity(id))
    }

    /// Where `id` stands. Entities that fell off the grid are an error.
    pub(crate) fn placed_at(&self, id: EntityId) -> Result<Position, CombatError> {
        let entity = self.require(id)?;
        let pos = self.grid.position_of(id);
        if pos.is_valid() {
            Ok(pos)
        } else {
            Err(CombatError::NotOnGrid(entity.name.clone()))
        }
    }

    /// The entity holding the turn, or `None` once combat is over.
    pub fn current_turn(&self) -> Option<EntityId> {
        if self.outcome.is_some() {
            return None;
        }
        self.entities.get(self.current_turn).map(|e| e.id)
    }

    pub fn current_entity(&self) -> Option<&Entity> {
        self.current_turn().and_then(|id| self.entity(id))
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    /// Log a line that is not tied to a step.
    pub fn log(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("{message}");
        self.logs.push(LogEntry::new(message));
    }

    pub fn history(&self) -> &StepHistory {
        &self.history
    }

    pub fn feed(&self) -> StepFeed {
        self.history.feed()
    }

    pub fn dice_mut(&mut self) -> &mut Dice {
        &mut self.dice
    }

    pub fn outcome(&self) -> Option<&CombatOutcome> {
        self.outcome.as_ref()
    }

    pub fn is_combat_over(&self) -> bool {
        self.outcome.is_some()
    }

    /// Factions with at least one living member, in initiative order.
    pub fn living_factions(&self) -> Vec<Faction> {
        let mut factions = Vec::new();
        for entity in self.entities.iter().filter(|e| e.is_alive()) {
            if !factions.contains(&entity.faction) {
                factions.push(entity.faction);
            }
        }
        factions
    }

    /// True as soon as fewer than two factions are standing, even before
    /// the current turn has been closed.
    pub fn is_decided(&self) -> bool {
        self.living_factions().len() < 2
    }

    /// Every living entity, in initiative order.
    pub fn winners(&self) -> Vec<&Entity> {
        self.entities.iter().filter(|e| e.is_alive()).collect()
    }

    // ------------------------------------------------------------------------
    // Steps
    // ------------------------------------------------------------------------

    /// Announce a step: log it, let matching triggers adjust it, then record
    /// the adjusted step in the history. Returns the adjusted step.
    ///
    /// The log line keeps its place ahead of any lines the triggers write,
    /// but its metadata is the adjusted step's, same as the history.
    pub fn emit(&mut self, mut step: Step, message: impl Into<String>) -> Step {
        let message = message.into();
        let step_type = step.step_type();
        tracing::info!(step = %step_type, "{message}");
        let entry = self.logs.len();
        self.logs.push(LogEntry {
            message: message.clone(),
            metadata: step.metadata(),
        });

        let triggers = self.triggers.ordered(step_type);
        let mut fired = false;
        if !triggers.is_empty() {
            let mut ctx = TriggerContext::new(&mut self.entities, &mut self.logs);
            for trigger in triggers {
                if trigger.condition(&step) {
                    tracing::debug!(trigger = trigger.name(), step = %step_type, "trigger fired");
                    trigger.execute(&mut step, &mut ctx);
                    fired = true;
                }
            }
        }
        if fired {
            if let Some(entry) = self.logs.get_mut(entry) {
                entry.metadata = step.metadata();
            }
        }
        tracing::debug!(step = %step_type, metadata = ?self.logs.get(entry).map(|e| &e.metadata), "step metadata");

        self.history.record(step.clone(), message);
        step
    }

    // ------------------------------------------------------------------------
    // Turn flow
    // ------------------------------------------------------------------------

    /// Announce the combatants and roll initiative.
    pub fn start_combat(&mut self) -> Result<(), CombatError> {
        if self.entities.is_empty() {
            return Err(CombatError::EmptyInitiative);
        }
        let combatants: Vec<EntityRef> = self.entities.iter().map(Entity::reference).collect();
        let message = format!(
            "Combat begins: {}",
            combatants
                .iter()
                .map(|e| e.name.as_str())
                .collect::<Vec<_>>()
                .join(" vs ")
        );
        self.emit(Step::CombatStarted { combatants }, message);
        self.roll_initiative()
    }

    /// Roll a d20 for everyone and order the entities by result, highest
    /// first. Ties keep their current order.
    pub fn roll_initiative(&mut self) -> Result<(), CombatError> {
        if self.entities.is_empty() {
            return Err(CombatError::EmptyInitiative);
        }

        for i in 0..self.entities.len() {
            let roll = self.dice.d20();
            let entity = &mut self.entities[i];
            entity.initiative = roll as i32;
            let entity = entity.reference();
            let message = format!("{} rolls initiative: {}", entity.name, roll);
            self.emit(Step::InitiativeRolled { entity, roll }, message);
        }

        self.entities.sort_by_key(|e| Reverse(e.initiative));
        self.current_turn = 0;
        self.round = 1;

        let order: Vec<EntityRef> = self.entities.iter().map(Entity::reference).collect();
        let message = format!(
            "Initiative order: {}",
            self.entities
                .iter()
                .enumerate()
                .map(|(i, e)| format!("{}. {} ({})", i + 1, e.name, e.initiative))
                .collect::<Vec<_>>()
                .join(", ")
        );
        self.emit(Step::InitiativeOrder { order }, message);
        Ok(())
    }

    /// Reset the current entity's resources and open its turn.
    pub fn start_turn(&mut self) -> Result<EntityId, CombatError> {
        if self.is_combat_over() {
            return Err(CombatError::CombatOver);
        }
        let round = self.round;
        let entity = self
            .entities
            .get_mut(self.current_turn)
            .ok_or(CombatError::EmptyInitiative)?;
        entity.reset_turn_resources();
        let message = format!("Round {round}: {}'s turn", entity.name);
        let entity = entity.reference();
        let id = entity.id;
        self.emit(Step::StartTurn { entity, round }, message);
        Ok(id)
    }

    /// Spend the action's cost and run its effect.
    ///
    /// Returns `Ok(false)` without touching anything when `actor` cannot
    /// afford the action.
    pub fn execute_action(&mut self, actor: EntityId, action: &Action) -> Result<bool, CombatError> {
        let entity = self.require_mut(actor)?;
        let remaining = entity.resources.actions_remaining;
        if !entity.resources.spend_actions(action.cost) {
            let message = format!(
                "{} does not have enough actions for {} (needs {}, has {})",
                entity.name, action.name, action.cost, remaining
            );
            tracing::warn!(actor = %entity.name, action = %action.name, cost = action.cost, remaining, "insufficient actions");
            self.log(message);
            return Ok(false);
        }
        let entity = entity.reference();

        let message = format!("{} uses {}", entity.name, action.name);
        self.emit(
            Step::StartAction {
                entity: entity.clone(),
                action: action.name.clone(),
                cost: action.cost,
            },
            message,
        );

        self.apply_effect(actor, &action.effect)?;

        let message = format!("{} finishes {}", entity.name, action.name);
        self.emit(
            Step::EndAction {
                entity,
                action: action.name.clone(),
            },
            message,
        );
        Ok(true)
    }

    fn apply_effect(&mut self, actor: EntityId, effect: &ActionEffect) -> Result<(), CombatError> {
        match effect {
            ActionEffect::Strike { target, attack } => {
                self.perform_attack(attack, actor, *target)?;
            }
            ActionEffect::Stride { toward } => self.stride(actor, *toward)?,
            ActionEffect::EndTurn => {}
        }
        Ok(())
    }

    /// Move `actor` up to its speed toward `toward`.
    fn stride(&mut self, actor: EntityId, toward: EntityId) -> Result<(), CombatError> {
        let from = self.placed_at(actor)?;
        let target = self.placed_at(toward)?;
        let (mover, speed) = {
            let entity = self.require(actor)?;
            (entity.reference(), entity.speed)
        };
        let target_name = self.require(toward)?.name.clone();

        let dest = self.grid.best_move_toward(from, target, speed);
        if dest == from {
            self.log(format!(
                "{} cannot get any closer to {}",
                mover.name, target_name
            ));
            return Ok(());
        }

        if self.grid.move_entity(from, dest) {
            let message = format!(
                "{} strides from {} to {} toward {}",
                mover.name, from, dest, target_name
            );
            self.emit(
                Step::Moved {
                    entity: mover,
                    from,
                    to: dest,
                },
                message,
            );
        } else {
            self.log(format!(
                "{} is blocked moving from {} to {}",
                mover.name, from, dest
            ));
        }
        Ok(())
    }

    /// Close the current turn and pass it to the next living entity.
    ///
    /// Ends the encounter when fewer than two factions are standing or the
    /// round limit is exceeded.
    pub fn end_turn(&mut self) -> Result<(), CombatError> {
        if self.is_combat_over() {
            return Err(CombatError::CombatOver);
        }
        let round = self.round;
        let entity = self
            .entities
            .get(self.current_turn)
            .ok_or(CombatError::EmptyInitiative)?
            .reference();
        let message = format!("{} ends their turn", entity.name);
        self.emit(Step::EndTurn { entity, round }, message);

        if self.check_combat_over() {
            return Ok(());
        }

        let count = self.entities.len();
        for offset in 1..=count {
            let index = (self.current_turn + offset) % count;
            if self.entities[index].is_alive() {
                if index <= self.current_turn {
                    self.round += 1;
                }
                self.current_turn = index;
                break;
            }
        }

        if let Some(limit) = self.max_rounds {
            if self.round > limit {
                let survivors = self.winners().into_iter().map(Entity::reference).collect();
                self.finish(CombatOutcome::RoundLimit {
                    round: limit,
                    survivors,
                });
            }
        }
        Ok(())
    }

    fn check_combat_over(&mut self) -> bool {
        let factions = self.living_factions();
        if factions.len() >= 2 {
            return false;
        }
        let outcome = match factions.first() {
            Some(faction) => CombatOutcome::Victory {
                faction: *faction,
                survivors: self.winners().into_iter().map(Entity::reference).collect(),
            },
            None => CombatOutcome::Annihilation,
        };
        self.finish(outcome);
        true
    }

    fn finish(&mut self, outcome: CombatOutcome) {
        tracing::info!(outcome = outcome.label(), round = self.round, "combat over");
        self.outcome = Some(outcome.clone());
        let message = outcome.to_string();
        self.emit(Step::CombatOver { outcome }, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionParams;
    use crate::config::CombatConfig;
    use crate::encounter::{EncounterBlueprint, Spawn};
    use crate::testing::{goblin, warrior, TestHarness};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_initiative_is_stable_descending() {
        let blueprint = EncounterBlueprint::new(10, 10)
            .with_spawn(Spawn::new(warrior().named("A"), Position::new(0, 0)))
            .with_spawn(Spawn::new(warrior().named("B"), Position::new(1, 0)))
            .with_spawn(Spawn::new(goblin().named("C"), Position::new(5, 5)));
        let h = TestHarness::from_blueprint(&blueprint, [12, 12, 18]);

        let order: Vec<&str> = h.state.entities().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(order, vec!["C", "A", "B"]);
        let initiatives: Vec<i32> = h.state.entities().iter().map(|e| e.initiative).collect();
        assert_eq!(initiatives, vec![18, 12, 12]);

        let types = h.step_types();
        assert_eq!(
            types,
            vec![
                StepType::CombatStarted,
                StepType::InitiativeRolled,
                StepType::InitiativeRolled,
                StepType::InitiativeRolled,
                StepType::InitiativeOrder,
            ]
        );
    }

    #[test]
    fn test_turns_wrap_and_count_rounds() {
        let mut h = TestHarness::duel(warrior(), Position::new(0, 0), goblin(), Position::new(5, 5));
        assert_eq!(h.state.round(), 1);
        assert_eq!(h.state.current_turn(), Some(h.first));

        h.state.start_turn().unwrap();
        h.state.end_turn().unwrap();
        assert_eq!(h.state.current_turn(), Some(h.second));
        assert_eq!(h.state.round(), 1);

        h.state.start_turn().unwrap();
        h.state.end_turn().unwrap();
        assert_eq!(h.state.current_turn(), Some(h.first));
        assert_eq!(h.state.round(), 2);
    }

    #[test]
    fn test_dead_entities_are_skipped() {
        let blueprint = EncounterBlueprint::new(10, 10)
            .with_spawn(Spawn::new(warrior(), Position::new(0, 0)))
            .with_spawn(Spawn::new(goblin().named("Goblin A"), Position::new(5, 5)))
            .with_spawn(Spawn::new(goblin().named("Goblin B"), Position::new(6, 6)));
        let mut h = TestHarness::from_blueprint(&blueprint, [20, 10, 5]);
        let goblin_a = h.state.entities()[1].id;
        let goblin_b = h.state.entities()[2].id;
        h.entity_mut(goblin_a).hp = 0;

        h.state.start_turn().unwrap();
        h.state.end_turn().unwrap();
        assert_eq!(h.state.current_turn(), Some(goblin_b));
        assert!(!h.state.is_combat_over());
    }

    #[test]
    fn test_insufficient_actions_changes_nothing() {
        let mut h = TestHarness::duel(warrior(), Position::new(0, 0), goblin(), Position::new(5, 5));
        h.state.start_turn().unwrap();
        h.entity_mut(h.first).resources.actions_remaining = 0;
        let before = h.state.history().len();

        let stride = h.entity(h.first).stride_card().unwrap().clone();
        let action = stride
            .generate(&h.state, h.first, &ActionParams::targeting(h.second))
            .unwrap();
        assert!(!h.state.execute_action(h.first, &action).unwrap());
        assert_eq!(h.state.history().len(), before);
        assert_eq!(h.state.grid().position_of(h.first), Position::new(0, 0));
        assert!(h.state.logs().last().unwrap().message.contains("not have enough actions"));
    }

    #[test]
    fn test_stride_moves_toward_target() {
        let mut h = TestHarness::duel(warrior(), Position::new(0, 0), goblin(), Position::new(9, 0));
        h.state.start_turn().unwrap();
        let stride = h.entity(h.first).stride_card().unwrap().clone();
        let action = stride
            .generate(&h.state, h.first, &ActionParams::targeting(h.second))
            .unwrap();

        assert!(h.state.execute_action(h.first, &action).unwrap());
        assert_eq!(h.state.grid().position_of(h.first), Position::new(5, 0));
        assert_eq!(h.entity(h.first).resources.actions_remaining, 2);
        let types = h.step_types();
        assert_eq!(
            &types[types.len() - 3..],
            &[StepType::StartAction, StepType::Moved, StepType::EndAction]
        );

        // Second stride ends adjacent; a third cannot improve.
        assert!(h.state.execute_action(h.first, &action).unwrap());
        assert_eq!(h.state.grid().position_of(h.first), Position::new(8, 0));
        assert!(h.state.execute_action(h.first, &action).unwrap());
        assert_eq!(h.state.grid().position_of(h.first), Position::new(8, 0));
        assert!(h.state.logs().last().is_some_and(|l| l.message.contains("finishes")));
    }

    #[test]
    fn test_faction_victory_ends_combat() {
        let mut h = TestHarness::duel(warrior(), Position::new(0, 0), goblin(), Position::new(1, 0));
        h.state.start_turn().unwrap();
        h.entity_mut(h.second).hp = 0;
        assert!(h.state.is_decided());
        h.state.end_turn().unwrap();

        assert!(h.state.is_combat_over());
        assert_eq!(h.state.current_turn(), None);
        let outcome = h.state.outcome().unwrap();
        assert_eq!(outcome.winning_faction(), Some(Faction::Allied));
        assert_eq!(outcome.survivors().len(), 1);
        assert_eq!(h.state.winners()[0].id, h.first);
        assert_eq!(h.step_types().last(), Some(&StepType::CombatOver));
        assert_eq!(h.state.start_turn(), Err(CombatError::CombatOver));
    }

    #[test]
    fn test_annihilation() {
        let mut h = TestHarness::duel(warrior(), Position::new(0, 0), goblin(), Position::new(1, 0));
        h.entity_mut(h.first).hp = 0;
        h.entity_mut(h.second).hp = 0;
        h.state.end_turn().unwrap();
        assert_eq!(h.state.outcome(), Some(&CombatOutcome::Annihilation));
        assert!(h.state.winners().is_empty());
    }

    #[test]
    fn test_round_limit() {
        let blueprint = EncounterBlueprint::new(10, 10)
            .with_spawn(Spawn::new(warrior(), Position::new(0, 0)))
            .with_spawn(Spawn::new(goblin(), Position::new(9, 9)));
        let mut h = TestHarness::with_config(
            &blueprint,
            CombatConfig::new().with_max_rounds(Some(1)),
            [20, 1],
        );

        h.state.start_turn().unwrap();
        h.state.end_turn().unwrap();
        assert!(!h.state.is_combat_over());
        h.state.start_turn().unwrap();
        h.state.end_turn().unwrap();

        match h.state.outcome() {
            Some(CombatOutcome::RoundLimit { round, survivors }) => {
                assert_eq!(*round, 1);
                assert_eq!(survivors.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[derive(Debug)]
    struct Tag {
        label: &'static str,
        priority: i32,
        seen: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Trigger for Tag {
        fn name(&self) -> &str {
            self.label
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn condition(&self, _step: &Step) -> bool {
            true
        }

        fn execute(&self, _step: &mut Step, ctx: &mut TriggerContext<'_>) {
            self.seen.lock().unwrap().push(self.label);
            ctx.log(self.label);
        }
    }

    #[test]
    fn test_emit_runs_triggers_in_order() {
        let mut h = TestHarness::duel(warrior(), Position::new(0, 0), goblin(), Position::new(5, 5));
        let seen = Arc::new(Mutex::new(Vec::new()));
        for (label, priority) in [("a", 1), ("b", 5), ("c", 1)] {
            h.state.register_trigger(
                Tag {
                    label,
                    priority,
                    seen: Arc::clone(&seen),
                },
                StepType::StartTurn,
            );
        }
        h.state.start_turn().unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["b", "a", "c"]);

        // Step line first, trigger lines after.
        let tail: Vec<&str> = h.state.logs()[h.state.logs().len() - 4..]
            .iter()
            .map(|l| l.message.as_str())
            .collect();
        assert!(tail[0].contains("turn"));
        assert_eq!(&tail[1..], &["b", "a", "c"]);
    }

    #[test]
    fn test_log_entry_json() {
        let entry = LogEntry::with_metadata("hit", serde_json::json!({"roll": 17}));
        let json: Value = serde_json::from_str(&entry.json()).unwrap();
        assert_eq!(json["message"], "hit");
        assert_eq!(json["metadata"]["roll"], 17);
        assert_eq!(LogEntry::new("plain").json(), r#"{"message":"plain"}"#);
    }
}
