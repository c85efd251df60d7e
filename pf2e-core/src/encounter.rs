//! Encounter blueprints.
//!
//! A blueprint is the immutable description of a fight: grid size, stat
//! blocks and starting squares. Building it yields a fresh [`GameState`]
//! with initiative already rolled. Templates carry fixed ids, so every build
//! of the same blueprint has the same entity ids.

use crate::action::ActionCard;
use crate::attack::BaseAttack;
use crate::config::CombatConfig;
use crate::controller::{Controller, ControllerKind, ExternalController};
use crate::damage::DamageType;
use crate::dice::{Dice, DiceExpression, DieType};
use crate::entity::{Entity, EntityId, EntityRef, Faction};
use crate::grid::{Grid, Position};
use crate::state::{CombatError, GameState};
use crate::step::{StepHistory, StepType};
use crate::trigger::ShieldBlock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tokio::fs;

/// Errors from loading or building an encounter.
#[derive(Debug, Error)]
pub enum EncounterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Encounter has no combatants")]
    NoSpawns,

    #[error("Invalid grid size {width}x{height}")]
    InvalidGrid { width: i32, height: i32 },

    #[error("{name} spawns outside the grid at {position}")]
    OutOfBounds { name: String, position: Position },

    #[error("{name} spawns on occupied square {position}")]
    Overlap { name: String, position: Position },

    #[error("Entity id {0} is used by more than one spawn")]
    DuplicateId(EntityId),

    #[error("{name} has invalid stats: {reason}")]
    InvalidStats { name: String, reason: String },

    #[error("{0} needs an external controller but none was supplied")]
    NoExternalController(String),

    #[error(transparent)]
    Combat(#[from] CombatError),
}

// ============================================================================
// Templates
// ============================================================================

/// A stat block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTemplate {
    #[serde(default)]
    pub id: EntityId,
    pub name: String,
    pub faction: Faction,
    pub max_hp: i32,
    pub ac: i32,
    #[serde(default)]
    pub attack_bonus: i32,
    /// Falls back to the configured default speed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<i32>,
    #[serde(default)]
    pub strikes: Vec<BaseAttack>,
    /// Block value of a shield, if the creature carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shield_block: Option<i32>,
    #[serde(default)]
    pub controller: ControllerKind,
}

impl EntityTemplate {
    pub fn new(name: impl Into<String>, faction: Faction, max_hp: i32, ac: i32) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            faction,
            max_hp,
            ac,
            attack_bonus: 0,
            speed: None,
            strikes: Vec::new(),
            shield_block: None,
            controller: ControllerKind::Ai,
        }
    }

    /// Rename. Also issues a new id so the copy is a distinct combatant.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self.id = EntityId::new();
        self
    }

    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = id;
        self
    }

    pub fn with_attack_bonus(mut self, bonus: i32) -> Self {
        self.attack_bonus = bonus;
        self
    }

    pub fn with_speed(mut self, speed: i32) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_strike(mut self, attack: BaseAttack) -> Self {
        self.strikes.push(attack);
        self
    }

    pub fn with_shield_block(mut self, block: i32) -> Self {
        self.shield_block = Some(block);
        self
    }

    pub fn with_controller(mut self, controller: ControllerKind) -> Self {
        self.controller = controller;
        self
    }

    pub fn reference(&self) -> EntityRef {
        EntityRef {
            id: self.id,
            name: self.name.clone(),
        }
    }

    fn validate(&self) -> Result<(), EncounterError> {
        let invalid = |reason: &str| EncounterError::InvalidStats {
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        if self.max_hp <= 0 {
            return Err(invalid("max_hp must be positive"));
        }
        if self.speed.is_some_and(|s| s < 0) {
            return Err(invalid("speed must not be negative"));
        }
        if self.shield_block.is_some_and(|b| b < 0) {
            return Err(invalid("shield block must not be negative"));
        }
        Ok(())
    }

    /// A live entity with one Strike card per attack plus Stride and End Turn.
    fn instantiate(
        &self,
        config: &CombatConfig,
        external: Option<&ExternalController>,
    ) -> Result<Entity, EncounterError> {
        let mut entity = Entity::new(self.name.clone(), self.faction, self.max_hp, self.ac);
        entity.id = self.id;
        entity.attack_bonus = self.attack_bonus;
        entity.speed = self.speed.unwrap_or(config.default_speed);
        for attack in &self.strikes {
            entity.add_action_card(ActionCard::strike(attack.clone()));
        }
        entity.add_action_card(ActionCard::stride());
        entity.add_action_card(ActionCard::end_turn());

        entity.controller = match self.controller {
            ControllerKind::Ai => Controller::default(),
            ControllerKind::External => Controller::External(
                external
                    .cloned()
                    .ok_or_else(|| EncounterError::NoExternalController(self.name.clone()))?,
            ),
        };
        Ok(entity)
    }
}

/// Where a template starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spawn {
    pub template: EntityTemplate,
    pub position: Position,
}

impl Spawn {
    pub fn new(template: EntityTemplate, position: Position) -> Self {
        Self { template, position }
    }
}

// ============================================================================
// Blueprint
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterBlueprint {
    pub grid_width: i32,
    pub grid_height: i32,
    pub spawns: Vec<Spawn>,
}

impl EncounterBlueprint {
    pub fn new(grid_width: i32, grid_height: i32) -> Self {
        Self {
            grid_width,
            grid_height,
            spawns: Vec::new(),
        }
    }

    pub fn with_spawn(mut self, spawn: Spawn) -> Self {
        self.spawns.push(spawn);
        self
    }

    /// Warrior and shield against a goblin on a 10x10 grid.
    pub fn demo() -> Self {
        let warrior = EntityTemplate::new("Warrior", Faction::Allied, 30, 15)
            .with_attack_bonus(5)
            .with_strike(BaseAttack::new("Longsword").with_damage(
                DiceExpression::single(1, DieType::D8, 3),
                DamageType::Slashing,
            ))
            .with_shield_block(ShieldBlock::DEFAULT_BLOCK);
        let goblin = EntityTemplate::new("Goblin", Faction::Hostile, 20, 13)
            .with_attack_bonus(3)
            .with_strike(BaseAttack::new("Shortsword").with_damage(
                DiceExpression::single(1, DieType::D6, 2),
                DamageType::Piercing,
            ));

        Self::new(10, 10)
            .with_spawn(Spawn::new(warrior, Position::new(1, 1)))
            .with_spawn(Spawn::new(goblin, Position::new(8, 8)))
    }

    pub fn from_json(json: &str) -> Result<Self, EncounterError> {
        let blueprint: Self = serde_json::from_str(json)?;
        blueprint.validate()?;
        Ok(blueprint)
    }

    /// Load and validate a JSON blueprint.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, EncounterError> {
        let content = fs::read_to_string(path).await?;
        Self::from_json(&content)
    }

    /// Save as pretty JSON.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), EncounterError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), EncounterError> {
        if self.grid_width <= 0 || self.grid_height <= 0 {
            return Err(EncounterError::InvalidGrid {
                width: self.grid_width,
                height: self.grid_height,
            });
        }
        if self.spawns.is_empty() {
            return Err(EncounterError::NoSpawns);
        }

        let grid = Grid::new(self.grid_width, self.grid_height);
        let mut squares = HashSet::new();
        let mut ids = HashSet::new();
        for spawn in &self.spawns {
            spawn.template.validate()?;
            if !grid.in_bounds(spawn.position) {
                return Err(EncounterError::OutOfBounds {
                    name: spawn.template.name.clone(),
                    position: spawn.position,
                });
            }
            if !squares.insert(spawn.position) {
                return Err(EncounterError::Overlap {
                    name: spawn.template.name.clone(),
                    position: spawn.position,
                });
            }
            if !ids.insert(spawn.template.id) {
                return Err(EncounterError::DuplicateId(spawn.template.id));
            }
        }
        Ok(())
    }

    pub fn needs_external_controller(&self) -> bool {
        self.spawns
            .iter()
            .any(|s| s.template.controller == ControllerKind::External)
    }

    /// Build with AI control only and dice from `config`.
    pub fn build(&self, config: &CombatConfig) -> Result<GameState, EncounterError> {
        self.build_with(config, config.dice(), None)
    }

    /// Build a fresh game state: place everyone, register shields, roll
    /// initiative.
    pub fn build_with(
        &self,
        config: &CombatConfig,
        dice: Dice,
        external: Option<&ExternalController>,
    ) -> Result<GameState, EncounterError> {
        self.validate()?;

        let grid = Grid::new(self.grid_width, self.grid_height);
        let mut state = GameState::new(grid, dice)
            .with_history(StepHistory::new(config.feed_capacity))
            .with_max_rounds(config.max_rounds);

        for spawn in &self.spawns {
            let entity = spawn.template.instantiate(config, external)?;
            let id = state.spawn(entity, spawn.position)?;
            if let Some(block) = spawn.template.shield_block {
                state.register_trigger(ShieldBlock::new(id, block), StepType::BeforeDamage);
            }
        }

        state.start_combat()?;
        tracing::info!(
            combatants = self.spawns.len(),
            width = self.grid_width,
            height = self.grid_height,
            "encounter built"
        );
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{goblin, warrior};

    #[test]
    fn test_demo_is_valid() {
        let blueprint = EncounterBlueprint::demo();
        blueprint.validate().unwrap();
        assert_eq!(blueprint.spawns.len(), 2);
        assert_eq!(blueprint.spawns[0].template.max_hp, 30);
        assert_eq!(blueprint.spawns[1].template.ac, 13);
    }

    #[test]
    fn test_build_places_everyone_and_rolls_initiative() {
        let blueprint = EncounterBlueprint::demo();
        let state = blueprint.build(&CombatConfig::new().with_seed(3)).unwrap();
        assert_eq!(state.entities().len(), 2);
        for spawn in &blueprint.spawns {
            assert_eq!(
                state.grid().position_of(spawn.template.id),
                spawn.position
            );
        }
        // The warrior's shield is the only trigger.
        assert_eq!(state.triggers().len(), 1);
        assert!(state.current_turn().is_some());
        assert_eq!(state.round(), 1);

        let warrior = state.entity(blueprint.spawns[0].template.id).unwrap();
        let cards: Vec<&str> = warrior.action_cards.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(cards, vec!["Strike (Longsword)", "Stride", "End Turn"]);
    }

    #[test]
    fn test_rebuild_reproduces_ids() {
        let blueprint = EncounterBlueprint::demo();
        let config = CombatConfig::new().with_seed(11);
        let mut first = blueprint.build(&config).unwrap();
        let second = blueprint.build(&config).unwrap();

        // Mutating one build leaves the blueprint and other builds alone.
        let id = blueprint.spawns[1].template.id;
        first.entity_mut(id).unwrap().hp = 1;
        assert_eq!(second.entity(id).unwrap().hp, 20);

        let ids = |s: &GameState| s.entities().iter().map(|e| e.id).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
    }

    #[test]
    fn test_validation_errors() {
        let empty = EncounterBlueprint::new(10, 10);
        assert!(matches!(empty.validate(), Err(EncounterError::NoSpawns)));

        let bad_grid = EncounterBlueprint::new(0, 5)
            .with_spawn(Spawn::new(warrior(), Position::new(0, 0)));
        assert!(matches!(
            bad_grid.validate(),
            Err(EncounterError::InvalidGrid { .. })
        ));

        let outside = EncounterBlueprint::new(5, 5)
            .with_spawn(Spawn::new(warrior(), Position::new(5, 0)));
        assert!(matches!(
            outside.validate(),
            Err(EncounterError::OutOfBounds { .. })
        ));

        let stacked = EncounterBlueprint::new(5, 5)
            .with_spawn(Spawn::new(warrior(), Position::new(1, 1)))
            .with_spawn(Spawn::new(goblin(), Position::new(1, 1)));
        assert!(matches!(
            stacked.validate(),
            Err(EncounterError::Overlap { .. })
        ));

        let twin = warrior();
        let twins = EncounterBlueprint::new(5, 5)
            .with_spawn(Spawn::new(twin.clone(), Position::new(0, 0)))
            .with_spawn(Spawn::new(twin, Position::new(1, 1)));
        assert!(matches!(
            twins.validate(),
            Err(EncounterError::DuplicateId(_))
        ));

        let dead = EncounterBlueprint::new(5, 5).with_spawn(Spawn::new(
            EntityTemplate::new("Ghost", Faction::Hostile, 0, 10),
            Position::new(0, 0),
        ));
        assert!(matches!(
            dead.validate(),
            Err(EncounterError::InvalidStats { .. })
        ));
    }

    #[test]
    fn test_external_template_needs_controller() {
        let blueprint = EncounterBlueprint::new(5, 5)
            .with_spawn(Spawn::new(
                warrior().with_controller(ControllerKind::External),
                Position::new(0, 0),
            ))
            .with_spawn(Spawn::new(goblin(), Position::new(4, 4)));
        assert!(blueprint.needs_external_controller());
        assert!(matches!(
            blueprint.build(&CombatConfig::new()),
            Err(EncounterError::NoExternalController(_))
        ));

        let (controller, _tx) = ExternalController::channel();
        let state = blueprint
            .build_with(&CombatConfig::new(), Dice::seeded(1), Some(&controller))
            .unwrap();
        let hero = state.entity(blueprint.spawns[0].template.id).unwrap();
        assert_eq!(hero.controller.kind(), ControllerKind::External);
    }

    #[test]
    fn test_json_round_trip_keeps_ids() {
        let blueprint = EncounterBlueprint::demo();
        let json = serde_json::to_string(&blueprint).unwrap();
        let back = EncounterBlueprint::from_json(&json).unwrap();
        assert_eq!(back, blueprint);
    }

    #[test]
    fn test_minimal_json() {
        let json = r#"{
            "grid_width": 6,
            "grid_height": 6,
            "spawns": [
                {
                    "template": {
                        "name": "Skeleton",
                        "faction": "Hostile",
                        "max_hp": 4,
                        "ac": 16,
                        "strikes": [
                            { "name": "Claw", "damage": [{ "dice": "1d6", "damage_type": "slashing" }] }
                        ]
                    },
                    "position": { "x": 2, "y": 3 }
                }
            ]
        }"#;
        let blueprint = EncounterBlueprint::from_json(json).unwrap();
        let template = &blueprint.spawns[0].template;
        assert_eq!(template.controller, ControllerKind::Ai);
        assert_eq!(template.strikes[0].reach, 1);
        assert_eq!(template.speed, None);

        let bad = r#"{ "grid_width": 6, "grid_height": 6, "spawns": [] }"#;
        assert!(matches!(
            EncounterBlueprint::from_json(bad),
            Err(EncounterError::NoSpawns)
        ));
        assert!(matches!(
            EncounterBlueprint::from_json("{"),
            Err(EncounterError::Json(_))
        ));
    }

    #[test]
    fn test_oversized_damage_dice_are_rejected() {
        let json = |dice: &str| {
            format!(
                r#"{{
                    "grid_width": 4,
                    "grid_height": 4,
                    "spawns": [{{
                        "template": {{
                            "name": "Ogre",
                            "faction": "Hostile",
                            "max_hp": 50,
                            "ac": 17,
                            "strikes": [{{ "name": "Club", "damage": [{{ "dice": "{dice}", "damage_type": "bludgeoning" }}] }}]
                        }},
                        "position": {{ "x": 0, "y": 0 }}
                    }}]
                }}"#
            )
        };
        assert!(EncounterBlueprint::from_json(&json("2d10+7")).is_ok());
        for dice in ["1d4+2000000000", "4000000000d20", "1d4+2147483647+1"] {
            assert!(
                matches!(
                    EncounterBlueprint::from_json(&json(dice)),
                    Err(EncounterError::Json(_))
                ),
                "{dice} should be rejected"
            );
        }
    }
}
