//! Read-only views of a game state for callers outside the driver.

use crate::action::{ActionCard, ActionCardId, ActionCardType};
use crate::controller::ControllerKind;
use crate::entity::{Entity, EntityId, Faction};
use crate::grid::Position;
use crate::state::GameState;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionCardRef {
    pub id: ActionCardId,
    pub name: String,
    pub description: String,
    /// `None` for variable-cost cards.
    pub cost: Option<u8>,
    pub card_type: ActionCardType,
}

impl From<&ActionCard> for ActionCardRef {
    fn from(card: &ActionCard) -> Self {
        Self {
            id: card.id,
            name: card.name.clone(),
            description: card.description.clone(),
            cost: card.card_type.fixed_cost(),
            card_type: card.card_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub name: String,
    pub hp: i32,
    pub max_hp: i32,
    pub ac: i32,
    pub actions_remaining: u8,
    pub reactions_remaining: u8,
    pub faction: Faction,
    pub controller: ControllerKind,
    /// `None` when the entity is not on the grid.
    pub position: Option<Position>,
    pub cards: Vec<ActionCardRef>,
}

impl EntitySnapshot {
    fn capture(entity: &Entity, position: Position) -> Self {
        Self {
            id: entity.id,
            name: entity.name.clone(),
            hp: entity.hp,
            max_hp: entity.max_hp,
            ac: entity.ac,
            actions_remaining: entity.resources.actions_remaining,
            reactions_remaining: entity.resources.reactions_remaining,
            faction: entity.faction,
            controller: entity.controller.kind(),
            position: position.is_valid().then_some(position),
            cards: entity.action_cards.iter().map(ActionCardRef::from).collect(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }
}

/// Everything an observer can see at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub grid_width: i32,
    pub grid_height: i32,
    pub round: u32,
    pub current_turn: Option<EntityId>,
    pub combat_over: bool,
    /// Initiative order.
    pub entities: Vec<EntitySnapshot>,
}

impl Snapshot {
    pub fn capture(state: &GameState) -> Self {
        let grid = state.grid();
        Self {
            grid_width: grid.width(),
            grid_height: grid.height(),
            round: state.round(),
            current_turn: state.current_turn(),
            combat_over: state.is_combat_over(),
            entities: state
                .entities()
                .iter()
                .map(|e| EntitySnapshot::capture(e, grid.position_of(e.id)))
                .collect(),
        }
    }

    pub fn entity(&self, id: EntityId) -> Option<&EntitySnapshot> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn entity_named(&self, name: &str) -> Option<&EntitySnapshot> {
        self.entities.iter().find(|e| e.name == name)
    }
}
