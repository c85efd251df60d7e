//! Combatants.

use crate::action::{ActionCard, ActionCardId, CardKind};
use crate::controller::Controller;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identity
// ============================================================================

/// Unique identifier for combatants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lightweight reference used inside steps and outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: EntityId,
    pub name: String,
}

/// Side of the fight. Combat ends when only one side has living members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Faction {
    Allied,
    Hostile,
}

impl Faction {
    pub fn name(&self) -> &'static str {
        match self {
            Faction::Allied => "Allied",
            Faction::Hostile => "Hostile",
        }
    }
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// Action economy
// ============================================================================

/// Per-turn budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    pub actions_remaining: u8,
    pub reactions_remaining: u8,
    /// Attacks made this turn; drives the multiple attack penalty.
    pub map_counter: u8,
}

impl Resources {
    pub const ACTIONS_PER_TURN: u8 = 3;
    pub const REACTIONS_PER_TURN: u8 = 1;

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn spend_actions(&mut self, cost: u8) -> bool {
        if self.actions_remaining >= cost {
            self.actions_remaining -= cost;
            true
        } else {
            false
        }
    }

    pub fn use_reaction(&mut self) -> bool {
        if self.reactions_remaining > 0 {
            self.reactions_remaining -= 1;
            true
        } else {
            false
        }
    }

    /// Multiple attack penalty for the next attack: 0, -5, -10, -15, ...
    pub fn attack_penalty(&self) -> i32 {
        -5 * self.map_counter as i32
    }
}

impl Default for Resources {
    fn default() -> Self {
        Self {
            actions_remaining: Self::ACTIONS_PER_TURN,
            reactions_remaining: Self::REACTIONS_PER_TURN,
            map_counter: 0,
        }
    }
}

// ============================================================================
// Entity
// ============================================================================

/// A combatant in an encounter.
///
/// Entities are never removed mid-encounter; at 0 HP they stay in the
/// initiative order and are skipped.
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub faction: Faction,
    pub hp: i32,
    pub max_hp: i32,
    pub ac: i32,
    pub attack_bonus: i32,
    /// Squares covered by one Stride.
    pub speed: i32,
    pub initiative: i32,
    pub resources: Resources,
    pub action_cards: Vec<ActionCard>,
    pub controller: Controller,
}

impl Entity {
    pub fn new(name: impl Into<String>, faction: Faction, max_hp: i32, ac: i32) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            faction,
            hp: max_hp,
            max_hp,
            ac,
            attack_bonus: 0,
            speed: 5,
            initiative: 0,
            resources: Resources::default(),
            action_cards: Vec::new(),
            controller: Controller::default(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    pub fn reference(&self) -> EntityRef {
        EntityRef {
            id: self.id,
            name: self.name.clone(),
        }
    }

    /// Reduce HP, never below zero. Returns the HP actually lost.
    pub fn take_damage(&mut self, amount: i32) -> i32 {
        let before = self.hp;
        self.hp = self.hp.saturating_sub(amount.max(0)).max(0);
        before - self.hp
    }

    pub fn reset_turn_resources(&mut self) {
        self.resources.reset();
    }

    pub fn add_action_card(&mut self, card: ActionCard) {
        self.action_cards.push(card);
    }

    pub fn card(&self, id: ActionCardId) -> Option<&ActionCard> {
        self.action_cards.iter().find(|c| c.id == id)
    }

    pub fn card_named(&self, name: &str) -> Option<&ActionCard> {
        self.action_cards.iter().find(|c| c.name == name)
    }

    /// Strike cards in the order they were granted.
    pub fn strike_cards(&self) -> impl Iterator<Item = &ActionCard> {
        self.action_cards
            .iter()
            .filter(|c| matches!(c.kind, CardKind::Strike(_)))
    }

    pub fn stride_card(&self) -> Option<&ActionCard> {
        self.action_cards
            .iter()
            .find(|c| matches!(c.kind, CardKind::Stride))
    }

    pub fn end_turn_card(&self) -> Option<&ActionCard> {
        self.action_cards
            .iter()
            .find(|c| matches!(c.kind, CardKind::EndTurn))
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (HP: {}/{}, AC: {}, Actions: {}, Reactions: {})",
            self.name,
            self.hp,
            self.max_hp,
            self.ac,
            self.resources.actions_remaining,
            self.resources.reactions_remaining
        )
    }
}
