//! Action cards and the concrete actions they generate.
//!
//! A card is a reusable template owned by an entity. Asking a card to
//! [`generate`](ActionCard::generate) an [`Action`] only validates and builds;
//! nothing is mutated until the action is executed by the
//! [`GameState`](crate::state::GameState).

use crate::attack::BaseAttack;
use crate::entity::{Entity, EntityId, Resources};
use crate::state::GameState;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for action cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionCardId(pub Uuid);

impl ActionCardId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ActionCardId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActionCardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a card refused to generate an action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("actor {0} does not exist")]
    ActorNotFound(EntityId),
    #[error("missing parameter: {0}")]
    MissingParam(&'static str),
    #[error("target {0} not found")]
    TargetNotFound(EntityId),
    #[error("invalid target: {reason}")]
    TargetInvalid { target: EntityId, reason: String },
    #[error("target is out of range ({distance} > {max})")]
    OutOfRange { distance: i32, max: i32 },
    #[error("variable action requires an action_cost parameter")]
    MissingCost,
    #[error("action cost {0} exceeds the per-turn action budget")]
    CostOutOfRange(u8),
}

/// How many actions a card costs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionCardType {
    OneAction,
    TwoAction,
    ThreeAction,
    /// Cost is chosen per use through the `action_cost` parameter.
    VariableAction,
    FreeAction,
}

impl ActionCardType {
    pub fn fixed_cost(&self) -> Option<u8> {
        match self {
            ActionCardType::OneAction => Some(1),
            ActionCardType::TwoAction => Some(2),
            ActionCardType::ThreeAction => Some(3),
            ActionCardType::FreeAction => Some(0),
            ActionCardType::VariableAction => None,
        }
    }

    pub fn cost(&self, params: &ActionParams) -> Result<u8, ActionError> {
        if let Some(cost) = self.fixed_cost() {
            return Ok(cost);
        }
        match params.action_cost {
            None => Err(ActionError::MissingCost),
            Some(cost) if cost > Resources::ACTIONS_PER_TURN => {
                Err(ActionError::CostOutOfRange(cost))
            }
            Some(cost) => Ok(cost),
        }
    }
}

/// Parameters supplied when invoking a card.
///
/// Wire names follow the command schema (`targetID`, `action_cost`).
/// Unknown fields are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionParams {
    #[serde(rename = "targetID", default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_cost: Option<u8>,
}

impl ActionParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn targeting(target: EntityId) -> Self {
        Self {
            target_id: Some(target),
            action_cost: None,
        }
    }

    pub fn with_cost(mut self, cost: u8) -> Self {
        self.action_cost = Some(cost);
        self
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    fn require_target(&self) -> Result<EntityId, ActionError> {
        self.target_id.ok_or(ActionError::MissingParam("targetID"))
    }
}

/// A check a target must pass before a card will act on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetCriterion {
    IsAlive,
    /// Not on the actor's side.
    IsEnemy,
    /// Within this many squares of the actor.
    Range(i32),
}

impl TargetCriterion {
    pub fn check(
        &self,
        state: &GameState,
        actor: &Entity,
        target: &Entity,
    ) -> Result<(), ActionError> {
        match *self {
            TargetCriterion::IsAlive if !target.is_alive() => Err(ActionError::TargetInvalid {
                target: target.id,
                reason: format!("{} is not alive", target.name),
            }),
            TargetCriterion::IsEnemy if target.faction == actor.faction => {
                Err(ActionError::TargetInvalid {
                    target: target.id,
                    reason: format!("{} is an ally of {}", target.name, actor.name),
                })
            }
            TargetCriterion::Range(max) => {
                let distance = state
                    .grid()
                    .distance_between(actor.id, target.id)
                    .ok_or_else(|| ActionError::TargetInvalid {
                        target: target.id,
                        reason: format!("{} is not on the grid", target.name),
                    })?;
                if distance > max {
                    Err(ActionError::OutOfRange { distance, max })
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }
}

/// What a card does once generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardKind {
    Strike(BaseAttack),
    Stride,
    EndTurn,
}

/// A reusable action template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionCard {
    pub id: ActionCardId,
    pub name: String,
    pub card_type: ActionCardType,
    pub description: String,
    pub kind: CardKind,
    pub criteria: Vec<TargetCriterion>,
}

impl ActionCard {
    pub fn strike(attack: BaseAttack) -> Self {
        Self {
            id: ActionCardId::new(),
            name: format!("Strike ({})", attack.name),
            card_type: ActionCardType::OneAction,
            description: format!(
                "Make a melee strike with {} ({}) against a target within reach {}.",
                attack.name,
                attack.damage_notation(),
                attack.reach
            ),
            criteria: vec![TargetCriterion::IsAlive, TargetCriterion::Range(attack.reach)],
            kind: CardKind::Strike(attack),
        }
    }

    pub fn stride() -> Self {
        Self {
            id: ActionCardId::new(),
            name: "Stride".to_string(),
            card_type: ActionCardType::OneAction,
            description: "Move up to your speed toward a target.".to_string(),
            kind: CardKind::Stride,
            criteria: Vec::new(),
        }
    }

    pub fn end_turn() -> Self {
        Self {
            id: ActionCardId::new(),
            name: "End Turn".to_string(),
            card_type: ActionCardType::FreeAction,
            description: "Give up any remaining actions.".to_string(),
            kind: CardKind::EndTurn,
            criteria: Vec::new(),
        }
    }

    pub fn with_criteria(mut self, criteria: Vec<TargetCriterion>) -> Self {
        self.criteria = criteria;
        self
    }

    /// Validate `params` for `actor` and build the concrete action.
    pub fn generate(
        &self,
        state: &GameState,
        actor: EntityId,
        params: &ActionParams,
    ) -> Result<Action, ActionError> {
        let result = self.build(state, actor, params);
        if let Err(err) = &result {
            tracing::debug!(card = %self.name, %actor, ?params, "failed to generate action: {err}");
        }
        result
    }

    fn build(
        &self,
        state: &GameState,
        actor: EntityId,
        params: &ActionParams,
    ) -> Result<Action, ActionError> {
        let actor = state.entity(actor).ok_or(ActionError::ActorNotFound(actor))?;
        let cost = self.card_type.cost(params)?;

        let effect = match &self.kind {
            CardKind::Strike(attack) => ActionEffect::Strike {
                target: self.resolve_target(state, actor, params)?,
                attack: attack.clone(),
            },
            CardKind::Stride => {
                let toward = params.require_target()?;
                if state.entity(toward).is_none() {
                    return Err(ActionError::TargetNotFound(toward));
                }
                ActionEffect::Stride { toward }
            }
            CardKind::EndTurn => ActionEffect::EndTurn,
        };

        Ok(Action {
            name: self.name.clone(),
            card_type: self.card_type,
            cost,
            description: self.description.clone(),
            effect,
        })
    }

    fn resolve_target(
        &self,
        state: &GameState,
        actor: &Entity,
        params: &ActionParams,
    ) -> Result<EntityId, ActionError> {
        let target_id = params.require_target()?;
        let target = state
            .entity(target_id)
            .ok_or(ActionError::TargetNotFound(target_id))?;
        for criterion in &self.criteria {
            criterion.check(state, actor, target)?;
        }
        Ok(target.id)
    }
}

/// The state change an action performs when executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionEffect {
    Strike { target: EntityId, attack: BaseAttack },
    Stride { toward: EntityId },
    EndTurn,
}

/// One concrete, executable action. Consumed by execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    pub card_type: ActionCardType,
    pub cost: u8,
    pub description: String,
    pub effect: ActionEffect,
}

impl Action {
    /// Sentinel a controller returns when it has nothing left to do.
    pub fn end_turn() -> Self {
        Self {
            name: "End Turn".to_string(),
            card_type: ActionCardType::FreeAction,
            cost: 0,
            description: "Give up any remaining actions.".to_string(),
            effect: ActionEffect::EndTurn,
        }
    }

    pub fn is_end_turn(&self) -> bool {
        matches!(self.effect, ActionEffect::EndTurn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Position;
    use crate::testing::{goblin, warrior, TestHarness};

    #[test]
    fn test_fixed_costs() {
        let params = ActionParams::new();
        assert_eq!(ActionCardType::OneAction.cost(&params), Ok(1));
        assert_eq!(ActionCardType::TwoAction.cost(&params), Ok(2));
        assert_eq!(ActionCardType::ThreeAction.cost(&params), Ok(3));
        assert_eq!(ActionCardType::FreeAction.cost(&params), Ok(0));
    }

    #[test]
    fn test_variable_cost_is_validated() {
        let card_type = ActionCardType::VariableAction;
        assert_eq!(
            card_type.cost(&ActionParams::new()),
            Err(ActionError::MissingCost)
        );
        assert_eq!(card_type.cost(&ActionParams::new().with_cost(2)), Ok(2));
        assert_eq!(
            card_type.cost(&ActionParams::new().with_cost(4)),
            Err(ActionError::CostOutOfRange(4))
        );
    }

    #[test]
    fn test_params_from_json() {
        let id = EntityId::new();
        let json = format!(r#"{{"targetID": "{}", "action_cost": 2}}"#, id);
        let params = ActionParams::from_json(&json).unwrap();
        assert_eq!(params.target_id, Some(id));
        assert_eq!(params.action_cost, Some(2));

        // Wrong type and unknown fields are errors, not panics.
        assert!(ActionParams::from_json(r#"{"targetID": 7}"#).is_err());
        assert!(ActionParams::from_json(r#"{"target": "x"}"#).is_err());
        assert_eq!(ActionParams::from_json("{}").unwrap(), ActionParams::new());
    }

    #[test]
    fn test_strike_generation() {
        let harness = TestHarness::duel(
            warrior(),
            Position::new(0, 0),
            goblin(),
            Position::new(1, 0),
        );
        let state = &harness.state;
        let w = harness.first;
        let g = harness.second;
        let card = state.entity(w).unwrap().strike_cards().next().unwrap().clone();

        let action = card
            .generate(state, w, &ActionParams::targeting(g))
            .unwrap();
        assert_eq!(action.cost, 1);
        assert!(matches!(action.effect, ActionEffect::Strike { target, .. } if target == g));

        assert_eq!(
            card.generate(state, w, &ActionParams::new()),
            Err(ActionError::MissingParam("targetID"))
        );
        let ghost = EntityId::new();
        assert_eq!(
            card.generate(state, w, &ActionParams::targeting(ghost)),
            Err(ActionError::TargetNotFound(ghost))
        );
    }

    #[test]
    fn test_strike_out_of_range() {
        let harness = TestHarness::duel(
            warrior(),
            Position::new(0, 0),
            goblin(),
            Position::new(4, 0),
        );
        let state = &harness.state;
        let card = state
            .entity(harness.first)
            .unwrap()
            .strike_cards()
            .next()
            .unwrap()
            .clone();
        assert_eq!(
            card.generate(state, harness.first, &ActionParams::targeting(harness.second)),
            Err(ActionError::OutOfRange { distance: 4, max: 1 })
        );
    }

    #[test]
    fn test_strike_rejects_dead_target() {
        let mut harness = TestHarness::duel(
            warrior(),
            Position::new(0, 0),
            goblin(),
            Position::new(1, 1),
        );
        harness.entity_mut(harness.second).hp = 0;
        let state = &harness.state;
        let card = state
            .entity(harness.first)
            .unwrap()
            .strike_cards()
            .next()
            .unwrap()
            .clone();
        assert!(matches!(
            card.generate(state, harness.first, &ActionParams::targeting(harness.second)),
            Err(ActionError::TargetInvalid { .. })
        ));
    }

    #[test]
    fn test_is_enemy_criterion() {
        let harness = TestHarness::duel(
            warrior(),
            Position::new(0, 0),
            goblin(),
            Position::new(1, 0),
        );
        let state = &harness.state;
        let card = state
            .entity(harness.first)
            .unwrap()
            .strike_cards()
            .next()
            .unwrap()
            .clone()
            .with_criteria(vec![TargetCriterion::IsEnemy]);
        // A warrior may not strike itself under IsEnemy.
        assert!(matches!(
            card.generate(state, harness.first, &ActionParams::targeting(harness.first)),
            Err(ActionError::TargetInvalid { .. })
        ));
        assert!(card
            .generate(state, harness.first, &ActionParams::targeting(harness.second))
            .is_ok());
    }

    #[test]
    fn test_stride_and_end_turn_generation() {
        let harness = TestHarness::duel(
            warrior(),
            Position::new(0, 0),
            goblin(),
            Position::new(6, 6),
        );
        let state = &harness.state;

        let stride = ActionCard::stride();
        let action = stride
            .generate(state, harness.first, &ActionParams::targeting(harness.second))
            .unwrap();
        assert_eq!(
            action.effect,
            ActionEffect::Stride {
                toward: harness.second
            }
        );
        assert_eq!(
            stride.generate(state, harness.first, &ActionParams::new()),
            Err(ActionError::MissingParam("targetID"))
        );

        let end = ActionCard::end_turn()
            .generate(state, harness.first, &ActionParams::new())
            .unwrap();
        assert!(end.is_end_turn());
        assert_eq!(end.cost, 0);
    }
}
