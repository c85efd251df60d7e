//! Commands submitted on behalf of externally controlled entities.

use crate::action::{Action, ActionCardId, ActionError, ActionParams};
use crate::entity::EntityId;
use crate::state::GameState;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;

/// Why a command was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("entity {0} not found")]
    EntityNotFound(EntityId),
    #[error("it is not entity {0}'s turn")]
    NotEntityTurn(EntityId),
    #[error("entity {0} is not externally controlled")]
    NotExternallyControlled(EntityId),
    #[error("action card {0} not found")]
    ActionCardNotFound(ActionCardId),
    #[error("failed to generate action: {0}")]
    ActionGenerationFailed(#[from] ActionError),
    #[error("not enough actions (needs {needed}, has {remaining})")]
    InsufficientActions { needed: u8, remaining: u8 },
    #[error("a command is already waiting to be processed")]
    QueueFull,
    #[error("combat is closed")]
    CombatClosed,
}

/// "Entity X plays card Y with these params."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    #[serde(rename = "entityID")]
    pub entity_id: EntityId,
    #[serde(rename = "actionCardID")]
    pub card_id: ActionCardId,
    #[serde(default)]
    pub params: ActionParams,
}

impl Command {
    pub fn new(entity_id: EntityId, card_id: ActionCardId, params: ActionParams) -> Self {
        Self {
            entity_id,
            card_id,
            params,
        }
    }

    /// Validate against the live state while `acting` holds the turn.
    pub fn resolve(&self, state: &GameState, acting: EntityId) -> Result<Action, CommandError> {
        let entity = state
            .entity(self.entity_id)
            .ok_or(CommandError::EntityNotFound(self.entity_id))?;
        if self.entity_id != acting {
            return Err(CommandError::NotEntityTurn(self.entity_id));
        }
        let card = entity
            .card(self.card_id)
            .ok_or(CommandError::ActionCardNotFound(self.card_id))?;
        let action = card.generate(state, self.entity_id, &self.params)?;

        let remaining = entity.resources.actions_remaining;
        if action.cost > remaining {
            return Err(CommandError::InsufficientActions {
                needed: action.cost,
                remaining,
            });
        }
        Ok(action)
    }
}

/// A command travelling to the driver with its reply slot.
#[derive(Debug)]
pub struct Envelope {
    pub command: Command,
    pub reply: oneshot::Sender<Result<(), CommandError>>,
}

impl Envelope {
    pub fn new(command: Command) -> (Self, oneshot::Receiver<Result<(), CommandError>>) {
        let (reply, rx) = oneshot::channel();
        (Self { command, reply }, rx)
    }
}
