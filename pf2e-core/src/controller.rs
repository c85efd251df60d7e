//! Controllers decide what an entity does on its turn.
//!
//! The AI picks greedily from the entity's own cards. An external controller
//! waits for commands submitted through a
//! [`CombatHandle`](crate::session::CombatHandle).

use crate::action::{Action, ActionParams};
use crate::command::{CommandError, Envelope};
use crate::entity::{Entity, EntityId};
use crate::state::GameState;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Capacity of the external command queue.
pub const COMMAND_QUEUE_CAPACITY: usize = 1;

/// Which controller a template asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerKind {
    #[default]
    Ai,
    External,
}

#[derive(Debug, Clone)]
pub enum Controller {
    Ai(AiController),
    External(ExternalController),
}

impl Default for Controller {
    fn default() -> Self {
        Controller::Ai(AiController)
    }
}

impl Controller {
    pub fn kind(&self) -> ControllerKind {
        match self {
            Controller::Ai(_) => ControllerKind::Ai,
            Controller::External(_) => ControllerKind::External,
        }
    }

    /// The next action for `actor`. [`Action::end_turn`] ends the turn.
    pub async fn next_action(&self, state: &GameState, actor: EntityId) -> Action {
        match self {
            Controller::Ai(ai) => ai.decide(state, actor),
            Controller::External(external) => external.next_action(state, actor).await,
        }
    }
}

// ============================================================================
// AI
// ============================================================================

/// Close in on the nearest enemy and hit it.
#[derive(Debug, Clone, Copy, Default)]
pub struct AiController;

impl AiController {
    pub fn decide(&self, state: &GameState, actor: EntityId) -> Action {
        let Some(entity) = state.entity(actor) else {
            return Action::end_turn();
        };
        if entity.resources.actions_remaining == 0 {
            return Action::end_turn();
        }
        let Some(target) = Self::nearest_enemy(state, entity) else {
            tracing::debug!(actor = %entity.name, "no enemies left to target");
            return Action::end_turn();
        };

        let grid = state.grid();
        let here = grid.position_of(actor);
        let there = grid.position_of(target.id);
        let params = ActionParams::targeting(target.id);

        if !grid.adjacent(here, there) {
            let can_close = grid.best_move_toward(here, there, entity.speed) != here;
            if let (true, Some(card)) = (can_close, entity.stride_card()) {
                if let Ok(action) = card.generate(state, actor, &params) {
                    tracing::debug!(actor = %entity.name, target = %target.name, "AI strides");
                    return action;
                }
            }
        }

        for card in entity.strike_cards() {
            if let Ok(action) = card.generate(state, actor, &params) {
                tracing::debug!(actor = %entity.name, target = %target.name, card = %card.name, "AI strikes");
                return action;
            }
        }

        tracing::debug!(actor = %entity.name, "AI has nothing useful to do");
        Action::end_turn()
    }

    /// Closest living entity of another faction. Ties go to whoever comes
    /// first in initiative order.
    fn nearest_enemy<'a>(state: &'a GameState, entity: &Entity) -> Option<&'a Entity> {
        let grid = state.grid();
        let here = grid.position_of(entity.id);
        let mut best: Option<(&Entity, i32)> = None;
        for other in state.entities() {
            if other.id == entity.id || !other.is_alive() || other.faction == entity.faction {
                continue;
            }
            let there = grid.position_of(other.id);
            if !there.is_valid() {
                continue;
            }
            let distance = grid.distance(here, there);
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((other, distance));
            }
        }
        best.map(|(e, _)| e)
    }
}

// ============================================================================
// External
// ============================================================================

/// Driver side of the external command queue.
///
/// Clones share the same queue, so one controller can serve every
/// externally-driven entity in an encounter.
#[derive(Debug, Clone)]
pub struct ExternalController {
    commands: Arc<Mutex<mpsc::Receiver<Envelope>>>,
}

impl ExternalController {
    /// A controller plus the sender that feeds it.
    pub fn channel() -> (Self, mpsc::Sender<Envelope>) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        (
            Self {
                commands: Arc::new(Mutex::new(rx)),
            },
            tx,
        )
    }

    /// Wait for a valid command for `actor`.
    ///
    /// Invalid commands are answered with their error and the wait goes on.
    /// A closed queue forfeits the turn.
    pub async fn next_action(&self, state: &GameState, actor: EntityId) -> Action {
        let mut commands = self.commands.lock().await;
        loop {
            let Some(envelope) = commands.recv().await else {
                tracing::warn!(%actor, "command queue closed, ending turn");
                return Action::end_turn();
            };
            match envelope.command.resolve(state, actor) {
                Ok(action) => {
                    tracing::debug!(%actor, action = %action.name, "command accepted");
                    let _ = envelope.reply.send(Ok(()));
                    return action;
                }
                Err(err) => {
                    tracing::warn!(%actor, "command rejected: {err}");
                    let _ = envelope.reply.send(Err(err));
                }
            }
        }
    }

    /// Stop accepting commands and fail anything still queued.
    pub async fn close(&self) {
        let mut commands = self.commands.lock().await;
        commands.close();
        while let Ok(envelope) = commands.try_recv() {
            let _ = envelope.reply.send(Err(CommandError::CombatClosed));
        }
    }
}
