//! CombatSession - runs an encounter from first turn to last.
//!
//! The session owns the authoritative [`GameState`] and is the only thing
//! that mutates it. Everything outside talks to it through a
//! [`CombatHandle`]: commands for externally controlled entities go in,
//! snapshots and the step feed come out.

use crate::action::{ActionCardId, ActionParams};
use crate::command::{Command, CommandError, Envelope};
use crate::config::CombatConfig;
use crate::controller::{ControllerKind, ExternalController};
use crate::dice::Dice;
use crate::encounter::{EncounterBlueprint, EncounterError};
use crate::entity::EntityId;
use crate::snapshot::Snapshot;
use crate::state::{CombatError, CombatOutcome, GameState};
use crate::step::StepFeed;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};

/// The combat driver.
#[derive(Debug)]
pub struct CombatSession {
    state: GameState,
    external: ExternalController,
    snapshot: watch::Sender<Snapshot>,
}

impl CombatSession {
    /// Build the encounter and hand back the session plus a handle for
    /// observers and external controllers.
    pub fn new(
        blueprint: &EncounterBlueprint,
        config: &CombatConfig,
    ) -> Result<(Self, CombatHandle), EncounterError> {
        Self::with_dice(blueprint, config, config.dice())
    }

    /// As [`new`](Self::new) with a specific dice source.
    pub fn with_dice(
        blueprint: &EncounterBlueprint,
        config: &CombatConfig,
        dice: Dice,
    ) -> Result<(Self, CombatHandle), EncounterError> {
        let (external, commands) = ExternalController::channel();
        let state = blueprint.build_with(config, dice, Some(&external))?;
        let (snapshot, snapshot_rx) = watch::channel(Snapshot::capture(&state));
        let handle = CombatHandle {
            commands,
            snapshot: snapshot_rx,
            feed: state.feed(),
        };
        Ok((
            Self {
                state,
                external,
                snapshot,
            },
            handle,
        ))
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn into_state(self) -> GameState {
        self.state
    }

    /// Play turns until the encounter ends.
    ///
    /// Queued and later commands are refused with
    /// [`CommandError::CombatClosed`] once this returns.
    pub async fn run(&mut self) -> Result<CombatOutcome, CombatError> {
        let result = self.drive().await;
        if let Err(err) = &result {
            tracing::error!("combat aborted: {err}");
        }
        self.external.close().await;
        self.publish();
        result
    }

    async fn drive(&mut self) -> Result<CombatOutcome, CombatError> {
        loop {
            if let Some(outcome) = self.state.outcome() {
                return Ok(outcome.clone());
            }
            self.play_turn().await?;
        }
    }

    /// Play the current entity's turn.
    pub async fn play_turn(&mut self) -> Result<(), CombatError> {
        let actor = self.state.start_turn()?;
        self.publish();

        loop {
            let entity = self
                .state
                .entity(actor)
                .ok_or(CombatError::UnknownEntity(actor))?;
            if entity.resources.actions_remaining == 0 {
                break;
            }
            // Cloned so the controller can borrow the state it lives in.
            let controller = entity.controller.clone();
            let action = controller.next_action(&self.state, actor).await;
            if action.is_end_turn() {
                break;
            }
            if !self.state.execute_action(actor, &action)? {
                tracing::debug!(%actor, action = %action.name, "unaffordable action ends the turn");
                break;
            }
            self.publish();
            if self.state.is_decided() {
                break;
            }
        }

        self.state.end_turn()?;
        self.publish();
        Ok(())
    }

    fn publish(&self) {
        self.snapshot.send_replace(Snapshot::capture(&self.state));
    }
}

/// Caller side of a running session. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CombatHandle {
    commands: mpsc::Sender<Envelope>,
    snapshot: watch::Receiver<Snapshot>,
    feed: StepFeed,
}

impl CombatHandle {
    /// The latest published snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    pub fn feed(&self) -> &StepFeed {
        &self.feed
    }

    /// True while a command is waiting for the driver.
    pub fn queue_is_full(&self) -> bool {
        self.commands.capacity() == 0
    }

    /// Play `card_id` for `entity_id`. Resolves once the driver has accepted
    /// or refused the command.
    pub async fn submit_action(
        &self,
        entity_id: EntityId,
        card_id: ActionCardId,
        params: ActionParams,
    ) -> Result<(), CommandError> {
        self.submit(Command::new(entity_id, card_id, params)).await
    }

    pub async fn submit(&self, command: Command) -> Result<(), CommandError> {
        self.precheck(command.entity_id)?;

        let (envelope, reply) = Envelope::new(command);
        self.commands.try_send(envelope).map_err(|err| match err {
            TrySendError::Full(_) => CommandError::QueueFull,
            TrySendError::Closed(_) => CommandError::CombatClosed,
        })?;
        reply.await.map_err(|_| CommandError::CombatClosed)?
    }

    /// Cheap rejection against the last snapshot. The driver re-validates
    /// against live state.
    fn precheck(&self, entity_id: EntityId) -> Result<(), CommandError> {
        let snapshot = self.snapshot.borrow();
        let entity = snapshot
            .entity(entity_id)
            .ok_or(CommandError::EntityNotFound(entity_id))?;
        if snapshot.combat_over {
            return Err(CommandError::CombatClosed);
        }
        if snapshot.current_turn != Some(entity_id) {
            return Err(CommandError::NotEntityTurn(entity_id));
        }
        if entity.controller != ControllerKind::External {
            return Err(CommandError::NotExternallyControlled(entity_id));
        }
        Ok(())
    }

    /// Wait until `entity_id` holds the turn.
    pub async fn wait_for_turn(&mut self, entity_id: EntityId) -> Result<Snapshot, CommandError> {
        loop {
            {
                let snapshot = self.snapshot.borrow_and_update();
                if snapshot.combat_over {
                    return Err(CommandError::CombatClosed);
                }
                if snapshot.current_turn == Some(entity_id) {
                    return Ok(snapshot.clone());
                }
            }
            self.snapshot
                .changed()
                .await
                .map_err(|_| CommandError::CombatClosed)?;
        }
    }

    /// Wait for the final snapshot.
    pub async fn wait_for_end(&mut self) -> Snapshot {
        loop {
            {
                let snapshot = self.snapshot.borrow_and_update();
                if snapshot.combat_over {
                    return snapshot.clone();
                }
            }
            if self.snapshot.changed().await.is_err() {
                return self.snapshot.borrow().clone();
            }
        }
    }
}
