//! Turn-based tactical combat engine with PF2e-style rules.
//!
//! This crate provides:
//! - d20 checks with four degrees of success
//! - A square grid with alternating diagonal movement cost
//! - The three-action economy and the multiple attack penalty
//! - Action cards, strikes, damage and reactive triggers
//! - AI and externally driven controllers
//!
//! # Quick Start
//!
//! ```no_run
//! use pf2e_core::{CombatConfig, CombatSession, EncounterBlueprint};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let blueprint = EncounterBlueprint::demo();
//!     let config = CombatConfig::new().with_seed(42);
//!
//!     let (mut session, handle) = CombatSession::new(&blueprint, &config)?;
//!     let outcome = session.run().await?;
//!
//!     for record in handle.feed().page(0, usize::MAX) {
//!         println!("{}", record.message);
//!     }
//!     println!("{outcome}");
//!     Ok(())
//! }
//! ```

pub mod action;
pub mod attack;
pub mod command;
pub mod config;
pub mod controller;
pub mod damage;
pub mod degree;
pub mod dice;
pub mod encounter;
pub mod entity;
pub mod grid;
pub mod session;
pub mod snapshot;
pub mod state;
pub mod step;
pub mod testing;
pub mod trigger;

// Primary public API
pub use action::{
    Action, ActionCard, ActionCardId, ActionCardType, ActionEffect, ActionError, ActionParams,
    CardKind, TargetCriterion,
};
pub use attack::{Attack, AttackOutcome, BaseAttack, DamageComponent};
pub use command::{Command, CommandError};
pub use config::{CombatConfig, ConfigError};
pub use controller::{AiController, Controller, ControllerKind, ExternalController};
pub use damage::{Damage, DamageType};
pub use degree::DegreeOfSuccess;
pub use dice::{Dice, DiceError, DiceExpression, DieType, RollResult};
pub use encounter::{EncounterBlueprint, EncounterError, EntityTemplate, Spawn};
pub use entity::{Entity, EntityId, EntityRef, Faction, Resources};
pub use grid::{Grid, Position};
pub use session::{CombatHandle, CombatSession};
pub use snapshot::{ActionCardRef, EntitySnapshot, Snapshot};
pub use state::{CombatError, CombatOutcome, GameState, LogEntry};
pub use step::{Step, StepFeed, StepHistory, StepRecord, StepType};
pub use testing::TestHarness;
pub use trigger::{ShieldBlock, Trigger, TriggerContext, TriggerRegistry};
