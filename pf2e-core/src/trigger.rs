//! Triggers: reactive effects that intercept steps.
//!
//! A trigger is registered for one [`StepType`]. When a step of that type is
//! emitted, every matching trigger whose condition holds gets to mutate the
//! step before it is recorded. Higher priority runs first; equal priorities
//! run in registration order.

use crate::entity::{Entity, EntityId};
use crate::state::LogEntry;
use crate::step::{Step, StepType};
use serde_json::json;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A reactive effect.
pub trait Trigger: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn priority(&self) -> i32 {
        0
    }

    fn condition(&self, step: &Step) -> bool;

    fn execute(&self, step: &mut Step, ctx: &mut TriggerContext<'_>);
}

/// What a trigger may touch while it runs: read entities, spend a
/// reaction, write to the combat log.
pub struct TriggerContext<'a> {
    entities: &'a mut [Entity],
    logs: &'a mut Vec<LogEntry>,
}

impl<'a> TriggerContext<'a> {
    pub(crate) fn new(entities: &'a mut [Entity], logs: &'a mut Vec<LogEntry>) -> Self {
        Self { entities, logs }
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    /// Spend one of `id`'s reactions. False if it has none left.
    pub fn use_reaction(&mut self, id: EntityId) -> bool {
        self.entities
            .iter_mut()
            .find(|e| e.id == id)
            .map(|e| e.resources.use_reaction())
            .unwrap_or(false)
    }

    pub fn log(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("{message}");
        self.logs.push(LogEntry::new(message));
    }
}

/// Per-encounter trigger table.
#[derive(Debug, Clone, Default)]
pub struct TriggerRegistry {
    triggers: HashMap<StepType, Vec<Arc<dyn Trigger>>>,
}

impl TriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, trigger: impl Trigger + 'static, step_type: StepType) {
        self.register_shared(Arc::new(trigger), step_type);
    }

    pub fn register_shared(&mut self, trigger: Arc<dyn Trigger>, step_type: StepType) {
        tracing::debug!(trigger = trigger.name(), %step_type, "trigger registered");
        self.triggers.entry(step_type).or_default().push(trigger);
    }

    /// Triggers for `step_type`, highest priority first.
    pub fn ordered(&self, step_type: StepType) -> Vec<Arc<dyn Trigger>> {
        let mut triggers = self.triggers.get(&step_type).cloned().unwrap_or_default();
        // Stable: ties keep registration order.
        triggers.sort_by_key(|t| Reverse(t.priority()));
        triggers
    }

    pub fn len(&self) -> usize {
        self.triggers.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Raise a shield to soak damage aimed at the owner. Costs a reaction.
#[derive(Debug, Clone)]
pub struct ShieldBlock {
    pub owner: EntityId,
    pub block: i32,
}

impl ShieldBlock {
    pub const DEFAULT_BLOCK: i32 = 5;

    pub fn new(owner: EntityId, block: i32) -> Self {
        Self { owner, block }
    }
}

impl Trigger for ShieldBlock {
    fn name(&self) -> &str {
        "Shield Block"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn condition(&self, step: &Step) -> bool {
        matches!(step, Step::BeforeDamage(damage) if damage.target.id == self.owner)
    }

    fn execute(&self, step: &mut Step, ctx: &mut TriggerContext<'_>) {
        let Step::BeforeDamage(damage) = step else {
            return;
        };
        let owner = ctx
            .entity(self.owner)
            .map(|e| e.name.clone())
            .unwrap_or_else(|| self.owner.to_string());

        if !ctx.use_reaction(self.owner) {
            tracing::warn!(%owner, "shield block skipped: no reaction left");
            ctx.log(format!("{owner} has no reaction left to Shield Block"));
            return;
        }

        damage.blocked = damage.blocked.saturating_add(self.block);
        let message = format!("{owner} raises a shield and blocks {} damage", self.block);
        tracing::info!(%owner, block = self.block, "shield block");
        ctx.logs.push(LogEntry::with_metadata(
            message,
            json!({ "trigger": self.name(), "owner": owner, "blocked": damage.blocked }),
        ));
    }
}
