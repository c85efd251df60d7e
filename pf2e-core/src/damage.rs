//! Damage records and their application.

use crate::entity::EntityRef;
use crate::state::{CombatError, GameState};
use crate::step::{Step, StepType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Physical damage types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DamageType {
    Bludgeoning,
    Piercing,
    Slashing,
}

impl DamageType {
    pub fn name(&self) -> &'static str {
        match self {
            DamageType::Bludgeoning => "bludgeoning",
            DamageType::Piercing => "piercing",
            DamageType::Slashing => "slashing",
        }
    }
}

impl fmt::Display for DamageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Damage on its way from `source` to `target`.
///
/// `blocked` is raised by BeforeDamage triggers and subtracted from every
/// component. `taken` is only meaningful once the damage has been dealt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Damage {
    pub source: EntityRef,
    pub target: EntityRef,
    pub amounts: BTreeMap<DamageType, i32>,
    pub blocked: i32,
    pub taken: i32,
}

impl Damage {
    pub fn new(source: EntityRef, target: EntityRef) -> Self {
        Self {
            source,
            target,
            amounts: BTreeMap::new(),
            blocked: 0,
            taken: 0,
        }
    }

    pub fn with(mut self, damage_type: DamageType, amount: i32) -> Self {
        let total = self.amounts.entry(damage_type).or_insert(0);
        *total = total.saturating_add(amount);
        self
    }

    /// Sum of all components before blocking.
    pub fn total(&self) -> i32 {
        self.amounts.values().fold(0i32, |acc, a| acc.saturating_add(*a))
    }

    /// What gets through after `blocked` is subtracted per component.
    pub fn after_block(&self) -> i32 {
        self.amounts
            .values()
            .map(|amount| amount.saturating_sub(self.blocked).max(0))
            .fold(0i32, |acc, a| acc.saturating_add(a))
    }
}

impl GameState {
    /// Run BeforeDamage triggers, reduce the target's HP, then run
    /// AfterDamage triggers. Returns the finalised record.
    pub fn deal(&mut self, damage: Damage) -> Result<Damage, CombatError> {
        let target = damage.target.id;
        self.require(target)?;

        let message = format!(
            "{} is about to take {} damage from {}",
            damage.target.name,
            damage.total(),
            damage.source.name
        );
        let mut damage = match self.emit(Step::BeforeDamage(damage), message) {
            Step::BeforeDamage(damage) => damage,
            other => {
                return Err(CombatError::StepReplaced {
                    expected: StepType::BeforeDamage,
                    found: other.step_type(),
                })
            }
        };

        damage.taken = damage.after_block();
        let hp = {
            let entity = self.require_mut(target)?;
            entity.take_damage(damage.taken);
            entity.hp
        };
        tracing::info!(
            target = %damage.target.name,
            total = damage.total(),
            blocked = damage.blocked,
            taken = damage.taken,
            hp,
            "damage dealt"
        );

        let message = format!(
            "{} takes {} damage ({} rolled, {} blocked) and is at {} HP",
            damage.target.name,
            damage.taken,
            damage.total(),
            damage.blocked,
            hp
        );
        self.emit(Step::AfterDamage(damage.clone()), message);
        Ok(damage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Position;
    use crate::testing::{goblin, warrior, TestHarness};
    use crate::trigger::ShieldBlock;

    fn harness() -> TestHarness {
        TestHarness::duel(
            warrior(),
            Position::new(0, 0),
            goblin(),
            Position::new(1, 0),
        )
    }

    #[test]
    fn test_block_applies_per_component() {
        let source = warrior().reference();
        let target = goblin().reference();
        let mut damage = Damage::new(source, target)
            .with(DamageType::Slashing, 6)
            .with(DamageType::Piercing, 2);
        assert_eq!(damage.total(), 8);
        damage.blocked = 3;
        assert_eq!(damage.after_block(), 3);
    }

    #[test]
    fn test_deal_reduces_hp() {
        let mut h = harness();
        let damage = Damage::new(h.entity(h.first).reference(), h.entity(h.second).reference())
            .with(DamageType::Slashing, 7);
        let dealt = h.state.deal(damage).unwrap();
        assert_eq!(dealt.taken, 7);
        assert_eq!(h.entity(h.second).hp, 13);
    }

    #[test]
    fn test_hp_never_negative() {
        let mut h = harness();
        let damage = Damage::new(h.entity(h.first).reference(), h.entity(h.second).reference())
            .with(DamageType::Bludgeoning, 500);
        h.state.deal(damage).unwrap();
        assert_eq!(h.entity(h.second).hp, 0);
        assert!(!h.entity(h.second).is_alive());
    }

    #[test]
    fn test_shield_block_uses_reaction_once() {
        let mut h = harness();
        h.state
            .register_trigger(ShieldBlock::new(h.second, 5), StepType::BeforeDamage);
        let hit = || {
            Damage::new(warrior().reference(), goblin().reference())
                .with(DamageType::Slashing, 8)
        };

        let mut first = hit();
        first.target.id = h.second;
        let dealt = h.state.deal(first).unwrap();
        assert_eq!(dealt.blocked, 5);
        assert_eq!(dealt.taken, 3);
        assert_eq!(h.entity(h.second).resources.reactions_remaining, 0);

        let mut second = hit();
        second.target.id = h.second;
        let dealt = h.state.deal(second).unwrap();
        assert_eq!(dealt.blocked, 0);
        assert_eq!(dealt.taken, 8);
        assert_eq!(h.entity(h.second).hp, 20 - 3 - 8);
    }

    #[test]
    fn test_history_records_blocked_value() {
        let mut h = harness();
        h.state
            .register_trigger(ShieldBlock::new(h.second, 5), StepType::BeforeDamage);
        let damage = Damage::new(h.entity(h.first).reference(), h.entity(h.second).reference())
            .with(DamageType::Slashing, 8);
        h.state.deal(damage).unwrap();

        let records = h.state.history().records();
        let before = records
            .iter()
            .find(|r| r.step_type == StepType::BeforeDamage)
            .unwrap();
        match &before.step {
            Step::BeforeDamage(damage) => assert_eq!(damage.blocked, 5),
            other => panic!("unexpected {other:?}"),
        }
        let after = records.last().unwrap();
        assert_eq!(after.step_type, StepType::AfterDamage);
        assert_eq!(after.metadata["taken"], 3);
    }

    #[test]
    fn test_log_matches_history_after_block() {
        let mut h = harness();
        h.state
            .register_trigger(ShieldBlock::new(h.second, 5), StepType::BeforeDamage);
        let damage = Damage::new(h.entity(h.first).reference(), h.entity(h.second).reference())
            .with(DamageType::Slashing, 8);
        let logged = h.state.logs().len();
        h.state.deal(damage).unwrap();

        let record = h
            .state
            .history()
            .records()
            .into_iter()
            .find(|r| r.step_type == StepType::BeforeDamage)
            .unwrap();
        let logs = &h.state.logs()[logged..];
        let entry = logs
            .iter()
            .find(|e| e.message == record.message)
            .expect("BeforeDamage is logged");
        assert_eq!(entry.metadata["blocked"], 5);
        assert_eq!(entry.metadata, record.metadata);
        // The step's own line comes before the shield's.
        assert_eq!(logs[0].message, record.message);
    }
}
