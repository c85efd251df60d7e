//! Strikes: the attack roll, its degree of success, and the damage it sets
//! in motion.

use crate::damage::{Damage, DamageType};
use crate::degree::DegreeOfSuccess;
use crate::dice::DiceExpression;
use crate::entity::{EntityId, EntityRef};
use crate::state::{CombatError, GameState};
use crate::step::{Step, StepType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One typed slice of a weapon's damage, e.g. `1d8+3` slashing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageComponent {
    pub dice: DiceExpression,
    pub damage_type: DamageType,
}

impl DamageComponent {
    pub fn new(dice: DiceExpression, damage_type: DamageType) -> Self {
        Self { dice, damage_type }
    }
}

/// A weapon or natural attack as printed on a stat block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseAttack {
    pub name: String,
    pub damage: Vec<DamageComponent>,
    /// Squares; 1 means adjacent only.
    #[serde(default = "default_reach")]
    pub reach: i32,
}

fn default_reach() -> i32 {
    1
}

impl BaseAttack {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            damage: Vec::new(),
            reach: default_reach(),
        }
    }

    pub fn with_damage(mut self, dice: DiceExpression, damage_type: DamageType) -> Self {
        self.damage.push(DamageComponent::new(dice, damage_type));
        self
    }

    pub fn with_reach(mut self, reach: i32) -> Self {
        self.reach = reach.max(1);
        self
    }

    /// `1d8+3 slashing + 1d4 piercing`
    pub fn damage_notation(&self) -> String {
        self.damage
            .iter()
            .map(|c| format!("{} {}", c.dice, c.damage_type))
            .collect::<Vec<_>>()
            .join(" + ")
    }
}

/// The record of one attack roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attack {
    pub attacker: EntityRef,
    pub defender: EntityRef,
    /// Natural d20 face.
    pub roll: u32,
    /// Attack bonus including the multiple attack penalty.
    pub bonus: i32,
    pub result: i32,
    /// The defender's AC.
    pub dc: i32,
    pub degree: DegreeOfSuccess,
}

/// How a strike went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttackOutcome {
    /// Defender out of reach; nothing was rolled or changed.
    OutOfReach { distance: i32 },
    Resolved {
        attack: Attack,
        damage: Option<Damage>,
    },
}

impl AttackOutcome {
    pub fn damage_taken(&self) -> i32 {
        match self {
            AttackOutcome::Resolved {
                damage: Some(damage),
                ..
            } => damage.taken,
            _ => 0,
        }
    }
}

impl GameState {
    /// Resolve one strike from `attacker` against `defender`.
    ///
    /// Emits BeforeAttack, deals damage on a hit, emits AfterAttack and
    /// advances the attacker's multiple attack penalty.
    pub fn perform_attack(
        &mut self,
        base: &BaseAttack,
        attacker: EntityId,
        defender: EntityId,
    ) -> Result<AttackOutcome, CombatError> {
        let from = self.placed_at(attacker)?;
        let to = self.placed_at(defender)?;
        let (attacker_ref, bonus) = {
            let a = self.require(attacker)?;
            (
                a.reference(),
                a.attack_bonus.saturating_add(a.resources.attack_penalty()),
            )
        };
        let (defender_ref, dc) = {
            let d = self.require(defender)?;
            (d.reference(), d.ac)
        };

        let distance = self.grid().distance(from, to);
        let within_reach =
            self.grid().adjacent(from, to) || (base.reach > 1 && distance <= base.reach);
        if !within_reach {
            self.log(format!(
                "{} cannot reach {} with {} (distance {})",
                attacker_ref.name, defender_ref.name, base.name, distance
            ));
            return Ok(AttackOutcome::OutOfReach { distance });
        }

        let roll = self.dice_mut().d20();
        let degree = DegreeOfSuccess::resolve(roll, bonus, dc);
        let attack = Attack {
            attacker: attacker_ref.clone(),
            defender: defender_ref.clone(),
            roll,
            bonus,
            result: (roll as i32).saturating_add(bonus),
            dc,
            degree,
        };

        let message = format!(
            "{} attacks {} with {}: {} {:+} = {} vs AC {} ({})",
            attack.attacker.name,
            attack.defender.name,
            base.name,
            roll,
            bonus,
            attack.result,
            dc,
            degree
        );
        tracing::info!(attacker = %attacker_ref.name, defender = %defender_ref.name, roll, bonus, %degree, "attack");
        let attack = match self.emit(Step::BeforeAttack(attack), message) {
            Step::BeforeAttack(attack) => attack,
            other => {
                return Err(CombatError::StepReplaced {
                    expected: StepType::BeforeAttack,
                    found: other.step_type(),
                })
            }
        };

        let damage = if attack.degree.is_success() {
            let critical = attack.degree == DegreeOfSuccess::CriticalSuccess;
            let mut damage = Damage::new(attacker_ref, defender_ref);
            damage.amounts = self.roll_damage(base, critical);
            Some(self.deal(damage)?)
        } else {
            None
        };

        let message = format!(
            "{}'s attack on {} resolved: {}",
            attack.attacker.name, attack.defender.name, attack.degree
        );
        self.emit(Step::AfterAttack(attack.clone()), message);

        if let Some(entity) = self.entity_mut(attacker) {
            entity.resources.map_counter = entity.resources.map_counter.saturating_add(1);
        }

        Ok(AttackOutcome::Resolved { attack, damage })
    }

    /// Roll every component; a critical doubles each rolled total.
    fn roll_damage(&mut self, base: &BaseAttack, critical: bool) -> BTreeMap<DamageType, i32> {
        let multiplier = if critical { 2 } else { 1 };
        let mut amounts = BTreeMap::new();
        for component in &base.damage {
            let rolled = component.dice.roll(self.dice_mut());
            tracing::debug!(dice = %component.dice, result = %rolled, critical, "damage roll");
            let amount = amounts.entry(component.damage_type).or_insert(0i32);
            *amount = amount.saturating_add(rolled.total.max(0).saturating_mul(multiplier));
        }
        amounts
    }
}
