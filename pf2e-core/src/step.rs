//! Steps: the typed events combat is made of.
//!
//! Every state change the engine performs is announced as a [`Step`]. Steps
//! run through the trigger registry, then land in the append-only
//! [`StepHistory`]. Observers read the history through a [`StepFeed`].

use crate::attack::Attack;
use crate::damage::Damage;
use crate::entity::EntityRef;
use crate::grid::Position;
use crate::state::CombatOutcome;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

/// Tag identifying a kind of step. Triggers are registered per tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepType {
    CombatStarted,
    InitiativeRolled,
    InitiativeOrder,
    StartTurn,
    EndTurn,
    StartAction,
    EndAction,
    BeforeAttack,
    AfterAttack,
    BeforeDamage,
    AfterDamage,
    Moved,
    CombatOver,
}

impl StepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::CombatStarted => "COMBAT_STARTED",
            StepType::InitiativeRolled => "INITIATIVE_ROLLED",
            StepType::InitiativeOrder => "INITIATIVE_ORDER",
            StepType::StartTurn => "START_TURN",
            StepType::EndTurn => "END_TURN",
            StepType::StartAction => "START_ACTION",
            StepType::EndAction => "END_ACTION",
            StepType::BeforeAttack => "BEFORE_ATTACK",
            StepType::AfterAttack => "AFTER_ATTACK",
            StepType::BeforeDamage => "BEFORE_DAMAGE",
            StepType::AfterDamage => "AFTER_DAMAGE",
            StepType::Moved => "MOVED",
            StepType::CombatOver => "COMBAT_OVER",
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One event of combat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Step {
    CombatStarted {
        combatants: Vec<EntityRef>,
    },
    InitiativeRolled {
        entity: EntityRef,
        roll: u32,
    },
    InitiativeOrder {
        order: Vec<EntityRef>,
    },
    StartTurn {
        entity: EntityRef,
        round: u32,
    },
    EndTurn {
        entity: EntityRef,
        round: u32,
    },
    StartAction {
        entity: EntityRef,
        action: String,
        cost: u8,
    },
    EndAction {
        entity: EntityRef,
        action: String,
    },
    BeforeAttack(Attack),
    AfterAttack(Attack),
    BeforeDamage(Damage),
    AfterDamage(Damage),
    Moved {
        entity: EntityRef,
        from: Position,
        to: Position,
    },
    CombatOver {
        outcome: CombatOutcome,
    },
}

impl Step {
    pub fn step_type(&self) -> StepType {
        match self {
            Step::CombatStarted { .. } => StepType::CombatStarted,
            Step::InitiativeRolled { .. } => StepType::InitiativeRolled,
            Step::InitiativeOrder { .. } => StepType::InitiativeOrder,
            Step::StartTurn { .. } => StepType::StartTurn,
            Step::EndTurn { .. } => StepType::EndTurn,
            Step::StartAction { .. } => StepType::StartAction,
            Step::EndAction { .. } => StepType::EndAction,
            Step::BeforeAttack(_) => StepType::BeforeAttack,
            Step::AfterAttack(_) => StepType::AfterAttack,
            Step::BeforeDamage(_) => StepType::BeforeDamage,
            Step::AfterDamage(_) => StepType::AfterDamage,
            Step::Moved { .. } => StepType::Moved,
            Step::CombatOver { .. } => StepType::CombatOver,
        }
    }

    /// Flat key/value view used by log lines and the feed.
    pub fn metadata(&self) -> Map<String, Value> {
        let value = match self {
            Step::CombatStarted { combatants } => json!({
                "combatants": names(combatants),
            }),
            Step::InitiativeRolled { entity, roll } => json!({
                "entity": entity.name,
                "entityID": entity.id,
                "roll": roll,
            }),
            Step::InitiativeOrder { order } => json!({
                "order": names(order),
            }),
            Step::StartTurn { entity, round } | Step::EndTurn { entity, round } => json!({
                "entity": entity.name,
                "entityID": entity.id,
                "round": round,
            }),
            Step::StartAction {
                entity,
                action,
                cost,
            } => json!({
                "entity": entity.name,
                "action": action,
                "cost": cost,
            }),
            Step::EndAction { entity, action } => json!({
                "entity": entity.name,
                "action": action,
            }),
            Step::BeforeAttack(attack) | Step::AfterAttack(attack) => json!({
                "attacker": attack.attacker.name,
                "defender": attack.defender.name,
                "roll": attack.roll,
                "bonus": attack.bonus,
                "result": attack.result,
                "dc": attack.dc,
                "degree": attack.degree.name(),
            }),
            Step::BeforeDamage(damage) | Step::AfterDamage(damage) => json!({
                "source": damage.source.name,
                "target": damage.target.name,
                "amounts": damage.amounts,
                "total": damage.total(),
                "blocked": damage.blocked,
                "taken": damage.taken,
            }),
            Step::Moved { entity, from, to } => json!({
                "entity": entity.name,
                "from": [from.x, from.y],
                "to": [to.x, to.y],
            }),
            Step::CombatOver { outcome } => json!({
                "outcome": outcome.label(),
                "winners": names(outcome.survivors()),
            }),
        };
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

fn names(entities: &[EntityRef]) -> Vec<&str> {
    entities.iter().map(|e| e.name.as_str()).collect()
}

/// A step as stored in the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub index: usize,
    pub step_type: StepType,
    pub message: String,
    pub metadata: Map<String, Value>,
    pub step: Step,
}

/// Append-only step log owned by the game state.
///
/// Records are visible to every [`StepFeed`] cloned from this history and
/// are broadcast to subscribers as they are appended.
#[derive(Debug, Clone)]
pub struct StepHistory {
    records: Arc<RwLock<Vec<StepRecord>>>,
    events: broadcast::Sender<StepRecord>,
}

impl StepHistory {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
            events,
        }
    }

    pub(crate) fn record(&self, step: Step, message: String) -> usize {
        let mut records = self
            .records
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let record = StepRecord {
            index: records.len(),
            step_type: step.step_type(),
            metadata: step.metadata(),
            message,
            step,
        };
        let index = record.index;
        records.push(record.clone());
        drop(records);
        // No subscribers is fine.
        let _ = self.events.send(record);
        index
    }

    pub fn len(&self) -> usize {
        self.feed().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn records(&self) -> Vec<StepRecord> {
        self.feed().page(0, usize::MAX)
    }

    /// Read-only view for observers.
    pub fn feed(&self) -> StepFeed {
        StepFeed {
            records: Arc::clone(&self.records),
            events: self.events.clone(),
        }
    }
}

impl Default for StepHistory {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Read side of a [`StepHistory`].
#[derive(Debug, Clone)]
pub struct StepFeed {
    records: Arc<RwLock<Vec<StepRecord>>>,
    events: broadcast::Sender<StepRecord>,
}

impl StepFeed {
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Up to `limit` records starting at `offset`.
    pub fn page(&self, offset: usize, limit: usize) -> Vec<StepRecord> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records.iter().skip(offset).take(limit).cloned().collect()
    }

    /// Records appended from now on. Slow receivers see `Lagged` and can
    /// catch up with [`page`](Self::page).
    pub fn subscribe(&self) -> broadcast::Receiver<StepRecord> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityId;

    fn someone(name: &str) -> EntityRef {
        EntityRef {
            id: EntityId::new(),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_serialized_tag() {
        let step = Step::StartTurn {
            entity: someone("Warrior"),
            round: 2,
        };
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["type"], "START_TURN");
        assert_eq!(json["data"]["round"], 2);
        assert_eq!(step.step_type().to_string(), "START_TURN");
        let back: Step = serde_json::from_value(json).unwrap();
        assert_eq!(back, step);
    }

    #[test]
    fn test_metadata() {
        let step = Step::Moved {
            entity: someone("Goblin"),
            from: Position::new(1, 1),
            to: Position::new(2, 3),
        };
        let meta = step.metadata();
        assert_eq!(meta["entity"], "Goblin");
        assert_eq!(meta["to"], json!([2, 3]));
    }

    #[test]
    fn test_history_paging() {
        let history = StepHistory::new(8);
        let feed = history.feed();
        for round in 1..=5 {
            history.record(
                Step::StartTurn {
                    entity: someone("Warrior"),
                    round,
                },
                format!("round {round}"),
            );
        }
        assert_eq!(feed.len(), 5);
        let page = feed.page(1, 2);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].index, 1);
        assert_eq!(page[1].message, "round 3");
        assert!(feed.page(10, 3).is_empty());
    }

    #[tokio::test]
    async fn test_subscribers_see_new_records() {
        let history = StepHistory::new(8);
        let mut rx = history.feed().subscribe();
        history.record(
            Step::InitiativeOrder {
                order: vec![someone("Goblin")],
            },
            "order".to_string(),
        );
        let record = rx.recv().await.unwrap();
        assert_eq!(record.index, 0);
        assert_eq!(record.step_type, StepType::InitiativeOrder);
    }
}
