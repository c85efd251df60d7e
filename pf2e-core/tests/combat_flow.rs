//! End-to-end combat flow with AI controllers on both sides.
//!
//! Run with: `cargo test -p pf2e-core --test combat_flow`

use pf2e_core::testing::{assert_well_formed, goblin, warrior};
use pf2e_core::{
    CombatConfig, CombatOutcome, CombatSession, Dice, EncounterBlueprint, Faction, Position,
    Spawn, Step, StepType,
};

fn duel_apart() -> EncounterBlueprint {
    EncounterBlueprint::new(10, 10)
        .with_spawn(Spawn::new(warrior(), Position::new(0, 0)))
        .with_spawn(Spawn::new(goblin(), Position::new(7, 6)))
}

// =============================================================================
// Warrior vs Goblin
// =============================================================================

#[tokio::test]
async fn test_seeded_duel_has_one_survivor() {
    for seed in 0..12 {
        let blueprint = duel_apart();
        let config = CombatConfig::new().with_seed(seed);
        let (mut session, handle) =
            CombatSession::new(&blueprint, &config).expect("blueprint should build");

        let outcome = session.run().await.expect("combat should not abort");
        let survivors = outcome.survivors();
        assert_eq!(survivors.len(), 1, "seed {seed}: {outcome}");

        let state = session.state();
        let loser = state
            .entities()
            .iter()
            .find(|e| e.id != survivors[0].id)
            .expect("two combatants");
        assert_eq!(loser.hp, 0, "seed {seed}: loser should be at 0 HP");
        assert!(state.entity(survivors[0].id).unwrap().is_alive());

        let records = handle.feed().page(0, usize::MAX);
        assert_well_formed(&records);
        let types: Vec<StepType> = records.iter().map(|r| r.step_type).collect();
        assert_eq!(types.last(), Some(&StepType::CombatOver));
        assert!(types.contains(&StepType::Moved), "seed {seed}: nobody moved");
        assert!(
            types.contains(&StepType::AfterDamage),
            "seed {seed}: nobody was hurt"
        );
    }
}

#[tokio::test]
async fn test_same_seed_same_fight() {
    let blueprint = duel_apart();
    let config = CombatConfig::new().with_seed(99);

    let mut messages = Vec::new();
    for _ in 0..2 {
        let (mut session, handle) = CombatSession::new(&blueprint, &config).unwrap();
        session.run().await.unwrap();
        let log: Vec<String> = handle
            .feed()
            .page(0, usize::MAX)
            .into_iter()
            .map(|r| r.message)
            .collect();
        messages.push(log);
    }
    assert_eq!(messages[0], messages[1]);
}

#[tokio::test]
async fn test_demo_shield_blocks_once_per_round() {
    let blueprint = EncounterBlueprint::demo();
    let warrior_id = blueprint.spawns[0].template.id;
    let config = CombatConfig::new().with_seed(2024);
    let (mut session, handle) = CombatSession::new(&blueprint, &config).unwrap();
    session.run().await.unwrap();

    // Every block is paid for with the warrior's single reaction, so it never
    // fires twice between two of the warrior's turn starts.
    let records = handle.feed().page(0, usize::MAX);
    assert_well_formed(&records);

    let mut blocks_since_turn = 0;
    for record in records {
        match &record.step {
            Step::StartTurn { entity, .. } if entity.id == warrior_id => blocks_since_turn = 0,
            Step::BeforeDamage(damage) if damage.target.id == warrior_id && damage.blocked > 0 => {
                assert_eq!(damage.blocked, 5);
                blocks_since_turn += 1;
                assert!(blocks_since_turn <= 1, "shield blocked twice in one round");
            }
            Step::AfterDamage(damage) => {
                assert_eq!(damage.taken, damage.after_block());
            }
            _ => {}
        }
    }
}

// =============================================================================
// Turn structure
// =============================================================================

#[tokio::test]
async fn test_hopeless_strikes_run_into_round_limit() {
    // Neither side can hit, so both spend every action striking until the
    // round limit stops the fight.
    let blueprint = EncounterBlueprint::new(6, 6)
        .with_spawn(Spawn::new(warrior().with_attack_bonus(-30), Position::new(2, 2)))
        .with_spawn(Spawn::new(goblin().with_attack_bonus(-30), Position::new(3, 2)));
    let (mut session, handle) = CombatSession::with_dice(
        &blueprint,
        &CombatConfig::new().with_max_rounds(Some(1)),
        Dice::scripted([20, 1]),
    )
    .unwrap();

    let outcome = session.run().await.unwrap();
    assert!(matches!(outcome, CombatOutcome::RoundLimit { round: 1, .. }));

    // Round 1: three strikes each, with a growing multiple attack penalty.
    let bonuses: Vec<(String, i32)> = handle
        .feed()
        .page(0, usize::MAX)
        .into_iter()
        .filter_map(|r| match r.step {
            Step::BeforeAttack(attack) => Some((attack.attacker.name, attack.bonus)),
            _ => None,
        })
        .collect();
    assert_eq!(
        bonuses,
        vec![
            ("Warrior".to_string(), -30),
            ("Warrior".to_string(), -35),
            ("Warrior".to_string(), -40),
            ("Goblin".to_string(), -30),
            ("Goblin".to_string(), -35),
            ("Goblin".to_string(), -40),
        ]
    );
}

#[tokio::test]
async fn test_one_sided_encounter_ends_after_first_turn() {
    let blueprint = EncounterBlueprint::new(5, 5)
        .with_spawn(Spawn::new(warrior(), Position::new(0, 0)))
        .with_spawn(Spawn::new(warrior().named("Squire"), Position::new(1, 0)));
    let (mut session, handle) = CombatSession::new(&blueprint, &CombatConfig::new()).unwrap();

    let outcome = session.run().await.unwrap();
    assert_eq!(outcome.winning_faction(), Some(Faction::Allied));
    assert_eq!(outcome.survivors().len(), 2);
    assert_eq!(session.state().round(), 1);

    // The faction check runs when a turn closes, so the first combatant
    // opens and closes one empty turn before the win is declared.
    let types: Vec<StepType> = handle
        .feed()
        .page(0, usize::MAX)
        .into_iter()
        .map(|r| r.step_type)
        .collect();
    let turns = types.iter().filter(|t| **t == StepType::StartTurn).count();
    assert_eq!(turns, 1);
    assert!(!types.contains(&StepType::StartAction));
    assert_eq!(
        &types[types.len() - 3..],
        &[StepType::StartTurn, StepType::EndTurn, StepType::CombatOver]
    );
}
