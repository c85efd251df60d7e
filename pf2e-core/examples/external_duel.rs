//! Play the demo warrior from outside the combat task.
//!
//! The warrior strikes whenever the goblin is in reach and strides toward
//! it otherwise; the goblin stays under AI control.

use pf2e_core::{
    ActionError, ActionParams, CombatConfig, CombatSession, CommandError, ControllerKind,
    EncounterBlueprint,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut blueprint = EncounterBlueprint::demo();
    blueprint.spawns[0].template.controller = ControllerKind::External;
    let hero = blueprint.spawns[0].template.id;
    let goblin = blueprint.spawns[1].template.id;

    let (mut session, mut handle) =
        CombatSession::new(&blueprint, &CombatConfig::new().with_seed(7))?;
    let driver = tokio::spawn(async move { session.run().await });

    println!("=== External Duel ===\n");
    while let Ok(snapshot) = handle.wait_for_turn(hero).await {
        let Some(me) = snapshot.entity(hero) else {
            break;
        };
        let card = |name: &str| me.cards.iter().find(|c| c.name == name).map(|c| c.id);
        let (Some(strike), Some(stride)) = (card("Strike (Longsword)"), card("Stride")) else {
            break;
        };

        let params = ActionParams::targeting(goblin);
        let result = match handle.submit_action(hero, strike, params.clone()).await {
            Err(CommandError::ActionGenerationFailed(ActionError::OutOfRange { .. })) => {
                handle.submit_action(hero, stride, params).await
            }
            other => other,
        };
        match result {
            Ok(()) => {}
            Err(CommandError::CombatClosed) => break,
            Err(err) => println!("  rejected: {err}"),
        }
    }

    let outcome = driver.await??;
    for record in handle.feed().page(0, usize::MAX) {
        println!("{}", record.message);
    }
    println!("\n{outcome}");
    Ok(())
}
