//! Command-line runner for PF2e-style combat encounters.
//!
//! Runs the built-in demo or a blueprint loaded from JSON and prints the
//! combat log:
//!
//! ```bash
//! cargo run -p pf2e -- --seed 42
//! cargo run -p pf2e -- --encounter ambush.json --json
//! ```
//!
//! Externally controlled entities read their commands from stdin, one JSON
//! command per line.

use pf2e_core::{
    CombatConfig, CombatHandle, CombatOutcome, CombatSession, Command, CommandError,
    EncounterBlueprint, StepRecord, StepType,
};
use std::io::BufRead;
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct CliArgs {
    seed: Option<u64>,
    encounter: Option<PathBuf>,
    json: bool,
    help: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let cli = parse_args(&args)?;
    if cli.help {
        print_help();
        return Ok(());
    }

    let mut config = CombatConfig::from_env()?;
    if let Some(seed) = cli.seed {
        config = config.with_seed(seed);
    }

    let blueprint = match &cli.encounter {
        Some(path) => EncounterBlueprint::load(path).await?,
        None => EncounterBlueprint::demo(),
    };

    let (mut session, handle) = CombatSession::new(&blueprint, &config)?;
    if blueprint.needs_external_controller() {
        tokio::spawn(read_commands(handle.clone()));
    }

    let feed = handle.feed().clone();
    let mut events = feed.subscribe();
    let json = cli.json;

    // Records emitted while building the encounter predate the subscription.
    let mut printed = feed.len();
    for record in feed.page(0, printed) {
        print_record(&record, json);
    }

    let printer = tokio::spawn(async move {
        loop {
            let record = match events.recv().await {
                Ok(record) => record,
                Err(RecvError::Lagged(_)) => {
                    // Catch up from the history instead of dropping lines.
                    let missed = feed.page(printed, usize::MAX);
                    printed += missed.len();
                    let over = missed.iter().any(|r| r.step_type == StepType::CombatOver);
                    for record in &missed {
                        print_record(record, json);
                    }
                    if over {
                        break;
                    }
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            if record.index < printed {
                continue;
            }
            printed = record.index + 1;
            print_record(&record, json);
            if record.step_type == StepType::CombatOver {
                break;
            }
        }
    });

    let outcome = session.run().await?;
    printer.await?;

    print_outcome(&outcome, json)?;
    Ok(())
}

fn parse_args(args: &[String]) -> Result<CliArgs, Box<dyn std::error::Error>> {
    let mut cli = CliArgs::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => cli.help = true,
            "--json" => cli.json = true,
            "--seed" => {
                let value = args.get(i + 1).ok_or("--seed needs a value")?;
                cli.seed = Some(value.parse().map_err(|_| format!("bad seed: {value}"))?);
                i += 1;
            }
            "--encounter" => {
                let value = args.get(i + 1).ok_or("--encounter needs a path")?;
                cli.encounter = Some(PathBuf::from(value));
                i += 1;
            }
            other => return Err(format!("unknown argument: {other}").into()),
        }
        i += 1;
    }

    Ok(cli)
}

/// Forward JSON commands from stdin until it closes or the combat ends.
async fn read_commands(handle: CombatHandle) {
    // Blocking stdin reads live on their own thread so they never hold up
    // runtime shutdown.
    let (tx, mut lines) = mpsc::channel::<String>(1);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    tracing::warn!("stdin closed: {err}");
                    break;
                }
            }
        }
    });

    while let Some(line) = lines.recv().await {
        if line.trim().is_empty() {
            continue;
        }
        let command: Command = match serde_json::from_str(&line) {
            Ok(command) => command,
            Err(err) => {
                eprintln!("invalid command: {err}");
                continue;
            }
        };
        match handle.submit(command).await {
            Ok(()) => {}
            Err(CommandError::CombatClosed) => break,
            Err(err) => eprintln!("rejected: {err}"),
        }
    }
}

fn print_record(record: &StepRecord, json: bool) {
    if json {
        match serde_json::to_string(record) {
            Ok(line) => println!("{line}"),
            Err(err) => tracing::warn!("failed to encode step: {err}"),
        }
    } else {
        println!("{}", record.message);
    }
}

fn print_outcome(outcome: &CombatOutcome, json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string(outcome)?);
    } else {
        println!();
        println!("{outcome}");
        for survivor in outcome.survivors() {
            println!("  {} survives", survivor.name);
        }
    }
    Ok(())
}

fn print_help() {
    println!("pf2e - run a PF2e-style combat encounter");
    println!();
    println!("USAGE:");
    println!("  pf2e [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  -h, --help            Show this help message");
    println!("  --seed <N>            Seed every roll (overrides PF2E_SEED)");
    println!("  --encounter <FILE>    Load an encounter blueprint (default: built-in demo)");
    println!("  --json                Print steps and the outcome as JSON lines");
    println!();
    println!("ENVIRONMENT:");
    println!("  PF2E_SEED             Dice seed");
    println!("  PF2E_MAX_ROUNDS       Round limit, 0 for none (default: 100)");
    println!("  RUST_LOG              Log filter (default: warn)");
    println!();
    println!("EXAMPLES:");
    println!("  pf2e                             # Demo with random dice");
    println!("  pf2e --seed 7 --json             # Reproducible JSON log");
    println!("  pf2e --encounter ambush.json");
}
