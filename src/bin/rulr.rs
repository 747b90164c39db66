//! rulr CLI: the reference driver described in spec.md §6. Loads a rule
//! file (trying `<name>.dlc` before falling back to `<name>.dl`), merges
//! in an optional fact file, evaluates to fixpoint, and prints every tuple
//! of the `error` relation — one per line, rendering symbols through the
//! engine's interner.
//!
//! Not part of the core engine contract (spec.md §6); grounded in the
//! teacher's `src/bin/client.rs` argument-parsing shape, ported from hand
//! rolled arg parsing to `clap` derive, matching how the other pack repos
//! build their CLI surfaces.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser as ClapParser;
use rulr::{config::EngineConfig, Engine, Value};
use tracing_subscriber::EnvFilter;

/// Load a rulr rule set, evaluate it, and print the `error` relation.
#[derive(ClapParser, Debug)]
#[command(name = "rulr", version, about)]
struct Args {
    /// Rule set name, without extension: tries `<name>.dlc` then `<name>.dl`.
    #[arg(long)]
    rules: String,

    /// Optional fact file (always source form), merged in before evaluation.
    #[arg(long)]
    facts: Option<PathBuf>,
}

fn init_tracing(config: &EngineConfig) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(args: Args) -> Result<(), String> {
    let config = EngineConfig::load().map_err(|e| e.to_string())?;
    init_tracing(&config);

    let mut engine = Engine::create().with_config(&config);
    engine.load_rules_by_name(&args.rules).map_err(|e| e.to_string())?;

    if let Some(facts_path) = &args.facts {
        engine.load_rules_from_file(facts_path).map_err(|e| e.to_string())?;
    }

    engine.evaluate();

    let Some(error_id) = engine.get_predicate_id("error") else {
        return Ok(());
    };
    let view = engine.get_relation_view(error_id).expect("just looked up");
    for tuple in view.tuples {
        let rendered: Vec<String> = tuple
            .as_slice()
            .iter()
            .map(|v| match v {
                Value::Symbol(id) => engine.symbols().lookup(*id).unwrap_or("<unknown>").to_string(),
                other => other.to_string(),
            })
            .collect();
        println!("{}", rendered.join(", "));
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("rulr: {message}");
            ExitCode::FAILURE
        }
    }
}
