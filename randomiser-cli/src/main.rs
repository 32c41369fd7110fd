use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use slot_randomiser_core::{run, RandomiserSettings};

#[derive(Debug, Parser)]
#[command(name = "slot-randomiser", version, about = "Item placement randomiser")]
struct Args {
    /// Directory holding catalog.json, annotations.json and optionally keyitems.json.
    #[arg(long)]
    input: PathBuf,

    #[arg(long)]
    output: PathBuf,

    #[arg(long)]
    seed: u64,

    /// 0-100. Higher pushes important items deeper into the game.
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u32).range(0..=100))]
    difficulty: u32,

    #[arg(long, default_value_t = false)]
    fog: bool,

    #[arg(long, default_value_t = false)]
    dlc1: bool,

    #[arg(long, default_value_t = false)]
    dlc2: bool,

    #[arg(long, default_value_t = false)]
    race_mode: bool,

    /// Shuffle every silo without any placement restrictions.
    #[arg(long, default_value_t = false)]
    no_logic: bool,

    #[arg(long, default_value_t = 5)]
    restricted_passes: usize,

    #[arg(long, default_value_t = 10_000)]
    fallback_attempts: usize,

    #[arg(long, default_value_t = false)]
    debug: bool,
}

fn main() {
    let args = Args::parse();

    let default_filter = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let settings = RandomiserSettings {
        seed: args.seed,
        difficulty: args.difficulty,
        fog: args.fog,
        dlc1: args.dlc1,
        dlc2: args.dlc2,
        race_mode: args.race_mode,
        no_logic: args.no_logic,
        restricted_passes: args.restricted_passes,
        fallback_attempts: args.fallback_attempts,
        debug: args.debug,
        input_path: args.input,
        output_path: args.output,
    };

    tracing::debug!(?settings, "starting");
    if let Err(err) = run(settings) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
