//! Headless colonial AI runner.
//!
//! Plays scenarios with every AI player driven by the mission scheduler and
//! reports what happened. Metrics go to stdout (or a file) as JSON; logs go
//! to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Play the default scenario
//! cargo run -p colony_headless -- run
//!
//! # Play a RON scenario for 80 turns and keep the AI state
//! cargo run -p colony_headless -- run --scenario my_map.ron --turns 80 --save-ai ai.bin
//!
//! # Run a batch of seeds in parallel
//! cargo run -p colony_headless -- batch --scenario frontier --count 200 --output results/
//!
//! # Check that a seed replays identically
//! cargo run -p colony_headless -- verify --scenario frontier --seed 7 --runs 5
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use colony_core::config::AiConfig;
use colony_headless::{
    batch::{run_batch, BatchConfig},
    runner::{run_game, verify, GameConfig},
    scenario::Scenario,
};

#[derive(Parser)]
#[command(name = "colony_headless")]
#[command(about = "Headless runner for the colonial AI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a single game
    Run {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "two_shores")]
        scenario: String,

        /// Random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Turns to play (defaults to the scenario's own count)
        #[arg(short, long)]
        turns: Option<u32>,

        /// AI tuning file (RON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write metrics JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Save the final AI state to this file
        #[arg(long)]
        save_ai: Option<PathBuf>,
    },

    /// Play many seeds of one scenario in parallel
    Batch {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "two_shores")]
        scenario: String,

        /// Number of games
        #[arg(short = 'n', long, default_value = "100")]
        count: u32,

        /// First seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Turns per game
        #[arg(short, long)]
        turns: Option<u32>,

        /// Parallel games (0 = one per core)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// AI tuning file (RON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output directory
        #[arg(short, long, default_value = "results")]
        output: PathBuf,
    },

    /// Replay one seed several times and compare final states
    Verify {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "two_shores")]
        scenario: String,

        /// Random seed
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of runs
        #[arg(short, long, default_value = "3")]
        runs: u32,

        /// Turns per run
        #[arg(short, long)]
        turns: Option<u32>,
    },

    /// Print a built-in scenario as RON, as a starting point for new ones
    Export {
        /// Built-in scenario name
        #[arg(default_value = "two_shores")]
        scenario: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries JSON
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .init();

    let outcome = match cli.command.unwrap_or(Commands::Run {
        scenario: "two_shores".to_string(),
        seed: 0,
        turns: None,
        config: None,
        output: None,
        save_ai: None,
    }) {
        Commands::Run {
            scenario,
            seed,
            turns,
            config,
            output,
            save_ai,
        } => cmd_run(&scenario, seed, turns, config, output, save_ai),
        Commands::Batch {
            scenario,
            count,
            seed,
            turns,
            parallel,
            config,
            output,
        } => {
            let mut batch = BatchConfig::new(&scenario, count).with_seed(seed).with_output(output);
            batch.turns = turns;
            batch.parallel_games = parallel;
            batch.ai_config = config;
            cmd_batch(batch)
        }
        Commands::Verify {
            scenario,
            seed,
            runs,
            turns,
        } => cmd_verify(&scenario, seed, runs, turns),
        Commands::Export { scenario } => cmd_export(&scenario),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            tracing::error!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn load_game(scenario: &str, seed: u64, turns: Option<u32>, config: Option<PathBuf>) -> Result<GameConfig, String> {
    let scenario = Scenario::resolve(scenario).map_err(|e| e.to_string())?;
    let ai = match config {
        Some(path) => AiConfig::load(path).map_err(|e| e.to_string())?,
        None => AiConfig::default(),
    };
    let mut game = GameConfig::new(scenario, seed).with_ai(ai);
    game.turns = turns;
    Ok(game)
}

/// Play one game and print its metrics
fn cmd_run(
    scenario: &str,
    seed: u64,
    turns: Option<u32>,
    config: Option<PathBuf>,
    output: Option<PathBuf>,
    save_ai: Option<PathBuf>,
) -> Result<(), String> {
    let mut game = load_game(scenario, seed, turns, config)?;
    game.save_ai = save_ai;
    let result = run_game(&game).map_err(|e| e.to_string())?;

    let json = serde_json::to_string_pretty(&result.metrics).map_err(|e| e.to_string())?;
    match output {
        Some(path) => {
            std::fs::write(&path, json).map_err(|e| format!("{}: {e}", path.display()))?;
            tracing::info!("Metrics written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Run a batch and save its results
fn cmd_batch(config: BatchConfig) -> Result<(), String> {
    let output = config.output_dir.join("batch.json");
    let results = run_batch(config);
    results
        .save(&output)
        .map_err(|e| format!("{}: {e}", output.display()))?;

    let summary = &results.summary;
    eprintln!("=== Batch Results ===");
    eprintln!("Games:            {}", summary.total_games);
    eprintln!("Errors:           {}", results.errors.len());
    eprintln!("Distinct endings: {}", summary.distinct_outcomes);
    eprintln!("Refused requests: {:.3} per mission step", summary.failed_request_rate);
    for (player, settlements) in &summary.avg_settlements {
        let gold = summary.avg_gold.get(player).copied().unwrap_or(0.0);
        eprintln!("  {player:<12} {settlements:>5.2} settlements {gold:>8.1} gold");
    }
    eprintln!("Duration:         {:.1}s", results.duration_seconds);
    eprintln!("Saved to {}", output.display());

    if results.games.is_empty() && !results.errors.is_empty() {
        return Err("no game completed".to_string());
    }
    Ok(())
}

/// Verify determinism
fn cmd_verify(scenario: &str, seed: u64, runs: u32, turns: Option<u32>) -> Result<(), String> {
    let game = load_game(scenario, seed, turns, None)?;
    tracing::info!("Verifying determinism: {} with seed {} ({} runs)", game.scenario.name, seed, runs);

    let verification = verify(&game, runs).map_err(|e| e.to_string())?;
    if verification.is_deterministic() {
        eprintln!("PASS: All {runs} runs produced identical results");
        Ok(())
    } else {
        for (run, hash) in verification.hashes.iter().enumerate() {
            eprintln!("  run {run}: {hash:016x}");
        }
        Err("non-determinism detected".to_string())
    }
}

/// Print a built-in scenario as RON
fn cmd_export(name: &str) -> Result<(), String> {
    let scenario = match name {
        "two_shores" => Scenario::two_shores(),
        "frontier" => Scenario::frontier(),
        other => return Err(format!("no built-in scenario named {other}")),
    };
    let text = ron::ser::to_string_pretty(&scenario, ron::ser::PrettyConfig::default()).map_err(|e| e.to_string())?;
    println!("{text}");
    Ok(())
}
