//! Single-game execution.
//!
//! A game is a scenario world handed to the [`TurnScheduler`] for a fixed
//! number of turns against the in-process [`LocalServer`]. Every random
//! choice draws from one seeded [`AiRng`], so a `(scenario, seed, turns)`
//! triple always plays out the same way.

use std::path::PathBuf;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};

use colony_core::ai::AiRegistry;
use colony_core::config::AiConfig;
use colony_core::error::AiError;
use colony_core::persistence::AiSnapshot;
use colony_core::rng::AiRng;
use colony_core::scheduler::TurnScheduler;
use colony_core::server::LocalServer;
use colony_core::world::World;

use crate::metrics::{GameMetrics, MetricsCollector};
use crate::scenario::{Scenario, ScenarioError};

/// Turns between progress log lines.
const PROGRESS_LOG_INTERVAL: u32 = 25;

/// Upper bound on turns a single game may be asked to play.
pub const MAX_TURNS: u32 = 10_000;

/// Errors from running a game.
#[derive(Debug, Error)]
pub enum RunError {
    /// The scenario could not be built.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    /// The AI turn or snapshot failed.
    #[error(transparent)]
    Ai(#[from] AiError),

    /// More turns than [`MAX_TURNS`] were requested.
    #[error("{0} turns requested, at most {MAX_TURNS} allowed")]
    TooManyTurns(u32),
}

/// Configuration for a single game run.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Scenario to play.
    pub scenario: Scenario,
    /// Random seed for determinism.
    pub seed: u64,
    /// Turns to play; `None` uses the scenario's own count.
    pub turns: Option<u32>,
    /// AI tuning.
    pub ai: AiConfig,
    /// Game ID for tracking.
    pub game_id: String,
    /// Where to write the final AI snapshot, if anywhere.
    pub save_ai: Option<PathBuf>,
}

impl GameConfig {
    /// Config playing `scenario` with `seed` and default tuning.
    #[must_use]
    pub fn new(scenario: Scenario, seed: u64) -> Self {
        Self {
            game_id: format!("{}_{seed}", scenario.name),
            scenario,
            seed,
            turns: None,
            ai: AiConfig::default(),
            save_ai: None,
        }
    }

    /// Override the number of turns.
    #[must_use]
    pub fn with_turns(mut self, turns: u32) -> Self {
        self.turns = Some(turns);
        self
    }

    /// Override the AI tuning.
    #[must_use]
    pub fn with_ai(mut self, ai: AiConfig) -> Self {
        self.ai = ai;
        self
    }

    fn turn_count(&self) -> u32 {
        self.turns.unwrap_or(self.scenario.turns)
    }
}

/// Result of running a game.
#[derive(Debug)]
pub struct GameResult {
    /// Collected metrics.
    pub metrics: GameMetrics,
    /// Final world.
    pub world: World,
    /// Final AI state.
    pub ai: AiRegistry,
    /// Wall-clock time spent.
    pub duration_seconds: f64,
}

/// Play a game to the end and collect its metrics.
pub fn run_game(config: &GameConfig) -> Result<GameResult, RunError> {
    let turns = config.turn_count();
    if turns > MAX_TURNS {
        return Err(RunError::TooManyTurns(turns));
    }
    let started = Instant::now();
    let (mut world, players) = config.scenario.build_world()?;
    let mut ai = AiRegistry::new();
    let mut scheduler = TurnScheduler::new(config.ai.clone(), players);
    let mut server = LocalServer::new(config.ai.sail_turns);
    let mut rng = AiRng::new(config.seed);
    let mut collector = MetricsCollector::new(&config.game_id, &config.scenario.name, config.seed, &world);

    info!(
        game = %config.game_id,
        scenario = %config.scenario.name,
        seed = config.seed,
        turns,
        "Starting game"
    );

    for turn in 0..turns {
        let report = scheduler.run_turn(&mut world, &mut ai, &mut server, &mut rng)?;
        collector.on_turn(&report);
        if report.mission_errors > 0 {
            warn!(turn, errors = report.mission_errors, "Mission steps failed");
        }
        world.advance_turn();
        if (turn + 1) % PROGRESS_LOG_INTERVAL == 0 {
            debug!(turn = turn + 1, ai_units = ai.unit_ids().len(), "Progress");
        }
    }

    if let Some(path) = &config.save_ai {
        AiSnapshot::capture(&ai).save(path)?;
        info!(path = %path.display(), "Saved AI snapshot");
    }

    let metrics = collector.finalize(&world, &ai);
    let duration_seconds = started.elapsed().as_secs_f64();
    info!(
        game = %metrics.game_id,
        hash = format!("{:016x}", metrics.final_state_hash),
        seconds = duration_seconds,
        "Game finished"
    );
    Ok(GameResult {
        metrics,
        world,
        ai,
        duration_seconds,
    })
}

/// Outcome of replaying one game several times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    /// Final hash of every run.
    pub hashes: Vec<u64>,
}

impl Verification {
    /// Whether every run ended in the same state.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }
}

/// Play the same game `runs` times and compare the final states.
pub fn verify(config: &GameConfig, runs: u32) -> Result<Verification, RunError> {
    let mut hashes = Vec::with_capacity(runs as usize);
    for run in 0..runs {
        let result = run_game(config)?;
        let hash = result.metrics.final_state_hash ^ snapshot_hash(&result.ai)?;
        debug!(run, hash = format!("{hash:016x}"), "Verification run");
        hashes.push(hash);
    }
    Ok(Verification { hashes })
}

fn snapshot_hash(ai: &AiRegistry) -> Result<u64, RunError> {
    use std::hash::{Hash, Hasher};

    let bytes = AiSnapshot::capture(ai).to_bytes()?;
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    bytes.hash(&mut hasher);
    Ok(hasher.finish())
}
