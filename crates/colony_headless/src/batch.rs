//! Batch game runner.
//!
//! Runs many seeds of one scenario in parallel using rayon and summarises
//! how the AI fared across them.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use colony_core::config::AiConfig;

use crate::metrics::{BatchSummary, GameMetrics};
use crate::runner::{run_game, GameConfig};
use crate::scenario::Scenario;

/// Configuration for a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Scenario name or RON path
    pub scenario: String,
    /// Number of games to run
    pub game_count: u32,
    /// Maximum parallel games (0 = use rayon default)
    pub parallel_games: u32,
    /// Output directory for results
    pub output_dir: PathBuf,
    /// Starting seed; game `i` uses `seed_start + i`
    pub seed_start: u64,
    /// Turns per game (None = the scenario's own count)
    pub turns: Option<u32>,
    /// AI tuning file (RON)
    pub ai_config: Option<PathBuf>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            scenario: "two_shores".to_string(),
            game_count: 100,
            parallel_games: 0,
            output_dir: PathBuf::from("results"),
            seed_start: 0,
            turns: None,
            ai_config: None,
        }
    }
}

impl BatchConfig {
    /// Create config for a specific scenario
    pub fn new(scenario: &str, game_count: u32) -> Self {
        Self {
            scenario: scenario.to_string(),
            game_count,
            ..Default::default()
        }
    }

    /// Set output directory
    pub fn with_output(mut self, dir: PathBuf) -> Self {
        self.output_dir = dir;
        self
    }

    /// Set seed start
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Set turns per game
    pub fn with_turns(mut self, turns: u32) -> Self {
        self.turns = Some(turns);
        self
    }
}

/// Results from a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used
    pub config: BatchConfig,
    /// Individual game metrics, in seed order
    pub games: Vec<GameMetrics>,
    /// Aggregate summary
    pub summary: BatchSummary,
    /// Total runtime
    pub duration_seconds: f64,
    /// Errors encountered
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to JSON file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from JSON file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// Error during batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Game index (u32::MAX when the whole batch failed to start)
    pub game_index: u32,
    /// Seed used
    pub seed: u64,
    /// Error message
    pub message: String,
}

/// Finished-game counter shared by the worker threads.
#[derive(Debug, Default)]
struct Progress {
    done: AtomicU32,
    failed: AtomicU32,
}

impl Progress {
    /// Count a game; returns how many have finished.
    fn finish(&self, ok: bool) -> u32 {
        if !ok {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.done.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Run a batch of games.
pub fn run_batch(config: BatchConfig) -> BatchResults {
    let start = Instant::now();
    let mut results = BatchResults {
        games: Vec::new(),
        summary: BatchSummary::default(),
        duration_seconds: 0.0,
        errors: Vec::new(),
        config: config.clone(),
    };

    let prepared = Scenario::resolve(&config.scenario)
        .map_err(|e| e.to_string())
        .and_then(|scenario| {
            let ai = match &config.ai_config {
                Some(path) => AiConfig::load(path).map_err(|e| e.to_string())?,
                None => AiConfig::default(),
            };
            Ok((scenario, ai))
        });
    let (scenario, ai) = match prepared {
        Ok(prepared) => prepared,
        Err(message) => {
            warn!(%message, "Batch could not start");
            results.errors.push(BatchError {
                game_index: u32::MAX,
                seed: config.seed_start,
                message,
            });
            return results;
        }
    };

    info!(
        scenario = %scenario.name,
        games = config.game_count,
        seed_start = config.seed_start,
        "Starting batch"
    );

    let progress = Progress::default();
    let step = (config.game_count / 10).max(1);
    let play = |index: u32| -> Result<GameMetrics, BatchError> {
        let seed = config.seed_start + u64::from(index);
        let mut game = GameConfig::new(scenario.clone(), seed).with_ai(ai.clone());
        game.turns = config.turns;
        game.game_id = format!("game_{index:04}");
        let outcome = run_game(&game).map(|r| r.metrics).map_err(|e| BatchError {
            game_index: index,
            seed,
            message: e.to_string(),
        });
        let done = progress.finish(outcome.is_ok());
        debug!(index, seed, "Game done");
        if done % step == 0 {
            info!(
                done,
                total = config.game_count,
                failed = progress.failed.load(Ordering::Relaxed),
                elapsed = start.elapsed().as_secs(),
                "Batch progress"
            );
        }
        outcome
    };

    let outcomes: Vec<Result<GameMetrics, BatchError>> = if config.parallel_games > 0 {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_games as usize)
            .build()
        {
            Ok(pool) => pool.install(|| (0..config.game_count).into_par_iter().map(&play).collect()),
            Err(e) => {
                warn!(error = %e, "Thread pool unavailable, using the global pool");
                (0..config.game_count).into_par_iter().map(&play).collect()
            }
        }
    } else {
        (0..config.game_count).into_par_iter().map(&play).collect()
    };

    for outcome in outcomes {
        match outcome {
            Ok(metrics) => results.games.push(metrics),
            Err(error) => {
                warn!(game = error.game_index, seed = error.seed, message = %error.message, "Game failed");
                results.errors.push(error);
            }
        }
    }

    results.summary = BatchSummary::from_games(&results.games);
    results.duration_seconds = start.elapsed().as_secs_f64();
    info!(
        games = results.games.len(),
        errors = results.errors.len(),
        seconds = results.duration_seconds,
        "Batch complete"
    );
    results
}
