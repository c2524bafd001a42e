//! Game metrics collection.
//!
//! Turn reports and end-of-game world statistics, aggregated per game and
//! across batches.

use std::collections::BTreeMap;

use colony_core::ai::AiRegistry;
use colony_core::ids::PlayerId;
use colony_core::missions::UnitMission;
use colony_core::scheduler::TurnReport;
use colony_core::world::World;
use serde::{Deserialize, Serialize};

/// Complete metrics for a single game.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameMetrics {
    /// Unique game identifier.
    pub game_id: String,
    /// Scenario name.
    pub scenario: String,
    /// Random seed used.
    pub seed: u64,
    /// Turns played.
    pub turns: u32,
    /// Per-player metrics, by player name.
    pub players: BTreeMap<String, PlayerMetrics>,
    /// Sums over all turn reports.
    pub totals: TurnTotals,
    /// Missions held at the end, by element name.
    pub final_missions: BTreeMap<String, u32>,
    /// Final world state hash (for determinism validation).
    pub final_state_hash: u64,
}

impl GameMetrics {
    /// Create a new game metrics instance.
    #[must_use]
    pub fn new(game_id: impl Into<String>, scenario: impl Into<String>, seed: u64) -> Self {
        Self {
            game_id: game_id.into(),
            scenario: scenario.into(),
            seed,
            ..Default::default()
        }
    }

    /// Get or create player metrics.
    pub fn player_mut(&mut self, name: &str) -> &mut PlayerMetrics {
        self.players.entry(name.to_string()).or_default()
    }
}

/// Running sums of [`TurnReport`] counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnTotals {
    /// Mission steps taken.
    pub missions_run: u64,
    /// Missions assigned.
    pub missions_replaced: u64,
    /// AI units dropped after their unit was lost.
    pub units_dropped: u64,
    /// Items scheduled on carriers.
    pub transports_assigned: u64,
    /// Requests the server refused.
    pub failed_requests: u64,
    /// Mission steps that failed.
    pub mission_errors: u64,
}

impl TurnTotals {
    /// Add one turn.
    pub fn add(&mut self, report: &TurnReport) {
        self.missions_run += report.missions_run as u64;
        self.missions_replaced += report.missions_replaced as u64;
        self.units_dropped += report.units_dropped as u64;
        self.transports_assigned += report.transports_assigned as u64;
        self.failed_requests += report.failed_requests as u64;
        self.mission_errors += report.mission_errors as u64;
    }
}

/// End-of-game numbers for one player.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerMetrics {
    /// Gold in the treasury.
    pub gold: u32,
    /// Settlements owned.
    pub settlements: u32,
    /// Units owned, anywhere.
    pub units: u32,
    /// Units working inside colonies.
    pub workers: u32,
    /// Units lost since the start.
    pub units_lost: u32,
    /// Settlements gained (positive) or lost since the start.
    pub settlements_gained: i32,
}

/// Summary statistics across multiple games.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Total games played.
    pub total_games: u32,
    /// Average settlements per player at the end.
    pub avg_settlements: BTreeMap<String, f64>,
    /// Average gold per player at the end.
    pub avg_gold: BTreeMap<String, f64>,
    /// Average units lost per player.
    pub avg_units_lost: BTreeMap<String, f64>,
    /// Refused requests per mission step over all games.
    pub failed_request_rate: f64,
    /// Games in which a mission step errored.
    pub games_with_errors: u32,
    /// Number of distinct final hashes.
    pub distinct_outcomes: u32,
}

impl BatchSummary {
    /// Calculate summary from a list of game metrics.
    #[must_use]
    pub fn from_games(games: &[GameMetrics]) -> Self {
        if games.is_empty() {
            return Self::default();
        }

        let mut summary = Self {
            total_games: games.len() as u32,
            ..Default::default()
        };

        let mut settlements: BTreeMap<String, Vec<u32>> = BTreeMap::new();
        let mut gold: BTreeMap<String, Vec<u32>> = BTreeMap::new();
        let mut lost: BTreeMap<String, Vec<u32>> = BTreeMap::new();
        let (mut run, mut failed) = (0u64, 0u64);
        let mut hashes: Vec<u64> = Vec::with_capacity(games.len());

        for game in games {
            for (name, player) in &game.players {
                settlements.entry(name.clone()).or_default().push(player.settlements);
                gold.entry(name.clone()).or_default().push(player.gold);
                lost.entry(name.clone()).or_default().push(player.units_lost);
            }
            run += game.totals.missions_run;
            failed += game.totals.failed_requests;
            if game.totals.mission_errors > 0 {
                summary.games_with_errors += 1;
            }
            hashes.push(game.final_state_hash);
        }

        let mean = |values: Vec<u32>| values.iter().map(|v| f64::from(*v)).sum::<f64>() / values.len().max(1) as f64;
        summary.avg_settlements = settlements.into_iter().map(|(k, v)| (k, mean(v))).collect();
        summary.avg_gold = gold.into_iter().map(|(k, v)| (k, mean(v))).collect();
        summary.avg_units_lost = lost.into_iter().map(|(k, v)| (k, mean(v))).collect();
        summary.failed_request_rate = failed as f64 / run.max(1) as f64;

        hashes.sort_unstable();
        hashes.dedup();
        summary.distinct_outcomes = hashes.len() as u32;
        summary
    }
}

/// Tracks a game from its starting world to its final state.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    metrics: GameMetrics,
    start_units: BTreeMap<PlayerId, u32>,
    start_settlements: BTreeMap<PlayerId, u32>,
}

impl MetricsCollector {
    /// Create a new metrics collector, noting the starting world.
    #[must_use]
    pub fn new(game_id: &str, scenario: &str, seed: u64, world: &World) -> Self {
        let mut start_units = BTreeMap::new();
        for unit in world.units() {
            *start_units.entry(unit.owner).or_insert(0) += 1;
        }
        let mut start_settlements = BTreeMap::new();
        for settlement in world.settlements() {
            *start_settlements.entry(settlement.owner).or_insert(0) += 1;
        }
        Self {
            metrics: GameMetrics::new(game_id, scenario, seed),
            start_units,
            start_settlements,
        }
    }

    /// Record one AI turn.
    pub fn on_turn(&mut self, report: &TurnReport) {
        self.metrics.turns += 1;
        self.metrics.totals.add(report);
    }

    /// Snapshot the final world and AI state.
    #[must_use]
    pub fn finalize(mut self, world: &World, ai: &AiRegistry) -> GameMetrics {
        for player in world.players() {
            let units = world.units().filter(|u| u.owner == player.id).count() as u32;
            let settlements = world.settlements().filter(|s| s.owner == player.id).count() as u32;
            let workers = world
                .settlements()
                .filter(|s| s.owner == player.id)
                .filter_map(|s| s.colony())
                .map(|c| c.workers.len() as u32)
                .sum();
            let started_units = self.start_units.get(&player.id).copied().unwrap_or(0);
            let started_settlements = self.start_settlements.get(&player.id).copied().unwrap_or(0);
            let entry = self.metrics.player_mut(&player.name);
            entry.gold = player.gold;
            entry.settlements = settlements;
            entry.units = units;
            entry.workers = workers;
            entry.units_lost = started_units.saturating_sub(units);
            entry.settlements_gained = settlements as i32 - started_settlements as i32;
        }
        for unit in ai.ai_units() {
            if let Some(mission) = &unit.mission {
                *self.metrics.final_missions.entry(mission.name().to_string()).or_insert(0) += 1;
            }
        }
        self.metrics.final_state_hash = world.state_hash();
        self.metrics
    }

    /// Get current metrics.
    #[must_use]
    pub fn current(&self) -> &GameMetrics {
        &self.metrics
    }
}
