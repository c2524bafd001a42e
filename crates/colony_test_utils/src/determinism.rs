//! Replay checks for AI turns.
//!
//! The same world, AI configuration and seed must always play out the same
//! way: saved games depend on it and so does every multi-turn test. The
//! helpers here play an [`AiGame`] several times and compare the combined
//! world and registry hash after every turn.
//!
//! What keeps AI turns reproducible:
//!
//! - units, settlements and AI wrappers live in `BTreeMap`s, so every scan
//!   visits them in handle order
//! - direction shuffles, gift picks and demand timing draw from the game's
//!   seeded [`colony_core::rng::AiRng`]
//! - attack and defence ratios are compared in fixed point
//!
//! A mismatch is reported with the first turn at which the runs parted,
//! which is usually enough to find the mission at fault.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use colony_core::ai::AiRegistry;
use colony_core::config::AiConfig;
use colony_core::error::Result;
use colony_core::ids::PlayerId;
use colony_core::persistence::AiSnapshot;
use colony_core::rng::AiRng;
use colony_core::scheduler::{TurnReport, TurnScheduler};
use colony_core::server::LocalServer;
use colony_core::world::World;
use tracing::{debug, warn};

/// Outcome of replaying one game several times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayReport {
    /// Final state hash of each run.
    pub hashes: Vec<u64>,
    /// Turns each run played.
    pub turns: u32,
    /// First turn after which the runs disagreed, 0 for the starting state.
    pub diverged_at: Option<u32>,
}

impl ReplayReport {
    /// Whether every run ended in the same state.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.diverged_at.is_none() && self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Distinct final hashes, in ascending order.
    #[must_use]
    pub fn distinct_hashes(&self) -> Vec<u64> {
        let mut distinct = self.hashes.clone();
        distinct.sort_unstable();
        distinct.dedup();
        distinct
    }

    /// # Panics
    ///
    /// Panics if the runs disagreed.
    pub fn assert_deterministic(&self) {
        assert!(
            self.is_deterministic(),
            "AI replay diverged at turn {:?} of {}: {} runs ended in {} distinct states {:?}",
            self.diverged_at,
            self.turns,
            self.hashes.len(),
            self.distinct_hashes().len(),
            self.hashes
        );
    }
}

// ============================================================================
// AI game
// ============================================================================

/// A world plus everything needed to play AI turns on it.
#[derive(Debug, Clone)]
pub struct AiGame {
    /// Game state.
    pub world: World,
    /// AI bookkeeping.
    pub ai: AiRegistry,
    /// Turn driver.
    pub scheduler: TurnScheduler,
    /// In-process server.
    pub server: LocalServer,
    /// Seeded randomness.
    pub rng: AiRng,
    /// Reports of the turns played so far.
    pub reports: Vec<TurnReport>,
}

impl AiGame {
    /// Prepare a game where `players` are AI controlled.
    #[must_use]
    pub fn new(world: World, players: Vec<PlayerId>, config: AiConfig, seed: u64) -> Self {
        let server = LocalServer::new(config.sail_turns);
        Self {
            world,
            ai: AiRegistry::new(),
            scheduler: TurnScheduler::new(config, players),
            server,
            rng: AiRng::new(seed),
            reports: Vec::new(),
        }
    }

    /// Play one AI turn and start the next world turn.
    pub fn step(&mut self) -> Result<&TurnReport> {
        let report = self
            .scheduler
            .run_turn(&mut self.world, &mut self.ai, &mut self.server, &mut self.rng)?;
        self.world.advance_turn();
        self.reports.push(report);
        Ok(&self.reports[self.reports.len() - 1])
    }

    /// Play `turns` turns, logging failed turns instead of stopping.
    pub fn play(&mut self, turns: u32) {
        for _ in 0..turns {
            if let Err(e) = self.step() {
                warn!(turn = self.world.turn, error = %e, "AI turn failed");
                self.world.advance_turn();
            }
        }
    }

    /// Hash of the world combined with the AI registry.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.world.state_hash().hash(&mut hasher);
        match AiSnapshot::capture(&self.ai).to_bytes() {
            Ok(bytes) => bytes.hash(&mut hasher),
            Err(e) => warn!(error = %e, "could not encode AI snapshot for hashing"),
        }
        hasher.finish()
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Play `runs` fresh copies of a game side by side for `turns` turns,
/// comparing their state hashes before the first turn and after each one.
///
/// ```ignore
/// use colony_test_utils::determinism::verify_determinism;
///
/// verify_determinism(3, 20, || frontier_game(7)).assert_deterministic();
/// ```
pub fn verify_determinism<F>(runs: usize, turns: u32, setup: F) -> ReplayReport
where
    F: Fn() -> AiGame,
{
    let mut games: Vec<AiGame> = (0..runs).map(|_| setup()).collect();
    let agree = |games: &[AiGame]| games.windows(2).all(|w| w[0].state_hash() == w[1].state_hash());

    let mut diverged_at = (!agree(&games)).then_some(0);
    for turn in 1..=turns {
        for game in &mut games {
            game.play(1);
        }
        if diverged_at.is_none() && !agree(&games) {
            debug!(turn, runs, "AI replay diverged");
            diverged_at = Some(turn);
        }
    }

    ReplayReport {
        hashes: games.iter().map(AiGame::state_hash).collect(),
        turns,
        diverged_at,
    }
}

/// Play `num_games` copies of a game on scoped threads and collect the
/// final hashes. Only the end states are compared.
pub fn run_parallel_games<F>(setup_fn: F, num_games: usize, turns: u32) -> ReplayReport
where
    F: Fn() -> AiGame + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_games)
            .map(|_| {
                s.spawn(|| {
                    let mut game = setup_fn();
                    game.play(turns);
                    game.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|_| panic!("AI game thread panicked")))
            .collect()
    });

    let diverged_at = (!hashes.windows(2).all(|w| w[0] == w[1])).then_some(turns);
    ReplayReport {
        hashes,
        turns,
        diverged_at,
    }
}

/// Compare two games turn by turn, finding the first divergence.
///
/// # Returns
///
/// `None` if the games agree throughout, `Some(turn)` for the first turn
/// after which they differ (0 for the initial state).
pub fn find_first_divergence<F>(setup_fn: F, turns: u32) -> Option<u32>
where
    F: Fn() -> AiGame,
{
    let mut a = setup_fn();
    let mut b = setup_fn();

    if a.state_hash() != b.state_hash() {
        return Some(0);
    }

    for turn in 1..=turns {
        a.play(1);
        b.play(1);

        if a.state_hash() != b.state_hash() {
            debug!(turn, "games diverged");
            return Some(turn);
        }
    }

    None
}

/// Save the AI after some turns, load it back and check that a game
/// continued from the loaded copy matches one continued from a second load.
pub fn verify_snapshot_determinism<F>(setup_fn: F, turns_before: u32, turns_after: u32) -> bool
where
    F: Fn() -> AiGame,
{
    let mut original = setup_fn();
    original.play(turns_before);

    let Some(ai) = reload(&original) else {
        return false;
    };
    original.ai = ai;
    let Some(ai) = reload(&original) else {
        return false;
    };
    let mut restored = original.clone();
    restored.ai = ai;
    if original.state_hash() != restored.state_hash() {
        debug!("reloaded AI differs from its source");
        return false;
    }

    original.play(turns_after);
    restored.play(turns_after);
    original.state_hash() == restored.state_hash()
}

fn reload(game: &AiGame) -> Option<AiRegistry> {
    let bytes = AiSnapshot::capture(&game.ai).to_bytes().ok()?;
    AiSnapshot::from_bytes(&bytes).ok()?.restore(&game.world).ok()
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::fixtures;
    use colony_core::unit::{Location, UnitType};
    use proptest::prelude::*;

    fn frontier_game(seed: u64) -> AiGame {
        let (world, players) = fixtures::frontier();
        AiGame::new(world, players, AiConfig::default(), seed)
    }

    fn channel_game(seed: u64) -> AiGame {
        let fixture = fixtures::channel();
        AiGame::new(fixture.world, vec![fixture.dutch], AiConfig::default(), seed)
    }

    #[test]
    fn test_extra_unit_diverges_before_the_first_turn() {
        let runs = Cell::new(0u32);
        let report = verify_determinism(2, 3, || {
            let mut game = frontier_game(7);
            if runs.replace(runs.get() + 1) == 1 {
                let dutch = game.scheduler.players()[0];
                game.world.spawn_unit(dutch, UnitType::FreeColonist, Location::Europe);
            }
            game
        });
        assert_eq!(report.diverged_at, Some(0));
        assert!(!report.is_deterministic());
        assert_eq!(report.hashes.len(), 2);
    }

    #[test]
    fn test_mismatched_hashes_are_counted_once() {
        let report = ReplayReport {
            hashes: vec![1, 2, 1],
            turns: 1,
            diverged_at: Some(1),
        };
        assert!(!report.is_deterministic());
        assert_eq!(report.distinct_hashes(), vec![1, 2]);
    }

    #[test]
    fn test_frontier_turns_are_deterministic() {
        let report = verify_determinism(3, 10, || frontier_game(7));
        report.assert_deterministic();
        assert_eq!(report.distinct_hashes().len(), 1);
    }

    #[test]
    fn test_first_turn_assigns_missions() {
        let mut game = frontier_game(1);
        game.play(1);
        let report = &game.reports[0];
        assert_eq!(report.turn, 0);
        assert!(report.missions_replaced >= 4);
        assert_eq!(report.missions_run, report.missions_replaced);
    }

    #[test]
    fn test_find_divergence_on_deterministic_game() {
        assert_eq!(find_first_divergence(|| frontier_game(3), 8), None);
    }

    #[test]
    fn test_parallel_games_match() {
        let result = run_parallel_games(|| channel_game(11), 4, 6);
        result.assert_deterministic();
    }

    #[test]
    fn test_snapshot_mid_game() {
        assert!(verify_snapshot_determinism(|| frontier_game(5), 3, 3));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_any_seed_is_deterministic(seed in any::<u64>()) {
            let a = {
                let mut g = frontier_game(seed);
                g.play(4);
                g.state_hash()
            };
            let b = {
                let mut g = frontier_game(seed);
                g.play(4);
                g.state_hash()
            };
            prop_assert_eq!(a, b);
        }
    }
}
