//! Scenarios loaded from RON files play exactly like the built-ins they
//! were exported from.

use colony_core::config::AiConfig;
use colony_headless::runner::{run_game, GameConfig};
use colony_headless::scenario::Scenario;
use colony_test_utils::determinism::AiGame;
use colony_test_utils::fixtures::from_ron;

fn export(scenario: &Scenario) -> String {
    ron::ser::to_string_pretty(scenario, ron::ser::PrettyConfig::default()).unwrap()
}

#[test]
fn test_exported_scenario_builds_the_same_world() {
    for scenario in [Scenario::two_shores(), Scenario::frontier()] {
        let parsed: Scenario = from_ron(&export(&scenario));
        let (original, _) = scenario.build_world().unwrap();
        let (reloaded, _) = parsed.build_world().unwrap();
        assert_eq!(original.state_hash(), reloaded.state_hash(), "{}", scenario.name);
    }
}

#[test]
fn test_scenario_file_plays_like_the_builtin() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frontier.ron");
    std::fs::write(&path, export(&Scenario::frontier())).unwrap();

    let from_file = Scenario::resolve(path.to_str().unwrap()).unwrap();
    let a = run_game(&GameConfig::new(from_file, 21).with_turns(10)).unwrap();
    let b = run_game(&GameConfig::new(Scenario::frontier(), 21).with_turns(10)).unwrap();
    assert_eq!(a.metrics.final_state_hash, b.metrics.final_state_hash);
    assert_eq!(a.metrics.totals, b.metrics.totals);
}

#[test]
fn test_runner_matches_the_test_harness() {
    let scenario = Scenario::two_shores();
    let result = run_game(&GameConfig::new(scenario.clone(), 4).with_turns(7)).unwrap();

    let (world, players) = scenario.build_world().unwrap();
    let mut game = AiGame::new(world, players, AiConfig::default(), 4);
    game.play(7);
    assert_eq!(game.world.state_hash(), result.metrics.final_state_hash);
    assert_eq!(game.reports.len(), 7);
}
