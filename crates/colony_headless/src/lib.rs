//! Headless runner for the colonial AI.
//!
//! Loads a scenario, hands every AI player to the mission scheduler and
//! plays a fixed number of turns against the in-process server. Used for:
//!
//! - **AI soak testing**: long games expose missions that stall or error
//! - **CI verification**: the same seed must always reach the same state
//! - **Tuning**: batches over many seeds compare [`colony_core::config::AiConfig`] variants
//!
//! # Example
//!
//! ```bash
//! cargo run -p colony_headless -- run --scenario frontier --turns 60
//! cargo run -p colony_headless -- batch --count 500 --output results/
//! ```

pub mod batch;
pub mod metrics;
pub mod runner;
pub mod scenario;

pub use batch::{run_batch, BatchConfig, BatchResults};
pub use metrics::{BatchSummary, GameMetrics, MetricsCollector};
pub use runner::{run_game, verify, GameConfig, GameResult, RunError};
pub use scenario::{Scenario, ScenarioError};
