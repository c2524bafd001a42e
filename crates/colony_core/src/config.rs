//! Tunable AI constants.
//!
//! Every magic number the missions consult lives in [`AiConfig`]. The
//! defaults reproduce the stock AI; a RON file can override any subset:
//!
//! ```ron
//! (
//!     colony_search_limit: 200,
//!     few_colonies: 2,
//! )
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AiError, Result};

/// AI tuning parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Maximum tiles a colony site search visits.
    pub colony_search_limit: usize,
    /// Opening turns during which travel aboard a carrier is penalised hard.
    pub early_turns: u32,
    /// Per-turn site penalty during the opening while aboard a carrier.
    pub early_turn_penalty: i32,
    /// Per-turn site penalty otherwise.
    pub turn_penalty: i32,
    /// Furthest (in turns) a seek-and-destroy target may be.
    pub seek_and_destroy_range: u32,
    /// Range (in turns) of targets of opportunity.
    pub opportunity_range: u32,
    /// Furthest (in turns) a cash-in or idle destination search looks.
    pub search_range: u32,
    /// Below this many colonies carriers ship colonists to found more.
    pub few_colonies: usize,
    /// Gold a player keeps back when buying in Europe.
    pub minimum_gold_reserve: u32,
    /// Raw material a native camp keeps back when picking a gift.
    pub keep_raw_material: u32,
    /// Smallest gift a native unit fetches.
    pub gift_min: u32,
    /// Largest gift a native unit fetches.
    pub gift_max: u32,
    /// Tension relieved per difficulty step below the maximum when a demand is accepted.
    pub demand_accepted_relief: i32,
    /// Tension added per difficulty step when a demand is rejected.
    pub demand_rejected_tension: i32,
    /// Fraction (1/n) of a treasury demanded when there are no goods.
    pub demand_gold_divisor: u32,
    /// Turns to cross the ocean either way.
    pub sail_turns: u32,
    /// Settlements with fewer defenders than this keep their attackers home.
    pub minimum_defenders: usize,
    /// Goods at or below this level trigger a goods wish.
    pub goods_wish_threshold: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            colony_search_limit: 500,
            early_turns: 10,
            early_turn_penalty: 25,
            turn_penalty: 4,
            seek_and_destroy_range: 12,
            opportunity_range: 1,
            search_range: 20,
            few_colonies: 3,
            minimum_gold_reserve: 600,
            keep_raw_material: 50,
            gift_min: 10,
            gift_max: 24,
            demand_accepted_relief: 50,
            demand_rejected_tension: 50,
            demand_gold_divisor: 20,
            sail_turns: 3,
            minimum_defenders: 2,
            goods_wish_threshold: 20,
        }
    }
}

impl AiConfig {
    /// Parse a configuration from RON text. Missing fields keep their defaults.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        ron::from_str(ron).map_err(|e| AiError::Config(e.to_string()))
    }

    /// Load a configuration from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| AiError::Config(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_ron_str(&contents)
    }
}
