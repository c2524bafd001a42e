//! # Colony Core
//!
//! Deterministic AI mission core for a turn-based colonial strategy game.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO (besides the explicit snapshot save/load helpers)
//! - No system randomness (all choices draw from a seeded [`rng::AiRng`])
//! - No floating-point math (power ratios use fixed-point)
//!
//! Every AI unit carries one mission. Once per turn the
//! [`scheduler::TurnScheduler`] replaces missions that can no longer run,
//! hands waiting units and goods to carriers, and gives each mission one
//! step. Missions act on the world only through requests sent over a
//! [`connection::Connection`].
//!
//! ## Crate Structure
//!
//! - [`world`], [`map`], [`unit`], [`settlement`], [`player`], [`goods`] - World model
//! - [`pathfinding`], [`goal`] - Path search and goal deciders
//! - [`missions`] - Per-unit missions and the transport manifest
//! - [`ai`], [`transportable`] - AI bookkeeping and cargo handles
//! - [`scheduler`] - Turn orchestration and mission choice
//! - [`protocol`], [`connection`], [`server`] - Request boundary and in-process server
//! - [`persistence`] - AI snapshots
//! - [`math`], [`combat`] - Fixed-point power estimates

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod ai;
pub mod combat;
pub mod config;
pub mod connection;
pub mod error;
pub mod goal;
pub mod goods;
pub mod ids;
pub mod map;
pub mod math;
pub mod missions;
pub mod pathfinding;
pub mod persistence;
pub mod player;
pub mod protocol;
pub mod rng;
pub mod scheduler;
pub mod server;
pub mod settlement;
pub mod transportable;
pub mod unit;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::ai::{AiGoods, AiRegistry, AiUnit, GoodsLocation, Wish, WishKind};
    pub use crate::config::AiConfig;
    pub use crate::connection::{Connection, ConnectionError, RecordingConnection, ScriptedConnection};
    pub use crate::error::{AiError, Result};
    pub use crate::goods::{Goods, GoodsType};
    pub use crate::ids::{AiGoodsId, PlayerId, SettlementId, UnitId, WishId};
    pub use crate::map::{Direction, GameMap, Terrain, TilePos};
    pub use crate::math::Fixed;
    pub use crate::missions::{InvalidReason, Mission, MissionContext, Target, UnitMission};
    pub use crate::persistence::AiSnapshot;
    pub use crate::player::{PlayerKind, Stance, Tension, TensionLevel};
    pub use crate::protocol::{ServerRequest, ServerResponse};
    pub use crate::rng::AiRng;
    pub use crate::scheduler::{MissionChooser, StandardMissionChooser, TurnReport, TurnScheduler};
    pub use crate::server::LocalServer;
    pub use crate::settlement::{ColonyData, NativeData, SettlementKind};
    pub use crate::transportable::{TransportPoint, TransportableRef};
    pub use crate::unit::{Location, UnitState, UnitType};
    pub use crate::world::World;
}
