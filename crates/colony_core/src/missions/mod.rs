//! Per-unit AI tasks.
//!
//! A mission drives exactly one unit. Once per turn the scheduler calls
//! [`UnitMission::do_mission`], which moves the unit at most one turn's
//! worth of steps and then performs at most one terminal action (build,
//! attack, fortify, trade). Whether a mission can still run is answered by
//! [`UnitMission::invalid_reason`], which never has side effects.
//!
//! Movement is shared: [`move_towards`] walks a path while the steps stay
//! in the current turn and remain plain moves, then hands the pending
//! direction back so each mission can layer its own terminal action on top.

pub mod build_colony;
pub mod cash_in;
pub mod defend_settlement;
pub mod idle;
pub mod indian_demand;
pub mod manifest;
pub mod seek_and_destroy;
pub mod transport;
pub mod wander_hostile;
pub mod wish_realization;
pub mod work_inside_colony;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::ai::AiRegistry;
use crate::config::AiConfig;
use crate::connection::Connection;
use crate::error::Result;
use crate::goal::FirstMatchDecider;
use crate::ids::{SettlementId, UnitId};
use crate::map::{Direction, TilePos};
use crate::pathfinding::{search, CostDecider, Path};
use crate::protocol::{ServerRequest, ServerResponse};
use crate::rng::AiRng;
use crate::transportable::{TransportPoint, NORMAL_PRIORITY};
use crate::unit::Unit;
use crate::world::{MoveType, World};

pub use build_colony::BuildColonyMission;
pub use cash_in::CashInTreasureTrainMission;
pub use defend_settlement::DefendSettlementMission;
pub use idle::IdleAtSettlementMission;
pub use indian_demand::IndianDemandMission;
pub use seek_and_destroy::SeekAndDestroyMission;
pub use transport::TransportMission;
pub use wander_hostile::WanderHostileMission;
pub use wish_realization::WishRealizationMission;
pub use work_inside_colony::WorkInsideColonyMission;

// ============================================================================
// Targets and validity
// ============================================================================

/// Something a mission is heading for, resolved against the live world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    /// A colony or native settlement.
    Settlement(SettlementId),
    /// A unit.
    Unit(UnitId),
    /// A map tile.
    Tile(TilePos),
}

impl Target {
    /// Tile the target currently occupies. `None` once it is gone or off
    /// the map.
    #[must_use]
    pub fn tile(self, world: &World) -> Option<TilePos> {
        match self {
            Self::Settlement(id) => world.settlement(id).map(|s| s.tile),
            Self::Unit(id) => world.unit_tile(id),
            Self::Tile(tile) => world.map.in_bounds(tile).then_some(tile),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Settlement(id) => write!(f, "{id}"),
            Self::Unit(id) => write!(f, "{id}"),
            Self::Tile(tile) => write!(f, "{tile}"),
        }
    }
}

/// Why a mission can no longer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvalidReason {
    /// The mission's own unit is gone.
    UnitDisposed,
    /// The target was disposed.
    TargetDisposed,
    /// The target belongs to the unit's owner.
    TargetOwnedBySelf,
    /// The target changed hands.
    OwnershipChanged,
    /// Diplomacy no longer permits an attack.
    CannotAttack,
    /// Ships do not attack settlements.
    NavalAgainstSettlement,
    /// The unit can no longer attack.
    NotOffensive,
    /// The unit can no longer defend.
    NotDefensive,
    /// The colony has been built.
    ColonyBuilt,
    /// The colony site lost value since it was chosen.
    SiteDegraded,
    /// The wish was fulfilled or withdrawn.
    WishGone,
    /// No matching work place is vacant.
    NoVacancy,
    /// The mission ran to completion.
    Completed,
    /// The unit is not a carrier.
    NotACarrier,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::UnitDisposed => "unit disposed",
            Self::TargetDisposed => "target disposed",
            Self::TargetOwnedBySelf => "target owned by self",
            Self::OwnershipChanged => "ownership changed",
            Self::CannotAttack => "cannot attack target owner",
            Self::NavalAgainstSettlement => "naval unit against settlement",
            Self::NotOffensive => "unit not offensive",
            Self::NotDefensive => "unit not defensive",
            Self::ColonyBuilt => "colony built",
            Self::SiteDegraded => "colony site degraded",
            Self::WishGone => "wish gone",
            Self::NoVacancy => "no vacancy",
            Self::Completed => "completed",
            Self::NotACarrier => "not a carrier",
        };
        f.write_str(text)
    }
}

// ============================================================================
// Mission trait and sum type
// ============================================================================

/// Behaviour shared by every mission.
pub trait UnitMission {
    /// The unit this mission drives.
    fn unit(&self) -> UnitId;

    /// Stable element name used in logs and saved games.
    fn name(&self) -> &'static str;

    /// Why the mission cannot run, or `None` if it can.
    fn invalid_reason(&self, world: &World, ai: &AiRegistry) -> Option<InvalidReason>;

    /// Whether the mission can still run.
    fn is_valid(&self, world: &World, ai: &AiRegistry) -> bool {
        self.invalid_reason(world, ai).is_none()
    }

    /// Perform one turn's worth of work.
    fn do_mission(&mut self, ctx: &mut MissionContext<'_>) -> Result<()>;

    /// Where the unit needs to be carried, if it cannot get there itself.
    fn transport_destination(&self, _world: &World, _ai: &AiRegistry) -> Option<TransportPoint> {
        None
    }

    /// How urgently the unit wants a carrier.
    fn transport_priority(&self) -> u32 {
        NORMAL_PRIORITY
    }

    /// Release whatever the mission holds on to. Called once when the
    /// mission is discarded.
    fn dispose(&mut self, _world: &World, _ai: &mut AiRegistry) {}
}

/// Every kind of mission.
#[derive(Debug, Clone, PartialEq)]
pub enum Mission {
    /// Found a colony.
    BuildColony(BuildColonyMission),
    /// Carry units and goods.
    Transport(TransportMission),
    /// Hunt down a unit or settlement.
    SeekAndDestroy(SeekAndDestroyMission),
    /// Guard a settlement.
    DefendSettlement(DefendSettlementMission),
    /// Extort goods from a colony.
    IndianDemand(IndianDemandMission),
    /// Bring a treasure train to port.
    CashInTreasureTrain(CashInTreasureTrainMission),
    /// Answer a colony's wish.
    WishRealization(WishRealizationMission),
    /// Work in a colony.
    WorkInsideColony(WorkInsideColonyMission),
    /// Hang around a friendly settlement.
    IdleAtSettlement(IdleAtSettlementMission),
    /// Roam and strike at whatever is in reach.
    WanderHostile(WanderHostileMission),
}

macro_rules! dispatch {
    ($self:expr, $m:ident => $body:expr) => {
        match $self {
            Mission::BuildColony($m) => $body,
            Mission::Transport($m) => $body,
            Mission::SeekAndDestroy($m) => $body,
            Mission::DefendSettlement($m) => $body,
            Mission::IndianDemand($m) => $body,
            Mission::CashInTreasureTrain($m) => $body,
            Mission::WishRealization($m) => $body,
            Mission::WorkInsideColony($m) => $body,
            Mission::IdleAtSettlement($m) => $body,
            Mission::WanderHostile($m) => $body,
        }
    };
}

impl UnitMission for Mission {
    fn unit(&self) -> UnitId {
        dispatch!(self, m => m.unit())
    }

    fn name(&self) -> &'static str {
        dispatch!(self, m => m.name())
    }

    fn invalid_reason(&self, world: &World, ai: &AiRegistry) -> Option<InvalidReason> {
        dispatch!(self, m => m.invalid_reason(world, ai))
    }

    fn do_mission(&mut self, ctx: &mut MissionContext<'_>) -> Result<()> {
        dispatch!(self, m => m.do_mission(ctx))
    }

    fn transport_destination(&self, world: &World, ai: &AiRegistry) -> Option<TransportPoint> {
        dispatch!(self, m => m.transport_destination(world, ai))
    }

    fn transport_priority(&self) -> u32 {
        dispatch!(self, m => m.transport_priority())
    }

    fn dispose(&mut self, world: &World, ai: &mut AiRegistry) {
        dispatch!(self, m => m.dispose(world, ai))
    }
}

// ============================================================================
// Context
// ============================================================================

/// Everything a mission step may touch.
pub struct MissionContext<'a> {
    /// The shared game state. Unit and settlement changes go through
    /// [`MissionContext::ask`]; missions only update their own player's
    /// native tension directly.
    pub world: &'a mut World,
    /// AI bookkeeping.
    pub ai: &'a mut AiRegistry,
    /// Channel to the server.
    pub connection: &'a mut dyn Connection,
    /// Tuning constants.
    pub config: &'a AiConfig,
    /// Seeded randomness.
    pub rng: &'a mut AiRng,
    /// Requests refused so far.
    pub failed_requests: usize,
}

impl<'a> MissionContext<'a> {
    /// Bundle the collaborators of a mission step.
    pub fn new(
        world: &'a mut World,
        ai: &'a mut AiRegistry,
        connection: &'a mut dyn Connection,
        config: &'a AiConfig,
        rng: &'a mut AiRng,
    ) -> Self {
        Self {
            world,
            ai,
            connection,
            config,
            rng,
            failed_requests: 0,
        }
    }

    /// Send a request and wait for the reply. Failures are logged and
    /// swallowed; the world is unchanged and the step is retried next turn.
    pub fn ask(&mut self, request: ServerRequest) -> Option<ServerResponse> {
        match self.connection.ask(self.world, &request) {
            Ok(reply) => {
                trace!(request = request.name(), "request accepted");
                Some(reply)
            }
            Err(error) => {
                warn!(request = request.name(), %error, "request failed");
                self.failed_requests += 1;
                None
            }
        }
    }

    /// Send a request, reporting only whether it went through.
    pub fn send(&mut self, request: ServerRequest) -> bool {
        self.ask(request).is_some()
    }

    /// Step a unit one tile, exploring if the tile holds a rumour.
    pub fn move_unit(&mut self, unit: UnitId, direction: Direction) -> bool {
        let request = if self.world.move_type_now(unit, direction) == MoveType::ExploreRumour {
            ServerRequest::Explore { unit, direction }
        } else {
            ServerRequest::Move { unit, direction }
        };
        self.send(request)
    }
}

// ============================================================================
// Shared movement
// ============================================================================

/// Walk `path` as far as this turn allows.
///
/// Moves are issued while the next step is not the last one, lies in the
/// current turn, is a plain move (move, move to high seas, explore) and
/// `valid` still holds. The walk stops at the first step that fails any of
/// these. If that step lies in the current turn and is a legal move of any
/// kind its direction is returned for the caller to act on; otherwise the
/// result is `None`. A refused request also ends the walk with `None`.
pub fn move_towards(
    ctx: &mut MissionContext<'_>,
    unit: UnitId,
    path: &Path,
    valid: &dyn Fn(&World, &AiRegistry) -> bool,
) -> Option<Direction> {
    let last = path.len().checked_sub(1)?;
    for (index, step) in path.steps.iter().enumerate() {
        if step.turns > 0 || !valid(ctx.world, ctx.ai) {
            return None;
        }
        let move_type = ctx.world.move_type_now(unit, step.direction);
        if index == last || !move_type.is_progressing() {
            return move_type.is_progress().then_some(step.direction);
        }
        if !ctx.move_unit(unit, step.direction) {
            return None;
        }
    }
    None
}

/// [`move_towards`], then also take the final step if it is a plain move.
/// Returns the direction of a pending attack or embarkation.
pub fn travel(
    ctx: &mut MissionContext<'_>,
    unit: UnitId,
    path: &Path,
    valid: &dyn Fn(&World, &AiRegistry) -> bool,
) -> Option<Direction> {
    let direction = move_towards(ctx, unit, path, valid)?;
    if ctx.world.move_type_now(unit, direction).is_progressing() {
        ctx.move_unit(unit, direction);
        return None;
    }
    Some(direction)
}

/// Spend the remaining moves wandering: each step takes the first
/// direction of a fresh shuffle that is a plain move.
pub fn move_randomly(ctx: &mut MissionContext<'_>, unit: UnitId) {
    move_randomly_within(ctx, unit, |_| true);
}

/// [`move_randomly`] restricted to tiles accepted by `allowed`.
pub fn move_randomly_within(
    ctx: &mut MissionContext<'_>,
    unit: UnitId,
    allowed: impl Fn(TilePos) -> bool,
) {
    let budget = ctx.world.unit(unit).map_or(0, Unit::max_moves);
    for _ in 0..budget {
        let Some(here) = ctx.world.unit_tile(unit) else {
            return;
        };
        if ctx.world.unit(unit).map_or(0, |u| u.moves_left) == 0 {
            return;
        }
        let directions = ctx.rng.random_directions();
        let Some(direction) = directions.into_iter().find(|d| {
            ctx.world.move_type_now(unit, *d) == MoveType::Move
                && ctx.world.map.step(here, *d).is_some_and(&allowed)
        }) else {
            return;
        };
        if !ctx.send(ServerRequest::Move { unit, direction }) {
            return;
        }
    }
}

/// Shortest path to a tile next to `target` (or onto it) from which the
/// unit can act on it.
#[must_use]
pub fn path_next_to(world: &World, unit: UnitId, target: TilePos, cost: CostDecider, max_turns: u32) -> Option<Path> {
    let mut decider = FirstMatchDecider::new(|_: &World, _: &Unit, path: &Path| {
        path.destination().distance(target) <= 1
    });
    search(world, unit, &mut decider, cost, max_turns, None)
}

/// Tile of a unit standing on the map, or `None` in Europe, at sea or
/// aboard a carrier.
#[must_use]
pub fn standing_tile(world: &World, unit: UnitId) -> Option<TilePos> {
    match world.unit(unit)?.location {
        crate::unit::Location::Tile(tile) => Some(tile),
        _ => None,
    }
}
