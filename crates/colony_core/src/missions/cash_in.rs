//! Bring a treasure train to a port and cash it in.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{standing_tile, travel, InvalidReason, MissionContext, UnitMission};
use crate::ai::AiRegistry;
use crate::error::{AiError, Result};
use crate::goal::FirstMatchDecider;
use crate::ids::UnitId;
use crate::map::TilePos;
use crate::pathfinding::{search, CostDecider, Path, UNLIMITED_TURNS};
use crate::protocol::{ServerRequest, ServerResponse};
use crate::transportable::{TransportPoint, IMPORTANT_PRIORITY};
use crate::unit::Unit;
use crate::world::World;

/// Cash in a treasure train.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CashInTreasureTrainMission {
    unit: UnitId,
}

impl CashInTreasureTrainMission {
    /// Element name in saved games.
    pub const NAME: &'static str = "cashInTreasureTrainMission";

    /// Mission for a treasure train.
    pub fn new(world: &World, unit: UnitId) -> Result<Self> {
        let u = world.unit(unit).ok_or(AiError::UnknownUnit(unit))?;
        if !u.is_treasure_train() {
            return Err(AiError::InvalidMissionUnit {
                mission: Self::NAME,
                unit,
                reason: "not a treasure train",
            });
        }
        Ok(Self { unit })
    }

    /// Rebuild from saved state.
    pub(crate) fn restored(unit: UnitId) -> Self {
        Self { unit }
    }

    /// Nearest reachable tile where the treasure can be cashed in.
    fn find_cash_in_path(&self, world: &World, max_turns: u32) -> Option<Path> {
        let mut decider = FirstMatchDecider::new(|world: &World, unit: &Unit, path: &Path| {
            world.is_cash_in_tile(unit.owner, path.destination())
        });
        search(world, self.unit, &mut decider, CostDecider::AvoidIllegal, max_turns, None)
    }

    /// Own coastal colony closest to the treasure, for a carrier to aim at.
    fn nearest_port(&self, world: &World) -> Option<TilePos> {
        let unit = world.unit(self.unit)?;
        let from = world.unit_tile(self.unit)?;
        world
            .colonies_of(unit.owner)
            .filter(|s| world.is_cash_in_tile(unit.owner, s.tile))
            .min_by_key(|s| (from.distance(s.tile), s.id))
            .map(|s| s.tile)
    }
}

impl UnitMission for CashInTreasureTrainMission {
    fn unit(&self) -> UnitId {
        self.unit
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn invalid_reason(&self, world: &World, _ai: &AiRegistry) -> Option<InvalidReason> {
        (!world.has_unit(self.unit)).then_some(InvalidReason::UnitDisposed)
    }

    fn do_mission(&mut self, ctx: &mut MissionContext<'_>) -> Result<()> {
        if !self.is_valid(ctx.world, ctx.ai) {
            return Ok(());
        }
        let Some(owner) = ctx.world.unit(self.unit).map(|u| u.owner) else {
            return Ok(());
        };
        let at_port = |world: &World| {
            standing_tile(world, self.unit).is_some_and(|t| world.is_cash_in_tile(owner, t))
        };
        if !at_port(ctx.world) {
            let Some(path) = self.find_cash_in_path(ctx.world, ctx.config.search_range) else {
                return Ok(());
            };
            let this = &*self;
            travel(ctx, self.unit, &path, &|w: &World, ai: &AiRegistry| this.is_valid(w, ai));
        }
        if at_port(ctx.world) {
            if let Some(ServerResponse::CashIn { amount }) =
                ctx.ask(ServerRequest::CashInTreasureTrain { unit: self.unit })
            {
                info!(unit = %self.unit, amount, "treasure cashed in");
            }
        }
        Ok(())
    }

    fn transport_destination(&self, world: &World, _ai: &AiRegistry) -> Option<TransportPoint> {
        if self.find_cash_in_path(world, UNLIMITED_TURNS).is_some() {
            return None;
        }
        self.nearest_port(world).map(TransportPoint::Tile)
    }

    fn transport_priority(&self) -> u32 {
        IMPORTANT_PRIORITY
    }
}
