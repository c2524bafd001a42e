//! Go to a colony and take up a work place there.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{standing_tile, travel, InvalidReason, MissionContext, UnitMission};
use crate::ai::AiRegistry;
use crate::error::{AiError, Result};
use crate::ids::{SettlementId, UnitId};
use crate::pathfinding::{find_path, CostDecider};
use crate::protocol::ServerRequest;
use crate::transportable::{needs_transport, TransportPoint};
use crate::unit::Location;
use crate::world::World;

/// Work inside a colony. Once the unit has joined, the mission simply
/// stays valid while the colony stands.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkInsideColonyMission {
    unit: UnitId,
    colony: SettlementId,
}

impl WorkInsideColonyMission {
    /// Element name in saved games.
    pub const NAME: &'static str = "workInsideColonyMission";

    /// Send a land unit to work in `colony`.
    pub fn new(world: &World, unit: UnitId, colony: SettlementId) -> Result<Self> {
        let u = world.unit(unit).ok_or(AiError::UnknownUnit(unit))?;
        if u.is_naval() {
            return Err(AiError::InvalidMissionUnit {
                mission: Self::NAME,
                unit,
                reason: "ships cannot work in colonies",
            });
        }
        world.settlement(colony).ok_or(AiError::UnknownSettlement(colony))?;
        Ok(Self { unit, colony })
    }

    /// Rebuild from saved state.
    pub(crate) fn restored(unit: UnitId, colony: SettlementId) -> Self {
        Self { unit, colony }
    }

    /// The colony.
    #[must_use]
    pub fn colony(&self) -> SettlementId {
        self.colony
    }

    fn is_working(&self, world: &World) -> bool {
        world
            .unit(self.unit)
            .is_some_and(|u| u.location == Location::Working(self.colony))
    }
}

impl UnitMission for WorkInsideColonyMission {
    fn unit(&self) -> UnitId {
        self.unit
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn invalid_reason(&self, world: &World, _ai: &AiRegistry) -> Option<InvalidReason> {
        let Some(unit) = world.unit(self.unit) else {
            return Some(InvalidReason::UnitDisposed);
        };
        let Some(colony) = world.settlement(self.colony) else {
            return Some(InvalidReason::TargetDisposed);
        };
        (colony.owner != unit.owner).then_some(InvalidReason::OwnershipChanged)
    }

    fn do_mission(&mut self, ctx: &mut MissionContext<'_>) -> Result<()> {
        if !self.is_valid(ctx.world, ctx.ai) || self.is_working(ctx.world) {
            return Ok(());
        }
        let (Some(here), Some(tile)) = (
            ctx.world.unit_tile(self.unit),
            ctx.world.settlement(self.colony).map(|s| s.tile),
        ) else {
            return Ok(());
        };
        if here != tile {
            let Some(path) = find_path(ctx.world, self.unit, here, tile, None, CostDecider::AvoidIllegal) else {
                return Ok(());
            };
            let this = &*self;
            travel(ctx, self.unit, &path, &|w: &World, ai: &AiRegistry| this.is_valid(w, ai));
        }
        let vacant = ctx.world.settlement(self.colony).map_or(0, |s| s.vacancies()) > 0;
        if standing_tile(ctx.world, self.unit) == Some(tile)
            && vacant
            && ctx.send(ServerRequest::JoinColony {
                unit: self.unit,
                colony: self.colony,
            })
        {
            debug!(unit = %self.unit, colony = %self.colony, "joined colony");
        }
        Ok(())
    }

    fn transport_destination(&self, world: &World, _ai: &AiRegistry) -> Option<TransportPoint> {
        if self.is_working(world) {
            return None;
        }
        let tile = world.settlement(self.colony)?.tile;
        needs_transport(world, self.unit, tile).then_some(TransportPoint::Tile(tile))
    }
}
