//! Answer a colony's wish for a worker.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{standing_tile, travel, InvalidReason, Mission, MissionContext, UnitMission, WorkInsideColonyMission};
use crate::ai::{AiRegistry, WishKind};
use crate::error::{AiError, Result};
use crate::ids::{UnitId, WishId};
use crate::pathfinding::{find_path, CostDecider};
use crate::protocol::ServerRequest;
use crate::transportable::{needs_transport, TransportPoint, IMPORTANT_PRIORITY};
use crate::world::World;

/// Carry a unit to the colony that wished for it and put it to work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WishRealizationMission {
    unit: UnitId,
    wish: WishId,
}

impl WishRealizationMission {
    /// Element name in saved games.
    pub const NAME: &'static str = "wishRealizationMission";

    /// Assign `unit` to a worker wish.
    pub fn new(world: &World, ai: &AiRegistry, unit: UnitId, wish: WishId) -> Result<Self> {
        let u = world.unit(unit).ok_or(AiError::UnknownUnit(unit))?;
        if !u.unit_type.is_colonist() {
            return Err(AiError::InvalidMissionUnit {
                mission: Self::NAME,
                unit,
                reason: "only colonists realize wishes",
            });
        }
        ai.wish(wish).ok_or(AiError::UnknownWish(wish))?;
        Ok(Self { unit, wish })
    }

    /// Rebuild from saved state; the wish may not be restored yet.
    pub(crate) fn restored(unit: UnitId, wish: WishId) -> Self {
        Self { unit, wish }
    }

    /// The wish being realized.
    #[must_use]
    pub fn wish(&self) -> WishId {
        self.wish
    }
}

impl UnitMission for WishRealizationMission {
    fn unit(&self) -> UnitId {
        self.unit
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn invalid_reason(&self, world: &World, ai: &AiRegistry) -> Option<InvalidReason> {
        let Some(unit) = world.unit(self.unit) else {
            return Some(InvalidReason::UnitDisposed);
        };
        let Some(wish) = ai.wish(self.wish) else {
            return Some(InvalidReason::WishGone);
        };
        let Some(colony) = world.settlement(wish.colony) else {
            return Some(InvalidReason::TargetDisposed);
        };
        if colony.owner != unit.owner {
            return Some(InvalidReason::OwnershipChanged);
        }
        match wish.kind {
            WishKind::Worker { .. } if colony.vacancies() == 0 => Some(InvalidReason::NoVacancy),
            WishKind::Worker { .. } => None,
            WishKind::Goods { .. } => Some(InvalidReason::WishGone),
        }
    }

    fn do_mission(&mut self, ctx: &mut MissionContext<'_>) -> Result<()> {
        if !self.is_valid(ctx.world, ctx.ai) {
            return Ok(());
        }
        let Some(colony) = ctx.ai.wish(self.wish).map(|w| w.colony) else {
            return Ok(());
        };
        let (Some(here), Some(tile)) = (
            ctx.world.unit_tile(self.unit),
            ctx.world.settlement(colony).map(|s| s.tile),
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
        if standing_tile(ctx.world, self.unit) != Some(tile) || !self.is_valid(ctx.world, ctx.ai) {
            return Ok(());
        }
        if ctx.send(ServerRequest::JoinColony {
            unit: self.unit,
            colony,
        }) {
            info!(unit = %self.unit, wish = %self.wish, "wish realized");
            ctx.ai.remove_wish(self.wish);
            let next = WorkInsideColonyMission::new(ctx.world, self.unit, colony)?;
            ctx.ai.set_mission(self.unit, Mission::WorkInsideColony(next));
        }
        Ok(())
    }

    fn transport_destination(&self, world: &World, ai: &AiRegistry) -> Option<TransportPoint> {
        let colony = ai.wish(self.wish)?.colony;
        let tile = world.settlement(colony)?.tile;
        needs_transport(world, self.unit, tile).then_some(TransportPoint::Tile(tile))
    }

    fn transport_priority(&self) -> u32 {
        IMPORTANT_PRIORITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AiConfig;
    use crate::connection::RecordingConnection;
    use crate::map::{GameMap, Terrain, TilePos};
    use crate::player::PlayerKind;
    use crate::rng::AiRng;
    use crate::server::LocalServer;
    use crate::settlement::{ColonyData, SettlementKind};
    use crate::unit::{Location, UnitType};

    #[test]
    fn test_walks_in_and_consumes_wish() {
        let mut world = World::new(GameMap::new(10, 4, Terrain::Plains));
        let dutch = world.add_player("Dutch", PlayerKind::European);
        let colony = world.found_settlement(dutch, TilePos::new(5, 1), "Fort Nassau", SettlementKind::Colony(ColonyData::new(2)));
        let unit = world.spawn_unit(dutch, UnitType::FreeColonist, Location::Tile(TilePos::new(3, 1)));
        let mut ai = AiRegistry::new();
        let config = AiConfig::default();
        ai.refresh_wishes(&world, dutch, &config);
        let wish = ai
            .wishes()
            .find(|w| matches!(w.kind, WishKind::Worker { .. }))
            .map(|w| w.id)
            .unwrap();
        let mut mission = WishRealizationMission::new(&world, &ai, unit, wish).unwrap();
        ai.register_unit(unit);

        let mut connection = RecordingConnection::new(LocalServer::default());
        let mut rng = AiRng::new(5);
        let mut ctx = MissionContext::new(&mut world, &mut ai, &mut connection, &config, &mut rng);
        mission.do_mission(&mut ctx).unwrap();

        assert_eq!(world.unit(unit).unwrap().location, Location::Working(colony));
        assert!(ai.wish(wish).is_none());
        assert!(matches!(ai.mission(unit), Some(Mission::WorkInsideColony(_))));
        assert_eq!(mission.invalid_reason(&world, &ai), Some(InvalidReason::WishGone));
    }
}
