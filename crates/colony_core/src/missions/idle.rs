//! Fallback mission: stay near a friendly settlement.

use serde::{Deserialize, Serialize};

use super::{move_randomly_within, travel, InvalidReason, MissionContext, UnitMission};
use crate::ai::AiRegistry;
use crate::error::{AiError, Result};
use crate::goal::FirstMatchDecider;
use crate::ids::UnitId;
use crate::map::TilePos;
use crate::pathfinding::{search, CostDecider, Path};
use crate::unit::Unit;
use crate::world::World;

/// How far an idle unit strays from its settlement.
pub const IDLE_RADIUS: u32 = 2;

/// Hang around the nearest own settlement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdleAtSettlementMission {
    unit: UnitId,
}

impl IdleAtSettlementMission {
    /// Element name in saved games.
    pub const NAME: &'static str = "idleAtSettlementMission";

    /// Idle mission for an existing unit.
    pub fn new(world: &World, unit: UnitId) -> Result<Self> {
        world.unit(unit).ok_or(AiError::UnknownUnit(unit))?;
        Ok(Self { unit })
    }

    /// Idle mission without checking the unit.
    #[must_use]
    pub const fn for_unit(unit: UnitId) -> Self {
        Self { unit }
    }

    fn nearest_settlement(world: &World, unit: &Unit, here: TilePos) -> Option<TilePos> {
        world
            .settlements()
            .filter(|s| s.owner == unit.owner)
            .min_by_key(|s| (here.distance(s.tile), s.id))
            .map(|s| s.tile)
    }
}

impl UnitMission for IdleAtSettlementMission {
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
        let (Some(unit), Some(here)) = (ctx.world.unit(self.unit), super::standing_tile(ctx.world, self.unit)) else {
            return Ok(());
        };
        let Some(home) = Self::nearest_settlement(ctx.world, unit, here) else {
            super::move_randomly(ctx, self.unit);
            return Ok(());
        };
        if here.distance(home) <= IDLE_RADIUS {
            move_randomly_within(ctx, self.unit, |tile| tile.distance(home) <= IDLE_RADIUS);
            return Ok(());
        }
        let mut decider = FirstMatchDecider::new(|world: &World, unit: &Unit, path: &Path| {
            world
                .settlement_at(path.destination())
                .is_some_and(|s| s.owner == unit.owner)
        });
        let Some(path) = search(
            ctx.world,
            self.unit,
            &mut decider,
            CostDecider::AvoidIllegal,
            ctx.config.search_range,
            None,
        ) else {
            return Ok(());
        };
        let this = &*self;
        travel(ctx, self.unit, &path, &|w: &World, ai: &AiRegistry| this.is_valid(w, ai));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AiConfig;
    use crate::connection::RecordingConnection;
    use crate::map::{GameMap, Terrain};
    use crate::player::PlayerKind;
    use crate::rng::AiRng;
    use crate::server::LocalServer;
    use crate::settlement::{NativeData, SettlementKind};
    use crate::unit::{Location, UnitType};

    fn run(world: &mut World, mission: &mut IdleAtSettlementMission, seed: u64) {
        let mut ai = AiRegistry::new();
        let config = AiConfig::default();
        let mut connection = RecordingConnection::new(LocalServer::default());
        let mut rng = AiRng::new(seed);
        let mut ctx = MissionContext::new(world, &mut ai, &mut connection, &config, &mut rng);
        mission.do_mission(&mut ctx).unwrap();
    }

    #[test]
    fn test_stays_within_radius() {
        let mut world = World::new(GameMap::new(12, 12, Terrain::Plains));
        let sioux = world.add_player("Sioux", PlayerKind::Native);
        let camp = TilePos::new(6, 6);
        world.found_settlement(sioux, camp, "Camp", SettlementKind::Native(NativeData::default()));
        let brave = world.spawn_unit(sioux, UnitType::Brave, Location::Tile(TilePos::new(7, 6)));
        let mut mission = IdleAtSettlementMission::new(&world, brave).unwrap();
        for seed in 0..5 {
            run(&mut world, &mut mission, seed);
            world.advance_turn();
            let tile = world.unit_tile(brave).unwrap();
            assert!(tile.distance(camp) <= IDLE_RADIUS, "{tile} strayed");
        }
    }

    #[test]
    fn test_heads_home_from_afar() {
        let mut world = World::new(GameMap::new(12, 3, Terrain::Plains));
        let sioux = world.add_player("Sioux", PlayerKind::Native);
        world.found_settlement(sioux, TilePos::new(1, 1), "Camp", SettlementKind::Native(NativeData::default()));
        let brave = world.spawn_unit(sioux, UnitType::Brave, Location::Tile(TilePos::new(10, 1)));
        let mut mission = IdleAtSettlementMission::for_unit(brave);
        run(&mut world, &mut mission, 3);
        assert_eq!(world.unit_tile(brave).map(|t| t.x), Some(7));
    }
}
