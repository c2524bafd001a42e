//! Roam and attack whatever comes within reach.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::seek_and_destroy::find_target;
use super::{move_randomly, move_towards, InvalidReason, MissionContext, UnitMission};
use crate::ai::AiRegistry;
use crate::error::{AiError, Result};
use crate::ids::UnitId;
use crate::protocol::ServerRequest;
use crate::world::{MoveType, World};

/// Wander about, striking at targets of opportunity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WanderHostileMission {
    unit: UnitId,
}

impl WanderHostileMission {
    /// Element name in saved games.
    pub const NAME: &'static str = "unitWanderHostileMission";

    /// Mission for an offensive unit.
    pub fn new(world: &World, unit: UnitId) -> Result<Self> {
        let u = world.unit(unit).ok_or(AiError::UnknownUnit(unit))?;
        if !u.is_offensive() {
            return Err(AiError::InvalidMissionUnit {
                mission: Self::NAME,
                unit,
                reason: "unit cannot attack",
            });
        }
        Ok(Self { unit })
    }

    /// Rebuild from saved state.
    pub(crate) fn restored(unit: UnitId) -> Self {
        Self { unit }
    }
}

impl UnitMission for WanderHostileMission {
    fn unit(&self) -> UnitId {
        self.unit
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn invalid_reason(&self, world: &World, _ai: &AiRegistry) -> Option<InvalidReason> {
        match world.unit(self.unit) {
            None => Some(InvalidReason::UnitDisposed),
            Some(unit) if !unit.is_offensive() => Some(InvalidReason::NotOffensive),
            Some(_) => None,
        }
    }

    fn do_mission(&mut self, ctx: &mut MissionContext<'_>) -> Result<()> {
        if !self.is_valid(ctx.world, ctx.ai) {
            return Ok(());
        }
        if let Some((target, path)) = find_target(ctx.world, self.unit, ctx.config.opportunity_range) {
            let this = &*self;
            let pending = move_towards(ctx, self.unit, &path, &|w: &World, ai: &AiRegistry| this.is_valid(w, ai));
            if let Some(direction) = pending {
                if ctx.world.move_type_now(self.unit, direction) == MoveType::Attack {
                    debug!(unit = %self.unit, %target, "wanderer attacks");
                    ctx.send(ServerRequest::Attack {
                        unit: self.unit,
                        direction,
                    });
                    return Ok(());
                }
            }
        }
        move_randomly(ctx, self.unit);
        Ok(())
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
    use crate::unit::{Location, UnitType};

    #[test]
    fn test_angry_brave_attacks_neighbour() {
        let mut world = World::new(GameMap::new(8, 8, Terrain::Plains));
        let sioux = world.add_player("Sioux", PlayerKind::Native);
        let dutch = world.add_player("Dutch", PlayerKind::European);
        world.player_mut(sioux).unwrap().tension.insert(dutch, crate::player::Tension::new(900));
        let brave = world.spawn_unit(sioux, UnitType::Brave, Location::Tile(TilePos::new(3, 3)));
        world.unit_mut(brave).unwrap().armed = true;
        world.spawn_unit(dutch, UnitType::FreeColonist, Location::Tile(TilePos::new(4, 4)));
        let mut mission = WanderHostileMission::new(&world, brave).unwrap();

        let mut ai = AiRegistry::new();
        let config = AiConfig::default();
        let mut connection = RecordingConnection::new(LocalServer::default());
        let mut rng = AiRng::new(1);
        let mut ctx = MissionContext::new(&mut world, &mut ai, &mut connection, &config, &mut rng);
        mission.do_mission(&mut ctx).unwrap();
        assert!(matches!(
            connection.requests().next(),
            Some(ServerRequest::Attack { unit, .. }) if *unit == brave
        ));
    }

    #[test]
    fn test_wanders_without_targets() {
        let mut world = World::new(GameMap::new(8, 8, Terrain::Plains));
        let sioux = world.add_player("Sioux", PlayerKind::Native);
        let brave = world.spawn_unit(sioux, UnitType::Brave, Location::Tile(TilePos::new(3, 3)));
        let mut mission = WanderHostileMission::new(&world, brave).unwrap();
        let mut ai = AiRegistry::new();
        let config = AiConfig::default();
        let mut connection = RecordingConnection::new(LocalServer::default());
        let mut rng = AiRng::new(1);
        let mut ctx = MissionContext::new(&mut world, &mut ai, &mut connection, &config, &mut rng);
        mission.do_mission(&mut ctx).unwrap();
        assert!(connection.requests().all(|r| matches!(r, ServerRequest::Move { .. })));
        assert_eq!(world.unit(brave).unwrap().moves_left, 0);
    }
}
