//! Guard a settlement: strike at weaker neighbours, otherwise fortify.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{standing_tile, travel, InvalidReason, MissionContext, UnitMission};
use crate::ai::AiRegistry;
use crate::combat::{attack_advantage, offence_power};
use crate::error::{AiError, Result};
use crate::ids::{SettlementId, UnitId};
use crate::map::Direction;
use crate::math::Fixed;
use crate::pathfinding::{find_path, CostDecider};
use crate::protocol::ServerRequest;
use crate::transportable::{needs_transport, TransportPoint};
use crate::unit::UnitState;
use crate::world::{MoveType, World};

/// Defend one settlement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DefendSettlementMission {
    unit: UnitId,
    settlement: SettlementId,
}

impl DefendSettlementMission {
    /// Element name in saved games.
    pub const NAME: &'static str = "defendSettlementMission";

    /// Assign a land unit to `settlement`.
    pub fn new(world: &World, unit: UnitId, settlement: SettlementId) -> Result<Self> {
        let u = world.unit(unit).ok_or(AiError::UnknownUnit(unit))?;
        if u.is_naval() {
            return Err(AiError::InvalidMissionUnit {
                mission: Self::NAME,
                unit,
                reason: "ships cannot defend settlements",
            });
        }
        world
            .settlement(settlement)
            .ok_or(AiError::UnknownSettlement(settlement))?;
        Ok(Self { unit, settlement })
    }

    /// Rebuild from saved state without checking the references.
    pub(crate) fn restored(unit: UnitId, settlement: SettlementId) -> Self {
        Self { unit, settlement }
    }

    /// The settlement being defended.
    #[must_use]
    pub fn settlement(&self) -> SettlementId {
        self.settlement
    }

    /// Most favourable adjacent attack, scanning neighbours in `directions`
    /// order. Only strictly better advantages replace the current pick.
    fn best_attack(&self, world: &World, directions: &[Direction]) -> Option<Direction> {
        let unit = world.unit(self.unit)?;
        let here = world.unit_tile(self.unit)?;
        let our_attack = offence_power(unit);
        let our_defence = world.defence_of(unit);
        let mut best: Option<(Direction, Fixed)> = None;
        for &direction in directions {
            if world.move_type_now(self.unit, direction) != MoveType::Attack {
                continue;
            }
            let Some(defender) = world.map.step(here, direction).and_then(|t| world.best_defender_at(t)) else {
                continue;
            };
            let advantage = attack_advantage(our_attack, our_defence, offence_power(defender), world.defence_of(defender));
            if advantage > Fixed::ZERO && best.map_or(true, |(_, b)| advantage > b) {
                best = Some((direction, advantage));
            }
        }
        best.map(|(direction, _)| direction)
    }
}

impl UnitMission for DefendSettlementMission {
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
        let Some(settlement) = world.settlement(self.settlement) else {
            return Some(InvalidReason::TargetDisposed);
        };
        if settlement.owner != unit.owner {
            Some(InvalidReason::OwnershipChanged)
        } else if !unit.is_defensive() {
            Some(InvalidReason::NotDefensive)
        } else {
            None
        }
    }

    fn do_mission(&mut self, ctx: &mut MissionContext<'_>) -> Result<()> {
        if !self.is_valid(ctx.world, ctx.ai) {
            return Ok(());
        }
        let offensive = ctx.world.unit(self.unit).is_some_and(|u| u.is_offensive());
        if offensive {
            let directions = ctx.rng.random_directions();
            if let Some(direction) = self.best_attack(ctx.world, &directions) {
                debug!(unit = %self.unit, ?direction, "defender strikes out");
                ctx.send(ServerRequest::Attack {
                    unit: self.unit,
                    direction,
                });
                return Ok(());
            }
        }

        let (Some(here), Some(tile)) = (
            ctx.world.unit_tile(self.unit),
            ctx.world.settlement(self.settlement).map(|s| s.tile),
        ) else {
            return Ok(());
        };
        if here != tile {
            let Some(path) = find_path(ctx.world, self.unit, here, tile, None, CostDecider::AvoidIllegal) else {
                return Ok(());
            };
            // travel never attacks
            let this = &*self;
            travel(ctx, self.unit, &path, &|w: &World, ai: &AiRegistry| this.is_valid(w, ai));
        }
        if standing_tile(ctx.world, self.unit) == Some(tile) {
            let state = ctx.world.unit(self.unit).map(|u| u.state);
            if !matches!(state, Some(UnitState::Fortifying | UnitState::Fortified)) {
                ctx.send(ServerRequest::ChangeState {
                    unit: self.unit,
                    state: UnitState::Fortified,
                });
            }
        }
        Ok(())
    }

    fn transport_destination(&self, world: &World, _ai: &AiRegistry) -> Option<TransportPoint> {
        let tile = world.settlement(self.settlement)?.tile;
        needs_transport(world, self.unit, tile).then_some(TransportPoint::Tile(tile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AiConfig;
    use crate::connection::RecordingConnection;
    use crate::map::{GameMap, Terrain, TilePos};
    use crate::player::{PlayerKind, Stance};
    use crate::rng::AiRng;
    use crate::server::LocalServer;
    use crate::settlement::{ColonyData, SettlementKind};
    use crate::unit::{Location, UnitType};

    fn run(world: &mut World, mission: &mut DefendSettlementMission) -> Vec<ServerRequest> {
        let mut ai = AiRegistry::new();
        let config = AiConfig::default();
        let mut connection = RecordingConnection::new(LocalServer::default());
        let mut rng = AiRng::new(8);
        let mut ctx = MissionContext::new(world, &mut ai, &mut connection, &config, &mut rng);
        mission.do_mission(&mut ctx).unwrap();
        connection.requests().cloned().collect()
    }

    #[test]
    fn test_walks_home_and_fortifies() {
        let mut world = World::new(GameMap::new(10, 3, Terrain::Plains));
        let dutch = world.add_player("Dutch", PlayerKind::European);
        let colony = world.found_settlement(dutch, TilePos::new(4, 1), "Fort Orange", SettlementKind::Colony(ColonyData::new(2)));
        let soldier = world.spawn_unit(dutch, UnitType::Artillery, Location::Tile(TilePos::new(3, 1)));
        let mut mission = DefendSettlementMission::new(&world, soldier, colony).unwrap();
        let requests = run(&mut world, &mut mission);
        assert_eq!(world.unit_tile(soldier), Some(TilePos::new(4, 1)));
        assert!(requests
            .iter()
            .any(|r| matches!(r, ServerRequest::ChangeState { state: UnitState::Fortified, .. })));
        assert_eq!(world.unit(soldier).unwrap().state, UnitState::Fortifying);
    }

    #[test]
    fn test_strikes_weak_neighbour() {
        let mut world = World::new(GameMap::new(10, 3, Terrain::Plains));
        let dutch = world.add_player("Dutch", PlayerKind::European);
        let english = world.add_player("English", PlayerKind::European);
        world.set_stance(dutch, english, Stance::War);
        let colony = world.found_settlement(dutch, TilePos::new(4, 1), "Fort Orange", SettlementKind::Colony(ColonyData::new(2)));
        let guard = world.spawn_unit(dutch, UnitType::VeteranSoldier, Location::Tile(TilePos::new(4, 1)));
        world.unit_mut(guard).unwrap().armed = true;
        let scout = world.spawn_unit(english, UnitType::FreeColonist, Location::Tile(TilePos::new(5, 1)));
        let mut mission = DefendSettlementMission::new(&world, guard, colony).unwrap();
        let requests = run(&mut world, &mut mission);
        assert_eq!(requests, vec![ServerRequest::Attack { unit: guard, direction: Direction::E }]);
        assert!(!world.has_unit(scout));
    }

    #[test]
    fn test_invalid_once_settlement_is_gone() {
        let mut world = World::new(GameMap::new(10, 3, Terrain::Plains));
        let dutch = world.add_player("Dutch", PlayerKind::European);
        let colony = world.found_settlement(dutch, TilePos::new(4, 1), "Fort Orange", SettlementKind::Colony(ColonyData::new(2)));
        let soldier = world.spawn_unit(dutch, UnitType::Artillery, Location::Tile(TilePos::new(1, 1)));
        let mut mission = DefendSettlementMission::new(&world, soldier, colony).unwrap();
        world.dispose_settlement(colony);
        assert_eq!(
            mission.invalid_reason(&world, &AiRegistry::new()),
            Some(InvalidReason::TargetDisposed)
        );
        assert!(run(&mut world, &mut mission).is_empty());
        assert_eq!(world.unit_tile(soldier), Some(TilePos::new(1, 1)));
    }
}
