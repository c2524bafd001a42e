//! Find a good colony site, go there and build.
//!
//! The site search flood-fills outward from the unit and scores every
//! settleable tile by its value to the owner minus a per-turn travel
//! penalty. The penalty is steep during the opening turns while the unit is
//! still aboard a carrier, so early colonies go up close to where the ships
//! make landfall.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{standing_tile, travel, InvalidReason, Mission, MissionContext, UnitMission, WorkInsideColonyMission};
use crate::ai::AiRegistry;
use crate::config::AiConfig;
use crate::error::{AiError, Result};
use crate::goal::{BestPathDecider, INVALID_SCORE};
use crate::ids::UnitId;
use crate::map::TilePos;
use crate::pathfinding::{find_path, search_from, CostDecider, Path, UNLIMITED_TURNS};
use crate::protocol::ServerRequest;
use crate::transportable::{needs_transport, TransportPoint};
use crate::unit::{Location, Unit};
use crate::world::World;

/// Base score of any settleable site.
pub const SITE_BASE_SCORE: i32 = 10_000;

/// Score of a colony site reached after `turns` turns.
///
/// `early_aboard` selects the opening penalty: the game is still in its
/// first turns and the unit travels aboard a carrier.
#[must_use]
pub fn colony_site_score(value: i32, turns: u32, early_aboard: bool, config: &AiConfig) -> i32 {
    let penalty = if early_aboard {
        config.early_turn_penalty
    } else {
        config.turn_penalty
    };
    SITE_BASE_SCORE + value - turns as i32 * penalty
}

/// Best colony site for `unit` searching from `from`, with its value to the
/// owner. `carrier` is the ship the unit travels on, if any.
#[must_use]
pub fn find_colony_location(
    world: &World,
    unit: UnitId,
    from: TilePos,
    carrier: Option<UnitId>,
    config: &AiConfig,
) -> Option<(TilePos, i32)> {
    let owner = world.unit(unit)?.owner;
    let candidates: std::collections::BTreeMap<TilePos, i32> = world
        .map
        .flood_fill(from)
        .take(config.colony_search_limit)
        .filter(|tile| world.map.colony_value(*tile) > 0)
        .map(|tile| (tile, world.colony_value_for(owner, tile)))
        .filter(|(_, value)| *value > 0)
        .collect();
    if candidates.is_empty() {
        return None;
    }
    let early_aboard = carrier.is_some() && world.turn < config.early_turns;
    let mut decider = BestPathDecider::new(|_: &World, _: &Unit, path: &Path| {
        if path.steps.last().is_some_and(|s| s.on_carrier) {
            return INVALID_SCORE;
        }
        candidates
            .get(&path.destination())
            .map_or(INVALID_SCORE, |value| {
                colony_site_score(*value, path.turns(), early_aboard, config)
            })
    });
    let path = search_from(
        world,
        unit,
        from,
        &mut decider,
        CostDecider::AvoidIllegal,
        UNLIMITED_TURNS,
        carrier,
    )?;
    let site = path.destination();
    Some((site, world.colony_value_for(owner, site)))
}

/// Build a colony.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildColonyMission {
    unit: UnitId,
    target: Option<TilePos>,
    colony_value: i32,
    do_not_give_up: bool,
    colony_built: bool,
}

impl BuildColonyMission {
    /// Element name in saved games.
    pub const NAME: &'static str = "buildColonyMission";

    /// Mission without a site; the first step searches for one.
    pub fn new(world: &World, unit: UnitId) -> Result<Self> {
        let u = world.unit(unit).ok_or(AiError::UnknownUnit(unit))?;
        if u.is_naval() || !u.unit_type.is_colonist() {
            return Err(AiError::InvalidMissionUnit {
                mission: Self::NAME,
                unit,
                reason: "only colonists build colonies",
            });
        }
        Ok(Self {
            unit,
            target: None,
            colony_value: 0,
            do_not_give_up: false,
            colony_built: false,
        })
    }

    /// Mission heading for a known site. The site's current value is the
    /// benchmark it is later held to.
    pub fn with_target(world: &World, unit: UnitId, target: TilePos, do_not_give_up: bool) -> Result<Self> {
        let mut mission = Self::new(world, unit)?;
        let owner = world.unit(unit).map(|u| u.owner).ok_or(AiError::UnknownUnit(unit))?;
        mission.target = Some(target);
        mission.colony_value = world.colony_value_for(owner, target);
        mission.do_not_give_up = do_not_give_up;
        Ok(mission)
    }

    /// Rebuild a mission from saved state.
    pub(crate) fn restored(
        world: &World,
        unit: UnitId,
        target: Option<TilePos>,
        colony_value: i32,
        do_not_give_up: bool,
        colony_built: bool,
    ) -> Result<Self> {
        let mut mission = Self::new(world, unit)?;
        mission.target = target;
        mission.colony_value = colony_value;
        mission.do_not_give_up = do_not_give_up;
        mission.colony_built = colony_built;
        Ok(mission)
    }

    /// Chosen site.
    #[must_use]
    pub fn target(&self) -> Option<TilePos> {
        self.target
    }

    /// Value of the site when it was chosen.
    #[must_use]
    pub fn colony_value(&self) -> i32 {
        self.colony_value
    }

    /// Whether a degraded site triggers a new search instead of ending the
    /// mission.
    #[must_use]
    pub fn do_not_give_up(&self) -> bool {
        self.do_not_give_up
    }

    /// Whether the colony has been built.
    #[must_use]
    pub fn colony_built(&self) -> bool {
        self.colony_built
    }

    fn site_degraded(&self, world: &World, target: TilePos) -> bool {
        let Some(owner) = world.unit(self.unit).map(|u| u.owner) else {
            return true;
        };
        world.settlement_at(target).is_some() || world.colony_value_for(owner, target) < self.colony_value
    }

    fn retarget(&mut self, ctx: &MissionContext<'_>, from: TilePos) -> bool {
        let carrier = match ctx.world.unit(self.unit).map(|u| u.location) {
            Some(Location::Carrier(carrier)) => Some(carrier),
            _ => None,
        };
        match find_colony_location(ctx.world, self.unit, from, carrier, ctx.config) {
            Some((site, value)) => {
                debug!(unit = %self.unit, site = %site, value, "colony site chosen");
                self.target = Some(site);
                self.colony_value = value;
                true
            }
            None => false,
        }
    }

    fn try_build(&mut self, ctx: &mut MissionContext<'_>, target: TilePos) -> Result<bool> {
        let Some(unit) = ctx.world.unit(self.unit) else {
            return Ok(false);
        };
        let eligible = unit.location == Location::Tile(target)
            && unit.moves_left > 0
            && ctx.world.colony_value_for(unit.owner, target) > 0;
        if !eligible {
            return Ok(false);
        }
        let owner = unit.owner;
        let name = colony_name(ctx.world, owner);
        if !ctx.send(ServerRequest::BuildColony {
            unit: self.unit,
            name: name.clone(),
        }) {
            return Ok(false);
        }
        self.colony_built = true;
        info!(unit = %self.unit, tile = %target, %name, "colony founded");
        if let Some(colony) = ctx.world.settlement_at(target).map(|s| s.id) {
            let next = WorkInsideColonyMission::new(ctx.world, self.unit, colony)?;
            ctx.ai.set_mission(self.unit, Mission::WorkInsideColony(next));
        }
        Ok(true)
    }
}

fn colony_name(world: &World, owner: crate::ids::PlayerId) -> String {
    let player = world.player(owner).map_or("Colony", |p| p.name.as_str());
    format!("{player} {}", world.colony_count(owner) + 1)
}

impl UnitMission for BuildColonyMission {
    fn unit(&self) -> UnitId {
        self.unit
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn invalid_reason(&self, world: &World, _ai: &AiRegistry) -> Option<InvalidReason> {
        if !world.has_unit(self.unit) {
            return Some(InvalidReason::UnitDisposed);
        }
        if self.colony_built {
            return Some(InvalidReason::ColonyBuilt);
        }
        match self.target {
            Some(target) if !self.do_not_give_up && self.site_degraded(world, target) => {
                Some(InvalidReason::SiteDegraded)
            }
            _ => None,
        }
    }

    fn do_mission(&mut self, ctx: &mut MissionContext<'_>) -> Result<()> {
        if !self.is_valid(ctx.world, ctx.ai) {
            return Ok(());
        }
        let Some(here) = ctx.world.unit_tile(self.unit) else {
            return Ok(());
        };
        let stale = match self.target {
            None => true,
            Some(target) => self.do_not_give_up && self.site_degraded(ctx.world, target),
        };
        if stale && !self.retarget(ctx, here) {
            return Ok(());
        }
        let Some(target) = self.target else {
            return Ok(());
        };
        if standing_tile(ctx.world, self.unit) == Some(target) {
            self.try_build(ctx, target)?;
            return Ok(());
        }
        let Some(path) = find_path(ctx.world, self.unit, here, target, None, CostDecider::AvoidIllegal) else {
            return Ok(());
        };
        {
            let this = &*self;
            travel(ctx, self.unit, &path, &|w: &World, ai: &AiRegistry| this.is_valid(w, ai));
        }
        if standing_tile(ctx.world, self.unit) == Some(target) {
            self.try_build(ctx, target)?;
        }
        Ok(())
    }

    fn transport_destination(&self, world: &World, _ai: &AiRegistry) -> Option<TransportPoint> {
        let target = self.target?;
        needs_transport(world, self.unit, target).then_some(TransportPoint::Tile(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::RecordingConnection;
    use crate::map::{GameMap, Terrain};
    use crate::player::PlayerKind;
    use crate::rng::AiRng;
    use crate::server::LocalServer;
    use crate::settlement::{ColonyData, SettlementKind};
    use crate::unit::UnitType;

    #[test]
    fn test_fewer_turns_score_higher() {
        let config = AiConfig::default();
        assert!(colony_site_score(100, 1, false, &config) > colony_site_score(100, 2, false, &config));
        assert!(colony_site_score(100, 1, true, &config) > colony_site_score(100, 2, true, &config));
    }

    #[test]
    fn test_higher_value_scores_higher() {
        let config = AiConfig::default();
        assert!(colony_site_score(120, 3, false, &config) > colony_site_score(100, 3, false, &config));
    }

    #[test]
    fn test_early_penalty_is_steeper() {
        let config = AiConfig::default();
        let late = colony_site_score(100, 4, false, &config);
        let early = colony_site_score(100, 4, true, &config);
        assert_eq!(late - early, 4 * (25 - 4));
    }

    #[test]
    fn test_construction_rejects_ships() {
        let mut world = World::new(GameMap::new(4, 4, Terrain::Ocean));
        let dutch = world.add_player("Dutch", PlayerKind::European);
        let ship = world.spawn_unit(dutch, UnitType::Caravel, Location::Tile(TilePos::new(1, 1)));
        assert!(matches!(
            BuildColonyMission::new(&world, ship),
            Err(AiError::InvalidMissionUnit { .. })
        ));
        assert!(matches!(
            BuildColonyMission::new(&world, UnitId(99)),
            Err(AiError::UnknownUnit(_))
        ));
    }

    #[test]
    fn test_invalid_once_site_is_taken() {
        let mut world = World::new(GameMap::new(8, 8, Terrain::Plains));
        let dutch = world.add_player("Dutch", PlayerKind::European);
        let english = world.add_player("English", PlayerKind::European);
        let unit = world.spawn_unit(dutch, UnitType::FreeColonist, Location::Tile(TilePos::new(1, 1)));
        let mission = BuildColonyMission::with_target(&world, unit, TilePos::new(5, 5), false).unwrap();
        let ai = AiRegistry::new();
        assert!(mission.is_valid(&world, &ai));
        world.found_settlement(english, TilePos::new(5, 5), "Jamestown", SettlementKind::Colony(ColonyData::new(3)));
        assert_eq!(mission.invalid_reason(&world, &ai), Some(InvalidReason::SiteDegraded));
    }

    #[test]
    fn test_walks_to_site_and_builds() {
        let mut world = World::new(GameMap::new(8, 8, Terrain::Plains));
        let dutch = world.add_player("Dutch", PlayerKind::European);
        let unit = world.spawn_unit(dutch, UnitType::FreeColonist, Location::Tile(TilePos::new(1, 1)));
        let mut ai = AiRegistry::new();
        let mut mission = BuildColonyMission::with_target(&world, unit, TilePos::new(3, 1), false).unwrap();
        ai.register_unit(unit);
        let mut connection = RecordingConnection::new(LocalServer::default());
        let config = AiConfig::default();
        let mut rng = AiRng::new(3);
        let mut ctx = MissionContext::new(&mut world, &mut ai, &mut connection, &config, &mut rng);
        mission.do_mission(&mut ctx).unwrap();
        assert!(mission.colony_built());
        assert_eq!(world.colony_count(dutch), 1);
        assert!(matches!(ai.mission(unit), Some(Mission::WorkInsideColony(_))));
        assert_eq!(mission.invalid_reason(&world, &ai), Some(InvalidReason::ColonyBuilt));
    }

    #[test]
    fn test_site_search_prefers_close_sites() {
        let mut world = World::new(GameMap::new(12, 12, Terrain::Plains));
        let dutch = world.add_player("Dutch", PlayerKind::European);
        let unit = world.spawn_unit(dutch, UnitType::FreeColonist, Location::Tile(TilePos::new(6, 6)));
        let (site, value) = find_colony_location(&world, unit, TilePos::new(6, 6), None, &AiConfig::default()).unwrap();
        assert!(value > 0);
        assert!(site.distance(TilePos::new(6, 6)) <= 1);
    }
}
