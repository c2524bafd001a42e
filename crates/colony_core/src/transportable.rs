//! Anything that may ask a carrier for a ride.
//!
//! A [`TransportableRef`] is a handle to either an AI unit or an AI goods
//! wrapper. Where it has to be picked up, where it wants to go and how
//! urgently are all resolved against the live world and registry, so a
//! transport manifest only ever stores handles.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ai::{AiRegistry, GoodsLocation};
use crate::ids::{AiGoodsId, UnitId};
use crate::map::TilePos;
use crate::missions::UnitMission;
use crate::pathfinding::{find_path, CostDecider};
use crate::unit::{Location, SailingTo};
use crate::world::World;

/// Priority of ordinary transport requests.
pub const NORMAL_PRIORITY: u32 = 100;

/// Priority of requests that unblock something important.
pub const IMPORTANT_PRIORITY: u32 = 150;

/// Priority of requests that can wait.
pub const MINOR_PRIORITY: u32 = 50;

/// A place a carrier can visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TransportPoint {
    /// A map tile.
    Tile(TilePos),
    /// The docks in Europe.
    Europe,
}

impl fmt::Display for TransportPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tile(tile) => write!(f, "{tile}"),
            Self::Europe => f.write_str("Europe"),
        }
    }
}

/// Where a unit is, as a transport point. `None` while crossing the ocean.
#[must_use]
pub fn unit_point(world: &World, unit: UnitId) -> Option<TransportPoint> {
    let u = world.unit(unit)?;
    match u.location {
        Location::Europe => Some(TransportPoint::Europe),
        Location::Sailing { .. } => None,
        Location::Carrier(carrier) => unit_point(world, carrier),
        Location::Tile(_) | Location::Working(_) => world.unit_tile(unit).map(TransportPoint::Tile),
    }
}

/// Where a carrier is or will be once its crossing ends.
#[must_use]
pub fn carrier_point(world: &World, carrier: UnitId) -> Option<TransportPoint> {
    let u = world.unit(carrier)?;
    match u.location {
        Location::Sailing {
            destination: SailingTo::Europe,
            ..
        } => Some(TransportPoint::Europe),
        Location::Sailing {
            destination: SailingTo::America,
            ..
        } => world
            .player(u.owner)
            .map(|p| TransportPoint::Tile(p.entry_location)),
        _ => unit_point(world, carrier),
    }
}

/// Whether a unit has to be carried to reach `target`.
#[must_use]
pub fn needs_transport(world: &World, unit: UnitId, target: TilePos) -> bool {
    let Some(u) = world.unit(unit) else {
        return false;
    };
    if matches!(u.location, Location::Carrier(_)) {
        return world.unit_tile(unit) != Some(target);
    }
    match world.unit_tile(unit) {
        None => true,
        Some(here) => find_path(world, unit, here, target, None, CostDecider::AvoidIllegal).is_none(),
    }
}

/// Handle to something that can be transported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TransportableRef {
    /// An AI unit.
    Unit(UnitId),
    /// An AI goods wrapper.
    Goods(AiGoodsId),
}

impl fmt::Display for TransportableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit(id) => write!(f, "{id}"),
            Self::Goods(id) => write!(f, "{id}"),
        }
    }
}

impl TransportableRef {
    /// Whether the referenced object still exists.
    #[must_use]
    pub fn exists(self, world: &World, ai: &AiRegistry) -> bool {
        match self {
            Self::Unit(id) => world.has_unit(id),
            Self::Goods(id) => ai.goods(id).is_some(),
        }
    }

    /// Where the item has to be picked up.
    #[must_use]
    pub fn source(self, world: &World, ai: &AiRegistry) -> Option<TransportPoint> {
        match self {
            Self::Unit(id) => unit_point(world, id),
            Self::Goods(id) => match ai.goods(id)?.location {
                GoodsLocation::Europe => Some(TransportPoint::Europe),
                GoodsLocation::Settlement(s) => {
                    world.settlement(s).map(|s| TransportPoint::Tile(s.tile))
                }
                GoodsLocation::Carrier(carrier) => unit_point(world, carrier),
            },
        }
    }

    /// Where the item wants to go.
    #[must_use]
    pub fn destination(self, world: &World, ai: &AiRegistry) -> Option<TransportPoint> {
        match self {
            Self::Unit(id) => ai
                .ai_unit(id)?
                .mission
                .as_ref()?
                .transport_destination(world, ai),
            Self::Goods(id) => ai.goods(id)?.destination,
        }
    }

    /// How urgently the item wants to move.
    #[must_use]
    pub fn priority(self, ai: &AiRegistry) -> u32 {
        match self {
            Self::Unit(id) => ai
                .ai_unit(id)
                .and_then(|u| u.mission.as_ref())
                .map_or(MINOR_PRIORITY, |m| m.transport_priority()),
            Self::Goods(id) => ai.goods(id).map_or(MINOR_PRIORITY, |g| g.priority),
        }
    }

    /// Whether the item is in the hold of `carrier`.
    #[must_use]
    pub fn is_aboard(self, world: &World, ai: &AiRegistry, carrier: UnitId) -> bool {
        match self {
            Self::Unit(id) => world.unit(id).is_some_and(|u| u.is_aboard(carrier)),
            Self::Goods(id) => ai
                .goods(id)
                .is_some_and(|g| g.location == GoodsLocation::Carrier(carrier)),
        }
    }

    /// Carrier the item is assigned to.
    #[must_use]
    pub fn transport(self, ai: &AiRegistry) -> Option<UnitId> {
        match self {
            Self::Unit(id) => ai.ai_unit(id).and_then(|u| u.transport),
            Self::Goods(id) => ai.goods(id).and_then(|g| g.transport),
        }
    }

    /// Cargo slots the item takes.
    #[must_use]
    pub fn space_taken(self, world: &World) -> u32 {
        match self {
            Self::Unit(id) => world.unit(id).map_or(1, |u| u.unit_type.space_taken()),
            Self::Goods(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::AiGoods;
    use crate::goods::{Goods, GoodsType};
    use crate::map::{GameMap, Terrain};
    use crate::player::PlayerKind;
    use crate::unit::UnitType;

    fn coast() -> World {
        let mut map = GameMap::new(8, 4, Terrain::Plains);
        for y in 0..4 {
            map.set_terrain(TilePos::new(0, y), Terrain::HighSeas);
            map.set_terrain(TilePos::new(1, y), Terrain::Ocean);
        }
        // an island nobody can walk to
        map.set_terrain(TilePos::new(6, 0), Terrain::Ocean);
        map.set_terrain(TilePos::new(6, 1), Terrain::Ocean);
        map.set_terrain(TilePos::new(6, 2), Terrain::Ocean);
        map.set_terrain(TilePos::new(6, 3), Terrain::Ocean);
        World::new(map)
    }

    #[test]
    fn test_unit_point_follows_carrier() {
        let mut world = coast();
        let dutch = world.add_player("Dutch", PlayerKind::European);
        let ship = world.spawn_unit(dutch, UnitType::Caravel, Location::Europe);
        let colonist = world.spawn_unit(dutch, UnitType::FreeColonist, Location::Carrier(ship));
        assert_eq!(unit_point(&world, colonist), Some(TransportPoint::Europe));
        world.unit_mut(ship).unwrap().location = Location::Tile(TilePos::new(1, 2));
        assert_eq!(unit_point(&world, colonist), Some(TransportPoint::Tile(TilePos::new(1, 2))));
    }

    #[test]
    fn test_needs_transport_across_water() {
        let mut world = coast();
        let dutch = world.add_player("Dutch", PlayerKind::European);
        let colonist = world.spawn_unit(dutch, UnitType::FreeColonist, Location::Tile(TilePos::new(3, 1)));
        assert!(!needs_transport(&world, colonist, TilePos::new(5, 3)));
        assert!(needs_transport(&world, colonist, TilePos::new(7, 3)));
    }

    #[test]
    fn test_goods_resolution() {
        let mut world = coast();
        let dutch = world.add_player("Dutch", PlayerKind::European);
        let ship = world.spawn_unit(dutch, UnitType::Caravel, Location::Europe);
        let mut ai = AiRegistry::new();
        let goods = ai.add_goods(AiGoods::new(
            Goods::new(GoodsType::Tools, 100),
            GoodsLocation::Europe,
            Some(TransportPoint::Tile(TilePos::new(3, 3))),
        ));
        let item = TransportableRef::Goods(goods);
        assert_eq!(item.source(&world, &ai), Some(TransportPoint::Europe));
        assert_eq!(item.destination(&world, &ai), Some(TransportPoint::Tile(TilePos::new(3, 3))));
        assert!(!item.is_aboard(&world, &ai, ship));
        ai.goods_mut(goods).unwrap().location = GoodsLocation::Carrier(ship);
        assert!(item.is_aboard(&world, &ai, ship));
        assert_eq!(item.priority(&ai), NORMAL_PRIORITY);
    }

    #[test]
    fn test_unit_request_comes_from_its_mission() {
        use crate::missions::build_colony::BuildColonyMission;
        use crate::missions::Mission;

        let mut world = coast();
        let dutch = world.add_player("Dutch", PlayerKind::European);
        let colonist = world.spawn_unit(dutch, UnitType::FreeColonist, Location::Tile(TilePos::new(3, 1)));
        let mut ai = AiRegistry::new();
        ai.register_unit(colonist);
        let item = TransportableRef::Unit(colonist);
        assert_eq!(item.destination(&world, &ai), None);
        assert_eq!(item.priority(&ai), MINOR_PRIORITY);

        let island = TilePos::new(7, 3);
        let mission = BuildColonyMission::with_target(&world, colonist, island, false).unwrap();
        ai.set_mission(colonist, Mission::BuildColony(mission));
        assert_eq!(item.destination(&world, &ai), Some(TransportPoint::Tile(island)));
        assert_eq!(item.priority(&ai), NORMAL_PRIORITY);

        let walkable = BuildColonyMission::with_target(&world, colonist, TilePos::new(5, 3), false).unwrap();
        ai.set_mission(colonist, Mission::BuildColony(walkable));
        assert_eq!(item.destination(&world, &ai), None);
    }
}
