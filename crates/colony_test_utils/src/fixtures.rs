//! Test fixtures and helpers.
//!
//! Pre-built worlds and a small builder for consistent testing.

use colony_core::map::{GameMap, Terrain, TilePos};
use colony_core::ids::{PlayerId, SettlementId, UnitId};
use colony_core::player::{PlayerKind, Tension};
use colony_core::settlement::{ColonyData, NativeData, SettlementKind};
use colony_core::unit::{Location, UnitType};
use colony_core::world::World;
use fixed::types::I32F32;
use serde::de::DeserializeOwned;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Parse a RON fixture.
///
/// # Panics
///
/// Panics if the text does not parse; fixtures are expected to be valid.
#[must_use]
pub fn from_ron<T: DeserializeOwned>(text: &str) -> T {
    ron::from_str(text).unwrap_or_else(|e| panic!("invalid RON fixture: {e}"))
}

/// Builds small hand-laid worlds.
#[derive(Debug, Clone)]
pub struct WorldBuilder {
    world: World,
}

impl WorldBuilder {
    /// A map of plains.
    #[must_use]
    pub fn land(width: u32, height: u32) -> Self {
        Self {
            world: World::new(GameMap::new(width, height, Terrain::Plains)),
        }
    }

    /// Set one tile's terrain.
    #[must_use]
    pub fn terrain(mut self, tile: TilePos, terrain: Terrain) -> Self {
        self.world.map.set_terrain(tile, terrain);
        self
    }

    /// Turn column `x` into `terrain` from top to bottom.
    #[must_use]
    pub fn column(mut self, x: u32, terrain: Terrain) -> Self {
        for y in 0..self.world.map.height() {
            self.world.map.set_terrain(TilePos::new(x, y), terrain);
        }
        self
    }

    /// Add a European player arriving from Europe at `entry`.
    pub fn european(&mut self, name: &str, entry: TilePos, gold: u32) -> PlayerId {
        let id = self.world.add_player(name, PlayerKind::European);
        if let Some(player) = self.world.player_mut(id) {
            player.entry_location = entry;
            player.gold = gold;
        }
        id
    }

    /// Add a native nation with a given tension towards `towards`.
    pub fn natives(&mut self, name: &str, towards: &[(PlayerId, i32)]) -> PlayerId {
        let id = self.world.add_player(name, PlayerKind::Native);
        if let Some(player) = self.world.player_mut(id) {
            for &(other, tension) in towards {
                player.tension.insert(other, Tension::new(tension));
            }
        }
        id
    }

    /// Found a colony.
    pub fn colony(&mut self, owner: PlayerId, tile: TilePos, work_slots: u32) -> SettlementId {
        let name = format!("Colony {}", self.world.colony_count(owner) + 1);
        self.world
            .found_settlement(owner, tile, name, SettlementKind::Colony(ColonyData::new(work_slots)))
    }

    /// Found a native camp.
    pub fn camp(&mut self, owner: PlayerId, tile: TilePos) -> SettlementId {
        self.world
            .found_settlement(owner, tile, "Camp", SettlementKind::Native(NativeData::default()))
    }

    /// Place a unit on a tile.
    pub fn unit(&mut self, owner: PlayerId, unit_type: UnitType, tile: TilePos) -> UnitId {
        self.world.spawn_unit(owner, unit_type, Location::Tile(tile))
    }

    /// Place a unit somewhere off the map (in Europe, aboard, ...).
    pub fn unit_at(&mut self, owner: PlayerId, unit_type: UnitType, location: Location) -> UnitId {
        self.world.spawn_unit(owner, unit_type, location)
    }

    /// Mutable access for anything the builder does not cover.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// The finished world.
    #[must_use]
    pub fn build(self) -> World {
        self.world
    }
}

/// Two land masses split by an ocean channel, with high seas along the
/// right edge.
#[derive(Debug, Clone)]
pub struct ChannelFixture {
    /// The world.
    pub world: World,
    /// The European player.
    pub dutch: PlayerId,
    /// Colony west of the channel.
    pub west: SettlementId,
    /// Colony east of the channel.
    pub east: SettlementId,
    /// Ship in the channel.
    pub ship: UnitId,
}

/// 12x5 world: plains, ocean at x = 4, plains, high seas at x = 11.
/// Colonies stand on (3, 2) and (5, 2); a caravel waits at (4, 2).
#[must_use]
pub fn channel() -> ChannelFixture {
    let mut builder = WorldBuilder::land(12, 5)
        .column(4, Terrain::Ocean)
        .column(10, Terrain::Ocean)
        .column(11, Terrain::HighSeas);
    let dutch = builder.european("Dutch", TilePos::new(11, 2), 0);
    let west = builder.colony(dutch, TilePos::new(3, 2), 2);
    let east = builder.colony(dutch, TilePos::new(5, 2), 2);
    let ship = builder.unit(dutch, UnitType::Caravel, TilePos::new(4, 2));
    ChannelFixture {
        world: builder.build(),
        dutch,
        west,
        east,
        ship,
    }
}

/// A small mixed world for whole-turn runs: a European player with a
/// colony, a ship, colonists and a soldier, and a native camp next door.
#[must_use]
pub fn frontier() -> (World, Vec<PlayerId>) {
    let mut builder = WorldBuilder::land(16, 10)
        .column(0, Terrain::HighSeas)
        .column(1, Terrain::Ocean)
        .terrain(TilePos::new(6, 4), Terrain::Hills)
        .terrain(TilePos::new(9, 7), Terrain::Forest);
    let dutch = builder.european("Dutch", TilePos::new(0, 5), 800);
    let sioux = builder.natives("Sioux", &[(dutch, 650)]);
    builder.colony(dutch, TilePos::new(2, 4), 3);
    let camp = builder.camp(sioux, TilePos::new(12, 6));
    builder.unit(dutch, UnitType::Caravel, TilePos::new(1, 4));
    builder.unit(dutch, UnitType::FreeColonist, TilePos::new(3, 3));
    builder.unit(dutch, UnitType::ExpertFarmer, TilePos::new(4, 5));
    let soldier = builder.unit(dutch, UnitType::VeteranSoldier, TilePos::new(3, 5));
    if let Some(unit) = builder.world_mut().unit_mut(soldier) {
        unit.armed = true;
    }
    let brave = builder.unit(sioux, UnitType::Brave, TilePos::new(11, 6));
    if let Some(unit) = builder.world_mut().unit_mut(brave) {
        unit.home_settlement = Some(camp);
    }
    builder.unit(sioux, UnitType::Brave, TilePos::new(12, 5));
    (builder.build(), vec![dutch, sioux])
}
