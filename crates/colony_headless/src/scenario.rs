//! Scenario loading and configuration.
//!
//! Scenarios define the starting world for a headless run: the map, the
//! players with their settlements and units, and which players the AI
//! controls.

use std::path::Path;

use colony_core::goods::GoodsType;
use colony_core::ids::PlayerId;
use colony_core::map::{GameMap, Terrain, TilePos};
use colony_core::player::{PlayerKind, Stance, Tension};
use colony_core::settlement::{ColonyData, NativeData, SettlementKind};
use colony_core::unit::{Location, UnitType};
use colony_core::world::World;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The scenario refers to a player it does not define.
    #[error("Unknown player in scenario: {0}")]
    UnknownPlayer(String),
    /// A placement lies off the map.
    #[error("Position ({0}, {1}) is off the {2}x{3} map")]
    OffMap(u32, u32, u32, u32),
    /// The map has no tiles.
    #[error("Map must be at least 1x1")]
    EmptyMap,
}

/// A complete scenario configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Map dimensions in tiles.
    pub map_size: (u32, u32),
    /// Terrain filling the map before regions are painted.
    #[serde(default = "default_terrain")]
    pub base_terrain: Terrain,
    /// Rectangles of terrain painted in order.
    #[serde(default)]
    pub regions: Vec<TerrainRegion>,
    /// Players in turn order.
    pub players: Vec<PlayerSetup>,
    /// Game difficulty (0-4).
    #[serde(default)]
    pub difficulty: u32,
    /// Default number of turns to play.
    #[serde(default = "default_turns")]
    pub turns: u32,
}

fn default_terrain() -> Terrain {
    Terrain::Plains
}

fn default_turns() -> u32 {
    50
}

/// Inclusive rectangle of one terrain.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TerrainRegion {
    /// Top-left corner.
    pub from: (u32, u32),
    /// Bottom-right corner.
    pub to: (u32, u32),
    /// Terrain to paint.
    pub terrain: Terrain,
}

/// Setup for a single player.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSetup {
    /// Player name, referenced by other players' relations.
    pub name: String,
    /// European power or native nation.
    pub kind: PlayerKind,
    /// Whether the AI plays this player.
    #[serde(default = "default_true")]
    pub ai: bool,
    /// Starting gold.
    #[serde(default)]
    pub gold: u32,
    /// Where ships from Europe arrive.
    #[serde(default)]
    pub entry: (u32, u32),
    /// Tension towards other players, by name.
    #[serde(default)]
    pub tension: Vec<(String, i32)>,
    /// Stance towards other players, by name (applied both ways).
    #[serde(default)]
    pub stance: Vec<(String, Stance)>,
    /// Starting settlements.
    #[serde(default)]
    pub settlements: Vec<SettlementPlacement>,
    /// Starting units.
    #[serde(default)]
    pub units: Vec<UnitPlacement>,
}

fn default_true() -> bool {
    true
}

/// Placement of a settlement at scenario start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementPlacement {
    /// Settlement name.
    pub name: String,
    /// Tile.
    pub position: (u32, u32),
    /// Colony work places; `None` makes a native camp.
    #[serde(default)]
    pub work_slots: Option<u32>,
    /// Colony stockade level.
    #[serde(default)]
    pub stockade: u32,
    /// Goods in the warehouse.
    #[serde(default)]
    pub goods: Vec<(GoodsType, u32)>,
}

/// Where a unit starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartLocation {
    /// On a map tile.
    Tile(u32, u32),
    /// On the docks in Europe.
    Europe,
}

/// Placement of units at scenario start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitPlacement {
    /// Unit type.
    pub unit_type: UnitType,
    /// Where the units start.
    pub location: StartLocation,
    /// Number of units to spawn.
    #[serde(default = "default_count")]
    pub count: u32,
    /// Carry muskets.
    #[serde(default)]
    pub armed: bool,
    /// Ride horses.
    #[serde(default)]
    pub mounted: bool,
    /// Treasure carried (treasure trains only).
    #[serde(default)]
    pub treasure: u32,
}

fn default_count() -> u32 {
    1
}

impl UnitPlacement {
    /// Create a new unit placement on a tile.
    #[must_use]
    pub fn new(unit_type: UnitType, x: u32, y: u32, count: u32) -> Self {
        Self {
            unit_type,
            location: StartLocation::Tile(x, y),
            count,
            armed: false,
            mounted: false,
            treasure: 0,
        }
    }

    /// Same placement, armed.
    #[must_use]
    pub fn armed(mut self) -> Self {
        self.armed = true;
        self
    }
}

impl SettlementPlacement {
    /// A colony with `work_slots` work places.
    #[must_use]
    pub fn colony(name: impl Into<String>, x: u32, y: u32, work_slots: u32) -> Self {
        Self {
            name: name.into(),
            position: (x, y),
            work_slots: Some(work_slots),
            stockade: 0,
            goods: Vec::new(),
        }
    }

    /// A native camp.
    #[must_use]
    pub fn camp(name: impl Into<String>, x: u32, y: u32) -> Self {
        Self {
            name: name.into(),
            position: (x, y),
            work_slots: None,
            stockade: 0,
            goods: Vec::new(),
        }
    }
}

impl Default for Scenario {
    fn default() -> Self {
        Self::two_shores()
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let scenario: Scenario = ron::from_str(&contents)?;
        Ok(scenario)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// A built-in scenario by name, or a RON file by path.
    pub fn resolve(name_or_path: &str) -> Result<Self, ScenarioError> {
        match name_or_path {
            "two_shores" => Ok(Self::two_shores()),
            "frontier" => Ok(Self::frontier()),
            path => Self::load(path),
        }
    }

    /// Two coasts across a channel, one Dutch colony on each and a ship
    /// between them. Europe lies off the east edge.
    #[must_use]
    pub fn two_shores() -> Self {
        Self {
            name: "Two Shores".to_string(),
            description: "Colonists, a caravel and a channel".to_string(),
            map_size: (24, 12),
            base_terrain: Terrain::Plains,
            regions: vec![
                TerrainRegion {
                    from: (10, 0),
                    to: (11, 11),
                    terrain: Terrain::Ocean,
                },
                TerrainRegion {
                    from: (22, 0),
                    to: (22, 11),
                    terrain: Terrain::Ocean,
                },
                TerrainRegion {
                    from: (23, 0),
                    to: (23, 11),
                    terrain: Terrain::HighSeas,
                },
                TerrainRegion {
                    from: (4, 2),
                    to: (5, 3),
                    terrain: Terrain::Hills,
                },
            ],
            players: vec![PlayerSetup {
                name: "Dutch".to_string(),
                kind: PlayerKind::European,
                ai: true,
                gold: 1000,
                entry: (23, 6),
                tension: Vec::new(),
                stance: Vec::new(),
                settlements: vec![
                    SettlementPlacement::colony("Nieuw Amsterdam", 9, 6, 3),
                    SettlementPlacement::colony("Fort Oranje", 12, 4, 3),
                ],
                units: vec![
                    UnitPlacement::new(UnitType::Caravel, 10, 6, 1),
                    UnitPlacement::new(UnitType::FreeColonist, 8, 6, 3),
                    UnitPlacement::new(UnitType::ExpertFarmer, 7, 7, 1),
                    UnitPlacement::new(UnitType::VeteranSoldier, 9, 6, 1).armed(),
                ],
            }],
            difficulty: 2,
            turns: 40,
        }
    }

    /// A European foothold next to a resentful native nation.
    #[must_use]
    pub fn frontier() -> Self {
        Self {
            name: "Frontier".to_string(),
            description: "Colonists and braves sharing a continent".to_string(),
            map_size: (20, 14),
            base_terrain: Terrain::Grassland,
            regions: vec![
                TerrainRegion {
                    from: (0, 0),
                    to: (0, 13),
                    terrain: Terrain::HighSeas,
                },
                TerrainRegion {
                    from: (1, 0),
                    to: (1, 13),
                    terrain: Terrain::Ocean,
                },
                TerrainRegion {
                    from: (9, 3),
                    to: (10, 9),
                    terrain: Terrain::Forest,
                },
            ],
            players: vec![
                PlayerSetup {
                    name: "English".to_string(),
                    kind: PlayerKind::European,
                    ai: true,
                    gold: 600,
                    entry: (0, 7),
                    tension: Vec::new(),
                    stance: vec![("Iroquois".to_string(), Stance::Peace)],
                    settlements: vec![SettlementPlacement {
                        goods: vec![(GoodsType::Food, 80), (GoodsType::Muskets, 50), (GoodsType::Cloth, 30)],
                        ..SettlementPlacement::colony("Jamestown", 2, 7, 3)
                    }],
                    units: vec![
                        UnitPlacement::new(UnitType::Merchantman, 1, 7, 1),
                        UnitPlacement::new(UnitType::FreeColonist, 3, 6, 2),
                        UnitPlacement::new(UnitType::VeteranSoldier, 2, 7, 1).armed(),
                        UnitPlacement {
                            treasure: 300,
                            ..UnitPlacement::new(UnitType::TreasureTrain, 6, 10, 1)
                        },
                    ],
                },
                PlayerSetup {
                    name: "Iroquois".to_string(),
                    kind: PlayerKind::Native,
                    ai: true,
                    gold: 0,
                    entry: (0, 0),
                    tension: vec![("English".to_string(), 700)],
                    stance: Vec::new(),
                    settlements: vec![
                        SettlementPlacement::camp("Onondaga", 15, 6),
                        SettlementPlacement::camp("Oneida", 16, 11),
                    ],
                    units: vec![
                        UnitPlacement::new(UnitType::Brave, 14, 6, 3),
                        UnitPlacement {
                            mounted: true,
                            ..UnitPlacement::new(UnitType::Brave, 15, 10, 1).armed()
                        },
                    ],
                },
            ],
            difficulty: 2,
            turns: 40,
        }
    }

    fn check(&self, (x, y): (u32, u32)) -> Result<TilePos, ScenarioError> {
        let (w, h) = self.map_size;
        if x < w && y < h {
            Ok(TilePos::new(x, y))
        } else {
            Err(ScenarioError::OffMap(x, y, w, h))
        }
    }

    /// Build the starting world. Returns the world and the AI-controlled
    /// players.
    pub fn build_world(&self) -> Result<(World, Vec<PlayerId>), ScenarioError> {
        let (w, h) = self.map_size;
        if w == 0 || h == 0 {
            return Err(ScenarioError::EmptyMap);
        }
        let mut map = GameMap::new(w, h, self.base_terrain);
        for region in &self.regions {
            let from = self.check(region.from)?;
            let to = self.check(region.to)?;
            for y in from.y.min(to.y)..=from.y.max(to.y) {
                for x in from.x.min(to.x)..=from.x.max(to.x) {
                    map.set_terrain(TilePos::new(x, y), region.terrain);
                }
            }
        }
        let mut world = World::new(map);
        world.difficulty = self.difficulty;

        let ids: Vec<PlayerId> = self
            .players
            .iter()
            .map(|p| world.add_player(p.name.clone(), p.kind))
            .collect();
        let lookup = |name: &str| {
            self.players
                .iter()
                .position(|p| p.name == name)
                .map(|i| ids[i])
                .ok_or_else(|| ScenarioError::UnknownPlayer(name.to_string()))
        };

        for (setup, &id) in self.players.iter().zip(&ids) {
            let entry = self.check(setup.entry)?;
            let mut tension = Vec::new();
            for (other, value) in &setup.tension {
                tension.push((lookup(other)?, *value));
            }
            for (other, stance) in &setup.stance {
                world.set_stance(id, lookup(other)?, *stance);
            }
            if let Some(player) = world.player_mut(id) {
                player.gold = setup.gold;
                player.entry_location = entry;
                for (other, value) in tension {
                    player.tension.insert(other, Tension::new(value));
                }
            }

            for placement in &setup.settlements {
                let tile = self.check(placement.position)?;
                let kind = match placement.work_slots {
                    Some(slots) => SettlementKind::Colony(ColonyData {
                        stockade_level: placement.stockade,
                        ..ColonyData::new(slots)
                    }),
                    None => SettlementKind::Native(NativeData::default()),
                };
                let settlement = world.found_settlement(id, tile, placement.name.clone(), kind);
                if let Some(s) = world.settlement_mut(settlement) {
                    for &(goods_type, amount) in &placement.goods {
                        s.goods.add(goods_type, amount);
                    }
                }
            }

            let home = world.settlements().find(|s| s.owner == id).map(|s| s.id);
            for placement in &setup.units {
                let location = match placement.location {
                    StartLocation::Tile(x, y) => Location::Tile(self.check((x, y))?),
                    StartLocation::Europe => Location::Europe,
                };
                for _ in 0..placement.count {
                    let unit = world.spawn_unit(id, placement.unit_type, location);
                    if let Some(u) = world.unit_mut(unit) {
                        u.armed = placement.armed;
                        u.mounted = placement.mounted;
                        u.treasure = placement.treasure;
                        if setup.kind == PlayerKind::Native {
                            u.home_settlement = home;
                        }
                    }
                }
            }
        }

        let ai = self
            .players
            .iter()
            .zip(&ids)
            .filter(|(p, _)| p.ai)
            .map(|(_, id)| *id)
            .collect();
        Ok((world, ai))
    }
}
