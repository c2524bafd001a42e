//! Tile map model.
//!
//! A rectangular grid of [`Tile`]s addressed by [`TilePos`]. Movement is
//! 8-directional. The map knows terrain, settlements placed on tiles, land
//! claims and lost city rumours; it does not know about units (see
//! [`World`](crate::world::World)).

use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::ids::{PlayerId, SettlementId};

/// Grid position of a tile.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TilePos {
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
}

impl TilePos {
    /// Create a new position.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Chebyshev distance (number of 8-directional steps on an open map).
    #[must_use]
    pub fn distance(self, other: Self) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }

    /// Whether `other` is one of the eight neighbours.
    #[must_use]
    pub fn is_adjacent(self, other: Self) -> bool {
        self.distance(other) == 1
    }

    /// Direction of an adjacent tile, `None` if not adjacent.
    #[must_use]
    pub fn direction_to(self, other: Self) -> Option<Direction> {
        if !self.is_adjacent(other) {
            return None;
        }
        Direction::ALL
            .into_iter()
            .find(|d| self.offset(*d) == Some(other))
    }

    /// Position one step in `direction`, without bounds checking against a map.
    #[must_use]
    pub fn offset(self, direction: Direction) -> Option<Self> {
        let (dx, dy) = direction.offset();
        let x = i64::from(self.x) + i64::from(dx);
        let y = i64::from(self.y) + i64::from(dy);
        if x < 0 || y < 0 {
            return None;
        }
        Some(Self::new(x as u32, y as u32))
    }
}

impl std::fmt::Display for TilePos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// The eight compass directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// North.
    N,
    /// North-east.
    NE,
    /// East.
    E,
    /// South-east.
    SE,
    /// South.
    S,
    /// South-west.
    SW,
    /// West.
    W,
    /// North-west.
    NW,
}

impl Direction {
    /// All directions in canonical order.
    pub const ALL: [Direction; 8] = [
        Direction::N,
        Direction::NE,
        Direction::E,
        Direction::SE,
        Direction::S,
        Direction::SW,
        Direction::W,
        Direction::NW,
    ];

    /// Grid offset `(dx, dy)`; y grows southwards.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Direction::N => (0, -1),
            Direction::NE => (1, -1),
            Direction::E => (1, 0),
            Direction::SE => (1, 1),
            Direction::S => (0, 1),
            Direction::SW => (-1, 1),
            Direction::W => (-1, 0),
            Direction::NW => (-1, -1),
        }
    }

    /// The opposite direction.
    #[must_use]
    pub const fn reverse(self) -> Self {
        match self {
            Direction::N => Direction::S,
            Direction::NE => Direction::SW,
            Direction::E => Direction::W,
            Direction::SE => Direction::NW,
            Direction::S => Direction::N,
            Direction::SW => Direction::NE,
            Direction::W => Direction::E,
            Direction::NW => Direction::SE,
        }
    }
}

/// Terrain types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Terrain {
    /// Coastal water.
    #[default]
    Ocean,
    /// Deep water connected to Europe.
    HighSeas,
    /// Open plains.
    Plains,
    /// Grassland.
    Grassland,
    /// Prairie.
    Prairie,
    /// Forest (slow).
    Forest,
    /// Hills (slow).
    Hills,
    /// Mountains (very slow, cannot be settled).
    Mountains,
    /// Tundra.
    Tundra,
    /// Arctic (cannot be settled).
    Arctic,
}

impl Terrain {
    /// Whether units walk on this terrain.
    #[must_use]
    pub const fn is_land(self) -> bool {
        !self.is_water()
    }

    /// Whether ships sail on this terrain.
    #[must_use]
    pub const fn is_water(self) -> bool {
        matches!(self, Self::Ocean | Self::HighSeas)
    }

    /// Movement points needed to enter a tile of this terrain.
    #[must_use]
    pub const fn move_cost(self) -> u32 {
        match self {
            Self::Ocean | Self::HighSeas => 1,
            Self::Plains | Self::Grassland | Self::Prairie | Self::Tundra => 1,
            Self::Forest | Self::Hills | Self::Arctic => 2,
            Self::Mountains => 3,
        }
    }

    /// Base value of founding a colony on this terrain (0 = never).
    #[must_use]
    pub const fn colony_base(self) -> i32 {
        match self {
            Self::Plains => 5,
            Self::Grassland | Self::Prairie => 4,
            Self::Hills => 3,
            Self::Forest | Self::Tundra => 2,
            Self::Mountains | Self::Arctic | Self::Ocean | Self::HighSeas => 0,
        }
    }

    /// Value of this terrain as a work tile next to a colony.
    #[must_use]
    pub const fn work_value(self) -> i32 {
        match self {
            Self::Plains | Self::Grassland | Self::Prairie => 3,
            Self::Forest | Self::Hills | Self::Ocean => 2,
            Self::Mountains | Self::Tundra => 1,
            Self::Arctic | Self::HighSeas => 0,
        }
    }
}

/// A single map tile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Tile {
    /// Terrain type.
    pub terrain: Terrain,
    /// Settlement standing on this tile.
    pub settlement: Option<SettlementId>,
    /// Player claiming the land.
    pub owner: Option<PlayerId>,
    /// Unexplored lost city rumour.
    pub rumour: bool,
    /// Special resource boosting production.
    pub resource: bool,
}

impl Tile {
    /// Create a plain tile of the given terrain.
    #[must_use]
    pub fn new(terrain: Terrain) -> Self {
        Self {
            terrain,
            ..Default::default()
        }
    }
}

/// Value added to a colony site for a special resource.
const RESOURCE_BONUS: i32 = 4;

/// Value added to a colony site with ocean access.
const COASTAL_BONUS: i32 = 3;

/// Rectangular tile map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameMap {
    width: u32,
    height: u32,
    /// Tiles stored in row-major order.
    tiles: Vec<Tile>,
}

impl GameMap {
    /// Create a map filled with one terrain type.
    ///
    /// # Panics
    ///
    /// Panics if `width` or `height` is zero.
    #[must_use]
    pub fn new(width: u32, height: u32, terrain: Terrain) -> Self {
        assert!(width > 0, "GameMap width must be positive");
        assert!(height > 0, "GameMap height must be positive");
        Self {
            width,
            height,
            tiles: vec![Tile::new(terrain); (width as usize) * (height as usize)],
        }
    }

    /// Map width in tiles.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Map height in tiles.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn index(&self, pos: TilePos) -> usize {
        (pos.y as usize) * (self.width as usize) + (pos.x as usize)
    }

    /// Check if a position lies on the map.
    #[must_use]
    pub fn in_bounds(&self, pos: TilePos) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    /// Tile at a position.
    #[must_use]
    pub fn get(&self, pos: TilePos) -> Option<&Tile> {
        if self.in_bounds(pos) {
            Some(&self.tiles[self.index(pos)])
        } else {
            None
        }
    }

    /// Mutable tile at a position.
    pub fn get_mut(&mut self, pos: TilePos) -> Option<&mut Tile> {
        if self.in_bounds(pos) {
            let index = self.index(pos);
            Some(&mut self.tiles[index])
        } else {
            None
        }
    }

    /// Set the terrain of a tile. Returns `false` if out of bounds.
    pub fn set_terrain(&mut self, pos: TilePos, terrain: Terrain) -> bool {
        match self.get_mut(pos) {
            Some(tile) => {
                tile.terrain = terrain;
                true
            }
            None => false,
        }
    }

    /// Terrain at a position.
    #[must_use]
    pub fn terrain(&self, pos: TilePos) -> Option<Terrain> {
        self.get(pos).map(|t| t.terrain)
    }

    /// Whether the tile is land.
    #[must_use]
    pub fn is_land(&self, pos: TilePos) -> bool {
        self.terrain(pos).is_some_and(Terrain::is_land)
    }

    /// Whether the tile is water.
    #[must_use]
    pub fn is_water(&self, pos: TilePos) -> bool {
        self.terrain(pos).is_some_and(Terrain::is_water)
    }

    /// One step from `pos` in `direction`, if it stays on the map.
    #[must_use]
    pub fn step(&self, pos: TilePos, direction: Direction) -> Option<TilePos> {
        pos.offset(direction).filter(|p| self.in_bounds(*p))
    }

    /// All on-map neighbours with the direction leading to them.
    pub fn neighbours(&self, pos: TilePos) -> impl Iterator<Item = (Direction, TilePos)> + '_ {
        Direction::ALL
            .into_iter()
            .filter_map(move |d| self.step(pos, d).map(|p| (d, p)))
    }

    /// Whether a land tile touches water.
    #[must_use]
    pub fn is_coastal(&self, pos: TilePos) -> bool {
        self.is_land(pos) && self.neighbours(pos).any(|(_, p)| self.is_water(p))
    }

    /// Intrinsic value of founding a colony on a tile, independent of who
    /// founds it. Zero means the tile cannot be settled.
    #[must_use]
    pub fn colony_value(&self, pos: TilePos) -> i32 {
        let Some(tile) = self.get(pos) else {
            return 0;
        };
        let base = tile.terrain.colony_base();
        if base == 0 || tile.settlement.is_some() {
            return 0;
        }
        // Settlements may not touch.
        if self
            .neighbours(pos)
            .any(|(_, p)| self.get(p).is_some_and(|t| t.settlement.is_some()))
        {
            return 0;
        }

        let mut value = base * 2;
        for (_, p) in self.neighbours(pos) {
            if let Some(t) = self.get(p) {
                value += t.terrain.work_value();
                if t.resource {
                    value += RESOURCE_BONUS;
                }
            }
        }
        if tile.resource {
            value += RESOURCE_BONUS;
        }
        if self.is_coastal(pos) {
            value += COASTAL_BONUS;
        }
        value
    }

    /// Breadth-first flood fill over all tiles starting at `start`.
    ///
    /// The iterator is lazy and finite; each call starts a fresh fill.
    #[must_use]
    pub fn flood_fill(&self, start: TilePos) -> FloodFill<'_> {
        let mut queue = VecDeque::new();
        let mut seen = HashSet::new();
        if self.in_bounds(start) {
            queue.push_back(start);
            seen.insert(start);
        }
        FloodFill {
            map: self,
            queue,
            seen,
        }
    }
}

/// Lazy breadth-first iterator returned by [`GameMap::flood_fill`].
#[derive(Debug)]
pub struct FloodFill<'a> {
    map: &'a GameMap,
    queue: VecDeque<TilePos>,
    seen: HashSet<TilePos>,
}

impl Iterator for FloodFill<'_> {
    type Item = TilePos;

    fn next(&mut self) -> Option<TilePos> {
        let pos = self.queue.pop_front()?;
        for direction in Direction::ALL {
            if let Some(next) = self.map.step(pos, direction) {
                if self.seen.insert(next) {
                    self.queue.push_back(next);
                }
            }
        }
        Some(pos)
    }
}
