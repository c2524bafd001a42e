//! Turn-annotated path search over the tile map.
//!
//! The search is a deterministic best-first expansion ordered by
//! `(turns, -moves_left, tile)`, so two searches over the same world always
//! visit nodes in the same order and return the same path. Every step of a
//! returned [`Path`] records the direction taken, the turn in which the step
//! happens (0 = this turn) and whether the unit leaves its carrier there.
//!
//! Movement follows the server rules: entering a tile costs the terrain's
//! movement points; if the unit has fewer points left than that and has
//! already moved this turn, it waits for the next turn.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use serde::{Deserialize, Serialize};

use crate::goal::{FirstMatchDecider, GoalDecider};
use crate::ids::UnitId;
use crate::map::{Direction, Terrain, TilePos};
use crate::unit::{Location, Unit};
use crate::world::{MoveType, World};

/// Turn count used for "unbounded" searches.
pub const UNLIMITED_TURNS: u32 = u32::MAX;

/// Policy for which steps a search may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CostDecider {
    /// Skip illegal steps. Attacks and embarkations end a path.
    #[default]
    AvoidIllegal,
    /// Like [`CostDecider::AvoidIllegal`], and additionally never pass
    /// through a settlement or a tile occupied by another player's units.
    /// Such tiles may only be the final step.
    AvoidSettlementsAndBlockers,
}

/// One step of a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathStep {
    /// Tile reached by this step.
    pub tile: TilePos,
    /// Direction of the step.
    pub direction: Direction,
    /// Turn in which the step is made (0 = the current turn).
    pub turns: u32,
    /// Movement points left after the step.
    pub moves_left: u32,
    /// Whether the unit is still aboard its carrier after the step.
    pub on_carrier: bool,
    /// Whether this is the step where the unit leaves its carrier.
    pub transport_drop: bool,
}

/// A path from a start tile. An empty path means the start is the goal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Path {
    /// Where the path starts.
    pub start: TilePos,
    /// Steps in order.
    pub steps: Vec<PathStep>,
}

impl Path {
    /// Path of zero steps.
    #[must_use]
    pub fn empty(start: TilePos) -> Self {
        Self {
            start,
            steps: Vec::new(),
        }
    }

    /// Final tile.
    #[must_use]
    pub fn destination(&self) -> TilePos {
        self.steps.last().map_or(self.start, |s| s.tile)
    }

    /// Turns until the final step is made.
    #[must_use]
    pub fn turns(&self) -> u32 {
        self.steps.last().map_or(0, |s| s.turns)
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the path has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The step where the unit leaves its carrier, if any.
    #[must_use]
    pub fn transport_drop(&self) -> Option<&PathStep> {
        self.steps.iter().find(|s| s.transport_drop)
    }

    /// Whether any step needs a carrier.
    #[must_use]
    pub fn uses_carrier(&self) -> bool {
        self.steps.iter().any(|s| s.on_carrier)
    }
}

/// Node in the open set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SearchNode {
    tile: TilePos,
    on_carrier: bool,
    turns: u32,
    moves_left: u32,
}

impl Ord for SearchNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so fewer turns pop first, then
        // more moves left, then lower coordinates for determinism.
        other
            .turns
            .cmp(&self.turns)
            .then(self.moves_left.cmp(&other.moves_left))
            .then_with(|| other.tile.cmp(&self.tile))
            .then_with(|| other.on_carrier.cmp(&self.on_carrier))
    }
}

impl PartialOrd for SearchNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

type NodeKey = (TilePos, bool);

/// Everything the expansion needs about the moving unit.
struct Mover<'a> {
    unit: &'a Unit,
    carrier: Option<&'a Unit>,
}

impl Mover<'_> {
    fn max_moves(&self, on_carrier: bool) -> u32 {
        match (on_carrier, self.carrier) {
            (true, Some(carrier)) => carrier.max_moves(),
            _ => self.unit.max_moves(),
        }
    }
}

/// Outcome of trying one step.
struct Step {
    to: NodeKey,
    turns: u32,
    moves_left: u32,
    drop: bool,
    terminal: bool,
}

fn try_step(
    world: &World,
    mover: &Mover<'_>,
    node: &SearchNode,
    direction: Direction,
    cost_decider: CostDecider,
) -> Option<Step> {
    let to = world.map.step(node.tile, direction)?;
    let mut on_carrier = node.on_carrier;
    let mut drop = false;

    let move_type = match (on_carrier, mover.carrier) {
        (true, Some(carrier)) if world.map.is_water(to) => world.move_type(carrier, node.tile, to),
        (true, Some(_)) => {
            on_carrier = false;
            drop = true;
            world.move_type(mover.unit, node.tile, to)
        }
        _ => world.move_type(mover.unit, node.tile, to),
    };

    let terminal = match move_type {
        MoveType::Move | MoveType::MoveHighSeas | MoveType::ExploreRumour => false,
        MoveType::Attack | MoveType::Embark => true,
        _ => return None,
    };
    let blocked = cost_decider == CostDecider::AvoidSettlementsAndBlockers
        && (world.settlement_at(to).is_some()
            || world.units_at(to).any(|u| u.owner != mover.unit.owner));
    let terminal = terminal || blocked;

    let cost = world.map.terrain(to).map_or(1, Terrain::move_cost);
    let max = mover.max_moves(on_carrier);
    let (mut turns, mut moves) = (node.turns, node.moves_left);
    if drop {
        // The passenger has not moved yet; it uses its own points.
        moves = if turns == 0 {
            mover.unit.moves_left
        } else {
            mover.unit.max_moves()
        };
    }
    if cost > moves && moves < max {
        turns = turns.saturating_add(1);
        moves = max;
    }
    Some(Step {
        to: (to, on_carrier),
        turns,
        moves_left: moves.saturating_sub(cost),
        drop,
        terminal,
    })
}

fn build_path(
    start: TilePos,
    end: NodeKey,
    came_from: &BTreeMap<NodeKey, (NodeKey, PathStep)>,
) -> Path {
    let mut steps = Vec::new();
    let mut current = end;
    while let Some((previous, step)) = came_from.get(&current) {
        steps.push(*step);
        current = *previous;
    }
    steps.reverse();
    Path { start, steps }
}

/// Whether the unit starts a search aboard `carrier`. A unit off the map
/// (in Europe) travels with the carrier from wherever the search starts.
fn starts_aboard(world: &World, unit: &Unit, carrier: Option<UnitId>) -> bool {
    let Some(carrier) = carrier else {
        return false;
    };
    match unit.location {
        Location::Carrier(c) => c == carrier,
        _ => match (world.unit_tile(unit.id), world.unit_tile(carrier)) {
            (Some(a), Some(b)) => a == b,
            (None, _) => true,
            (Some(_), None) => false,
        },
    }
}

/// Search outward from `from` and offer every reachable node to `decider`.
///
/// Nodes are offered in order of increasing turns. The search ends when the
/// decider asks to stop, when every node within `max_turns` has been seen,
/// or when the open set runs dry. Returns the decider's goal.
pub fn search_from(
    world: &World,
    unit_id: UnitId,
    from: TilePos,
    decider: &mut dyn GoalDecider,
    cost_decider: CostDecider,
    max_turns: u32,
    carrier: Option<UnitId>,
) -> Option<Path> {
    let unit = world.unit(unit_id)?;
    let carrier_unit = carrier.and_then(|c| world.unit(c)).filter(|c| c.is_carrier());
    let on_carrier = carrier_unit.is_some() && starts_aboard(world, unit, carrier);
    let mover = Mover {
        unit,
        carrier: carrier_unit,
    };
    let start_moves = match (on_carrier, carrier_unit) {
        (true, Some(c)) => c.moves_left,
        _ => unit.moves_left,
    };

    let start = SearchNode {
        tile: from,
        on_carrier,
        turns: 0,
        moves_left: start_moves,
    };
    let mut best: BTreeMap<NodeKey, (u32, u32)> = BTreeMap::new();
    let mut came_from: BTreeMap<NodeKey, (NodeKey, PathStep)> = BTreeMap::new();
    let mut terminal: BTreeSet<NodeKey> = BTreeSet::new();
    let mut open = BinaryHeap::new();
    best.insert((from, on_carrier), (0, start_moves));
    open.push(start);

    while let Some(node) = open.pop() {
        let key = (node.tile, node.on_carrier);
        if best.get(&key) != Some(&(node.turns, node.moves_left)) {
            continue;
        }
        let path = build_path(from, key, &came_from);
        if decider.check(world, unit, &path) {
            break;
        }
        if terminal.contains(&key) {
            continue;
        }
        for direction in Direction::ALL {
            let Some(step) = try_step(world, &mover, &node, direction, cost_decider) else {
                continue;
            };
            if step.turns > max_turns {
                continue;
            }
            let better = best.get(&step.to).map_or(true, |&(turns, moves)| {
                (step.turns, std::cmp::Reverse(step.moves_left)) < (turns, std::cmp::Reverse(moves))
            });
            if !better {
                continue;
            }
            best.insert(step.to, (step.turns, step.moves_left));
            if step.terminal {
                terminal.insert(step.to);
            } else {
                terminal.remove(&step.to);
            }
            came_from.insert(
                step.to,
                (
                    key,
                    PathStep {
                        tile: step.to.0,
                        direction,
                        turns: step.turns,
                        moves_left: step.moves_left,
                        on_carrier: step.to.1,
                        transport_drop: step.drop,
                    },
                ),
            );
            open.push(SearchNode {
                tile: step.to.0,
                on_carrier: step.to.1,
                turns: step.turns,
                moves_left: step.moves_left,
            });
        }
    }
    decider.take_goal()
}

/// [`search_from`] starting at the unit's current tile.
pub fn search(
    world: &World,
    unit_id: UnitId,
    decider: &mut dyn GoalDecider,
    cost_decider: CostDecider,
    max_turns: u32,
    carrier: Option<UnitId>,
) -> Option<Path> {
    let from = world.unit_tile(unit_id)?;
    search_from(world, unit_id, from, decider, cost_decider, max_turns, carrier)
}

/// Shortest path (in turns) from `from` to `to`, or `None` if unreachable.
pub fn find_path(
    world: &World,
    unit_id: UnitId,
    from: TilePos,
    to: TilePos,
    carrier: Option<UnitId>,
    cost_decider: CostDecider,
) -> Option<Path> {
    if from == to {
        return Some(Path::empty(from));
    }
    let mut decider = FirstMatchDecider::new(move |_: &World, _: &Unit, path: &Path| {
        path.destination() == to
    });
    search_from(
        world,
        unit_id,
        from,
        &mut decider,
        cost_decider,
        UNLIMITED_TURNS,
        carrier,
    )
    .filter(|path| path.destination() == to)
}

/// Shortest path for a ship to the nearest high seas tile, from where it can
/// sail to Europe. An empty path means the ship is already there.
pub fn path_to_europe(world: &World, carrier: UnitId) -> Option<Path> {
    let unit = world.unit(carrier)?;
    if !unit.is_naval() {
        return None;
    }
    let mut decider = FirstMatchDecider::new(|world: &World, _: &Unit, path: &Path| {
        world.map.terrain(path.destination()) == Some(Terrain::HighSeas)
    });
    search(
        world,
        carrier,
        &mut decider,
        CostDecider::AvoidIllegal,
        UNLIMITED_TURNS,
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goal::BestPathDecider;
    use crate::map::GameMap;
    use crate::player::{PlayerKind, Stance};
    use crate::unit::UnitType;

    fn land_world() -> (World, crate::ids::PlayerId) {
        let mut map = GameMap::new(12, 8, Terrain::Plains);
        for y in 0..8 {
            map.set_terrain(TilePos::new(0, y), Terrain::HighSeas);
            map.set_terrain(TilePos::new(1, y), Terrain::Ocean);
        }
        let mut world = World::new(map);
        let dutch = world.add_player("Dutch", PlayerKind::European);
        (world, dutch)
    }

    #[test]
    fn test_straight_path_turn_accounting() {
        let (mut world, dutch) = land_world();
        let u = world.spawn_unit(dutch, UnitType::FreeColonist, Location::Tile(TilePos::new(3, 3)));
        let path = find_path(&world, u, TilePos::new(3, 3), TilePos::new(9, 3), None, CostDecider::AvoidIllegal).unwrap();
        assert_eq!(path.len(), 6);
        // three plains steps per turn
        let turns: Vec<u32> = path.steps.iter().map(|s| s.turns).collect();
        assert_eq!(turns, vec![0, 0, 0, 1, 1, 1]);
        assert_eq!(path.destination(), TilePos::new(9, 3));
    }

    #[test]
    fn test_slow_terrain_waits_for_next_turn() {
        let (mut world, dutch) = land_world();
        world.map.set_terrain(TilePos::new(5, 3), Terrain::Mountains);
        world.map.set_terrain(TilePos::new(5, 2), Terrain::Mountains);
        world.map.set_terrain(TilePos::new(5, 4), Terrain::Mountains);
        let u = world.spawn_unit(dutch, UnitType::FreeColonist, Location::Tile(TilePos::new(3, 3)));
        world.unit_mut(u).unwrap().moves_left = 1;
        let path = find_path(&world, u, TilePos::new(3, 3), TilePos::new(5, 3), None, CostDecider::AvoidIllegal).unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path.steps[0].turns, 0);
        assert_eq!(path.steps[1].turns, 1);
    }

    #[test]
    fn test_land_unit_cannot_cross_water_alone() {
        let (mut world, dutch) = land_world();
        let u = world.spawn_unit(dutch, UnitType::FreeColonist, Location::Tile(TilePos::new(3, 3)));
        assert!(find_path(&world, u, TilePos::new(3, 3), TilePos::new(1, 3), None, CostDecider::AvoidIllegal).is_none());
    }

    #[test]
    fn test_carrier_path_marks_transport_drop() {
        let (mut world, dutch) = land_world();
        let ship = world.spawn_unit(dutch, UnitType::Caravel, Location::Tile(TilePos::new(1, 0)));
        let u = world.spawn_unit(dutch, UnitType::FreeColonist, Location::Carrier(ship));
        let path = find_path(&world, u, TilePos::new(1, 0), TilePos::new(2, 6), Some(ship), CostDecider::AvoidIllegal).unwrap();
        let drop = path.transport_drop().unwrap();
        assert!(world.map.is_land(drop.tile));
        assert!(path.steps.iter().take_while(|s| !s.transport_drop).all(|s| s.on_carrier));
        assert_eq!(path.destination(), TilePos::new(2, 6));
    }

    #[test]
    fn test_attack_only_as_final_step() {
        let (mut world, dutch) = land_world();
        let enemy = world.add_player("English", PlayerKind::European);
        world.set_stance(dutch, enemy, Stance::War);
        let soldier = world.spawn_unit(dutch, UnitType::VeteranSoldier, Location::Tile(TilePos::new(3, 3)));
        world.unit_mut(soldier).unwrap().armed = true;
        world.spawn_unit(enemy, UnitType::FreeColonist, Location::Tile(TilePos::new(5, 3)));
        let path = find_path(&world, soldier, TilePos::new(3, 3), TilePos::new(5, 3), None, CostDecider::AvoidIllegal).unwrap();
        assert_eq!(path.len(), 2);
        let last = path.steps[1];
        assert_eq!(world.move_type(world.unit(soldier).unwrap(), TilePos::new(4, 3), last.tile), MoveType::Attack);
    }

    #[test]
    fn test_path_to_europe_finds_high_seas() {
        let (mut world, dutch) = land_world();
        let ship = world.spawn_unit(dutch, UnitType::Caravel, Location::Tile(TilePos::new(1, 4)));
        let path = path_to_europe(&world, ship).unwrap();
        assert_eq!(path.len(), 1);
        assert_eq!(world.map.terrain(path.destination()), Some(Terrain::HighSeas));
    }

    #[test]
    fn test_search_is_bounded_by_turns() {
        let (mut world, dutch) = land_world();
        let u = world.spawn_unit(dutch, UnitType::FreeColonist, Location::Tile(TilePos::new(2, 0)));
        let mut decider = BestPathDecider::new(|_: &World, _: &Unit, path: &Path| path.destination().x as i32);
        let path = search(&world, u, &mut decider, CostDecider::AvoidIllegal, 0, None).unwrap();
        assert_eq!(path.destination().x, 5);
    }

    #[test]
    fn test_determinism() {
        let (mut world, dutch) = land_world();
        world.map.set_terrain(TilePos::new(6, 3), Terrain::Hills);
        world.map.set_terrain(TilePos::new(6, 4), Terrain::Forest);
        let u = world.spawn_unit(dutch, UnitType::FreeColonist, Location::Tile(TilePos::new(3, 3)));
        let a = find_path(&world, u, TilePos::new(3, 3), TilePos::new(10, 5), None, CostDecider::AvoidIllegal);
        let b = find_path(&world, u, TilePos::new(3, 3), TilePos::new(10, 5), None, CostDecider::AvoidIllegal);
        assert!(a.is_some());
        assert_eq!(a, b);
    }
}
