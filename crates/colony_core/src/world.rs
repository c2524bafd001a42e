//! The shared simulation state the AI reasons about.
//!
//! [`World`] owns the map and arenas of players, units and settlements keyed
//! by typed handles. All arenas are ordered maps so every iteration happens
//! in handle order, which keeps AI decisions reproducible.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::combat::defence_power;
use crate::ids::{PlayerId, SettlementId, UnitId};
use crate::map::{Direction, GameMap, TilePos};
use crate::math::Fixed;
use crate::player::{Player, PlayerKind, Stance, TensionLevel};
use crate::settlement::{Settlement, SettlementKind};
use crate::unit::{Location, SailingTo, Unit, UnitState, UnitType};

/// Default game difficulty (0 = easiest, 4 = hardest).
pub const DEFAULT_DIFFICULTY: u32 = 2;

/// Classification of a single step of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveType {
    /// Plain move.
    Move,
    /// Move onto a high seas tile (from where ships can sail to Europe).
    MoveHighSeas,
    /// Move onto a lost city rumour.
    ExploreRumour,
    /// Attack whatever occupies the tile.
    Attack,
    /// Board a carrier waiting on the water tile.
    Embark,
    /// No movement points left.
    NoMoves,
    /// Naval unit trying to reach land.
    NoAccessLand,
    /// Land unit trying to reach water without a carrier.
    NoAccessWater,
    /// Entering a foreign settlement peacefully.
    NoAccessSettlement,
    /// Tile held by foreign units that cannot be attacked.
    NoAccessOccupied,
    /// Off the map or otherwise impossible.
    Illegal,
}

impl MoveType {
    /// Moves that just relocate the unit.
    #[must_use]
    pub const fn is_progressing(self) -> bool {
        matches!(self, Self::Move | Self::MoveHighSeas | Self::ExploreRumour)
    }

    /// Legal moves, including terminal ones such as attacks.
    #[must_use]
    pub const fn is_progress(self) -> bool {
        self.is_progressing() || matches!(self, Self::Attack | Self::Embark)
    }
}

/// The game state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct World {
    /// Current turn, starting at 0.
    pub turn: u32,
    /// Difficulty level.
    pub difficulty: u32,
    /// Tile map.
    pub map: GameMap,
    players: BTreeMap<PlayerId, Player>,
    units: BTreeMap<UnitId, Unit>,
    settlements: BTreeMap<SettlementId, Settlement>,
    next_id: u32,
}

impl World {
    /// Empty world on a map.
    #[must_use]
    pub fn new(map: GameMap) -> Self {
        Self {
            turn: 0,
            difficulty: DEFAULT_DIFFICULTY,
            map,
            players: BTreeMap::new(),
            units: BTreeMap::new(),
            settlements: BTreeMap::new(),
            next_id: 1,
        }
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // ========================================================================
    // Players
    // ========================================================================

    /// Add a player.
    pub fn add_player(&mut self, name: impl Into<String>, kind: PlayerKind) -> PlayerId {
        let id = PlayerId(self.allocate_id());
        self.players.insert(id, Player::new(id, name, kind));
        id
    }

    /// Player by handle.
    #[must_use]
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Mutable player by handle.
    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    /// All players in handle order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Set the stance between two players, both ways.
    pub fn set_stance(&mut self, a: PlayerId, b: PlayerId, stance: Stance) {
        if let Some(p) = self.players.get_mut(&a) {
            p.stance.insert(b, stance);
        }
        if let Some(p) = self.players.get_mut(&b) {
            p.stance.insert(a, stance);
        }
    }

    /// Whether units of `attacker` may attack units of `defender`.
    ///
    /// Europeans need a declared war. Natives also attack when their tension
    /// towards the defender has reached anger.
    #[must_use]
    pub fn can_attack(&self, attacker: PlayerId, defender: PlayerId) -> bool {
        if attacker == defender {
            return false;
        }
        let Some(player) = self.player(attacker) else {
            return false;
        };
        player.stance_towards(defender) == Stance::War
            || (player.kind == PlayerKind::Native
                && player.tension_towards(defender).level() >= TensionLevel::Angry)
    }

    // ========================================================================
    // Units
    // ========================================================================

    /// Create a unit with full movement points.
    pub fn spawn_unit(&mut self, owner: PlayerId, unit_type: UnitType, location: Location) -> UnitId {
        let id = UnitId(self.allocate_id());
        self.units
            .insert(id, Unit::new(id, owner, unit_type, location));
        id
    }

    /// Unit by handle.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    /// Mutable unit by handle.
    pub fn unit_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.units.get_mut(&id)
    }

    /// All units in handle order.
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    /// Whether the unit still exists.
    #[must_use]
    pub fn has_unit(&self, id: UnitId) -> bool {
        self.units.contains_key(&id)
    }

    /// Remove a unit, everything it carries and its colony work place.
    pub fn dispose_unit(&mut self, id: UnitId) -> Option<Unit> {
        let unit = self.units.remove(&id)?;
        let aboard: Vec<UnitId> = self.units_aboard(id).map(|u| u.id).collect();
        for passenger in aboard {
            self.dispose_unit(passenger);
        }
        if let Location::Working(colony) = unit.location {
            if let Some(data) = self
                .settlements
                .get_mut(&colony)
                .and_then(Settlement::colony_mut)
            {
                data.workers.retain(|w| *w != id);
            }
        }
        Some(unit)
    }

    /// Map tile a unit is on, following carriers and colony work places.
    /// `None` in Europe or at sea.
    #[must_use]
    pub fn unit_tile(&self, id: UnitId) -> Option<TilePos> {
        match self.units.get(&id)?.location {
            Location::Tile(tile) => Some(tile),
            Location::Carrier(carrier) => match self.units.get(&carrier)?.location {
                Location::Tile(tile) => Some(tile),
                _ => None,
            },
            Location::Working(colony) => self.settlements.get(&colony).map(|s| s.tile),
            Location::Europe | Location::Sailing { .. } => None,
        }
    }

    /// Whether a unit is in Europe, directly or aboard a docked carrier.
    #[must_use]
    pub fn is_in_europe(&self, id: UnitId) -> bool {
        match self.units.get(&id).map(|u| u.location) {
            Some(Location::Europe) => true,
            Some(Location::Carrier(carrier)) => self
                .units
                .get(&carrier)
                .is_some_and(|c| c.location == Location::Europe),
            _ => false,
        }
    }

    /// Units standing directly on a tile (not aboard, not working).
    pub fn units_at(&self, tile: TilePos) -> impl Iterator<Item = &Unit> {
        self.units
            .values()
            .filter(move |u| u.location == Location::Tile(tile))
    }

    /// Units aboard a carrier.
    pub fn units_aboard(&self, carrier: UnitId) -> impl Iterator<Item = &Unit> {
        self.units.values().filter(move |u| u.is_aboard(carrier))
    }

    /// Free cargo slots of a carrier. Each unit takes its size, each goods
    /// stack one slot.
    #[must_use]
    pub fn space_left(&self, carrier: UnitId) -> u32 {
        let Some(unit) = self.units.get(&carrier) else {
            return 0;
        };
        let used: u32 = self
            .units_aboard(carrier)
            .map(|u| u.unit_type.space_taken())
            .sum::<u32>()
            + unit.cargo.len() as u32;
        unit.unit_type.space().saturating_sub(used)
    }

    // ========================================================================
    // Settlements
    // ========================================================================

    /// Place a settlement on a tile and claim the tile.
    pub fn found_settlement(
        &mut self,
        owner: PlayerId,
        tile: TilePos,
        name: impl Into<String>,
        kind: SettlementKind,
    ) -> SettlementId {
        let id = SettlementId(self.allocate_id());
        if let Some(t) = self.map.get_mut(tile) {
            t.settlement = Some(id);
            t.owner = Some(owner);
            t.rumour = false;
        }
        self.settlements.insert(
            id,
            Settlement {
                id,
                owner,
                tile,
                name: name.into(),
                goods: crate::goods::GoodsStore::new(),
                kind,
            },
        );
        id
    }

    /// Settlement by handle.
    #[must_use]
    pub fn settlement(&self, id: SettlementId) -> Option<&Settlement> {
        self.settlements.get(&id)
    }

    /// Mutable settlement by handle.
    pub fn settlement_mut(&mut self, id: SettlementId) -> Option<&mut Settlement> {
        self.settlements.get_mut(&id)
    }

    /// All settlements in handle order.
    pub fn settlements(&self) -> impl Iterator<Item = &Settlement> {
        self.settlements.values()
    }

    /// Settlement standing on a tile.
    #[must_use]
    pub fn settlement_at(&self, tile: TilePos) -> Option<&Settlement> {
        self.map
            .get(tile)
            .and_then(|t| t.settlement)
            .and_then(|id| self.settlements.get(&id))
    }

    /// Colonies owned by a player.
    pub fn colonies_of(&self, player: PlayerId) -> impl Iterator<Item = &Settlement> {
        self.settlements
            .values()
            .filter(move |s| s.owner == player && s.is_colony())
    }

    /// Number of colonies owned by a player.
    #[must_use]
    pub fn colony_count(&self, player: PlayerId) -> usize {
        self.colonies_of(player).count()
    }

    /// Remove a settlement. Workers are put back on the tile.
    pub fn dispose_settlement(&mut self, id: SettlementId) -> Option<Settlement> {
        let settlement = self.settlements.remove(&id)?;
        if let Some(t) = self.map.get_mut(settlement.tile) {
            t.settlement = None;
        }
        for unit in self.units.values_mut() {
            if unit.location == Location::Working(id) {
                unit.location = Location::Tile(settlement.tile);
            }
        }
        Some(settlement)
    }

    /// Defence of a unit where it currently stands.
    #[must_use]
    pub fn defence_of(&self, unit: &Unit) -> Fixed {
        let settlement = self.unit_tile(unit.id).and_then(|t| self.settlement_at(t));
        defence_power(
            unit,
            settlement.is_some(),
            settlement.map_or(0, Settlement::stockade_level),
        )
    }

    /// Strongest defender on a tile; the lowest handle wins ties.
    #[must_use]
    pub fn best_defender_at(&self, tile: TilePos) -> Option<&Unit> {
        let mut best: Option<(&Unit, Fixed)> = None;
        for unit in self.units_at(tile) {
            let defence = self.defence_of(unit);
            if best.map_or(true, |(_, d)| defence > d) {
                best = Some((unit, defence));
            }
        }
        best.map(|(unit, _)| unit)
    }

    /// Number of defence-capable units of the owner inside a settlement.
    #[must_use]
    pub fn defender_count(&self, settlement: SettlementId) -> usize {
        let Some(s) = self.settlements.get(&settlement) else {
            return 0;
        };
        self.units_at(s.tile)
            .filter(|u| u.owner == s.owner && u.is_defensive())
            .count()
    }

    /// Value of a colony site for a player.
    ///
    /// Land claimed by another European is worthless, land claimed by natives
    /// is worth half.
    #[must_use]
    pub fn colony_value_for(&self, player: PlayerId, tile: TilePos) -> i32 {
        let value = self.map.colony_value(tile);
        let claim = self.map.get(tile).and_then(|t| t.owner);
        match claim.and_then(|owner| self.player(owner).map(|p| (owner, p.kind))) {
            Some((owner, _)) if owner == player => value,
            Some((_, PlayerKind::European)) => 0,
            Some((_, PlayerKind::Native)) => value / 2,
            None => value,
        }
    }

    /// Whether a unit on `tile` could cash in a treasure train there.
    #[must_use]
    pub fn is_cash_in_tile(&self, owner: PlayerId, tile: TilePos) -> bool {
        self.settlement_at(tile)
            .is_some_and(|s| s.owner == owner && s.is_colony())
            && self.map.is_coastal(tile)
    }

    // ========================================================================
    // Movement
    // ========================================================================

    /// Classify a step of `unit` from `from` to the adjacent tile `to`,
    /// ignoring movement points.
    #[must_use]
    pub fn move_type(&self, unit: &Unit, from: TilePos, to: TilePos) -> MoveType {
        if !from.is_adjacent(to) || !self.map.in_bounds(to) {
            return MoveType::Illegal;
        }
        let settlement = self.settlement_at(to);
        let foreign = self.units_at(to).find(|u| u.owner != unit.owner);
        let hostile = |owner: PlayerId| unit.is_offensive() && self.can_attack(unit.owner, owner);

        if unit.is_naval() {
            if self.map.is_land(to) {
                return match settlement {
                    Some(s) if s.owner == unit.owner => MoveType::Move,
                    Some(_) => MoveType::NoAccessSettlement,
                    None => MoveType::NoAccessLand,
                };
            }
            return match foreign {
                Some(other) if hostile(other.owner) => MoveType::Attack,
                Some(_) => MoveType::NoAccessOccupied,
                None if self.map.terrain(to) == Some(crate::map::Terrain::HighSeas) => {
                    MoveType::MoveHighSeas
                }
                None => MoveType::Move,
            };
        }

        if self.map.is_water(to) {
            let carrier = self.units_at(to).find(|c| {
                c.owner == unit.owner
                    && c.is_carrier()
                    && self.space_left(c.id) >= unit.unit_type.space_taken()
            });
            return if carrier.is_some() {
                MoveType::Embark
            } else {
                MoveType::NoAccessWater
            };
        }
        if let Some(s) = settlement {
            return if s.owner == unit.owner {
                MoveType::Move
            } else if hostile(s.owner) {
                MoveType::Attack
            } else {
                MoveType::NoAccessSettlement
            };
        }
        if let Some(other) = foreign {
            return if hostile(other.owner) {
                MoveType::Attack
            } else {
                MoveType::NoAccessOccupied
            };
        }
        let european = self
            .player(unit.owner)
            .is_some_and(Player::is_european);
        if european && self.map.get(to).is_some_and(|t| t.rumour) {
            MoveType::ExploreRumour
        } else {
            MoveType::Move
        }
    }

    /// Classify a step of a unit from where it stands now, including the
    /// movement point check.
    #[must_use]
    pub fn move_type_now(&self, id: UnitId, direction: Direction) -> MoveType {
        let (Some(unit), Some(from)) = (self.unit(id), self.unit_tile(id)) else {
            return MoveType::Illegal;
        };
        if matches!(unit.location, Location::Working(_)) {
            return MoveType::Illegal;
        }
        let Some(to) = self.map.step(from, direction) else {
            return MoveType::Illegal;
        };
        if unit.moves_left == 0 {
            return MoveType::NoMoves;
        }
        self.move_type(unit, from, to)
    }

    // ========================================================================
    // Turn
    // ========================================================================

    /// Start the next turn: restore movement, finish fortifying and advance
    /// ocean crossings.
    pub fn advance_turn(&mut self) {
        self.turn += 1;
        let entries: BTreeMap<PlayerId, TilePos> = self
            .players
            .values()
            .map(|p| (p.id, p.entry_location))
            .collect();
        for unit in self.units.values_mut() {
            unit.moves_left = unit.max_moves();
            if unit.state == UnitState::Fortifying {
                unit.state = UnitState::Fortified;
            }
            if let Location::Sailing {
                destination,
                turns_left,
            } = unit.location
            {
                unit.location = if turns_left > 1 {
                    Location::Sailing {
                        destination,
                        turns_left: turns_left - 1,
                    }
                } else {
                    match destination {
                        SailingTo::Europe => Location::Europe,
                        SailingTo::America => Location::Tile(
                            entries.get(&unit.owner).copied().unwrap_or_default(),
                        ),
                    }
                };
            }
        }
    }

    /// Hash of the complete state for determinism checks.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::Terrain;
    use crate::settlement::ColonyData;

    fn world() -> (World, PlayerId, PlayerId) {
        let mut map = GameMap::new(8, 8, Terrain::Plains);
        for y in 0..8 {
            map.set_terrain(TilePos::new(0, y), Terrain::Ocean);
        }
        let mut world = World::new(map);
        let dutch = world.add_player("Dutch", PlayerKind::European);
        let arawak = world.add_player("Arawak", PlayerKind::Native);
        (world, dutch, arawak)
    }

    #[test]
    fn test_land_unit_needs_carrier_to_enter_water() {
        let (mut world, dutch, _) = world();
        let colonist = world.spawn_unit(dutch, UnitType::FreeColonist, Location::Tile(TilePos::new(1, 3)));
        assert_eq!(world.move_type_now(colonist, Direction::W), MoveType::NoAccessWater);
        world.spawn_unit(dutch, UnitType::Caravel, Location::Tile(TilePos::new(0, 3)));
        assert_eq!(world.move_type_now(colonist, Direction::W), MoveType::Embark);
    }

    #[test]
    fn test_attack_requires_war() {
        let (mut world, dutch, arawak) = world();
        let soldier = world.spawn_unit(dutch, UnitType::VeteranSoldier, Location::Tile(TilePos::new(3, 3)));
        world.unit_mut(soldier).unwrap().armed = true;
        world.spawn_unit(arawak, UnitType::Brave, Location::Tile(TilePos::new(4, 3)));
        assert_eq!(world.move_type_now(soldier, Direction::E), MoveType::NoAccessOccupied);
        world.set_stance(dutch, arawak, Stance::War);
        assert_eq!(world.move_type_now(soldier, Direction::E), MoveType::Attack);
    }

    #[test]
    fn test_dispose_carrier_disposes_cargo() {
        let (mut world, dutch, _) = world();
        let ship = world.spawn_unit(dutch, UnitType::Galleon, Location::Tile(TilePos::new(0, 0)));
        let passenger = world.spawn_unit(dutch, UnitType::FreeColonist, Location::Carrier(ship));
        assert_eq!(world.space_left(ship), 5);
        assert_eq!(world.unit_tile(passenger), Some(TilePos::new(0, 0)));
        world.dispose_unit(ship);
        assert!(!world.has_unit(passenger));
    }

    #[test]
    fn test_advance_turn_lands_sailing_ships() {
        let (mut world, dutch, _) = world();
        world.player_mut(dutch).unwrap().entry_location = TilePos::new(0, 5);
        let ship = world.spawn_unit(
            dutch,
            UnitType::Caravel,
            Location::Sailing {
                destination: SailingTo::America,
                turns_left: 2,
            },
        );
        world.advance_turn();
        assert!(world.unit(ship).unwrap().is_sailing());
        world.advance_turn();
        assert_eq!(world.unit(ship).unwrap().location, Location::Tile(TilePos::new(0, 5)));
    }

    #[test]
    fn test_defender_count_ignores_unarmed() {
        let (mut world, dutch, _) = world();
        let tile = TilePos::new(4, 4);
        let colony = world.found_settlement(dutch, tile, "Fort Orange", SettlementKind::Colony(ColonyData::new(3)));
        let a = world.spawn_unit(dutch, UnitType::FreeColonist, Location::Tile(tile));
        world.spawn_unit(dutch, UnitType::FreeColonist, Location::Tile(tile));
        assert_eq!(world.defender_count(colony), 0);
        world.unit_mut(a).unwrap().armed = true;
        assert_eq!(world.defender_count(colony), 1);
        assert_eq!(world.best_defender_at(tile).map(|u| u.id), Some(a));
    }

    #[test]
    fn test_state_hash_changes_with_state() {
        let (mut world, dutch, _) = world();
        let before = world.state_hash();
        assert_eq!(before, world.clone().state_hash());
        world.spawn_unit(dutch, UnitType::FreeColonist, Location::Europe);
        assert_ne!(before, world.state_hash());
    }
}
