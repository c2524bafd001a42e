//! Unit model: unit types, locations and per-unit state.

use serde::{Deserialize, Serialize};

use crate::goods::Goods;
use crate::ids::{PlayerId, SettlementId, UnitId};
use crate::map::TilePos;

/// Unit types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UnitType {
    /// Unskilled colonist.
    FreeColonist,
    /// Cheap colonist, recruit only.
    IndenturedServant,
    /// Expert farmer.
    ExpertFarmer,
    /// Expert fisherman.
    ExpertFisherman,
    /// Veteran soldier (expert soldier).
    VeteranSoldier,
    /// Artillery.
    Artillery,
    /// Native brave.
    Brave,
    /// Treasure train carrying plundered gold.
    TreasureTrain,
    /// Small merchant ship.
    Caravel,
    /// Medium merchant ship.
    Merchantman,
    /// Large merchant ship, can carry treasure.
    Galleon,
    /// Armed raider.
    Privateer,
    /// Warship.
    Frigate,
}

impl UnitType {
    /// Ships move on water.
    #[must_use]
    pub const fn is_naval(self) -> bool {
        matches!(
            self,
            Self::Caravel | Self::Merchantman | Self::Galleon | Self::Privateer | Self::Frigate
        )
    }

    /// Colonists can found colonies and work in them.
    #[must_use]
    pub const fn is_colonist(self) -> bool {
        matches!(
            self,
            Self::FreeColonist
                | Self::IndenturedServant
                | Self::ExpertFarmer
                | Self::ExpertFisherman
                | Self::VeteranSoldier
        )
    }

    /// Expert soldiers fight better when armed.
    #[must_use]
    pub const fn is_expert_soldier(self) -> bool {
        matches!(self, Self::VeteranSoldier)
    }

    /// Native units.
    #[must_use]
    pub const fn is_native(self) -> bool {
        matches!(self, Self::Brave)
    }

    /// Intrinsic offence before equipment.
    #[must_use]
    pub const fn base_offence(self) -> u32 {
        match self {
            Self::Artillery => 7,
            Self::Brave => 1,
            Self::Privateer => 8,
            Self::Frigate => 16,
            _ => 0,
        }
    }

    /// Intrinsic defence before equipment.
    #[must_use]
    pub const fn base_defence(self) -> u32 {
        match self {
            Self::Artillery => 5,
            Self::Caravel => 2,
            Self::Merchantman => 6,
            Self::Galleon => 10,
            Self::Privateer => 8,
            Self::Frigate => 16,
            _ => 1,
        }
    }

    /// Movement points per turn.
    #[must_use]
    pub const fn moves_per_turn(self) -> u32 {
        match self {
            Self::Artillery | Self::TreasureTrain => 1,
            Self::Caravel => 4,
            Self::Merchantman => 5,
            Self::Galleon | Self::Frigate => 6,
            Self::Privateer => 8,
            _ => 3,
        }
    }

    /// Cargo slots.
    #[must_use]
    pub const fn space(self) -> u32 {
        match self {
            Self::Caravel | Self::Privateer => 2,
            Self::Merchantman | Self::Frigate => 4,
            Self::Galleon => 6,
            Self::Brave => 1,
            _ => 0,
        }
    }

    /// Cargo slots this unit occupies when carried.
    #[must_use]
    pub const fn space_taken(self) -> u32 {
        match self {
            Self::TreasureTrain => 6,
            _ => 1,
        }
    }

    /// Price to train this unit in Europe, if it can be trained.
    #[must_use]
    pub const fn training_price(self) -> Option<u32> {
        match self {
            Self::FreeColonist => Some(600),
            Self::ExpertFarmer => Some(1100),
            Self::ExpertFisherman => Some(1000),
            Self::VeteranSoldier => Some(2000),
            Self::Artillery => Some(500),
            Self::Caravel => Some(1000),
            Self::Merchantman => Some(2000),
            Self::Galleon => Some(3000),
            Self::Privateer => Some(2000),
            Self::Frigate => Some(5000),
            Self::IndenturedServant | Self::Brave | Self::TreasureTrain => None,
        }
    }
}

/// Where a unit is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Location {
    /// Standing on a map tile.
    Tile(TilePos),
    /// Aboard a carrier.
    Carrier(UnitId),
    /// On the docks in Europe.
    Europe,
    /// Crossing the ocean.
    Sailing {
        /// Where the voyage ends.
        destination: SailingTo,
        /// Turns until arrival.
        turns_left: u32,
    },
    /// Working inside a colony.
    Working(SettlementId),
}

/// Destination of an ocean crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SailingTo {
    /// Sailing to Europe.
    Europe,
    /// Sailing back to the New World.
    America,
}

/// Unit activity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UnitState {
    /// Ready for orders.
    #[default]
    Active,
    /// Digging in; becomes fortified next turn.
    Fortifying,
    /// Fortified.
    Fortified,
    /// Waiting aboard or in a settlement.
    Sentry,
}

/// A unit in the world.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unit {
    /// Unit handle.
    pub id: UnitId,
    /// Owning player.
    pub owner: PlayerId,
    /// Unit type.
    pub unit_type: UnitType,
    /// Carries muskets.
    pub armed: bool,
    /// Carries horses.
    pub mounted: bool,
    /// Current location.
    pub location: Location,
    /// Movement points left this turn.
    pub moves_left: u32,
    /// Activity state.
    pub state: UnitState,
    /// Goods carried.
    pub cargo: Vec<Goods>,
    /// Gold carried by a treasure train.
    pub treasure: u32,
    /// Home settlement of a native unit.
    pub home_settlement: Option<SettlementId>,
}

impl Unit {
    /// Create a unit with full movement points.
    #[must_use]
    pub fn new(id: UnitId, owner: PlayerId, unit_type: UnitType, location: Location) -> Self {
        let mut unit = Self {
            id,
            owner,
            unit_type,
            armed: false,
            mounted: false,
            location,
            moves_left: 0,
            state: UnitState::Active,
            cargo: Vec::new(),
            treasure: 0,
            home_settlement: None,
        };
        unit.moves_left = unit.max_moves();
        unit
    }

    /// Movement points at the start of a turn.
    #[must_use]
    pub fn max_moves(&self) -> u32 {
        self.unit_type.moves_per_turn() + u32::from(self.mounted)
    }

    /// Ships.
    #[must_use]
    pub fn is_naval(&self) -> bool {
        self.unit_type.is_naval()
    }

    /// Ships with cargo space.
    #[must_use]
    pub fn is_carrier(&self) -> bool {
        self.is_naval() && self.unit_type.space() > 0
    }

    /// Units able to initiate an attack.
    #[must_use]
    pub fn is_offensive(&self) -> bool {
        self.unit_type.base_offence() > 0 || self.armed || self.mounted
    }

    /// Land units able to hold a settlement.
    #[must_use]
    pub fn is_defensive(&self) -> bool {
        !self.is_naval()
            && (self.armed || self.unit_type.base_defence() > 1 || self.unit_type.is_native())
    }

    /// Treasure trains.
    #[must_use]
    pub fn is_treasure_train(&self) -> bool {
        self.unit_type == UnitType::TreasureTrain
    }

    /// Whether this unit is aboard `carrier`.
    #[must_use]
    pub fn is_aboard(&self, carrier: UnitId) -> bool {
        self.location == Location::Carrier(carrier)
    }

    /// Whether the unit is crossing the ocean.
    #[must_use]
    pub fn is_sailing(&self) -> bool {
        matches!(self.location, Location::Sailing { .. })
    }

    /// Whether the unit is in Europe (docked, not sailing).
    #[must_use]
    pub fn is_in_europe(&self) -> bool {
        self.location == Location::Europe
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_unit_has_full_moves() {
        let unit = Unit::new(
            UnitId(1),
            PlayerId(1),
            UnitType::Galleon,
            Location::Europe,
        );
        assert_eq!(unit.moves_left, 6);
        assert!(unit.is_carrier());
        assert!(!unit.is_offensive());
    }

    #[test]
    fn test_armed_colonist_is_offensive_and_defensive() {
        let mut unit = Unit::new(
            UnitId(2),
            PlayerId(1),
            UnitType::FreeColonist,
            Location::Tile(TilePos::new(0, 0)),
        );
        assert!(!unit.is_offensive());
        assert!(!unit.is_defensive());
        unit.armed = true;
        assert!(unit.is_offensive());
        assert!(unit.is_defensive());
    }

    #[test]
    fn test_mounted_units_move_further() {
        let mut unit = Unit::new(
            UnitId(3),
            PlayerId(1),
            UnitType::VeteranSoldier,
            Location::Europe,
        );
        unit.mounted = true;
        assert_eq!(unit.max_moves(), 4);
    }
}
