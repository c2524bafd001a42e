//! Settlements: European colonies and native camps.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::goods::GoodsStore;
use crate::ids::{PlayerId, SettlementId, UnitId};
use crate::map::TilePos;
use crate::player::Tension;

/// Colony specific state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColonyData {
    /// Fortification level (0 = none, 3 = fortress).
    pub stockade_level: u32,
    /// Number of work places.
    pub work_slots: u32,
    /// Units working inside.
    pub workers: Vec<UnitId>,
}

impl ColonyData {
    /// Empty colony with the given number of work places.
    #[must_use]
    pub fn new(work_slots: u32) -> Self {
        Self {
            stockade_level: 0,
            work_slots,
            workers: Vec::new(),
        }
    }

    /// Free work places.
    #[must_use]
    pub fn vacancies(&self) -> u32 {
        self.work_slots.saturating_sub(self.workers.len() as u32)
    }
}

/// Native camp state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NativeData {
    /// Alarm of this camp towards each player.
    pub alarm: BTreeMap<PlayerId, Tension>,
}

impl NativeData {
    /// Alarm towards a player, zero if never met.
    #[must_use]
    pub fn alarm_towards(&self, player: PlayerId) -> Tension {
        self.alarm.get(&player).copied().unwrap_or_default()
    }
}

/// Kind-specific settlement data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettlementKind {
    /// A European colony.
    Colony(ColonyData),
    /// A native camp.
    Native(NativeData),
}

/// A settlement on the map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Settlement {
    /// Settlement handle.
    pub id: SettlementId,
    /// Owning player.
    pub owner: PlayerId,
    /// Tile the settlement stands on.
    pub tile: TilePos,
    /// Display name.
    pub name: String,
    /// Warehouse.
    pub goods: GoodsStore,
    /// Colony or native camp.
    pub kind: SettlementKind,
}

impl Settlement {
    /// Whether this is a European colony.
    #[must_use]
    pub fn is_colony(&self) -> bool {
        matches!(self.kind, SettlementKind::Colony(_))
    }

    /// Colony data, if this is a colony.
    #[must_use]
    pub fn colony(&self) -> Option<&ColonyData> {
        match &self.kind {
            SettlementKind::Colony(data) => Some(data),
            SettlementKind::Native(_) => None,
        }
    }

    /// Mutable colony data, if this is a colony.
    pub fn colony_mut(&mut self) -> Option<&mut ColonyData> {
        match &mut self.kind {
            SettlementKind::Colony(data) => Some(data),
            SettlementKind::Native(_) => None,
        }
    }

    /// Native camp data, if this is a native camp.
    #[must_use]
    pub fn native(&self) -> Option<&NativeData> {
        match &self.kind {
            SettlementKind::Native(data) => Some(data),
            SettlementKind::Colony(_) => None,
        }
    }

    /// Mutable native camp data.
    pub fn native_mut(&mut self) -> Option<&mut NativeData> {
        match &mut self.kind {
            SettlementKind::Native(data) => Some(data),
            SettlementKind::Colony(_) => None,
        }
    }

    /// Stockade level; zero for native camps.
    #[must_use]
    pub fn stockade_level(&self) -> u32 {
        self.colony().map_or(0, |c| c.stockade_level)
    }

    /// Free work places; zero for native camps.
    #[must_use]
    pub fn vacancies(&self) -> u32 {
        self.colony().map_or(0, ColonyData::vacancies)
    }
}
