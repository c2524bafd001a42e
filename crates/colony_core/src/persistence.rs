//! Saving and restoring AI state.
//!
//! The registry is captured as an [`AiSnapshot`]: one record per AI unit
//! (with its mission), AI goods lot and wish. Mission records carry the
//! stable element names that missions report through
//! [`UnitMission::name`], so saved games survive refactors of the mission
//! structs themselves.
//!
//! Restoring is done against a live world. Records are read in order and a
//! reference to an AI unit or goods lot that has not been read yet creates a
//! placeholder wrapper, which the referenced record later fills in.
//! Placeholders still empty at the end are dropped.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ai::{AiGoods, AiRegistry, AiUnit, GoodsLocation, Wish};
use crate::error::{AiError, Result};
use crate::goods::{Goods, GoodsType};
use crate::ids::{AiGoodsId, SettlementId, UnitId, WishId};
use crate::map::TilePos;
use crate::missions::{
    BuildColonyMission, CashInTreasureTrainMission, DefendSettlementMission,
    IdleAtSettlementMission, IndianDemandMission, Mission, SeekAndDestroyMission, Target,
    TransportMission, UnitMission, WanderHostileMission, WishRealizationMission,
    WorkInsideColonyMission,
};
use crate::transportable::{TransportPoint, TransportableRef};
use crate::world::World;

/// Snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

// ============================================================================
// Records
// ============================================================================

/// Saved form of a mission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissionRecord {
    /// [`BuildColonyMission`].
    #[serde(rename = "buildColonyMission")]
    BuildColony {
        /// The colonist.
        unit: UnitId,
        /// Chosen site.
        target: Option<TilePos>,
        /// Site value when chosen.
        colony_value: i32,
        /// Re-search instead of giving up.
        do_not_give_up: bool,
        /// Whether the colony stands.
        colony_built: bool,
    },
    /// [`TransportMission`].
    #[serde(rename = "transportMission")]
    Transport {
        /// The carrier.
        unit: UnitId,
        /// The manifest, one entry per slot.
        #[serde(rename = "transportable")]
        transportables: Vec<TransportableRef>,
    },
    /// [`SeekAndDestroyMission`].
    #[serde(rename = "unitSeekAndDestroyMission")]
    SeekAndDestroy {
        /// The attacker.
        unit: UnitId,
        /// What it hunts.
        target: Target,
    },
    /// [`DefendSettlementMission`].
    #[serde(rename = "defendSettlementMission")]
    DefendSettlement {
        /// The defender.
        unit: UnitId,
        /// Settlement defended.
        settlement: SettlementId,
    },
    /// [`IndianDemandMission`].
    #[serde(rename = "indianDemandMission")]
    IndianDemand {
        /// The brave.
        unit: UnitId,
        /// Colony being extorted.
        colony: SettlementId,
        /// Whether the demand has been made.
        completed: bool,
    },
    /// [`CashInTreasureTrainMission`].
    #[serde(rename = "cashInTreasureTrainMission")]
    CashInTreasureTrain {
        /// The treasure train.
        unit: UnitId,
    },
    /// [`WishRealizationMission`].
    #[serde(rename = "wishRealizationMission")]
    WishRealization {
        /// The worker.
        unit: UnitId,
        /// Wish being answered.
        wish: WishId,
    },
    /// [`WorkInsideColonyMission`].
    #[serde(rename = "workInsideColonyMission")]
    WorkInsideColony {
        /// The worker.
        unit: UnitId,
        /// Its colony.
        colony: SettlementId,
    },
    /// [`IdleAtSettlementMission`].
    #[serde(rename = "idleAtSettlementMission")]
    IdleAtSettlement {
        /// The idler.
        unit: UnitId,
    },
    /// [`WanderHostileMission`].
    #[serde(rename = "unitWanderHostileMission")]
    WanderHostile {
        /// The wanderer.
        unit: UnitId,
    },
}

impl MissionRecord {
    /// Record of a live mission.
    #[must_use]
    pub fn capture(mission: &Mission) -> Self {
        match mission {
            Mission::BuildColony(m) => Self::BuildColony {
                unit: m.unit(),
                target: m.target(),
                colony_value: m.colony_value(),
                do_not_give_up: m.do_not_give_up(),
                colony_built: m.colony_built(),
            },
            Mission::Transport(m) => Self::Transport {
                unit: m.unit(),
                transportables: m.transport_list().to_vec(),
            },
            Mission::SeekAndDestroy(m) => Self::SeekAndDestroy {
                unit: m.unit(),
                target: m.target(),
            },
            Mission::DefendSettlement(m) => Self::DefendSettlement {
                unit: m.unit(),
                settlement: m.settlement(),
            },
            Mission::IndianDemand(m) => Self::IndianDemand {
                unit: m.unit(),
                colony: m.colony(),
                completed: m.is_completed(),
            },
            Mission::CashInTreasureTrain(m) => Self::CashInTreasureTrain { unit: m.unit() },
            Mission::WishRealization(m) => Self::WishRealization {
                unit: m.unit(),
                wish: m.wish(),
            },
            Mission::WorkInsideColony(m) => Self::WorkInsideColony {
                unit: m.unit(),
                colony: m.colony(),
            },
            Mission::IdleAtSettlement(m) => Self::IdleAtSettlement { unit: m.unit() },
            Mission::WanderHostile(m) => Self::WanderHostile { unit: m.unit() },
        }
    }

    /// Stable element name of the record.
    #[must_use]
    pub fn element_name(&self) -> &'static str {
        match self {
            Self::BuildColony { .. } => BuildColonyMission::NAME,
            Self::Transport { .. } => TransportMission::NAME,
            Self::SeekAndDestroy { .. } => SeekAndDestroyMission::NAME,
            Self::DefendSettlement { .. } => DefendSettlementMission::NAME,
            Self::IndianDemand { .. } => IndianDemandMission::NAME,
            Self::CashInTreasureTrain { .. } => CashInTreasureTrainMission::NAME,
            Self::WishRealization { .. } => WishRealizationMission::NAME,
            Self::WorkInsideColony { .. } => WorkInsideColonyMission::NAME,
            Self::IdleAtSettlement { .. } => IdleAtSettlementMission::NAME,
            Self::WanderHostile { .. } => WanderHostileMission::NAME,
        }
    }

    /// Rebuild the mission. Only the colony builder re-checks its unit; the
    /// others are validated by the scheduler on their next turn.
    pub fn restore(&self, world: &World) -> Result<Mission> {
        Ok(match self.clone() {
            Self::BuildColony {
                unit,
                target,
                colony_value,
                do_not_give_up,
                colony_built,
            } => Mission::BuildColony(BuildColonyMission::restored(
                world,
                unit,
                target,
                colony_value,
                do_not_give_up,
                colony_built,
            )?),
            Self::Transport { unit, transportables } => {
                Mission::Transport(TransportMission::restored(unit, transportables))
            }
            Self::SeekAndDestroy { unit, target } => {
                Mission::SeekAndDestroy(SeekAndDestroyMission::restored(unit, target))
            }
            Self::DefendSettlement { unit, settlement } => {
                Mission::DefendSettlement(DefendSettlementMission::restored(unit, settlement))
            }
            Self::IndianDemand { unit, colony, completed } => {
                Mission::IndianDemand(IndianDemandMission::restored(unit, colony, completed))
            }
            Self::CashInTreasureTrain { unit } => {
                Mission::CashInTreasureTrain(CashInTreasureTrainMission::restored(unit))
            }
            Self::WishRealization { unit, wish } => {
                Mission::WishRealization(WishRealizationMission::restored(unit, wish))
            }
            Self::WorkInsideColony { unit, colony } => {
                Mission::WorkInsideColony(WorkInsideColonyMission::restored(unit, colony))
            }
            Self::IdleAtSettlement { unit } => {
                Mission::IdleAtSettlement(IdleAtSettlementMission::for_unit(unit))
            }
            Self::WanderHostile { unit } => {
                Mission::WanderHostile(WanderHostileMission::restored(unit))
            }
        })
    }
}

/// Saved form of an [`AiUnit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiUnitRecord {
    /// The world unit.
    pub unit: UnitId,
    /// Its mission.
    pub mission: Option<MissionRecord>,
    /// Carrier it is scheduled on.
    pub transport: Option<UnitId>,
}

/// Saved form of an [`AiGoods`] lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiGoodsRecord {
    /// Registry handle.
    pub id: AiGoodsId,
    /// What and how much.
    pub goods: Goods,
    /// Where the lot is.
    pub location: GoodsLocation,
    /// Where it should go.
    pub destination: Option<TransportPoint>,
    /// Transport priority.
    pub priority: u32,
    /// Carrier it is scheduled on.
    pub transport: Option<UnitId>,
}

/// Everything the AI keeps between turns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiSnapshot {
    /// Format version.
    pub version: u32,
    /// AI units in handle order.
    pub units: Vec<AiUnitRecord>,
    /// AI goods lots in handle order.
    pub goods: Vec<AiGoodsRecord>,
    /// Colony wishes in handle order.
    pub wishes: Vec<Wish>,
}

impl AiSnapshot {
    /// Capture the registry. Placeholders are not saved.
    #[must_use]
    pub fn capture(ai: &AiRegistry) -> Self {
        let units = ai
            .ai_units()
            .filter(|u| !u.placeholder)
            .map(|u| AiUnitRecord {
                unit: u.unit,
                mission: u.mission.as_ref().map(MissionRecord::capture),
                transport: u.transport,
            })
            .collect();
        let goods = ai
            .all_goods()
            .filter(|g| !g.placeholder)
            .map(|g| AiGoodsRecord {
                id: g.id,
                goods: g.goods,
                location: g.location,
                destination: g.destination,
                priority: g.priority,
                transport: g.transport,
            })
            .collect();
        Self {
            version: SNAPSHOT_VERSION,
            units,
            goods,
            wishes: ai.wishes().copied().collect(),
        }
    }

    /// Rebuild a registry against `world`.
    ///
    /// Records of units that no longer exist are skipped, as are missions
    /// that cannot be rebuilt; the scheduler gives those units a fresh
    /// mission on the next turn.
    pub fn restore(&self, world: &World) -> Result<AiRegistry> {
        if self.version != SNAPSHOT_VERSION {
            return Err(AiError::Persistence(format!(
                "snapshot version mismatch: expected {SNAPSHOT_VERSION}, got {}",
                self.version
            )));
        }
        let mut ai = AiRegistry::new();

        for record in &self.units {
            if !world.has_unit(record.unit) {
                warn!(unit = %record.unit, "saved AI unit no longer exists");
                continue;
            }
            let mission = match record.mission.as_ref().map(|m| m.restore(world)) {
                Some(Ok(mission)) => Some(mission),
                Some(Err(error)) => {
                    warn!(unit = %record.unit, %error, "dropping unrestorable mission");
                    None
                }
                None => None,
            };
            if let Some(Mission::Transport(transport)) = &mission {
                for item in transport.transport_list() {
                    reserve(&mut ai, *item, record.unit);
                }
            }
            let wrapper = ai.register_unit(record.unit);
            wrapper.mission = mission;
            wrapper.transport = record.transport;
            wrapper.placeholder = false;
        }

        for record in &self.goods {
            ai.insert_goods(AiGoods {
                id: record.id,
                goods: record.goods,
                location: record.location,
                destination: record.destination,
                priority: record.priority,
                transport: record.transport,
                placeholder: false,
            });
        }

        for wish in &self.wishes {
            if world.settlement(wish.colony).is_some() {
                ai.insert_wish(*wish);
            }
        }

        drop_placeholders(&mut ai, world);
        debug!(
            units = self.units.len(),
            goods = self.goods.len(),
            wishes = self.wishes.len(),
            "AI state restored"
        );
        Ok(ai)
    }

    // ========================================================================
    // Encodings
    // ========================================================================

    /// Human-readable RON text.
    pub fn to_ron(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| AiError::Persistence(format!("Failed to write snapshot: {e}")))
    }

    /// Parse RON text.
    pub fn from_ron(text: &str) -> Result<Self> {
        ron::from_str(text).map_err(|e| AiError::Persistence(format!("Failed to parse snapshot: {e}")))
    }

    /// Compact binary encoding.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| AiError::Persistence(format!("Failed to serialize snapshot: {e}")))
    }

    /// Decode the binary encoding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| AiError::Persistence(format!("Failed to deserialize snapshot: {e}")))
    }

    /// Save the binary encoding to a file.
    ///
    /// # Errors
    /// Returns an error if serialization or file writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_bytes()?)
            .map_err(|e| AiError::Persistence(format!("Failed to write snapshot file: {e}")))
    }

    /// Load a binary snapshot from a file.
    ///
    /// # Errors
    /// Returns an error if file reading or deserialization fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())
            .map_err(|e| AiError::Persistence(format!("Failed to read snapshot file: {e}")))?;
        Self::from_bytes(&bytes)
    }
}

/// Make sure a wrapper exists for something a manifest refers to.
fn reserve(ai: &mut AiRegistry, item: TransportableRef, carrier: UnitId) {
    match item {
        TransportableRef::Unit(unit) => {
            if ai.ai_unit(unit).is_none() {
                let wrapper = ai.register_unit(unit);
                *wrapper = AiUnit {
                    placeholder: true,
                    ..AiUnit::new(unit)
                };
            }
        }
        TransportableRef::Goods(id) => {
            if ai.goods(id).is_none() {
                ai.insert_goods(AiGoods {
                    id,
                    goods: Goods::new(GoodsType::Food, 0),
                    location: GoodsLocation::Carrier(carrier),
                    destination: None,
                    priority: 0,
                    transport: Some(carrier),
                    placeholder: true,
                });
            }
        }
    }
}

/// Drop wrappers that no record filled in, and every manifest slot that
/// refers to them.
fn drop_placeholders(ai: &mut AiRegistry, world: &World) {
    let mut unresolved: Vec<TransportableRef> = ai
        .ai_units()
        .filter(|u| u.placeholder && !world.has_unit(u.unit))
        .map(|u| TransportableRef::Unit(u.unit))
        .collect();
    unresolved.extend(
        ai.all_goods()
            .filter(|g| g.placeholder)
            .map(|g| TransportableRef::Goods(g.id)),
    );
    // Units that exist but had no record of their own keep a bare wrapper.
    let bare: Vec<UnitId> = ai
        .ai_units()
        .filter(|u| u.placeholder && world.has_unit(u.unit))
        .map(|u| u.unit)
        .collect();
    for unit in bare {
        if let Some(wrapper) = ai.ai_unit_mut(unit) {
            wrapper.placeholder = false;
        }
    }
    if unresolved.is_empty() {
        return;
    }
    for item in &unresolved {
        warn!(%item, "dropping unresolved reference");
        match *item {
            TransportableRef::Unit(unit) => {
                ai.remove_unit(unit);
            }
            TransportableRef::Goods(id) => {
                ai.dispose_goods(id);
            }
        }
    }
    for carrier in ai.unit_ids() {
        let Some(Mission::Transport(transport)) = ai.mission(carrier) else {
            continue;
        };
        let kept: Vec<TransportableRef> = transport
            .transport_list()
            .iter()
            .copied()
            .filter(|i| !unresolved.contains(i))
            .collect();
        if kept.len() != transport.transport_list().len() {
            let owner = transport.unit();
            ai.set_mission(owner, Mission::Transport(TransportMission::restored(owner, kept)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{GameMap, Terrain};
    use crate::player::PlayerKind;
    use crate::settlement::{ColonyData, SettlementKind};
    use crate::unit::{Location, UnitType};

    fn harbour() -> (World, AiRegistry, UnitId, UnitId, AiGoodsId) {
        let mut map = GameMap::new(10, 5, Terrain::Plains);
        for y in 0..5 {
            map.set_terrain(TilePos::new(4, y), Terrain::Ocean);
        }
        let mut world = World::new(map);
        let dutch = world.add_player("Dutch", PlayerKind::European);
        let east = world.found_settlement(dutch, TilePos::new(5, 2), "East", SettlementKind::Colony(ColonyData::new(2)));
        let ship = world.spawn_unit(dutch, UnitType::Caravel, Location::Tile(TilePos::new(4, 2)));
        let colonist = world.spawn_unit(dutch, UnitType::FreeColonist, Location::Carrier(ship));

        let mut ai = AiRegistry::new();
        let lot = ai.add_goods(AiGoods::new(
            Goods::new(GoodsType::Tools, 50),
            GoodsLocation::Carrier(ship),
            Some(TransportPoint::Tile(TilePos::new(5, 2))),
        ));
        ai.set_mission(
            colonist,
            Mission::WorkInsideColony(WorkInsideColonyMission::new(&world, colonist, east).unwrap()),
        );
        let mut transport = TransportMission::new(&world, ship).unwrap();
        let config = crate::config::AiConfig::default();
        transport
            .add_to_transport_list(&world, &mut ai, &config, TransportableRef::Unit(colonist))
            .unwrap();
        transport
            .add_to_transport_list(&world, &mut ai, &config, TransportableRef::Goods(lot))
            .unwrap();
        ai.set_mission(ship, Mission::Transport(transport));
        ai.add_wish(east, 120, crate::ai::WishKind::Worker { unit_type: None });
        (world, ai, ship, colonist, lot)
    }

    #[test]
    fn test_element_names_match_missions() {
        let (_, ai, ship, colonist, _) = harbour();
        for unit in [ship, colonist] {
            let mission = ai.mission(unit).unwrap();
            assert_eq!(MissionRecord::capture(mission).element_name(), mission.name());
        }
    }

    #[test]
    fn test_ron_uses_element_names() {
        let (_, ai, ..) = harbour();
        let text = AiSnapshot::capture(&ai).to_ron().unwrap();
        assert!(text.contains("transportMission"));
        assert!(text.contains("workInsideColonyMission"));
        assert!(text.contains("transportable"));
    }

    #[test]
    fn test_restore_rebuilds_registry() {
        let (world, ai, ship, colonist, lot) = harbour();
        let snapshot = AiSnapshot::capture(&ai);
        let restored = AiSnapshot::from_ron(&snapshot.to_ron().unwrap())
            .unwrap()
            .restore(&world)
            .unwrap();
        assert_eq!(restored.mission(ship), ai.mission(ship));
        assert_eq!(restored.mission(colonist), ai.mission(colonist));
        assert_eq!(restored.ai_unit(colonist).unwrap().transport, Some(ship));
        assert!(!restored.ai_unit(colonist).unwrap().placeholder);
        assert_eq!(restored.goods(lot), ai.goods(lot));
        assert_eq!(restored.wishes().count(), 1);
        assert_eq!(AiSnapshot::capture(&restored), snapshot);
    }

    #[test]
    fn test_binary_file_round_trip() {
        let (world, ai, ship, ..) = harbour();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ai.bin");
        AiSnapshot::capture(&ai).save(&path).unwrap();
        let restored = AiSnapshot::load(&path).unwrap().restore(&world).unwrap();
        assert_eq!(restored.mission(ship), ai.mission(ship));
    }

    #[test]
    fn test_missing_goods_record_is_dropped_from_manifest() {
        let (world, ai, ship, colonist, lot) = harbour();
        let mut snapshot = AiSnapshot::capture(&ai);
        snapshot.goods.clear();
        let restored = snapshot.restore(&world).unwrap();
        assert!(restored.goods(lot).is_none());
        let Some(Mission::Transport(transport)) = restored.mission(ship) else {
            panic!("carrier lost its mission");
        };
        assert_eq!(transport.transport_list(), &[TransportableRef::Unit(colonist)]);
    }

    #[test]
    fn test_vanished_unit_is_skipped() {
        let (mut world, ai, _, colonist, _) = harbour();
        let snapshot = AiSnapshot::capture(&ai);
        world.dispose_unit(colonist);
        let restored = snapshot.restore(&world).unwrap();
        assert!(restored.ai_unit(colonist).is_none());
    }

    #[test]
    fn test_version_mismatch_is_an_error() {
        let (world, ai, ..) = harbour();
        let mut snapshot = AiSnapshot::capture(&ai);
        snapshot.version = SNAPSHOT_VERSION + 1;
        assert!(matches!(snapshot.restore(&world), Err(AiError::Persistence(_))));
    }
}
